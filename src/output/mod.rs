//! Output serializers (spec §6). These are the "serializers" the PURPOSE
//! section calls out as collaborators whose *wire format* this system still
//! owns: SVP, BED, BEDPE, annotation pairs, visualization link/tile files,
//! and the fragment-size histogram dump.

pub mod annotation;
pub mod bed;
pub mod bedpe;
pub mod histogram;
pub mod links;
pub mod svp;

use std::io::Write;
use std::path::Path;

use crate::common::io::open_write_maybe_gz;

pub(crate) fn open_writer(path: &Path) -> Result<Box<dyn Write>, anyhow::Error> {
    open_write_maybe_gz(path)
}
