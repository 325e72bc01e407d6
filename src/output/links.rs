//! Visualization link/tile files (spec §6): lightweight companions to the
//! SVP output used by genome-browser-style viewers.

use std::io::Write;
use std::path::Path;

use csv::QuoteStyle;

use crate::emit::SvEvent;

use super::open_writer;

/// One link per event: `chrom1, pos1, chrom2, pos2, name`.
pub fn write_links(path: &Path, events: &[SvEvent]) -> Result<(), anyhow::Error> {
    let out = open_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    for ev in events {
        csv_writer.write_record([
            ev.chrom1.as_str(),
            &ev.pos1.to_string(),
            ev.chrom2.as_str(),
            &ev.pos2.to_string(),
            ev.name.as_str(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// One tile per breakpoint half: `chrom, pos, name`.
pub fn write_tiles(path: &Path, events: &[SvEvent]) -> Result<(), anyhow::Error> {
    let out = open_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    for ev in events {
        for (chrom, pos) in [
            (ev.chrom1.as_str(), ev.pos1),
            (ev.chrom2.as_str(), ev.pos2),
        ] {
            csv_writer.write_record([chrom, &pos.to_string(), ev.name.as_str()])?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}
