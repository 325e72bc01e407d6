//! Per-breakpoint annotation record pair (spec §6).

use std::io::Write;
use std::path::Path;

use csv::QuoteStyle;

use crate::emit::SvEvent;

use super::open_writer;

/// Emits one annotation line per breakpoint half (two per event), each
/// carrying `TY, O1, O2, NR, MG, CTX` tags (spec §6).
pub fn write_annotation(path: &Path, events: &[SvEvent]) -> Result<(), anyhow::Error> {
    let out = open_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    for ev in events {
        let ctx = match &ev.ctx_mate {
            Some((chrom, pos)) => format!("{chrom}:{pos}"),
            None => ".".to_string(),
        };
        for (chrom, pos) in [
            (ev.chrom1.as_str(), ev.pos1),
            (ev.chrom2.as_str(), ev.pos2),
        ] {
            csv_writer.write_record([
                chrom,
                &pos.to_string(),
                ev.name.as_str(),
                &ev.sv_type.to_string(),
                &ev.o1.symbol().to_string(),
                &ev.o2.symbol().to_string(),
                &ev.count.to_string(),
                if ev.merge { "1" } else { "0" },
                &ctx,
            ])?;
        }
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Orientation, SvType};
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_two_lines_per_event() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let ev = SvEvent {
            name: "SV_DEL_1".to_string(),
            sv_type: SvType::Del,
            chrom1: "chr1".to_string(),
            pos1: 100100,
            o1: Orientation::Forward,
            chrom2: "chr1".to_string(),
            pos2: 110000,
            o2: Orientation::Reverse,
            size: 4900,
            count: 10,
            merge: false,
            ctx_mate: None,
        };
        write_annotation(tmp.path(), &[ev]).unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
