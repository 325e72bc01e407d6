//! BED writer (spec §6): intra-chromosomal events only.

use std::io::Write;
use std::path::Path;

use csv::QuoteStyle;

use crate::emit::SvEvent;
use crate::model::SvType;

use super::open_writer;

pub fn write_bed(path: &Path, events: &[SvEvent]) -> Result<(), anyhow::Error> {
    let out = open_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    for ev in events.iter().filter(|e| e.sv_type != SvType::Ctx) {
        let (start, end) = if ev.pos1 <= ev.pos2 {
            (ev.pos1, ev.pos2)
        } else {
            (ev.pos2, ev.pos1)
        };
        csv_writer.write_record([
            ev.chrom1.as_str(),
            &start.to_string(),
            &end.to_string(),
            ev.name.as_str(),
            &ev.count.to_string(),
            &ev.o1.symbol().to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Orientation;
    use pretty_assertions::assert_eq;

    #[test]
    fn ctx_events_are_excluded() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let ctx = SvEvent {
            name: "SV_CTX_1".to_string(),
            sv_type: SvType::Ctx,
            chrom1: "chr1".to_string(),
            pos1: 1000,
            o1: Orientation::Forward,
            chrom2: "chr1".to_string(),
            pos2: 1000,
            o2: Orientation::Forward,
            size: 0,
            count: 5,
            merge: false,
            ctx_mate: Some(("chr7".to_string(), 2000)),
        };
        write_bed(tmp.path(), &[ctx]).unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents, "");
    }
}
