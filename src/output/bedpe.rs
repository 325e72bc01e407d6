//! BEDPE writer (spec §6): inter-chromosomal (CTX) events, reassembled from
//! the two SVP half-records the emitter produces per CTX breakpoint.

use std::io::Write;
use std::path::Path;

use csv::QuoteStyle;

use crate::emit::SvEvent;
use crate::model::SvType;

use super::open_writer;

pub fn write_bedpe(path: &Path, events: &[SvEvent]) -> Result<(), anyhow::Error> {
    let out = open_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    // The emitter always produces CTX half-records in consecutive pairs
    // (spec §4.5: "emit two paired records").
    let ctx_events: Vec<&SvEvent> = events.iter().filter(|e| e.sv_type == SvType::Ctx).collect();
    for pair in ctx_events.chunks(2) {
        let [first, second] = pair else { continue };
        csv_writer.write_record([
            first.chrom1.as_str(),
            &first.pos1.to_string(),
            &(first.pos1 + 1).to_string(),
            second.chrom1.as_str(),
            &second.pos1.to_string(),
            &(second.pos1 + 1).to_string(),
            first.name.as_str(),
            &first.count.to_string(),
            &first.o1.symbol().to_string(),
            &second.o1.symbol().to_string(),
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
    fn pairs_consecutive_ctx_halves() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let a = SvEvent {
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
        let mut b = a.clone();
        b.chrom1 = "chr7".to_string();
        b.pos1 = 2000;
        b.name = "SV_CTX_2".to_string();
        write_bedpe(tmp.path(), &[a, b]).unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert!(contents.contains("chr1"));
        assert!(contents.contains("chr7"));
    }
}
