//! SVP writer (spec §6): one line per emitted event, header carries the
//! program name, source file, and the annotation-tag dictionary.

use std::io::Write;
use std::path::Path;

use csv::QuoteStyle;

use crate::emit::SvEvent;

use super::open_writer;

/// Write the SVP header and one record per event.
///
/// Header lines carry `##program=matesv`, `##source=<source_file>`, and the
/// annotation-tag dictionary `{TY, O1, O2, NR, MG, CTX}` (spec §6).
pub fn write_svp(
    path: &Path,
    events: &[SvEvent],
    source_file: &str,
) -> Result<(), anyhow::Error> {
    let mut out = open_writer(path)?;
    writeln!(out, "##program=matesv")?;
    writeln!(out, "##source={source_file}")?;
    writeln!(
        out,
        "##tags=TY:sv_type,O1:orientation1,O2:orientation2,NR:count,MG:merge,CTX:mate"
    )?;

    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    csv_writer.write_record([
        "#CHROM1", "POS1", "CHROM2", "POS2", "NAME", "TY", "O1", "O2", "NR", "MG", "SIZE", "CTX",
    ])?;

    for ev in events {
        let ctx = match &ev.ctx_mate {
            Some((chrom, pos)) => format!("{chrom}:{pos}"),
            None => ".".to_string(),
        };
        csv_writer.write_record([
            ev.chrom1.as_str(),
            &ev.pos1.to_string(),
            ev.chrom2.as_str(),
            &ev.pos2.to_string(),
            ev.name.as_str(),
            &ev.sv_type.to_string(),
            &ev.o1.symbol().to_string(),
            &ev.o2.symbol().to_string(),
            &ev.count.to_string(),
            if ev.merge { "1" } else { "0" },
            &ev.size.to_string(),
            &ctx,
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}
