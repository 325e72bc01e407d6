//! Fragment-size histogram dump (spec §6): `bin*100 -> count` pairs, for
//! library-QC inspection.

use std::io::Write;
use std::path::Path;

use csv::QuoteStyle;

use crate::fragment_size::Histogram;

use super::open_writer;

pub fn write_histogram(path: &Path, histogram: &Histogram) -> Result<(), anyhow::Error> {
    let out = open_writer(path)?;
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .quote_style(QuoteStyle::Never)
        .from_writer(out);

    for (bin, count) in histogram.dump_pairs() {
        csv_writer.write_record([&bin.to_string(), &count.to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn dumps_one_line_per_bin() {
        let mut h = Histogram::new();
        h.observe(150);
        h.observe(250);
        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_histogram(tmp.path(), &h).unwrap();
        let contents = std::fs::read_to_string(tmp.path()).unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
