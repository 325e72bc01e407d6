//! Record decoder (spec §4.1, §6).
//!
//! Consumes the already-decoded, tab-separated alignment stream the external
//! aligner collaborator emits (`read_id, flag, c1, p1, mapq, cigar,
//! mate_chrom_ref, p2, tlen, seq, qual, tags...`) and reduces each line to
//! the normalized [`crate::model::AlignedRecord`] tuple.

use std::collections::HashSet;

use crate::err::MalformedRecord;
use crate::model::{AlignedRecord, Orientation, ReadPairId};

/// Bit 16: primary read is on the reverse strand.
const FLAG_REVERSE: u32 = 0x10;
/// Bit 32: mate is on the reverse strand.
const FLAG_MATE_REVERSE: u32 = 0x20;
/// Bit 1: read is part of a pair.
const FLAG_PAIRED: u32 = 0x1;
/// The combined "not interesting" bit cluster the caller filters out via
/// `-F 1804`: unmapped(4) + mate-unmapped(8) + secondary(256) +
/// fail-qc(512) + duplicate(1024) = 1804.
const FLAG_EXCLUDE: u32 = 1804;

/// `true` if `flag` passes the `-f 1 -F 1804` filter the caller requests
/// from the aligner (spec §6).
pub fn passes_flag_filter(flag: u32) -> bool {
    (flag & FLAG_PAIRED) != 0 && (flag & FLAG_EXCLUDE) == 0
}

/// Decode one tab-separated alignment line into an [`AlignedRecord`].
///
/// Returns `Ok(None)` for a structurally valid line that the flag filter
/// rejects (not a pass/fail condition, just "not interesting"); returns
/// `Err` for a line that cannot be parsed at all (spec §4.6: "malformed
/// records are skipped with a warning").
pub fn decode_record(line: &str) -> Result<Option<AlignedRecord>, MalformedRecord> {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() < 9 {
        return Err(MalformedRecord(format!(
            "expected at least 9 tab-separated fields, got {}",
            fields.len()
        )));
    }

    let read_id = fields[0];
    let flag: u32 = fields[1]
        .parse()
        .map_err(|_| MalformedRecord(format!("invalid flag field: {:?}", fields[1])))?;
    if !passes_flag_filter(flag) {
        return Ok(None);
    }

    let c1 = fields[2].to_string();
    let p1: i64 = fields[3]
        .parse()
        .map_err(|_| MalformedRecord(format!("invalid p1 field: {:?}", fields[3])))?;
    let mapq: i32 = fields[4]
        .parse()
        .map_err(|_| MalformedRecord(format!("invalid mapq field: {:?}", fields[4])))?;
    // fields[5] is cigar, unused by this caller (no split-read evidence).
    let mate_chrom_ref = fields[6];
    let c2 = if mate_chrom_ref == "=" {
        c1.clone()
    } else {
        mate_chrom_ref.to_string()
    };
    let p2: i64 = fields[7]
        .parse()
        .map_err(|_| MalformedRecord(format!("invalid p2 field: {:?}", fields[7])))?;
    let tlen: i64 = fields[8]
        .parse()
        .map_err(|_| MalformedRecord(format!("invalid tlen field: {:?}", fields[8])))?;
    let seq_len = fields.get(9).map(|s| s.len() as i64).unwrap_or(0);

    let tags: HashSet<String> = fields.iter().skip(11).map(|s| s.to_string()).collect();

    Ok(Some(AlignedRecord {
        read_id: ReadPairId::from(read_id),
        c1,
        p1,
        o1: Orientation::from_reverse_bit(flag & FLAG_REVERSE != 0),
        c2,
        p2,
        o2: Orientation::from_reverse_bit(flag & FLAG_MATE_REVERSE != 0),
        tlen,
        mapq,
        tags,
        seq_len,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line(flag: u32) -> String {
        format!("r1\t{flag}\tchr1\t100\t60\t100M\tchr1\t200\t150\tACGT\tIIII\tXT:A:U")
    }

    #[test]
    fn decodes_basic_fields() {
        let rec = decode_record(&line(1)).unwrap().unwrap();
        assert_eq!(rec.c1, "chr1");
        assert_eq!(rec.p1, 100);
        assert_eq!(rec.p2, 200);
        assert_eq!(rec.tlen, 150);
        assert_eq!(rec.o1, Orientation::Forward);
        assert_eq!(rec.o2, Orientation::Forward);
        assert!(rec.tags.contains("XT:A:U"));
    }

    #[test]
    fn reverse_bits_set_orientation() {
        let rec = decode_record(&line(1 | 0x10 | 0x20)).unwrap().unwrap();
        assert_eq!(rec.o1, Orientation::Reverse);
        assert_eq!(rec.o2, Orientation::Reverse);
    }

    #[test]
    fn self_reference_mate_chrom() {
        let l = "r1\t1\tchr2\t1\t60\t100M\t=\t50\t100\tACGT\tIIII";
        let rec = decode_record(l).unwrap().unwrap();
        assert_eq!(rec.c2, "chr2");
    }

    #[test]
    fn excluded_flags_are_filtered_not_errors() {
        // secondary (256) set
        let rec = decode_record(&line(1 | 256)).unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn unpaired_flag_is_filtered() {
        let rec = decode_record(&line(0)).unwrap();
        assert!(rec.is_none());
    }

    #[test]
    fn too_few_fields_is_malformed() {
        let err = decode_record("r1\t1\tchr1").unwrap_err();
        assert!(err.0.contains("expected at least"));
    }

    #[test]
    fn bad_integer_field_is_malformed() {
        let l = "r1\tNOTANUM\tchr1\t100\t60\t100M\tchr1\t200\t150\tACGT\tIIII";
        assert!(decode_record(l).is_err());
    }
}
