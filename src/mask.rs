//! Mask loading and the mask/concordant-pair/MAPQ/unique-tag record filter
//! (spec §4.1, §6 "Mask input").

use std::collections::{HashMap, HashSet};
use std::io::BufRead;

use bio::data_structures::interval_tree::ArrayBackedIntervalTree;

use crate::common::io::open_read_maybe_gz;
use crate::config::CallConfig;
use crate::err::CallerError;
use crate::model::{AlignedRecord, ReadPairId};

/// A loaded set of masked genomic intervals, one interval tree per
/// chromosome, grounded on the teacher's `MaskedDb`
/// (`strucvars/query/masked.rs`).
#[derive(Debug, Default)]
pub struct Mask {
    trees: HashMap<String, ArrayBackedIntervalTree<i32, u32>>,
    counts: HashMap<String, u32>,
}

impl Mask {
    /// Load a tab-separated `chrom, start, end` mask file (spec §6: "one
    /// per line", inclusive intervals).
    pub fn load(path: &std::path::Path) -> Result<Self, CallerError> {
        let reader =
            open_read_maybe_gz(path).map_err(|e| CallerError::MaskLoadError(e.to_string()))?;
        let mut mask = Mask::default();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| CallerError::MaskLoadError(e.to_string()))?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 3 {
                return Err(CallerError::MaskLoadError(format!(
                    "malformed mask line {}: expected 3 tab-separated fields, got {:?}",
                    lineno + 1,
                    line
                )));
            }
            let chrom = fields[0].to_string();
            let start: i32 = fields[1].parse().map_err(|_| {
                CallerError::MaskLoadError(format!("invalid start on mask line {}", lineno + 1))
            })?;
            let end: i32 = fields[2].parse().map_err(|_| {
                CallerError::MaskLoadError(format!("invalid end on mask line {}", lineno + 1))
            })?;
            let count = mask.counts.entry(chrom.clone()).or_insert(0);
            let idx = *count;
            *count += 1;
            let tree = mask.trees.entry(chrom).or_default();
            tree.insert(start..(end + 1), idx);
        }
        Ok(mask)
    }

    /// `true` if `(chrom, pos)` falls inside any masked interval on
    /// `chrom` (spec §4.1: inclusive intervals).
    pub fn contains(&self, chrom: &str, pos: i64) -> bool {
        match self.trees.get(chrom) {
            Some(tree) => {
                let pos = pos as i32;
                !tree.find(pos..(pos + 1)).is_empty()
            }
            None => false,
        }
    }
}

/// Stateful mask/concordant-pair/MAPQ/unique-tag filter. Statefulness is
/// required because "when any half of a pair is rejected, the pair
/// identifier is remembered and the other half is also dropped when
/// encountered" (spec §4.1) -- the two mates of a pair may arrive as
/// separate decoded records.
#[derive(Debug, Default)]
pub struct RecordFilter {
    rejected_pairs: HashSet<ReadPairId>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if `r` should be dropped.
    pub fn reject(&mut self, r: &AlignedRecord, mask: Option<&Mask>, cfg: &CallConfig) -> bool {
        if self.rejected_pairs.contains(&r.read_id) {
            return true;
        }

        let rejected = r.mapq < cfg.min_mapping_quality
            || (cfg.unique_mapping && !r.tags.contains("XT:A:U"))
            || mask.is_some_and(|m| m.contains(&r.c1, r.p1) || m.contains(&r.c2, r.p2))
            || is_concordant(r, cfg);

        if rejected {
            self.rejected_pairs.insert(r.read_id.clone());
        }
        rejected
    }
}

/// A record is concordant if it lies inside either the inward or outward
/// expected window for the matching orientation (spec §4.1).
fn is_concordant(r: &AlignedRecord, cfg: &CallConfig) -> bool {
    if r.c1 != r.c2 {
        return false;
    }
    let tlen = r.abs_tlen();
    let w = &cfg.windows;
    (tlen <= w.inward_max && r.is_fr_oriented())
        || (tlen >= w.outward_min && tlen <= w.outward_max && r.is_rf_oriented())
}
