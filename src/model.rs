//! Core data model (spec §3): the decoded record, the discordant-pair
//! cluster aggregate, and the small value types that key and classify them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Strand orientation of one half of a pair, derived from the SAM/BAM
/// "reverse strand" flag bit (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    Forward,
    Reverse,
}

impl Orientation {
    pub fn from_reverse_bit(is_reverse: bool) -> Self {
        if is_reverse {
            Orientation::Reverse
        } else {
            Orientation::Forward
        }
    }

    /// The observable orientation is the complement of the stored one on
    /// emission (spec §4.5, §9: "twice-over flip").
    pub fn flipped(self) -> Self {
        match self {
            Orientation::Forward => Orientation::Reverse,
            Orientation::Reverse => Orientation::Forward,
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Orientation::Forward => '+',
            Orientation::Reverse => '-',
        }
    }
}

/// A unique identifier for a read pair, used to suppress double-counting of
/// the two mates of the same pair (spec §3, §4.3 "Same read identifier =>
/// treat as already merged").
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ReadPairId(pub Box<str>);

impl From<&str> for ReadPairId {
    fn from(s: &str) -> Self {
        ReadPairId(s.into())
    }
}

impl std::fmt::Display for ReadPairId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single decoded alignment record, reduced to the normalized tuple
/// described in spec §3.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignedRecord {
    pub read_id: ReadPairId,
    pub c1: String,
    pub p1: i64,
    pub o1: Orientation,
    pub c2: String,
    pub p2: i64,
    pub o2: Orientation,
    pub tlen: i64,
    pub mapq: i32,
    pub tags: HashSet<String>,
    pub seq_len: i64,
}

impl AlignedRecord {
    /// Absolute template length, as used throughout the spec
    /// (`|tlen|`).
    pub fn abs_tlen(&self) -> i64 {
        self.tlen.abs()
    }

    /// `true` iff the pair is FR-oriented ("inward"): the two mates point
    /// toward each other (spec Glossary, §4.1).
    pub fn is_fr_oriented(&self) -> bool {
        (self.p1 <= self.p2 && self.o1 == Orientation::Forward && self.o2 == Orientation::Reverse)
            || (self.p2 <= self.p1
                && self.o2 == Orientation::Forward
                && self.o1 == Orientation::Reverse)
    }

    /// `true` iff the pair is RF-oriented ("outward"): the two mates point
    /// away from each other.
    pub fn is_rf_oriented(&self) -> bool {
        (self.p1 <= self.p2 && self.o1 == Orientation::Reverse && self.o2 == Orientation::Forward)
            || (self.p2 <= self.p1
                && self.o2 == Orientation::Reverse
                && self.o1 == Orientation::Forward)
    }
}

/// The dominant SV type assigned to a cluster (spec §3, §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SvType {
    Ins,
    Del,
    Inv,
    Itx,
    Ctx,
    Unk,
}

impl std::fmt::Display for SvType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SvType::Ins => "INS",
            SvType::Del => "DEL",
            SvType::Inv => "INV",
            SvType::Itx => "ITX",
            SvType::Ctx => "CTX",
            SvType::Unk => "UNK",
        };
        write!(f, "{s}")
    }
}

/// Canonical orientation-parity key used to bucket clusters: `Same` when
/// both halves share orientation, `Diff` otherwise (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Parity {
    Same,
    Diff,
}

impl Parity {
    pub fn of(o1: Orientation, o2: Orientation) -> Self {
        if o1 == o2 {
            Parity::Same
        } else {
            Parity::Diff
        }
    }
}

/// Bucket key: canonical chromosome-pair label plus orientation parity
/// (spec §3: `min(c1,c2)-max(c1,c2)` and `same`/`diff`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClusterKey {
    pub chrom_key: String,
    pub parity: Parity,
}

impl ClusterKey {
    pub fn new(c1: &str, c2: &str, parity: Parity) -> Self {
        let chrom_key = if c1 <= c2 {
            format!("{c1}-{c2}")
        } else {
            format!("{c2}-{c1}")
        };
        ClusterKey { chrom_key, parity }
    }

    /// `true` iff both sides of the key name the same chromosome (spec
    /// §4.4c: "whose key is `X-X`").
    pub fn is_same_chrom(&self) -> bool {
        match self.chrom_key.split_once('-') {
            Some((a, b)) => a == b,
            None => false,
        }
    }
}

/// A weak back-reference to another cluster living in the same or a
/// different bucket's arena (spec §9: "explicit arena-plus-index").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterRef {
    pub key: ClusterKey,
    pub index: usize,
}

/// The mutable discordant-pair cluster aggregate (spec §3).
#[derive(Debug, Clone)]
pub struct DiscordantPairCluster {
    pub c1: String,
    pub c2: String,
    pub p1_min: i64,
    pub p1_max: i64,
    pub p2_min: i64,
    pub p2_max: i64,
    pub o1: Orientation,
    pub o2: Orientation,
    pub read_ids: HashSet<ReadPairId>,
    pub fragments: Vec<i64>,
    pub indels: Vec<i64>,
    pub count: u32,
    pub type_tally: HashMap<SvType, u32>,
    pub merge: bool,
    pub inv_merge: Option<ClusterRef>,
    pub qc: bool,
    /// Minimum observed sequence length among contributing reads, used by
    /// the "side range >= seq_length * min_cluster_count" liveness and
    /// fusion-eligibility gates (spec §3, §4.4).
    pub seq_length: i64,
}

impl DiscordantPairCluster {
    /// Initialize a new cluster from the first discordant pair routed into
    /// an empty slot (spec §3 "Lifecycle").
    pub fn from_record(r: &AlignedRecord, sv_type: SvType) -> Self {
        let mut type_tally = HashMap::new();
        type_tally.insert(sv_type, 1);
        let mut read_ids = HashSet::new();
        read_ids.insert(r.read_id.clone());
        DiscordantPairCluster {
            c1: r.c1.clone(),
            c2: r.c2.clone(),
            p1_min: r.p1,
            p1_max: r.p1,
            p2_min: r.p2,
            p2_max: r.p2,
            o1: r.o1,
            o2: r.o2,
            read_ids,
            fragments: vec![r.abs_tlen()],
            indels: Vec::new(),
            count: 1,
            type_tally,
            merge: false,
            inv_merge: None,
            qc: true,
            seq_length: r.seq_len,
        }
    }

    pub fn midpoint1(&self) -> f64 {
        (self.p1_min + self.p1_max) as f64 / 2.0
    }

    pub fn midpoint2(&self) -> f64 {
        (self.p2_min + self.p2_max) as f64 / 2.0
    }

    /// Spatial extent: `(p1_max - p1_min) + (p2_max - p2_min)` (spec §3).
    pub fn size(&self) -> i64 {
        (self.p1_max - self.p1_min) + (self.p2_max - self.p2_min)
    }

    /// `argmax(type_tally)`, ties broken by first-seen insertion order of
    /// the `SvType` enum (spec §4.3, §4.5).
    pub fn dominant_type(&self) -> SvType {
        const ORDER: [SvType; 6] = [
            SvType::Ins,
            SvType::Del,
            SvType::Inv,
            SvType::Itx,
            SvType::Ctx,
            SvType::Unk,
        ];
        let mut best = SvType::Unk;
        let mut best_count = -1i64;
        for ty in ORDER {
            let c = *self.type_tally.get(&ty).unwrap_or(&0) as i64;
            if c > best_count {
                best_count = c;
                best = ty;
            }
        }
        best
    }

    pub fn record_vote(&mut self, ty: SvType) {
        *self.type_tally.entry(ty).or_insert(0) += 1;
    }

    /// A cluster is live iff `qc = 1 AND count >= min_cluster_count AND size
    /// > inward_max * span AND side_range_i >= seq_length *
    /// min_cluster_count` (spec §3).
    pub fn is_live(&self, inward_max: i64, span: f64, min_cluster_count: u32) -> bool {
        self.qc
            && self.count >= min_cluster_count
            && (self.size() as f64) > (inward_max as f64) * span
            && (self.p1_max - self.p1_min) >= self.seq_length * min_cluster_count as i64
            && (self.p2_max - self.p2_min) >= self.seq_length * min_cluster_count as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cluster_key_is_canonical() {
        let a = ClusterKey::new("chr7", "chr1", Parity::Same);
        let b = ClusterKey::new("chr1", "chr7", Parity::Same);
        assert_eq!(a, b);
        assert_eq!(a.chrom_key, "chr1-chr7");
    }

    #[test]
    fn cluster_key_same_chrom() {
        let a = ClusterKey::new("chr1", "chr1", Parity::Diff);
        assert!(a.is_same_chrom());
        let b = ClusterKey::new("chr1", "chr7", Parity::Diff);
        assert!(!b.is_same_chrom());
    }

    #[test]
    fn orientation_flip_roundtrips() {
        assert_eq!(Orientation::Forward.flipped(), Orientation::Reverse);
        assert_eq!(Orientation::Reverse.flipped().flipped(), Orientation::Reverse);
    }

    #[test]
    fn dominant_type_argmax() {
        let mut tally = HashMap::new();
        tally.insert(SvType::Del, 3);
        tally.insert(SvType::Unk, 1);
        let c = DiscordantPairCluster {
            c1: "chr1".into(),
            c2: "chr1".into(),
            p1_min: 0,
            p1_max: 10,
            p2_min: 0,
            p2_max: 10,
            o1: Orientation::Forward,
            o2: Orientation::Reverse,
            read_ids: HashSet::new(),
            fragments: vec![],
            indels: vec![],
            count: 4,
            type_tally: tally,
            merge: false,
            inv_merge: None,
            qc: true,
            seq_length: 100,
        };
        assert_eq!(c.dominant_type(), SvType::Del);
    }
}
