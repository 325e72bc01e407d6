//! Streaming clusterer (spec §4.3): buckets discordant pairs by
//! `(chromosome-pair, orientation-parity)` and incrementally merges each new
//! record into an existing cluster, greedily, in insertion order.

use std::collections::HashMap;

use crate::config::CallConfig;
use crate::model::{AlignedRecord, ClusterKey, DiscordantPairCluster, Orientation, SvType};

/// Clusters live in a per-bucket arena (`Vec<Option<...>>`) so post-pass
/// phases can logically delete a cluster (set its slot to `None`) while
/// keeping earlier back-references' indices stable (spec §9).
pub type Bucket = Vec<Option<DiscordantPairCluster>>;
pub type Buckets = HashMap<ClusterKey, Bucket>;

/// The initial per-pair SV-type vote, recorded into the cluster's
/// `type_tally` as each pair is fused (spec §4.3).
pub fn classify_pair(r: &AlignedRecord, cfg: &CallConfig) -> (SvType, Option<i64>) {
    if r.c1 != r.c2 {
        return (SvType::Ctx, None);
    }
    if r.o1 == r.o2 {
        return (SvType::Inv, None);
    }
    let tlen = r.abs_tlen();
    if r.is_rf_oriented() {
        if tlen < cfg.windows.outward_min {
            return (SvType::Ins, Some(cfg.windows.outward_min - tlen));
        }
        if tlen > cfg.windows.outward_max {
            return (SvType::Del, Some(tlen - cfg.windows.outward_max));
        }
        return (SvType::Unk, None);
    }
    if r.is_fr_oriented()
        && ((r.p1 < r.p2 && r.o1 == Orientation::Forward)
            || (r.p2 < r.p1 && r.o2 == Orientation::Forward))
    {
        return (SvType::Itx, None);
    }
    (SvType::Unk, None)
}

/// Which side of an existing cluster `r.p1`/`r.p2` should be matched
/// against, chosen to minimize total midpoint distance (spec §4.3
/// "Intersect test").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    /// `r.p1` -> cluster side 1, `r.p2` -> cluster side 2.
    Straight,
    /// `r.p1` -> cluster side 2, `r.p2` -> cluster side 1.
    Swapped,
}

/// Decide whether `r` intersects `cluster`, and if so under which side
/// assignment (spec §4.3).
fn intersect(
    r: &AlignedRecord,
    cluster: &DiscordantPairCluster,
    outward_max: i64,
) -> Option<Assignment> {
    if cluster.read_ids.contains(&r.read_id) {
        // Idempotent: the other mate of an already-fused pair.
        return Some(Assignment::Straight);
    }

    let same_chrom = r.c1 == r.c2;
    let m1 = cluster.midpoint1();
    let m2 = cluster.midpoint2();

    let chroms_match_straight = r.c1 == cluster.c1 && r.c2 == cluster.c2;
    let chroms_match_swapped = r.c1 == cluster.c2 && r.c2 == cluster.c1;

    let dist_straight = (m1 - r.p1 as f64).abs() + (m2 - r.p2 as f64).abs();
    let dist_swapped = (m1 - r.p2 as f64).abs() + (m2 - r.p1 as f64).abs();

    let candidate = if same_chrom {
        // Same-chromosome: pick whichever assignment minimizes distance,
        // regardless of which chromosome pairing "matched" (both sides
        // name the same chromosome anyway).
        if dist_straight <= dist_swapped {
            Assignment::Straight
        } else {
            Assignment::Swapped
        }
    } else {
        // Cross-chromosome: match by exact chromosome identity.
        if chroms_match_straight && (!chroms_match_swapped || dist_straight <= dist_swapped) {
            Assignment::Straight
        } else if chroms_match_swapped {
            Assignment::Swapped
        } else {
            return None;
        }
    };

    let (o1, o2, p1, p2) = match candidate {
        Assignment::Straight => (r.o1, r.o2, r.p1, r.p2),
        Assignment::Swapped => (r.o2, r.o1, r.p2, r.p1),
    };

    if o1 != cluster.o1 || o2 != cluster.o2 {
        return None;
    }
    if (m1 - p1 as f64).abs() > outward_max as f64 || (m2 - p2 as f64).abs() > outward_max as f64 {
        return None;
    }

    Some(candidate)
}

/// Reproduce (or, if `fix_bug` is set, correct) the source's `addBP`
/// min-collapse-to-max quirk (Design Notes §9): when the incoming position
/// is not strictly smaller than the current min, the buggy branch
/// collapses the min to the current max instead of leaving it unchanged.
fn merge_min(current_min: i64, current_max: i64, incoming: i64, fix_bug: bool) -> i64 {
    if incoming < current_min {
        incoming
    } else if fix_bug {
        current_min
    } else {
        current_max
    }
}

fn merge_max(current_max: i64, incoming: i64) -> i64 {
    incoming.max(current_max)
}

/// Attempt to fuse `r` into `cluster` under `assignment`. Returns `false`
/// (leaving `cluster` untouched) if the post-merge per-side range would
/// exceed `outward_max` (spec §4.3: "merge succeeds iff the post-merge
/// per-side range remains <= outward_max").
fn try_add_bp(
    cluster: &mut DiscordantPairCluster,
    r: &AlignedRecord,
    assignment: Assignment,
    cfg: &CallConfig,
) -> bool {
    if cluster.read_ids.contains(&r.read_id) {
        // Idempotent no-op merge for the second mate of an already-fused
        // pair: membership already accounted for, nothing to add.
        return true;
    }

    let (p1, p2) = match assignment {
        Assignment::Straight => (r.p1, r.p2),
        Assignment::Swapped => (r.p2, r.p1),
    };

    let fix_bug = cfg.fix_addbp_min_bug;
    let new_p1_min = merge_min(cluster.p1_min, cluster.p1_max, p1, fix_bug);
    let new_p1_max = merge_max(cluster.p1_max, p1);
    let new_p2_min = merge_min(cluster.p2_min, cluster.p2_max, p2, fix_bug);
    let new_p2_max = merge_max(cluster.p2_max, p2);

    if (new_p1_max - new_p1_min) > cfg.windows.outward_max
        || (new_p2_max - new_p2_min) > cfg.windows.outward_max
    {
        return false;
    }

    cluster.p1_min = new_p1_min;
    cluster.p1_max = new_p1_max;
    cluster.p2_min = new_p2_min;
    cluster.p2_max = new_p2_max;
    cluster.read_ids.insert(r.read_id.clone());
    cluster.fragments.push(r.abs_tlen());
    cluster.count += 1;
    cluster.seq_length = cluster.seq_length.min(r.seq_len);

    let (ty, indel) = classify_pair(r, cfg);
    cluster.record_vote(ty);
    if let Some(indel) = indel {
        cluster.indels.push(indel);
    }

    true
}

/// Fuse one surviving, already-filtered discordant record into the
/// bucketed cluster index (spec §4.3).
pub fn cluster_one(buckets: &mut Buckets, r: &AlignedRecord, cfg: &CallConfig) {
    use crate::model::Parity;

    let parity = Parity::of(r.o1, r.o2);
    let key = ClusterKey::new(&r.c1, &r.c2, parity);
    let bucket = buckets.entry(key).or_default();
    cluster_into_bucket(bucket, r, cfg);
}

/// Fuse a stream of already-filtered discordant records into the bucketed
/// cluster index (spec §4.3, §5: "strictly online per record").
///
/// When `cfg.threads > 1`, records are first grouped by their bucket key
/// (preserving arrival order within each group) and each group is then
/// clustered independently via `rayon`, per spec §5: "a correct
/// implementation may parallelize across independent buckets ... because
/// buckets never interact during clustering". The sequential path (the
/// default) is left untouched so it can't regress.
pub fn cluster_all<'a>(
    records: impl Iterator<Item = &'a AlignedRecord>,
    cfg: &CallConfig,
) -> Buckets {
    if cfg.threads <= 1 {
        let mut buckets: Buckets = HashMap::new();
        for r in records {
            cluster_one(&mut buckets, r, cfg);
        }
        return buckets;
    }

    use crate::model::Parity;
    use rayon::prelude::*;

    let mut grouped: HashMap<ClusterKey, Vec<&AlignedRecord>> = HashMap::new();
    for r in records {
        let parity = Parity::of(r.o1, r.o2);
        let key = ClusterKey::new(&r.c1, &r.c2, parity);
        grouped.entry(key).or_default().push(r);
    }

    grouped
        .into_par_iter()
        .map(|(key, recs)| {
            let mut bucket: Bucket = Vec::new();
            for r in recs {
                cluster_into_bucket(&mut bucket, r, cfg);
            }
            (key, bucket)
        })
        .collect()
}

/// Cluster a single record into an already-isolated bucket (no cross-bucket
/// lookup needed -- used by both the sequential and per-bucket-parallel
/// paths).
fn cluster_into_bucket(bucket: &mut Bucket, r: &AlignedRecord, cfg: &CallConfig) {
    for slot in bucket.iter_mut() {
        let Some(cluster) = slot else { continue };
        if let Some(assignment) = intersect(r, cluster, cfg.windows.outward_max) {
            if try_add_bp(cluster, r, assignment, cfg) {
                return;
            } else {
                break;
            }
        }
    }

    let (ty, indel) = classify_pair(r, cfg);
    let mut new_cluster = DiscordantPairCluster::from_record(r, ty);
    if let Some(indel) = indel {
        new_cluster.indels.push(indel);
    }
    bucket.push(Some(new_cluster));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InsertWindows;
    use pretty_assertions::assert_eq;

    fn cfg() -> CallConfig {
        CallConfig::new(InsertWindows {
            inward_min: 0,
            inward_max: 500,
            outward_min: 2000,
            outward_max: 5000,
        })
    }

    fn rf_record(id: &str, p1: i64, p2: i64, tlen: i64) -> AlignedRecord {
        AlignedRecord {
            read_id: id.into(),
            c1: "chr1".into(),
            p1,
            o1: Orientation::Reverse,
            c2: "chr1".into(),
            p2,
            o2: Orientation::Forward,
            tlen,
            mapq: 60,
            tags: Default::default(),
            seq_len: 100,
        }
    }

    #[test]
    fn ten_del_pairs_fuse_into_one_cluster() {
        let cfg = cfg();
        let records: Vec<AlignedRecord> = (0..10)
            .map(|i| rf_record(&format!("r{i}"), 100000 + i, 110000 + i, 10000))
            .collect();
        let buckets = cluster_all(records.iter(), &cfg);
        assert_eq!(buckets.len(), 1);
        let (_, bucket) = buckets.iter().next().unwrap();
        assert_eq!(bucket.len(), 1);
        let cluster = bucket[0].as_ref().unwrap();
        assert_eq!(cluster.count, 10);
        assert_eq!(cluster.dominant_type(), SvType::Del);
    }

    #[test]
    fn distant_pairs_open_separate_clusters() {
        let cfg = cfg();
        let records = vec![
            rf_record("r1", 100000, 110000, 10000),
            rf_record("r2", 900000, 910000, 10000),
        ];
        let buckets = cluster_all(records.iter(), &cfg);
        let (_, bucket) = buckets.iter().next().unwrap();
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn same_read_id_is_idempotent() {
        let cfg = cfg();
        let records = vec![
            rf_record("r1", 100000, 110000, 10000),
            rf_record("r1", 110000, 100000, 10000),
        ];
        let buckets = cluster_all(records.iter(), &cfg);
        let (_, bucket) = buckets.iter().next().unwrap();
        assert_eq!(bucket.len(), 1);
        assert_eq!(bucket[0].as_ref().unwrap().count, 1);
    }

    #[test]
    fn cross_chromosome_ctx_vote() {
        let cfg = cfg();
        let r = AlignedRecord {
            read_id: "r1".into(),
            c1: "chr1".into(),
            p1: 1000,
            o1: Orientation::Forward,
            c2: "chr7".into(),
            p2: 2000,
            o2: Orientation::Forward,
            tlen: 0,
            mapq: 60,
            tags: Default::default(),
            seq_len: 100,
        };
        let (ty, _) = classify_pair(&r, &cfg);
        assert_eq!(ty, SvType::Ctx);
    }

    #[test]
    fn threaded_clustering_matches_sequential() {
        let mut cfg = cfg();
        let records: Vec<AlignedRecord> = (0..10)
            .map(|i| rf_record(&format!("r{i}"), 100000 + i, 110000 + i, 10000))
            .chain((0..5).map(|i| rf_record(&format!("s{i}"), 900000 + i, 910000 + i, 10000)))
            .collect();

        let sequential = cluster_all(records.iter(), &cfg);
        cfg.threads = 4;
        let parallel = cluster_all(records.iter(), &cfg);

        assert_eq!(sequential.len(), parallel.len());
        for (key, bucket) in &sequential {
            let other = parallel.get(key).expect("same bucket keys");
            assert_eq!(bucket.len(), other.len());
            let total: u32 = bucket.iter().flatten().map(|c| c.count).sum();
            let other_total: u32 = other.iter().flatten().map(|c| c.count).sum();
            assert_eq!(total, other_total);
        }
    }
}
