//! Cluster post-pass (spec §4.4): three batch sweeps over the fully
//! assembled cluster index -- QC de-duplication, inward/outward fusion, and
//! inversion pairing.

use crate::cluster::{Bucket, Buckets};
use crate::config::CallConfig;
use crate::model::{ClusterKey, ClusterRef, DiscordantPairCluster, Orientation, SvType};

fn ranges_overlap(a_min: i64, a_max: i64, b_min: i64, b_max: i64) -> bool {
    a_min <= b_max && b_min <= a_max
}

/// `true` if `a` and `b` overlap on both sides, either directly or (for
/// same-chromosome buckets) with sides swapped (spec §4.4a).
fn cluster_overlap(
    a: &DiscordantPairCluster,
    b: &DiscordantPairCluster,
    same_chrom: bool,
) -> bool {
    let straight = ranges_overlap(a.p1_min, a.p1_max, b.p1_min, b.p1_max)
        && ranges_overlap(a.p2_min, a.p2_max, b.p2_min, b.p2_max)
        && a.o1 == b.o1
        && a.o2 == b.o2;
    if straight {
        return true;
    }
    same_chrom
        && ranges_overlap(a.p1_min, a.p1_max, b.p2_min, b.p2_max)
        && ranges_overlap(a.p2_min, a.p2_max, b.p1_min, b.p1_max)
        && a.o1 == b.o2
        && a.o2 == b.o1
}

/// (a) QC de-duplication (spec §4.4a), opt-in via `cfg.qc_filter`. Compares
/// every live pair of clusters within a bucket; overlapping pairs are
/// resolved by `count`, then `size`, then both suppressed on a double tie.
/// Suppression only flips `qc`, never mutates structure.
pub fn qc_dedup(buckets: &mut Buckets, cfg: &CallConfig) {
    if !cfg.qc_filter {
        return;
    }
    let dedup_one = |key: &ClusterKey, bucket: &mut Bucket| {
        let same_chrom = key.is_same_chrom();
        let n = bucket.len();
        for i in 0..n {
            for j in (i + 1)..n {
                let (live_i, live_j) = match (&bucket[i], &bucket[j]) {
                    (Some(a), Some(b)) => (a.qc, b.qc),
                    _ => continue,
                };
                if !live_i || !live_j {
                    continue;
                }
                let overlaps = {
                    let a = bucket[i].as_ref().unwrap();
                    let b = bucket[j].as_ref().unwrap();
                    cluster_overlap(a, b, same_chrom)
                };
                if !overlaps {
                    continue;
                }
                let (count_i, count_j, size_i, size_j) = {
                    let a = bucket[i].as_ref().unwrap();
                    let b = bucket[j].as_ref().unwrap();
                    (a.count, b.count, a.size(), b.size())
                };
                if count_i > count_j {
                    bucket[j].as_mut().unwrap().qc = false;
                } else if count_j > count_i {
                    bucket[i].as_mut().unwrap().qc = false;
                } else if size_i > size_j {
                    bucket[j].as_mut().unwrap().qc = false;
                } else if size_j > size_i {
                    bucket[i].as_mut().unwrap().qc = false;
                } else {
                    bucket[i].as_mut().unwrap().qc = false;
                    bucket[j].as_mut().unwrap().qc = false;
                }
            }
        }
    };

    if cfg.threads <= 1 {
        for (key, bucket) in buckets.iter_mut() {
            dedup_one(key, bucket);
        }
    } else {
        use rayon::prelude::*;
        buckets
            .par_iter_mut()
            .for_each(|(key, bucket)| dedup_one(key, bucket));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Assignment {
    Straight,
    Swapped,
}

/// Side-assignment check for the inward/outward fusion predicate (spec
/// §4.4b, §9: use the merge predicate's corrected form -- a midpoint
/// proximity test against `outward_max`, not the tautological
/// `inward_outward_intersect?` comparison).
fn fusion_assignment(
    outward: &DiscordantPairCluster,
    inward: &DiscordantPairCluster,
    outward_max: i64,
) -> Option<Assignment> {
    let (m1o, m2o) = (outward.midpoint1(), outward.midpoint2());
    let (m1i, m2i) = (inward.midpoint1(), inward.midpoint2());

    let straight_ok = outward.o1 != inward.o1
        && outward.o2 != inward.o2
        && (m1o - m1i).abs() <= outward_max as f64
        && (m2o - m2i).abs() <= outward_max as f64;
    if straight_ok {
        return Some(Assignment::Straight);
    }

    let swapped_ok = outward.o1 != inward.o2
        && outward.o2 != inward.o1
        && (m1o - m2i).abs() <= outward_max as f64
        && (m2o - m1i).abs() <= outward_max as f64;
    if swapped_ok {
        return Some(Assignment::Swapped);
    }

    None
}

/// (b) Inward/outward fusion (spec §4.4b). Pairs a live outward-evidence
/// cluster with a live inward-evidence cluster describing the same joint,
/// unioning their evidence into one fused cluster; the partner is logically
/// deleted.
pub fn fuse_inward_outward(buckets: &mut Buckets, cfg: &CallConfig) {
    let inward_threshold = cfg.windows.inward_max as f64 * cfg.span;

    let fuse_one = |bucket: &mut Bucket| {
        let n = bucket.len();
        let mut consumed = vec![false; n];

        for i in 0..n {
            if consumed[i] {
                continue;
            }
            let (is_outward_i, seq_ok_i) = match &bucket[i] {
                Some(c) => (
                    c.qc && (c.size() as f64) > inward_threshold,
                    side_ranges_span_enough(c, cfg),
                ),
                None => continue,
            };
            if !is_outward_i || !seq_ok_i {
                continue;
            }

            let mut best: Option<(usize, Assignment)> = None;
            for j in 0..n {
                if i == j || consumed[j] {
                    continue;
                }
                let Some(candidate) = &bucket[j] else { continue };
                let is_inward = candidate.qc && (candidate.size() as f64) < inward_threshold;
                if !is_inward || !side_ranges_span_enough(candidate, cfg) {
                    continue;
                }
                let outward_ref = bucket[i].as_ref().unwrap();
                if let Some(assignment) =
                    fusion_assignment(outward_ref, candidate, cfg.windows.outward_max)
                {
                    best = Some((j, assignment));
                    break;
                }
            }

            let Some((j, assignment)) = best else { continue };

            let fused = {
                let outward = bucket[i].as_ref().unwrap();
                let inward = bucket[j].as_ref().unwrap();
                fuse_clusters(outward, inward, assignment)
            };

            let fused_ok = (fused.p1_max - fused.p1_min) as f64
                <= cfg.windows.outward_max as f64 * cfg.span
                && (fused.p2_max - fused.p2_min) as f64 <= cfg.windows.outward_max as f64 * cfg.span;

            if fused_ok {
                bucket[i] = Some(fused);
                bucket[j] = None;
                consumed[j] = true;
            }
        }
    };

    if cfg.threads <= 1 {
        for bucket in buckets.values_mut() {
            fuse_one(bucket);
        }
    } else {
        use rayon::prelude::*;
        buckets.par_iter_mut().for_each(|(_, bucket)| fuse_one(bucket));
    }
}

fn side_ranges_span_enough(c: &DiscordantPairCluster, cfg: &CallConfig) -> bool {
    let min_span = c.seq_length * cfg.min_cluster_count as i64;
    (c.p1_max - c.p1_min) >= min_span && (c.p2_max - c.p2_min) >= min_span
}

fn fuse_clusters(
    outward: &DiscordantPairCluster,
    inward: &DiscordantPairCluster,
    assignment: Assignment,
) -> DiscordantPairCluster {
    let (inward_p1_min, inward_p1_max, inward_p2_min, inward_p2_max) = match assignment {
        Assignment::Straight => (
            inward.p1_min,
            inward.p1_max,
            inward.p2_min,
            inward.p2_max,
        ),
        Assignment::Swapped => (
            inward.p2_min,
            inward.p2_max,
            inward.p1_min,
            inward.p1_max,
        ),
    };

    let mut fused = outward.clone();
    fused.p1_min = outward.p1_min.min(inward_p1_min);
    fused.p1_max = outward.p1_max.max(inward_p1_max);
    fused.p2_min = outward.p2_min.min(inward_p2_min);
    fused.p2_max = outward.p2_max.max(inward_p2_max);
    fused.read_ids.extend(inward.read_ids.iter().cloned());
    fused.fragments.extend(inward.fragments.iter().copied());
    fused.indels.extend(inward.indels.iter().copied());
    fused.count = outward.count + inward.count;
    fused.seq_length = outward.seq_length.min(inward.seq_length);
    fused.merge = true;

    // Outward evidence dominates when longer; the larger-size partner's
    // orientation and type tally otherwise win (spec §4.4b).
    if inward.size() > outward.size() {
        fused.o1 = inward.o1;
        fused.o2 = inward.o2;
        fused.type_tally = inward.type_tally.clone();
    }

    fused
}

/// (c) Inversion pairing (spec §4.4c): within each same-chromosome,
/// same-parity bucket, pairs opposite-orientation live INV clusters whose
/// side windows overlap within `outward_max`. Each cluster participates in
/// at most one pairing; positions are never mutated, only back-references
/// recorded.
///
/// Unlike the other two sweeps, this one is left single-threaded even under
/// `cfg.threads > 1`: each bucket is touched through one `get_mut` call at a
/// time, and the per-bucket work here is small relative to QC dedup and
/// fusion, so splitting it across `rayon` would add borrow-checker
/// complexity without a meaningful throughput gain.
pub fn pair_inversions(buckets: &mut Buckets, cfg: &CallConfig) {
    let inv_keys: Vec<ClusterKey> = buckets
        .keys()
        .filter(|k| k.is_same_chrom() && k.parity == crate::model::Parity::Same)
        .cloned()
        .collect();

    for key in inv_keys {
        let bucket = buckets.get_mut(&key).unwrap();
        let n = bucket.len();
        let mut consumed = vec![false; n];

        let live_inv: Vec<usize> = (0..n)
            .filter(|&i| {
                bucket[i]
                    .as_ref()
                    .is_some_and(|c| c.qc && c.dominant_type() == SvType::Inv)
            })
            .collect();

        for &i in &live_inv {
            if consumed[i] {
                continue;
            }
            for &j in &live_inv {
                if i == j || consumed[j] {
                    continue;
                }
                let (a, b) = (bucket[i].as_ref().unwrap(), bucket[j].as_ref().unwrap());
                if a.o1 == b.o1 {
                    // Same orientation: not an opposite-strand pair.
                    continue;
                }
                let m1a = a.midpoint1();
                let m2a = a.midpoint2();
                let m1b = b.midpoint1();
                let m2b = b.midpoint2();
                let within = ((m1a - m1b).abs() <= cfg.windows.outward_max as f64
                    && (m2a - m2b).abs() <= cfg.windows.outward_max as f64)
                    || ((m1a - m2b).abs() <= cfg.windows.outward_max as f64
                        && (m2a - m1b).abs() <= cfg.windows.outward_max as f64);
                if !within {
                    continue;
                }

                bucket[i].as_mut().unwrap().inv_merge = Some(ClusterRef {
                    key: key.clone(),
                    index: j,
                });
                bucket[j].as_mut().unwrap().inv_merge = Some(ClusterRef {
                    key: key.clone(),
                    index: i,
                });
                consumed[i] = true;
                consumed[j] = true;
                break;
            }
        }
    }
}

/// `++` or `--`: both halves of an INV cluster share orientation, so this
/// just exposes which one for the emitter.
pub fn is_plus_plus(c: &DiscordantPairCluster) -> bool {
    c.o1 == Orientation::Forward
}

/// Run all three sweeps in order (spec §4.4).
pub fn run(buckets: &mut Buckets, cfg: &CallConfig) {
    qc_dedup(buckets, cfg);
    fuse_inward_outward(buckets, cfg);
    pair_inversions(buckets, cfg);
}
