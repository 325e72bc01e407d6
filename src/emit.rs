//! Event classifier & emitter (spec §4.5): re-derives the dominant SV type
//! per live cluster, reorients coordinates to the inward (FR) convention,
//! computes the annotation size, and produces the event stream the output
//! serializers consume.

use std::collections::{HashMap, HashSet};

use crate::cluster::Buckets;
use crate::config::CallConfig;
use crate::model::{ClusterKey, DiscordantPairCluster, Orientation, SvType};

/// One emitted structural-variant call, already reoriented to the inward
/// convention and ready for the output serializers (spec §6).
#[derive(Debug, Clone, PartialEq)]
pub struct SvEvent {
    pub name: String,
    pub sv_type: SvType,
    pub chrom1: String,
    pub pos1: i64,
    pub o1: Orientation,
    pub chrom2: String,
    pub pos2: i64,
    pub o2: Orientation,
    pub size: i64,
    pub count: u32,
    pub merge: bool,
    /// Set for CTX half-records: the other chromosome/position of the
    /// cross-referenced mate (spec §4.5, §6: "CTX" annotation tag).
    pub ctx_mate: Option<(String, i64)>,
}

fn mean(values: &[i64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<i64>() as f64 / values.len() as f64
    }
}

struct NameCounter {
    prefix: String,
    counters: HashMap<SvType, u32>,
}

impl NameCounter {
    fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            counters: HashMap::new(),
        }
    }

    fn next(&mut self, ty: SvType) -> String {
        let n = self.counters.entry(ty).or_insert(0);
        *n += 1;
        format!("{}_{}_{}", self.prefix, ty, n)
    }
}

/// INV anchor: `+` uses the range minimum, `-` uses the range maximum
/// (spec §4.5 "INV, unpaired").
fn inv_anchor(o: Orientation, p_min: i64, p_max: i64) -> i64 {
    match o {
        Orientation::Forward => p_min,
        Orientation::Reverse => p_max,
    }
}

/// Run the event classifier over every live, not-yet-consumed cluster in
/// the post-passed bucket index, in deterministic bucket-key then
/// cluster-index order (so output ordering does not depend on hash
/// iteration order).
pub fn emit_events(buckets: &Buckets, cfg: &CallConfig) -> Vec<SvEvent> {
    let mut events = Vec::new();
    let mut consumed: HashSet<(ClusterKey, usize)> = HashSet::new();
    let mut names = NameCounter::new(&cfg.sv_name);

    let mut keys: Vec<&ClusterKey> = buckets.keys().collect();
    keys.sort();

    for key in keys {
        let bucket = &buckets[key];
        for (idx, slot) in bucket.iter().enumerate() {
            let Some(c) = slot else { continue };
            if consumed.contains(&(key.clone(), idx)) {
                continue;
            }
            if !c.is_live(cfg.windows.inward_max, cfg.span, cfg.min_cluster_count) {
                continue;
            }

            match c.dominant_type() {
                SvType::Ins | SvType::Del => {
                    if let Some(ev) = emit_indel(c, cfg, &mut names) {
                        events.push(ev);
                    }
                }
                SvType::Itx => {
                    if let Some(ev) = emit_itx(c, cfg, &mut names) {
                        events.push(ev);
                    }
                }
                SvType::Ctx => {
                    events.extend(emit_ctx(c, cfg, &mut names));
                }
                SvType::Inv => {
                    if let Some(inv_ref) = &c.inv_merge {
                        if consumed.contains(&(inv_ref.key.clone(), inv_ref.index)) {
                            continue;
                        }
                        let partner = buckets
                            .get(&inv_ref.key)
                            .and_then(|b| b.get(inv_ref.index))
                            .and_then(|s| s.as_ref());
                        if let Some(partner) = partner {
                            if let Some(ev) = emit_inv_paired(c, partner, cfg, &mut names) {
                                events.push(ev);
                                consumed.insert((inv_ref.key.clone(), inv_ref.index));
                                consumed.insert((key.clone(), idx));
                            }
                        }
                    } else if let Some(ev) = emit_inv_unpaired(c, cfg, &mut names) {
                        events.push(ev);
                    }
                }
                SvType::Unk => {}
            }
        }
    }

    events
}

/// INS/DEL (spec §4.5): orient so the smaller midpoint is `p1_max`, the
/// larger is `p2_min`; emit only if `p2_min > p1_max` and `sv_size >
/// window`.
fn emit_indel(c: &DiscordantPairCluster, cfg: &CallConfig, names: &mut NameCounter) -> Option<SvEvent> {
    let (mid_lo, mid_hi) = {
        let m1 = c.midpoint1();
        let m2 = c.midpoint2();
        if m1 <= m2 {
            (m1, m2)
        } else {
            (m2, m1)
        }
    };
    let p1_max = mid_lo.round() as i64;
    let p2_min = mid_hi.round() as i64;
    let sv_size = mean(&c.indels).round() as i64;

    if p2_min > p1_max && sv_size > cfg.window as i64 {
        let ty = c.dominant_type();
        Some(SvEvent {
            name: names.next(ty),
            sv_type: ty,
            chrom1: c.c1.clone(),
            pos1: p1_max,
            o1: c.o1.flipped(),
            chrom2: c.c2.clone(),
            pos2: p2_min,
            o2: c.o2.flipped(),
            size: sv_size,
            count: c.count,
            merge: c.merge,
            ctx_mate: None,
        })
    } else {
        None
    }
}

/// ITX (spec §4.5): size is the gap between the outer bounds on the
/// low-midpoint and high-midpoint sides; emit if positive.
fn emit_itx(c: &DiscordantPairCluster, _cfg: &CallConfig, names: &mut NameCounter) -> Option<SvEvent> {
    let low_is_side1 = c.midpoint1() <= c.midpoint2();
    let (low_min, _low_max) = if low_is_side1 {
        (c.p1_min, c.p1_max)
    } else {
        (c.p2_min, c.p2_max)
    };
    let (_high_min, high_max) = if low_is_side1 {
        (c.p2_min, c.p2_max)
    } else {
        (c.p1_min, c.p1_max)
    };
    let size = high_max - low_min;
    if size <= 0 {
        return None;
    }
    Some(SvEvent {
        name: names.next(SvType::Itx),
        sv_type: SvType::Itx,
        chrom1: c.c1.clone(),
        pos1: low_min,
        o1: c.o1.flipped(),
        chrom2: c.c2.clone(),
        pos2: high_max,
        o2: c.o2.flipped(),
        size,
        count: c.count,
        merge: c.merge,
        ctx_mate: None,
    })
}

/// CTX (spec §4.5): emit two paired records, one per chromosome, each
/// carrying the mate chromosome's coordinates.
fn emit_ctx(c: &DiscordantPairCluster, _cfg: &CallConfig, names: &mut NameCounter) -> Vec<SvEvent> {
    let pos1 = c.midpoint1().round() as i64;
    let pos2 = c.midpoint2().round() as i64;

    vec![
        SvEvent {
            name: names.next(SvType::Ctx),
            sv_type: SvType::Ctx,
            chrom1: c.c1.clone(),
            pos1,
            o1: c.o1.flipped(),
            chrom2: c.c1.clone(),
            pos2: pos1,
            o2: c.o1.flipped(),
            size: 0,
            count: c.count,
            merge: c.merge,
            ctx_mate: Some((c.c2.clone(), pos2)),
        },
        SvEvent {
            name: names.next(SvType::Ctx),
            sv_type: SvType::Ctx,
            chrom1: c.c2.clone(),
            pos1: pos2,
            o1: c.o2.flipped(),
            chrom2: c.c2.clone(),
            pos2,
            o2: c.o2.flipped(),
            size: 0,
            count: c.count,
            merge: c.merge,
            ctx_mate: Some((c.c1.clone(), pos1)),
        },
    ]
}

/// INV, unpaired (spec §4.5): anchor depends on `o1`/`o2`; size is the
/// distance between the two anchors.
fn emit_inv_unpaired(
    c: &DiscordantPairCluster,
    _cfg: &CallConfig,
    names: &mut NameCounter,
) -> Option<SvEvent> {
    let anchor1 = inv_anchor(c.o1, c.p1_min, c.p1_max);
    let anchor2 = inv_anchor(c.o2, c.p2_min, c.p2_max);
    let size = (anchor2 - anchor1).abs();
    Some(SvEvent {
        name: names.next(SvType::Inv),
        sv_type: SvType::Inv,
        chrom1: c.c1.clone(),
        pos1: anchor1,
        o1: c.o1.flipped(),
        chrom2: c.c2.clone(),
        pos2: anchor2,
        o2: c.o2.flipped(),
        size,
        count: c.count,
        merge: c.merge,
        ctx_mate: None,
    })
}

/// INV, paired (spec §4.5): sort the four endpoint anchors, requiring that
/// consecutive anchors alternate between source cluster and orientation
/// (spec §4.5, §8: "this is what a balanced inversion looks like"); emit
/// one composite record spanning the first and last anchor only if that
/// alternation holds.
fn emit_inv_paired(
    a: &DiscordantPairCluster,
    b: &DiscordantPairCluster,
    _cfg: &CallConfig,
    names: &mut NameCounter,
) -> Option<SvEvent> {
    // `source` marks which cluster an anchor came from (0 = `a`, 1 = `b`)
    // so alternation can be checked after sorting by position.
    let mut anchors = vec![
        (inv_anchor(a.o1, a.p1_min, a.p1_max), a.o1, 0u8),
        (inv_anchor(a.o2, a.p2_min, a.p2_max), a.o2, 0u8),
        (inv_anchor(b.o1, b.p1_min, b.p1_max), b.o1, 1u8),
        (inv_anchor(b.o2, b.p2_min, b.p2_max), b.o2, 1u8),
    ];
    anchors.sort_by_key(|(pos, _, _)| *pos);

    let alternates = anchors
        .windows(2)
        .all(|w| w[0].2 != w[1].2 && w[0].1 != w[1].1);
    if !alternates {
        return None;
    }

    let pos1 = anchors[0].0;
    let pos2 = anchors[3].0;
    let size = pos2 - pos1;

    Some(SvEvent {
        name: names.next(SvType::Inv),
        sv_type: SvType::Inv,
        chrom1: a.c1.clone(),
        pos1,
        o1: anchors[0].1.flipped(),
        chrom2: a.c2.clone(),
        pos2,
        o2: anchors[3].1.flipped(),
        size,
        count: a.count + b.count,
        merge: true,
        ctx_mate: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InsertWindows;
    use crate::model::{Parity, ReadPairId};
    use pretty_assertions::assert_eq;

    fn cfg() -> CallConfig {
        CallConfig::new(InsertWindows {
            inward_min: 0,
            inward_max: 500,
            outward_min: 2000,
            outward_max: 5000,
        })
    }

    fn del_cluster() -> DiscordantPairCluster {
        let mut type_tally = HashMap::new();
        type_tally.insert(SvType::Del, 10);
        DiscordantPairCluster {
            c1: "chr1".into(),
            c2: "chr1".into(),
            p1_min: 100000,
            p1_max: 101500,
            p2_min: 110000,
            p2_max: 111500,
            o1: Orientation::Reverse,
            o2: Orientation::Forward,
            read_ids: (0..10)
                .map(|i| ReadPairId::from(format!("r{i}").as_str()))
                .collect(),
            fragments: vec![10000; 10],
            indels: vec![5000; 10],
            count: 10,
            type_tally,
            merge: false,
            inv_merge: None,
            qc: true,
            seq_length: 1,
        }
    }

    #[test]
    fn del_scenario_emits_one_event() {
        let cfg = cfg();
        let mut buckets: Buckets = HashMap::new();
        let key = ClusterKey::new("chr1", "chr1", Parity::Diff);
        buckets.insert(key, vec![Some(del_cluster())]);

        let events = emit_events(&buckets, &cfg);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sv_type, SvType::Del);
        assert_eq!(events[0].size, 5000);
        assert_eq!(events[0].pos1, 100750);
        assert_eq!(events[0].pos2, 110750);
        // Orientation is inverted on emission.
        assert_eq!(events[0].o1, Orientation::Forward);
        assert_eq!(events[0].o2, Orientation::Reverse);
    }

    #[test]
    fn boundary_tlen_does_not_emit_unk_as_indel() {
        let cfg = cfg();
        let mut c = del_cluster();
        c.type_tally = HashMap::new();
        c.type_tally.insert(SvType::Unk, 10);
        let mut buckets: Buckets = HashMap::new();
        let key = ClusterKey::new("chr1", "chr1", Parity::Diff);
        buckets.insert(key, vec![Some(c)]);
        let events = emit_events(&buckets, &cfg);
        assert!(events.is_empty());
    }

    #[test]
    fn count_below_min_cluster_count_not_emitted() {
        let cfg = cfg();
        let mut c = del_cluster();
        c.count = 1;
        let mut buckets: Buckets = HashMap::new();
        let key = ClusterKey::new("chr1", "chr1", Parity::Diff);
        buckets.insert(key, vec![Some(c)]);
        let events = emit_events(&buckets, &cfg);
        assert!(events.is_empty());
    }

    #[test]
    fn ctx_emits_two_records() {
        let cfg = cfg();
        let mut type_tally = HashMap::new();
        type_tally.insert(SvType::Ctx, 5);
        let c = DiscordantPairCluster {
            c1: "chr1".into(),
            c2: "chr7".into(),
            p1_min: 1000,
            p1_max: 2500,
            p2_min: 2000,
            p2_max: 3500,
            o1: Orientation::Forward,
            o2: Orientation::Forward,
            read_ids: (0..5)
                .map(|i| ReadPairId::from(format!("r{i}").as_str()))
                .collect(),
            fragments: vec![],
            indels: vec![],
            count: 5,
            type_tally,
            merge: false,
            inv_merge: None,
            qc: true,
            seq_length: 1,
        };
        let mut buckets: Buckets = HashMap::new();
        let key = ClusterKey::new("chr1", "chr7", Parity::Same);
        buckets.insert(key, vec![Some(c)]);
        let events = emit_events(&buckets, &cfg);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].chrom1, "chr1");
        assert_eq!(events[1].chrom1, "chr7");
        assert!(events[0].ctx_mate.is_some());
    }

    fn inv_cluster(
        p1: (i64, i64),
        p2: (i64, i64),
        o: Orientation,
        inv_merge: Option<crate::model::ClusterRef>,
    ) -> DiscordantPairCluster {
        let mut type_tally = HashMap::new();
        type_tally.insert(SvType::Inv, 5);
        DiscordantPairCluster {
            c1: "chr1".into(),
            c2: "chr1".into(),
            p1_min: p1.0,
            p1_max: p1.1,
            p2_min: p2.0,
            p2_max: p2.1,
            o1: o,
            o2: o,
            read_ids: (0..5)
                .map(|i| ReadPairId::from(format!("r{i}").as_str()))
                .collect(),
            fragments: vec![],
            indels: vec![],
            count: 5,
            type_tally,
            merge: false,
            inv_merge,
            qc: true,
            seq_length: 1,
        }
    }

    #[test]
    fn alternating_inv_pairing_emits_one_composite_event() {
        let cfg = cfg();
        let key = ClusterKey::new("chr1", "chr1", Parity::Same);
        let a = inv_cluster(
            (996000, 1004000),
            (1046000, 1054000),
            Orientation::Forward,
            Some(crate::model::ClusterRef {
                key: key.clone(),
                index: 1,
            }),
        );
        let b = inv_cluster(
            (996100, 1004100),
            (1046100, 1054100),
            Orientation::Reverse,
            Some(crate::model::ClusterRef {
                key: key.clone(),
                index: 0,
            }),
        );
        let mut buckets: Buckets = HashMap::new();
        buckets.insert(key, vec![Some(a), Some(b)]);

        let events = emit_events(&buckets, &cfg);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].sv_type, SvType::Inv);
        assert_eq!(events[0].count, 10);
    }

    #[test]
    fn non_alternating_inv_pairing_emits_nothing() {
        let cfg = cfg();
        let key = ClusterKey::new("chr1", "chr1", Parity::Same);
        // Both of `a`'s anchors sort below both of `b`'s: a, a, b, b -- not
        // an alternating (balanced) pattern.
        let a = inv_cluster(
            (995000, 996000),
            (996500, 997000),
            Orientation::Forward,
            Some(crate::model::ClusterRef {
                key: key.clone(),
                index: 1,
            }),
        );
        let b = inv_cluster(
            (2000000, 2000100),
            (2000200, 2000300),
            Orientation::Reverse,
            Some(crate::model::ClusterRef {
                key: key.clone(),
                index: 0,
            }),
        );
        let mut buckets: Buckets = HashMap::new();
        buckets.insert(key, vec![Some(a), Some(b)]);

        let events = emit_events(&buckets, &cfg);
        assert!(events.is_empty());
    }
}
