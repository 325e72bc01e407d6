//! Configuration record threaded by reference into every pipeline stage.
//!
//! Design Notes §9: "Expose as a configuration record passed to every
//! component; no process-wide mutable state."

use serde::{Deserialize, Serialize};

/// Minimum indel size (bp) for an emitted INS/DEL event to be reported
/// (spec §4.5, §8).
pub const WINDOW: i32 = 100;

/// Tolerance multiplier applied to `outward_max`/`inward_max` when gating
/// fused-cluster extents and "is this cluster large enough to be real"
/// checks (spec §3, §4.4).
pub const SPAN: f64 = 2.5;

/// Number of k-means clusters used by the fragment-size inferrer's
/// noise-floor estimation (spec §4.2).
pub const KMEANS_K: usize = 3;

/// Convergence threshold between successive k-means centroid shifts
/// (spec §4.2).
pub const KMEANS_DELTA: f64 = 0.001;

/// Width (bp) of one fragment-size histogram bin (spec §4.2: `bin =
/// floor(|tlen| / 100)`).
pub const HISTOGRAM_BIN_WIDTH: i64 = 100;

/// Maximum sigma multiplier tried while raising the noise cutoff
/// (spec §4.2 step 3).
pub const MAX_SIGMA: u32 = 3;

/// The two disjoint insert-size windows a mate-pair library is expected to
/// produce: "inward" (FR, standard paired-end) and "outward" (RF,
/// mate-pair/Nextera) fragment length ranges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertWindows {
    pub inward_min: i64,
    pub inward_max: i64,
    pub outward_min: i64,
    pub outward_max: i64,
}

impl InsertWindows {
    /// `true` if the two windows are disjoint and in the expected order
    /// (spec §4.2 step 6: "If the two resulting intervals overlap or are
    /// not discrete, fail").
    pub fn is_deconvolvable(&self) -> bool {
        self.inward_min <= self.inward_max
            && self.outward_min <= self.outward_max
            && self.inward_max < self.outward_min
    }
}

/// All tunables needed by the clustering/post-pass/emission stages, built
/// once from CLI args (or directly from four integers in the `lite`
/// profile) and passed by reference everywhere (spec §9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    pub windows: InsertWindows,

    /// Minimum number of fused pairs for a cluster to be considered live
    /// (spec §3 "A cluster is live iff ... count >= min_cluster_count").
    pub min_cluster_count: u32,

    /// Minimum mapping quality accepted by the mask filter (spec §4.1).
    pub min_mapping_quality: i32,

    /// Require the `XT:A:U` unique-mapping tag to be present (spec §4.1,
    /// §6).
    pub unique_mapping: bool,

    /// Annotation name prefix used when naming emitted events (spec §6,
    /// `sv_name`).
    pub sv_name: String,

    /// Whether the QC de-duplication sweep (post-pass §4.4a) runs.
    pub qc_filter: bool,

    /// Preserve the source's `addBP` min-collapse-to-max quirk
    /// byte-for-byte (Design Notes §9) rather than fixing it. Defaults to
    /// `false` (i.e. the quirk is reproduced, matching the default test
    /// expectations) -- set `true` to opt into the corrected behavior.
    pub fix_addbp_min_bug: bool,

    /// Minimal indel size for INS/DEL emission (spec §4.5).
    pub window: i32,

    /// Span tolerance multiplier (spec §3, §4.4).
    pub span: f64,

    /// Worker threads used for independent-bucket parallelism (spec §5,
    /// SPEC_FULL §5). `1` keeps the single-threaded baseline; buckets never
    /// interact, so raising this only affects throughput, never the
    /// resulting multiset of events.
    pub threads: usize,
}

impl CallConfig {
    pub fn new(windows: InsertWindows) -> Self {
        Self {
            windows,
            min_cluster_count: 2,
            min_mapping_quality: 0,
            unique_mapping: false,
            sv_name: "SV".to_string(),
            qc_filter: false,
            fix_addbp_min_bug: false,
            window: WINDOW,
            span: SPAN,
            threads: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn deconvolvable_windows_ok() {
        let w = InsertWindows {
            inward_min: 0,
            inward_max: 500,
            outward_min: 2000,
            outward_max: 5000,
        };
        assert!(w.is_deconvolvable());
    }

    #[test]
    fn overlapping_windows_not_deconvolvable() {
        let w = InsertWindows {
            inward_min: 0,
            inward_max: 2500,
            outward_min: 2000,
            outward_max: 5000,
        };
        assert!(!w.is_deconvolvable());
    }

    #[test]
    fn default_config_constants() {
        let cfg = CallConfig::new(InsertWindows {
            inward_min: 0,
            inward_max: 500,
            outward_min: 2000,
            outward_max: 5000,
        });
        assert_eq!(cfg.window, 100);
        assert_eq!(cfg.span, 2.5);
        assert_eq!(cfg.min_cluster_count, 2);
    }
}
