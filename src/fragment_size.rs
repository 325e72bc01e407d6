//! Fragment-size inferrer (spec §4.2): discovers the inward and outward
//! insert-size windows from a noisy histogram of `|tlen|` values via a
//! k-means + noise-threshold procedure. Skipped entirely in the `lite`
//! profile, where the caller supplies the four bounds directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::{InsertWindows, HISTOGRAM_BIN_WIDTH, KMEANS_DELTA, KMEANS_K, MAX_SIGMA};
use crate::err::CallerError;

/// A coarse histogram of absolute template lengths, keyed by
/// `floor(|tlen| / 100)`.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct Histogram {
    bins: BTreeMap<i64, u64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, abs_tlen: i64) {
        let bin = abs_tlen / HISTOGRAM_BIN_WIDTH;
        *self.bins.entry(bin).or_insert(0) += 1;
    }

    /// `(bin*100, count)` pairs in bin order, for the histogram-dump output
    /// (spec §6).
    pub fn dump_pairs(&self) -> Vec<(i64, u64)> {
        self.bins
            .iter()
            .map(|(bin, count)| (bin * HISTOGRAM_BIN_WIDTH, *count))
            .collect()
    }

    fn peak(&self) -> Option<(i64, u64)> {
        self.bins.iter().max_by_key(|(_, c)| **c).map(|(b, c)| (*b, *c))
    }
}

/// A profile of the two inferred (or supplied) insert-size windows, plus
/// the histogram they were derived from, serialized for the histogram-dump
/// output artifact (spec §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryProfile {
    pub windows: InsertWindows,
    pub histogram: Histogram,
}

/// Run 1-D k-means with `k` clusters over `values` until successive
/// centroid shifts fall below `delta`. Centroids are seeded from evenly
/// spaced order statistics so the result is deterministic.
fn kmeans(values: &[f64], k: usize, delta: f64) -> Vec<f64> {
    assert!(!values.is_empty());
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());

    let mut centroids: Vec<f64> = (0..k)
        .map(|i| {
            let idx = if k == 1 {
                0
            } else {
                i * (sorted.len() - 1) / (k - 1)
            };
            sorted[idx]
        })
        .collect();

    loop {
        let mut sums = vec![0.0; k];
        let mut counts = vec![0u64; k];
        for &v in values {
            let mut best = 0;
            let mut best_dist = f64::MAX;
            for (i, c) in centroids.iter().enumerate() {
                let d = (v - c).abs();
                if d < best_dist {
                    best_dist = d;
                    best = i;
                }
            }
            sums[best] += v;
            counts[best] += 1;
        }
        let mut new_centroids = centroids.clone();
        for i in 0..k {
            if counts[i] > 0 {
                new_centroids[i] = sums[i] / counts[i] as f64;
            }
        }
        let shift: f64 = centroids
            .iter()
            .zip(new_centroids.iter())
            .map(|(a, b)| (a - b).abs())
            .sum();
        centroids = new_centroids;
        if shift < delta {
            break;
        }
    }
    centroids
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn stddev(values: &[f64], mean_val: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let var = values.iter().map(|v| (v - mean_val).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

/// Find the noise-floor cluster's mean/stddev over the histogram's distinct
/// bin-count values via k-means (spec §4.2 step 1).
fn noise_stats(histogram: &Histogram) -> (f64, f64) {
    let distinct: Vec<f64> = {
        let mut set: Vec<u64> = histogram.bins.values().copied().collect();
        set.sort_unstable();
        set.dedup();
        set.into_iter().map(|v| v as f64).collect()
    };
    let centroids = kmeans(&distinct, KMEANS_K.min(distinct.len().max(1)), KMEANS_DELTA);
    let noise_mean = centroids.iter().cloned().fold(f64::MAX, f64::min);

    // Recompute stddev from the values actually assigned to the noise
    // centroid (closest to `noise_mean`).
    let noise_values: Vec<f64> = distinct
        .iter()
        .copied()
        .filter(|v| {
            let dist_to_noise = (v - noise_mean).abs();
            centroids
                .iter()
                .all(|c| (v - c).abs() >= dist_to_noise)
        })
        .collect();
    let noise_values = if noise_values.is_empty() {
        distinct.clone()
    } else {
        noise_values
    };
    (noise_mean, stddev(&noise_values, noise_mean))
}

/// Walk outward from `center` bin, widening the interval one bin at a time
/// on each side while both boundary bins stay `>= cutoff` (spec §4.2 step
/// 4: "widest contiguous interval around peak in which all bins are >=
/// cutoff").
fn widen_interval(histogram: &Histogram, center: i64, cutoff: f64) -> (i64, i64) {
    let at = |bin: i64| -> f64 { *histogram.bins.get(&bin).unwrap_or(&0) as f64 };
    let mut lo = center;
    let mut hi = center;
    loop {
        let mut grew = false;
        if at(lo - 1) >= cutoff {
            lo -= 1;
            grew = true;
        }
        if at(hi + 1) >= cutoff {
            hi += 1;
            grew = true;
        }
        if !grew {
            break;
        }
    }
    (lo, hi)
}

fn without_interval(histogram: &Histogram, lo: i64, hi: i64) -> Histogram {
    let mut out = histogram.clone();
    out.bins.retain(|bin, _| *bin < lo || *bin > hi);
    out
}

/// Infer the inward/outward insert-size windows from the supplied
/// histogram (spec §4.2).
pub fn infer_windows(histogram: &Histogram) -> Result<InsertWindows, CallerError> {
    if histogram.bins.is_empty() {
        return Err(CallerError::PoorLibraryError(
            "empty fragment-size histogram".to_string(),
        ));
    }

    let (noise_mean, noise_std) = noise_stats(histogram);

    let (peak1, sigma_used) = {
        let mut sigma = 0u32;
        loop {
            let cutoff = noise_mean + sigma as f64 * noise_std;
            let (peak_bin, peak_count) = histogram.peak().expect("non-empty histogram");
            if peak_count as f64 >= cutoff {
                break (peak_bin, sigma);
            }
            sigma += 1;
            if sigma > MAX_SIGMA {
                return Err(CallerError::PoorLibraryError(format!(
                    "no peak above noise cutoff at sigma <= {MAX_SIGMA}"
                )));
            }
        }
    };
    let cutoff = noise_mean + sigma_used as f64 * noise_std;

    let (lo1, hi1) = widen_interval(histogram, peak1, cutoff);
    let remainder = without_interval(histogram, lo1, hi1);
    let (lo2, hi2) = match remainder.peak() {
        Some((peak2, _)) => widen_interval(&remainder, peak2, cutoff),
        None => {
            return Err(CallerError::PoorLibraryError(
                "only one insert-size population found in histogram".to_string(),
            ))
        }
    };

    // The smaller-mean interval is always inward (spec §4.2 step 6).
    let (mut inward, mut outward) = if lo1 <= lo2 {
        ((lo1, hi1), (lo2, hi2))
    } else {
        ((lo2, hi2), (lo1, hi1))
    };

    if inward.1 > outward.0 {
        return Err(CallerError::NonDeconvolvableLibraryError(format!(
            "inferred windows overlap: inward=[{},{}] outward=[{},{}]",
            inward.0, inward.1, outward.0, outward.1
        )));
    }

    // Expand each bound by one bin on each side, then scale to bp (spec
    // §4.2 step 7).
    inward = (inward.0 - 1, inward.1 + 1);
    outward = (outward.0 - 1, outward.1 + 1);

    let windows = InsertWindows {
        inward_min: (inward.0 * HISTOGRAM_BIN_WIDTH).max(0),
        inward_max: inward.1 * HISTOGRAM_BIN_WIDTH,
        outward_min: outward.0 * HISTOGRAM_BIN_WIDTH,
        outward_max: outward.1 * HISTOGRAM_BIN_WIDTH,
    };

    if !windows.is_deconvolvable() {
        return Err(CallerError::NonDeconvolvableLibraryError(format!(
            "inferred windows not discrete: {windows:?}"
        )));
    }

    Ok(windows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    #[test]
    fn noise_stats_mean_is_near_the_flat_floor() {
        let mut h = Histogram::new();
        for bin in 0..20 {
            h.observe(bin * HISTOGRAM_BIN_WIDTH);
            h.observe(bin * HISTOGRAM_BIN_WIDTH);
        }
        let (noise_mean, noise_std) = noise_stats(&h);
        assert!(approx_eq!(f64, noise_mean, 1.0, epsilon = 0.001));
        assert!(approx_eq!(f64, noise_std, 0.0, epsilon = 0.001));
    }

    fn synthetic_histogram() -> Histogram {
        let mut h = Histogram::new();
        // Low-level noise everywhere.
        for bin in 0..60 {
            for _ in 0..2 {
                h.observe(bin * HISTOGRAM_BIN_WIDTH);
            }
        }
        // Inward peak around bin 3-4 (300-500bp).
        for _ in 0..200 {
            h.observe(3 * HISTOGRAM_BIN_WIDTH + 50);
            h.observe(4 * HISTOGRAM_BIN_WIDTH + 50);
        }
        // Outward peak around bin 30-40 (3000-4000bp).
        for bin in 30..41 {
            for _ in 0..150 {
                h.observe(bin * HISTOGRAM_BIN_WIDTH + 50);
            }
        }
        h
    }

    #[test]
    fn infers_two_disjoint_windows() {
        let h = synthetic_histogram();
        let windows = infer_windows(&h).expect("should deconvolve");
        assert!(windows.is_deconvolvable());
        assert!(windows.inward_max < windows.outward_min);
    }

    #[test]
    fn empty_histogram_is_poor_library() {
        let h = Histogram::new();
        let err = infer_windows(&h).unwrap_err();
        assert!(matches!(err, CallerError::PoorLibraryError(_)));
    }

    #[test]
    fn kmeans_converges_on_two_tight_groups() {
        let values = vec![1.0, 1.1, 0.9, 50.0, 51.0, 49.0, 100.0];
        let centroids = kmeans(&values, 3, KMEANS_DELTA);
        assert_eq!(centroids.len(), 3);
    }

    #[test]
    fn histogram_dump_pairs_scaled_by_bin_width() {
        let mut h = Histogram::new();
        h.observe(250);
        let pairs = h.dump_pairs();
        assert_eq!(pairs, vec![(200, 1)]);
    }
}
