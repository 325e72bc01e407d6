//! Code supporting the `matesv call` sub command (spec §6).

use std::io::BufRead;
use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, info, warn};

use crate::cluster::cluster_all;
use crate::common::io::open_read_maybe_gz;
use crate::config::{CallConfig, InsertWindows};
use crate::decode::decode_record;
use crate::emit::emit_events;
use crate::err::CallerError;
use crate::fragment_size::{infer_windows, Histogram};
use crate::mask::{Mask, RecordFilter};
use crate::model::AlignedRecord;
use crate::output::{annotation, bed, bedpe, histogram, links, svp};
use crate::postpass;

/// Command line arguments for the `matesv call` sub command.
///
/// `--auto` and the four explicit window bounds are mutually exclusive
/// (spec §6: "Auto-profile adds no required insert-window parameters ...
/// vs. the lite profile's required four integers").
#[derive(Parser, Debug)]
#[command(about = "Cluster discordant read pairs into structural-variant calls", long_about = None)]
pub struct Args {
    /// Path to the decoded alignment stream (tab-separated, see spec §6);
    /// `-` or omission reads from standard input.
    #[arg(long)]
    pub bam_file: Option<PathBuf>,

    /// Optional BED file of masked (excluded) genomic regions.
    #[arg(long)]
    pub mask_bed: Option<PathBuf>,

    /// Infer the insert-size windows automatically from the fragment-size
    /// histogram (spec §4.2).
    #[arg(long, group = "profile")]
    pub auto: bool,

    /// Lower bound (bp) of the inward (FR) insert-size window.
    #[arg(long, requires_all = ["inward_max", "outward_min", "outward_max"], group = "profile")]
    pub inward_min: Option<i64>,
    /// Upper bound (bp) of the inward (FR) insert-size window.
    #[arg(long)]
    pub inward_max: Option<i64>,
    /// Lower bound (bp) of the outward (RF) insert-size window.
    #[arg(long)]
    pub outward_min: Option<i64>,
    /// Upper bound (bp) of the outward (RF) insert-size window.
    #[arg(long)]
    pub outward_max: Option<i64>,

    /// Minimum number of fused pairs for a cluster to be reported live.
    #[arg(long, default_value_t = 2)]
    pub min_cluster_count: u32,

    /// Minimum mapping quality accepted by the record filter.
    #[arg(long, default_value_t = 0)]
    pub min_mapping_quality: i32,

    /// Require the `XT:A:U` unique-mapping tag.
    #[arg(long, default_value_t = false)]
    pub unique_mapping: bool,

    /// Name prefix used for emitted events.
    #[arg(long, default_value = "SV")]
    pub sv_name: String,

    /// Enable the QC de-duplication post-pass sweep (spec §4.4).
    #[arg(long, default_value_t = false)]
    pub qc_filter: bool,

    /// Reproduce the source's `addBP` min-collapse-to-max quirk instead of
    /// the corrected behavior (Design Notes §9). Default reproduces it.
    #[arg(long, default_value_t = false)]
    pub fix_addbp_min_bug: bool,

    /// Number of worker threads for independent-bucket parallelism (spec
    /// §5). `1` keeps the single-threaded baseline.
    #[arg(long, default_value_t = 1)]
    pub threads: usize,

    /// Path to write the SVP output (spec §6).
    #[arg(long)]
    pub out_svp: PathBuf,
    /// Path to write the BED output.
    #[arg(long)]
    pub out_bed: Option<PathBuf>,
    /// Path to write the BEDPE output.
    #[arg(long)]
    pub out_bedpe: Option<PathBuf>,
    /// Path to write the per-breakpoint annotation output.
    #[arg(long)]
    pub out_annotation: Option<PathBuf>,
    /// Path to write the visualization link output.
    #[arg(long)]
    pub out_links: Option<PathBuf>,
    /// Path to write the visualization tile output.
    #[arg(long)]
    pub out_tiles: Option<PathBuf>,
    /// Path to write the fragment-size histogram dump.
    #[arg(long)]
    pub out_histogram: Option<PathBuf>,
}

/// Read every decoded record from the alignment stream, reporting (but not
/// failing on) malformed lines (spec §4.6).
fn read_records(args: &Args) -> Result<Vec<AlignedRecord>, CallerError> {
    let reader: Box<dyn BufRead> = match &args.bam_file {
        Some(path) => {
            open_read_maybe_gz(path).map_err(|e| CallerError::AlignerIOError(e.to_string()))?
        }
        None => Box::new(std::io::BufReader::new(std::io::stdin())),
    };

    let mut records = Vec::new();
    let mut n_malformed = 0u64;
    for (lineno, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| CallerError::AlignerIOError(e.to_string()))?;
        if line.is_empty() {
            continue;
        }
        match decode_record(&line) {
            Ok(Some(record)) => records.push(record),
            Ok(None) => (),
            Err(e) => {
                n_malformed += 1;
                warn!("skipping malformed record at line {}: {}", lineno + 1, e);
            }
        }
    }
    if n_malformed > 0 {
        info!("skipped {} malformed record(s)", n_malformed);
    }
    Ok(records)
}

/// Build the insert-size windows, either directly from the explicit
/// four-integer "lite" profile or by inference from a fragment-size
/// histogram built over the filtered records (spec §4.2).
fn resolve_windows(
    args: &Args,
    filtered: &[AlignedRecord],
) -> Result<InsertWindows, CallerError> {
    if args.auto {
        let mut histogram = Histogram::new();
        for r in filtered {
            histogram.observe(r.abs_tlen());
        }
        let windows = infer_windows(&histogram)?;
        info!("inferred insert-size windows: {:?}", windows);
        Ok(windows)
    } else {
        let windows = InsertWindows {
            inward_min: args.inward_min.ok_or_else(|| {
                CallerError::ConfigError("--inward-min is required without --auto".to_string())
            })?,
            inward_max: args.inward_max.ok_or_else(|| {
                CallerError::ConfigError("--inward-max is required without --auto".to_string())
            })?,
            outward_min: args.outward_min.ok_or_else(|| {
                CallerError::ConfigError("--outward-min is required without --auto".to_string())
            })?,
            outward_max: args.outward_max.ok_or_else(|| {
                CallerError::ConfigError("--outward-max is required without --auto".to_string())
            })?,
        };
        if !windows.is_deconvolvable() {
            return Err(CallerError::NonDeconvolvableLibraryError(format!(
                "insert-size windows overlap or are out of order: {windows:?}"
            )));
        }
        Ok(windows)
    }
}

/// Main entry point for the `matesv call` command.
pub fn run(common_args: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    info!("Starting `matesv call`");
    debug!("  common_args = {:?}", &common_args);
    debug!("  args = {:?}", &args);

    crate::common::trace_rss_now();

    let mask = args
        .mask_bed
        .as_ref()
        .map(|path| Mask::load(path))
        .transpose()?;

    info!("Reading alignment records");
    let records = read_records(args)?;
    info!("Read {} alignment record(s)", records.len());

    // Insert-size windows need a preliminary config; the mapping-quality
    // and unique-mapping knobs already matter during this first pass, so
    // build a provisional config now (windows wide open -- concordance
    // isn't decidable yet) and reuse its fields for the preliminary
    // filter rather than refiltering on `args` directly.
    let mut provisional = CallConfig::new(InsertWindows {
        inward_min: 0,
        inward_max: i64::MAX,
        outward_min: 0,
        outward_max: i64::MAX,
    });
    provisional.min_mapping_quality = args.min_mapping_quality;
    provisional.unique_mapping = args.unique_mapping;
    let preliminary: Vec<AlignedRecord> = records
        .iter()
        .filter(|r| {
            r.mapq >= provisional.min_mapping_quality
                && (!provisional.unique_mapping || r.tags.contains("XT:A:U"))
                && !mask
                    .as_ref()
                    .is_some_and(|m| m.contains(&r.c1, r.p1) || m.contains(&r.c2, r.p2))
        })
        .cloned()
        .collect();

    let windows = resolve_windows(args, &preliminary)?;

    let mut cfg = CallConfig::new(windows);
    cfg.min_cluster_count = args.min_cluster_count;
    cfg.min_mapping_quality = args.min_mapping_quality;
    cfg.unique_mapping = args.unique_mapping;
    cfg.sv_name = args.sv_name.clone();
    cfg.qc_filter = args.qc_filter;
    cfg.fix_addbp_min_bug = args.fix_addbp_min_bug;
    cfg.threads = args.threads.max(1);

    if cfg.threads > 1 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cfg.threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("building global Rayon thread pool failed: {}", e))?;
    }

    info!("Filtering discordant pairs");
    let mut filter = RecordFilter::new();
    let discordant: Vec<AlignedRecord> = records
        .into_iter()
        .filter(|r| !filter.reject(r, mask.as_ref(), &cfg))
        .collect();
    info!("{} discordant pair(s) remain after filtering", discordant.len());

    info!("Clustering discordant pairs");
    let mut buckets = cluster_all(discordant.iter(), &cfg);

    info!("Running post-pass sweeps");
    postpass::run(&mut buckets, &cfg);

    crate::common::trace_rss_now();

    info!("Emitting events");
    let events = emit_events(&buckets, &cfg);
    info!("Emitted {} event(s)", events.len());

    let source_file = args
        .bam_file
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(|| "-".to_string());

    svp::write_svp(&args.out_svp, &events, &source_file)?;
    if let Some(path) = &args.out_bed {
        bed::write_bed(path, &events)?;
    }
    if let Some(path) = &args.out_bedpe {
        bedpe::write_bedpe(path, &events)?;
    }
    if let Some(path) = &args.out_annotation {
        annotation::write_annotation(path, &events)?;
    }
    if let Some(path) = &args.out_links {
        links::write_links(path, &events)?;
    }
    if let Some(path) = &args.out_tiles {
        links::write_tiles(path, &events)?;
    }
    if let Some(path) = &args.out_histogram {
        let mut hist = Histogram::new();
        for r in &discordant {
            hist.observe(r.abs_tlen());
        }
        histogram::write_histogram(path, &hist)?;
    }

    Ok(())
}
