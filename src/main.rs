use std::{num::NonZeroUsize, path::PathBuf, thread::scope};

use clap::{AppSettings, Parser};
use crossbeam_channel::bounded;
use crossbeam_utils::atomic::AtomicCell;
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use itertools::Itertools;
use log::{debug, error, info, warn};

use tart_vis::{
    history::History,
    ingest,
    write::{write_payload, PayloadOptions},
    ArrayContext,
};

#[derive(Parser)]
#[clap(global_setting(AppSettings::DeriveDisplayOrder))]
#[clap(disable_help_subcommand = true)]
#[clap(infer_long_args = true)]
struct Args {
    /// The parsed telescope data to be assembled: raw-array dumps or API
    /// snapshots, as JSON.
    data: Vec<PathBuf>,

    /// Where the assembled synthesis payload gets written.
    #[clap(short, long)]
    output: PathBuf,

    /// Keep only every Nth frame of each input file.
    #[clap(short, long, default_value = "1")]
    stride: NonZeroUsize,

    /// Bake the per-antenna gains into the emitted records instead of
    /// forwarding them for the renderer to apply.
    #[clap(long)]
    calibrate: bool,

    /// Restrict the output to baselines between these antennas.
    #[clap(long, multiple_values(true))]
    antennas: Option<Vec<usize>>,

    /// The verbosity of the program. Increase by specifying multiple times
    /// (e.g. -vv). The default is to print only high-level information.
    #[clap(short, long, parse(from_occurrences))]
    verbosity: u8,

    /// Disable progress bars.
    #[clap(long)]
    no_progress_bars: bool,
}

fn main() {
    let mut args = Args::parse();
    args.data.sort_unstable();
    setup_logging(args.verbosity);

    if args.data.is_empty() {
        error!("No input files given");
        std::process::exit(1);
    }
    info!(
        "Assembling {} files: {}",
        args.data.len(),
        args.data.iter().map(|d| d.display().to_string()).join(", ")
    );

    let stride = args.stride.get();
    let (tx, rx) = bounded(5);
    let stop = AtomicCell::new(false);
    let multi_progress = MultiProgress::with_draw_target(if args.no_progress_bars {
        ProgressDrawTarget::hidden()
    } else {
        ProgressDrawTarget::stdout()
    });
    let decode_progress = multi_progress.add(
        ProgressBar::new(args.data.len() as _)
            .with_style(
                ProgressStyle::default_bar()
                    .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} files ({elapsed_precise}<{eta_precise})").unwrap()
                    .progress_chars("=> "),
            )
            .with_position(0)
            .with_message("Decoding"),
    );
    let merge_progress = multi_progress.add(
        ProgressBar::new(args.data.len() as _)
            .with_style(
                ProgressStyle::default_bar()
                    .template("{msg:17}: [{wide_bar:.blue}] {pos:2}/{len:2} files ({elapsed_precise}<{eta_precise})").unwrap()
                    .progress_chars("=> "),
            )
            .with_position(0)
            .with_message("Merging"),
    );
    decode_progress.tick();
    merge_progress.tick();

    let args = &args;
    let stop = &stop;
    let (history, context, totals) = scope(|s| {
        let decoder = s.spawn(move || {
            let mut failed = 0;
            for file in &args.data {
                // Cancellation point: nothing is decoded for a file once the
                // merge side has given up.
                if stop.load() {
                    debug!("Stopping before {}", file.display());
                    break;
                }
                debug!("Working on {}", file.display());

                match ingest::read_batch(file) {
                    Ok(reader) => {
                        debug!("{}: {:?}", file.display(), reader.input_type());
                        let (frames, skipped) = reader.read_frames(stride);
                        let context = reader.array_context().clone();
                        if tx.send((file.clone(), context, frames, skipped)).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        error!("Skipping {}: {err}", file.display());
                        failed += 1;
                    }
                }
                decode_progress.inc(1);
            }
            drop(tx);
            decode_progress.finish();
            failed
        });

        let merger = s.spawn(move || {
            let mut history = History::new();
            let mut context: Option<ArrayContext> = None;
            let mut totals = Totals::default();

            // Batches merge in decode-completion order; when near-duplicate
            // instants show up in two files, the first file through wins.
            for (file, file_context, frames, skipped) in rx.iter() {
                totals.skipped += skipped;
                match &context {
                    None => context = Some(file_context),
                    Some(c) if c.num_antennas != file_context.num_antennas => {
                        error!(
                            "{}: {} antennas, but this session has {}; aborting the import",
                            file.display(),
                            file_context.num_antennas,
                            c.num_antennas
                        );
                        stop.store(true);
                        break;
                    }
                    Some(_) => (),
                }

                let report = history.merge_batch(frames);
                debug!(
                    "{}: merged {}, dropped {} duplicates",
                    file.display(),
                    report.merged,
                    report.dropped
                );
                totals.merged += report.merged;
                totals.dropped += report.dropped;
                merge_progress.inc(1);
            }
            merge_progress.finish();
            (history, context, totals)
        });

        let failed = decoder.join().unwrap();
        let (history, context, mut totals) = merger.join().unwrap();
        totals.failed_files = failed;
        (history, context, totals)
    });

    info!(
        "Imported {} frames ({} skipped, {} dropped as duplicates, {} files failed)",
        totals.merged, totals.skipped, totals.dropped, totals.failed_files
    );

    let context = match context {
        Some(context) => context,
        None => {
            error!("No file yielded any data; nothing to write");
            std::process::exit(1);
        }
    };
    if args.calibrate && context.gains.is_none() {
        warn!("--calibrate requested, but no input supplied gains; records are emitted unchanged");
    }

    let options = PayloadOptions {
        calibrate: args.calibrate,
        antennas: args.antennas.clone(),
    };
    match write_payload(&args.output, &context, history.frames(), &options) {
        Ok(()) => info!("Wrote {} frames to {}", history.len(), args.output.display()),
        Err(err) => {
            error!("{err}");
            std::process::exit(1);
        }
    }
}

#[derive(Default)]
struct Totals {
    merged: usize,
    dropped: usize,
    skipped: usize,
    failed_files: usize,
}

fn setup_logging(verbosity: u8) {
    let mut builder = env_logger::Builder::from_default_env();
    builder.target(env_logger::Target::Stdout);
    builder.format_target(false);
    match verbosity {
        0 => builder.filter_level(log::LevelFilter::Info),
        1 => builder.filter_level(log::LevelFilter::Debug),
        _ => builder.filter_level(log::LevelFilter::Trace),
    };
    builder.init();
}
