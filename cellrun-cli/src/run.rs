// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use colored::Colorize;

use cellrun_core::constant::{
    DEFAULT_ANNOTATION_MODEL, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_INITIAL_BACKOFF_MS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_BACKOFF_MS,
};
use cellrun_core::ds::Manifest;
use cellrun_core::pl::{Driver, Halt, RetryPolicy, RunConfig, RunReport, StopSignal, TerminalState};
use cellrun_core::ut::track::{progress_log, progress_warn};
use cellrun_services::{CommandSegmenter, HttpAnnotator};

/// Every processed dataset is COMPLETE or SKIPPED
pub const EXIT_OK: i32 = 0;
/// A precondition failed or an authentication failure aborted the run
pub const EXIT_ABORTED: i32 = 1;
/// Some datasets failed, or an interrupt left datasets unprocessed
pub const EXIT_PARTIAL: i32 = 2;

#[derive(Debug, Args)]
#[command(about = "Segment and annotate every dataset beneath an input root.")]
pub struct RunArgs {
    #[arg(help = "Input root holding one directory per dataset.")]
    pub input_root: String,

    #[arg(help = "Output root; results are written to <output_root>/<dataset_id>/.")]
    pub output_root: String,

    #[arg(long, help = "Base URL of the DeepCell Types annotation service.", required = true)]
    pub annotation_url: String,

    #[arg(long, help = "Annotation model name.", default_value = DEFAULT_ANNOTATION_MODEL)]
    pub model: String,

    #[arg(
        long,
        help = "Segmentation command receiving --image/--nucleus/--membrane/--use-wsi/--output.",
        default_value = "cellsam-segment"
    )]
    pub segment_command: String,

    #[arg(
        long = "segment-arg",
        help = "Extra argument passed to the segmentation command (repeatable).",
        allow_hyphen_values = true
    )]
    pub segment_args: Vec<String>,

    #[arg(long, help = "Maximum annotation attempts per dataset.", default_value_t = DEFAULT_MAX_ATTEMPTS)]
    pub max_attempts: u32,

    #[arg(long, help = "Initial retry backoff in milliseconds.", default_value_t = DEFAULT_INITIAL_BACKOFF_MS)]
    pub backoff_ms: u64,

    #[arg(long, help = "Maximum retry backoff in milliseconds.", default_value_t = DEFAULT_MAX_BACKOFF_MS)]
    pub max_backoff_ms: u64,

    #[arg(long, help = "Annotation request timeout in seconds.", default_value_t = 300)]
    pub timeout_secs: u64,

    #[arg(short, long, help = "Only process datasets listed in this transfer manifest.")]
    pub manifest: Option<String>,

    #[arg(short = 'v', long, help = "Verbose output.")]
    pub verbose: bool,
}

fn abort(message: &str) -> ! {
    eprintln!("[cellrun::run] ERROR: {}", message);
    std::process::exit(EXIT_ABORTED);
}

/// Exit status for a finished run
pub fn exit_code(report: &RunReport) -> i32 {
    if report.is_auth_halt() {
        EXIT_ABORTED
    } else if report.failed() > 0 || matches!(report.halted, Some(Halt::Stopped)) {
        EXIT_PARTIAL
    } else {
        EXIT_OK
    }
}

/// Stop the driver between datasets on the first interrupt, exit on the second
fn install_stop_handler(stop: StopSignal) {
    std::thread::spawn(move || {
        let Ok(runtime) = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        else {
            return;
        };

        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }

            progress_warn("Interrupt received; finishing the current dataset before stopping");
            stop.stop();

            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("[cellrun::run] ERROR: Interrupted twice, exiting immediately.");
                std::process::exit(130);
            }
        });
    });
}

fn print_report(report: &RunReport) {
    println!();
    println!("{}", "Run report".bold());

    for line in report.lines().iter().take(2) {
        println!("  {}", line);
    }

    for dataset in report.incomplete() {
        let state = match dataset.state {
            TerminalState::Skipped => dataset.state.to_string().yellow(),
            _ => dataset.state.to_string().red(),
        };

        println!(
            "  {} {}: {}",
            state.bold(),
            dataset.dataset_id,
            dataset.reason().unwrap_or("")
        );
    }

    for line in report.lines().iter().skip(2 + report.incomplete().count()) {
        println!("  {}", line.red());
    }
}

pub fn run(args: &RunArgs) {
    let token = cellrun_services::access_token().unwrap_or_else(|err| abort(&format!("{:#}", err)));
    let partition =
        cellrun_services::worker_partition().unwrap_or_else(|err| abort(&format!("{:#}", err)));

    let only = args.manifest.as_ref().map(|path| {
        Manifest::open(path)
            .unwrap_or_else(|err| abort(&err.to_string()))
            .dataset_ids()
    });

    if args.max_attempts < 1 {
        abort("--max-attempts must be at least 1.");
    }

    let annotator = HttpAnnotator::new(
        &args.annotation_url,
        &args.model,
        Duration::from_secs(args.timeout_secs),
    )
    .unwrap_or_else(|err| abort(&format!("{:#}", err)));

    let segmenter = CommandSegmenter::new(&args.segment_command)
        .with_args(args.segment_args.clone())
        .with_device(cellrun_services::device())
        .with_verbose(args.verbose);

    let config = RunConfig {
        input_root: PathBuf::from(&args.input_root),
        output_root: PathBuf::from(&args.output_root),
        token,
        retry: RetryPolicy {
            max_attempts: args.max_attempts,
            initial_backoff: Duration::from_millis(args.backoff_ms),
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_backoff: Duration::from_millis(args.max_backoff_ms),
        },
        partition,
        only,
        verbose: args.verbose,
    };

    let mut driver = Driver::new(config, segmenter, annotator);
    install_stop_handler(driver.stop_signal());

    let report = driver.run().unwrap_or_else(|err| abort(&err.to_string()));

    progress_log(
        &format!(
            "Complete. Report written to {}",
            PathBuf::from(&args.output_root)
                .join(partition.report_name())
                .display()
        ),
        args.verbose,
    );

    print_report(&report);

    std::process::exit(exit_code(&report));
}
