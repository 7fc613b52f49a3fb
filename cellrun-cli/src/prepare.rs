// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::Path;

use clap::Args;
use colored::Colorize;

use cellrun_core::ds::prepare::prepare_root;
use cellrun_core::ut::track::{progress_log, thousands_format};

#[derive(Debug, Args)]
#[command(about = "Build dataset directories and configurations from raw HuBMAP CODEX downloads.")]
pub struct PrepareArgs {
    #[arg(help = "Directory of raw `<HuBMAP id>-<suffix>` dataset downloads.")]
    pub raw_root: String,

    #[arg(help = "Input root to create; one directory per dataset is written here.")]
    pub input_root: String,

    #[arg(short = 'v', long, help = "Verbose output.")]
    pub verbose: bool,
}

pub fn prepare(args: &PrepareArgs) {
    let raw_root = Path::new(&args.raw_root);
    let input_root = Path::new(&args.input_root);

    if !raw_root.is_dir() {
        eprintln!(
            "[cellrun::prepare] ERROR: Raw root {} does not exist or is not a directory.",
            raw_root.display()
        );
        std::process::exit(1);
    }

    if let Err(err) = std::fs::create_dir_all(input_root) {
        eprintln!(
            "[cellrun::prepare] ERROR: Input root {} could not be created. {}",
            input_root.display(),
            err
        );
        std::process::exit(1);
    }

    let report = prepare_root(raw_root, input_root, args.verbose).unwrap_or_else(|err| {
        eprintln!("{}", err);
        std::process::exit(1);
    });

    for (id, err) in report.errors.iter() {
        eprintln!("  {} {}: {}", "ERROR".red().bold(), id, err);
    }

    let message = if !report.errors.is_empty() {
        format!(
            "Complete. {} datasets prepared successfully. {} datasets failed.",
            thousands_format(report.prepared.len()),
            thousands_format(report.errors.len())
        )
    } else {
        format!(
            "Complete. {} datasets prepared successfully.",
            thousands_format(report.prepared.len())
        )
    };

    progress_log(&message, args.verbose);

    if !report.ignored.is_empty() {
        progress_log(
            &format!(
                "{} directories had no pipelineConfig.json or expression image and were ignored.",
                thousands_format(report.ignored.len())
            ),
            args.verbose,
        );
    }

    if !report.errors.is_empty() {
        std::process::exit(2);
    }
}
