// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use clap::Args;

use cellrun_core::ds::Manifest;
use cellrun_core::ut::track::progress_log;

#[derive(Debug, Args)]
#[command(about = "Validate a transfer manifest and list the datasets it names.")]
pub struct ManifestArgs {
    #[arg(help = "Manifest file with one `<dataset id> /<path>` entry per line.")]
    pub manifest: String,

    #[arg(short = 'v', long, help = "Verbose output.")]
    pub verbose: bool,
}

pub fn manifest(args: &ManifestArgs) {
    let manifest = Manifest::open(&args.manifest).unwrap_or_else(|err| {
        eprintln!("[cellrun::manifest] ERROR: {}", err);
        std::process::exit(1);
    });

    let ids = manifest.dataset_ids();

    for id in ids.iter() {
        println!("{}", id);
    }

    progress_log(
        &format!(
            "Manifest is valid: {} entries across {} datasets.",
            manifest.len(),
            ids.len()
        ),
        args.verbose,
    );
}
