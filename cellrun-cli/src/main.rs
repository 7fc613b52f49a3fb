// Copyright (c) 2025, Tom Ouellette
// Licensed under the BSD 3-Clause License

use clap::{Parser, Subcommand};
use cellrun_cli::{discover, manifest, prepare, run};

#[derive(Parser)]
#[command(version, about, long_about = None)]
#[command(arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    Run(run::RunArgs),
    Discover(discover::DiscoverArgs),
    Prepare(prepare::PrepareArgs),
    Manifest(manifest::ManifestArgs),
}

fn main() {
    let cli = Cli::parse();

    match &cli.command {
        Some(Commands::Run(run_args)) => run::run(run_args),
        Some(Commands::Discover(discover_args)) => discover::discover(discover_args),
        Some(Commands::Prepare(prepare_args)) => prepare::prepare(prepare_args),
        Some(Commands::Manifest(manifest_args)) => manifest::manifest(manifest_args),
        None => {}
    }
}
