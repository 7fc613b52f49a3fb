#![allow(clippy::all)]
use clap::{Parser, Subcommand};
use clap_markdown;

use cellrun_cli::{discover, manifest, prepare, run};

#[derive(Parser)]
#[command(version, about, long_about = None)]
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
    clap_markdown::print_help_markdown::<Cli>();
}
