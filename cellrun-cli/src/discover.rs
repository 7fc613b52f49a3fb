// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use clap::Args;

use cellrun_core::ds::{Discovery, Manifest, Verdict, inspect};
use cellrun_core::ut::track::{progress_log, thousands_format};

#[derive(Debug, Args)]
#[command(about = "List discovered datasets and their guard verdict without processing them.")]
pub struct DiscoverArgs {
    #[arg(help = "Input root holding one directory per dataset.")]
    pub input_root: String,

    #[arg(short, long, help = "Only list datasets named in this transfer manifest.")]
    pub manifest: Option<String>,

    #[arg(short = 'v', long, help = "Verbose output.")]
    pub verbose: bool,
}

pub fn discover(args: &DiscoverArgs) {
    let only = args.manifest.as_ref().map(|path| {
        Manifest::open(path)
            .unwrap_or_else(|err| {
                eprintln!("[cellrun::discover] ERROR: {}", err);
                std::process::exit(1);
            })
            .dataset_ids()
    });

    let records = Discovery::new(&args.input_root, "")
        .iter()
        .unwrap_or_else(|err| {
            eprintln!("[cellrun::discover] ERROR: {}", err);
            std::process::exit(1);
        });

    let mut total = 0;

    for record in records {
        if only.as_ref().is_some_and(|ids| !ids.contains(&record.id)) {
            continue;
        }

        total += 1;

        match inspect(&record) {
            Verdict::Proceed(dataset) => println!(
                "{}\tPROCEED\tnucleus={}{}",
                record.id,
                dataset.nucleus.number,
                dataset
                    .membrane
                    .map(|m| format!(" membrane={}", m.number))
                    .unwrap_or_default()
            ),
            Verdict::Skip(reason) => println!("{}\tSKIP\t{}", record.id, reason),
            Verdict::Fail(err) => println!("{}\tFAIL\t{}", record.id, err),
        }
    }

    progress_log(
        &format!("Discovered {} datasets.", thousands_format(total)),
        args.verbose,
    );
}
