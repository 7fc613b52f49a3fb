// Copyright (c) 2025-2026, Tom Ouellette
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// A copy of the License has been included in the root of the repository.

use anyhow::{Context, Result, anyhow};

use cellrun_core::constant::{ENV_ACCESS_TOKEN, ENV_DEVICE, ENV_WORKER};
use cellrun_core::ds::Partition;
use cellrun_core::pl::AuthToken;

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Annotation service credential from `DEEPCELL_ACCESS_TOKEN`
pub fn access_token() -> Result<AuthToken> {
    non_empty_var(ENV_ACCESS_TOKEN)
        .map(AuthToken::new)
        .ok_or_else(|| anyhow!("{} is not set. Export your DeepCell access token and try again.", ENV_ACCESS_TOKEN))
}

/// Worker partition from `CELLRUN_WORKER`, a single worker when unset
pub fn worker_partition() -> Result<Partition> {
    parse_partition(non_empty_var(ENV_WORKER).as_deref())
}

pub fn parse_partition(selector: Option<&str>) -> Result<Partition> {
    match selector {
        Some(selector) => selector
            .parse::<Partition>()
            .with_context(|| format!("Invalid {} value", ENV_WORKER)),
        None => Ok(Partition::default()),
    }
}

/// Accelerator id from `CELLRUN_DEVICE`
pub fn device() -> Option<String> {
    non_empty_var(ENV_DEVICE)
}

pub mod request;
pub mod segment;

pub use request::HttpAnnotator;
pub use segment::CommandSegmenter;

#[cfg(test)]
mod test {

    use super::*;

    #[test]
    fn test_parse_partition() {
        assert_eq!(parse_partition(None).unwrap(), Partition::default());
        assert_eq!(
            parse_partition(Some("1/4")).unwrap(),
            Partition::new(1, 4).unwrap()
        );
        assert!(parse_partition(Some("4/4")).is_err());
        assert!(parse_partition(Some("gpu0")).is_err());
    }
}
