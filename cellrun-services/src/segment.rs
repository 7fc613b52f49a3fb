// Copyright (c) 2025, Tom Ouellette
// Licensed under the MIT License

use std::path::PathBuf;
use std::process::Command;

#[cfg(unix)]
use std::os::unix::process::CommandExt;

use anyhow::{Context, Result};

use cellrun_core::im::LabelMask;
use cellrun_core::pl::{Segmentation, SegmentationError, SegmentationRequest, Segmenter};
use cellrun_core::ut::track::progress_log;

const STDERR_TAIL_LINES: usize = 20;

/// Segmentation through an external command
///
/// The command receives the configured arguments followed by
/// `--image <path> --nucleus <index> [--membrane <index>] [--use-wsi]
/// --output <mask path>` and must write a single-channel label image to
/// the output path.
///
/// On unix the command runs in its own process group, so a terminal
/// interrupt reaches only `cellrun` and the running dataset can finish.
#[derive(Debug, Clone)]
pub struct CommandSegmenter {
    program: String,
    args: Vec<String>,
    device: Option<String>,
    verbose: bool,
}

impl CommandSegmenter {
    pub fn new<S: Into<String>>(program: S) -> Self {
        CommandSegmenter {
            program: program.into(),
            args: Vec::new(),
            device: None,
            verbose: false,
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    /// Accelerator exposed to the command as `CUDA_VISIBLE_DEVICES`
    pub fn with_device(mut self, device: Option<String>) -> Self {
        self.device = device;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Scratch path the command writes its mask to
    pub fn scratch_path(request: &SegmentationRequest) -> PathBuf {
        request
            .scratch_dir
            .join(format!(".{}_cellsam.scratch.tiff", request.dataset_id))
    }

    /// Build the command line for one request
    pub fn command(&self, request: &SegmentationRequest) -> Command {
        let mut command = Command::new(&self.program);

        command
            .args(&self.args)
            .arg("--image")
            .arg(&request.image_path)
            .arg("--nucleus")
            .arg(request.nucleus.number.to_string());

        if let Some(membrane) = &request.membrane {
            command.arg("--membrane").arg(membrane.number.to_string());
        }

        if request.use_wsi {
            command.arg("--use-wsi");
        }

        command.arg("--output").arg(Self::scratch_path(request));

        if let Some(device) = &self.device {
            command.env("CUDA_VISIBLE_DEVICES", device);
        }

        #[cfg(unix)]
        command.process_group(0);

        command
    }

    fn execute(&self, request: &SegmentationRequest) -> Result<std::process::Output> {
        self.command(request)
            .output()
            .with_context(|| format!("Failed to start segmentation command {}", self.program))
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);

    lines[start..].join("\n")
}

impl Segmenter for CommandSegmenter {
    fn segment(&mut self, request: &SegmentationRequest) -> Result<Segmentation, SegmentationError> {
        let scratch = Self::scratch_path(request);

        progress_log(
            &format!("{} running {}", request.dataset_id, self.program),
            self.verbose,
        );

        let output = self
            .execute(request)
            .map_err(|err| SegmentationError::Command(format!("{:#}", err)))?;

        if !output.status.success() {
            let _ = std::fs::remove_file(&scratch);
            return Err(SegmentationError::Command(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr_tail(&output.stderr)
            )));
        }

        let mask = LabelMask::open(&scratch);
        let _ = std::fs::remove_file(&scratch);

        let mask = mask.map_err(|err| SegmentationError::Output(err.to_string()))?;

        Ok(Segmentation::from_mask(mask))
    }
}
