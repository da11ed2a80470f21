// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command-line flags and how they override the configuration file.

use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};
use satzwerk_core::config::{OutputFormat, WorkerCount};
use satzwerk_core::{PipelineConfig, Result};

/// Convert scanned pages into a structured document.
#[derive(Debug, Parser)]
#[command(name = "satzwerk", version, about)]
pub struct Args {
    /// YAML configuration file. Missing keys take their defaults.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory holding the numbered page inputs.
    #[arg(short, long)]
    pub input_dir: Option<PathBuf>,

    /// Output document path.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format. Inferred from the output extension when omitted.
    #[arg(short, long, value_enum)]
    pub format: Option<FormatArg>,

    /// Page workers: `auto` or a positive number.
    #[arg(short, long, value_parser = parse_workers)]
    pub workers: Option<WorkerCount>,

    /// Write the JSON failure report here.
    #[arg(short, long)]
    pub report: Option<PathBuf>,
}

/// Values accepted by `--format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FormatArg {
    Pdf,
    Odt,
    Txt,
    Tsv,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Pdf => Self::Pdf,
            FormatArg::Odt => Self::Odt,
            FormatArg::Txt => Self::Txt,
            FormatArg::Tsv => Self::Tsv,
            FormatArg::Json => Self::Json,
        }
    }
}

fn parse_workers(value: &str) -> std::result::Result<WorkerCount, String> {
    if value.eq_ignore_ascii_case("auto") {
        return Ok(WorkerCount::Auto);
    }
    match value.parse::<usize>() {
        Ok(0) => Err("workers must be at least 1".into()),
        Ok(n) => Ok(WorkerCount::Fixed(n)),
        Err(_) => Err(format!("expected `auto` or a number, got `{value}`")),
    }
}

fn format_from_extension(path: &Path) -> Option<OutputFormat> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "pdf" => Some(OutputFormat::Pdf),
        "odt" => Some(OutputFormat::Odt),
        "txt" | "text" => Some(OutputFormat::Txt),
        "tsv" => Some(OutputFormat::Tsv),
        "json" => Some(OutputFormat::Json),
        _ => None,
    }
}

impl Args {
    /// Load the configuration file (or defaults) and apply the flags on top.
    pub fn resolve_config(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path)?,
            None => PipelineConfig::default(),
        };
        self.apply(&mut config);
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(dir) = &self.input_dir {
            config.input.dir = dir.clone();
        }
        if let Some(output) = &self.output {
            config.output.file = output.clone();
            if let Some(format) = format_from_extension(output) {
                config.output.format = format;
            }
        }
        if let Some(format) = self.format {
            config.output.format = format.into();
        }
        if let Some(workers) = self.workers {
            config.parallel.enabled = true;
            config.parallel.workers = workers;
        }
        if let Some(report) = &self.report {
            config.output.report_file = Some(report.clone());
        }
    }
}
