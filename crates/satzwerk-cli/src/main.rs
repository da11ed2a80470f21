// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Satzwerk: scanned-page to structured-document converter.
//
// Entry point. Resolves configuration, initialises logging, and runs one
// conversion with Ctrl-C mapped to cancellation.

mod args;
mod convert;

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use args::Args;
use convert::RunOutcome;

/// Conventional exit status for a run interrupted by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("satzwerk: {err}");
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_filter())),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Satzwerk starting");

    let outcome = convert::run(&config, |cancel| {
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => {
                    tracing::warn!("interrupt received, cancelling remaining pages");
                    cancel.cancel();
                }
                Err(err) => tracing::error!(error = %err, "cannot listen for Ctrl-C"),
            }
        });
    })
    .await;

    match outcome {
        Ok(RunOutcome::Completed(conversion)) => {
            let report = &conversion.report;
            tracing::info!(
                pages = conversion.model.page_count(),
                placeholders = conversion.model.placeholder_count(),
                warnings = report.warnings,
                malformed_lines = report.malformed_lines,
                output = %config.output.file.display(),
                "conversion complete"
            );
            if !report.is_clean() {
                for failure in &report.failures {
                    tracing::warn!(
                        page_index = failure.page_index,
                        kind = %failure.kind,
                        attempts = failure.attempts,
                        detail = %failure.detail,
                        "page replaced by placeholder"
                    );
                }
            }
            ExitCode::SUCCESS
        }
        Ok(RunOutcome::Cancelled(conversion)) => {
            tracing::warn!(
                pages = conversion.model.page_count(),
                skipped = conversion.report.skipped.len(),
                output = %config.output.file.display(),
                "conversion cancelled; partial document written"
            );
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            match err.kind() {
                Some(kind) => tracing::error!(error = %err, %kind, "conversion failed"),
                None => tracing::error!(error = %err, "conversion failed"),
            }
            ExitCode::FAILURE
        }
    }
}
