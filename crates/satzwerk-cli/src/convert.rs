// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// One conversion run: discover inputs, feed the orchestrator, write outputs.

use std::path::Path;
use std::sync::Arc;

use satzwerk_core::{Conversion, FailureReport, PipelineConfig, Result, SatzwerkError};
use satzwerk_document::{PageInput, TesseractTsvSource, assembler_for, discover_pages};
use satzwerk_pipeline::{
    CancelHandle, FragmentSource, PipelineOrchestrator, ProgressEvent, ProgressStatus,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

/// How a run ended.
#[derive(Debug)]
pub enum RunOutcome {
    Completed(Conversion),
    /// Cancelled; the partial document was still written.
    Cancelled(Conversion),
}

impl RunOutcome {
    /// The document and report, however the run ended.
    pub fn conversion(&self) -> &Conversion {
        match self {
            Self::Completed(c) | Self::Cancelled(c) => c,
        }
    }
}

/// Pick the fragment source for the discovered inputs.
///
/// TSV files are read directly; anything else is a page image and needs the
/// OCR engine.
fn build_source(inputs: Vec<PageInput>) -> Result<Arc<dyn FragmentSource>> {
    let (tsv, images): (Vec<PageInput>, Vec<PageInput>) = inputs.into_iter().partition(|input| {
        input
            .path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("tsv"))
    });

    match (tsv.is_empty(), images.is_empty()) {
        (_, true) => Ok(Arc::new(TesseractTsvSource::new(tsv))),
        (true, false) => image_source(images),
        (false, false) => Err(SatzwerkError::Config(
            "input directory mixes TSV files and page images; pick one with input.pattern".into(),
        )),
    }
}

#[cfg(feature = "ocr")]
fn image_source(images: Vec<PageInput>) -> Result<Arc<dyn FragmentSource>> {
    use satzwerk_document::{OcrConfig, OcrFragmentSource};
    Ok(Arc::new(OcrFragmentSource::new(OcrConfig::default(), images)?))
}

#[cfg(not(feature = "ocr"))]
fn image_source(images: Vec<PageInput>) -> Result<Arc<dyn FragmentSource>> {
    Err(SatzwerkError::Config(format!(
        "{} page image(s) found but satzwerk was built without the `ocr` feature",
        images.len()
    )))
}

/// Log a running tally as pages finish.
fn spawn_progress_logger(
    mut rx: mpsc::UnboundedReceiver<ProgressEvent>,
    total: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut done = 0usize;
        let mut failed = 0usize;
        while let Some(event) = rx.recv().await {
            done += 1;
            match event.status {
                ProgressStatus::Failed => {
                    failed += 1;
                    warn!(
                        page_index = event.page_index,
                        attempts = event.attempt_count,
                        "[{done}/{total}] page failed, placeholder inserted"
                    );
                }
                ProgressStatus::Retried => info!(
                    page_index = event.page_index,
                    attempts = event.attempt_count,
                    "[{done}/{total}] page done after retries"
                ),
                ProgressStatus::Ok => info!(page_index = event.page_index, "[{done}/{total}] page done"),
            }
        }
        info!(done, failed, "progress stream closed");
    })
}

fn write_report(report: &FailureReport, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_vec_pretty(report)?)?;
    info!(path = %path.display(), "failure report written");
    Ok(())
}

fn write_outputs(config: &PipelineConfig, conversion: &Conversion) -> Result<()> {
    assembler_for(&config.output).write_to(&conversion.model, &config.output.file)?;
    if let Some(path) = &config.output.report_file {
        write_report(&conversion.report, path)?;
    }
    Ok(())
}

/// Run a whole conversion.
///
/// `on_start` receives the cancel handle once the orchestrator exists, so
/// the caller can wire it to a signal.
#[instrument(skip_all, fields(input = %config.input.dir.display()))]
pub async fn run(
    config: &PipelineConfig,
    on_start: impl FnOnce(CancelHandle),
) -> Result<RunOutcome> {
    let inputs = discover_pages(&config.input.dir, &config.input.extensions())?;
    if inputs.is_empty() {
        warn!("no page inputs found");
    }
    let indices: Vec<u32> = inputs.iter().map(|input| input.page_index).collect();
    let source = build_source(inputs)?;

    let (tx, rx) = mpsc::unbounded_channel();
    let mut orchestrator = PipelineOrchestrator::with_progress(source, config, Arc::new(tx));
    on_start(orchestrator.cancel_handle());

    for index in &indices {
        orchestrator.submit(*index);
    }
    let logger = spawn_progress_logger(rx, orchestrator.submitted_count());
    info!(job_id = %orchestrator.job_id(), pages = indices.len(), "pages submitted");

    let outcome = match orchestrator.await_completion().await {
        Ok(conversion) => RunOutcome::Completed(conversion),
        Err(SatzwerkError::OrchestrationCancelled(conversion)) => {
            warn!(
                skipped = conversion.report.skipped.len(),
                "conversion cancelled, writing partial document"
            );
            RunOutcome::Cancelled(*conversion)
        }
        Err(err) => return Err(err),
    };
    // The orchestrator has dropped its sender; the logger drains and exits.
    if let Err(err) = logger.await {
        warn!(error = %err, "progress logger ended abnormally");
    }

    if outcome.conversion().model.is_empty() {
        warn!("no pages converted; writing an empty document");
    }
    write_outputs(config, outcome.conversion())?;
    Ok(outcome)
}
