// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Fan-out/fan-in coordination of page workers.
//
// Three kinds of task cooperate:
//
// * the dispatcher takes submitted page indices in FIFO order and starts a
//   page task whenever the worker semaphore has a free permit;
// * each page task runs the retry loop for one page, with the blocking
//   recognition/layout work on the blocking pool;
// * a single merger owns the `DocumentModel` and the `FailureReport` and
//   receives finished pages over a channel.
//
// The merger is the only writer of the model, so completion order can never
// disturb document order and no lock is needed around it.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use satzwerk_core::model::MergeOutcome;
use satzwerk_core::{
    Conversion, DocumentModel, ErrorKind, FailureReport, JobId, PageFailure, PageResult,
    PipelineConfig, Result, SatzwerkError,
};
use tokio::sync::{Notify, Semaphore, mpsc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{Instrument, debug, error, info, info_span, instrument, warn};

use crate::progress::{LogProgress, ProgressEvent, ProgressSink, ProgressStatus};
use crate::retry::{RetryDecision, RetryPolicy};
use crate::source::FragmentSource;
use crate::worker::{PageOutcome, PageWorker};

#[derive(Debug, Default)]
struct CancelState {
    requested: AtomicBool,
    notify: Notify,
}

/// Cooperative cancellation flag shared between the orchestrator, its tasks
/// and anyone holding a clone (e.g. a Ctrl-C handler).
#[derive(Debug, Clone, Default)]
pub struct CancelHandle(Arc<CancelState>);

impl CancelHandle {
    /// Request cancellation and wake every waiter.  Idempotent.
    pub fn cancel(&self) {
        if !self.0.requested.swap(true, Ordering::SeqCst) {
            info!("cancellation requested");
        }
        self.0.notify.notify_waiters();
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.requested.load(Ordering::SeqCst)
    }

    /// Resolves once cancellation has been requested.
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent `cancel` is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// What a page task hands to the merger.
#[derive(Debug)]
enum PageReport {
    Finished { result: PageResult, attempts: u32 },
    /// Never started, or abandoned between attempts, because of cancellation.
    Skipped(u32),
}

impl PageReport {
    fn failed(page_index: u32, kind: ErrorKind, detail: String, attempts: u32) -> Self {
        Self::Finished {
            result: PageResult::Failed {
                page_index,
                kind,
                detail,
            },
            attempts,
        }
    }
}

/// State every page task needs.
struct Shared {
    worker: Arc<PageWorker>,
    retry: RetryPolicy,
    cancel: CancelHandle,
}

/// Schedules pages across a bounded worker pool and assembles the results.
///
/// Must be created inside a Tokio runtime: construction spawns the
/// dispatcher and merger tasks.
pub struct PipelineOrchestrator {
    job_id: JobId,
    submitted: HashSet<u32>,
    queue: mpsc::UnboundedSender<u32>,
    cancel: CancelHandle,
    dispatcher: JoinHandle<()>,
    merger: JoinHandle<(DocumentModel, FailureReport)>,
}

impl PipelineOrchestrator {
    /// Orchestrator that reports progress to the log.
    pub fn new(source: Arc<dyn FragmentSource>, config: &PipelineConfig) -> Self {
        Self::with_progress(source, config, Arc::new(LogProgress))
    }

    /// Orchestrator that sends one [`ProgressEvent`](crate::ProgressEvent)
    /// per finished page to `progress`.
    ///
    /// The pool size comes from `config.parallel`, the retry budget from
    /// `config.retry`.
    pub fn with_progress(
        source: Arc<dyn FragmentSource>,
        config: &PipelineConfig,
        progress: Arc<dyn ProgressSink>,
    ) -> Self {
        let job_id = JobId::new();
        let workers = config.parallel.worker_count();
        let cancel = CancelHandle::default();
        let shared = Arc::new(Shared {
            worker: Arc::new(PageWorker::new(source, &config.layout)),
            retry: RetryPolicy::from(&config.retry),
            cancel: cancel.clone(),
        });

        let (queue, pending) = mpsc::unbounded_channel();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let span = info_span!("conversion", %job_id);

        let dispatcher = tokio::spawn(
            dispatch(pending, shared, Arc::new(Semaphore::new(workers)), results_tx)
                .instrument(span.clone()),
        );
        let merger = tokio::spawn(merge_results(results_rx, job_id, progress).instrument(span));

        info!(%job_id, workers, "conversion started");
        Self {
            job_id,
            submitted: HashSet::new(),
            queue,
            cancel,
            dispatcher,
            merger,
        }
    }

    /// Identifier stamped on progress events and the failure report.
    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    /// Queue a page.  Returns `false` if the index was already submitted,
    /// in which case nothing happens.
    pub fn submit(&mut self, page_index: u32) -> bool {
        if !self.submitted.insert(page_index) {
            debug!(page_index, "page already submitted");
            return false;
        }
        if self.queue.send(page_index).is_err() {
            error!(page_index, "dispatcher stopped; page not scheduled");
        }
        true
    }

    /// Distinct page indices queued so far.
    pub fn submitted_count(&self) -> usize {
        self.submitted.len()
    }

    /// Stop scheduling new pages.  Pages already running finish normally.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A clone of the cancellation flag, usable after the orchestrator has
    /// been consumed by [`await_completion`](Self::await_completion).
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Wait until every submitted page is merged, failed or skipped.
    ///
    /// Returns [`SatzwerkError::OrchestrationCancelled`] carrying the partial
    /// conversion when cancellation left pages unprocessed.
    #[instrument(skip_all, fields(job_id = %self.job_id, pages = self.submitted.len()))]
    pub async fn await_completion(self) -> Result<Conversion> {
        let Self {
            submitted,
            queue,
            cancel,
            dispatcher,
            merger,
            ..
        } = self;
        drop(queue);

        dispatcher
            .await
            .map_err(|err| SatzwerkError::Worker(format!("dispatcher: {err}")))?;
        let (model, report) = merger
            .await
            .map_err(|err| SatzwerkError::Worker(format!("merger: {err}")))?;

        let mut conversion = Conversion {
            model,
            report,
            submitted: submitted.len(),
        };
        fill_lost_pages(&mut conversion, &submitted);

        info!(
            merged = conversion.model.page_count(),
            failed = conversion.report.failures.len(),
            skipped = conversion.report.skipped.len(),
            "conversion finished"
        );
        if cancel.is_cancelled() && !conversion.report.skipped.is_empty() {
            return Err(SatzwerkError::OrchestrationCancelled(Box::new(conversion)));
        }
        Ok(conversion)
    }
}

/// Give any submitted page that produced no report a placeholder, so the
/// model holds one page per index that was not skipped.
fn fill_lost_pages(conversion: &mut Conversion, submitted: &HashSet<u32>) {
    for &page_index in submitted {
        if conversion.model.contains(page_index)
            || conversion.report.skipped.binary_search(&page_index).is_ok()
        {
            continue;
        }
        error!(page_index, "page task ended without a result");
        let detail = "page task ended without a result".to_string();
        conversion.report.record_failure(PageFailure {
            page_index,
            kind: ErrorKind::WorkerCrashed,
            detail: detail.clone(),
            attempts: 0,
        });
        conversion.model.merge(PageResult::Failed {
            page_index,
            kind: ErrorKind::WorkerCrashed,
            detail,
        });
    }
}

fn forward(results: &mpsc::UnboundedSender<PageReport>, report: PageReport) {
    if let Err(err) = results.send(report) {
        error!(report = ?err.0, "merger stopped; page report lost");
    }
}

async fn dispatch(
    mut pending: mpsc::UnboundedReceiver<u32>,
    shared: Arc<Shared>,
    permits: Arc<Semaphore>,
    results: mpsc::UnboundedSender<PageReport>,
) {
    let mut running = JoinSet::new();
    loop {
        let page_index = tokio::select! {
            Some(joined) = running.join_next(), if !running.is_empty() => {
                if let Err(err) = joined {
                    error!(%err, "page task failed");
                }
                continue;
            }
            next = pending.recv() => match next {
                Some(page_index) => page_index,
                None => break,
            },
        };

        let permit = tokio::select! {
            biased;
            () = shared.cancel.cancelled() => None,
            permit = Arc::clone(&permits).acquire_owned() => permit.ok(),
        };
        let Some(permit) = permit.filter(|_| !shared.cancel.is_cancelled()) else {
            debug!(page_index, "page skipped after cancellation");
            forward(&results, PageReport::Skipped(page_index));
            continue;
        };

        let shared = Arc::clone(&shared);
        let results = results.clone();
        running.spawn(
            async move {
                let report = run_page(&shared, page_index).await;
                drop(permit);
                forward(&results, report);
            }
            .instrument(info_span!("page", page_index)),
        );
    }

    while let Some(joined) = running.join_next().await {
        if let Err(err) = joined {
            error!(%err, "page task failed");
        }
    }
}

/// Attempt one page until it succeeds, fails terminally, runs out of
/// attempts or is abandoned by cancellation.
async fn run_page(shared: &Shared, page_index: u32) -> PageReport {
    let mut attempts = 0;
    loop {
        attempts += 1;
        let worker = Arc::clone(&shared.worker);
        let outcome = match tokio::task::spawn_blocking(move || worker.process(page_index)).await {
            Ok(outcome) => outcome,
            Err(err) => {
                error!(page_index, attempts, %err, "page worker crashed");
                return PageReport::failed(page_index, ErrorKind::WorkerCrashed, err.to_string(), attempts);
            }
        };

        let (kind, reason) = match outcome {
            PageOutcome::Ready(page) => {
                return PageReport::Finished {
                    result: PageResult::Ok(page),
                    attempts,
                };
            }
            PageOutcome::Failed { kind, reason } => (kind, reason),
        };
        if !kind.is_transient() {
            warn!(page_index, %kind, %reason, "page failed; not retrying");
            return PageReport::failed(page_index, kind, reason, attempts);
        }

        match shared.retry.decide(page_index, attempts) {
            RetryDecision::Exhausted => {
                return PageReport::failed(page_index, kind, reason, attempts);
            }
            RetryDecision::RetryAfter(delay) => {
                warn!(
                    page_index,
                    attempts,
                    delay_ms = delay.as_millis() as u64,
                    %kind,
                    %reason,
                    "transient failure; retrying"
                );
                tokio::select! {
                    () = tokio::time::sleep(delay) => {}
                    () = shared.cancel.cancelled() => {}
                }
                if shared.cancel.is_cancelled() {
                    info!(page_index, attempts, "retry abandoned after cancellation");
                    return PageReport::Skipped(page_index);
                }
            }
        }
    }
}

async fn merge_results(
    mut results: mpsc::UnboundedReceiver<PageReport>,
    job_id: JobId,
    progress: Arc<dyn ProgressSink>,
) -> (DocumentModel, FailureReport) {
    let mut model = DocumentModel::new();
    let mut report = FailureReport::new(job_id);

    while let Some(page_report) = results.recv().await {
        let (result, attempts) = match page_report {
            PageReport::Skipped(page_index) => {
                report.record_skipped(page_index);
                continue;
            }
            PageReport::Finished { result, attempts } => (result, attempts),
        };

        let page_index = result.page_index();
        let status = match &result {
            PageResult::Ok(page) => {
                report.record_warnings(&page.warnings);
                if attempts > 1 {
                    ProgressStatus::Retried
                } else {
                    ProgressStatus::Ok
                }
            }
            PageResult::Failed { kind, detail, .. } => {
                report.record_failure(PageFailure {
                    page_index,
                    kind: *kind,
                    detail: detail.clone(),
                    attempts,
                });
                ProgressStatus::Failed
            }
        };

        if model.merge(result) == MergeOutcome::Replaced {
            warn!(page_index, "page reported twice; kept the later result");
        }
        progress.emit(ProgressEvent::new(job_id, page_index, status, attempts));
    }

    report.finish();
    (model, report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    use satzwerk_core::config::{RetryConfig, WorkerCount};
    use satzwerk_core::{Fragment, PageSize, Rect};

    use crate::retry::hash_jitter;
    use crate::source::{PageScan, SourceError};

    fn indices(model: &DocumentModel) -> Vec<u32> {
        model.pages().map(|page| page.index).collect()
    }

    #[derive(Debug, Clone, Copy)]
    enum Behaviour {
        Text,
        Corrupt,
        BusyFor(u32),
        AlwaysBusy,
        Crash,
        CancelHere,
    }

    #[derive(Default)]
    struct ScriptedSource {
        behaviours: HashMap<u32, Behaviour>,
        max_latency_ms: u64,
        calls: Mutex<HashMap<u32, u32>>,
        cancel: OnceLock<CancelHandle>,
    }

    impl ScriptedSource {
        fn with(mut self, page_index: u32, behaviour: Behaviour) -> Self {
            self.behaviours.insert(page_index, behaviour);
            self
        }

        fn with_latency(mut self, max_latency_ms: u64) -> Self {
            self.max_latency_ms = max_latency_ms;
            self
        }

        fn calls(&self, page_index: u32) -> u32 {
            self.calls.lock().expect("lock").get(&page_index).copied().unwrap_or(0)
        }
    }

    fn page_scan(page_index: u32) -> PageScan {
        let word = |text: String, x: f32| {
            Fragment::new(text, Rect::new(x, 100.0, 60.0, 20.0).expect("rect"), 0.9, page_index)
        };
        PageScan {
            size: PageSize::new(1000.0, 1400.0),
            fragments: vec![word("body".into(), 200.0), word(format!("page{page_index}"), 100.0)],
        }
    }

    impl FragmentSource for ScriptedSource {
        fn get_fragments(&self, page_index: u32) -> std::result::Result<PageScan, SourceError> {
            let call = {
                let mut calls = self.calls.lock().expect("lock");
                let count = calls.entry(page_index).or_default();
                *count += 1;
                *count
            };
            if self.max_latency_ms > 0 {
                let ms = hash_jitter(u64::from(page_index), self.max_latency_ms);
                std::thread::sleep(Duration::from_millis(ms));
            }
            let behaviour = self.behaviours.get(&page_index).copied().unwrap_or(Behaviour::Text);
            match behaviour {
                Behaviour::Text => Ok(page_scan(page_index)),
                Behaviour::Corrupt => Err(SourceError::Corrupt("unreadable scan".into())),
                Behaviour::BusyFor(n) if call <= n => {
                    Err(SourceError::Unavailable("engine busy".into()))
                }
                Behaviour::BusyFor(_) => Ok(page_scan(page_index)),
                Behaviour::AlwaysBusy => Err(SourceError::Unavailable("engine busy".into())),
                Behaviour::Crash => panic!("engine crashed on page {page_index}"),
                Behaviour::CancelHere => {
                    if let Some(cancel) = self.cancel.get() {
                        cancel.cancel();
                    }
                    Err(SourceError::Unavailable("engine shutting down".into()))
                }
            }
        }
    }

    fn config(workers: usize) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.parallel.workers = WorkerCount::Fixed(workers);
        config.retry = RetryConfig {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 5,
        };
        config
    }

    struct Harness {
        source: Arc<ScriptedSource>,
        orchestrator: PipelineOrchestrator,
        events: mpsc::UnboundedReceiver<ProgressEvent>,
    }

    fn harness(source: ScriptedSource, workers: usize) -> Harness {
        let source = Arc::new(source);
        let (tx, events) = mpsc::unbounded_channel();
        let orchestrator =
            PipelineOrchestrator::with_progress(source.clone(), &config(workers), Arc::new(tx));
        let _ = source.cancel.set(orchestrator.cancel_handle());
        Harness {
            source,
            orchestrator,
            events,
        }
    }

    fn drain(events: &mut mpsc::UnboundedReceiver<ProgressEvent>) -> HashMap<u32, ProgressEvent> {
        let mut by_page = HashMap::new();
        while let Ok(event) = events.try_recv() {
            by_page.insert(event.page_index, event);
        }
        by_page
    }

    fn first_text(conversion: &Conversion, page_index: u32) -> String {
        conversion
            .model
            .get(page_index)
            .and_then(|page| page.blocks.first())
            .map(|block| block.text())
            .unwrap_or_default()
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn pages_merge_in_index_order_despite_random_latency() {
        let mut h = harness(ScriptedSource::default().with_latency(20), 6);
        let count = 24u32;
        // Scrambled submission order as well as scrambled completion order.
        for i in 0..count {
            assert!(h.orchestrator.submit((i * 7) % count));
        }
        let conversion = h.orchestrator.await_completion().await.expect("completes");

        assert_eq!(indices(&conversion.model), (0..count).collect::<Vec<_>>());
        for i in 0..count {
            assert_eq!(first_text(&conversion, i), format!("page{i} body"));
        }
        assert!(conversion.report.is_clean());
        assert_eq!(drain(&mut h.events).len(), count as usize);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn corrupt_page_becomes_one_placeholder() {
        let mut h = harness(ScriptedSource::default().with(3, Behaviour::Corrupt), 3);
        for i in 0..6 {
            h.orchestrator.submit(i);
        }
        let conversion = h.orchestrator.await_completion().await.expect("completes");

        assert_eq!(conversion.model.page_count(), 6);
        assert_eq!(conversion.model.placeholder_count(), 1);
        let placeholder = conversion.model.get(3).expect("page 3");
        assert!(placeholder.is_placeholder());
        assert!(first_text(&conversion, 3).starts_with("page 3 failed: page corrupt"));
        for i in [0, 1, 2, 4, 5] {
            assert_eq!(first_text(&conversion, i), format!("page{i} body"));
        }

        assert_eq!(h.source.calls(3), 1);
        assert_eq!(conversion.report.failures.len(), 1);
        assert_eq!(conversion.report.failures[0].kind, ErrorKind::PageCorrupt);
        assert_eq!(conversion.report.failures[0].attempts, 1);
        assert_eq!(drain(&mut h.events)[&3].status, ProgressStatus::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn transient_failure_is_retried() {
        let mut h = harness(ScriptedSource::default().with(2, Behaviour::BusyFor(2)), 2);
        for i in 0..4 {
            h.orchestrator.submit(i);
        }
        let conversion = h.orchestrator.await_completion().await.expect("completes");

        assert_eq!(conversion.model.recognized_count(), 4);
        assert_eq!(first_text(&conversion, 2), "page2 body");
        assert_eq!(h.source.calls(2), 3);

        let events = drain(&mut h.events);
        assert_eq!(events[&2].status, ProgressStatus::Retried);
        assert_eq!(events[&2].attempt_count, 3);
        assert_eq!(events[&0].status, ProgressStatus::Ok);
        assert_eq!(events[&0].attempt_count, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn exhausted_retries_yield_placeholder() {
        let mut h = harness(ScriptedSource::default().with(1, Behaviour::AlwaysBusy), 2);
        for i in 0..3 {
            h.orchestrator.submit(i);
        }
        let conversion = h.orchestrator.await_completion().await.expect("completes");

        assert_eq!(h.source.calls(1), 3);
        assert!(conversion.model.get(1).expect("page 1").is_placeholder());
        assert_eq!(conversion.model.recognized_count(), 2);
        let failure = &conversion.report.failures[0];
        assert_eq!(failure.kind, ErrorKind::RecognitionUnavailable);
        assert_eq!(failure.attempts, 3);
        assert_eq!(drain(&mut h.events)[&1].status, ProgressStatus::Failed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn resubmission_is_a_no_op() {
        let mut h = harness(ScriptedSource::default(), 2);
        assert!(h.orchestrator.submit(0));
        assert!(h.orchestrator.submit(1));
        assert!(!h.orchestrator.submit(1));
        assert!(!h.orchestrator.submit(0));
        assert_eq!(h.orchestrator.submitted_count(), 2);

        let conversion = h.orchestrator.await_completion().await.expect("completes");
        assert_eq!(conversion.submitted, 2);
        assert_eq!(conversion.model.page_count(), 2);
        assert_eq!(h.source.calls(0), 1);
        assert_eq!(h.source.calls(1), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn crashed_worker_is_isolated() {
        let mut h = harness(ScriptedSource::default().with(2, Behaviour::Crash), 2);
        for i in 0..4 {
            h.orchestrator.submit(i);
        }
        let conversion = h.orchestrator.await_completion().await.expect("completes");

        assert_eq!(conversion.model.page_count(), 4);
        assert!(conversion.model.get(2).expect("page 2").is_placeholder());
        assert_eq!(conversion.report.failures[0].kind, ErrorKind::WorkerCrashed);
        assert_eq!(first_text(&conversion, 3), "page3 body");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_keeps_exactly_the_merged_pages() {
        // One worker makes the order deterministic: pages 0..4 merge, page 4
        // triggers cancellation, the rest never start.
        let mut h = harness(ScriptedSource::default().with(4, Behaviour::CancelHere), 1);
        for i in 0..10 {
            h.orchestrator.submit(i);
        }
        let conversion = match h.orchestrator.await_completion().await {
            Err(SatzwerkError::OrchestrationCancelled(conversion)) => conversion,
            Err(other) => panic!("expected cancellation, got {other}"),
            Ok(_) => panic!("expected cancellation"),
        };

        assert_eq!(indices(&conversion.model), vec![0, 1, 2, 3]);
        assert_eq!(conversion.model.placeholder_count(), 0);
        assert_eq!(conversion.report.skipped, (4..10).collect::<Vec<_>>());
        assert_eq!(conversion.submitted, 10);
        assert_eq!(h.source.calls(4), 1);
        assert_eq!(h.source.calls(5), 0);
        assert_eq!(drain(&mut h.events).len(), 4);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn cancel_with_nothing_pending_completes() {
        let h = harness(ScriptedSource::default(), 2);
        h.orchestrator.cancel();
        let conversion = h.orchestrator.await_completion().await.expect("nothing skipped");
        assert!(conversion.model.is_empty());
        assert!(conversion.report.finished_at.is_some());
    }

    #[test]
    fn lost_pages_get_placeholders() {
        let mut conversion = Conversion {
            model: DocumentModel::new(),
            report: FailureReport::new(JobId::new()),
            submitted: 3,
        };
        conversion.report.record_skipped(2);
        let submitted: HashSet<u32> = [0, 1, 2].into_iter().collect();
        fill_lost_pages(&mut conversion, &submitted);
        assert_eq!(indices(&conversion.model), vec![0, 1]);
        assert_eq!(conversion.model.placeholder_count(), 2);
        assert_eq!(conversion.report.failures.len(), 2);
    }
}
