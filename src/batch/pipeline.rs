//! Batch export orchestration.
//!
//! `BatchPipeline::run` validates the job, plans every destination, then
//! fans items out to a fixed pool of rayon workers. Workers pull item
//! indices from a shared cursor and send results back over a channel; the
//! calling thread drains the channel and is the only place callbacks run,
//! so callbacks are never concurrent with each other.

use super::cancel::CancellationToken;
use super::destination::{plan_destinations, PlannedOutput};
use super::error::BatchError;
use super::job::{BatchJob, DestinationPolicy};
use super::report::{BatchItemResult, BatchProgress, BatchReport, ItemFailure, Outcome};
use crate::image_io::{fit_within, FsImageIo, ImageIo};
use crate::watermark::text_template::{has_placeholders, resolve_template, TextContext};
use crate::watermark::{Renderer, WatermarkSpec};
use image::DynamicImage;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Default worker count: the machine's available parallelism.
pub fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Runs batch jobs.
#[derive(Clone)]
pub struct BatchPipeline {
    renderer: Renderer,
    io: Arc<dyn ImageIo>,
    workers: usize,
}

impl std::fmt::Debug for BatchPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchPipeline")
            .field("renderer", &self.renderer)
            .field("workers", &self.workers)
            .finish_non_exhaustive()
    }
}

impl Default for BatchPipeline {
    fn default() -> Self {
        Self::new(Renderer::default(), Arc::new(FsImageIo::default()))
    }
}

impl BatchPipeline {
    pub fn new(renderer: Renderer, io: Arc<dyn ImageIo>) -> Self {
        Self {
            renderer,
            io,
            workers: default_workers(),
        }
    }

    /// Set the worker count. Zero means the default.
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = if workers == 0 {
            default_workers()
        } else {
            workers
        };
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Run `job` to completion on the calling thread.
    ///
    /// `on_item` and `on_progress` are called on this thread after each
    /// processed item, in completion order. Items skipped because of
    /// cancellation appear only in the returned report. The report lists
    /// every source in job order.
    pub fn run<P, I>(
        &self,
        job: &BatchJob,
        cancel: &CancellationToken,
        mut on_progress: P,
        mut on_item: I,
    ) -> Result<BatchReport, BatchError>
    where
        P: FnMut(BatchProgress),
        I: FnMut(&BatchItemResult),
    {
        let started = Instant::now();
        job.spec.validate()?;
        job.destination.validate()?;
        prepare_output_root(&job.destination.output_root)?;

        let total = job.sources.len();
        info!(
            job_id = %job.id,
            total,
            workers = self.workers,
            output = %job.destination.output_root.display(),
            "Starting batch export"
        );

        let plan = plan_destinations(&job.sources, &job.destination);
        let shared = Arc::new(SharedJob {
            sources: job.sources.clone(),
            spec: job.spec.clone(),
            substitute_text: has_placeholders(&job.spec.text),
            destination: job.destination.clone(),
            plan,
            renderer: self.renderer.clone(),
            io: Arc::clone(&self.io),
            cancel: cancel.clone(),
            cursor: AtomicUsize::new(0),
        });

        let mut slots: Vec<Option<BatchItemResult>> = vec![None; total];
        if total > 0 {
            let worker_count = self.workers.clamp(1, total);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(worker_count)
                .thread_name(|i| format!("photomark-worker-{}", i))
                .build()?;

            let (tx, rx) = mpsc::channel::<BatchItemResult>();
            for _ in 0..worker_count {
                let shared = Arc::clone(&shared);
                let tx = tx.clone();
                pool.spawn(move || worker_loop(&shared, &tx));
            }
            // Only workers hold senders now; the loop ends when they finish.
            drop(tx);

            let mut completed = 0;
            for result in rx {
                completed += 1;
                if let Some(failure) = result.failure() {
                    warn!(
                        path = %result.path.display(),
                        kind = failure.kind(),
                        error = %failure,
                        "Item failed"
                    );
                }
                on_item(&result);
                on_progress(BatchProgress { completed, total });
                let index = result.index;
                slots[index] = Some(result);
            }
        }

        let items: Vec<BatchItemResult> = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| BatchItemResult::cancelled(index, job.sources[index].clone()))
            })
            .collect();

        let report = BatchReport::from_items(job.id.clone(), items, started.elapsed());
        info!(
            job_id = %report.job_id,
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Batch export finished"
        );
        Ok(report)
    }

    /// Run `job` on a background orchestrator thread.
    ///
    /// Progress and item results are delivered through the handle's event
    /// channel; the final report comes from [`BatchHandle::join`].
    pub fn spawn(&self, job: BatchJob) -> Result<BatchHandle, BatchError> {
        let pipeline = self.clone();
        let cancel = CancellationToken::new();
        let worker_cancel = cancel.clone();
        let (tx, events) = mpsc::channel();

        let join = thread::Builder::new()
            .name("photomark-batch".to_string())
            .spawn(move || {
                let item_tx = tx.clone();
                pipeline.run(
                    &job,
                    &worker_cancel,
                    |progress| {
                        let _ = tx.send(BatchEvent::Progress(progress));
                    },
                    |item| {
                        let _ = item_tx.send(BatchEvent::Item(item.clone()));
                    },
                )
            })
            .map_err(|e| BatchError::WorkerPool(e.to_string()))?;

        Ok(BatchHandle {
            events,
            cancel,
            join,
        })
    }
}

/// Event emitted by a spawned batch.
#[derive(Debug, Clone)]
pub enum BatchEvent {
    Progress(BatchProgress),
    Item(BatchItemResult),
}

/// Handle to a batch running in the background.
pub struct BatchHandle {
    events: Receiver<BatchEvent>,
    cancel: CancellationToken,
    join: JoinHandle<Result<BatchReport, BatchError>>,
}

impl BatchHandle {
    /// Progress and item events. The channel closes when the batch ends.
    pub fn events(&self) -> &Receiver<BatchEvent> {
        &self.events
    }

    /// Ask the batch to stop starting new items.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }

    /// Wait for the final report.
    pub fn join(self) -> Result<BatchReport, BatchError> {
        self.join
            .join()
            .map_err(|_| BatchError::WorkerPool("batch orchestrator panicked".to_string()))?
    }
}

/// Read-only job state shared by all workers.
struct SharedJob {
    sources: Vec<PathBuf>,
    spec: WatermarkSpec,
    substitute_text: bool,
    destination: DestinationPolicy,
    plan: Vec<Result<PlannedOutput, ItemFailure>>,
    renderer: Renderer,
    io: Arc<dyn ImageIo>,
    cancel: CancellationToken,
    cursor: AtomicUsize,
}

fn worker_loop(shared: &SharedJob, tx: &mpsc::Sender<BatchItemResult>) {
    loop {
        if shared.cancel.is_cancelled() {
            break;
        }
        let index = shared.cursor.fetch_add(1, Ordering::SeqCst);
        if index >= shared.sources.len() {
            break;
        }

        let result = process_item(shared, index);
        if tx.send(result).is_err() {
            break;
        }
    }
}

fn process_item(shared: &SharedJob, index: usize) -> BatchItemResult {
    let started = Instant::now();
    let path = shared.sources[index].clone();
    let mut warnings = Vec::new();

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        export_item(shared, index, &path, &mut warnings)
    }))
    .unwrap_or_else(|_| Err(ItemFailure::Render("worker panicked".to_string())));

    let outcome = match outcome {
        Ok(dest) => Outcome::Success { dest },
        Err(failure) => Outcome::Failure(failure),
    };

    BatchItemResult {
        index,
        path,
        outcome,
        warnings,
        elapsed: started.elapsed(),
    }
}

fn export_item(
    shared: &SharedJob,
    index: usize,
    path: &Path,
    warnings: &mut Vec<String>,
) -> Result<PathBuf, ItemFailure> {
    let planned = shared.plan[index].clone()?;

    let source = shared
        .io
        .decode(path)
        .map_err(|e| ItemFailure::Decode(e.to_string()))?;

    let source = match &shared.destination.resize {
        // The source decoded fine; a failed resize is a processing failure.
        Some(bounds) => fit_within(source, bounds).map_err(|e| ItemFailure::Render(e.to_string()))?,
        None => source,
    };

    let spec = if shared.substitute_text {
        let context = TextContext::for_item(path, index, shared.sources.len());
        WatermarkSpec {
            text: resolve_template(&shared.spec.text, &context),
            ..shared.spec.clone()
        }
    } else {
        shared.spec.clone()
    };

    let rendered = render_with_fallback(&shared.renderer, &source, &spec, warnings)?;

    shared
        .io
        .encode(
            &rendered,
            &planned.dest,
            planned.format,
            shared.destination.encoder_quality(),
        )
        .map_err(|e| ItemFailure::Encode(e.to_string()))?;

    debug!(
        source = %path.display(),
        dest = %planned.dest.display(),
        "Exported item"
    );
    Ok(planned.dest)
}

/// Render `spec`, retrying once with the built-in font when the requested
/// face cannot be resolved.
fn render_with_fallback(
    renderer: &Renderer,
    source: &DynamicImage,
    spec: &WatermarkSpec,
    warnings: &mut Vec<String>,
) -> Result<DynamicImage, ItemFailure> {
    match renderer.render(source, spec) {
        Ok(image) => Ok(image),
        Err(e) if e.is_font_resolution() => {
            warn!(error = %e, "Falling back to built-in font");
            warnings.push(format!("{}; used the built-in font instead", e));
            renderer
                .render_with_builtin_font(source, spec)
                .map_err(|e| ItemFailure::Render(e.to_string()))
        }
        Err(e) => Err(ItemFailure::Render(e.to_string())),
    }
}

/// Create the output directory and check that files can be written to it.
fn prepare_output_root(root: &Path) -> Result<(), BatchError> {
    let unwritable = |source| BatchError::DestinationUnwritable {
        path: root.to_path_buf(),
        source,
    };

    fs::create_dir_all(root).map_err(unwritable)?;
    let probe = root.join(format!(".photomark-probe-{}", Uuid::new_v4()));
    fs::write(&probe, b"").map_err(unwritable)?;
    fs::remove_file(&probe).map_err(unwritable)?;
    Ok(())
}
