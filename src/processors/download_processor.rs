use std::collections::{HashMap, HashSet, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinSet;

use crate::browser::{BrowserSession, SessionFactory};
use crate::error::Result;
use crate::models::{CatalogEntry, DownloadSummary, DownloadTask};
use crate::processors::reconciler::Reconciler;
use crate::processors::worker_dir::{remove_staging_root_if_empty, WorkerDirectory};
use crate::utils::constants::STAGING_DIR_NAME;
use crate::utils::filename::{canonical_filename, disambiguated_filename};
use crate::utils::progress::ProgressReporter;

type TaskQueue = Arc<Mutex<VecDeque<DownloadTask>>>;
/// Task each worker is currently busy with, keyed by worker id.
type InFlight = Arc<Mutex<HashMap<usize, DownloadTask>>>;

/// Runs download tasks on a fixed pool of workers.
///
/// Each worker owns one browser session and one private download directory
/// for its whole lifetime and takes tasks from a shared queue. Finished
/// tasks come back over a channel.
pub struct DownloadProcessor<F: SessionFactory> {
    factory: Arc<F>,
    reconciler: Arc<Reconciler>,
    output_dir: PathBuf,
    staging_root: PathBuf,
    max_workers: usize,
    task_retries: u32,
}

impl<F: SessionFactory> DownloadProcessor<F> {
    pub fn new(factory: F, output_dir: impl Into<PathBuf>) -> Self {
        let output_dir = output_dir.into();
        Self {
            factory: Arc::new(factory),
            reconciler: Arc::new(Reconciler::new()),
            staging_root: output_dir.join(STAGING_DIR_NAME),
            output_dir,
            max_workers: num_cpus::get().clamp(1, 4),
            task_retries: 0,
        }
    }

    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = Arc::new(reconciler);
        self
    }

    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Extra attempts per task after a failed one.
    pub fn with_task_retries(mut self, task_retries: u32) -> Self {
        self.task_retries = task_retries;
        self
    }

    /// Download every entry once. Individual failures are recorded in the
    /// summary; only setup problems are returned as errors.
    pub async fn run(
        &self,
        entries: Vec<CatalogEntry>,
        progress: Option<&ProgressReporter>,
    ) -> Result<DownloadSummary> {
        let (tasks, mut finished) = plan_tasks(entries);
        let total = tasks.len() + finished.len();
        if total == 0 {
            return Ok(DownloadSummary::default());
        }

        fs::create_dir_all(&self.output_dir)?;

        let worker_count = self.max_workers.min(tasks.len());
        tracing::info!(tasks = total, workers = worker_count, "starting downloads");
        if let Some(p) = progress {
            p.set_length(total as u64);
            p.set_message(&format!("Downloading {} series...", total));
            p.increment(finished.len() as u64);
        }

        let queue: TaskQueue = Arc::new(Mutex::new(tasks.into_iter().collect()));
        let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
        let (tx, mut rx) = mpsc::unbounded_channel::<DownloadTask>();

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            let context = WorkerContext {
                worker_id,
                factory: Arc::clone(&self.factory),
                reconciler: Arc::clone(&self.reconciler),
                queue: Arc::clone(&queue),
                in_flight: Arc::clone(&in_flight),
                results: tx.clone(),
                output_dir: self.output_dir.clone(),
                staging_root: self.staging_root.clone(),
                task_retries: self.task_retries,
            };
            workers.spawn(run_worker(context));
        }
        drop(tx);

        while let Some(task) = rx.recv().await {
            if let Some(p) = progress {
                p.increment(1);
            }
            finished.push(task);
        }

        let mut worker_errors = Vec::new();
        let mut panics = Vec::new();
        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!("download worker stopped: {}", e);
                    worker_errors.push(e.to_string());
                }
                Err(e) => {
                    tracing::error!("download worker panicked: {}", e);
                    panics.push(e.to_string());
                }
            }
        }

        // Tasks a worker was holding when it died
        let abandoned: Vec<DownloadTask> = {
            let mut guard = in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            guard.drain().map(|(_, task)| task).collect()
        };
        if !abandoned.is_empty() {
            let reason = match panics.first().or(worker_errors.first()) {
                Some(e) => format!("download worker stopped: {}", e),
                None => "download worker stopped".to_string(),
            };
            for mut task in abandoned {
                task.fail(reason.clone());
                if let Some(p) = progress {
                    p.increment(1);
                }
                finished.push(task);
            }
        }

        // Tasks nobody could take because no session opened
        let leftovers: Vec<DownloadTask> = take_all(&queue);
        if !leftovers.is_empty() {
            let reason = match (worker_errors.first(), panics.first()) {
                (Some(e), _) => format!("no browser session available: {}", e),
                (None, Some(e)) => format!("download worker stopped: {}", e),
                (None, None) => "no browser session available".to_string(),
            };
            for mut task in leftovers {
                task.fail(reason.clone());
                finished.push(task);
            }
        }

        if let Err(e) = remove_staging_root_if_empty(&self.staging_root) {
            tracing::warn!("could not remove {}: {}", self.staging_root.display(), e);
        }

        let summary = DownloadSummary::new(finished);
        if let Some(p) = progress {
            p.finish_with_message(&format!(
                "Downloaded {} of {} series",
                summary.success_count(),
                summary.tasks.len()
            ));
        }
        Ok(summary)
    }
}

struct WorkerContext<F: SessionFactory> {
    worker_id: usize,
    factory: Arc<F>,
    reconciler: Arc<Reconciler>,
    queue: TaskQueue,
    in_flight: InFlight,
    results: mpsc::UnboundedSender<DownloadTask>,
    output_dir: PathBuf,
    staging_root: PathBuf,
    task_retries: u32,
}

async fn run_worker<F: SessionFactory>(ctx: WorkerContext<F>) -> Result<()> {
    let dir = WorkerDirectory::create(&ctx.staging_root, ctx.worker_id)?;

    let mut session = match ctx.factory.open_session(Some(dir.path())).await {
        Ok(session) => session,
        Err(e) => {
            dir.close()?;
            return Err(e);
        }
    };
    tracing::debug!(worker = ctx.worker_id, "worker ready");

    let mut processed = 0usize;
    while let Some(mut task) = pop_task(&ctx.queue) {
        for attempt in 0..=ctx.task_retries {
            task.begin_attempt();
            track(&ctx.in_flight, ctx.worker_id, Some(&task));
            if let Err(e) = dir.clear() {
                tracing::warn!(worker = ctx.worker_id, "could not clear worker directory: {}", e);
            }

            match ctx
                .reconciler
                .reconcile_as(
                    &task.entry,
                    &task.file_name,
                    &mut session,
                    dir.path(),
                    &ctx.output_dir,
                )
                .await
            {
                Ok(path) => {
                    task.succeed(path);
                    break;
                }
                Err(e) => {
                    tracing::warn!(
                        worker = ctx.worker_id,
                        entry = %task.entry,
                        attempt = attempt + 1,
                        "download failed: {}",
                        e
                    );
                    task.fail(e.to_string());
                }
            }
        }

        processed += 1;
        track(&ctx.in_flight, ctx.worker_id, None);
        if ctx.results.send(task).is_err() {
            break;
        }
    }

    let closed = session.close().await;
    dir.close()?;
    if let Err(e) = closed {
        tracing::warn!(worker = ctx.worker_id, "browser session did not close cleanly: {}", e);
    }

    tracing::debug!(worker = ctx.worker_id, processed, "worker finished");
    Ok(())
}

fn pop_task(queue: &TaskQueue) -> Option<DownloadTask> {
    let mut guard = queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.pop_front()
}

fn take_all(queue: &TaskQueue) -> Vec<DownloadTask> {
    let mut guard = queue.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.drain(..).collect()
}

fn track(in_flight: &InFlight, worker_id: usize, task: Option<&DownloadTask>) {
    let mut guard = in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    match task {
        Some(task) => {
            guard.insert(worker_id, task.clone());
        }
        None => {
            guard.remove(&worker_id);
        }
    }
}

/// Turn catalog entries into tasks with distinct destination names.
///
/// One task per (region, station, pollutant); later duplicates are dropped.
/// An entry whose canonical name is already claimed (names compared without
/// case) gets the disambiguated name instead. If that is taken too, the task
/// is returned in the second list, already failed.
fn plan_tasks(entries: Vec<CatalogEntry>) -> (Vec<DownloadTask>, Vec<DownloadTask>) {
    let mut seen = HashSet::new();
    let mut claimed: HashMap<String, String> = HashMap::new();
    let mut queued = Vec::with_capacity(entries.len());
    let mut rejected = Vec::new();

    for entry in entries {
        let (region, station, pollutant) = entry.key();
        let key = (region.to_string(), station.to_string(), pollutant.to_string());
        if !seen.insert(key) {
            tracing::warn!(entry = %entry, "duplicate catalog entry skipped");
            continue;
        }

        let canonical = canonical_filename(&entry);
        let file_name = match claimed.get(&canonical.to_lowercase()) {
            None => canonical,
            Some(owner) => {
                let alternative = disambiguated_filename(&entry);
                if let Some(other) = claimed.get(&alternative.to_lowercase()) {
                    let mut task = DownloadTask::new(entry).with_file_name(alternative.clone());
                    task.fail(format!(
                        "file name {} is already used by {}",
                        alternative, other
                    ));
                    rejected.push(task);
                    continue;
                }
                tracing::warn!(
                    entry = %entry,
                    "{} is already used by {}, saving as {}",
                    canonical,
                    owner,
                    alternative
                );
                alternative
            }
        };

        claimed.insert(file_name.to_lowercase(), entry.to_string());
        queued.push(DownloadTask::new(entry).with_file_name(file_name));
    }

    (queued, rejected)
}
