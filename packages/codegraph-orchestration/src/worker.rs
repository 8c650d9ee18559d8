//! Background worker pool (C6, §5). Each worker polls the job queue with
//! `claim_next`'s `SKIP LOCKED` semantics and processes whatever it claims;
//! an idle worker backs off multiplicatively, capped at 10x the base poll
//! interval, and resets the moment it claims a job — mirroring the
//! original worker manager's backoff loop.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use codegraph_core::{Id, Settings};
use codegraph_storage::PostgresStore;
use tracing::{error, info};

use crate::parsing_service::ParsingService;

const BACKOFF_GROWTH: f64 = 1.5;
const BACKOFF_CAP: f64 = 10.0;

pub struct WorkerManager {
    store: Arc<PostgresStore>,
    settings: Settings,
    shutdown: Arc<AtomicBool>,
    instance_id: String,
    handles: Vec<tokio::task::JoinHandle<()>>,
}

impl WorkerManager {
    pub fn new(store: Arc<PostgresStore>, settings: Settings) -> Self {
        Self {
            store,
            settings,
            shutdown: Arc::new(AtomicBool::new(false)),
            instance_id: Id::new().to_string()[..8].to_string(),
            handles: Vec::new(),
        }
    }

    pub fn start(&mut self) {
        info!(num_workers = self.settings.worker_count, instance_id = %self.instance_id, "worker_manager_starting");

        for i in 0..self.settings.worker_count {
            let worker_id = format!("{}-worker-{i}", self.instance_id);
            let store = self.store.clone();
            let settings = self.settings.clone();
            let shutdown = self.shutdown.clone();

            let handle = tokio::spawn(async move {
                worker_loop(worker_id, store, settings, shutdown).await;
            });
            self.handles.push(handle);
        }

        info!(num_workers = self.handles.len(), "worker_manager_started");
    }

    pub async fn stop(&mut self) {
        info!("worker_manager_stopping");
        self.shutdown.store(true, Ordering::SeqCst);

        for handle in self.handles.drain(..) {
            let _ = handle.await;
        }

        info!("worker_manager_stopped");
    }

    pub fn is_running(&self) -> bool {
        !self.handles.is_empty() && !self.shutdown.load(Ordering::SeqCst)
    }
}

async fn worker_loop(worker_id: String, store: Arc<PostgresStore>, settings: Settings, shutdown: Arc<AtomicBool>) {
    info!(worker_id = %worker_id, "worker_started");
    let poll_interval = Duration::from_secs_f64(settings.job_poll_interval_seconds);
    let mut backoff_multiplier = 1.0f64;

    while !shutdown.load(Ordering::SeqCst) {
        match store.claim_next(&worker_id).await {
            Ok(Some(job)) => {
                backoff_multiplier = 1.0;
                process_job(job.id, job.repo_id, &worker_id, &store, &settings).await;
            }
            Ok(None) => {
                let wait = poll_interval.mul_f64(backoff_multiplier);
                backoff_multiplier = (backoff_multiplier * BACKOFF_GROWTH).min(BACKOFF_CAP);
                tokio::time::sleep(wait).await;
            }
            Err(e) => {
                error!(worker_id = %worker_id, error = %e, "worker_error");
                tokio::time::sleep(poll_interval.mul_f64(2.0)).await;
            }
        }
    }

    info!(worker_id = %worker_id, "worker_stopped");
}

async fn process_job(job_id: Id, repo_id: Id, worker_id: &str, store: &Arc<PostgresStore>, settings: &Settings) {
    info!(job_id = %job_id, repo_id = %repo_id, worker_id, "job_processing_started");
    let start = std::time::Instant::now();

    let service = ParsingService::new(store.clone(), settings.clone());
    match service.parse_repository(repo_id).await {
        Ok(()) => {
            if let Err(e) = store.mark_completed(job_id).await {
                error!(job_id = %job_id, error = %e, "failed_to_mark_job_completed");
            }
            info!(job_id = %job_id, repo_id = %repo_id, worker_id, duration_ms = start.elapsed().as_millis() as u64, "job_processing_completed");
        }
        Err(e) => {
            error!(job_id = %job_id, repo_id = %repo_id, worker_id, error = %e, "job_processing_failed");
            if let Err(mark_err) = store.mark_failed(job_id, &e.to_string()).await {
                error!(job_id = %job_id, error = %mark_err, "failed_to_mark_job_failed");
            }
        }
    }
}
