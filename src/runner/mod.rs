//! Job lifecycle: spawning workers, duration expiry, stop handling and
//! report finalization
//!
//! One [`JobController`] per job owns the stop flag, the sample channel and
//! the report lock. Workers hold an `Arc` back to it and poll the flag; the
//! controller never reaches into a running worker.

pub mod worker;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, mpsc, RwLock};
use tokio::time::sleep;
use tracing::{debug, error, info};
use url::Url;

use crate::errors::Result;
use crate::job::{JobDescriptor, Sample};
use crate::metrics::StressReport;
use crate::template::{RenderContext, Template};

/// Owns one job from `start` to `done`.
pub struct JobController {
    descriptor: JobDescriptor,
    url_template: Template,
    body_template: Template,
    render: RenderContext,
    stop_flag: AtomicBool,
    stop_tx: broadcast::Sender<()>,
    report: RwLock<StressReport>,
    failure: StdMutex<Option<String>>,
    proxy: Option<Url>,
}

impl JobController {
    /// Parse the job's templates once and set up the shared state.
    pub fn new(descriptor: JobDescriptor, proxy: Option<Url>) -> Result<Arc<Self>> {
        let url_template = Template::parse(&descriptor.url)?;
        let body_template = Template::parse(&descriptor.request_body)?;
        let (stop_tx, _) = broadcast::channel(1);

        let mut report = StressReport::new();
        report.output = descriptor.output.clone();

        Ok(Arc::new(Self {
            descriptor,
            url_template,
            body_template,
            render: RenderContext::new(),
            stop_flag: AtomicBool::new(false),
            stop_tx,
            report: RwLock::new(report),
            failure: StdMutex::new(None),
            proxy,
        }))
    }

    pub fn descriptor(&self) -> &JobDescriptor {
        &self.descriptor
    }

    pub fn proxy(&self) -> Option<&Url> {
        self.proxy.as_ref()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    /// Transition the job to stop. Idempotent; safe from the duration
    /// timer, the signal handler, a peer-forwarded stop or a failing worker.
    pub fn stop(&self) {
        if !self.stop_flag.swap(true, Ordering::SeqCst) {
            let _ = self.stop_tx.send(());
        }
    }

    /// First worker error wins; later ones are already covered by the stop.
    pub fn record_failure(&self, message: &str) {
        let mut failure = self.failure.lock().expect("failure lock poisoned");
        if failure.is_none() {
            *failure = Some(message.to_string());
        }
    }

    pub(crate) fn render_url(&self) -> Result<String> {
        self.url_template.render(&self.render)
    }

    pub(crate) fn render_body(&self) -> Result<String> {
        self.body_template.render(&self.render)
    }

    /// Copy of the running aggregate; never blocks workers beyond the
    /// read-lock acquisition.
    pub async fn snapshot(&self) -> StressReport {
        self.report.read().await.clone()
    }

    /// Drive the job to completion and return the final report.
    pub async fn run(self: &Arc<Self>) -> StressReport {
        let concurrency = self.descriptor.c.max(1);
        let (sample_tx, mut sample_rx) =
            mpsc::channel::<Sample>((2 * concurrency + 1) as usize);
        let started = Instant::now();

        info!(
            "running {} workers @ {}",
            concurrency, self.descriptor.url
        );

        // Single consumer; the only writer to the report while running.
        let aggregator = {
            let controller = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(sample) = sample_rx.recv().await {
                    let mut report = controller.report.write().await;
                    report.record(&sample);
                }
            })
        };

        // Duration expiry is equivalent to stop.
        if self.descriptor.duration > 0 {
            let controller = Arc::clone(self);
            let mut stop_rx = self.stop_tx.subscribe();
            tokio::spawn(async move {
                tokio::select! {
                    _ = sleep(Duration::from_secs(controller.descriptor.duration)) => {
                        info!(
                            "duration cap hit after {}s",
                            controller.descriptor.duration
                        );
                        controller.stop();
                    }
                    _ = stop_rx.recv() => {}
                }
            });
        }

        let mut workers = Vec::with_capacity(concurrency as usize);
        for worker_id in 0..concurrency {
            let controller = Arc::clone(self);
            let samples = sample_tx.clone();
            workers.push(tokio::spawn(worker::run_worker(
                controller, worker_id, samples,
            )));
        }
        drop(sample_tx);

        for handle in workers {
            if let Err(e) = handle.await {
                error!("worker task failed: {}", e);
            }
        }
        self.stop();
        let total_elapsed = started.elapsed();

        if let Err(e) = aggregator.await {
            error!("aggregator task failed: {}", e);
        }
        debug!("all workers finished in {:?}", total_elapsed);

        let mut report = self.report.write().await;
        report.finalize(total_elapsed);
        let failure = self
            .failure
            .lock()
            .expect("failure lock poisoned")
            .clone();
        if let Some(message) = failure {
            report.set_error(message);
        }
        report.clone()
    }
}
