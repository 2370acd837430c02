//! Process-wide engine context and job dispatch
//!
//! The context is built once at startup and threaded through the CLI
//! driver and the control endpoint: the registry of live jobs, the peer
//! list for coordinator mode and the optional HTTP/1.1 proxy.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use url::Url;

use crate::coordinator;
use crate::job::{Command, JobDescriptor};
use crate::metrics::StressReport;
use crate::runner::JobController;

pub struct EngineContext {
    registry: RwLock<HashMap<i64, Arc<JobController>>>,
    pub peers: Vec<String>,
    pub proxy: Option<Url>,
}

impl EngineContext {
    pub fn new(peers: Vec<String>, proxy: Option<Url>) -> Self {
        Self {
            registry: RwLock::new(HashMap::new()),
            peers,
            proxy,
        }
    }

    async fn register(&self, sequence_id: i64, controller: Arc<JobController>) {
        self.registry.write().await.insert(sequence_id, controller);
    }

    async fn remove(&self, sequence_id: i64) -> Option<Arc<JobController>> {
        self.registry.write().await.remove(&sequence_id)
    }

    async fn get(&self, sequence_id: i64) -> Option<Arc<JobController>> {
        self.registry.read().await.get(&sequence_id).cloned()
    }

    /// Stop every registered job; used by the signal handler.
    pub async fn stop_all(&self) {
        for controller in self.registry.read().await.values() {
            controller.stop();
        }
    }
}

/// Dispatch one descriptor through its command. Both the CLI driver and
/// the control endpoint land here.
pub async fn run_job(ctx: &Arc<EngineContext>, descriptor: JobDescriptor) -> StressReport {
    match descriptor.cmd {
        Command::Start => start_job(ctx, descriptor).await,
        Command::Stop => stop_job(ctx, descriptor).await,
        Command::Metrics => metrics_job(ctx, descriptor).await,
    }
}

async fn start_job(ctx: &Arc<EngineContext>, descriptor: JobDescriptor) -> StressReport {
    // With peers configured the local process runs no workers: fan the
    // descriptor out and merge whatever comes back into a zero report.
    if !ctx.peers.is_empty() {
        let reports = coordinator::fan_out(&ctx.peers, &descriptor).await;
        let mut merged = StressReport::new();
        merged.output = descriptor.output.clone();
        if reports.is_empty() {
            warn!("no peer produced a report");
            merged.set_error("stress test result empty");
            return merged;
        }
        // Peers run the same clock; adopt the longest so rps derives.
        merged.duration = reports.iter().map(|r| r.duration).max().unwrap_or(0);
        merged.combine(reports);
        return merged;
    }

    let controller = match JobController::new(descriptor.clone(), ctx.proxy.clone()) {
        Ok(controller) => controller,
        Err(e) => {
            let mut report = StressReport::new();
            report.set_error(e.to_string());
            return report;
        }
    };

    ctx.register(descriptor.sequence_id, Arc::clone(&controller))
        .await;
    let report = controller.run().await;
    ctx.remove(descriptor.sequence_id).await;
    report
}

async fn stop_job(ctx: &Arc<EngineContext>, descriptor: JobDescriptor) -> StressReport {
    // Coordinator mode never registered a local controller; the stop fans
    // out and the peers' snapshots merge into the response.
    if !ctx.peers.is_empty() {
        let reports = coordinator::fan_out(&ctx.peers, &descriptor).await;
        let mut merged = StressReport::new();
        merged.output = descriptor.output.clone();
        merged.combine(reports);
        return merged;
    }
    match ctx.remove(descriptor.sequence_id).await {
        Some(controller) => {
            debug!("stopping job {}", descriptor.sequence_id);
            controller.stop();
            controller.snapshot().await
        }
        None => job_not_found(descriptor.sequence_id),
    }
}

async fn metrics_job(ctx: &Arc<EngineContext>, descriptor: JobDescriptor) -> StressReport {
    if !ctx.peers.is_empty() {
        let reports = coordinator::fan_out(&ctx.peers, &descriptor).await;
        let mut merged = StressReport::new();
        merged.combine(reports);
        return merged;
    }
    match ctx.get(descriptor.sequence_id).await {
        Some(controller) => controller.snapshot().await,
        None => job_not_found(descriptor.sequence_id),
    }
}

fn job_not_found(sequence_id: i64) -> StressReport {
    let mut report = StressReport::new();
    report.set_error(format!("job {} not found", sequence_id));
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_jobs_report_an_error() {
        let ctx = Arc::new(EngineContext::new(Vec::new(), None));
        let descriptor = JobDescriptor {
            sequence_id: 7,
            cmd: Command::Metrics,
            ..Default::default()
        };
        let report = run_job(&ctx, descriptor).await;
        assert_eq!(report.err_code, -1);
        assert!(report.err_msg.contains("not found"));
    }

    #[tokio::test]
    async fn registry_round_trips_controllers() {
        let ctx = EngineContext::new(Vec::new(), None);
        let controller = JobController::new(JobDescriptor::default(), None).unwrap();
        ctx.register(1, Arc::clone(&controller)).await;
        assert!(ctx.get(1).await.is_some());
        assert!(ctx.remove(1).await.is_some());
        assert!(ctx.get(1).await.is_none());
    }
}
