//! The per-worker request loop

use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error};
use url::Url;

use crate::client::{ProtocolClient, SendOutcome};
use crate::errors::Result;
use crate::job::{HttpType, Sample};
use crate::runner::JobController;

/// Run one worker until the per-worker cap, a stop transition or the first
/// request error. The worker owns its protocol client for the whole run.
pub(crate) async fn run_worker(
    controller: Arc<JobController>,
    worker_id: u64,
    samples: mpsc::Sender<Sample>,
) {
    // WebSocket workers dial once with a rendered URL; HTTP workers take a
    // freshly rendered URL on every request.
    let handshake_url = if controller.descriptor().request_http_type == HttpType::Ws {
        match controller.render_url() {
            Ok(url) => url,
            Err(e) => {
                fail_job(&controller, &samples, e.to_string()).await;
                return;
            }
        }
    } else {
        String::new()
    };
    let mut client = match ProtocolClient::connect(
        controller.descriptor(),
        &handshake_url,
        controller.proxy(),
    )
    .await
    {
        Ok(client) => client,
        Err(e) => {
            fail_job(&controller, &samples, e.to_string()).await;
            return;
        }
    };

    let per_worker = controller.descriptor().requests_per_worker();
    let mut interval_timer = controller.descriptor().worker_interval().map(|pause| {
        let mut timer = interval(pause);
        // No catch-up: a slow response extends the interval.
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        timer
    });

    let mut sent = 0u64;
    loop {
        if controller.is_stopped() {
            break;
        }
        if per_worker > 0 && sent >= per_worker {
            break;
        }
        if let Some(timer) = interval_timer.as_mut() {
            timer.tick().await;
        }

        let started = Instant::now();
        match request_once(&controller, &mut client).await {
            Ok(outcome) => {
                sent += 1;
                let sample = Sample::success(
                    outcome.status_code,
                    started.elapsed(),
                    outcome.bytes_read,
                );
                // Backpressure point: blocks if the aggregator lags.
                if samples.send(sample).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                fail_job(&controller, &samples, e.to_string()).await;
                break;
            }
        }

        if controller.is_stopped() {
            break;
        }
    }

    client.close().await;
    debug!("worker {} done after {} requests", worker_id, sent);
}

async fn request_once(
    controller: &Arc<JobController>,
    client: &mut ProtocolClient,
) -> Result<SendOutcome> {
    let url = controller.render_url()?;
    let body = controller.render_body()?;
    Url::parse(&url)?;
    client.send(&url, &body).await
}

/// Record the error sample, remember the first failure and stop the job.
async fn fail_job(
    controller: &Arc<JobController>,
    samples: &mpsc::Sender<Sample>,
    message: String,
) {
    error!("request error: {}", message);
    let _ = samples.send(Sample::failure(message.clone())).await;
    controller.record_failure(&message);
    controller.stop();
}
