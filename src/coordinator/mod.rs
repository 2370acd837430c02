//! Peer fan-out for distributed runs
//!
//! The coordinator POSTs the descriptor as JSON to `http://<peer>/` on
//! every configured peer concurrently and collects their reports. A failed
//! peer contributes nothing; it never aborts the job.

use futures_util::future::join_all;
use tracing::{debug, warn};

use crate::errors::{BarrageError, Result};
use crate::job::JobDescriptor;
use crate::metrics::StressReport;

/// Forward the descriptor to every peer; returns the reports that came back.
pub async fn fan_out(peers: &[String], descriptor: &JobDescriptor) -> Vec<StressReport> {
    let client = match reqwest::Client::builder().build() {
        Ok(client) => client,
        Err(e) => {
            warn!("peer client build failed: {}", e);
            return Vec::new();
        }
    };

    let requests = peers.iter().map(|peer| {
        let client = client.clone();
        let descriptor = descriptor.clone();
        let peer = peer.clone();
        async move {
            match post_descriptor(&client, &peer, &descriptor).await {
                Ok(report) => Some(report),
                Err(e) => {
                    warn!("peer {} skipped: {}", peer, e);
                    None
                }
            }
        }
    });

    join_all(requests).await.into_iter().flatten().collect()
}

async fn post_descriptor(
    client: &reqwest::Client,
    peer: &str,
    descriptor: &JobDescriptor,
) -> Result<StressReport> {
    let uri = format!("http://{}/", peer);
    debug!("forwarding job {} to {}", descriptor.sequence_id, uri);
    let response = client.post(&uri).json(descriptor).send().await?;
    if !response.status().is_success() {
        return Err(BarrageError::peer(format!(
            "{} returned status {}",
            peer,
            response.status()
        )));
    }
    Ok(response.json::<StressReport>().await?)
}
