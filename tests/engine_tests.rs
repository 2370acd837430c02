//! End-to-end scenarios against in-process echo servers.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::Uri;
use axum::Router;
use futures_util::{SinkExt, StreamExt};

use barrage::constants::SCALE;
use barrage::engine::{self, EngineContext};
use barrage::job::{Command, HttpType, JobDescriptor};
use barrage::server;

async fn serve(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Echo endpoint: 200 with an empty body on any method and path.
async fn http_echo() -> SocketAddr {
    serve(Router::new().fallback(|| async { "" })).await
}

/// Endpoint that records each request's query string.
async fn capturing_server(log: Arc<Mutex<Vec<String>>>) -> SocketAddr {
    let app = Router::new()
        .fallback(
            |State(log): State<Arc<Mutex<Vec<String>>>>, uri: Uri| async move {
                log.lock()
                    .unwrap()
                    .push(uri.query().unwrap_or_default().to_string());
                ""
            },
        )
        .with_state(log);
    serve(app).await
}

/// WebSocket echoer speaking raw tungstenite.
async fn ws_echo() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let (stream, _) = match listener.accept().await {
                Ok(conn) => conn,
                Err(_) => break,
            };
            tokio::spawn(async move {
                let mut ws = match tokio_tungstenite::accept_async(stream).await {
                    Ok(ws) => ws,
                    Err(_) => return,
                };
                while let Some(Ok(message)) = ws.next().await {
                    if message.is_close() {
                        break;
                    }
                    if (message.is_text() || message.is_binary())
                        && ws.send(message).await.is_err()
                    {
                        break;
                    }
                }
            });
        }
    });
    addr
}

fn local_ctx() -> Arc<EngineContext> {
    Arc::new(EngineContext::new(Vec::new(), None))
}

#[tokio::test(flavor = "multi_thread")]
async fn single_worker_fixed_count() {
    let addr = http_echo().await;
    let descriptor = JobDescriptor {
        sequence_id: 1,
        n: 10,
        c: 1,
        duration: 30,
        url: format!("http://{}/", addr),
        ..Default::default()
    };

    let report = engine::run_job(&local_ctx(), descriptor).await;

    assert_eq!(report.err_code, 0, "unexpected error: {}", report.err_msg);
    assert_eq!(report.lats_total, 10);
    assert_eq!(report.status_code_dist.get(&200), Some(&10));
    assert_eq!(report.size_total, 0);
    assert!(report.error_dist.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn concurrency_cap_never_exceeds_n() {
    let addr = http_echo().await;
    let descriptor = JobDescriptor {
        sequence_id: 2,
        n: 10,
        c: 3,
        duration: 30,
        url: format!("http://{}/", addr),
        ..Default::default()
    };

    let report = engine::run_job(&local_ctx(), descriptor).await;

    // c * floor(n/c) <= total <= n
    assert!(report.lats_total >= 9, "got {}", report.lats_total);
    assert!(report.lats_total <= 10, "got {}", report.lats_total);
}

#[tokio::test(flavor = "multi_thread")]
async fn duration_cap_and_qps_convergence() {
    let addr = http_echo().await;
    let descriptor = JobDescriptor {
        sequence_id: 3,
        n: 0,
        c: 4,
        duration: 2,
        qps: 100,
        url: format!("http://{}/", addr),
        ..Default::default()
    };

    let report = engine::run_job(&local_ctx(), descriptor).await;

    assert_eq!(report.err_code, 0, "unexpected error: {}", report.err_msg);
    assert!(
        report.duration >= 18 * SCALE / 10 && report.duration <= 26 * SCALE / 10,
        "duration out of band: {}",
        report.duration
    );
    assert!(
        (150..=260).contains(&report.lats_total),
        "lats_total out of band: {}",
        report.lats_total
    );
    // Aggregate rate should converge on qps, scaled.
    assert!(
        report.rps >= 70 * SCALE && report.rps <= 130 * SCALE,
        "rps out of band: {}",
        report.rps
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn websocket_echo_counts_frames() {
    let addr = ws_echo().await;
    let descriptor = JobDescriptor {
        sequence_id: 4,
        n: 6,
        c: 2,
        duration: 30,
        request_http_type: HttpType::Ws,
        request_body: "ping".to_string(),
        url: format!("ws://{}/", addr),
        ..Default::default()
    };

    let report = engine::run_job(&local_ctx(), descriptor).await;

    assert_eq!(report.err_code, 0, "unexpected error: {}", report.err_msg);
    assert_eq!(report.status_code_dist.get(&200), Some(&6));
    assert_eq!(report.lats_total, 6);
    // each echoed frame is the 4-byte body
    assert_eq!(report.size_total, 24);
}

#[tokio::test(flavor = "multi_thread")]
async fn coordinator_merges_peer_reports() {
    let target = http_echo().await;

    let peer_a = serve(server::worker_router(local_ctx())).await;
    let peer_b = serve(server::worker_router(local_ctx())).await;

    let coordinator = Arc::new(EngineContext::new(
        vec![peer_a.to_string(), peer_b.to_string()],
        None,
    ));
    let descriptor = JobDescriptor {
        sequence_id: 5,
        n: 5,
        c: 1,
        duration: 30,
        url: format!("http://{}/", target),
        ..Default::default()
    };

    let report = engine::run_job(&coordinator, descriptor).await;

    assert_eq!(report.err_code, 0, "unexpected error: {}", report.err_msg);
    assert_eq!(report.lats_total, 10);
    assert_eq!(report.status_code_dist.get(&200), Some(&10));
}

#[tokio::test(flavor = "multi_thread")]
async fn coordinator_tolerates_a_dead_peer() {
    let target = http_echo().await;
    let peer_alive = serve(server::worker_router(local_ctx())).await;

    let coordinator = Arc::new(EngineContext::new(
        // nothing listens on the discard port
        vec![peer_alive.to_string(), "127.0.0.1:9".to_string()],
        None,
    ));
    let descriptor = JobDescriptor {
        sequence_id: 6,
        n: 5,
        c: 1,
        duration: 30,
        url: format!("http://{}/", target),
        ..Default::default()
    };

    let report = engine::run_job(&coordinator, descriptor).await;

    assert_eq!(report.err_code, 0, "peer failure must not fail the job");
    assert_eq!(report.lats_total, 5);
}

#[tokio::test(flavor = "multi_thread")]
async fn all_peers_down_reports_empty_result() {
    let coordinator = Arc::new(EngineContext::new(
        vec!["127.0.0.1:9".to_string()],
        None,
    ));
    let descriptor = JobDescriptor {
        sequence_id: 7,
        n: 5,
        c: 1,
        url: "http://127.0.0.1:9/".to_string(),
        ..Default::default()
    };

    let report = engine::run_job(&coordinator, descriptor).await;
    assert_eq!(report.err_code, -1);
    assert_eq!(report.lats_total, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn template_expansion_is_stable_per_job() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let addr = capturing_server(Arc::clone(&log)).await;

    let descriptor = JobDescriptor {
        sequence_id: 8,
        n: 3,
        c: 1,
        duration: 30,
        url: format!("http://{}/?x={{{{ randomNum 3 }}}}&u={{{{ UUID }}}}", addr),
        ..Default::default()
    };

    let report = engine::run_job(&local_ctx(), descriptor).await;
    assert_eq!(report.err_code, 0, "unexpected error: {}", report.err_msg);

    let queries = log.lock().unwrap().clone();
    assert_eq!(queries.len(), 3);

    let mut uuids = Vec::new();
    for query in &queries {
        let mut x_value = None;
        let mut u_value = None;
        for pair in query.split('&') {
            if let Some(v) = pair.strip_prefix("x=") {
                x_value = Some(v.to_string());
            }
            if let Some(v) = pair.strip_prefix("u=") {
                u_value = Some(v.to_string());
            }
        }
        let x = x_value.expect("x missing");
        assert_eq!(x.len(), 3);
        assert!(x.chars().all(|c| c.is_ascii_digit()), "x = {:?}", x);
        uuids.push(u_value.expect("u missing"));
    }
    assert!(uuids.windows(2).all(|w| w[0] == w[1]), "UUID varied: {:?}", uuids);
}

#[tokio::test(flavor = "multi_thread")]
async fn first_transport_error_stops_the_job() {
    // discard port: every request fails fast
    let descriptor = JobDescriptor {
        sequence_id: 9,
        n: 100,
        c: 2,
        duration: 30,
        timeout_ms: 500,
        url: "http://127.0.0.1:9/".to_string(),
        ..Default::default()
    };

    let report = engine::run_job(&local_ctx(), descriptor).await;

    assert_eq!(report.err_code, -1);
    assert!(!report.err_msg.is_empty());
    assert!(!report.error_dist.is_empty());
    // far fewer than n requests: the first error stopped everything
    assert!(report.lats_total < 100);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_command_cuts_a_duration_job_short() {
    let addr = http_echo().await;
    let ctx = local_ctx();

    let start_descriptor = JobDescriptor {
        sequence_id: 10,
        n: 0,
        c: 2,
        duration: 30,
        qps: 50,
        url: format!("http://{}/", addr),
        ..Default::default()
    };

    let runner = {
        let ctx = Arc::clone(&ctx);
        let descriptor = start_descriptor.clone();
        tokio::spawn(async move { engine::run_job(&ctx, descriptor).await })
    };

    tokio::time::sleep(Duration::from_millis(400)).await;
    let stop = engine::run_job(&ctx, start_descriptor.with_cmd(Command::Stop)).await;
    assert_eq!(stop.err_code, 0, "stop snapshot errored: {}", stop.err_msg);

    // idempotent: a second stop is harmless (the registry entry is gone)
    let second = engine::run_job(&ctx, start_descriptor.with_cmd(Command::Stop)).await;
    assert_eq!(second.err_code, -1);

    let report = runner.await.unwrap();
    assert_eq!(report.err_code, 0, "unexpected error: {}", report.err_msg);
    assert!(
        report.duration < 10 * SCALE,
        "stop did not cut the run short: {}",
        report.duration
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn coordinator_stop_reaches_the_peer() {
    let target = http_echo().await;
    let peer = serve(server::worker_router(local_ctx())).await;

    let coordinator = Arc::new(EngineContext::new(vec![peer.to_string()], None));
    let start_descriptor = JobDescriptor {
        sequence_id: 13,
        n: 0,
        c: 2,
        duration: 30,
        qps: 50,
        url: format!("http://{}/", target),
        ..Default::default()
    };

    let runner = {
        let coordinator = Arc::clone(&coordinator);
        let descriptor = start_descriptor.clone();
        tokio::spawn(async move { engine::run_job(&coordinator, descriptor).await })
    };

    tokio::time::sleep(Duration::from_millis(400)).await;
    let stop = engine::run_job(&coordinator, start_descriptor.with_cmd(Command::Stop)).await;
    assert_eq!(stop.err_code, 0, "coordinator stop errored: {}", stop.err_msg);
    assert!(stop.lats_total > 0, "peer snapshot saw no samples");

    let report = runner.await.unwrap();
    assert_eq!(report.err_code, 0, "unexpected error: {}", report.err_msg);
    assert!(
        report.duration < 10 * SCALE,
        "stop did not cut the peer's run short: {}",
        report.duration
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn metrics_snapshots_a_running_job() {
    let addr = http_echo().await;
    let ctx = local_ctx();

    let descriptor = JobDescriptor {
        sequence_id: 11,
        n: 0,
        c: 1,
        duration: 2,
        qps: 100,
        url: format!("http://{}/", addr),
        ..Default::default()
    };

    let runner = {
        let ctx = Arc::clone(&ctx);
        let descriptor = descriptor.clone();
        tokio::spawn(async move { engine::run_job(&ctx, descriptor).await })
    };

    tokio::time::sleep(Duration::from_millis(800)).await;
    let snapshot = engine::run_job(&ctx, descriptor.with_cmd(Command::Metrics)).await;
    assert_eq!(snapshot.err_code, 0);
    assert!(snapshot.lats_total > 0, "snapshot saw no samples");

    let report = runner.await.unwrap();
    assert!(report.lats_total >= snapshot.lats_total);
}

#[tokio::test(flavor = "multi_thread")]
async fn csv_output_lists_buckets_in_order() {
    let addr = http_echo().await;
    let descriptor = JobDescriptor {
        sequence_id: 12,
        n: 20,
        c: 2,
        duration: 30,
        output: "csv".to_string(),
        url: format!("http://{}/", addr),
        ..Default::default()
    };

    let report = engine::run_job(&local_ctx(), descriptor).await;
    let csv = report.render_csv();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Duration,Count");
    assert!(lines.len() > 1);

    let buckets: Vec<&str> = lines[1..]
        .iter()
        .map(|line| line.split(',').next().unwrap())
        .collect();
    let mut sorted = buckets.clone();
    sorted.sort();
    assert_eq!(buckets, sorted, "bucket rows must be sorted");
}
