use std::process;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use barrage::config::{parser, Config, RunMode};
use barrage::coordinator;
use barrage::engine::{self, EngineContext};
use barrage::errors::Result;
use barrage::job::{Command, JobDescriptor};
use barrage::server;

fn main() {
    let config = match Config::from_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if config.example {
        println!("{}", parser::EXAMPLES);
        return;
    }

    init_logging(&config);

    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if let Some(cpus) = config.cpus {
        builder.worker_threads(cpus.max(1));
    }
    let runtime = match builder.build() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("runtime build error: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        error!("{}", e);
        process::exit(1);
    }
}

async fn run(config: Config) -> Result<()> {
    // A garbage-collector pacing hint in the ancestry of this tool; there
    // is no collector here, so it only gets acknowledged.
    if std::env::var("BENCH_GC").as_deref() == Ok("1") {
        debug!("BENCH_GC=1 set; accepted as a no-op");
    }

    let ctx = Arc::new(EngineContext::new(
        config.peers.clone(),
        config.proxy.clone(),
    ));

    match config.mode.clone() {
        RunMode::Worker(addr) => server::serve_worker(&addr, ctx).await,
        RunMode::Dashboard(addr) => server::serve_dashboard(&addr, ctx).await,
        RunMode::Bench => run_bench(config, ctx).await,
    }
}

async fn run_bench(config: Config, ctx: Arc<EngineContext>) -> Result<()> {
    let current_job: Arc<Mutex<Option<JobDescriptor>>> = Arc::new(Mutex::new(None));
    setup_signal_handler(Arc::clone(&ctx), Arc::clone(&current_job));

    for url in &config.urls {
        let descriptor = config.to_descriptor(url, Utc::now().timestamp());
        debug!("job descriptor: {}", descriptor);
        *current_job.lock().expect("job slot lock poisoned") = Some(descriptor.clone());

        let report = engine::run_job(&ctx, descriptor).await;
        report.print();
        if report.err_code != 0 {
            warn!("job finished with error: {}", report.err_msg);
        }
    }
    Ok(())
}

/// Ctrl-C transitions running jobs to stop, locally and on peers.
fn setup_signal_handler(ctx: Arc<EngineContext>, current_job: Arc<Mutex<Option<JobDescriptor>>>) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("failed to listen for ctrl+c: {}", e);
            return;
        }
        info!("received stop signal, stopping jobs");
        let stop_descriptor = current_job
            .lock()
            .expect("job slot lock poisoned")
            .as_ref()
            .map(|descriptor| descriptor.with_cmd(Command::Stop));
        if let Some(descriptor) = stop_descriptor {
            if !ctx.peers.is_empty() {
                coordinator::fan_out(&ctx.peers, &descriptor).await;
            }
        }
        ctx.stop_all().await;
    });
}

/// Map `--verbose 0..3` onto the tracing stack.
fn init_logging(config: &Config) {
    let level = match config.verbose {
        0 => "trace",
        1 => "debug",
        2 => "info",
        _ => "error",
    };

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(
                    format!("barrage={}", level)
                        .parse()
                        .expect("Invalid filter directive"),
                )
                .add_directive(
                    "tokio_tungstenite=warn"
                        .parse()
                        .expect("Invalid filter directive"),
                )
                .add_directive(
                    "tungstenite=warn"
                        .parse()
                        .expect("Invalid filter directive"),
                ),
        )
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("logging already initialized");
    }
}
