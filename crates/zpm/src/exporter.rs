//! HTTP exposition server.

use std::net::IpAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tower_http::compression::CompressionLayer;
use tracing::{error, info};

use zpm_core::collector::zfs::{DEFAULT_IOSTAT_DEVICE_TYPE, DEFAULT_ZPOOL_PATH};
use zpm_core::collector::{Collector, FailurePolicy, SourceConfig, SystemRunner};
use zpm_core::exposition::{self, CONTENT_TYPE};

#[derive(clap::Args)]
pub struct ExporterArgs {
    /// Address to listen on.
    #[arg(short, long, default_value = "0.0.0.0", env = "ZPM_LISTEN_ADDRESS")]
    listen_address: IpAddr,

    /// Port to listen on.
    #[arg(short, long, default_value_t = 9199, env = "ZPM_PORT")]
    port: u16,

    /// Export disk statistics from iostat.
    #[arg(short = 'I', long)]
    iostat: bool,

    /// Export pool statistics from zpool list.
    #[arg(short = 'L', long)]
    list: bool,

    /// Export ARC statistics from sysctl.
    #[arg(short = 'A', long)]
    arcstats: bool,

    /// Export last run times from this cron ledger.
    #[arg(short = 'C', long, value_name = "PATH", env = "ZPM_CRONDB")]
    crondb: Option<PathBuf>,

    /// Serve the remaining sources when one fails instead of failing the scrape.
    #[arg(long)]
    best_effort: bool,

    /// Path to the zpool binary.
    #[arg(long, default_value = DEFAULT_ZPOOL_PATH)]
    zpool_path: String,

    /// Device type passed to `iostat -t`.
    #[arg(long, default_value = DEFAULT_IOSTAT_DEVICE_TYPE)]
    iostat_type: String,
}

impl ExporterArgs {
    fn source_config(&self) -> SourceConfig {
        SourceConfig {
            iostat: self.iostat,
            zpool_list: self.list,
            arcstats: self.arcstats,
            cron_db: self.crondb.clone(),
            zpool_path: self.zpool_path.clone(),
            iostat_device_type: self.iostat_type.clone(),
            failure_policy: if self.best_effort {
                FailurePolicy::BestEffort
            } else {
                FailurePolicy::Abort
            },
        }
    }
}

pub fn run(args: ExporterArgs) -> ExitCode {
    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(serve(args)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server error");
            ExitCode::FAILURE
        }
    }
}

async fn serve(args: ExporterArgs) -> std::io::Result<()> {
    let collector = Collector::new(SystemRunner, &args.source_config());
    info!(
        version = zpm_core::VERSION,
        sources = ?collector.source_names(),
        policy = ?collector.failure_policy(),
        "starting exporter"
    );

    let app = router(Arc::new(collector));
    let listener = tokio::net::TcpListener::bind((args.listen_address, args.port)).await?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

fn router(collector: Arc<Collector>) -> Router {
    Router::new()
        .route("/", get(handle_metrics))
        .route("/metrics", get(handle_metrics))
        .route("/health", get(handle_health))
        .with_state(collector)
        .layer(CompressionLayer::new())
}

async fn handle_metrics(State(collector): State<Arc<Collector>>) -> Response {
    // Sources shell out and read SQLite; keep them off the async workers.
    let rendered = tokio::task::spawn_blocking(move || exposition::render(&collector)).await;

    match rendered {
        Ok(Ok(body)) => ([(header::CONTENT_TYPE, CONTENT_TYPE)], body).into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "scrape failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
        Err(e) => {
            error!(error = %e, "scrape task failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

async fn handle_health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use clap::Parser;
    use tower::ServiceExt;
    use zpm_core::collector::MockRunner;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        args: ExporterArgs,
    }

    fn app(runner: MockRunner) -> Router {
        router(Arc::new(Collector::new(runner, &SourceConfig::default())))
    }

    async fn get_path(app: Router, path: &str) -> (StatusCode, String) {
        let response = app
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_metrics_ok() {
        let (status, body) = get_path(app(MockRunner::freebsd_host()), "/metrics").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("zpm_pool_online{pool=\"zroot\"} 1"));
        assert!(body.contains("zpm_arcstats_hits_total"));
    }

    #[tokio::test]
    async fn test_root_serves_metrics() {
        let (status, body) = get_path(app(MockRunner::freebsd_host()), "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("zpm_iostat_reads_total"));
    }

    #[tokio::test]
    async fn test_failing_source_is_500() {
        let (status, body) = get_path(app(MockRunner::bare_host()), "/metrics").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!body.contains("zpm_"));
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_path(app(MockRunner::bare_host()), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "ok");
    }

    #[test]
    fn test_source_flags() {
        let cli = TestCli::try_parse_from(["zpm", "-L", "-A", "--best-effort", "-p", "9100"])
            .unwrap();
        let config = cli.args.source_config();
        assert!(!config.iostat);
        assert!(config.zpool_list);
        assert!(config.arcstats);
        assert_eq!(config.failure_policy, FailurePolicy::BestEffort);
        assert_eq!(cli.args.port, 9100);
        assert_eq!(config.zpool_path, DEFAULT_ZPOOL_PATH);
    }
}
