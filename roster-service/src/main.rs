use std::{env, net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use tower_http::trace::{DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use roster_service::{
    api::{handler::jobs, handler::solve, state::AppState},
    config::ServiceConfig,
    domain::service::SolveService,
    infrastructure::{
        jobs::RedisJobStore, ratio_cache::DiskRatioCache, webhook::HttpWebhookNotifier,
    },
};

#[derive(OpenApi)]
#[openapi(
    paths(
        solve::solve,
        solve::solve_v2,
        jobs::submit,
        jobs::status,
        jobs::result,
        jobs::cancel,
    ),
    tags(
        (name = "Solve", description = "Synchronous rostering"),
        (name = "Jobs", description = "Asynchronous solve jobs"),
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    shared::telemetry::init_telemetry("roster-service");

    let config_path =
        env::var("ROSTER_CONFIG_PATH").unwrap_or_else(|_| "roster-service.toml".to_string());
    let config = ServiceConfig::load(&config_path).expect("Failed to load service config");
    let port = config.port;

    let job_store = Arc::new(
        RedisJobStore::new(&config.redis_url)
            .await
            .expect("Failed to connect to the job store"),
    );
    let notifier = Arc::new(HttpWebhookNotifier::new());
    let ratio_cache = Arc::new(DiskRatioCache::new(config.ratio_cache_path.clone()));

    let solve_service = Arc::new(SolveService::new(
        job_store,
        notifier,
        ratio_cache,
        config,
    ));
    solve_service.spawn_workers();

    let state = Arc::new(AppState {
        solve_service: solve_service.clone(),
    });

    let governor_conf = GovernorConfigBuilder::default()
        .per_second(2)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .use_headers()
        .finish()
        .expect("Failed to build governor config");

    let app = Router::new()
        .route(
            "/health",
            get(|| async {
                axum::Json(shared::responses::HealthResponse {
                    status: "ok",
                    service: "roster-service",
                })
            }),
        )
        .route("/api/v1/solve", post(solve::solve))
        .route("/api/v2/solve", post(solve::solve_v2))
        .route("/api/v1/jobs", post(jobs::submit))
        .route("/api/v1/jobs/{job_id}/status", get(jobs::status))
        .route("/api/v1/jobs/{job_id}/result", get(jobs::result))
        .route("/api/v1/jobs/{job_id}/cancel", post(jobs::cancel))
        // Swagger UI
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        // Rate limiting (per-IP, 2 req/s with burst of 10)
        .layer(GovernorLayer::new(governor_conf))
        .layer(
            TraceLayer::new_for_http()
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(
                    DefaultOnResponse::new()
                        .level(Level::INFO)
                        .latency_unit(tower_http::LatencyUnit::Millis),
                ),
        )
        .with_state(state);

    tracing::info!("roster-service listening on 0.0.0.0:{port}");

    let listener = TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("Failed to bind");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shared::shutdown::shutdown_signal())
    .await
    .expect("Server crashed");

    // stop accepting work, then drain in-flight jobs
    solve_service.shutdown();
    let task_tracker = solve_service.task_tracker();
    task_tracker.close();
    tracing::info!("Waiting for in-flight jobs to finish...");
    if tokio::time::timeout(
        shared::shutdown::DEFAULT_SHUTDOWN_TIMEOUT,
        task_tracker.wait(),
    )
    .await
    .is_err()
    {
        tracing::warn!("Shutdown timeout reached, some jobs may not have finished");
    }
    tracing::info!("roster-service shut down");
}
