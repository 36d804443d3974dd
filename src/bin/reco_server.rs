//! Demo recommendation server.
//!
//! Binds the bandit service to HTTP/JSON with in-memory stores:
//! - CLI arguments with env fallbacks
//! - Structured logging with tracing
//! - Prometheus metrics exposition
//!
//! The binary trusts a `user_id` query/body field; real deployments put an
//! auth layer in front and bind durable store implementations instead.

use std::io;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use clap::Parser;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use reco_bandit::store::memory::{
    InMemoryConfigStore, InMemoryEventStore, InMemoryOfflineStore, InMemorySegmentStore,
    InMemoryStateStore, InMemoryUserContextStore,
};
use reco_bandit::store::{OfflineCandidateStore, UserContext};
use reco_bandit::{
    init_logging, BanditEvent, BanditService, ConfigRecord, Context, ContextValue, Error,
    LogFormat, OfflineCandidate, RequestContext,
};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser)]
#[command(name = "reco_server")]
#[command(version, about = "Contextual-bandit recommendation server", long_about = None)]
struct Cli {
    /// Listen address
    #[arg(long, env = "RECO_ADDR", default_value = "127.0.0.1:8080")]
    addr: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Output format (pretty, json, compact)
    #[arg(long, default_value = "pretty")]
    log_format: LogFormat,

    /// Seed demo offline candidates, configs, and user contexts
    #[arg(long)]
    seed_demo_data: bool,
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Deserialize)]
struct RecommendQuery {
    user_id: Option<u64>,
    slot: String,
    #[serde(default)]
    n: usize,
    platform: Option<String>,
}

#[derive(Deserialize)]
struct FeedbackRequest {
    user_id: Option<u64>,
    slot: String,
    product_id: u64,
    event_type: String,
    #[serde(default)]
    value: f64,
    #[serde(default)]
    context: Context,
}

#[derive(Deserialize)]
struct ConfigQuery {
    slot: String,
    variant: u32,
}

#[derive(Deserialize)]
struct SegmentQuery {
    user_id: u64,
}

#[derive(Deserialize)]
struct SegmentUpsert {
    user_id: u64,
    segment: u32,
}

#[derive(Deserialize)]
struct OfflineQuery {
    slot: String,
    #[serde(default = "default_offline_limit")]
    n: usize,
}

fn default_offline_limit() -> usize {
    10
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Service error → HTTP response.
struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::Cancelled => StatusCode::from_u16(499).unwrap_or(StatusCode::BAD_REQUEST),
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Store(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

#[derive(Clone)]
struct AppState {
    service: Arc<BanditService>,
    offline: Arc<InMemoryOfflineStore>,
}

fn request_context(headers: &HeaderMap) -> RequestContext {
    match headers.get("x-trace-id").and_then(|v| v.to_str().ok()) {
        Some(trace_id) if !trace_id.is_empty() => RequestContext::with_trace_id(trace_id),
        _ => RequestContext::new(),
    }
}

fn caller_context(platform: Option<&str>) -> Option<Context> {
    platform.map(|p| {
        let mut ctx = Context::new();
        ctx.insert("platform".to_string(), ContextValue::Str(p.to_string()));
        ctx
    })
}

// ============================================================================
// Handlers
// ============================================================================

async fn recommend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RecommendQuery>,
) -> Result<Response, ApiError> {
    let user_id = query.user_id.ok_or(Error::Unauthenticated)?;
    let ctx = request_context(&headers);
    let req_ctx = caller_context(query.platform.as_deref());

    let recs = state
        .service
        .recommend(&ctx, user_id, &query.slot, query.n, req_ctx.as_ref())
        .await?;
    Ok(Json(recs).into_response())
}

async fn debug_recommend(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<RecommendQuery>,
) -> Result<Response, ApiError> {
    let user_id = query.user_id.ok_or(Error::Unauthenticated)?;
    let ctx = request_context(&headers);
    let req_ctx = caller_context(query.platform.as_deref());

    let recs = state
        .service
        .debug_recommend(&ctx, user_id, &query.slot, query.n, req_ctx.as_ref())
        .await?;
    Ok(Json(recs).into_response())
}

async fn log_feedback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<FeedbackRequest>,
) -> Result<Response, ApiError> {
    let user_id = body.user_id.ok_or(Error::Unauthenticated)?;
    let ctx = request_context(&headers);

    let event = BanditEvent {
        user_id,
        slot: body.slot,
        product_id: body.product_id,
        event_type: body.event_type,
        value: body.value,
        context: body.context,
        ..BanditEvent::default()
    };
    state.service.log_feedback(&ctx, event).await?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

async fn get_config(
    State(state): State<AppState>,
    Query(query): Query<ConfigQuery>,
) -> Result<Response, ApiError> {
    let record = state.service.get_config(&query.slot, query.variant).await?;
    Ok(Json(record).into_response())
}

async fn upsert_config(
    State(state): State<AppState>,
    Json(record): Json<ConfigRecord>,
) -> Result<Response, ApiError> {
    state.service.upsert_config(&record).await?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

async fn get_segment(
    State(state): State<AppState>,
    Query(query): Query<SegmentQuery>,
) -> Result<Response, ApiError> {
    let segment = state.service.get_segment(query.user_id).await?;
    Ok(Json(json!({ "user_id": query.user_id, "segment": segment })).into_response())
}

async fn upsert_segment(
    State(state): State<AppState>,
    Json(body): Json<SegmentUpsert>,
) -> Result<Response, ApiError> {
    state
        .service
        .upsert_segment(body.user_id, body.segment)
        .await?;
    Ok(Json(json!({ "status": "ok" })).into_response())
}

/// Raw offline-ranker rows for a slot, for eyeballing what the bandit
/// reorders.
async fn offline_rows(
    State(state): State<AppState>,
    Query(query): Query<OfflineQuery>,
) -> Result<Response, ApiError> {
    let rows = state
        .offline
        .get_by_slot(&query.slot, query.n)
        .await
        .map_err(Error::from)?;
    Ok(Json(rows).into_response())
}

async fn metrics(State(state): State<AppState>) -> Response {
    state.service.metrics().render_prometheus().into_response()
}

// ============================================================================
// Wiring
// ============================================================================

async fn seed_demo_data(
    offline: &InMemoryOfflineStore,
    configs: &InMemoryConfigStore,
    user_contexts: &InMemoryUserContextStore,
) {
    offline.put(
        "home_top",
        (1..=30u64)
            .map(|pid| OfflineCandidate {
                product_id: 100 + pid,
                score: 1.0 - pid as f64 / 40.0,
            })
            .collect(),
    );
    offline.put(
        "pdp_similar",
        (1..=15u64)
            .map(|pid| OfflineCandidate {
                product_id: 200 + pid,
                score: 1.0 - pid as f64 / 20.0,
            })
            .collect(),
    );

    let record = ConfigRecord {
        slot: "home_top".to_string(),
        variant: 0,
        num_segments: 3,
        num_variants: 3,
        w_bandit: 0.7,
        w_offline: 0.3,
        explore_noise: 0.05,
        alpha: 1.0,
        value_weight: 0.0001,
        reward_impression: 0.0,
        reward_click: 1.0,
        reward_atc: 3.0,
        reward_order: 5.0,
        features: reco_bandit::FeatureFlags {
            use_bias: true,
            use_time_bucket: true,
            use_dow_bucket: true,
            use_slot_hash: true,
            use_segment: true,
            use_product_hash: true,
            use_user_hash: false,
        },
        w_global: 0.7,
        w_user: 0.3,
        max_arms_per_state: 300,
    };
    configs.upsert(record).await;

    user_contexts.put(
        1,
        UserContext {
            tier: Some("gold".to_string()),
            campaign_id: Some("spring_launch".to_string()),
        },
    );
}

#[tokio::main]
async fn main() -> io::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level, cli.log_format);

    let state_store = Arc::new(InMemoryStateStore::new());
    let event_store = Arc::new(InMemoryEventStore::new());
    let offline = Arc::new(InMemoryOfflineStore::new());
    let configs = Arc::new(InMemoryConfigStore::new());
    let segments = Arc::new(InMemorySegmentStore::new());
    let user_contexts = Arc::new(InMemoryUserContextStore::new());

    if cli.seed_demo_data {
        seed_demo_data(&offline, &configs, &user_contexts).await;
        info!("seeded demo offline candidates, config, and user contexts");
    }

    let service = Arc::new(
        BanditService::builder(state_store, event_store)
            .with_offline_store(offline.clone())
            .with_config_store(configs)
            .with_segment_store(segments)
            .with_user_context_store(user_contexts)
            .build(),
    );

    let app_state = AppState {
        service,
        offline,
    };

    let app = Router::new()
        .route("/api/v1/recommendations", get(recommend))
        .route("/api/v1/recommendations/debug", get(debug_recommend))
        .route("/api/v1/recommendations/feedback", post(log_feedback))
        .route(
            "/api/v1/admin/bandit/config",
            get(get_config).put(upsert_config),
        )
        .route(
            "/api/v1/admin/bandit/segment",
            get(get_segment).put(upsert_segment),
        )
        .route("/api/v1/offline", get(offline_rows))
        .route("/metrics", get(metrics))
        .with_state(app_state);

    let listener = tokio::net::TcpListener::bind(&cli.addr).await?;
    info!(addr = %cli.addr, "reco_server listening");
    axum::serve(listener, app).await
}
