use super::worker::{CollectorHandle, Control, ControlReply};
use crate::error::GrowattError;
use axum::{
    Router,
    extract::{Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use prometheus_client::encoding::text::encode;
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone)]
struct AppState {
    registry: Arc<Registry>,
    collector: CollectorHandle,
}

/// HTTP front end: Prometheus scrape, latest snapshot and control endpoints.
pub struct ApiServer {
    registry: Arc<Registry>,
    collector: CollectorHandle,
    addr: SocketAddr,
    cancel: CancellationToken,
}

impl ApiServer {
    pub fn new(
        registry: Arc<Registry>,
        collector: CollectorHandle,
        addr: SocketAddr,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            collector,
            addr,
            cancel,
        }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled.
    pub async fn serve(
        self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let app = router(self.registry, self.collector);
        tracing::info!("API server listening on http://{}", listener.local_addr()?);

        axum::serve(listener, app)
            .with_graceful_shutdown(self.cancel.cancelled_owned())
            .await?;

        tracing::info!("API server stopped");
        Ok(())
    }
}

fn router(registry: Arc<Registry>, collector: CollectorHandle) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/snapshot", get(snapshot_handler))
        .route("/power-limit/{percent}", post(power_limit_handler))
        .route("/enable", post(enable_handler))
        .route("/disable", post(disable_handler))
        .route("/curtailment/on", post(curtailment_on_handler))
        .route("/curtailment/off", post(curtailment_off_handler))
        .with_state(AppState {
            registry,
            collector,
        })
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let mut buffer = String::new();
    if let Err(e) = encode(&mut buffer, &state.registry) {
        tracing::error!("Failed to encode metrics: {}", e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        buffer,
    )
        .into_response()
}

async fn snapshot_handler(State(state): State<AppState>) -> Response {
    match state.collector.latest() {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (StatusCode::SERVICE_UNAVAILABLE, "no snapshot collected yet").into_response(),
    }
}

async fn power_limit_handler(State(state): State<AppState>, Path(percent): Path<i64>) -> Response {
    control(&state, Control::PowerLimit(percent)).await
}

async fn enable_handler(State(state): State<AppState>) -> Response {
    control(&state, Control::Enable(true)).await
}

async fn disable_handler(State(state): State<AppState>) -> Response {
    control(&state, Control::Enable(false)).await
}

async fn curtailment_on_handler(State(state): State<AppState>) -> Response {
    control(&state, Control::Curtailment(true)).await
}

async fn curtailment_off_handler(State(state): State<AppState>) -> Response {
    control(&state, Control::Curtailment(false)).await
}

async fn control(state: &AppState, control: Control) -> Response {
    reply_to_response(control, state.collector.send(control).await)
}

fn reply_to_response(control: Control, reply: ControlReply) -> Response {
    match reply {
        Ok(Some(outcome)) => {
            (StatusCode::OK, format!("{control}: applied, {outcome}\n")).into_response()
        }
        Ok(None) => (
            StatusCode::ACCEPTED,
            format!("{control}: held until curtailment is on\n"),
        )
            .into_response(),
        Err(e) => (error_status(&e), format!("{control}: {e}\n")).into_response(),
    }
}

fn error_status(e: &GrowattError) -> StatusCode {
    match e {
        GrowattError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
        GrowattError::InvalidOperation(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::BAD_GATEWAY,
    }
}
