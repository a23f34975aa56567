pub mod channel_api;
pub mod util_api;

use crate::error::ChannelError;
use crate::signaling::ChannelService;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// HTTP surface of the channel service
pub fn router(service: ChannelService) -> Router {
    Router::new()
        .route("/health", get(util_api::health_check))
        .route("/channels", post(channel_api::create_channel))
        .route("/channels/:channel_id", get(util_api::channel_status))
        .route("/channels/:channel_id/answer", post(channel_api::submit_answer))
        .route("/channels/:channel_id/close", post(channel_api::close_channel))
        .with_state(service)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// `{ "success": true }`
#[derive(Debug, Serialize)]
pub struct SuccessBody {
    pub success: bool,
}

impl SuccessBody {
    pub fn ok() -> Json<Self> {
        Json(Self { success: true })
    }
}

#[derive(Debug, Serialize)]
struct ClientErrorBody {
    success: bool,
    reason: &'static str,
}

#[derive(Debug, Serialize)]
struct ServerErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for ChannelError {
    fn into_response(self) -> Response {
        match self {
            ChannelError::NotFound => client_error(StatusCode::NOT_FOUND, "channel not found"),
            ChannelError::InvalidState { .. } => client_error(
                StatusCode::BAD_REQUEST,
                "channel is not waiting for answer",
            ),
            ChannelError::MalformedRequest(_) => {
                client_error(StatusCode::BAD_REQUEST, "malformed request body")
            }
            ChannelError::Transport(_) => {
                server_error(StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
            ChannelError::Timeout(_) => server_error(StatusCode::GATEWAY_TIMEOUT, self.to_string()),
        }
    }
}

fn client_error(status: StatusCode, reason: &'static str) -> Response {
    (
        status,
        Json(ClientErrorBody {
            success: false,
            reason,
        }),
    )
        .into_response()
}

fn server_error(status: StatusCode, error: String) -> Response {
    (
        status,
        Json(ServerErrorBody {
            success: false,
            error,
        }),
    )
        .into_response()
}
