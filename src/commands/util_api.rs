use crate::error::ChannelError;
use crate::signaling::{ChannelService, ChannelSnapshot};
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub channels: usize,
}

#[derive(Debug, Serialize)]
pub struct ChannelStatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub channel: ChannelSnapshot,
}

/// GET /health
pub async fn health_check(State(service): State<ChannelService>) -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        channels: service.registry().len(),
    })
}

/// GET /channels/:channel_id
pub async fn channel_status(
    State(service): State<ChannelService>,
    Path(channel_id): Path<String>,
) -> Result<Json<ChannelStatusResponse>, ChannelError> {
    let channel = service.channel_status(&channel_id)?;
    Ok(Json(ChannelStatusResponse {
        success: true,
        channel,
    }))
}
