use crate::commands::SuccessBody;
use crate::error::ChannelError;
use crate::peer::types::{IceCandidate, SessionDescription};
use crate::signaling::{ChannelOffer, ChannelService};
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Serialize)]
pub struct CreateChannelResponse {
    pub success: bool,
    #[serde(flatten)]
    pub channel: ChannelOffer,
}

#[derive(Debug, Deserialize)]
pub struct AnswerRequest {
    pub answer: SessionDescription,
    #[serde(default)]
    pub ice_candidates: Vec<IceCandidate>,
}

/// POST /channels
pub async fn create_channel(
    State(service): State<ChannelService>,
) -> Result<Json<CreateChannelResponse>, ChannelError> {
    let channel = service.create_channel().await?;
    Ok(Json(CreateChannelResponse {
        success: true,
        channel,
    }))
}

/// POST /channels/:channel_id/answer
///
/// An unknown channel is reported before the body is looked at.
pub async fn submit_answer(
    State(service): State<ChannelService>,
    Path(channel_id): Path<String>,
    body: Result<Json<AnswerRequest>, JsonRejection>,
) -> Result<Json<SuccessBody>, ChannelError> {
    service.channel_status(&channel_id)?;
    let Json(request) = body.map_err(|rejection| {
        warn!(channel_id = %channel_id, error = %rejection.body_text(), "unreadable answer body");
        ChannelError::MalformedRequest(rejection.body_text())
    })?;

    service
        .submit_answer(&channel_id, request.answer, &request.ice_candidates)
        .await?;
    Ok(SuccessBody::ok())
}

/// POST /channels/:channel_id/close
pub async fn close_channel(
    State(service): State<ChannelService>,
    Path(channel_id): Path<String>,
) -> Result<Json<SuccessBody>, ChannelError> {
    service.close_channel(&channel_id).await?;
    Ok(SuccessBody::ok())
}
