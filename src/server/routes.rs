//! Research REST routes
//!
//! Handles: GET /api/research (current snapshot), POST /api/research (start)

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use super::ServerAppState;
use crate::events::EVENT_RESEARCH_STARTED;
use crate::session::{ControllerError, ResearchSnapshot};

/// Request body for POST /api/research
#[derive(Debug, Deserialize)]
pub struct StartResearchRequest {
    pub topic: String,
}

/// Response body for POST /api/research
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResearchResponse {
    pub session_id: String,
    pub topic: String,
}

/// Error body for the research routes
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<ControllerError> for ApiError {
    fn from(err: ControllerError) -> Self {
        let status = match err {
            ControllerError::EmptyTopic => StatusCode::BAD_REQUEST,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

pub async fn get_research(State(state): State<ServerAppState>) -> Json<ResearchSnapshot> {
    Json(state.controller.snapshot())
}

pub async fn start_research(
    State(state): State<ServerAppState>,
    Json(req): Json<StartResearchRequest>,
) -> Result<(StatusCode, Json<StartResearchResponse>), ApiError> {
    let session_id = state.controller.start_research(&req.topic)?;
    let response = StartResearchResponse {
        session_id,
        topic: req.topic.trim().to_string(),
    };
    state.broadcaster.broadcast(EVENT_RESEARCH_STARTED, &response);
    Ok((StatusCode::ACCEPTED, Json(response)))
}
