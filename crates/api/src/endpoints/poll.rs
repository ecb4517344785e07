//! Poll endpoints.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    response::IntoResponse,
    routing::{delete, get, post},
};
use chrono::{DateTime, Utc};
use pollchain_common::AppResult;
use pollchain_core::CreatePollInput;
use pollchain_db::PollKind;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Create the poll router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", post(create_poll))
        .route("/vote", post(vote))
        .route("/delete", delete(delete_poll))
        .route("/data", get(poll_data))
        .route("/status", get(poll_status))
}

/// Create poll request.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePollRequest {
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    /// Number of voters after which the poll closes
    #[validate(range(min = 1))]
    pub votes: u32,

    #[validate(length(min = 2))]
    pub choices: Vec<String>,

    #[serde(rename = "type")]
    pub kind: PollKind,

    pub previous_poll_id: Option<String>,

    #[serde(default)]
    pub auto_create: bool,
}

#[derive(Serialize)]
pub struct CreatePollResponse {
    pub poll_id: String,
}

async fn create_poll(
    State(state): State<AppState>,
    Json(req): Json<CreatePollRequest>,
) -> AppResult<ApiResponse<CreatePollResponse>> {
    req.validate()?;

    let poll_id = state
        .poll_service
        .create_poll(CreatePollInput {
            title: req.title,
            kind: req.kind,
            target_votes: req.votes,
            choices: req.choices,
            auto_create: req.auto_create,
            previous_poll_id: req.previous_poll_id,
        })
        .await?;

    Ok(ApiResponse::created(CreatePollResponse { poll_id }))
}

/// Vote request.
#[derive(Debug, Deserialize, Validate)]
pub struct VoteRequest {
    #[validate(length(min = 1))]
    pub poll_id: String,

    #[validate(length(min = 1))]
    pub user_id: String,

    /// Selected choice ids
    #[validate(length(min = 1))]
    pub votes: Vec<i32>,
}

#[derive(Serialize)]
pub struct VoteResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_poll: Option<String>,
}

async fn vote(
    State(state): State<AppState>,
    Json(req): Json<VoteRequest>,
) -> AppResult<ApiResponse<VoteResponse>> {
    req.validate()?;

    let receipt = state
        .poll_service
        .submit_vote(&req.poll_id, &req.user_id, req.votes)
        .await?;

    Ok(ApiResponse::ok(VoteResponse {
        accepted: true,
        next_poll: receipt.next_poll,
    }))
}

#[derive(Debug, Deserialize)]
pub struct DeletePollRequest {
    pub poll_id: String,
}

async fn delete_poll(
    State(state): State<AppState>,
    Json(req): Json<DeletePollRequest>,
) -> AppResult<impl IntoResponse> {
    state.poll_service.delete_poll(&req.poll_id).await?;
    Ok(no_content())
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub poll_id: String,
}

/// Full poll data.
#[derive(Serialize)]
pub struct PollDataResponse {
    pub title: String,
    pub votes_required: u32,
    pub votes_cast: u32,
    #[serde(rename = "type")]
    pub kind: PollKind,
    pub auto_create: bool,
    pub created_at: DateTime<Utc>,
    /// Choice id to label
    pub choices: BTreeMap<i32, String>,
    /// Choice id to voter count
    pub votes: BTreeMap<i32, u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_poll: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_poll: Option<String>,
}

async fn poll_data(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> AppResult<ApiResponse<PollDataResponse>> {
    let view = state.poll_service.read_poll_view(&query.poll_id).await?;

    Ok(ApiResponse::ok(PollDataResponse {
        title: view.title,
        votes_required: view.target_votes,
        votes_cast: view.cast_votes,
        kind: view.kind,
        auto_create: view.auto_create,
        created_at: view.created_at,
        choices: view.choices,
        votes: view.tally,
        next_poll: view.next_poll,
        latest_poll: view.latest_poll,
    }))
}

#[derive(Serialize)]
pub struct PollStatusResponse {
    pub votes_required: u32,
    pub votes_cast: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_poll: Option<String>,
}

async fn poll_status(
    State(state): State<AppState>,
    Query(query): Query<PollQuery>,
) -> AppResult<ApiResponse<PollStatusResponse>> {
    let status = state.poll_service.read_poll_status(&query.poll_id).await?;

    Ok(ApiResponse::ok(PollStatusResponse {
        votes_required: status.target_votes,
        votes_cast: status.cast_votes,
        next_poll: status.next_poll,
    }))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_create_request_validation() {
        let req: CreatePollRequest = serde_json::from_str(
            r#"{"title":"Lunch","votes":2,"choices":["A","B"],"type":"multiple"}"#,
        )
        .unwrap();
        assert!(req.validate().is_ok());
        assert!(!req.auto_create);
        assert_eq!(req.kind, PollKind::Multiple);

        let req: CreatePollRequest = serde_json::from_str(
            r#"{"title":"Lunch","votes":0,"choices":["A"],"type":"single"}"#,
        )
        .unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("votes"));
        assert!(errors.field_errors().contains_key("choices"));
    }

    #[test]
    fn test_unknown_poll_type_rejected() {
        let parsed = serde_json::from_str::<CreatePollRequest>(
            r#"{"title":"Lunch","votes":2,"choices":["A","B"],"type":"ranked"}"#,
        );
        assert!(parsed.is_err());
    }

    #[test]
    fn test_vote_request_requires_selection() {
        let req: VoteRequest =
            serde_json::from_str(r#"{"poll_id":"p1","user_id":"u1","votes":[]}"#).unwrap();
        assert!(req.validate().is_err());
    }
}
