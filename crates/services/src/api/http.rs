use std::env;

use async_trait::async_trait;
use exam_core::model::{Attempt, AttemptId, CheckpointState, PreparedCategory, SessionToken};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use super::{ActiveSession, SessionApi, SessionCheck, StartAttemptReply, StartAttemptRequest};
use crate::error::ApiError;

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub base_url: String,
    pub bearer_token: Option<String>,
}

impl ApiConfig {
    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("EXAM_API_BASE_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let bearer_token = env::var("EXAM_API_TOKEN").ok().filter(|t| !t.trim().is_empty());
        Some(Self {
            base_url,
            bearer_token,
        })
    }
}

/// `reqwest`-backed implementation of the backend session contract.
#[derive(Clone)]
pub struct HttpSessionApi {
    client: Client,
    config: ApiConfig,
}

impl HttpSessionApi {
    #[must_use]
    pub fn new(config: ApiConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl SessionApi for HttpSessionApi {
    async fn check_active_session(&self) -> Result<SessionCheck, ApiError> {
        let response = self
            .request(self.client.get(self.url("/test-sessions/active")))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::HttpStatus(status));
        }

        let body: Envelope<CheckData> = response.json().await?;
        let data = body.data.unwrap_or_default();

        let active_session = data.active_session.map(|dto| ActiveSession {
            attempt_id: AttemptId::new(dto.attempt_id),
            is_expired: dto.is_expired,
        });
        let auto_submitted = data
            .auto_submitted
            .map(|dto| {
                dto.finalized_attempt_ids
                    .into_iter()
                    .map(AttemptId::new)
                    .collect()
            })
            .unwrap_or_default();

        Ok(SessionCheck {
            active_session,
            auto_submitted,
        })
    }

    async fn start_attempt(
        &self,
        request: &StartAttemptRequest,
    ) -> Result<StartAttemptReply, ApiError> {
        let body = StartBody::from_request(request);
        let response = self
            .request(self.client.post(self.url("/test-sessions/attempts")))
            .json(&body)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: Envelope<StartData> = response.json().await?;
                let dto = body
                    .data
                    .map(|d| d.attempt)
                    .ok_or_else(|| ApiError::Decode("start response missing attempt".into()))?;
                Ok(StartAttemptReply::Started(Attempt::started(
                    AttemptId::new(dto.id),
                    request.category_id.clone(),
                    request.package_id.clone(),
                    request.turn,
                    SessionToken::new(dto.session_token),
                )))
            }
            // 409 covers two distinct rejections; an attempt id in the body
            // marks the conflict case, its absence the draft-package case.
            StatusCode::CONFLICT => {
                let body: Envelope<ConflictData> = response
                    .json()
                    .await
                    .map_err(|e| ApiError::Decode(e.to_string()))?;
                match body.data.and_then(|d| d.active_attempt_id) {
                    Some(id) => Ok(StartAttemptReply::ActiveConflict {
                        attempt_id: AttemptId::new(id),
                    }),
                    None => Ok(StartAttemptReply::PackageUnavailable),
                }
            }
            StatusCode::NOT_FOUND => Ok(StartAttemptReply::PackageUnavailable),
            status => Err(ApiError::HttpStatus(status)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[allow(dead_code)]
    ok: bool,
    data: Option<T>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CheckData {
    active_session: Option<ActiveSessionDto>,
    auto_submitted: Option<AutoSubmittedDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActiveSessionDto {
    attempt_id: String,
    is_expired: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AutoSubmittedDto {
    finalized_attempt_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StartBody<'a> {
    package_id: &'a str,
    category_id: &'a str,
    turn_number: u32,
    record_id: Option<&'a str>,
    prepared_categories: Vec<PreparedCategoryDto>,
    checkpoint_meta: &'a CheckpointState,
}

impl<'a> StartBody<'a> {
    fn from_request(request: &'a StartAttemptRequest) -> Self {
        Self {
            package_id: request.package_id.as_str(),
            category_id: request.category_id.as_str(),
            turn_number: request.turn,
            record_id: request.record_id.as_ref().map(|r| r.as_str()),
            prepared_categories: request
                .checkpoint
                .prepared()
                .iter()
                .map(PreparedCategoryDto::from_model)
                .collect(),
            checkpoint_meta: &request.checkpoint,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PreparedCategoryDto {
    category_id: String,
    category_name: String,
    package_id: String,
    turn_number: u32,
    question_count: u32,
    duration_minutes: u32,
}

impl PreparedCategoryDto {
    fn from_model(prepared: &PreparedCategory) -> Self {
        Self {
            category_id: prepared.category_id.as_str().to_owned(),
            category_name: prepared.category_name.clone(),
            package_id: prepared.package_id.as_str().to_owned(),
            turn_number: prepared.turn,
            question_count: prepared.question_count,
            duration_minutes: prepared.duration_minutes,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartData {
    attempt: AttemptDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AttemptDto {
    id: String,
    session_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConflictData {
    active_attempt_id: Option<String>,
}
