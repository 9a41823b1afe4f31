use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::constants::{
    BASE_URL, FALLBACK_TIER_ID, MAX_RETRIES, ONBOARD_MAX_ATTEMPTS, ONBOARD_POLL_DELAY,
    RETRY_BASE_DELAY, USER_AGENT,
};
use crate::error::{AppError, AppResult};
use crate::models::quota::map_tier_to_name;
use crate::models::{ModelQuota, QuotaSnapshot};
use crate::modules::api::retry::{self, AttemptError, Disposition};
use crate::modules::api::types::{
    normalize_project, FetchModelsRequest, FetchModelsResponse, LoadAssistRequest,
    LoadAssistResponse, Metadata, OnboardRequest, OnboardResponse, WireModel,
};
use crate::modules::auth::store::CredentialStore;

/// Cloud Code API client for a single account fetch.
///
/// Holds per-call identity state (project id, tier id), so concurrent
/// account fetches must each construct their own instance.
pub struct QuotaClient {
    http: reqwest::Client,
    base_url: String,
    project_id: Option<String>,
    tier_id: Option<String>,
}

impl Default for QuotaClient {
    fn default() -> Self {
        Self::new()
    }
}

impl QuotaClient {
    pub fn new() -> Self {
        Self {
            http: crate::utils::http::get_client(),
            base_url: BASE_URL.to_string(),
            project_id: None,
            tier_id: None,
        }
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::new()
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// POST with the standard retry policy: 3 retries with exponential
    /// backoff from 1 s; 401 is never retried, 429/5xx are, other 4xx
    /// are terminal.
    async fn post_json<B, R>(&self, access_token: &str, endpoint: &str, body: &B) -> AppResult<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, endpoint);
        let body = serde_json::to_value(body)
            .map_err(|e| AppError::Config(format!("failed to serialize request: {}", e)))?;
        let http = self.http.clone();
        let token = access_token.to_string();

        retry::with_backoff(MAX_RETRIES, RETRY_BASE_DELAY, tokio::time::sleep, move || {
            let http = http.clone();
            let url = url.clone();
            let token = token.clone();
            let body = body.clone();
            async move {
                let response = http
                    .post(&url)
                    .bearer_auth(&token)
                    .header(reqwest::header::USER_AGENT, USER_AGENT)
                    .json(&body)
                    .send()
                    .await
                    .map_err(|e| AttemptError::Transient(format!("request failed: {}", e)))?;

                let status = response.status();
                if status.is_success() {
                    return response
                        .json::<R>()
                        .await
                        .map_err(|e| AttemptError::Fatal(AppError::Network(e)));
                }

                let body_text = response.text().await.unwrap_or_default();
                match retry::classify_status(status) {
                    Disposition::Unauthorized => Err(AttemptError::Fatal(AppError::Auth(
                        "unauthorized: token may be invalid or expired".to_string(),
                    ))),
                    Disposition::Retry => Err(AttemptError::Transient(format!(
                        "HTTP {}: {}",
                        status, body_text
                    ))),
                    Disposition::Terminal => Err(AttemptError::Fatal(AppError::Upstream {
                        status: status.as_u16(),
                        message: body_text,
                    })),
                }
            }
        })
        .await
    }

    pub async fn load_assist(&self, access_token: &str) -> AppResult<LoadAssistResponse> {
        let request = LoadAssistRequest {
            metadata: Metadata::default(),
        };
        self.post_json(access_token, "/v1internal:loadCodeAssist", &request)
            .await
    }

    /// Polls the onboarding operation with a fixed attempt budget and
    /// fixed delay. Exhausting the budget is a distinct terminal
    /// condition, not an empty result.
    pub async fn onboard_user(
        &self,
        access_token: &str,
        tier_id: &str,
    ) -> AppResult<Option<String>> {
        let request = OnboardRequest {
            tier_id: tier_id.to_string(),
            metadata: Metadata::default(),
        };

        for attempt in 1..=ONBOARD_MAX_ATTEMPTS {
            let response: OnboardResponse = self
                .post_json(access_token, "/v1internal:onboardUser", &request)
                .await?;

            if response.done {
                return Ok(normalize_project(
                    response.response.cloudaicompanion_project.as_ref(),
                ));
            }

            tracing::debug!(
                "onboarding not complete (attempt {}/{})",
                attempt,
                ONBOARD_MAX_ATTEMPTS
            );
            if attempt < ONBOARD_MAX_ATTEMPTS {
                tokio::time::sleep(ONBOARD_POLL_DELAY).await;
            }
        }

        Err(AppError::OnboardTimeout(ONBOARD_MAX_ATTEMPTS))
    }

    /// Resolves the account's project id and billing tier id, onboarding
    /// if the upstream has not assigned a project yet.
    pub async fn resolve_identity(
        &mut self,
        access_token: &str,
    ) -> AppResult<(Option<String>, Option<String>)> {
        let response = self.load_assist(access_token).await?;

        let direct_project = response
            .project_id
            .clone()
            .filter(|p| !p.is_empty())
            .or_else(|| normalize_project(response.cloudaicompanion_project.as_ref()));

        if let Some(project_id) = direct_project {
            let tier_id = explicit_tier_id(&response);
            self.project_id = Some(project_id.clone());
            self.tier_id = tier_id.clone();
            return Ok((Some(project_id), tier_id));
        }

        let tier_id = choose_tier_id(&response);
        let project_id = self.onboard_user(access_token, &tier_id).await?;
        if project_id.is_some() {
            self.project_id = project_id.clone();
        }
        self.tier_id = Some(tier_id.clone());
        Ok((project_id, Some(tier_id)))
    }

    /// Fetches the per-model quota records, optionally scoped to a
    /// project.
    pub async fn fetch_models(
        &self,
        access_token: &str,
        project_id: Option<&str>,
    ) -> AppResult<Vec<ModelQuota>> {
        let request = FetchModelsRequest {
            project: project_id.map(str::to_string),
            metadata: Metadata::default(),
        };
        let response: FetchModelsResponse = self
            .post_json(access_token, "/v1internal:fetchAvailableModels", &request)
            .await?;

        let mut models: Vec<ModelQuota> = response
            .models
            .into_iter()
            .filter_map(|(model_id, model)| to_model_quota(model_id, model))
            .collect();
        models.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(models)
    }

    /// Full quota fetch for one account: token, identity, models.
    ///
    /// Identity resolution failure is not fatal; quota is still fetched,
    /// possibly without project scoping. A model fetch failure is fatal
    /// for this account's snapshot.
    pub async fn get_quota(
        &mut self,
        store: &CredentialStore,
        email: &str,
    ) -> AppResult<QuotaSnapshot> {
        let access_token = store.get_valid_access_token_via_oauth(email).await?;

        let tier_id = match self.resolve_identity(&access_token).await {
            Ok((_, tier_id)) => tier_id,
            Err(e) => {
                tracing::warn!("identity resolution failed for {}: {}", email, e);
                None
            }
        };
        let tier_name = tier_id.as_deref().and_then(map_tier_to_name);

        if tier_name.is_some() {
            // Cache the resolved tier label; failure must not fail the fetch.
            if let Err(e) = store.update_tier_name(email, tier_name.clone()).await {
                tracing::warn!("failed to cache tier name for {}: {}", email, e);
            }
        }

        let models = self
            .fetch_models(&access_token, self.project_id.as_deref())
            .await?;

        Ok(QuotaSnapshot {
            email: email.to_string(),
            tier_name,
            project_id: self.project_id.clone(),
            fetched_at: Utc::now(),
            models,
        })
    }
}

fn explicit_tier_id(response: &LoadAssistResponse) -> Option<String> {
    response
        .paid_tier
        .as_ref()
        .and_then(|t| t.id.clone())
        .filter(|id| !id.is_empty())
        .or_else(|| {
            response
                .current_tier
                .as_ref()
                .and_then(|t| t.id.clone())
                .filter(|id| !id.is_empty())
        })
}

/// Tier id precedence for onboarding: explicit paid tier, explicit
/// current tier, the allowed tier marked default, the first allowed
/// tier, then the hardcoded fallback.
fn choose_tier_id(response: &LoadAssistResponse) -> String {
    if let Some(id) = explicit_tier_id(response) {
        return id;
    }

    let default_tier = response
        .allowed_tiers
        .iter()
        .find(|t| t.is_default)
        .and_then(|t| t.id.clone())
        .filter(|id| !id.is_empty());
    if let Some(id) = default_tier {
        return id;
    }

    let first_tier = response
        .allowed_tiers
        .first()
        .and_then(|t| t.id.clone())
        .filter(|id| !id.is_empty());
    if let Some(id) = first_tier {
        return id;
    }

    FALLBACK_TIER_ID.to_string()
}

/// Maps one wire model record into the normalized quota shape. Records
/// without a quota sub-object carry no usable signal and are dropped.
fn to_model_quota(model_id: String, model: WireModel) -> Option<ModelQuota> {
    let quota_info = model.quota_info?;
    let display_name = if model.display_name.is_empty() {
        model_id.clone()
    } else {
        model.display_name
    };
    Some(ModelQuota {
        model_id,
        display_name,
        remaining_fraction: quota_info.remaining_fraction.unwrap_or(0.0),
        reset_time: quota_info.reset_time,
        is_exhausted: quota_info.is_exhausted.unwrap_or(false),
    })
}
