use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Project, ProjectId},
    error::ErrorCode,
    protocol::{
        CreateDatasetRequest, CreateProjectRequest, Envelope, ListProjectsQuery, LoginData,
        LoginRequest, Page, UserSummary,
    },
};
use tracing::{info, warn};
use url::Url;

pub mod config;
pub mod error;
pub mod feed;
pub mod store;

pub use config::{load_settings, Settings};
pub use error::{ClientError, GENERIC_FAILURE_MESSAGE};
pub use feed::{FeedEvent, FeedProgress, ProjectFeed, DEFAULT_PAGE_SIZE};
pub use store::{AuthSession, ProjectStore, SortParams};

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;
const MIN_PROJECT_NAME_LEN: usize = 3;

/// Seam between the pagination feed and the network. [`AnnotateClient`]
/// implements it against the real listing endpoint; tests substitute
/// scripted fakes.
#[async_trait]
pub trait ProjectLister: Send + Sync {
    async fn list_projects(&self, query: ListProjectsQuery) -> Result<Page<Project>, ClientError>;
}

/// HTTP client for the annotation API. The bearer token is read from the
/// injected [`AuthSession`] on every request, so a login performed through
/// one handle is visible to every clone.
pub struct AnnotateClient {
    http: Client,
    base_url: Url,
    auth: Arc<AuthSession>,
}

impl AnnotateClient {
    pub fn new(server_url: &str, auth: Arc<AuthSession>) -> Result<Self, ClientError> {
        Self::with_timeout(server_url, auth, Duration::from_secs(30))
    }

    pub fn with_timeout(
        server_url: &str,
        auth: Arc<AuthSession>,
        timeout: Duration,
    ) -> Result<Self, ClientError> {
        let base_url = Url::parse(server_url)
            .map_err(|err| ClientError::Config(format!("invalid server url {server_url}: {err}")))?;
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ClientError::Transport)?;
        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn auth(&self) -> &Arc<AuthSession> {
        &self.auth
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url.as_str().trim_end_matches('/'))
    }

    async fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.auth.token().await {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// Logs in and persists the returned token. Credentials are validated
    /// locally first so malformed input never produces a request.
    pub async fn login(&self, username: &str, password: &str) -> Result<UserSummary, ClientError> {
        validate_credentials(username, password)?;

        let response = self
            .http
            .post(self.endpoint("/v1/auth/login"))
            .json(&LoginRequest {
                username: username.to_string(),
                password: password.to_string(),
            })
            .send()
            .await?;
        let data: LoginData = read_envelope(response).await?;

        self.auth.log_in(data.token).await?;
        info!(username = %data.user.username, "auth: logged in");
        Ok(data.user)
    }

    /// Ends the server-side session best-effort, then drops the local token.
    /// A failing logout endpoint never leaves the client logged in.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let request = self
            .authorized(self.http.post(self.endpoint("/v1/auth/logout")))
            .await;
        match request.send().await {
            Ok(response) => {
                if let Err(err) = read_envelope::<serde_json::Value>(response).await {
                    warn!("auth: server-side logout failed: {err}");
                }
            }
            Err(err) => warn!("auth: logout request failed: {err}"),
        }
        self.auth.log_out().await
    }

    /// Probes the current session. A 401 maps to [`ClientError::NotLoggedIn`],
    /// which callers treat as "go to login" rather than an error.
    pub async fn current_user(&self) -> Result<UserSummary, ClientError> {
        let response = self
            .authorized(self.http.get(self.endpoint("/v1/users/me")))
            .await
            .send()
            .await?;
        read_envelope(response).await
    }

    pub async fn create_project(&self, request: &CreateProjectRequest) -> Result<(), ClientError> {
        validate_new_project(request)?;

        let response = self
            .authorized(self.http.post(self.endpoint("/v1/projects/create")))
            .await
            .json(request)
            .send()
            .await?;
        // The reference server answers creation with an empty data object;
        // the envelope itself is the success signal.
        read_envelope::<serde_json::Value>(response).await?;
        info!(name = %request.name, "projects: created");
        Ok(())
    }

    pub async fn get_project(&self, id: ProjectId) -> Result<Project, ClientError> {
        let response = self
            .authorized(self.http.get(self.endpoint(&format!("/v1/projects/{}", id.0))))
            .await
            .send()
            .await?;
        read_envelope(response).await
    }

    pub async fn create_dataset(&self, request: &CreateDatasetRequest) -> Result<(), ClientError> {
        validate_new_dataset(request)?;

        let response = self
            .authorized(self.http.post(self.endpoint("/v1/datasets/create")))
            .await
            .json(request)
            .send()
            .await?;
        read_envelope::<serde_json::Value>(response).await?;
        info!(name = %request.name, project_id = request.project_id.0, "datasets: created");
        Ok(())
    }
}

#[async_trait]
impl ProjectLister for AnnotateClient {
    async fn list_projects(&self, query: ListProjectsQuery) -> Result<Page<Project>, ClientError> {
        let response = self
            .authorized(self.http.get(self.endpoint("/v1/projects/list")))
            .await
            .query(&query)
            .send()
            .await?;
        read_envelope(response).await
    }
}

/// Unwraps the `{code, message, data}` envelope, mapping failures into the
/// error taxonomy: 401 to the not-logged-in class, any other non-success
/// status to an API error carrying the server message when one exists.
async fn read_envelope<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    if status == StatusCode::UNAUTHORIZED {
        return Err(ClientError::NotLoggedIn);
    }
    if !status.is_success() {
        let message = response
            .json::<Envelope<serde_json::Value>>()
            .await
            .ok()
            .map(|envelope| envelope.message)
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
        return Err(ClientError::Api {
            code: ErrorCode::from_status(status.as_u16()),
            message,
        });
    }
    let envelope: Envelope<T> = response.json().await?;
    Ok(envelope.data)
}

pub fn validate_credentials(username: &str, password: &str) -> Result<(), ClientError> {
    if username.trim().len() < MIN_USERNAME_LEN {
        return Err(ClientError::validation("username", "Username is required"));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(ClientError::validation(
            "password",
            "Password must be at least 6 characters",
        ));
    }
    Ok(())
}

pub fn validate_new_project(request: &CreateProjectRequest) -> Result<(), ClientError> {
    if request.name.trim().len() < MIN_PROJECT_NAME_LEN {
        return Err(ClientError::validation("name", "Project name is required"));
    }
    Ok(())
}

pub fn validate_new_dataset(request: &CreateDatasetRequest) -> Result<(), ClientError> {
    if request.name.trim().is_empty() {
        return Err(ClientError::validation("name", "Dataset name is required"));
    }
    if request.format_version.trim().is_empty() {
        return Err(ClientError::validation(
            "format_version",
            "Format version is required",
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
