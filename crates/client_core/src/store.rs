use anyhow::Context;
use shared::domain::{OrderBy, Project, ProjectSortMode, SortOrder};
use storage::SessionStore;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::ClientError;

/// Sort parameters in the form the listing endpoint expects. Always derived
/// from [`ProjectSortMode`] on demand, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortParams {
    pub order_by: OrderBy,
    pub order: SortOrder,
}

#[derive(Debug, Default)]
struct ProjectsState {
    projects: Vec<Project>,
    sort_mode: ProjectSortMode,
}

/// In-memory projects slice. It exclusively owns the accumulated project
/// list and the active sort mode; the pagination feed and the UI mutate it
/// only through these methods. None of them can fail.
///
/// Changing the sort mode deliberately does not clear the list: the two are
/// coupled by [`crate::feed::ProjectFeed::change_sort_mode`], which clears
/// and resets pagination in the right order.
#[derive(Default)]
pub struct ProjectStore {
    inner: RwLock<ProjectsState>,
}

impl ProjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sort_mode(&self) -> ProjectSortMode {
        self.inner.read().await.sort_mode
    }

    pub async fn set_sort_mode(&self, mode: ProjectSortMode) {
        self.inner.write().await.sort_mode = mode;
    }

    pub async fn sort_params(&self) -> SortParams {
        let mode = self.inner.read().await.sort_mode;
        SortParams {
            order_by: mode.order_by(),
            order: mode.order(),
        }
    }

    /// Wholesale replacement. Callers supply the full desired list; there is
    /// no merging or deduplication here.
    pub async fn update_projects(&self, projects: Vec<Project>) {
        self.inner.write().await.projects = projects;
    }

    pub async fn clear_projects(&self) {
        self.inner.write().await.projects.clear();
    }

    pub async fn projects(&self) -> Vec<Project> {
        self.inner.read().await.projects.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.projects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.projects.is_empty()
    }
}

/// Auth slice. The token lives in memory for request signing and is mirrored
/// into the [`SessionStore`] under the `jwt` key; this is the only state the
/// client ever persists.
pub struct AuthSession {
    token: RwLock<Option<String>>,
    persistence: SessionStore,
}

impl AuthSession {
    /// Opens the session, restoring any previously persisted token.
    pub async fn restore(persistence: SessionStore) -> Result<Self, ClientError> {
        let token = persistence
            .load_token()
            .await
            .context("failed to restore persisted session")
            .map_err(ClientError::Persistence)?;
        if token.is_some() {
            info!("auth: restored persisted session token");
        }
        Ok(Self {
            token: RwLock::new(token),
            persistence,
        })
    }

    pub async fn token(&self) -> Option<String> {
        self.token.read().await.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.token.read().await.is_some()
    }

    pub async fn log_in(&self, token: String) -> Result<(), ClientError> {
        self.persistence
            .store_token(&token)
            .await
            .context("failed to persist session token")
            .map_err(ClientError::Persistence)?;
        *self.token.write().await = Some(token);
        Ok(())
    }

    pub async fn log_out(&self) -> Result<(), ClientError> {
        self.persistence
            .clear_token()
            .await
            .context("failed to clear persisted session token")
            .map_err(ClientError::Persistence)?;
        *self.token.write().await = None;
        info!("auth: session cleared");
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
