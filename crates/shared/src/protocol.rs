use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Modality, OrderBy, ProjectId, SortOrder, UserId};

/// Every endpoint wraps its payload in this envelope; `code` mirrors the
/// HTTP status of the response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub code: i32,
    pub message: String,
    pub data: T,
}

/// One page of an offset/limit listing. `results` never exceeds `limit`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub limit: u32,
    pub offset: u64,
    pub total: u64,
    #[serde(default = "Vec::new")]
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Offset the next request should carry, per the paging protocol:
    /// the served offset plus the number of results actually returned.
    pub fn next_offset(&self) -> u64 {
        self.offset + self.results.len() as u64
    }

    pub fn is_final(&self) -> bool {
        self.results.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginData {
    pub token: String,
    pub user: UserSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: UserId,
    pub username: String,
    pub display_name: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub modality: Modality,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDatasetRequest {
    pub project_id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub format_version: String,
}

/// Query string for `GET /v1/projects/list`. `order` and `order_by` are
/// always derived from the active sort mode by the caller.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ListProjectsQuery {
    pub offset: u64,
    pub limit: u32,
    pub order: SortOrder,
    pub order_by: OrderBy,
}
