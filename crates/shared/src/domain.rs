use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(UserId);
id_newtype!(ProjectId);
id_newtype!(DatasetId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Modality {
    #[serde(rename = "2D")]
    TwoD,
    #[serde(rename = "3D")]
    ThreeD,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "text")]
    Text,
}

pub const ALL_MODALITIES: [Modality; 4] = [
    Modality::TwoD,
    Modality::ThreeD,
    Modality::Audio,
    Modality::Text,
];

impl Modality {
    pub fn as_str(self) -> &'static str {
        match self {
            Modality::TwoD => "2D",
            Modality::ThreeD => "3D",
            Modality::Audio => "audio",
            Modality::Text => "text",
        }
    }
}

impl std::str::FromStr for Modality {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ALL_MODALITIES
            .into_iter()
            .find(|modality| modality.as_str().eq_ignore_ascii_case(raw))
            .ok_or_else(|| format!("unknown modality {raw:?}, expected one of 2D, 3D, audio, text"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    Inactive,
    Archived,
}

impl ProjectStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ProjectStatus::Active => "active",
            ProjectStatus::Inactive => "inactive",
            ProjectStatus::Archived => "archived",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub modality: Modality,
    pub status: ProjectStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub id: DatasetId,
    pub project_id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub format_version: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Column the server is asked to sort projects by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    CreatedAt,
    Name,
}

impl OrderBy {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderBy::CreatedAt => "created_at",
            OrderBy::Name => "name",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// User-facing sort selection for the project list. The wire parameters
/// (`order_by`, `order`) are always derived from this value and never stored
/// separately, so the two cannot drift apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProjectSortMode {
    #[default]
    CreateTimeDesc,
    CreateTimeAsc,
    NameAsc,
    NameDesc,
}

pub const PROJECT_SORT_MODES: [ProjectSortMode; 4] = [
    ProjectSortMode::CreateTimeDesc,
    ProjectSortMode::CreateTimeAsc,
    ProjectSortMode::NameAsc,
    ProjectSortMode::NameDesc,
];

impl ProjectSortMode {
    pub fn order_by(self) -> OrderBy {
        match self {
            ProjectSortMode::CreateTimeDesc | ProjectSortMode::CreateTimeAsc => OrderBy::CreatedAt,
            ProjectSortMode::NameAsc | ProjectSortMode::NameDesc => OrderBy::Name,
        }
    }

    pub fn order(self) -> SortOrder {
        match self {
            ProjectSortMode::CreateTimeAsc | ProjectSortMode::NameAsc => SortOrder::Asc,
            ProjectSortMode::CreateTimeDesc | ProjectSortMode::NameDesc => SortOrder::Desc,
        }
    }
}
