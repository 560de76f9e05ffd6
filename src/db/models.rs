/// Data models for store entities
///
/// All models map to database tables and use sqlx for type-safe queries.

use crate::error::ProjdexError;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;

/// Lifecycle status of a project. Scans never change this.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    Active,
    OnHold,
    Archived,
}

impl ProjectStatus {
    /// Human-readable label for display surfaces
    pub fn label(&self) -> &'static str {
        match self {
            ProjectStatus::Active => "Active",
            ProjectStatus::OnHold => "On Hold",
            ProjectStatus::Archived => "Archived",
        }
    }
}

impl std::fmt::Display for ProjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ProjectStatus::Active => "active",
            ProjectStatus::OnHold => "hold",
            ProjectStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ProjectStatus {
    type Err = ProjdexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(ProjectStatus::Active),
            "hold" | "on-hold" | "onhold" => Ok(ProjectStatus::OnHold),
            "archived" => Ok(ProjectStatus::Archived),
            other => Err(ProjdexError::InvalidStatus(other.to_string())),
        }
    }
}

/// One detected language and its share of the project's mapped files
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LanguageShare {
    pub tag: String,
    pub weight: f64,
}

/// Represents a stored project
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub path: String,
    pub name: String,
    pub languages: String, // JSON array of LanguageShare
    pub status: String,
    pub favorite: bool,
    pub notes: String,
    pub git_branch: Option<String>,
    pub last_modified: Option<String>, // ISO 8601 format from SQLite
    pub first_seen: String,            // ISO 8601 format from SQLite
    pub last_scanned: Option<String>,  // ISO 8601 format from SQLite
    pub present: bool,
}

impl Project {
    /// Parse language shares from JSON string
    pub fn language_shares(&self) -> Vec<LanguageShare> {
        serde_json::from_str(&self.languages).unwrap_or_default()
    }

    /// The heaviest detected language, if any
    pub fn primary_language(&self) -> Option<String> {
        self.language_shares().first().map(|s| s.tag.clone())
    }

    /// Parsed status; rows only ever hold the three known values
    pub fn status(&self) -> ProjectStatus {
        ProjectStatus::from_str(&self.status).unwrap_or(ProjectStatus::Active)
    }
}

/// A stored command template, keyed by (project_path, name)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CustomCommand {
    pub project_path: String,
    pub name: String,
    pub command_template: String,
    pub position: i64,
}

/// Input form of a custom command, before it's attached to a project
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandSpec {
    pub name: String,
    pub command_template: String,
}

/// The scanner's output record for one discovered project, pre-merge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredProject {
    pub path: String,
    pub name: String,
    pub languages: Vec<LanguageShare>,
    pub git_branch: Option<String>,
    pub last_modified: Option<String>,
    pub discovered_at: String,
}

impl DiscoveredProject {
    /// Languages encoded the way the projects table stores them
    pub fn languages_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.languages)
    }
}

/// User edit of the user-owned fields. `None` means "leave as is";
/// `commands` replaces the whole command list when set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    pub status: Option<ProjectStatus>,
    pub favorite: Option<bool>,
    pub notes: Option<String>,
    pub commands: Option<Vec<CommandSpec>>,
}

/// Filter for reading projects back out of the store
#[derive(Debug, Clone, Default)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    pub language: Option<String>,
    pub favorites_only: bool,
    pub text: Option<String>,
    pub include_absent: bool,
}

impl ProjectQuery {
    /// Everything the store knows about, absent projects included
    pub fn all() -> Self {
        Self {
            include_absent: true,
            ..Self::default()
        }
    }
}

/// Non-fatal problem hit during a scan. Attached to the reconcile
/// outcome instead of failing the refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ScanWarning {
    /// A subtree couldn't be read and was skipped
    Unreadable { path: String, detail: String },
    /// A configured root was missing or unreadable; other roots still scanned
    RootUnavailable { root: String, detail: String },
}

impl std::fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanWarning::Unreadable { path, detail } => {
                write!(f, "skipped unreadable path {}: {}", path, detail)
            }
            ScanWarning::RootUnavailable { root, detail } => {
                write!(f, "scan root unavailable {}: {}", root, detail)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ProjectStatus::Active,
            ProjectStatus::OnHold,
            ProjectStatus::Archived,
        ] {
            let parsed = ProjectStatus::from_str(&status.to_string()).unwrap();
            assert_eq!(parsed, status);
        }

        assert!(ProjectStatus::from_str("paused").is_err());
    }

    #[test]
    fn test_project_language_helpers() {
        let project = Project {
            path: "/code/api".to_string(),
            name: "api".to_string(),
            languages: r#"[{"tag":"rust","weight":0.9},{"tag":"shell","weight":0.1}]"#
                .to_string(),
            status: "active".to_string(),
            favorite: false,
            notes: String::new(),
            git_branch: None,
            last_modified: None,
            first_seen: "2026-01-01T00:00:00Z".to_string(),
            last_scanned: None,
            present: true,
        };

        let shares = project.language_shares();
        assert_eq!(shares.len(), 2);
        assert_eq!(project.primary_language(), Some("rust".to_string()));
        assert_eq!(project.status(), ProjectStatus::Active);
    }

    #[test]
    fn test_descriptor_languages_json() {
        let descriptor = DiscoveredProject {
            path: "/code/api".to_string(),
            name: "api".to_string(),
            languages: vec![LanguageShare {
                tag: "python".to_string(),
                weight: 1.0,
            }],
            git_branch: None,
            last_modified: None,
            discovered_at: "2026-01-01T00:00:00Z".to_string(),
        };

        let json = descriptor.languages_json().unwrap();
        assert!(json.contains("\"python\""));
    }

    #[test]
    fn test_warning_display() {
        let warning = ScanWarning::RootUnavailable {
            root: "/mnt/gone".to_string(),
            detail: "not a directory".to_string(),
        };
        assert!(warning.to_string().contains("/mnt/gone"));
    }
}
