/// SQL query functions for store operations
///
/// Scan-derived fields (languages, git_branch, last_modified, last_scanned,
/// present) are only written by the upsert/mark-absent path; user-owned
/// fields (name, status, favorite, notes, custom commands) are only written
/// by update_user_fields. Every mutating entry point is transactional.

use crate::db::models::*;
use crate::db::Database;
use crate::error::{ProjdexError, Result};
use fuzzy_matcher::skim::SkimMatcherV2;
use fuzzy_matcher::FuzzyMatcher;
use sqlx::sqlite::SqliteConnection;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// Insert a descriptor, or refresh the scan-derived fields of an existing
/// row. User-owned fields are deliberately absent from the conflict branch.
async fn upsert_descriptor(
    conn: &mut SqliteConnection,
    descriptor: &DiscoveredProject,
) -> Result<()> {
    let languages = descriptor.languages_json()?;

    sqlx::query(
        r#"
        INSERT INTO projects
            (path, name, languages, git_branch, last_modified, first_seen, last_scanned, present)
        VALUES (?, ?, ?, ?, ?, ?, ?, 1)
        ON CONFLICT(path) DO UPDATE SET
            languages = excluded.languages,
            git_branch = excluded.git_branch,
            last_modified = excluded.last_modified,
            last_scanned = excluded.last_scanned,
            present = 1
        "#,
    )
    .bind(&descriptor.path)
    .bind(&descriptor.name)
    .bind(languages)
    .bind(&descriptor.git_branch)
    .bind(&descriptor.last_modified)
    .bind(&descriptor.discovered_at)
    .bind(&descriptor.discovered_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Flag every stored path not in `seen` as absent. Never deletes.
async fn mark_absent_except(conn: &mut SqliteConnection, seen: &[String]) -> Result<u64> {
    let result = if seen.is_empty() {
        sqlx::query("UPDATE projects SET present = 0 WHERE present = 1")
            .execute(&mut *conn)
            .await?
    } else {
        let placeholders = vec!["?"; seen.len()].join(", ");
        let sql = format!(
            "UPDATE projects SET present = 0 WHERE present = 1 AND path NOT IN ({})",
            placeholders
        );

        let mut query = sqlx::query(&sql);
        for path in seen {
            query = query.bind(path);
        }
        query.execute(&mut *conn).await?
    };

    Ok(result.rows_affected())
}

impl Database {
    /// Insert a freshly scanned project, or refresh an existing record
    ///
    /// Only scan-derived fields are touched on conflict; status, favorite,
    /// name, notes and commands stay whatever the user made them.
    pub async fn upsert_scan_result(&self, descriptor: &DiscoveredProject) -> Result<()> {
        let mut conn = self.pool().acquire().await?;
        upsert_descriptor(&mut conn, descriptor).await
    }

    /// Set present = 0 for stored paths not produced by the current scan
    ///
    /// # Returns
    /// * `Ok(u64)` - Number of projects newly flagged absent
    pub async fn mark_absent(&self, seen_paths: &[String]) -> Result<u64> {
        let mut conn = self.pool().acquire().await?;
        mark_absent_except(&mut conn, seen_paths).await
    }

    /// Apply one whole scan as a single unit of work
    ///
    /// Upserts every descriptor, then flags everything else absent, inside
    /// one transaction. A failure anywhere leaves the store untouched.
    pub async fn commit_scan(&self, descriptors: &[DiscoveredProject]) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let mut seen = Vec::with_capacity(descriptors.len());
        for descriptor in descriptors {
            upsert_descriptor(&mut tx, descriptor).await?;
            seen.push(descriptor.path.clone());
        }

        let absent = mark_absent_except(&mut tx, &seen).await?;
        tx.commit().await?;

        tracing::debug!(
            upserted = descriptors.len(),
            newly_absent = absent,
            "scan committed"
        );
        Ok(())
    }

    /// Apply user edits to a stored project
    ///
    /// # Arguments
    /// * `path` - Project path (the merge key)
    /// * `patch` - Fields to change; None fields are left alone
    ///
    /// # Returns
    /// * `Err(UnknownProject)` - If the path was never stored
    pub async fn update_user_fields(&self, path: &str, patch: &ProjectPatch) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        let exists: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM projects WHERE path = ?")
            .bind(path)
            .fetch_optional(&mut *tx)
            .await?;

        if exists.is_none() {
            return Err(ProjdexError::UnknownProject(path.to_string()));
        }

        if let Some(name) = &patch.name {
            sqlx::query("UPDATE projects SET name = ? WHERE path = ?")
                .bind(name)
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(status) = patch.status {
            sqlx::query("UPDATE projects SET status = ? WHERE path = ?")
                .bind(status.to_string())
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(favorite) = patch.favorite {
            sqlx::query("UPDATE projects SET favorite = ? WHERE path = ?")
                .bind(favorite)
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }

        if let Some(notes) = &patch.notes {
            sqlx::query("UPDATE projects SET notes = ? WHERE path = ?")
                .bind(notes)
                .bind(path)
                .execute(&mut *tx)
                .await?;
        }

        // Command list is replaced wholesale; the (path, name) primary key
        // keeps names unique within the project.
        if let Some(commands) = &patch.commands {
            sqlx::query("DELETE FROM custom_commands WHERE project_path = ?")
                .bind(path)
                .execute(&mut *tx)
                .await?;

            for (position, command) in commands.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO custom_commands (project_path, name, command_template, position)
                     VALUES (?, ?, ?, ?)",
                )
                .bind(path)
                .bind(&command.name)
                .bind(&command.command_template)
                .bind(position as i64)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Set the status of several projects at once: all of them, or none
    ///
    /// An unknown path anywhere in the list rolls the whole batch back.
    pub async fn batch_update_status(
        &self,
        paths: &[String],
        new_status: ProjectStatus,
    ) -> Result<()> {
        let mut tx = self.pool().begin().await?;

        for path in paths {
            let result = sqlx::query("UPDATE projects SET status = ? WHERE path = ?")
                .bind(new_status.to_string())
                .bind(path)
                .execute(&mut *tx)
                .await?;

            if result.rows_affected() == 0 {
                // Dropping the transaction rolls back the earlier updates
                return Err(ProjdexError::UnknownProject(path.clone()));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    /// Read projects back out, filtered for the caller's display needs
    ///
    /// Status/language/favorite/presence filter in SQL; a text predicate
    /// fuzzy-ranks the remaining rows on name and path, best match first.
    pub async fn query(&self, filter: &ProjectQuery) -> Result<Vec<Project>> {
        let mut sql = String::from("SELECT * FROM projects WHERE 1 = 1");
        let mut binds: Vec<String> = Vec::new();

        if !filter.include_absent {
            sql.push_str(" AND present = 1");
        }

        if let Some(status) = filter.status {
            sql.push_str(" AND status = ?");
            binds.push(status.to_string());
        }

        if let Some(language) = &filter.language {
            // Language tags live inside a JSON array column; quoted LIKE is
            // enough because tags never contain quotes themselves.
            sql.push_str(" AND languages LIKE ?");
            binds.push(format!("%\"{}\"%", language));
        }

        if filter.favorites_only {
            sql.push_str(" AND favorite = 1");
        }

        sql.push_str(" ORDER BY name COLLATE NOCASE, path");

        let mut query = sqlx::query_as::<_, Project>(&sql);
        for bind in &binds {
            query = query.bind(bind);
        }

        let projects = query.fetch_all(self.pool()).await?;

        let Some(text) = filter.text.as_deref().filter(|t| !t.trim().is_empty()) else {
            return Ok(projects);
        };

        let matcher = SkimMatcherV2::default();
        let mut scored: Vec<(i64, Project)> = projects
            .into_iter()
            .filter_map(|project| {
                let name_score = matcher.fuzzy_match(&project.name, text);
                let path_score = matcher.fuzzy_match(&project.path, text);
                name_score
                    .into_iter()
                    .chain(path_score)
                    .max()
                    .map(|score| (score, project))
            })
            .collect();

        // Sort by score (highest first)
        scored.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(scored.into_iter().map(|(_, project)| project).collect())
    }

    /// Get a single project by path
    pub async fn get_project(&self, path: &str) -> Result<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM projects WHERE path = ?")
            .bind(path)
            .fetch_optional(self.pool())
            .await?;

        Ok(project)
    }

    /// Remove a project record entirely
    ///
    /// Scans never call this; it backs the explicit "forget" action in the
    /// UI layer. Custom commands go with it via the cascade.
    pub async fn delete_project(&self, path: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM projects WHERE path = ?")
            .bind(path)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Get a project's command templates in user order
    pub async fn list_custom_commands(&self, path: &str) -> Result<Vec<CustomCommand>> {
        let commands = sqlx::query_as::<_, CustomCommand>(
            "SELECT * FROM custom_commands WHERE project_path = ? ORDER BY position, name",
        )
        .bind(path)
        .fetch_all(self.pool())
        .await?;

        Ok(commands)
    }

    /// All distinct language tags across stored projects, sorted
    pub async fn all_languages(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT languages FROM projects")
            .fetch_all(self.pool())
            .await?;

        let mut tags = BTreeSet::new();
        for (json,) in rows {
            let shares: Vec<LanguageShare> = serde_json::from_str(&json).unwrap_or_default();
            for share in shares {
                tags.insert(share.tag);
            }
        }

        Ok(tags.into_iter().collect())
    }

    /// Get a setting value
    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Set a setting value
    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(value)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    /// Configured scan roots, in the order the user added them
    pub async fn scan_roots(&self) -> Result<Vec<PathBuf>> {
        let raw = self
            .get_setting("scan_roots")
            .await?
            .unwrap_or_else(|| "[]".to_string());

        let roots: Vec<String> = serde_json::from_str(&raw).unwrap_or_default();
        Ok(roots.into_iter().map(PathBuf::from).collect())
    }

    /// Persist the scan root list
    pub async fn set_scan_roots(&self, roots: &[PathBuf]) -> Result<()> {
        let raw: Vec<String> = roots
            .iter()
            .map(|root| root.display().to_string())
            .collect();

        self.set_setting("scan_roots", &serde_json::to_string(&raw)?)
            .await
    }
}
