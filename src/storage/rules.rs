use anyhow::{Context, Result};

use super::schema::Database;
use super::types::StoredRules;
use crate::rules::{RuleStore, SourceRules};
use crate::util::canonicalize_url;

impl Database {
    // ========================================================================
    // Source Rules Operations
    // ========================================================================

    /// Rules stored for `source_url`, looked up by its canonical form.
    pub async fn get_rules(&self, source_url: &str) -> Result<Option<SourceRules>> {
        let key = canonicalize_url(source_url);
        let row: Option<(String,)> =
            sqlx::query_as("SELECT rules FROM source_rules WHERE source_url = ?")
                .bind(&key)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(json,)| {
            SourceRules::from_json(&json)
                .with_context(|| format!("Stored rules for '{key}' are not valid JSON"))
        })
        .transpose()
    }

    /// Stores `rules` for `source_url` (UPSERT) in compact form.
    ///
    /// A rule set with no active constraint is not stored: any existing row
    /// is deleted instead. Returns the normalized rules as stored.
    pub async fn set_rules(&self, source_url: &str, rules: &SourceRules) -> Result<SourceRules> {
        let key = canonicalize_url(source_url);
        let rules = rules.clone().normalize();

        if !rules.is_active() {
            self.delete_rules(&key).await?;
            return Ok(rules);
        }

        let json = rules.to_compact_json()?;
        sqlx::query(
            r#"
            INSERT INTO source_rules (source_url, rules, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(source_url) DO UPDATE SET rules = excluded.rules, updated_at = excluded.updated_at
        "#,
        )
        .bind(&key)
        .bind(&json)
        .execute(&self.pool)
        .await?;

        tracing::debug!(source = %key, rules = %json, "Stored source rules");
        Ok(rules)
    }

    /// Removes the rules for `source_url`. Returns whether a row existed.
    pub async fn delete_rules(&self, source_url: &str) -> Result<bool> {
        let key = canonicalize_url(source_url);
        let result = sqlx::query("DELETE FROM source_rules WHERE source_url = ?")
            .bind(&key)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Every stored rule set, ordered by source URL.
    ///
    /// Rows whose JSON no longer parses are skipped with a warning.
    pub async fn list_rules(&self) -> Result<Vec<StoredRules>> {
        let rows: Vec<(String, String, String)> = sqlx::query_as(
            "SELECT source_url, rules, updated_at FROM source_rules ORDER BY source_url",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .filter_map(|(source_url, json, updated_at)| {
                match SourceRules::from_json(&json) {
                    Ok(rules) => Some(StoredRules {
                        source_url,
                        rules,
                        updated_at,
                    }),
                    Err(e) => {
                        tracing::warn!(source = %source_url, error = %e, "Skipping unreadable stored rules");
                        None
                    }
                }
            })
            .collect())
    }
}

impl RuleStore for Database {
    async fn load_rules(&self, source_url: &str) -> Result<Option<SourceRules>> {
        self.get_rules(source_url).await
    }
}
