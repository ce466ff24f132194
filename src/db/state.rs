//! Scheduler run state: `lastcron` and `publishemail`.

use async_trait::async_trait;

use crate::error::DatabaseError;
use crate::store::RunStateStore;
use crate::types::RunState;
use crate::{Error, Result};

use super::Database;

const LAST_CRON_KEY: &str = "lastcron";
const PUBLISH_EMAIL_KEY: &str = "publishemail";

impl Database {
    async fn state_value(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar(
            r#"
            SELECT value FROM export_state WHERE key = ?
            "#,
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to read {}: {}",
                key, e
            )))
        })
    }

    /// Set (or clear, with an empty string) the recipient of scheduled exports
    pub async fn set_publish_email(&self, address: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO export_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(PUBLISH_EMAIL_KEY)
        .bind(address.trim())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to set publish email: {}",
                e
            )))
        })?;

        Ok(())
    }

    /// Initialise `lastcron` to `now` unless it is already set
    ///
    /// Change detection assumes `lastcron` is meaningful; seeding it on
    /// install prevents the first run from exporting every wiki ever created.
    /// Returns the effective `lastcron`.
    pub async fn seed_run_state(&self, now: i64) -> Result<i64> {
        sqlx::query(
            r#"
            INSERT INTO export_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO NOTHING
            "#,
        )
        .bind(LAST_CRON_KEY)
        .bind(now.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to seed lastcron: {}",
                e
            )))
        })?;

        Ok(self.load_run_state().await?.last_cron)
    }
}

#[async_trait]
impl RunStateStore for Database {
    async fn load_run_state(&self) -> Result<RunState> {
        let last_cron = match self.state_value(LAST_CRON_KEY).await? {
            Some(raw) => raw.trim().parse::<i64>().map_err(|e| Error::Config {
                message: format!("lastcron is not a timestamp ({:?}): {}", raw, e),
                key: Some(LAST_CRON_KEY.to_string()),
            })?,
            None => 0,
        };
        let publish_email = self
            .state_value(PUBLISH_EMAIL_KEY)
            .await?
            .filter(|v| !v.trim().is_empty());

        Ok(RunState {
            last_cron,
            publish_email,
        })
    }

    async fn commit_last_cron(&self, timestamp: i64) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        sqlx::query(
            r#"
            INSERT INTO export_state (key, value, updated_at)
            VALUES (?, ?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            WHERE CAST(export_state.value AS INTEGER) < CAST(excluded.value AS INTEGER)
            "#,
        )
        .bind(LAST_CRON_KEY)
        .bind(timestamp.to_string())
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            Error::Database(DatabaseError::QueryFailed(format!(
                "Failed to commit lastcron: {}",
                e
            )))
        })?;

        Ok(())
    }
}
