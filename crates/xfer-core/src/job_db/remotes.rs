//! Remote registry: named endpoint credentials referenced by jobs.

use anyhow::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use super::db::{unix_timestamp, JobDb};
use super::types::{NewRemote, Remote, RemoteConfig, RemoteId};

/// Remote names become config section headers and the prefix of endpoint
/// addresses, so they must not contain `:`, brackets, or whitespace.
fn validate_remote_name(name: &str) -> Result<()> {
    if name.is_empty() {
        anyhow::bail!("remote name must not be empty");
    }
    if let Some(c) = name
        .chars()
        .find(|c| matches!(c, ':' | '[' | ']') || c.is_whitespace())
    {
        anyhow::bail!("remote name {:?} contains invalid character {:?}", name, c);
    }
    Ok(())
}

/// Field values are written one per line into the tool config.
fn validate_remote_config(config: &RemoteConfig) -> Result<()> {
    let fields = [
        ("type", &config.remote_type),
        ("provider", &config.provider),
        ("access_key_id", &config.access_key_id),
        ("secret_access_key", &config.secret_access_key),
        ("endpoint", &config.endpoint),
    ];
    for (key, value) in fields {
        if value.contains(['\n', '\r']) {
            anyhow::bail!("remote field {} must not contain line breaks", key);
        }
    }
    Ok(())
}

fn remote_from_row(row: &SqliteRow) -> Result<Remote> {
    let config_json: String = row.get("config_json");
    let config: RemoteConfig = serde_json::from_str(&config_json)?;
    Ok(Remote {
        id: row.get("id"),
        name: row.get("name"),
        kind: row.get("kind"),
        config,
    })
}

impl JobDb {
    pub async fn create_remote(&self, remote: &NewRemote) -> Result<Remote> {
        validate_remote_name(&remote.name)?;
        validate_remote_config(&remote.config)?;
        let now = unix_timestamp();
        let id = sqlx::query(
            r#"
            INSERT INTO remotes (name, kind, config_json, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&remote.name)
        .bind(&remote.kind)
        .bind(serde_json::to_string(&remote.config)?)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();

        self.get_remote(id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("remote {} vanished after insert", id))
    }

    /// List remotes ordered by id, optionally only those of one kind.
    pub async fn list_remotes(&self, kind: Option<&str>) -> Result<Vec<Remote>> {
        let rows = match kind {
            Some(kind) => {
                sqlx::query("SELECT id, name, kind, config_json FROM remotes WHERE kind = ?1 ORDER BY id")
                    .bind(kind)
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query("SELECT id, name, kind, config_json FROM remotes ORDER BY id")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        rows.iter().map(remote_from_row).collect()
    }

    pub async fn get_remote(&self, id: RemoteId) -> Result<Option<Remote>> {
        let row = sqlx::query("SELECT id, name, kind, config_json FROM remotes WHERE id = ?1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(remote_from_row).transpose()
    }

    pub async fn get_remote_by_name(&self, name: &str) -> Result<Option<Remote>> {
        let row = sqlx::query("SELECT id, name, kind, config_json FROM remotes WHERE name = ?1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(remote_from_row).transpose()
    }

    /// Replace a remote's fields. Renaming is refused while live jobs use the old
    /// name, since their endpoint addresses embed it. Returns None if missing.
    pub async fn update_remote(&self, id: RemoteId, remote: &NewRemote) -> Result<Option<Remote>> {
        validate_remote_name(&remote.name)?;
        validate_remote_config(&remote.config)?;
        let Some(existing) = self.get_remote(id).await? else {
            return Ok(None);
        };
        if existing.name != remote.name {
            let in_use = self.count_live_jobs_using_remote(&existing.name).await?;
            if in_use > 0 {
                anyhow::bail!(
                    "remote {:?} is used by {} unfinished job(s); cannot rename",
                    existing.name,
                    in_use
                );
            }
        }

        sqlx::query(
            r#"
            UPDATE remotes
            SET name = ?1,
                kind = ?2,
                config_json = ?3,
                updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(&remote.name)
        .bind(&remote.kind)
        .bind(serde_json::to_string(&remote.config)?)
        .bind(unix_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get_remote(id).await
    }

    /// Delete a remote. Refused while unfinished jobs reference it.
    pub async fn delete_remote(&self, id: RemoteId) -> Result<bool> {
        let Some(existing) = self.get_remote(id).await? else {
            return Ok(false);
        };
        let in_use = self.count_live_jobs_using_remote(&existing.name).await?;
        if in_use > 0 {
            anyhow::bail!(
                "remote {:?} is used by {} unfinished job(s)",
                existing.name,
                in_use
            );
        }
        let r = sqlx::query("DELETE FROM remotes WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() == 1)
    }
}
