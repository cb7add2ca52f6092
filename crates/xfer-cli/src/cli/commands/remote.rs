//! `xfer remote ...` – remote registry CRUD.

use anyhow::{Context, Result};
use xfer_core::job_db::{JobDb, NewRemote, RemoteConfig};

use crate::cli::{RemoteCommand, RemoteFields};

fn required(value: Option<String>, flag: &str) -> Result<String> {
    value.with_context(|| format!("--{flag} is required"))
}

fn config_from_fields(fields: RemoteFields) -> Result<RemoteConfig> {
    Ok(RemoteConfig {
        remote_type: required(fields.remote_type, "type")?,
        provider: required(fields.provider, "provider")?,
        access_key_id: required(fields.access_key_id, "access-key-id")?,
        secret_access_key: required(fields.secret_access_key, "secret-access-key")?,
        endpoint: required(fields.endpoint, "endpoint")?,
    })
}

/// Overlay the fields given on the command line onto an existing config.
fn merge_fields(mut config: RemoteConfig, fields: RemoteFields) -> RemoteConfig {
    if let Some(v) = fields.remote_type {
        config.remote_type = v;
    }
    if let Some(v) = fields.provider {
        config.provider = v;
    }
    if let Some(v) = fields.access_key_id {
        config.access_key_id = v;
    }
    if let Some(v) = fields.secret_access_key {
        config.secret_access_key = v;
    }
    if let Some(v) = fields.endpoint {
        config.endpoint = v;
    }
    config
}

pub async fn run_remote(db: &JobDb, command: RemoteCommand) -> Result<()> {
    match command {
        RemoteCommand::Add { name, kind, fields } => {
            let remote = db
                .create_remote(&NewRemote {
                    name,
                    kind,
                    config: config_from_fields(fields)?,
                })
                .await?;
            println!("Added remote {} ({})", remote.id, remote.name);
        }
        RemoteCommand::List { kind } => {
            let remotes = db.list_remotes(kind.as_deref()).await?;
            if remotes.is_empty() {
                println!("No remotes registered.");
                return Ok(());
            }
            println!("{:<6} {:<16} {:<8} {:<6} {:<10} {}", "ID", "NAME", "KIND", "TYPE", "PROVIDER", "ENDPOINT");
            for r in remotes {
                println!(
                    "{:<6} {:<16} {:<8} {:<6} {:<10} {}",
                    r.id, r.name, r.kind, r.config.remote_type, r.config.provider, r.config.endpoint
                );
            }
        }
        RemoteCommand::Update {
            id,
            name,
            kind,
            fields,
        } => {
            let existing = db
                .get_remote(id)
                .await?
                .with_context(|| format!("remote {id} not found"))?;
            let updated = NewRemote {
                name: name.unwrap_or(existing.name),
                kind: kind.unwrap_or(existing.kind),
                config: merge_fields(existing.config, fields),
            };
            match db.update_remote(id, &updated).await? {
                Some(r) => println!("Updated remote {} ({})", r.id, r.name),
                None => anyhow::bail!("remote {id} not found"),
            }
        }
        RemoteCommand::Remove { id } => {
            if db.delete_remote(id).await? {
                println!("Removed remote {id}");
            } else {
                anyhow::bail!("remote {id} not found");
            }
        }
    }
    Ok(())
}
