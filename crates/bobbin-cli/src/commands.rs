//! One subcommand per external operation.
//!
//! Every command except `serve` runs a single operation against the data
//! directory and prints the result as JSON on stdout.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use bobbin_core::App;
use bobbin_core::domain::{BobbinError, LeaseId, TaskId, TaskState};
use serde_json::{Value, json};

use crate::error::CliError;

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Run the reaper and lease sweeper until interrupted.
    Serve,

    /// Create a task.
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[command(flatten)]
        payload: PayloadArgs,
        /// Metadata entry, repeatable.
        #[arg(long = "meta", value_name = "KEY=VALUE")]
        metadata: Vec<String>,
    },

    Get {
        task_id: String,
    },

    /// Overwrite a task's state and payload.
    Update {
        task_id: String,
        #[arg(long)]
        state: String,
        #[command(flatten)]
        payload: PayloadArgs,
    },

    Complete {
        task_id: String,
    },

    Delete {
        task_id: String,
    },

    /// Lease a task for the configured lease duration.
    Lease {
        task_id: String,
        #[arg(long)]
        owner: String,
    },

    /// Print any task still in `created`.
    Unleased,

    /// Push a lease deadline to now + `seconds`.
    Extend {
        lease_id: String,
        #[arg(long)]
        owner: String,
        #[arg(long, allow_negative_numbers = true)]
        seconds: i64,
    },

    Release {
        lease_id: String,
    },

    /// Delete every expired lease record.
    SweepLeases,

    /// Run one reaper pass now.
    Reap,

    Status,
}

#[derive(clap::Args, Debug, Default)]
pub struct PayloadArgs {
    /// Payload as UTF-8 text.
    #[arg(long, conflicts_with = "payload_base64")]
    pub payload: Option<String>,

    /// Payload as standard base64.
    #[arg(long)]
    pub payload_base64: Option<String>,
}

impl PayloadArgs {
    pub fn into_bytes(self) -> Result<Vec<u8>, CliError> {
        match (self.payload, self.payload_base64) {
            (_, Some(encoded)) => STANDARD
                .decode(encoded.trim())
                .map_err(|e| CliError::Usage(format!("payload is not valid base64: {e}"))),
            (Some(text), None) => Ok(text.into_bytes()),
            (None, None) => Ok(Vec::new()),
        }
    }
}

/// Parse repeated `KEY=VALUE` flags. A later key wins.
pub fn parse_metadata(entries: &[String]) -> Result<HashMap<String, String>, CliError> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(CliError::Usage(format!(
                "metadata must look like KEY=VALUE, got '{entry}'"
            ))),
        })
        .collect()
}

/// Run a one-shot command. `serve` is handled by the caller.
pub async fn execute(app: &App, command: Command) -> Result<Value, CliError> {
    let tasks = &app.tasks;
    let leases = &app.leases;

    let output = match command {
        Command::Serve => {
            return Err(CliError::Usage("serve is not a one-shot command".into()));
        }
        Command::Create {
            name,
            description,
            payload,
            metadata,
        } => {
            let metadata = parse_metadata(&metadata)?;
            let task = tasks
                .create_task(name, description, payload.into_bytes()?, metadata)
                .await?;
            serde_json::to_value(task)?
        }
        Command::Get { task_id } => {
            serde_json::to_value(tasks.get_task(task_id_arg(&task_id)?).await?)?
        }
        Command::Update {
            task_id,
            state,
            payload,
        } => {
            let state = state
                .parse::<TaskState>()
                .map_err(|e| CliError::Core(BobbinError::from(e)))?;
            let task = tasks
                .update_task(task_id_arg(&task_id)?, state, payload.into_bytes()?)
                .await?;
            serde_json::to_value(task)?
        }
        Command::Complete { task_id } => {
            serde_json::to_value(tasks.complete_task(task_id_arg(&task_id)?).await?)?
        }
        Command::Delete { task_id } => {
            let task_id = task_id_arg(&task_id)?;
            tasks.delete_task(task_id).await?;
            json!({ "deleted": task_id.to_string() })
        }
        Command::Lease { task_id, owner } => {
            let lease = tasks.lease_task(task_id_arg(&task_id)?, &owner).await?;
            serde_json::to_value(lease)?
        }
        Command::Unleased => serde_json::to_value(tasks.get_unleased_task().await?)?,
        Command::Extend {
            lease_id,
            owner,
            seconds,
        } => {
            let lease = leases
                .extend_lease(
                    lease_id_arg(&lease_id)?,
                    chrono::Duration::seconds(seconds),
                    &owner,
                )
                .await?;
            serde_json::to_value(lease)?
        }
        Command::Release { lease_id } => {
            let lease_id = lease_id_arg(&lease_id)?;
            leases.release_lease(lease_id).await?;
            json!({ "released": lease_id.to_string() })
        }
        Command::SweepLeases => {
            json!({ "removed": leases.cleanup_expired_leases().await? })
        }
        Command::Reap => serde_json::to_value(app.reaper().run_once().await?)?,
        Command::Status => serde_json::to_value(app.status().await)?,
    };
    Ok(output)
}

fn task_id_arg(raw: &str) -> Result<TaskId, CliError> {
    raw.parse::<TaskId>()
        .map_err(|e| CliError::Core(BobbinError::from(e)))
}

fn lease_id_arg(raw: &str) -> Result<LeaseId, CliError> {
    raw.parse::<LeaseId>()
        .map_err(|e| CliError::Core(BobbinError::from(e)))
}
