use std::path::Path;

use chrono::Utc;
use tether_core::models::SyncOperation;

use crate::cli::QueueCommand;
use crate::commands::common::{format_operation_lines, open_engine, resolve_operation_id};
use crate::error::CliError;

pub async fn run_queue(command: QueueCommand, db_path: &Path) -> Result<(), CliError> {
    let engine = open_engine(db_path, None).await?;

    match command {
        QueueCommand::List { json } => {
            let operations = engine.pending_operations().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&operations)?);
            } else if operations.is_empty() {
                println!("No pending operations");
            } else {
                for line in format_operation_lines(&operations) {
                    println!("{line}");
                }
            }
        }
        QueueCommand::Add {
            kind,
            entity,
            priority,
        } => {
            let entity = entity.trim();
            if entity.is_empty() {
                return Err(CliError::Config("Entity id cannot be empty".to_string()));
            }
            let operation =
                SyncOperation::new(kind.into(), entity, Utc::now()).with_priority(priority.into());
            let id = operation.id;
            if engine.enqueue(operation).await? {
                println!("{id}");
            } else {
                println!("Already queued: {id}");
            }
        }
        QueueCommand::Done { id } => {
            let operations = engine.pending_operations().await;
            let id = resolve_operation_id(&id, &operations)?;
            match engine.confirm_delivered(id).await? {
                Some(_) => println!("Delivered {id}"),
                None => return Err(CliError::OperationNotFound(id.to_string())),
            }
        }
        QueueCommand::Reset { id, priority } => {
            let operations = engine.pending_operations().await;
            let id = resolve_operation_id(&id, &operations)?;
            if !engine.reset_priority(id, priority.into()).await? {
                return Err(CliError::OperationNotFound(id.to_string()));
            }
            println!("Reset {id}");
        }
    }

    Ok(())
}
