use anyhow::{Context, Result, bail};
use chunkwise_config::AppConfig;
use chunkwise_gateway::{AppState, GatewayServer};
use chunkwise_orchestrator::{MigrationState, RunOutcome};
use tracing::info;

use crate::Command;
use crate::banner::print_banner;

pub async fn dispatch(command: Command, config: AppConfig) -> Result<()> {
    if let Command::Serve = command {
        let names = chunkwise_gateway::build_registry(&config.migrations)?;
        print_banner(&config, &names.migration_names());
        return GatewayServer::new(config)
            .run()
            .await
            .context("gateway stopped with an error");
    }

    let state = AppState::from_config(config).context("failed to open orchestrator")?;
    let orchestrator = &state.orchestrator;
    let pick = |m: Option<String>| m.unwrap_or_else(|| state.config.default_migration.clone());

    match command {
        Command::Serve | Command::Keygen { .. } => unreachable!("handled before dispatch"),
        Command::Init => {
            orchestrator.history_store().ensure_schema()?;
            println!("migration history table is ready");
        }
        Command::Run {
            migration,
            executed_by,
        } => {
            let migration = pick(migration);
            let result = orchestrator
                .migrations()
                .run_full(&migration, &executor_identity(executed_by))
                .await?;
            for record in &result.records {
                println!(
                    "  {} {:<24} {:>6}ms",
                    if record.success { "ok  " } else { "FAIL" },
                    record.chunk_id,
                    record.execution_time_ms
                );
            }
            match &result.outcome {
                RunOutcome::Completed => println!(
                    "{migration}: {} chunks applied in {}ms",
                    result.chunks_executed(),
                    result.total_execution_time_ms
                ),
                RunOutcome::Failed {
                    chunk_id,
                    chunk_name,
                    error_message,
                } => bail!(
                    "{migration} stopped at chunk {chunk_id} ({chunk_name}): {error_message}\n\
                     resume with: chunkwise run-chunk {chunk_id} --migration {migration}"
                ),
            }
        }
        Command::RunChunk {
            chunk_id,
            migration,
            executed_by,
        } => {
            let migration = pick(migration);
            let record = orchestrator
                .migrations()
                .run_single_chunk(&migration, &chunk_id, &executor_identity(executed_by))
                .await?;
            if !record.success {
                bail!(
                    "chunk {chunk_id} failed: {}",
                    record.error_message.unwrap_or_default()
                );
            }
            println!("chunk {chunk_id} applied in {}ms", record.execution_time_ms);
        }
        Command::Rollback {
            migration,
            executed_by,
        } => {
            let migration = pick(migration);
            let record = orchestrator
                .rollbacks()
                .rollback_registered(&migration, &executor_identity(executed_by))
                .await?;
            if !record.success {
                bail!(
                    "rollback of {migration} failed: {}",
                    record.error_message.unwrap_or_default()
                );
            }
            println!("{migration} rolled back in {}ms", record.execution_time_ms);
        }
        Command::Status { migration, json } => {
            let migration = pick(migration);
            let report = orchestrator
                .status()
                .report(&migration, state.config.history.default_limit)
                .await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
                return Ok(());
            }

            println!("{migration}: {}", describe(&report.state));
            println!();
            println!("chunks:");
            for chunk in &report.chunks {
                let last = match &chunk.last_attempt {
                    Some(a) if a.success => format!("ok   {}", a.executed_at.to_rfc3339()),
                    Some(a) => format!(
                        "FAIL {} {}",
                        a.executed_at.to_rfc3339(),
                        a.error_message.as_deref().unwrap_or("")
                    ),
                    None => "never run".to_string(),
                };
                println!("  {:<24} {last}", chunk.id);
            }
            if !report.tables.is_empty() {
                println!();
                println!("tables:");
                for table in &report.tables {
                    println!(
                        "  {:<32} {}",
                        table.table_name,
                        if table.exists { "present" } else { "missing" }
                    );
                }
            }
        }
        Command::History {
            migration,
            limit,
            all,
        } => {
            let limit = state.config.history.clamp(limit);
            let records = if all {
                orchestrator.status().history_all(limit)?
            } else {
                orchestrator.status().history(&pick(migration), limit)?
            };
            for r in records {
                println!(
                    "{:>6} {} {:<32} {:<24} {} {:>6}ms by {}{}",
                    r.id,
                    r.executed_at.to_rfc3339(),
                    r.migration_name,
                    r.chunk_id,
                    if r.success { "ok  " } else { "FAIL" },
                    r.execution_time_ms,
                    r.executed_by,
                    r.error_message
                        .map(|e| format!(" : {e}"))
                        .unwrap_or_default()
                );
            }
        }
        Command::Chunks { migration } => {
            let migration = pick(migration);
            let chunks = orchestrator.status().list_chunks(&migration)?;
            for (idx, chunk) in chunks.iter().enumerate() {
                println!("{:>3}. {:<24} {}", idx + 1, chunk.id, chunk.name);
            }
        }
    }
    Ok(())
}

fn executor_identity(explicit: Option<String>) -> String {
    let identity = explicit.unwrap_or_else(|| {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        format!("cli:{user}")
    });
    info!(executed_by = %identity, "cli caller");
    identity
}

fn describe(state: &MigrationState) -> String {
    match state {
        MigrationState::NotStarted => "not started".to_string(),
        MigrationState::Partial { succeeded, total } => {
            format!("partially applied ({succeeded}/{total} chunks)")
        }
        MigrationState::Completed => "completed".to_string(),
        MigrationState::Failed {
            chunk_id,
            error_message,
        } => format!(
            "failed at {chunk_id}: {}",
            error_message.as_deref().unwrap_or("unknown error")
        ),
        MigrationState::RolledBack => "rolled back".to_string(),
    }
}
