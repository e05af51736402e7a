//! Action-dispatch endpoints for the migration admin surface.
//!
//! `GET /api/migrations?action=...` answers read-only questions and
//! `POST /api/migrations` with `{ "action": ... }` changes the schema. Reads
//! need any known API key; writes need an admin key.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode, header::AUTHORIZATION};
use axum::response::{IntoResponse, Response};
use chunkwise_common::{Error, ExecutionRecord, MigrationChunk, Result};
use chunkwise_orchestrator::{MigrationRunResult, RunOutcome};
use chunkwise_security::{Caller, RequestValidator};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use crate::error::ApiResult;
use crate::state::{AppState, SharedState};

const EXECUTE_STATUS_HISTORY: usize = 20;
const CHECK_STATUS_HISTORY: usize = 10;

#[derive(Debug, Default, Deserialize)]
pub struct GetParams {
    pub action: Option<String>,
    pub migration_name: Option<String>,
    pub limit: Option<usize>,
    /// `history` across every migration name instead of one.
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct PostBody {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub migration_name: Option<String>,
    #[serde(default)]
    pub chunk_id: Option<String>,
    #[serde(default)]
    pub chunk_name: Option<String>,
    #[serde(default)]
    pub sql: Option<String>,
}

pub async fn status(State(state): State<SharedState>) -> ApiResult<Json<serde_json::Value>> {
    Ok(Json(json!({
        "status": "running",
        "default_migration": state.config.default_migration,
        "migrations": state.orchestrator.registry().migration_names(),
        "history_initialized": state.orchestrator.history_store().is_initialized()?,
    })))
}

pub async fn handle_get(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Query(params): Query<GetParams>,
) -> ApiResult<Response> {
    let caller = authenticate(&state, &headers)?;
    let action = params.action.as_deref().unwrap_or("list");
    debug!(action, caller = %caller.identity, "migration query");

    let status = state.orchestrator.status();
    let migration = migration_or_default(&state, params.migration_name.as_deref())?;

    let body = match action {
        "list" => json!({
            "success": true,
            "history": status.history(migration, state.config.history.clamp(params.limit))?,
            "available_migrations": status.available_migrations(),
            "chunks": status.list_chunks(migration)?,
        }),
        "history" => {
            let limit = state.config.history.clamp(params.limit);
            let history = if params.all {
                status.history_all(limit)?
            } else {
                status.history(migration, limit)?
            };
            json!({ "success": true, "history": history })
        }
        "tables" => {
            let existing: Vec<_> = status
                .expected_tables_status(migration)
                .await?
                .into_iter()
                .filter(|t| t.exists)
                .map(|t| json!({ "table_name": t.table_name }))
                .collect();
            json!({ "success": true, "instagram_tables": existing })
        }
        "execute-status" => json!({
            "success": true,
            "history": status.history(migration, EXECUTE_STATUS_HISTORY)?,
            "available_chunks": status.list_chunks(migration)?,
        }),
        "report" => json!({
            "success": true,
            "report": status
                .report(migration, state.config.history.clamp(params.limit))
                .await?,
        }),
        other => return Err(Error::Validation(format!("unknown action: {other}")).into()),
    };
    Ok(Json(body).into_response())
}

pub async fn handle_post(
    State(state): State<SharedState>,
    headers: HeaderMap,
    body: std::result::Result<Json<PostBody>, JsonRejection>,
) -> ApiResult<Response> {
    let caller = authenticate(&state, &headers)?;
    caller.require_admin()?;
    let Json(body) =
        body.map_err(|e| Error::Validation(format!("invalid request body: {}", e.body_text())))?;
    let action = body
        .action
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| Error::Validation("action is required".into()))?;

    let executed_by = caller.identity.as_str();
    info!(action, caller = executed_by, "migration command");

    let orchestrator = &state.orchestrator;
    let response = match action {
        "init" => {
            orchestrator.history_store().ensure_schema()?;
            Json(json!({
                "success": true,
                "message": "migration history table is ready",
            }))
            .into_response()
        }
        "run" | "run_full_migration" => {
            let migration = migration_or_default(&state, body.migration_name.as_deref())?;
            let result = orchestrator
                .migrations()
                .run_full(migration, executed_by)
                .await?;
            run_response(&result)
        }
        "run_single_chunk" => {
            let migration = migration_or_default(&state, body.migration_name.as_deref())?;
            let chunk_id =
                RequestValidator::require_identifier("chunk_id", body.chunk_id.as_deref())?;
            let record = orchestrator
                .migrations()
                .run_single_chunk(migration, chunk_id, executed_by)
                .await?;
            record_response(&record, &format!("chunk {chunk_id}"))
        }
        "execute-chunk" => {
            let chunk_id =
                RequestValidator::require_identifier("chunk_id", body.chunk_id.as_deref())?;
            let migration = RequestValidator::require_identifier(
                "migration_name",
                body.migration_name.as_deref(),
            )?;
            let sql = RequestValidator::require_sql(body.sql.as_deref())?;
            let name = body
                .chunk_name
                .as_deref()
                .map(RequestValidator::sanitize)
                .filter(|n| !n.trim().is_empty())
                .unwrap_or_else(|| chunk_id.to_string());

            let chunk = MigrationChunk::new(chunk_id, name, sql);
            let record = orchestrator
                .migrations()
                .run_adhoc(migration, &chunk, executed_by)
                .await?;
            record_response(&record, &format!("chunk {chunk_id}"))
        }
        "rollback" => {
            let migration = RequestValidator::require_identifier(
                "migration_name",
                body.migration_name.as_deref(),
            )?;
            let record = orchestrator
                .rollbacks()
                .rollback_registered(migration, executed_by)
                .await?;
            record_response(&record, &format!("rollback of {migration}"))
        }
        "check-status" => {
            let migration = migration_or_default(&state, body.migration_name.as_deref())?;
            let status = orchestrator.status();
            Json(json!({
                "success": true,
                "tables": status.expected_tables_status(migration).await?,
                "recent_history": status.history(migration, CHECK_STATUS_HISTORY)?,
                "state": status.state(migration)?,
                "migration_name": migration,
            }))
            .into_response()
        }
        other => return Err(Error::Validation(format!("unknown action: {other}")).into()),
    };
    Ok(response)
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Caller> {
    state.auth.authenticate(presented_key(headers))
}

fn presented_key(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .or_else(|| headers.get("x-api-key").and_then(|v| v.to_str().ok()))
}

fn migration_or_default<'a>(state: &'a AppState, requested: Option<&'a str>) -> Result<&'a str> {
    match requested.map(str::trim).filter(|m| !m.is_empty()) {
        Some(name) => {
            RequestValidator::validate_identifier("migration_name", name)?;
            Ok(name)
        }
        None => Ok(state.config.default_migration.as_str()),
    }
}

fn run_response(result: &MigrationRunResult) -> Response {
    let results: Vec<_> = result
        .records
        .iter()
        .map(|r| {
            json!({
                "chunk": r.chunk_id,
                "name": r.chunk_name,
                "success": r.success,
                "execution_time_ms": r.execution_time_ms,
            })
        })
        .collect();

    match &result.outcome {
        RunOutcome::Completed => Json(json!({
            "success": true,
            "message": format!("migration {} completed", result.migration_name),
            "results": results,
            "total_execution_time_ms": result.total_execution_time_ms,
            "chunks_executed": result.chunks_executed(),
        }))
        .into_response(),
        RunOutcome::Failed {
            chunk_id,
            chunk_name,
            error_message,
        } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": format!("migration failed at chunk {chunk_id} ({chunk_name})"),
                "details": error_message,
                "chunk": chunk_id,
                "chunk_name": chunk_name,
                "results": results,
                "chunks_executed": result.chunks_executed(),
            })),
        )
            .into_response(),
    }
}

fn record_response(record: &ExecutionRecord, what: &str) -> Response {
    if record.success {
        Json(json!({
            "success": true,
            "message": format!("{what} executed successfully"),
            "execution_time_ms": record.execution_time_ms,
        }))
        .into_response()
    } else {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": format!("{what} failed"),
                "details": record.error_message,
            })),
        )
            .into_response()
    }
}
