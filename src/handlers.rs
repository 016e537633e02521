use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use regex::Regex;
use serde_json::json;
use sqlx::PgPool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::SourceDb;
use crate::errors::AppError;
use crate::models::{BulkActionRequest, CreateLeadRequest, ListLeadsParams, UpdateLeadRequest};
use crate::repository::LeadRepository;
use crate::scoring::{calculate_score, ScoringInput};
use crate::segmentation::classify_lead;
use crate::source_reader::SourceReader;
use crate::sync::SyncService;

/// Shared application state injected into handlers.
pub struct AppState {
    /// Leads database pool (full CRUD).
    pub db: PgPool,
    /// External guiaseller database (read-only).
    pub source: SourceDb,
    /// Mutual-exclusion flag: at most one sync run at a time against the
    /// leads store. Concurrent runs risk duplicate-create races on the
    /// upsert-by-external-id lookup.
    pub sync_running: AtomicBool,
}

/// Validate email address at the CRUD boundary.
///
/// The core scoring/segmentation functions coalesce rather than reject;
/// malformed input is only refused here.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // RFC 5322 simplified
    let email_regex = Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .unwrap();

    email_regex.is_match(email)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "leads-sync-api",
            "version": "0.1.0"
        })),
    )
}

/// POST /api/v1/admin/sync
///
/// Runs one full guiaseller -> leads reconciliation. Returns 409 if a run is
/// already in progress; runs are never executed concurrently.
///
/// The run executes on a detached task: a client disconnect drops this
/// handler's future, but the sync still runs to completion, writes its log
/// row, and releases the guard.
pub async fn run_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    if state.sync_running.swap(true, Ordering::SeqCst) {
        return Err(AppError::SyncInProgress);
    }

    let task_state = Arc::clone(&state);
    let task = tokio::spawn(async move {
        // Releases the guard on every exit path, including panics.
        struct Release(Arc<AppState>);
        impl Drop for Release {
            fn drop(&mut self) {
                self.0.sync_running.store(false, Ordering::SeqCst);
            }
        }
        let _release = Release(Arc::clone(&task_state));

        let service = SyncService::new(LeadRepository::new(task_state.db.clone()));
        let reader = SourceReader::new(&task_state.source);
        service.run_full_sync(&reader).await
    });

    let result = task
        .await
        .map_err(|e| AppError::InternalError(format!("Sync task failed: {}", e)))??;
    Ok(Json(json!({ "success": true, "data": result })))
}

/// GET /api/v1/admin/sync/status — most recent sync log row.
pub async fn sync_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = LeadRepository::new(state.db.clone());
    let last = repo
        .last_sync_log()
        .await?
        .ok_or_else(|| AppError::NotFound("No sync has run yet".to_string()))?;

    Ok(Json(json!({
        "success": true,
        "data": { "lastSync": last, "running": state.sync_running.load(Ordering::SeqCst) }
    })))
}

/// GET /api/v1/leads — paginated list with sorting and filtering.
pub async fn list_leads(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListLeadsParams>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = LeadRepository::new(state.db.clone());
    let (leads, total) = repo.list_leads(&params).await?;

    let limit = params.limit.clamp(1, 100);
    let page = params.page.max(1);
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(json!({
        "success": true,
        "data": {
            "leads": leads,
            "pagination": {
                "page": page,
                "limit": limit,
                "total": total,
                "totalPages": total_pages,
            }
        }
    })))
}

/// GET /api/v1/leads/:id — lead detail with relations.
pub async fn get_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = LeadRepository::new(state.db.clone());

    let lead = repo.get_lead(id).await?;
    let enrichment = repo.get_enrichment(id).await?;
    let history = repo.recent_history(id, 50).await?;
    let events = repo.recent_events(id, 50).await?;
    let scores = repo.recent_scores(id, 10).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "lead": lead,
            "enrichment": enrichment,
            "history": history,
            "events": events,
            "scores": scores,
        }
    })))
}

/// POST /api/v1/leads — create a lead manually.
pub async fn create_lead(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateLeadRequest>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    if !is_valid_email(&req.email) {
        return Err(AppError::BadRequest(format!(
            "Invalid email address: {}",
            req.email
        )));
    }
    if req.first_name.trim().is_empty() || req.last_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "firstName and lastName are required".to_string(),
        ));
    }

    let repo = LeadRepository::new(state.db.clone());
    let lead = repo.create_manual(&req).await?;
    repo.record_history(lead.id, "created", None, None, Some(json!({"source": "manual"})), None)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "data": { "lead": lead } })),
    ))
}

/// PATCH /api/v1/leads/:id — update; changed fields are audited.
pub async fn update_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateLeadRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Some(email) = &req.email {
        if !is_valid_email(email) {
            return Err(AppError::BadRequest(format!(
                "Invalid email address: {}",
                email
            )));
        }
    }

    let repo = LeadRepository::new(state.db.clone());
    let current = repo.get_lead(id).await?;
    let updated = repo.update_manual(id, &req).await?;

    // Audit only the fields that actually changed.
    let mut old_values = serde_json::Map::new();
    let mut new_values = serde_json::Map::new();
    let pairs: [(&str, serde_json::Value, serde_json::Value); 8] = [
        ("email", json!(current.email), json!(updated.email)),
        ("phone", json!(current.phone), json!(updated.phone)),
        ("firstName", json!(current.first_name), json!(updated.first_name)),
        ("lastName", json!(current.last_name), json!(updated.last_name)),
        (
            "primaryMarketplace",
            json!(current.primary_marketplace),
            json!(updated.primary_marketplace),
        ),
        ("marketplaces", json!(current.marketplaces), json!(updated.marketplaces)),
        ("segment", json!(current.segment), json!(updated.segment)),
        ("status", json!(current.status), json!(updated.status)),
    ];
    for (field, old, new) in pairs {
        if old != new {
            old_values.insert(field.to_string(), old);
            new_values.insert(field.to_string(), new);
        }
    }

    if !new_values.is_empty() {
        let changed = new_values
            .keys()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        repo.record_history(
            id,
            "updated",
            Some(changed.as_str()),
            Some(serde_json::Value::Object(old_values)),
            Some(serde_json::Value::Object(new_values)),
            None,
        )
        .await?;
    }

    Ok(Json(json!({ "success": true, "data": { "lead": updated } })))
}

/// DELETE /api/v1/leads/:id — soft delete. Leads are archived, never removed.
pub async fn archive_lead(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = LeadRepository::new(state.db.clone());
    let lead = repo.set_status(id, "archived").await?;
    repo.record_history(id, "archived", Some("status"), None, Some(json!("archived")), None)
        .await?;

    Ok(Json(json!({ "success": true, "data": { "lead": lead } })))
}

/// POST /api/v1/leads/:id/score — on-demand score recompute.
///
/// Idempotent given stable inputs; concurrent recomputes on the same lead are
/// last-writer-wins.
pub async fn recompute_score(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = LeadRepository::new(state.db.clone());

    let lead = repo.get_lead(id).await?;
    let enrichment = repo.get_enrichment(id).await?;
    let event_count = repo.count_events(id).await?;

    let input = ScoringInput::from_lead(&lead, enrichment.as_ref(), event_count as usize);
    let score = calculate_score(&input, Utc::now());

    let updated = repo.apply_score(id, &score).await?;
    repo.insert_score_record(id, &score).await?;

    Ok(Json(json!({
        "success": true,
        "data": { "lead": updated, "scoreDetails": score }
    })))
}

/// POST /api/v1/leads/:id/segment — on-demand post-sync reclassification.
pub async fn recompute_segment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = LeadRepository::new(state.db.clone());

    let lead = repo.get_lead(id).await?;
    let enrichment = repo.get_enrichment(id).await?;

    let segment = classify_lead(&lead, enrichment.as_ref(), Utc::now());
    let updated = repo.set_segment(id, segment.as_str()).await?;
    repo.record_history(
        id,
        "segmented",
        Some("segment"),
        Some(json!(lead.segment)),
        Some(json!(segment.as_str())),
        None,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "data": { "lead": updated, "segment": segment.as_str() }
    })))
}

/// POST /api/v1/leads/bulk — bulk archive / activate / rescore.
///
/// Rescore iterates sequentially with the same per-record isolation rule as
/// the sync loop: one failing lead never aborts the batch.
pub async fn bulk_action(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BulkActionRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if req.lead_ids.is_empty() {
        return Err(AppError::BadRequest("leadIds are required".to_string()));
    }

    let repo = LeadRepository::new(state.db.clone());

    let affected = match req.action.as_str() {
        "archive" => repo.set_status_bulk(&req.lead_ids, "archived").await?,
        "activate" => repo.set_status_bulk(&req.lead_ids, "active").await?,
        "rescore" => {
            let mut rescored = 0u64;
            let mut errors = 0u64;
            for lead_id in &req.lead_ids {
                match rescore_one(&repo, *lead_id).await {
                    Ok(()) => rescored += 1,
                    Err(e) => {
                        errors += 1;
                        tracing::error!("Error rescoring lead {}: {}", lead_id, e);
                    }
                }
            }
            if errors > 0 {
                tracing::warn!(rescored, errors, "Bulk rescore finished with errors");
            }
            rescored
        }
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown bulk action: {}",
                other
            )))
        }
    };

    Ok(Json(json!({
        "success": true,
        "data": { "action": req.action, "affected": affected }
    })))
}

async fn rescore_one(repo: &LeadRepository, lead_id: Uuid) -> Result<(), AppError> {
    let lead = repo.get_lead(lead_id).await?;
    let enrichment = repo.get_enrichment(lead_id).await?;
    let event_count = repo.count_events(lead_id).await?;

    let input = ScoringInput::from_lead(&lead, enrichment.as_ref(), event_count as usize);
    let score = calculate_score(&input, Utc::now());

    repo.apply_score(lead_id, &score).await?;
    repo.insert_score_record(lead_id, &score).await?;
    Ok(())
}

/// GET /api/v1/analytics/overview — lead counts by segment/status, avg score.
pub async fn analytics_overview(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, AppError> {
    let repo = LeadRepository::new(state.db.clone());
    let overview = repo.analytics_overview().await?;

    Ok(Json(json!({ "success": true, "data": overview })))
}
