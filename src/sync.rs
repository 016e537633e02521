//! Full guiaseller -> leads reconciliation run.
//!
//! State machine per run: fetch -> join -> per-user upsert (strictly
//! sequential) -> sync log. A failed initial fetch aborts the run and writes
//! no sync log; a failed per-user upsert is caught, counted, and never aborts
//! the run. An in-flight run cannot be cancelled (known limitation).
//!
//! Triggered manually via `POST /api/v1/admin/sync`, by the `run_sync` binary,
//! or by an external scheduler (e.g. every 6 hours).

use bigdecimal::{BigDecimal, FromPrimitive};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::aggregator::{DerivedMetrics, SourceIndex};
use crate::errors::AppError;
use crate::models::{EnrichmentPayload, LeadPayload, ScoreResult, SyncLogEntry, SyncResult};
use crate::scoring::{calculate_score, ScoringInput};
use crate::segmentation::{classify_source_user, LIFETIME_LEVEL, SUBSCRIPTION_ACTIVE};
use crate::source_reader::{SourceBatch, SourceReader, SourceSubscription, SourceUser};

/// Value written to `leads.sync_source` by this pipeline.
pub const SYNC_SOURCE: &str = "guiaseller-db";
/// A user row touched within this many days counts as recently active.
const RECENT_UPDATE_DAYS: i64 = 30;

/// Repository-style persistence seam for the sync loop.
///
/// The production implementation is [`crate::repository::LeadRepository`];
/// tests drive the loop with an in-memory store to exercise partial-failure
/// behavior without a database.
pub trait LeadStore {
    /// Upsert key lookup: at most one lead per external user id.
    fn find_by_external_id(
        &self,
        external_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<Uuid>, AppError>> + Send;

    /// Creates a lead with nested enrichment and an initial score snapshot.
    fn create_synced_lead(
        &self,
        lead: &LeadPayload,
        enrichment: &EnrichmentPayload,
        score: &ScoreResult,
    ) -> impl std::future::Future<Output = Result<Uuid, AppError>> + Send;

    /// Updates a lead in place, upserts its enrichment, and appends a score
    /// snapshot.
    fn update_synced_lead(
        &self,
        id: Uuid,
        lead: &LeadPayload,
        enrichment: &EnrichmentPayload,
        score: &ScoreResult,
    ) -> impl std::future::Future<Output = Result<(), AppError>> + Send;

    fn insert_sync_log(
        &self,
        entry: &SyncLogEntry,
    ) -> impl std::future::Future<Output = Result<(), AppError>> + Send;
}

enum UpsertOutcome {
    Created,
    Updated,
}

pub struct SyncService<S> {
    store: S,
}

impl<S: LeadStore> SyncService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Runs one full reconciliation against a fresh source batch.
    pub async fn run_full_sync(&self, source: &SourceReader<'_>) -> Result<SyncResult, AppError> {
        let started_at = Utc::now();
        tracing::info!("Starting guiaseller -> leads sync");

        // A failed batch fetch is a hard failure: abort with no sync log.
        let batch = source.fetch_batch().await?;

        self.process_batch(&batch, started_at).await
    }

    /// Joins the batch and upserts every user, isolating per-record failures.
    pub async fn process_batch(
        &self,
        batch: &SourceBatch,
        started_at: DateTime<Utc>,
    ) -> Result<SyncResult, AppError> {
        let index = SourceIndex::build(batch);
        let now = Utc::now();

        let mut result = SyncResult {
            total_users: batch.users.len(),
            ..SyncResult::default()
        };

        for user in &batch.users {
            match self.sync_user(user, &index, now).await {
                Ok(UpsertOutcome::Created) => {
                    result.created += 1;
                    result.enriched += 1;
                }
                Ok(UpsertOutcome::Updated) => {
                    result.updated += 1;
                    result.enriched += 1;
                }
                Err(e) => {
                    result.errors += 1;
                    tracing::error!("Error syncing user {}: {}", user.email, e);
                }
            }
        }

        let completed_at = Utc::now();
        result.duration_ms = (completed_at - started_at).num_milliseconds().max(0) as u64;

        // The log row is written with final totals whether or not individual
        // records failed; partial success is a valid terminal status.
        let entry = SyncLogEntry {
            marketplace: "all".to_string(),
            sync_type: "full-sync".to_string(),
            status: if result.errors == 0 {
                "success".to_string()
            } else {
                "partial".to_string()
            },
            leads_processed: result.total_users as i32,
            leads_created: result.created as i32,
            leads_updated: result.updated as i32,
            error_message: if result.errors > 0 {
                Some(format!("{} errors during sync", result.errors))
            } else {
                None
            },
            started_at,
            completed_at,
        };
        self.store.insert_sync_log(&entry).await?;

        tracing::info!(
            created = result.created,
            updated = result.updated,
            errors = result.errors,
            duration_ms = result.duration_ms,
            "Sync complete"
        );

        Ok(result)
    }

    async fn sync_user(
        &self,
        user: &SourceUser,
        index: &SourceIndex<'_>,
        now: DateTime<Utc>,
    ) -> Result<UpsertOutcome, AppError> {
        let metrics = index.metrics_for(&user.user_id);
        let sub = index.subscription(&user.user_id);

        let lead = build_lead_payload(user, sub, &metrics, now);
        let enrichment = build_enrichment_payload(user, index, &metrics, sub);

        // The loyalty anchor is the source account's creation date so that
        // back-to-back runs over unchanged data produce identical scores.
        let score = calculate_score(
            &ScoringInput::from_sync_payload(&lead, &enrichment, user.created_at),
            now,
        );

        match self.store.find_by_external_id(&user.user_id).await? {
            Some(id) => {
                self.store
                    .update_synced_lead(id, &lead, &enrichment, &score)
                    .await?;
                Ok(UpsertOutcome::Updated)
            }
            None => {
                self.store
                    .create_synced_lead(&lead, &enrichment, &score)
                    .await?;
                Ok(UpsertOutcome::Created)
            }
        }
    }
}

/// Lead status at sync time: active subscription, elevated tier, or a recent
/// touch keep a lead active; a lapsed subscription marks it churned.
pub fn derive_status(
    user: &SourceUser,
    sub: Option<&SourceSubscription>,
    now: DateTime<Utc>,
) -> &'static str {
    if let Some(sub) = sub {
        if sub.status == SUBSCRIPTION_ACTIVE {
            return "active";
        }
        return "churned";
    }

    let level = user.user_level.as_deref().unwrap_or("").to_uppercase();
    if level == LIFETIME_LEVEL || level == "PREMIUM" || level == "PRO" {
        return "active";
    }

    if now - user.updated_at < Duration::days(RECENT_UPDATE_DAYS) {
        return "active";
    }

    "inactive"
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.is_empty()).map(str::to_string)
}

fn decimal(value: f64) -> BigDecimal {
    BigDecimal::from_f64(value).unwrap_or_default()
}

/// Builds the lead column values for one source user.
pub fn build_lead_payload(
    user: &SourceUser,
    sub: Option<&SourceSubscription>,
    metrics: &DerivedMetrics,
    now: DateTime<Utc>,
) -> LeadPayload {
    let segment = classify_source_user(user, sub, metrics);

    LeadPayload {
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone().unwrap_or_default(),
        phone: non_empty(user.mobile_phone.as_deref()).or_else(|| non_empty(user.phone.as_deref())),
        guiaseller_user_id: user.user_id.clone(),
        user_level: user.user_level.clone(),
        subscription_plan: sub
            .and_then(|s| s.description.clone())
            .or_else(|| user.plan_name.clone()),
        subscription_status: sub.map(|s| s.status.clone()),
        cnpj_cpf: user.cnpj_cpf.clone(),
        purchase_count: metrics.total_orders as i32,
        total_revenue: decimal(metrics.total_revenue),
        listing_count: metrics.total_listings() as i32,
        segment: segment.as_str().to_string(),
        primary_marketplace: metrics.primary_marketplace.map(|m| m.as_str().to_string()),
        marketplaces: metrics
            .marketplaces
            .iter()
            .map(|m| m.as_str().to_string())
            .collect(),
        status: derive_status(user, sub, now).to_string(),
        sync_source: SYNC_SOURCE.to_string(),
    }
}

/// Builds the enrichment column values for one source user.
pub fn build_enrichment_payload(
    user: &SourceUser,
    index: &SourceIndex<'_>,
    metrics: &DerivedMetrics,
    sub: Option<&SourceSubscription>,
) -> EnrichmentPayload {
    let company = index.company(&user.user_id);
    let total_orders = metrics.total_orders;
    let avg_order_value = if total_orders > 0 {
        metrics.total_revenue / total_orders as f64
    } else {
        0.0
    };

    EnrichmentPayload {
        company_name: company.map(|c| c.company_name.clone()),
        fantasy_name: company.and_then(|c| c.fantasy_name.clone()),
        cnpj: company.map(|c| c.cnpj.clone()),
        business_type: if company.is_some() {
            "business".to_string()
        } else {
            "individual".to_string()
        },
        ml_order_count: metrics.ml.orders as i32,
        ml_revenue: decimal(metrics.ml.revenue),
        shopee_order_count: metrics.shopee.orders as i32,
        shopee_revenue: decimal(metrics.shopee.revenue),
        magalu_order_count: metrics.magalu.orders as i32,
        // Structurally zero; the source has no Magalu amount column.
        magalu_revenue: decimal(metrics.magalu.revenue),
        shein_order_count: metrics.shein.orders as i32,
        shein_revenue: decimal(metrics.shein.revenue),
        total_order_count: total_orders as i32,
        total_order_value: decimal(metrics.total_revenue),
        avg_order_value: decimal(avg_order_value),
        ml_listing_count: metrics.ml_listing_count as i32,
        shopee_listing_count: metrics.shopee_listing_count as i32,
        total_product_count: metrics.total_listings() as i32,
        ml_integrations: metrics.active_ml_integrations as i32,
        shopee_integrations: i32::from(metrics.shopee_integration_active),
        magalu_integrations: i32::from(metrics.magalu_integration_active),
        subscription_value: decimal(sub.map(|s| s.value).unwrap_or(0.0)),
        subscription_cycle: sub.and_then(|s| s.cycle.clone()),
        last_active_at: Some(user.updated_at),
    }
}
