use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// ============ Marketplaces ============

/// Marketplaces the guiaseller platform integrates with.
///
/// `PREFERENCE` is the fixed presence/tie-break order used by the aggregator.
/// Do not reorder it: the primary-marketplace fallback depends on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Marketplace {
    Ml,
    Shopee,
    Magalu,
    Shein,
}

impl Marketplace {
    pub const PREFERENCE: [Marketplace; 4] = [
        Marketplace::Ml,
        Marketplace::Shopee,
        Marketplace::Magalu,
        Marketplace::Shein,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Marketplace::Ml => "ML",
            Marketplace::Shopee => "Shopee",
            Marketplace::Magalu => "Magalu",
            Marketplace::Shein => "Shein",
        }
    }
}

impl std::fmt::Display for Marketplace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Leads Database Models ============

/// Canonical CRM record for a guiaseller platform user.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lead {
    pub id: Uuid,
    pub email: String,
    pub phone: Option<String>,
    pub first_name: String,
    pub last_name: String,
    /// External-system linkage; at most one lead per non-null value.
    pub guiaseller_user_id: Option<String>,
    pub user_level: Option<String>,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<String>,
    pub cnpj_cpf: Option<String>,
    /// Total order count across all marketplaces.
    pub purchase_count: i32,
    pub total_revenue: BigDecimal,
    pub listing_count: i32,
    /// Weighted score, always within [0, 100].
    pub lead_score: i32,
    /// Step function of the score bracket, always within [0.0, 1.0].
    pub conversion_prob: f64,
    pub score_reason: Option<String>,
    pub score_calculated_at: Option<DateTime<Utc>>,
    pub segment: Option<String>,
    pub primary_marketplace: Option<String>,
    pub marketplaces: Vec<String>,
    /// active | inactive | churned | archived
    pub status: String,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub sync_source: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 1:1 extension of a lead holding per-marketplace commerce breakdowns.
///
/// Created and updated only by the sync orchestrator (or a manual enrichment
/// write), never standalone.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadEnrichment {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub company_name: Option<String>,
    pub fantasy_name: Option<String>,
    pub cnpj: Option<String>,
    /// "business" when a company record exists in the source, else "individual".
    pub business_type: Option<String>,
    pub ml_order_count: i32,
    pub ml_revenue: BigDecimal,
    pub shopee_order_count: i32,
    pub shopee_revenue: BigDecimal,
    pub magalu_order_count: i32,
    /// Always zero: the source aggregation has no Magalu amount column.
    pub magalu_revenue: BigDecimal,
    pub shein_order_count: i32,
    pub shein_revenue: BigDecimal,
    pub total_order_count: i32,
    pub total_order_value: BigDecimal,
    pub avg_order_value: BigDecimal,
    pub ml_listing_count: i32,
    pub shopee_listing_count: i32,
    pub total_product_count: i32,
    pub ml_integrations: i32,
    pub shopee_integrations: i32,
    pub magalu_integrations: i32,
    pub subscription_value: BigDecimal,
    pub subscription_cycle: Option<String>,
    pub last_order_at: Option<DateTime<Utc>>,
    pub last_active_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Behavioral event attached to a lead (page view, email open, ...).
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadEvent {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub event_type: String,
    pub marketplace: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Append-only audit row: one per lead mutation. Never updated or deleted.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadHistory {
    pub id: Uuid,
    pub lead_id: Uuid,
    /// created | updated | archived | segmented
    pub event_type: String,
    pub field_changed: Option<String>,
    pub old_value: Option<serde_json::Value>,
    pub new_value: Option<serde_json::Value>,
    /// Null for system-driven changes.
    pub admin_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Append-only snapshot of one score computation.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct LeadScoreRecord {
    pub id: Uuid,
    pub lead_id: Uuid,
    pub score: i32,
    pub reason: Option<String>,
    pub components: sqlx::types::Json<ScoreComponents>,
    pub created_at: DateTime<Utc>,
}

/// One row per full sync run, written once at run end with final totals.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct SyncLog {
    pub id: Uuid,
    pub marketplace: String,
    pub sync_type: String,
    /// success | partial
    pub status: String,
    pub leads_processed: i32,
    pub leads_created: i32,
    pub leads_updated: i32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

// ============ Scoring ============

/// The four weighted sub-scores, each within [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreComponents {
    pub purchase_history: i32,
    pub browsing_activity: i32,
    pub interest_match: i32,
    pub engagement: i32,
}

/// Output of one score-engine evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreResult {
    pub score: i32,
    pub conversion_prob: f64,
    pub reason: String,
    pub components: ScoreComponents,
}

// ============ Sync ============

/// Summary returned by a full sync run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResult {
    pub total_users: usize,
    pub created: usize,
    pub updated: usize,
    pub enriched: usize,
    pub errors: usize,
    pub duration_ms: u64,
}

/// Final totals persisted as a sync_logs row.
#[derive(Debug, Clone)]
pub struct SyncLogEntry {
    pub marketplace: String,
    pub sync_type: String,
    pub status: String,
    pub leads_processed: i32,
    pub leads_created: i32,
    pub leads_updated: i32,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Lead column values built by the sync orchestrator for one source user.
#[derive(Debug, Clone)]
pub struct LeadPayload {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub guiaseller_user_id: String,
    pub user_level: Option<String>,
    pub subscription_plan: Option<String>,
    pub subscription_status: Option<String>,
    pub cnpj_cpf: Option<String>,
    pub purchase_count: i32,
    pub total_revenue: BigDecimal,
    pub listing_count: i32,
    pub segment: String,
    pub primary_marketplace: Option<String>,
    pub marketplaces: Vec<String>,
    pub status: String,
    pub sync_source: String,
}

/// Enrichment column values built by the sync orchestrator for one source user.
#[derive(Debug, Clone)]
pub struct EnrichmentPayload {
    pub company_name: Option<String>,
    pub fantasy_name: Option<String>,
    pub cnpj: Option<String>,
    pub business_type: String,
    pub ml_order_count: i32,
    pub ml_revenue: BigDecimal,
    pub shopee_order_count: i32,
    pub shopee_revenue: BigDecimal,
    pub magalu_order_count: i32,
    pub magalu_revenue: BigDecimal,
    pub shein_order_count: i32,
    pub shein_revenue: BigDecimal,
    pub total_order_count: i32,
    pub total_order_value: BigDecimal,
    pub avg_order_value: BigDecimal,
    pub ml_listing_count: i32,
    pub shopee_listing_count: i32,
    pub total_product_count: i32,
    pub ml_integrations: i32,
    pub shopee_integrations: i32,
    pub magalu_integrations: i32,
    pub subscription_value: BigDecimal,
    pub subscription_cycle: Option<String>,
    pub last_active_at: Option<DateTime<Utc>>,
}

// ============ Request / Response DTOs ============

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListLeadsParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub search: Option<String>,
    pub status: Option<String>,
    pub segment: Option<String>,
    pub marketplace: Option<String>,
    pub score_min: Option<i32>,
    pub score_max: Option<i32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub email: String,
    pub phone: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub primary_marketplace: Option<String>,
    pub marketplaces: Option<Vec<String>>,
    pub segment: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLeadRequest {
    pub email: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub primary_marketplace: Option<String>,
    pub marketplaces: Option<Vec<String>>,
    pub segment: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkActionRequest {
    pub action: String,
    pub lead_ids: Vec<Uuid>,
}

/// Aggregate numbers for the analytics overview endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsOverview {
    pub total_leads: i64,
    pub avg_score: f64,
    pub by_segment: Vec<SegmentCount>,
    pub by_status: Vec<StatusCount>,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct SegmentCount {
    pub segment: Option<String>,
    pub count: i64,
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}
