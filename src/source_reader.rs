//! Read-only aggregate queries against the external guiaseller database.
//!
//! The batch is fetched once per sync run and joined locally by the
//! aggregator; nothing here ever writes. Any query failure maps to
//! [`AppError::SourceUnavailable`] and the caller must abort the run rather
//! than partially retry.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::db::SourceDb;
use crate::errors::AppError;

/// One row of the source `"User"` table.
#[derive(Debug, Clone, FromRow)]
pub struct SourceUser {
    pub user_id: String,
    pub first_name: String,
    pub last_name: Option<String>,
    pub email: String,
    pub phone: Option<String>,
    pub user_level: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cnpj_cpf: Option<String>,
    /// Plan name recorded on the user row itself (fallback when no
    /// subscription row exists).
    pub plan_name: Option<String>,
    /// Mobile number; preferred over `phone` when present.
    pub mobile_phone: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SourceCompany {
    pub user_id: String,
    pub company_name: String,
    pub fantasy_name: Option<String>,
    pub cnpj: String,
}

/// Mercado Livre integration row. ML supports multiple accounts per user,
/// unlike the single-flag Shopee/Magalu tables.
#[derive(Debug, Clone, FromRow)]
pub struct MlIntegrationRow {
    pub user_id: String,
    pub is_active: bool,
}

/// Single-row status flag (Shopee and Magalu integration tables).
#[derive(Debug, Clone, FromRow)]
pub struct StatusRow {
    pub user_id: String,
    pub status: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct SourceSubscription {
    pub user_id: String,
    pub status: String,
    pub value: f64,
    pub description: Option<String>,
    pub cycle: Option<String>,
}

/// Pre-grouped per-user order aggregate (count + summed revenue).
#[derive(Debug, Clone, FromRow)]
pub struct OrderAggregate {
    pub user_id: String,
    pub order_count: i64,
    pub total_amount: Option<f64>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ListingAggregate {
    pub user_id: String,
    pub listing_count: i64,
}

/// Immutable row sets for one sync run, fetched once and joined in memory.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub users: Vec<SourceUser>,
    pub companies: Vec<SourceCompany>,
    pub ml_integrations: Vec<MlIntegrationRow>,
    pub shopee_integrations: Vec<StatusRow>,
    pub magalu_integrations: Vec<StatusRow>,
    pub subscriptions: Vec<SourceSubscription>,
    pub ml_orders: Vec<OrderAggregate>,
    pub shopee_orders: Vec<OrderAggregate>,
    pub magalu_orders: Vec<OrderAggregate>,
    pub shein_orders: Vec<OrderAggregate>,
    pub ml_listings: Vec<ListingAggregate>,
    pub shopee_listings: Vec<ListingAggregate>,
}

pub struct SourceReader<'a> {
    db: &'a SourceDb,
}

impl<'a> SourceReader<'a> {
    pub fn new(db: &'a SourceDb) -> Self {
        Self { db }
    }

    /// Fetches the full batch for a sync run.
    ///
    /// The constituent queries fan out concurrently; there is no ordering
    /// dependency between them. Magalu orders select a constant 0 amount
    /// because the source table has no revenue column (known data gap).
    pub async fn fetch_batch(&self) -> Result<SourceBatch, AppError> {
        let pool = self.db.read_pool();

        let users = sqlx::query_as::<_, SourceUser>(
            r#"
            SELECT user_id, first_name, last_name, email, phone, user_level,
                   "createdAt" as created_at, "updatedAt" as updated_at,
                   cnpj_cpf, nome_assinatura as plan_name, celular as mobile_phone
            FROM "User"
            ORDER BY "createdAt"
            "#,
        )
        .fetch_all(pool);

        let companies = sqlx::query_as::<_, SourceCompany>(
            r#"SELECT "userId" as user_id, company_name, fantasy_name, cnpj FROM "Company""#,
        )
        .fetch_all(pool);

        let ml_integrations = sqlx::query_as::<_, MlIntegrationRow>(
            r#"SELECT "userId" as user_id, is_active FROM "Integrations""#,
        )
        .fetch_all(pool);

        let shopee_integrations = sqlx::query_as::<_, StatusRow>(
            r#"SELECT "userId" as user_id, status FROM "IntegrationShopee""#,
        )
        .fetch_all(pool);

        let magalu_integrations = sqlx::query_as::<_, StatusRow>(
            r#"SELECT "userId" as user_id, status FROM integrations_magalu"#,
        )
        .fetch_all(pool);

        let subscriptions = sqlx::query_as::<_, SourceSubscription>(
            r#"SELECT "userId" as user_id, status, value::float8 as value, description, cycle
               FROM assinaturas"#,
        )
        .fetch_all(pool);

        let ml_orders = sqlx::query_as::<_, OrderAggregate>(
            r#"SELECT "userId" as user_id, count(*)::bigint as order_count,
                      sum(total_amount)::float8 as total_amount
               FROM orders GROUP BY "userId""#,
        )
        .fetch_all(pool);

        let shopee_orders = sqlx::query_as::<_, OrderAggregate>(
            r#"SELECT o."userId" as user_id, count(*)::bigint as order_count,
                      sum(o.total_amount)::float8 as total_amount
               FROM orders_shopee o GROUP BY o."userId""#,
        )
        .fetch_all(pool);

        let magalu_orders = sqlx::query_as::<_, OrderAggregate>(
            r#"SELECT "userId" as user_id, count(*)::bigint as order_count,
                      0::float8 as total_amount
               FROM magalu_orders GROUP BY "userId""#,
        )
        .fetch_all(pool);

        let shein_orders = sqlx::query_as::<_, OrderAggregate>(
            r#"SELECT "userId" as user_id, count(*)::bigint as order_count,
                      sum("productTotalPrice")::float8 as total_amount
               FROM orders_shein GROUP BY "userId""#,
        )
        .fetch_all(pool);

        let ml_listings = sqlx::query_as::<_, ListingAggregate>(
            r#"SELECT "userId" as user_id, count(*)::bigint as listing_count
               FROM "Anuncios" GROUP BY "userId""#,
        )
        .fetch_all(pool);

        let shopee_listings = sqlx::query_as::<_, ListingAggregate>(
            r#"SELECT "userId" as user_id, count(*)::bigint as listing_count
               FROM "ProductsShopee" GROUP BY "userId""#,
        )
        .fetch_all(pool);

        let (
            users,
            companies,
            ml_integrations,
            shopee_integrations,
            magalu_integrations,
            subscriptions,
            ml_orders,
            shopee_orders,
            magalu_orders,
            shein_orders,
            ml_listings,
            shopee_listings,
        ) = tokio::try_join!(
            users,
            companies,
            ml_integrations,
            shopee_integrations,
            magalu_integrations,
            subscriptions,
            ml_orders,
            shopee_orders,
            magalu_orders,
            shein_orders,
            ml_listings,
            shopee_listings,
        )
        .map_err(|e| AppError::SourceUnavailable(e.to_string()))?;

        tracing::info!(
            users = users.len(),
            companies = companies.len(),
            subscriptions = subscriptions.len(),
            "Fetched source batch from guiaseller DB"
        );

        Ok(SourceBatch {
            users,
            companies,
            ml_integrations,
            shopee_integrations,
            magalu_integrations,
            subscriptions,
            ml_orders,
            shopee_orders,
            magalu_orders,
            shein_orders,
            ml_listings,
            shopee_listings,
        })
    }
}
