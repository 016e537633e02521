//! Persistence over the leads database.
//!
//! Sequential queries rather than CTEs, in line with sqlx ergonomics. The
//! sync-time upsert is find-then-insert/update on `guiaseller_user_id`; the
//! enrichment row uses a true `ON CONFLICT` upsert on its unique `lead_id`.

use sqlx::{PgPool, QueryBuilder};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::{
    AnalyticsOverview, CreateLeadRequest, EnrichmentPayload, Lead, LeadEnrichment, LeadEvent,
    LeadHistory, LeadPayload, LeadScoreRecord, ListLeadsParams, ScoreResult, SegmentCount,
    StatusCount, SyncLog, SyncLogEntry, UpdateLeadRequest,
};
use crate::sync::LeadStore;

pub struct LeadRepository {
    pool: PgPool,
}

impl LeadRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, sqlx::Postgres>, params: &'a ListLeadsParams) {
        if let Some(status) = &params.status {
            qb.push(" AND status = ").push_bind(status);
        }
        if let Some(segment) = &params.segment {
            qb.push(" AND segment = ").push_bind(segment);
        }
        if let Some(marketplace) = &params.marketplace {
            qb.push(" AND primary_marketplace = ").push_bind(marketplace);
        }
        if let Some(min) = params.score_min {
            qb.push(" AND lead_score >= ").push_bind(min);
        }
        if let Some(max) = params.score_max {
            qb.push(" AND lead_score <= ").push_bind(max);
        }
        if let Some(search) = &params.search {
            let pattern = format!("%{}%", search);
            qb.push(" AND (first_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR last_name ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR email ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    /// Paginated, filtered listing; returns the page plus the total count.
    pub async fn list_leads(
        &self,
        params: &ListLeadsParams,
    ) -> Result<(Vec<Lead>, i64), AppError> {
        // Sort column and direction come from a whitelist, never from user
        // input directly.
        let sort = match params.sort.as_deref() {
            Some("leadScore") | Some("lead_score") => "lead_score",
            Some("firstName") | Some("first_name") => "first_name",
            Some("updatedAt") | Some("updated_at") => "updated_at",
            _ => "created_at",
        };
        let order = match params.order.as_deref() {
            Some("asc") => "ASC",
            _ => "DESC",
        };

        let limit = params.limit.clamp(1, 100);
        let page = params.page.max(1);
        let offset = (page - 1) * limit;

        let mut qb = QueryBuilder::new("SELECT * FROM leads WHERE 1=1");
        Self::push_filters(&mut qb, params);
        qb.push(format!(" ORDER BY {} {}", sort, order));
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let leads = qb
            .build_query_as::<Lead>()
            .fetch_all(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        let mut count_qb = QueryBuilder::new("SELECT count(*) FROM leads WHERE 1=1");
        Self::push_filters(&mut count_qb, params);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        Ok((leads, total))
    }

    pub async fn get_lead(&self, id: Uuid) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>("SELECT * FROM leads WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?
            .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    pub async fn get_enrichment(&self, lead_id: Uuid) -> Result<Option<LeadEnrichment>, AppError> {
        sqlx::query_as::<_, LeadEnrichment>("SELECT * FROM lead_enrichments WHERE lead_id = $1")
            .bind(lead_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn recent_history(
        &self,
        lead_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LeadHistory>, AppError> {
        sqlx::query_as::<_, LeadHistory>(
            "SELECT * FROM lead_history WHERE lead_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(lead_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn recent_scores(
        &self,
        lead_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LeadScoreRecord>, AppError> {
        sqlx::query_as::<_, LeadScoreRecord>(
            "SELECT * FROM lead_scores WHERE lead_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(lead_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn recent_events(
        &self,
        lead_id: Uuid,
        limit: i64,
    ) -> Result<Vec<LeadEvent>, AppError> {
        sqlx::query_as::<_, LeadEvent>(
            "SELECT * FROM lead_events WHERE lead_id = $1 ORDER BY created_at DESC LIMIT $2",
        )
        .bind(lead_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn count_events(&self, lead_id: Uuid) -> Result<i64, AppError> {
        sqlx::query_scalar("SELECT count(*) FROM lead_events WHERE lead_id = $1")
            .bind(lead_id)
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)
    }

    pub async fn create_manual(&self, req: &CreateLeadRequest) -> Result<Lead, AppError> {
        let marketplaces = req.marketplaces.clone().unwrap_or_else(|| {
            req.primary_marketplace
                .clone()
                .map(|m| vec![m])
                .unwrap_or_default()
        });

        sqlx::query_as::<_, Lead>(
            r#"
            INSERT INTO leads (email, phone, first_name, last_name,
                               primary_marketplace, marketplaces, segment, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&req.email)
        .bind(&req.phone)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.primary_marketplace)
        .bind(&marketplaces)
        .bind(&req.segment)
        .bind(req.status.as_deref().unwrap_or("active"))
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn update_manual(
        &self,
        id: Uuid,
        req: &UpdateLeadRequest,
    ) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET email = COALESCE($2, email),
                phone = COALESCE($3, phone),
                first_name = COALESCE($4, first_name),
                last_name = COALESCE($5, last_name),
                primary_marketplace = COALESCE($6, primary_marketplace),
                marketplaces = COALESCE($7, marketplaces),
                segment = COALESCE($8, segment),
                status = COALESCE($9, status),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&req.email)
        .bind(&req.phone)
        .bind(&req.first_name)
        .bind(&req.last_name)
        .bind(&req.primary_marketplace)
        .bind(&req.marketplaces)
        .bind(&req.segment)
        .bind(&req.status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    pub async fn set_status(&self, id: Uuid, status: &str) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            "UPDATE leads SET status = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(status)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    pub async fn set_status_bulk(&self, ids: &[Uuid], status: &str) -> Result<u64, AppError> {
        let result = sqlx::query("UPDATE leads SET status = $2, updated_at = now() WHERE id = ANY($1)")
            .bind(ids)
            .bind(status)
            .execute(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;
        Ok(result.rows_affected())
    }

    /// Writes computed score fields onto the lead row.
    pub async fn apply_score(&self, id: Uuid, score: &ScoreResult) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            r#"
            UPDATE leads
            SET lead_score = $2,
                conversion_prob = $3,
                score_reason = $4,
                score_calculated_at = now(),
                updated_at = now()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(score.score)
        .bind(score.conversion_prob)
        .bind(&score.reason)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    pub async fn set_segment(&self, id: Uuid, segment: &str) -> Result<Lead, AppError> {
        sqlx::query_as::<_, Lead>(
            "UPDATE leads SET segment = $2, updated_at = now() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(segment)
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))
    }

    /// Appends one audit row. History is append-only by contract.
    pub async fn record_history(
        &self,
        lead_id: Uuid,
        event_type: &str,
        field_changed: Option<&str>,
        old_value: Option<serde_json::Value>,
        new_value: Option<serde_json::Value>,
        admin_user_id: Option<Uuid>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO lead_history (lead_id, event_type, field_changed,
                                      old_value, new_value, admin_user_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(lead_id)
        .bind(event_type)
        .bind(field_changed)
        .bind(old_value)
        .bind(new_value)
        .bind(admin_user_id)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;
        Ok(())
    }

    /// Appends one score snapshot row.
    pub async fn insert_score_record(
        &self,
        lead_id: Uuid,
        score: &ScoreResult,
    ) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO lead_scores (lead_id, score, reason, components) VALUES ($1, $2, $3, $4)",
        )
        .bind(lead_id)
        .bind(score.score)
        .bind(&score.reason)
        .bind(sqlx::types::Json(&score.components))
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;
        Ok(())
    }

    pub async fn last_sync_log(&self) -> Result<Option<SyncLog>, AppError> {
        sqlx::query_as::<_, SyncLog>(
            "SELECT * FROM sync_logs ORDER BY completed_at DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(AppError::DatabaseError)
    }

    pub async fn analytics_overview(&self) -> Result<AnalyticsOverview, AppError> {
        let total_leads: i64 = sqlx::query_scalar("SELECT count(*) FROM leads")
            .fetch_one(&self.pool)
            .await
            .map_err(AppError::DatabaseError)?;

        let avg_score: Option<f64> =
            sqlx::query_scalar("SELECT avg(lead_score)::float8 FROM leads")
                .fetch_one(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;

        let by_segment = sqlx::query_as::<_, SegmentCount>(
            "SELECT segment, count(*)::bigint as count FROM leads GROUP BY segment ORDER BY count DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        let by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, count(*)::bigint as count FROM leads GROUP BY status ORDER BY count DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        Ok(AnalyticsOverview {
            total_leads,
            avg_score: avg_score.unwrap_or(0.0),
            by_segment,
            by_status,
        })
    }

    async fn upsert_enrichment(
        &self,
        lead_id: Uuid,
        e: &EnrichmentPayload,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO lead_enrichments (
                lead_id, company_name, fantasy_name, cnpj, business_type,
                ml_order_count, ml_revenue, shopee_order_count, shopee_revenue,
                magalu_order_count, magalu_revenue, shein_order_count, shein_revenue,
                total_order_count, total_order_value, avg_order_value,
                ml_listing_count, shopee_listing_count, total_product_count,
                ml_integrations, shopee_integrations, magalu_integrations,
                subscription_value, subscription_cycle, last_active_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24, $25)
            ON CONFLICT (lead_id) DO UPDATE
            SET company_name = EXCLUDED.company_name,
                fantasy_name = EXCLUDED.fantasy_name,
                cnpj = EXCLUDED.cnpj,
                business_type = EXCLUDED.business_type,
                ml_order_count = EXCLUDED.ml_order_count,
                ml_revenue = EXCLUDED.ml_revenue,
                shopee_order_count = EXCLUDED.shopee_order_count,
                shopee_revenue = EXCLUDED.shopee_revenue,
                magalu_order_count = EXCLUDED.magalu_order_count,
                magalu_revenue = EXCLUDED.magalu_revenue,
                shein_order_count = EXCLUDED.shein_order_count,
                shein_revenue = EXCLUDED.shein_revenue,
                total_order_count = EXCLUDED.total_order_count,
                total_order_value = EXCLUDED.total_order_value,
                avg_order_value = EXCLUDED.avg_order_value,
                ml_listing_count = EXCLUDED.ml_listing_count,
                shopee_listing_count = EXCLUDED.shopee_listing_count,
                total_product_count = EXCLUDED.total_product_count,
                ml_integrations = EXCLUDED.ml_integrations,
                shopee_integrations = EXCLUDED.shopee_integrations,
                magalu_integrations = EXCLUDED.magalu_integrations,
                subscription_value = EXCLUDED.subscription_value,
                subscription_cycle = EXCLUDED.subscription_cycle,
                last_active_at = EXCLUDED.last_active_at,
                updated_at = now()
            "#,
        )
        .bind(lead_id)
        .bind(&e.company_name)
        .bind(&e.fantasy_name)
        .bind(&e.cnpj)
        .bind(&e.business_type)
        .bind(e.ml_order_count)
        .bind(&e.ml_revenue)
        .bind(e.shopee_order_count)
        .bind(&e.shopee_revenue)
        .bind(e.magalu_order_count)
        .bind(&e.magalu_revenue)
        .bind(e.shein_order_count)
        .bind(&e.shein_revenue)
        .bind(e.total_order_count)
        .bind(&e.total_order_value)
        .bind(&e.avg_order_value)
        .bind(e.ml_listing_count)
        .bind(e.shopee_listing_count)
        .bind(e.total_product_count)
        .bind(e.ml_integrations)
        .bind(e.shopee_integrations)
        .bind(e.magalu_integrations)
        .bind(&e.subscription_value)
        .bind(&e.subscription_cycle)
        .bind(e.last_active_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;
        Ok(())
    }
}

impl LeadStore for LeadRepository {
    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Uuid>, AppError> {
        let row: Option<(Uuid,)> =
            sqlx::query_as("SELECT id FROM leads WHERE guiaseller_user_id = $1 LIMIT 1")
                .bind(external_id)
                .fetch_optional(&self.pool)
                .await
                .map_err(AppError::DatabaseError)?;
        Ok(row.map(|r| r.0))
    }

    async fn create_synced_lead(
        &self,
        lead: &LeadPayload,
        enrichment: &EnrichmentPayload,
        score: &ScoreResult,
    ) -> Result<Uuid, AppError> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO leads (
                email, first_name, last_name, phone, guiaseller_user_id,
                user_level, subscription_plan, subscription_status, cnpj_cpf,
                purchase_count, total_revenue, listing_count,
                segment, primary_marketplace, marketplaces, status,
                lead_score, conversion_prob, score_reason, score_calculated_at,
                last_synced_at, sync_source
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                    $13, $14, $15, $16, $17, $18, $19, now(), now(), $20)
            RETURNING id
            "#,
        )
        .bind(&lead.email)
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.phone)
        .bind(&lead.guiaseller_user_id)
        .bind(&lead.user_level)
        .bind(&lead.subscription_plan)
        .bind(&lead.subscription_status)
        .bind(&lead.cnpj_cpf)
        .bind(lead.purchase_count)
        .bind(&lead.total_revenue)
        .bind(lead.listing_count)
        .bind(&lead.segment)
        .bind(&lead.primary_marketplace)
        .bind(&lead.marketplaces)
        .bind(&lead.status)
        .bind(score.score)
        .bind(score.conversion_prob)
        .bind(&score.reason)
        .bind(&lead.sync_source)
        .fetch_one(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        self.upsert_enrichment(id, enrichment).await?;
        self.insert_score_record(id, score).await?;

        Ok(id)
    }

    async fn update_synced_lead(
        &self,
        id: Uuid,
        lead: &LeadPayload,
        enrichment: &EnrichmentPayload,
        score: &ScoreResult,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE leads
            SET email = $2,
                first_name = $3,
                last_name = $4,
                phone = $5,
                user_level = $6,
                subscription_plan = $7,
                subscription_status = $8,
                cnpj_cpf = $9,
                purchase_count = $10,
                total_revenue = $11,
                listing_count = $12,
                segment = $13,
                primary_marketplace = $14,
                marketplaces = $15,
                status = $16,
                lead_score = $17,
                conversion_prob = $18,
                score_reason = $19,
                score_calculated_at = now(),
                last_synced_at = now(),
                sync_source = $20,
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&lead.email)
        .bind(&lead.first_name)
        .bind(&lead.last_name)
        .bind(&lead.phone)
        .bind(&lead.user_level)
        .bind(&lead.subscription_plan)
        .bind(&lead.subscription_status)
        .bind(&lead.cnpj_cpf)
        .bind(lead.purchase_count)
        .bind(&lead.total_revenue)
        .bind(lead.listing_count)
        .bind(&lead.segment)
        .bind(&lead.primary_marketplace)
        .bind(&lead.marketplaces)
        .bind(&lead.status)
        .bind(score.score)
        .bind(score.conversion_prob)
        .bind(&score.reason)
        .bind(&lead.sync_source)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;

        self.upsert_enrichment(id, enrichment).await?;
        self.insert_score_record(id, score).await?;

        Ok(())
    }

    async fn insert_sync_log(&self, entry: &SyncLogEntry) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO sync_logs (marketplace, sync_type, status, leads_processed,
                                   leads_created, leads_updated, error_message,
                                   started_at, completed_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(&entry.marketplace)
        .bind(&entry.sync_type)
        .bind(&entry.status)
        .bind(entry.leads_processed)
        .bind(entry.leads_created)
        .bind(entry.leads_updated)
        .bind(&entry.error_message)
        .bind(entry.started_at)
        .bind(entry.completed_at)
        .execute(&self.pool)
        .await
        .map_err(AppError::DatabaseError)?;
        Ok(())
    }
}
