use std::env;

use bigdecimal::BigDecimal;
use chrono::Utc;

use leads_sync_api::db::LeadsDb;
use leads_sync_api::models::{
    CreateLeadRequest, EnrichmentPayload, LeadPayload, ScoreComponents, ScoreResult,
};
use leads_sync_api::repository::LeadRepository;
use leads_sync_api::sync::LeadStore;

fn unique_external_id() -> String {
    format!("it-{}", uuid::Uuid::new_v4())
}

fn lead_payload(external_id: &str) -> LeadPayload {
    LeadPayload {
        email: format!("{}@example.com", external_id),
        first_name: "Integration".to_string(),
        last_name: "Test".to_string(),
        phone: None,
        guiaseller_user_id: external_id.to_string(),
        user_level: None,
        subscription_plan: None,
        subscription_status: None,
        cnpj_cpf: None,
        purchase_count: 3,
        total_revenue: BigDecimal::from(300),
        listing_count: 5,
        segment: "free-active".to_string(),
        primary_marketplace: Some("ML".to_string()),
        marketplaces: vec!["ML".to_string()],
        status: "active".to_string(),
        sync_source: "guiaseller-db".to_string(),
    }
}

fn enrichment_payload() -> EnrichmentPayload {
    EnrichmentPayload {
        company_name: None,
        fantasy_name: None,
        cnpj: None,
        business_type: "individual".to_string(),
        ml_order_count: 3,
        ml_revenue: BigDecimal::from(300),
        shopee_order_count: 0,
        shopee_revenue: BigDecimal::from(0),
        magalu_order_count: 0,
        magalu_revenue: BigDecimal::from(0),
        shein_order_count: 0,
        shein_revenue: BigDecimal::from(0),
        total_order_count: 3,
        total_order_value: BigDecimal::from(300),
        avg_order_value: BigDecimal::from(100),
        ml_listing_count: 5,
        shopee_listing_count: 0,
        total_product_count: 5,
        ml_integrations: 1,
        shopee_integrations: 0,
        magalu_integrations: 0,
        subscription_value: BigDecimal::from(0),
        subscription_cycle: None,
        last_active_at: Some(Utc::now()),
    }
}

fn score() -> ScoreResult {
    ScoreResult {
        score: 42,
        conversion_prob: 0.25,
        reason: "Score 42/100 — strongest factor: purchase history (55/100)".to_string(),
        components: ScoreComponents {
            purchase_history: 55,
            browsing_activity: 40,
            interest_match: 35,
            engagement: 30,
        },
    }
}

/// Smoke test for the synced-lead upsert path against a real database.
/// Marked ignored to avoid running against production by accident; set
/// TEST_DATABASE_URL to run.
#[tokio::test]
#[ignore]
async fn synced_lead_upsert_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = LeadsDb::connect(&db_url).await?;
    sqlx::migrate!("./migrations").run(&db.pool).await?;
    let repo = LeadRepository::new(db.pool.clone());

    let external_id = unique_external_id();
    let payload = lead_payload(&external_id);

    assert_eq!(repo.find_by_external_id(&external_id).await?, None);

    let id = repo
        .create_synced_lead(&payload, &enrichment_payload(), &score())
        .await?;
    assert_eq!(repo.find_by_external_id(&external_id).await?, Some(id));

    // Second pass goes through the update path and must not duplicate
    repo.update_synced_lead(id, &payload, &enrichment_payload(), &score())
        .await?;
    assert_eq!(repo.find_by_external_id(&external_id).await?, Some(id));

    let lead = repo.get_lead(id).await?;
    assert_eq!(lead.guiaseller_user_id.as_deref(), Some(external_id.as_str()));
    assert_eq!(lead.lead_score, 42);
    assert_eq!(lead.segment.as_deref(), Some("free-active"));

    let enrichment = repo.get_enrichment(id).await?.expect("enrichment row");
    assert_eq!(enrichment.total_order_count, 3);

    // Two score snapshots, one per upsert
    let scores = repo.recent_scores(id, 10).await?;
    assert_eq!(scores.len(), 2);

    Ok(())
}

/// Smoke test for the manual CRUD path.
#[tokio::test]
#[ignore]
async fn manual_lead_crud_smoke_test() -> anyhow::Result<()> {
    let db_url = env::var("TEST_DATABASE_URL")
        .or_else(|_| env::var("DATABASE_URL"))
        .map_err(|_| anyhow::anyhow!("Set TEST_DATABASE_URL or DATABASE_URL to run this test"))?;

    let db = LeadsDb::connect(&db_url).await?;
    sqlx::migrate!("./migrations").run(&db.pool).await?;
    let repo = LeadRepository::new(db.pool.clone());

    let req = CreateLeadRequest {
        email: format!("manual-{}@example.com", uuid::Uuid::new_v4()),
        phone: None,
        first_name: "Manual".to_string(),
        last_name: "Lead".to_string(),
        primary_marketplace: Some("Shopee".to_string()),
        marketplaces: None,
        segment: None,
        status: None,
    };

    let lead = repo.create_manual(&req).await?;
    assert_eq!(lead.status, "active");
    // Marketplaces default to the primary when not given
    assert_eq!(lead.marketplaces, vec!["Shopee".to_string()]);

    let archived = repo.set_status(lead.id, "archived").await?;
    assert_eq!(archived.status, "archived");

    repo.record_history(lead.id, "archived", Some("status"), None, None, None)
        .await?;
    let history = repo.recent_history(lead.id, 10).await?;
    assert!(!history.is_empty());

    Ok(())
}
