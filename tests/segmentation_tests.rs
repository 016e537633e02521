/// Unit tests for both segmentation rule tables.
/// The sync-time and post-sync classifiers are distinct taxonomies; each is an
/// ordered decision list where earlier rules shadow later ones.
use bigdecimal::BigDecimal;
use chrono::{Duration, Utc};
use uuid::Uuid;

use leads_sync_api::aggregator::DerivedMetrics;
use leads_sync_api::models::{Lead, LeadEnrichment, Marketplace};
use leads_sync_api::segmentation::{
    classify_lead, classify_source_user, LeadSegment, SourceSegment,
};
use leads_sync_api::source_reader::{SourceSubscription, SourceUser};

fn source_user(level: Option<&str>) -> SourceUser {
    SourceUser {
        user_id: "user-1".to_string(),
        first_name: "Maria".to_string(),
        last_name: Some("Silva".to_string()),
        email: "maria@example.com".to_string(),
        phone: None,
        user_level: level.map(str::to_string),
        created_at: Utc::now() - Duration::days(200),
        updated_at: Utc::now(),
        cnpj_cpf: None,
        plan_name: None,
        mobile_phone: None,
    }
}

fn subscription(status: &str, description: Option<&str>) -> SourceSubscription {
    SourceSubscription {
        user_id: "user-1".to_string(),
        status: status.to_string(),
        value: 49.9,
        description: description.map(str::to_string),
        cycle: Some("monthly".to_string()),
    }
}

fn lead() -> Lead {
    let now = Utc::now();
    Lead {
        id: Uuid::new_v4(),
        email: "maria@example.com".to_string(),
        phone: None,
        first_name: "Maria".to_string(),
        last_name: "Silva".to_string(),
        guiaseller_user_id: Some("user-1".to_string()),
        user_level: None,
        subscription_plan: None,
        subscription_status: None,
        cnpj_cpf: None,
        purchase_count: 0,
        total_revenue: BigDecimal::from(0),
        listing_count: 0,
        lead_score: 0,
        conversion_prob: 0.0,
        score_reason: None,
        score_calculated_at: None,
        segment: None,
        primary_marketplace: None,
        marketplaces: vec![],
        status: "active".to_string(),
        last_synced_at: None,
        sync_source: None,
        created_at: now,
        updated_at: now,
    }
}

fn enrichment(lead_id: Uuid) -> LeadEnrichment {
    let now = Utc::now();
    LeadEnrichment {
        id: Uuid::new_v4(),
        lead_id,
        company_name: None,
        fantasy_name: None,
        cnpj: None,
        business_type: Some("individual".to_string()),
        ml_order_count: 0,
        ml_revenue: BigDecimal::from(0),
        shopee_order_count: 0,
        shopee_revenue: BigDecimal::from(0),
        magalu_order_count: 0,
        magalu_revenue: BigDecimal::from(0),
        shein_order_count: 0,
        shein_revenue: BigDecimal::from(0),
        total_order_count: 0,
        total_order_value: BigDecimal::from(0),
        avg_order_value: BigDecimal::from(0),
        ml_listing_count: 0,
        shopee_listing_count: 0,
        total_product_count: 0,
        ml_integrations: 0,
        shopee_integrations: 0,
        magalu_integrations: 0,
        subscription_value: BigDecimal::from(0),
        subscription_cycle: None,
        last_order_at: None,
        last_active_at: Some(now),
        updated_at: now,
    }
}

#[cfg(test)]
mod source_user_tests {
    use super::*;

    #[test]
    fn test_lifetime_level_is_founder() {
        let user = source_user(Some("VITALICIO"));
        let segment = classify_source_user(&user, None, &DerivedMetrics::default());
        assert_eq!(segment, SourceSegment::Founder);

        // Case-insensitive on the level column
        let user = source_user(Some("vitalicio"));
        let segment = classify_source_user(&user, None, &DerivedMetrics::default());
        assert_eq!(segment, SourceSegment::Founder);
    }

    #[test]
    fn test_lifetime_level_shadows_cancelled_subscription() {
        let user = source_user(Some("VITALICIO"));
        let sub = subscription("CANCELED", None);
        let segment = classify_source_user(&user, Some(&sub), &DerivedMetrics::default());
        assert_eq!(segment, SourceSegment::Founder);
    }

    #[test]
    fn test_active_sub_with_established_business_is_founder() {
        let user = source_user(None);
        let sub = subscription("ACTIVE", Some("Plano Basico"));
        let metrics = DerivedMetrics {
            marketplaces: vec![Marketplace::Ml, Marketplace::Shopee],
            ml_listing_count: 3,
            shopee_listing_count: 2,
            has_company: true,
            ..DerivedMetrics::default()
        };
        let segment = classify_source_user(&user, Some(&sub), &metrics);
        assert_eq!(segment, SourceSegment::Founder);
    }

    #[test]
    fn test_active_premium_or_pro_plan_is_seller() {
        let user = source_user(None);
        for plan in ["Premium Anual", "Plano Pro Mensal"] {
            let sub = subscription("ACTIVE", Some(plan));
            let segment = classify_source_user(&user, Some(&sub), &DerivedMetrics::default());
            assert_eq!(segment, SourceSegment::Seller, "plan {}", plan);
        }
    }

    #[test]
    fn test_active_plain_plan_is_paying() {
        let user = source_user(None);
        let sub = subscription("ACTIVE", Some("Plano Basico"));
        let segment = classify_source_user(&user, Some(&sub), &DerivedMetrics::default());
        assert_eq!(segment, SourceSegment::Paying);
    }

    #[test]
    fn test_non_active_subscription_is_churned_even_with_activity() {
        let user = source_user(None);
        let sub = subscription("EXPIRED", Some("Premium"));
        let metrics = DerivedMetrics {
            total_orders: 40,
            marketplaces: vec![Marketplace::Ml],
            ..DerivedMetrics::default()
        };
        let segment = classify_source_user(&user, Some(&sub), &metrics);
        assert_eq!(segment, SourceSegment::Churned);
    }

    #[test]
    fn test_free_user_with_commerce_activity_is_free_active() {
        let user = source_user(None);

        let with_orders = DerivedMetrics {
            total_orders: 2,
            ..DerivedMetrics::default()
        };
        assert_eq!(
            classify_source_user(&user, None, &with_orders),
            SourceSegment::FreeActive
        );

        // A connected marketplace counts even with zero orders
        let with_presence = DerivedMetrics {
            marketplaces: vec![Marketplace::Shopee],
            ..DerivedMetrics::default()
        };
        assert_eq!(
            classify_source_user(&user, None, &with_presence),
            SourceSegment::FreeActive
        );
    }

    #[test]
    fn test_free_user_without_activity_is_free_inactive() {
        let user = source_user(None);
        let segment = classify_source_user(&user, None, &DerivedMetrics::default());
        assert_eq!(segment, SourceSegment::FreeInactive);
    }
}

#[cfg(test)]
mod lead_tests {
    use super::*;

    #[test]
    fn test_lifetime_level_is_founder() {
        let mut lead = lead();
        lead.user_level = Some("VITALICIO".to_string());
        assert_eq!(classify_lead(&lead, None, Utc::now()), LeadSegment::Founder);
    }

    #[test]
    fn test_business_with_multi_marketplace_presence_is_founder() {
        let mut lead = lead();
        lead.marketplaces = vec!["ML".to_string(), "Shopee".to_string()];
        let mut e = enrichment(lead.id);
        e.business_type = Some("business".to_string());
        e.total_product_count = 5;
        assert_eq!(
            classify_lead(&lead, Some(&e), Utc::now()),
            LeadSegment::Founder
        );

        // One marketplace short of the threshold falls through
        lead.marketplaces = vec!["ML".to_string()];
        assert_ne!(
            classify_lead(&lead, Some(&e), Utc::now()),
            LeadSegment::Founder
        );
    }

    #[test]
    fn test_paying_subscription_or_elevated_tier_is_seller() {
        let lead_row = lead();
        let mut e = enrichment(lead_row.id);
        e.subscription_value = BigDecimal::from(49);
        assert_eq!(
            classify_lead(&lead_row, Some(&e), Utc::now()),
            LeadSegment::Seller
        );

        let mut tiered = lead();
        tiered.user_level = Some("PREMIUM".to_string());
        assert_eq!(classify_lead(&tiered, None, Utc::now()), LeadSegment::Seller);
    }

    #[test]
    fn test_stale_activity_is_inactive() {
        let lead_row = lead();
        let mut e = enrichment(lead_row.id);
        e.last_active_at = Some(Utc::now() - Duration::days(120));
        assert_eq!(
            classify_lead(&lead_row, Some(&e), Utc::now()),
            LeadSegment::Inactive
        );
    }

    #[test]
    fn test_no_enrichment_falls_back_to_creation_date() {
        let mut lead_row = lead();
        lead_row.created_at = Utc::now() - Duration::days(120);
        assert_eq!(classify_lead(&lead_row, None, Utc::now()), LeadSegment::Inactive);

        // Recently created leads without enrichment are buyers, not inactive
        let fresh = lead();
        assert_eq!(classify_lead(&fresh, None, Utc::now()), LeadSegment::Buyer);
    }

    #[test]
    fn test_seller_rule_precedes_heavy_user() {
        // Any purchase activity classifies as seller, even at heavy-user
        // thresholds; the seller rule sits earlier in the decision list.
        let mut lead_row = lead();
        lead_row.listing_count = 60;
        lead_row.purchase_count = 12;
        assert_eq!(
            classify_lead(&lead_row, None, Utc::now()),
            LeadSegment::Seller
        );
    }

    #[test]
    fn test_any_listing_or_purchase_is_seller() {
        let mut with_purchases = lead();
        with_purchases.purchase_count = 1;
        assert_eq!(
            classify_lead(&with_purchases, None, Utc::now()),
            LeadSegment::Seller
        );

        let lead_row = lead();
        let mut e = enrichment(lead_row.id);
        e.total_product_count = 1;
        assert_eq!(
            classify_lead(&lead_row, Some(&e), Utc::now()),
            LeadSegment::Seller
        );
    }

    #[test]
    fn test_default_is_buyer() {
        let lead_row = lead();
        let e = enrichment(lead_row.id);
        assert_eq!(classify_lead(&lead_row, Some(&e), Utc::now()), LeadSegment::Buyer);
    }
}
