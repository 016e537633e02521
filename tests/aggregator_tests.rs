/// Unit tests for the in-memory source batch join.
/// Covers marketplace presence ordering, primary marketplace selection, and
/// the per-marketplace integration shapes.
use leads_sync_api::aggregator::{IntegrationState, SourceIndex};
use leads_sync_api::models::Marketplace;
use leads_sync_api::source_reader::{
    ListingAggregate, MlIntegrationRow, OrderAggregate, SourceBatch, SourceCompany, StatusRow,
};

fn orders(user_id: &str, count: i64, amount: Option<f64>) -> OrderAggregate {
    OrderAggregate {
        user_id: user_id.to_string(),
        order_count: count,
        total_amount: amount,
    }
}

#[cfg(test)]
mod metrics_tests {
    use super::*;

    #[test]
    fn test_totals_sum_across_marketplaces() {
        let batch = SourceBatch {
            ml_orders: vec![orders("u1", 10, Some(100.0))],
            shopee_orders: vec![orders("u1", 5, Some(50.0))],
            // Magalu aggregates always carry a zero amount; the source table
            // has no revenue column
            magalu_orders: vec![orders("u1", 3, Some(0.0))],
            shein_orders: vec![orders("u1", 2, Some(0.0))],
            ..SourceBatch::default()
        };
        let index = SourceIndex::build(&batch);

        let metrics = index.metrics_for("u1");
        assert_eq!(metrics.total_orders, 20);
        assert_eq!(metrics.total_revenue, 150.0);
        assert_eq!(metrics.magalu.orders, 3);
        assert_eq!(metrics.magalu.revenue, 0.0);
    }

    #[test]
    fn test_unknown_user_gets_empty_metrics() {
        let batch = SourceBatch::default();
        let index = SourceIndex::build(&batch);
        let metrics = index.metrics_for("missing");

        assert!(metrics.marketplaces.is_empty());
        assert_eq!(metrics.total_orders, 0);
        assert_eq!(metrics.primary_marketplace, None);
        assert!(!metrics.has_company);
    }

    #[test]
    fn test_listing_counts_come_from_both_tables() {
        let batch = SourceBatch {
            ml_listings: vec![ListingAggregate {
                user_id: "u1".to_string(),
                listing_count: 7,
            }],
            shopee_listings: vec![ListingAggregate {
                user_id: "u1".to_string(),
                listing_count: 3,
            }],
            ..SourceBatch::default()
        };
        let metrics = SourceIndex::build(&batch).metrics_for("u1");

        assert_eq!(metrics.ml_listing_count, 7);
        assert_eq!(metrics.shopee_listing_count, 3);
        assert_eq!(metrics.total_listings(), 10);
    }

    #[test]
    fn test_company_presence() {
        let batch = SourceBatch {
            companies: vec![SourceCompany {
                user_id: "u1".to_string(),
                company_name: "Acme Ltda".to_string(),
                fantasy_name: None,
                cnpj: "12345678000100".to_string(),
            }],
            ..SourceBatch::default()
        };
        let index = SourceIndex::build(&batch);

        assert!(index.metrics_for("u1").has_company);
        assert!(!index.metrics_for("u2").has_company);
    }
}

#[cfg(test)]
mod primary_marketplace_tests {
    use super::*;

    #[test]
    fn test_highest_order_count_wins() {
        let batch = SourceBatch {
            ml_orders: vec![orders("u1", 3, Some(30.0))],
            shopee_orders: vec![orders("u1", 8, Some(80.0))],
            ..SourceBatch::default()
        };
        let metrics = SourceIndex::build(&batch).metrics_for("u1");
        assert_eq!(metrics.primary_marketplace, Some(Marketplace::Shopee));
    }

    #[test]
    fn test_tie_goes_to_preference_order() {
        let batch = SourceBatch {
            ml_orders: vec![orders("u1", 5, Some(10.0))],
            shopee_orders: vec![orders("u1", 5, Some(500.0))],
            ..SourceBatch::default()
        };
        let metrics = SourceIndex::build(&batch).metrics_for("u1");
        // Order count decides, not revenue; ML precedes Shopee on ties
        assert_eq!(metrics.primary_marketplace, Some(Marketplace::Ml));
    }

    #[test]
    fn test_zero_orders_falls_back_to_first_presence() {
        let batch = SourceBatch {
            shopee_integrations: vec![StatusRow {
                user_id: "u1".to_string(),
                status: Some("ativo".to_string()),
            }],
            ..SourceBatch::default()
        };
        let metrics = SourceIndex::build(&batch).metrics_for("u1");

        assert_eq!(metrics.marketplaces, vec![Marketplace::Shopee]);
        assert_eq!(metrics.primary_marketplace, Some(Marketplace::Shopee));
    }
}

#[cfg(test)]
mod integration_state_tests {
    use super::*;

    #[test]
    fn test_ml_counts_only_active_accounts() {
        let batch = SourceBatch {
            ml_integrations: vec![
                MlIntegrationRow {
                    user_id: "u1".to_string(),
                    is_active: true,
                },
                MlIntegrationRow {
                    user_id: "u1".to_string(),
                    is_active: true,
                },
                MlIntegrationRow {
                    user_id: "u1".to_string(),
                    is_active: false,
                },
            ],
            ..SourceBatch::default()
        };
        let index = SourceIndex::build(&batch);

        assert_eq!(
            index.integration_state("u1", Marketplace::Ml),
            IntegrationState::MultiAccount { active: 2 }
        );
        let metrics = index.metrics_for("u1");
        assert_eq!(metrics.active_ml_integrations, 2);
        assert_eq!(metrics.marketplaces, vec![Marketplace::Ml]);
    }

    #[test]
    fn test_shopee_and_magalu_status_spellings_differ() {
        let batch = SourceBatch {
            shopee_integrations: vec![StatusRow {
                user_id: "u1".to_string(),
                // Magalu's English spelling does not activate Shopee
                status: Some("active".to_string()),
            }],
            magalu_integrations: vec![StatusRow {
                user_id: "u1".to_string(),
                status: Some("active".to_string()),
            }],
            ..SourceBatch::default()
        };
        let index = SourceIndex::build(&batch);

        assert!(!index.integration_state("u1", Marketplace::Shopee).is_present());
        assert!(index.integration_state("u1", Marketplace::Magalu).is_present());
    }

    #[test]
    fn test_shein_presence_is_order_driven() {
        let batch = SourceBatch {
            shein_orders: vec![orders("u1", 4, Some(120.0))],
            ..SourceBatch::default()
        };
        let index = SourceIndex::build(&batch);

        assert_eq!(
            index.integration_state("u1", Marketplace::Shein),
            IntegrationState::OrderDriven { orders: 4 }
        );
        assert_eq!(index.metrics_for("u1").marketplaces, vec![Marketplace::Shein]);
    }

    #[test]
    fn test_presence_list_follows_preference_order() {
        let batch = SourceBatch {
            shein_orders: vec![orders("u1", 1, Some(10.0))],
            magalu_integrations: vec![StatusRow {
                user_id: "u1".to_string(),
                status: Some("active".to_string()),
            }],
            ml_integrations: vec![MlIntegrationRow {
                user_id: "u1".to_string(),
                is_active: true,
            }],
            ..SourceBatch::default()
        };
        let metrics = SourceIndex::build(&batch).metrics_for("u1");

        assert_eq!(
            metrics.marketplaces,
            vec![Marketplace::Ml, Marketplace::Magalu, Marketplace::Shein]
        );
    }
}
