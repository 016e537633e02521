//! Pure in-memory join of the source batch into per-user derived metrics.
//!
//! Absent lookups default to zero/empty; nothing in this module can fail.

use std::collections::HashMap;

use crate::models::Marketplace;
use crate::source_reader::{
    MlIntegrationRow, OrderAggregate, SourceBatch, SourceCompany, SourceSubscription, StatusRow,
};

/// Shopee integration rows mark an active account with this status value.
const SHOPEE_ACTIVE_STATUS: &str = "ativo";
/// Magalu integration rows use the English spelling.
const MAGALU_ACTIVE_STATUS: &str = "active";

/// Per-marketplace integration shape. ML supports multiple accounts per user;
/// Shopee/Magalu are single status flags; Shein has no integration table and
/// counts as present when the user has Shein orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntegrationState {
    MultiAccount { active: usize },
    StatusFlag { active: bool },
    OrderDriven { orders: i64 },
}

impl IntegrationState {
    pub fn is_present(&self) -> bool {
        match self {
            IntegrationState::MultiAccount { active } => *active > 0,
            IntegrationState::StatusFlag { active } => *active,
            IntegrationState::OrderDriven { orders } => *orders > 0,
        }
    }
}

/// Order count and summed revenue for one marketplace.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct MarketplaceStats {
    pub orders: i64,
    pub revenue: f64,
}

/// Everything the classifier, score engine, and sync payload builders need
/// about one user, reduced from the raw row sets.
#[derive(Debug, Clone, Default)]
pub struct DerivedMetrics {
    /// Presence list in the fixed ML, Shopee, Magalu, Shein order.
    pub marketplaces: Vec<Marketplace>,
    pub total_orders: i64,
    pub total_revenue: f64,
    pub primary_marketplace: Option<Marketplace>,
    pub ml: MarketplaceStats,
    pub shopee: MarketplaceStats,
    /// Magalu revenue is structurally 0: the source aggregation has no amount
    /// column. Known data gap, preserved as-is.
    pub magalu: MarketplaceStats,
    pub shein: MarketplaceStats,
    pub ml_listing_count: i64,
    pub shopee_listing_count: i64,
    pub active_ml_integrations: usize,
    pub shopee_integration_active: bool,
    pub magalu_integration_active: bool,
    pub has_company: bool,
}

impl DerivedMetrics {
    pub fn marketplace_count(&self) -> usize {
        self.marketplaces.len()
    }

    pub fn total_listings(&self) -> i64 {
        self.ml_listing_count + self.shopee_listing_count
    }

    pub fn stats(&self, marketplace: Marketplace) -> MarketplaceStats {
        match marketplace {
            Marketplace::Ml => self.ml,
            Marketplace::Shopee => self.shopee,
            Marketplace::Magalu => self.magalu,
            Marketplace::Shein => self.shein,
        }
    }
}

/// Lookup structures over a fetched [`SourceBatch`], keyed by external user id.
pub struct SourceIndex<'a> {
    companies: HashMap<&'a str, &'a SourceCompany>,
    ml_integrations: HashMap<&'a str, Vec<&'a MlIntegrationRow>>,
    shopee_integrations: HashMap<&'a str, &'a StatusRow>,
    magalu_integrations: HashMap<&'a str, &'a StatusRow>,
    subscriptions: HashMap<&'a str, &'a SourceSubscription>,
    ml_orders: HashMap<&'a str, &'a OrderAggregate>,
    shopee_orders: HashMap<&'a str, &'a OrderAggregate>,
    magalu_orders: HashMap<&'a str, &'a OrderAggregate>,
    shein_orders: HashMap<&'a str, &'a OrderAggregate>,
    ml_listings: HashMap<&'a str, i64>,
    shopee_listings: HashMap<&'a str, i64>,
}

fn order_map(rows: &[OrderAggregate]) -> HashMap<&str, &OrderAggregate> {
    rows.iter().map(|o| (o.user_id.as_str(), o)).collect()
}

impl<'a> SourceIndex<'a> {
    pub fn build(batch: &'a SourceBatch) -> Self {
        let mut ml_integrations: HashMap<&str, Vec<&MlIntegrationRow>> = HashMap::new();
        for row in &batch.ml_integrations {
            ml_integrations.entry(row.user_id.as_str()).or_default().push(row);
        }

        Self {
            companies: batch
                .companies
                .iter()
                .map(|c| (c.user_id.as_str(), c))
                .collect(),
            ml_integrations,
            shopee_integrations: batch
                .shopee_integrations
                .iter()
                .map(|r| (r.user_id.as_str(), r))
                .collect(),
            magalu_integrations: batch
                .magalu_integrations
                .iter()
                .map(|r| (r.user_id.as_str(), r))
                .collect(),
            subscriptions: batch
                .subscriptions
                .iter()
                .map(|s| (s.user_id.as_str(), s))
                .collect(),
            ml_orders: order_map(&batch.ml_orders),
            shopee_orders: order_map(&batch.shopee_orders),
            magalu_orders: order_map(&batch.magalu_orders),
            shein_orders: order_map(&batch.shein_orders),
            ml_listings: batch
                .ml_listings
                .iter()
                .map(|l| (l.user_id.as_str(), l.listing_count))
                .collect(),
            shopee_listings: batch
                .shopee_listings
                .iter()
                .map(|l| (l.user_id.as_str(), l.listing_count))
                .collect(),
        }
    }

    pub fn company(&self, user_id: &str) -> Option<&'a SourceCompany> {
        self.companies.get(user_id).copied()
    }

    pub fn subscription(&self, user_id: &str) -> Option<&'a SourceSubscription> {
        self.subscriptions.get(user_id).copied()
    }

    fn order_stats(&self, user_id: &str, marketplace: Marketplace) -> MarketplaceStats {
        let map = match marketplace {
            Marketplace::Ml => &self.ml_orders,
            Marketplace::Shopee => &self.shopee_orders,
            Marketplace::Magalu => &self.magalu_orders,
            Marketplace::Shein => &self.shein_orders,
        };
        map.get(user_id)
            .map(|o| MarketplaceStats {
                orders: o.order_count,
                revenue: o.total_amount.unwrap_or(0.0),
            })
            .unwrap_or_default()
    }

    /// Uniform view over the heterogeneous per-marketplace integration tables.
    pub fn integration_state(&self, user_id: &str, marketplace: Marketplace) -> IntegrationState {
        match marketplace {
            Marketplace::Ml => IntegrationState::MultiAccount {
                active: self
                    .ml_integrations
                    .get(user_id)
                    .map(|rows| rows.iter().filter(|r| r.is_active).count())
                    .unwrap_or(0),
            },
            Marketplace::Shopee => IntegrationState::StatusFlag {
                active: self
                    .shopee_integrations
                    .get(user_id)
                    .and_then(|r| r.status.as_deref())
                    == Some(SHOPEE_ACTIVE_STATUS),
            },
            Marketplace::Magalu => IntegrationState::StatusFlag {
                active: self
                    .magalu_integrations
                    .get(user_id)
                    .and_then(|r| r.status.as_deref())
                    == Some(MAGALU_ACTIVE_STATUS),
            },
            Marketplace::Shein => IntegrationState::OrderDriven {
                orders: self.order_stats(user_id, Marketplace::Shein).orders,
            },
        }
    }

    /// Reduces the raw row sets into per-user derived metrics.
    pub fn metrics_for(&self, user_id: &str) -> DerivedMetrics {
        let ml = self.order_stats(user_id, Marketplace::Ml);
        let shopee = self.order_stats(user_id, Marketplace::Shopee);
        let magalu = self.order_stats(user_id, Marketplace::Magalu);
        let shein = self.order_stats(user_id, Marketplace::Shein);

        // Presence list: conditional pushes in the fixed preference order.
        let mut marketplaces = Vec::new();
        for marketplace in Marketplace::PREFERENCE {
            if self.integration_state(user_id, marketplace).is_present() {
                marketplaces.push(marketplace);
            }
        }

        let total_orders = ml.orders + shopee.orders + magalu.orders + shein.orders;
        let total_revenue = ml.revenue + shopee.revenue + magalu.revenue + shein.revenue;

        // Highest order count wins; strict comparison keeps the first entry of
        // the preference order on ties. All-zero counts fall back to the first
        // presence entry.
        let mut best: Option<(Marketplace, i64)> = None;
        for marketplace in Marketplace::PREFERENCE {
            let count = match marketplace {
                Marketplace::Ml => ml.orders,
                Marketplace::Shopee => shopee.orders,
                Marketplace::Magalu => magalu.orders,
                Marketplace::Shein => shein.orders,
            };
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((marketplace, count));
            }
        }
        let primary_marketplace = match best {
            Some((marketplace, count)) if count > 0 => Some(marketplace),
            _ => marketplaces.first().copied(),
        };

        let active_ml_integrations = match self.integration_state(user_id, Marketplace::Ml) {
            IntegrationState::MultiAccount { active } => active,
            _ => 0,
        };

        DerivedMetrics {
            marketplaces,
            total_orders,
            total_revenue,
            primary_marketplace,
            ml,
            shopee,
            magalu,
            shein,
            ml_listing_count: self.ml_listings.get(user_id).copied().unwrap_or(0),
            shopee_listing_count: self.shopee_listings.get(user_id).copied().unwrap_or(0),
            active_ml_integrations,
            shopee_integration_active: self
                .integration_state(user_id, Marketplace::Shopee)
                .is_present(),
            magalu_integration_active: self
                .integration_state(user_id, Marketplace::Magalu)
                .is_present(),
            has_company: self.companies.contains_key(user_id),
        }
    }
}
