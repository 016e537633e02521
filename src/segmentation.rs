//! The two segmentation rule tables.
//!
//! [`classify_source_user`] runs at sync time against raw source rows and
//! derived metrics; [`classify_lead`] runs on demand against an
//! already-persisted lead and its enrichment. They are distinct taxonomies
//! evaluated as ordered decision lists (first match wins) and must not be
//! merged.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Duration, Utc};

use crate::aggregator::DerivedMetrics;
use crate::models::{Lead, LeadEnrichment};
use crate::source_reader::{SourceSubscription, SourceUser};

/// Lifetime tier on the source user row.
pub const LIFETIME_LEVEL: &str = "VITALICIO";
/// Subscription rows use this status for an active paid plan.
pub const SUBSCRIPTION_ACTIVE: &str = "ACTIVE";
/// Days without activity before a lead is reclassified as inactive.
const INACTIVITY_DAYS: i64 = 90;

/// Sync-time taxonomy, applied to every source user during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceSegment {
    Founder,
    Seller,
    Paying,
    Churned,
    FreeActive,
    FreeInactive,
}

impl SourceSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceSegment::Founder => "founder",
            SourceSegment::Seller => "seller",
            SourceSegment::Paying => "paying",
            SourceSegment::Churned => "churned",
            SourceSegment::FreeActive => "free-active",
            SourceSegment::FreeInactive => "free-inactive",
        }
    }
}

/// Post-sync taxonomy, applied by the on-demand recompute action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeadSegment {
    Founder,
    Seller,
    Buyer,
    HeavyUser,
    Inactive,
}

impl LeadSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadSegment::Founder => "founder",
            LeadSegment::Seller => "seller",
            LeadSegment::Buyer => "buyer",
            LeadSegment::HeavyUser => "heavy-user",
            LeadSegment::Inactive => "inactive",
        }
    }
}

fn level_upper(level: Option<&str>) -> String {
    level.unwrap_or("").to_uppercase()
}

/// Sync-time classifier. Ordered decision list; the order is the contract.
pub fn classify_source_user(
    user: &SourceUser,
    sub: Option<&SourceSubscription>,
    metrics: &DerivedMetrics,
) -> SourceSegment {
    let level = level_upper(user.user_level.as_deref());

    // 1. Lifetime tier
    if level == LIFETIME_LEVEL {
        return SourceSegment::Founder;
    }

    // 2. Active paid subscription
    if let Some(sub) = sub {
        if sub.status == SUBSCRIPTION_ACTIVE {
            if metrics.has_company
                && metrics.marketplace_count() >= 2
                && metrics.total_listings() >= 5
            {
                return SourceSegment::Founder;
            }
            let plan = sub.description.as_deref().unwrap_or("").to_lowercase();
            if plan.contains("premium") || plan.contains("pro") {
                return SourceSegment::Seller;
            }
            return SourceSegment::Paying;
        }
        // 3. Had a subscription but it is cancelled/expired
        return SourceSegment::Churned;
    }

    // 4. Free user with commerce activity
    if metrics.total_orders > 0 || metrics.marketplace_count() > 0 {
        return SourceSegment::FreeActive;
    }

    // 5. Free user without activity
    SourceSegment::FreeInactive
}

/// Post-sync classifier, driven by enrichment fields rather than raw
/// subscription rows. Ordered decision list; first match wins.
pub fn classify_lead(
    lead: &Lead,
    enrichment: Option<&LeadEnrichment>,
    now: DateTime<Utc>,
) -> LeadSegment {
    let level = level_upper(lead.user_level.as_deref());

    // Founder: lifetime tier, or business with multi-marketplace presence
    if level == LIFETIME_LEVEL {
        return LeadSegment::Founder;
    }
    if let Some(e) = enrichment {
        if e.business_type.as_deref() == Some("business")
            && lead.marketplaces.len() >= 2
            && e.total_product_count >= 5
        {
            return LeadSegment::Founder;
        }
    }

    // Paying user with any subscription value, or an elevated tier
    let sub_value_positive = enrichment
        .map(|e| e.subscription_value > BigDecimal::from(0))
        .unwrap_or(false);
    if sub_value_positive || level == "PREMIUM" || level == "PRO" {
        return LeadSegment::Seller;
    }

    // Inactive: 90+ days since last activity; leads without enrichment fall
    // back to their creation date
    match enrichment {
        Some(e) => {
            if let Some(last_active) = e.last_active_at {
                if now - last_active >= Duration::days(INACTIVITY_DAYS) {
                    return LeadSegment::Inactive;
                }
            }
        }
        None => {
            if now - lead.created_at >= Duration::days(INACTIVITY_DAYS) {
                return LeadSegment::Inactive;
            }
        }
    }

    // Active seller: any product listing or any purchase. Evaluated before
    // the heavy-user rule; the ordering is the contract.
    let product_count = enrichment.map(|e| e.total_product_count).unwrap_or(0);
    if product_count >= 1 || lead.purchase_count > 0 {
        return LeadSegment::Seller;
    }

    // Heavy user: high listing count plus frequent purchases
    if lead.listing_count >= 50 && lead.purchase_count >= 10 {
        return LeadSegment::HeavyUser;
    }

    LeadSegment::Buyer
}
