//! Rule-based lead scoring.
//!
//! Score: 0-100 from 4 weighted factors:
//! - Purchase history (30%): order count, total value, order recency
//! - Browsing activity (25%): listings, integrations, activity recency
//! - Interest match (25%): marketplace spread, segment fit, account age
//! - Engagement (20%): subscription value, marketplace spread, events
//!
//! Every component is a threshold ladder (highest bracket first) accumulating
//! fixed points, capped at 100. Inputs are coalesced before scoring; nothing
//! here can fail. A lead without an enrichment record scores exactly 10 on
//! each enrichment-dependent component: unknown activity is assumed minimal,
//! not absent.

use bigdecimal::ToPrimitive;
use chrono::{DateTime, Utc};

use crate::models::{
    EnrichmentPayload, Lead, LeadEnrichment, LeadPayload, ScoreComponents, ScoreResult,
};

const WEIGHT_PURCHASE_HISTORY: f64 = 0.30;
const WEIGHT_BROWSING_ACTIVITY: f64 = 0.25;
const WEIGHT_INTEREST_MATCH: f64 = 0.25;
const WEIGHT_ENGAGEMENT: f64 = 0.20;

/// Sub-score for a lead with no enrichment record.
const NO_ENRICHMENT_FLOOR: i32 = 10;

/// Segments treated as high-value for the interest-match component.
const HIGH_VALUE_SEGMENTS: [&str; 3] = ["founder", "seller", "paying"];

/// Enrichment-derived facts the score engine consumes, coalesced to plain
/// numbers so both persisted rows and in-flight sync payloads can feed it.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentFacts {
    pub total_order_count: i64,
    pub total_order_value: f64,
    pub last_order_at: Option<DateTime<Utc>>,
    pub total_product_count: i64,
    pub integration_count: i64,
    pub last_active_at: Option<DateTime<Utc>>,
    pub subscription_value: f64,
    /// Number of marketplaces with at least one order.
    pub marketplace_spread: usize,
}

/// Everything one score evaluation needs.
#[derive(Debug, Clone)]
pub struct ScoringInput {
    pub marketplace_count: usize,
    pub segment: Option<String>,
    /// Account age anchor for the loyalty bracket.
    pub account_created_at: DateTime<Utc>,
    pub event_count: usize,
    pub enrichment: Option<EnrichmentFacts>,
}

fn decimal_f64(value: &bigdecimal::BigDecimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

impl EnrichmentFacts {
    pub fn from_record(e: &LeadEnrichment) -> Self {
        let spread = [
            e.ml_order_count,
            e.shopee_order_count,
            e.magalu_order_count,
            e.shein_order_count,
        ]
        .iter()
        .filter(|c| **c > 0)
        .count();

        Self {
            total_order_count: i64::from(e.total_order_count),
            total_order_value: decimal_f64(&e.total_order_value),
            last_order_at: e.last_order_at,
            total_product_count: i64::from(e.total_product_count),
            integration_count: i64::from(
                e.ml_integrations + e.shopee_integrations + e.magalu_integrations,
            ),
            last_active_at: e.last_active_at,
            subscription_value: decimal_f64(&e.subscription_value),
            marketplace_spread: spread,
        }
    }

    pub fn from_payload(e: &EnrichmentPayload) -> Self {
        let spread = [
            e.ml_order_count,
            e.shopee_order_count,
            e.magalu_order_count,
            e.shein_order_count,
        ]
        .iter()
        .filter(|c| **c > 0)
        .count();

        Self {
            total_order_count: i64::from(e.total_order_count),
            total_order_value: decimal_f64(&e.total_order_value),
            last_order_at: None,
            total_product_count: i64::from(e.total_product_count),
            integration_count: i64::from(
                e.ml_integrations + e.shopee_integrations + e.magalu_integrations,
            ),
            last_active_at: e.last_active_at,
            subscription_value: decimal_f64(&e.subscription_value),
            marketplace_spread: spread,
        }
    }
}

impl ScoringInput {
    /// View over a persisted lead, used by the on-demand recompute path.
    pub fn from_lead(lead: &Lead, enrichment: Option<&LeadEnrichment>, event_count: usize) -> Self {
        Self {
            marketplace_count: lead.marketplaces.len(),
            segment: lead.segment.clone(),
            account_created_at: lead.created_at,
            event_count,
            enrichment: enrichment.map(EnrichmentFacts::from_record),
        }
    }

    /// View over the payloads a sync run is about to persist. The loyalty
    /// anchor is the source account's creation date so repeated runs score
    /// identically.
    pub fn from_sync_payload(
        lead: &LeadPayload,
        enrichment: &EnrichmentPayload,
        account_created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            marketplace_count: lead.marketplaces.len(),
            segment: Some(lead.segment.clone()),
            account_created_at,
            event_count: 0,
            enrichment: Some(EnrichmentFacts::from_payload(enrichment)),
        }
    }
}

fn days_since(now: DateTime<Utc>, then: DateTime<Utc>) -> i64 {
    (now - then).num_days()
}

fn score_purchase_history(input: &ScoringInput, now: DateTime<Utc>) -> i32 {
    let Some(e) = &input.enrichment else {
        return NO_ENRICHMENT_FLOOR;
    };

    let mut score = 0;

    // Order count (0-35 points)
    if e.total_order_count >= 50 {
        score += 35;
    } else if e.total_order_count >= 10 {
        score += 25;
    } else if e.total_order_count >= 1 {
        score += 15;
    } else {
        score += 5;
    }

    // Total order value (0-35 points)
    if e.total_order_value >= 10_000.0 {
        score += 35;
    } else if e.total_order_value >= 1_000.0 {
        score += 25;
    } else if e.total_order_value >= 100.0 {
        score += 15;
    } else {
        score += 5;
    }

    // Recency of last order (0-30 points)
    if let Some(last_order) = e.last_order_at {
        let days = days_since(now, last_order);
        if days <= 7 {
            score += 30;
        } else if days <= 30 {
            score += 20;
        } else if days <= 90 {
            score += 10;
        } else {
            score += 5;
        }
    }

    score.min(100)
}

fn score_browsing_activity(input: &ScoringInput, now: DateTime<Utc>) -> i32 {
    let Some(e) = &input.enrichment else {
        return NO_ENRICHMENT_FLOOR;
    };

    let mut score = 0;

    // Listing count as proxy for platform engagement (0-35 points)
    if e.total_product_count >= 100 {
        score += 35;
    } else if e.total_product_count >= 20 {
        score += 25;
    } else if e.total_product_count >= 5 {
        score += 15;
    } else {
        score += 5;
    }

    // Multi-marketplace integrations (0-35 points)
    if e.integration_count >= 3 {
        score += 35;
    } else if e.integration_count >= 2 {
        score += 25;
    } else if e.integration_count >= 1 {
        score += 15;
    } else {
        score += 5;
    }

    // Recency of activity (0-30 points)
    if let Some(last_active) = e.last_active_at {
        let days = days_since(now, last_active);
        if days <= 3 {
            score += 30;
        } else if days <= 14 {
            score += 20;
        } else if days <= 30 {
            score += 10;
        } else {
            score += 5;
        }
    }

    score.min(100)
}

fn score_interest_match(input: &ScoringInput, now: DateTime<Utc>) -> i32 {
    let mut score = 0;

    // Multi-marketplace presence (0-40 points)
    if input.marketplace_count >= 4 {
        score += 40;
    } else if input.marketplace_count >= 2 {
        score += 25;
    } else {
        score += 10;
    }

    // Segment alignment (0-30 points)
    match input.segment.as_deref() {
        Some(s) if HIGH_VALUE_SEGMENTS.contains(&s) => score += 30,
        Some("free-active") => score += 15,
        _ => score += 5,
    }

    // Account age / loyalty (0-30 points)
    let days = days_since(now, input.account_created_at);
    if days >= 365 {
        score += 30;
    } else if days >= 90 {
        score += 20;
    } else if days >= 30 {
        score += 10;
    } else {
        score += 5;
    }

    score.min(100)
}

fn score_engagement(input: &ScoringInput) -> i32 {
    let Some(e) = &input.enrichment else {
        return NO_ENRICHMENT_FLOOR;
    };

    let mut score = 0;

    // Subscription value as engagement signal (0-40 points)
    if e.subscription_value >= 150.0 {
        score += 40;
    } else if e.subscription_value >= 50.0 {
        score += 30;
    } else if e.subscription_value > 0.0 {
        score += 20;
    } else {
        score += 5;
    }

    // Marketplace spread (0-35 points)
    if e.marketplace_spread >= 3 {
        score += 35;
    } else if e.marketplace_spread >= 2 {
        score += 25;
    } else if e.marketplace_spread >= 1 {
        score += 15;
    } else {
        score += 5;
    }

    // Event count (0-25 points)
    if input.event_count >= 20 {
        score += 25;
    } else if input.event_count >= 10 {
        score += 18;
    } else if input.event_count >= 3 {
        score += 10;
    } else {
        score += 3;
    }

    score.min(100)
}

/// Evaluates all four components and combines them into the final score.
pub fn calculate_score(input: &ScoringInput, now: DateTime<Utc>) -> ScoreResult {
    let components = ScoreComponents {
        purchase_history: score_purchase_history(input, now),
        browsing_activity: score_browsing_activity(input, now),
        interest_match: score_interest_match(input, now),
        engagement: score_engagement(input),
    };

    let weighted = f64::from(components.purchase_history) * WEIGHT_PURCHASE_HISTORY
        + f64::from(components.browsing_activity) * WEIGHT_BROWSING_ACTIVITY
        + f64::from(components.interest_match) * WEIGHT_INTEREST_MATCH
        + f64::from(components.engagement) * WEIGHT_ENGAGEMENT;
    let score = (weighted.round() as i32).clamp(0, 100);

    // Conversion probability is a step function of the score bracket, not a
    // continuous curve.
    let conversion_prob = if score >= 80 {
        0.75
    } else if score >= 60 {
        0.50
    } else if score >= 40 {
        0.25
    } else if score >= 20 {
        0.10
    } else {
        0.03
    };

    // Strongest factor names the reason; ties go to the first in the fixed
    // component order.
    let labeled = [
        (components.purchase_history, "purchase history"),
        (components.browsing_activity, "browsing activity"),
        (components.interest_match, "interest alignment"),
        (components.engagement, "engagement level"),
    ];
    let (top_value, top_label) = labeled
        .iter()
        .fold(None::<(i32, &str)>, |best, &(value, label)| match best {
            Some((bv, _)) if bv >= value => best,
            _ => Some((value, label)),
        })
        .unwrap_or((0, "purchase history"));

    let reason = format!(
        "Score {}/100 — strongest factor: {} ({}/100)",
        score, top_label, top_value
    );

    ScoreResult {
        score,
        conversion_prob,
        reason,
        components,
    }
}
