//! Core types for the fraud engine

use chrono::{DateTime, Utc};
use ledger_core::{ActorId, Amount, ProductId, Stage};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a price anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Above mean + 2σ
    High,
    /// Below mean - 2σ
    Low,
    /// Deviates from the mean but inside the 2σ band
    General,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AnomalyKind::High => "high",
            AnomalyKind::Low => "low",
            AnomalyKind::General => "general",
        };
        write!(f, "{}", name)
    }
}

/// Recorded price anomaly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceAnomaly {
    /// Sequential id (starting at 1)
    pub id: u64,

    /// Product
    pub product_id: ProductId,

    /// Owner at detection time
    pub owner: ActorId,

    /// Price that triggered detection
    pub suspicious_price: Amount,

    /// Rolling mean at detection time
    pub mean_price: Amount,

    /// Deviation from the mean (bp)
    pub deviation_bp: u128,

    /// Confidence derived from history depth (bp)
    pub confidence: u32,

    /// Classification
    pub kind: AnomalyKind,

    /// Detection time
    pub detected_at: DateTime<Utc>,

    /// Whether an analyst resolved it
    pub resolved: bool,

    /// Analyst's resolution note
    pub resolution: Option<String>,
}

/// Recorded stage-timing violation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeViolation {
    /// Sequential id (starting at 1)
    pub id: u64,

    /// Product
    pub product_id: ProductId,

    /// Owner at detection time
    pub owner: ActorId,

    /// Stage the product is in
    pub stage: Stage,

    /// Stage whose expected duration applied
    pub previous_stage: Stage,

    /// Expected minutes for the transition
    pub expected_minutes: u64,

    /// Minutes elapsed since the last update
    pub actual_minutes: u64,

    /// `actual - expected`
    pub delay_minutes: u64,

    /// Detection time
    pub detected_at: DateTime<Utc>,

    /// Whether an analyst resolved it
    pub resolved: bool,

    /// Analyst's resolution note
    pub resolution: Option<String>,
}

/// Accumulated violation history of one actor. Never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudPattern {
    /// Actor
    pub actor: ActorId,

    /// Anomalies and violations attributed to the actor
    pub violation_count: u32,

    /// Sum of suspicious values
    pub total_suspicious_value: Amount,

    /// Escalating risk score
    pub risk_score: u32,

    /// Whether the actor is blacklisted
    pub blacklisted: bool,

    /// First violation
    pub first_seen: DateTime<Utc>,

    /// Most recent violation
    pub last_violation_at: DateTime<Utc>,
}

/// Why an actor was blacklisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlacklistReason {
    /// Violation count reached the configured cap
    MaxViolations,
    /// Aggregate assessment score reached the blacklist threshold
    RiskScore,
}

/// Result of a comprehensive analysis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FraudAssessment {
    /// Product
    pub product_id: ProductId,

    /// Owner at assessment time
    pub owner: ActorId,

    /// Aggregate risk score
    pub risk_score: u32,

    /// Human-readable findings
    pub issues: Vec<String>,

    /// Anomaly recorded by this assessment
    pub anomaly: Option<PriceAnomaly>,

    /// Violation recorded by this assessment
    pub violation: Option<TimeViolation>,

    /// Whether the owner is blacklisted after the assessment
    pub owner_blacklisted: bool,

    /// Assessment time
    pub assessed_at: DateTime<Utc>,
}
