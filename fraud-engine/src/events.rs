//! Fraud notifications

use crate::types::{AnomalyKind, BlacklistReason};
use chrono::{DateTime, Utc};
use ledger_core::{ActorId, Amount, Notification, ProductId, Stage};
use serde::{Deserialize, Serialize};

/// Notifications emitted by the fraud detector
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum FraudEvent {
    /// Current price appended to a product's history window
    PriceSampled {
        /// Product
        product_id: ProductId,
        /// Sampled price
        price: Amount,
        /// Stage at sampling time
        stage: Stage,
        /// Window depth after the append
        depth: usize,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Price anomaly recorded
    PriceAnomalyDetected {
        /// Anomaly id
        anomaly_id: u64,
        /// Product
        product_id: ProductId,
        /// Classification
        kind: AnomalyKind,
        /// Deviation (bp)
        deviation_bp: u128,
        /// Confidence (bp)
        confidence: u32,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Stage-timing violation recorded
    TimeViolationDetected {
        /// Violation id
        violation_id: u64,
        /// Product
        product_id: ProductId,
        /// Current stage
        stage: Stage,
        /// Minutes over the expected duration
        delay_minutes: u64,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Actor pattern created or escalated
    FraudPatternUpdated {
        /// Actor
        actor: ActorId,
        /// Violations so far
        violation_count: u32,
        /// Risk score after the update
        risk_score: u32,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Actor blacklisted
    ActorBlacklisted {
        /// Actor
        actor: ActorId,
        /// Trigger
        reason: BlacklistReason,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Actor removed from the blacklist
    ActorUnblacklisted {
        /// Actor
        actor: ActorId,
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Anomaly resolved
    AnomalyResolved {
        /// Anomaly id
        anomaly_id: u64,
        /// Analyst
        by: ActorId,
        /// Resolution note
        reason: String,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Violation resolved
    ViolationResolved {
        /// Violation id
        violation_id: u64,
        /// Analyst
        by: ActorId,
        /// Resolution note
        reason: String,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Comprehensive analysis finished
    AssessmentCompleted {
        /// Product
        product_id: ProductId,
        /// Owner
        owner: ActorId,
        /// Aggregate score
        risk_score: u32,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Thresholds replaced
    DetectionConfigUpdated {
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Expected durations replaced
    ExpectedDurationsUpdated {
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
    /// Detection switched on or off
    DetectionToggled {
        /// New state
        active: bool,
        /// Admin
        by: ActorId,
        /// Operation time
        at: DateTime<Utc>,
    },
}

impl Notification for FraudEvent {
    fn name(&self) -> &'static str {
        match self {
            FraudEvent::PriceSampled { .. } => "price_sampled",
            FraudEvent::PriceAnomalyDetected { .. } => "price_anomaly_detected",
            FraudEvent::TimeViolationDetected { .. } => "time_violation_detected",
            FraudEvent::FraudPatternUpdated { .. } => "fraud_pattern_updated",
            FraudEvent::ActorBlacklisted { .. } => "actor_blacklisted",
            FraudEvent::ActorUnblacklisted { .. } => "actor_unblacklisted",
            FraudEvent::AnomalyResolved { .. } => "anomaly_resolved",
            FraudEvent::ViolationResolved { .. } => "violation_resolved",
            FraudEvent::AssessmentCompleted { .. } => "assessment_completed",
            FraudEvent::DetectionConfigUpdated { .. } => "detection_config_updated",
            FraudEvent::ExpectedDurationsUpdated { .. } => "expected_durations_updated",
            FraudEvent::DetectionToggled { .. } => "detection_toggled",
        }
    }
}
