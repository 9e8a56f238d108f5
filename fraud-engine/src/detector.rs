//! Fraud detector
//!
//! Each analysis is recomputed from stored history; only its results
//! (anomaly and violation records, actor patterns) accumulate.
//!
//! # Price anomalies
//!
//! The product's current price is appended to its history window. Once the
//! window holds `minimum_history` samples, the price is compared with the
//! window mean; a deviation above `price_deviation_threshold_bp` is recorded
//! and classified against the `mean ± 2σ` band.
//!
//! # Stage timing
//!
//! Minutes since the product's last update are compared with the expected
//! duration of the stage it left, plus `time_threshold_minutes`.
//!
//! # Actor patterns
//!
//! Every anomaly or violation is attributed to the product's owner. The first
//! one seeds a risk score of 1000, each repeat adds 1500, and the actor is
//! blacklisted once the violation count reaches `max_violations`.

use crate::{
    config::{DetectionConfig, TRANSITIONS},
    events::FraudEvent,
    stats::PriceStats,
    types::{AnomalyKind, BlacklistReason, FraudAssessment, FraudPattern, PriceAnomaly, TimeViolation},
    window::{PriceHistoryWindow, PriceSample},
    Error, Result,
};
use chrono::{DateTime, Utc};
use ledger_core::{
    AccessPolicy, Action, ActorId, Amount, Clock, EventSink, ProductId, ProductRecord,
    ProductSource, SystemClock, TracingSink, BASIS_POINTS,
};
use std::collections::{hash_map, BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Width of the classification band in standard deviations
const BAND_SIGMAS: u128 = 2;

/// Risk score seeded by an actor's first violation
const INITIAL_RISK: u32 = 1000;

/// Risk added by every further violation
const RISK_STEP: u32 = 1500;

/// Assessment weight of a price anomaly
const ANOMALY_WEIGHT: u32 = 4000;

/// Assessment weight of a timing violation
const VIOLATION_WEIGHT: u32 = 3000;

/// Violations after which an owner's pattern counts toward an assessment
const PATTERN_MIN_VIOLATIONS: u32 = 2;

/// Assessment score that blacklists the owner
const BLACKLIST_SCORE: u32 = 8000;

/// Anomaly confidence for a history of `depth` samples
fn confidence_for_depth(depth: usize) -> u32 {
    match depth {
        d if d >= 20 => 9000,
        d if d >= 10 => 7500,
        _ => 5000,
    }
}

/// Fraud detector
pub struct FraudDetector {
    config: DetectionConfig,
    policy: Arc<dyn AccessPolicy>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink<FraudEvent>>,

    history: HashMap<ProductId, PriceHistoryWindow>,
    anomalies: BTreeMap<u64, PriceAnomaly>,
    violations: BTreeMap<u64, TimeViolation>,
    patterns: HashMap<ActorId, FraudPattern>,
    last_anomaly_id: u64,
    last_violation_id: u64,
}

impl FraudDetector {
    /// Create new fraud detector
    pub fn new(config: DetectionConfig, policy: Arc<dyn AccessPolicy>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            config,
            policy,
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingSink),
            history: HashMap::new(),
            anomalies: BTreeMap::new(),
            violations: BTreeMap::new(),
            patterns: HashMap::new(),
            last_anomaly_id: 0,
            last_violation_id: 0,
        })
    }

    /// Use a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send notifications to `sink`
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink<FraudEvent>>) -> Self {
        self.events = sink;
        self
    }

    /// Record the product's current price and check it against its history
    pub fn analyze_price_anomaly(
        &mut self,
        caller: &ActorId,
        source: &dyn ProductSource,
        product_id: ProductId,
    ) -> Result<Option<PriceAnomaly>> {
        let product = self.begin_analysis(caller, source, product_id)?;
        let now = self.clock.now();
        Ok(self.detect_price_anomaly(&product, now))
    }

    /// Check how long the product has been in its current stage
    pub fn validate_stage_timings(
        &mut self,
        caller: &ActorId,
        source: &dyn ProductSource,
        product_id: ProductId,
    ) -> Result<Option<TimeViolation>> {
        let product = self.begin_analysis(caller, source, product_id)?;
        let now = self.clock.now();
        Ok(self.detect_timing_violation(&product, now))
    }

    /// Run both checks and score the product's owner
    pub fn comprehensive_analysis(
        &mut self,
        caller: &ActorId,
        source: &dyn ProductSource,
        product_id: ProductId,
    ) -> Result<FraudAssessment> {
        let product = self.begin_analysis(caller, source, product_id)?;
        let now = self.clock.now();
        let owner = &product.owner;

        let mut risk_score = 0u32;
        let mut issues = Vec::new();

        let anomaly = self.detect_price_anomaly(&product, now);
        if let Some(anomaly) = &anomaly {
            risk_score += ANOMALY_WEIGHT;
            issues.push(format!(
                "Price anomaly #{}: {} deviation of {} bp from mean {}",
                anomaly.id, anomaly.kind, anomaly.deviation_bp, anomaly.mean_price
            ));
        }

        let violation = self.detect_timing_violation(&product, now);
        if let Some(violation) = &violation {
            risk_score += VIOLATION_WEIGHT;
            issues.push(format!(
                "Stage timing violation #{}: {} minutes over the expected {} after {}",
                violation.id, violation.delay_minutes, violation.expected_minutes, violation.previous_stage
            ));
        }

        if let Some(pattern) = self.patterns.get(owner) {
            if pattern.violation_count >= PATTERN_MIN_VIOLATIONS {
                risk_score = risk_score.saturating_add(pattern.risk_score);
                issues.push(format!(
                    "Owner {} has {} recorded violations (risk score {})",
                    owner, pattern.violation_count, pattern.risk_score
                ));
            }
        }

        if risk_score >= BLACKLIST_SCORE && !self.is_blacklisted(owner) {
            self.blacklist(owner, BlacklistReason::RiskScore, now);
            issues.push(format!("Owner {} blacklisted", owner));
        }

        tracing::info!(
            product_id = %product_id,
            %owner,
            risk_score,
            issues = issues.len(),
            "Comprehensive analysis completed"
        );
        self.events.emit(&FraudEvent::AssessmentCompleted {
            product_id,
            owner: owner.clone(),
            risk_score,
            at: now,
        });

        Ok(FraudAssessment {
            product_id,
            owner: owner.clone(),
            risk_score,
            issues,
            anomaly,
            violation,
            owner_blacklisted: self.is_blacklisted(owner),
            assessed_at: now,
        })
    }

    /// Mark an anomaly reviewed. Risk scores and blacklist flags are kept.
    pub fn resolve_anomaly(
        &mut self,
        caller: &ActorId,
        anomaly_id: u64,
        reason: impl Into<String>,
    ) -> Result<()> {
        self.policy.require(caller, &Action::ResolveFinding)?;

        let anomaly = self
            .anomalies
            .get_mut(&anomaly_id)
            .ok_or(Error::AnomalyNotFound(anomaly_id))?;
        if anomaly.resolved {
            return Err(Error::AnomalyAlreadyResolved(anomaly_id));
        }

        let reason = reason.into();
        anomaly.resolved = true;
        anomaly.resolution = Some(reason.clone());

        tracing::info!(anomaly_id, by = %caller, "Anomaly resolved");
        self.events.emit(&FraudEvent::AnomalyResolved {
            anomaly_id,
            by: caller.clone(),
            reason,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Mark a timing violation reviewed. Risk scores and blacklist flags are
    /// kept.
    pub fn resolve_violation(
        &mut self,
        caller: &ActorId,
        violation_id: u64,
        reason: impl Into<String>,
    ) -> Result<()> {
        self.policy.require(caller, &Action::ResolveFinding)?;

        let violation = self
            .violations
            .get_mut(&violation_id)
            .ok_or(Error::ViolationNotFound(violation_id))?;
        if violation.resolved {
            return Err(Error::ViolationAlreadyResolved(violation_id));
        }

        let reason = reason.into();
        violation.resolved = true;
        violation.resolution = Some(reason.clone());

        tracing::info!(violation_id, by = %caller, "Violation resolved");
        self.events.emit(&FraudEvent::ViolationResolved {
            violation_id,
            by: caller.clone(),
            reason,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Lift a blacklist flag. The actor's violation history is unchanged.
    pub fn remove_from_blacklist(&mut self, caller: &ActorId, actor: &ActorId) -> Result<()> {
        self.policy.require(caller, &Action::ManageBlacklist)?;

        match self.patterns.get_mut(actor) {
            Some(pattern) if pattern.blacklisted => pattern.blacklisted = false,
            _ => return Err(Error::NotBlacklisted(actor.clone())),
        }

        tracing::info!(%actor, by = %caller, "Actor removed from blacklist");
        self.events.emit(&FraudEvent::ActorUnblacklisted {
            actor: actor.clone(),
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Replace thresholds and expected durations
    pub fn update_config(&mut self, caller: &ActorId, config: DetectionConfig) -> Result<()> {
        self.policy.require(caller, &Action::ConfigureDetection)?;
        config.validate()?;

        tracing::info!(
            price_deviation_threshold_bp = config.price_deviation_threshold_bp,
            time_threshold_minutes = config.time_threshold_minutes,
            minimum_history = config.minimum_history,
            max_violations = config.max_violations,
            active = config.active,
            "Detection config updated"
        );
        self.config = config;

        self.events.emit(&FraudEvent::DetectionConfigUpdated {
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Replace the expected duration table (one entry per stage left,
    /// Planted through Retail)
    pub fn set_expected_durations(&mut self, caller: &ActorId, minutes: &[u64]) -> Result<()> {
        self.policy.require(caller, &Action::ConfigureDetection)?;

        let durations = <[u64; TRANSITIONS]>::try_from(minutes).map_err(|_| {
            Error::InvalidConfig(format!(
                "expected {} stage durations, got {}",
                TRANSITIONS,
                minutes.len()
            ))
        })?;
        self.config.expected_durations_minutes = durations;

        tracing::info!(?durations, "Expected stage durations updated");
        self.events.emit(&FraudEvent::ExpectedDurationsUpdated {
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Switch analysis on or off
    pub fn set_active(&mut self, caller: &ActorId, active: bool) -> Result<()> {
        self.policy.require(caller, &Action::ConfigureDetection)?;
        if self.config.active == active {
            return Err(Error::ActiveUnchanged { active });
        }

        self.config.active = active;

        tracing::info!(active, by = %caller, "Fraud detection toggled");
        self.events.emit(&FraudEvent::DetectionToggled {
            active,
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Configuration in effect
    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    /// Anomaly record
    pub fn anomaly(&self, id: u64) -> Result<&PriceAnomaly> {
        self.anomalies.get(&id).ok_or(Error::AnomalyNotFound(id))
    }

    /// Violation record
    pub fn violation(&self, id: u64) -> Result<&TimeViolation> {
        self.violations.get(&id).ok_or(Error::ViolationNotFound(id))
    }

    /// Actor's pattern, if any violation was ever attributed to it
    pub fn fraud_pattern(&self, actor: &ActorId) -> Option<&FraudPattern> {
        self.patterns.get(actor)
    }

    /// Whether the actor is blacklisted
    pub fn is_blacklisted(&self, actor: &ActorId) -> bool {
        self.patterns.get(actor).map_or(false, |p| p.blacklisted)
    }

    /// Price history window of a product
    pub fn price_history(&self, product_id: ProductId) -> Option<&PriceHistoryWindow> {
        self.history.get(&product_id)
    }

    /// Unresolved anomalies at or above the confidence threshold, oldest first
    pub fn actionable_anomalies(&self) -> Vec<&PriceAnomaly> {
        self.anomalies
            .values()
            .filter(|a| !a.resolved && a.confidence >= self.config.confidence_threshold)
            .collect()
    }

    /// Number of anomalies recorded
    pub fn anomaly_count(&self) -> u64 {
        self.last_anomaly_id
    }

    /// Number of violations recorded
    pub fn violation_count(&self) -> u64 {
        self.last_violation_id
    }

    fn begin_analysis(
        &self,
        caller: &ActorId,
        source: &dyn ProductSource,
        product_id: ProductId,
    ) -> Result<ProductRecord> {
        self.policy.require(caller, &Action::AnalyzeFraud)?;
        if !self.config.active {
            return Err(Error::DetectionInactive);
        }
        Ok(source.product(product_id)?)
    }

    fn detect_price_anomaly(
        &mut self,
        product: &ProductRecord,
        now: DateTime<Utc>,
    ) -> Option<PriceAnomaly> {
        let window = self.history.entry(product.id).or_default();
        window.push(PriceSample {
            price: product.price,
            recorded_at: product.updated_at,
            stage: product.stage,
        });

        let depth = window.len();
        self.events.emit(&FraudEvent::PriceSampled {
            product_id: product.id,
            price: product.price,
            stage: product.stage,
            depth,
            at: now,
        });

        if depth < self.config.minimum_history {
            tracing::debug!(product_id = %product.id, depth, "Insufficient price history");
            return None;
        }

        let stats = PriceStats::compute(window.prices())?;
        if stats.mean == 0 {
            return None;
        }

        let price = product.price.minor();
        let deviation_bp = price.abs_diff(stats.mean).saturating_mul(BASIS_POINTS) / stats.mean;
        if deviation_bp <= u128::from(self.config.price_deviation_threshold_bp) {
            return None;
        }

        let kind = if price > stats.upper_band(BAND_SIGMAS) {
            AnomalyKind::High
        } else if price < stats.lower_band(BAND_SIGMAS) {
            AnomalyKind::Low
        } else {
            AnomalyKind::General
        };

        self.last_anomaly_id += 1;
        let anomaly = PriceAnomaly {
            id: self.last_anomaly_id,
            product_id: product.id,
            owner: product.owner.clone(),
            suspicious_price: product.price,
            mean_price: Amount::from_minor(stats.mean),
            deviation_bp,
            confidence: confidence_for_depth(depth),
            kind,
            detected_at: now,
            resolved: false,
            resolution: None,
        };
        self.anomalies.insert(anomaly.id, anomaly.clone());

        tracing::warn!(
            anomaly_id = anomaly.id,
            product_id = %product.id,
            %kind,
            price = %product.price,
            mean = %anomaly.mean_price,
            deviation_bp = deviation_bp as u64,
            "Price anomaly detected"
        );
        self.events.emit(&FraudEvent::PriceAnomalyDetected {
            anomaly_id: anomaly.id,
            product_id: product.id,
            kind,
            deviation_bp,
            confidence: anomaly.confidence,
            at: now,
        });

        self.update_fraud_pattern(&product.owner, product.price, now);
        Some(anomaly)
    }

    fn detect_timing_violation(
        &mut self,
        product: &ProductRecord,
        now: DateTime<Utc>,
    ) -> Option<TimeViolation> {
        // Nothing to time before the first transition
        let previous_stage = product.stage.previous()?;

        let elapsed = (now - product.updated_at).num_minutes().max(0) as u64;
        let expected = self.config.expected_durations_minutes[usize::from(previous_stage.index())];
        if elapsed <= expected.saturating_add(self.config.time_threshold_minutes) {
            return None;
        }

        self.last_violation_id += 1;
        let violation = TimeViolation {
            id: self.last_violation_id,
            product_id: product.id,
            owner: product.owner.clone(),
            stage: product.stage,
            previous_stage,
            expected_minutes: expected,
            actual_minutes: elapsed,
            delay_minutes: elapsed - expected,
            detected_at: now,
            resolved: false,
            resolution: None,
        };
        self.violations.insert(violation.id, violation.clone());

        tracing::warn!(
            violation_id = violation.id,
            product_id = %product.id,
            stage = %product.stage,
            expected,
            elapsed,
            "Stage timing violation"
        );
        self.events.emit(&FraudEvent::TimeViolationDetected {
            violation_id: violation.id,
            product_id: product.id,
            stage: product.stage,
            delay_minutes: violation.delay_minutes,
            at: now,
        });

        self.update_fraud_pattern(&product.owner, product.price, now);
        Some(violation)
    }

    fn update_fraud_pattern(&mut self, actor: &ActorId, suspicious_value: Amount, now: DateTime<Utc>) {
        let pattern = match self.patterns.entry(actor.clone()) {
            hash_map::Entry::Occupied(entry) => {
                let pattern = entry.into_mut();
                pattern.risk_score = if pattern.violation_count == 0 {
                    INITIAL_RISK
                } else {
                    pattern.risk_score.saturating_add(RISK_STEP)
                };
                pattern.violation_count = pattern.violation_count.saturating_add(1);
                pattern.total_suspicious_value =
                    pattern.total_suspicious_value.saturating_add(suspicious_value);
                pattern.last_violation_at = now;
                pattern
            }
            hash_map::Entry::Vacant(entry) => entry.insert(FraudPattern {
                actor: actor.clone(),
                violation_count: 1,
                total_suspicious_value: suspicious_value,
                risk_score: INITIAL_RISK,
                blacklisted: false,
                first_seen: now,
                last_violation_at: now,
            }),
        };

        let violation_count = pattern.violation_count;
        let risk_score = pattern.risk_score;
        let reached_cap = !pattern.blacklisted && violation_count >= self.config.max_violations;

        tracing::info!(%actor, violation_count, risk_score, "Fraud pattern updated");
        self.events.emit(&FraudEvent::FraudPatternUpdated {
            actor: actor.clone(),
            violation_count,
            risk_score,
            at: now,
        });

        if reached_cap {
            self.blacklist(actor, BlacklistReason::MaxViolations, now);
        }
    }

    fn blacklist(&mut self, actor: &ActorId, reason: BlacklistReason, now: DateTime<Utc>) {
        let pattern = self
            .patterns
            .entry(actor.clone())
            .or_insert_with(|| FraudPattern {
                actor: actor.clone(),
                violation_count: 0,
                total_suspicious_value: Amount::ZERO,
                risk_score: 0,
                blacklisted: false,
                first_seen: now,
                last_violation_at: now,
            });
        pattern.blacklisted = true;

        tracing::warn!(%actor, ?reason, "Actor blacklisted");
        self.events.emit(&FraudEvent::ActorBlacklisted {
            actor: actor.clone(),
            reason,
            at: now,
        });
    }
}

impl fmt::Debug for FraudDetector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FraudDetector")
            .field("config", &self.config)
            .field("tracked_products", &self.history.len())
            .field("anomalies", &self.anomalies.len())
            .field("violations", &self.violations.len())
            .field("patterns", &self.patterns.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use ledger_core::{
        AccessRegistry, Config as LedgerConfig, ContentHash, ErrorKind, ManualClock, MemorySink,
        ProductLedger, Role, Stage,
    };

    struct Fixture {
        registry: Arc<AccessRegistry>,
        clock: Arc<ManualClock>,
        ledger: ProductLedger,
        detector: FraudDetector,
        sink: Arc<MemorySink<FraudEvent>>,
    }

    fn admin() -> ActorId {
        ActorId::new("admin")
    }
    fn farmer() -> ActorId {
        ActorId::new("farmer")
    }
    fn trader() -> ActorId {
        ActorId::new("trader")
    }
    fn analyst() -> ActorId {
        ActorId::new("analyst")
    }
    fn monitor() -> ActorId {
        ActorId::new("monitor")
    }

    fn fixture() -> Fixture {
        let registry = Arc::new(AccessRegistry::new(admin()));
        registry.grant_role(&admin(), &farmer(), Role::Producer).unwrap();
        registry.grant_role(&admin(), &analyst(), Role::FraudAnalyst).unwrap();

        let clock = Arc::new(ManualClock::default());
        let sink = Arc::new(MemorySink::<FraudEvent>::new());
        let ledger = ProductLedger::new(LedgerConfig::default(), registry.clone())
            .with_clock(clock.clone());
        let detector = FraudDetector::new(DetectionConfig::default(), registry.clone())
            .unwrap()
            .with_clock(clock.clone())
            .with_event_sink(sink.clone());

        Fixture {
            registry,
            clock,
            ledger,
            detector,
            sink,
        }
    }

    fn create(fx: &mut Fixture, units: u64) -> ProductId {
        fx.ledger
            .create(&farmer(), 100, Amount::from_units(units), ContentHash::ZERO, vec![])
            .unwrap()
    }

    fn analyze(fx: &mut Fixture, id: ProductId) -> Option<PriceAnomaly> {
        fx.detector
            .analyze_price_anomaly(&monitor(), &fx.ledger, id)
            .unwrap()
    }

    /// Four samples at 100, then the trader takes over at 1000
    fn seed_price_jump(fx: &mut Fixture) -> ProductId {
        let id = create(fx, 100);
        for _ in 0..4 {
            assert!(analyze(fx, id).is_none());
        }
        fx.ledger
            .transfer_ownership(&farmer(), id, &trader(), Amount::from_units(1000))
            .unwrap();
        id
    }

    #[test]
    fn test_confidence_for_depth() {
        assert_eq!(confidence_for_depth(5), 5000);
        assert_eq!(confidence_for_depth(10), 7500);
        assert_eq!(confidence_for_depth(19), 7500);
        assert_eq!(confidence_for_depth(20), 9000);
        assert_eq!(confidence_for_depth(100), 9000);
    }

    #[test]
    fn test_minimum_history() {
        let mut fx = fixture();
        let id = create(&mut fx, 10);

        for _ in 0..4 {
            assert!(analyze(&mut fx, id).is_none());
        }
        assert_eq!(fx.detector.price_history(id).unwrap().len(), 4);

        // Stable prices never trigger
        for _ in 0..10 {
            assert!(analyze(&mut fx, id).is_none());
        }
        assert_eq!(fx.detector.anomaly_count(), 0);
    }

    #[test]
    fn test_every_sample_is_notified() {
        let mut fx = fixture();
        let id = create(&mut fx, 10);

        for _ in 0..3 {
            assert!(analyze(&mut fx, id).is_none());
        }

        let events = fx.sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            events.last(),
            Some(FraudEvent::PriceSampled { depth: 3, stage: Stage::Planted, .. })
        ));
        assert_eq!(fx.detector.price_history(id).unwrap().len(), 3);
    }

    #[test]
    fn test_anomaly_classification() {
        let mut fx = fixture();
        let id = seed_price_jump(&mut fx);

        let anomaly = analyze(&mut fx, id).unwrap();
        assert_eq!(anomaly.id, 1);
        assert_eq!(anomaly.owner, trader());
        assert_eq!(anomaly.mean_price, Amount::from_units(280));
        assert_eq!(anomaly.deviation_bp, 25_714);
        // 1000 sits exactly on mean + 2σ (280 + 2 * 360)
        assert_eq!(anomaly.kind, AnomalyKind::General);
        assert_eq!(anomaly.confidence, 5000);

        let pattern = fx.detector.fraud_pattern(&trader()).unwrap();
        assert_eq!(pattern.violation_count, 1);
        assert_eq!(pattern.risk_score, 1000);
        assert_eq!(pattern.total_suspicious_value, Amount::from_units(1000));
    }

    #[test]
    fn test_high_and_low_classification() {
        let mut fx = fixture();
        let id = create(&mut fx, 100);
        for _ in 0..19 {
            analyze(&mut fx, id);
        }
        fx.ledger
            .transfer_ownership(&farmer(), id, &trader(), Amount::from_units(1000))
            .unwrap();
        let high = analyze(&mut fx, id).unwrap();
        assert_eq!(high.kind, AnomalyKind::High);
        assert_eq!(high.confidence, 9000);

        let mut fx = fixture();
        let id = create(&mut fx, 1000);
        for _ in 0..19 {
            analyze(&mut fx, id);
        }
        fx.ledger
            .transfer_ownership(&farmer(), id, &trader(), Amount::from_units(1))
            .unwrap();
        let low = analyze(&mut fx, id).unwrap();
        assert_eq!(low.kind, AnomalyKind::Low);
    }

    #[test]
    fn test_three_anomalies_blacklist() {
        let mut fx = fixture();
        let id = seed_price_jump(&mut fx);

        for expected in 1..=3 {
            let anomaly = analyze(&mut fx, id).unwrap();
            assert_eq!(anomaly.id, expected);
            assert_eq!(fx.detector.is_blacklisted(&trader()), expected == 3);
        }

        let pattern = fx.detector.fraud_pattern(&trader()).unwrap();
        assert_eq!(pattern.violation_count, 3);
        assert_eq!(pattern.risk_score, 4000);

        // Resolution does not lift the blacklist
        fx.detector.resolve_anomaly(&analyst(), 1, "confirmed").unwrap();
        assert!(fx.detector.is_blacklisted(&trader()));

        let err = fx.detector.remove_from_blacklist(&analyst(), &trader()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        fx.detector.remove_from_blacklist(&admin(), &trader()).unwrap();
        assert!(!fx.detector.is_blacklisted(&trader()));
        assert_eq!(fx.detector.fraud_pattern(&trader()).unwrap().violation_count, 3);

        let err = fx.detector.remove_from_blacklist(&admin(), &trader()).unwrap_err();
        assert!(matches!(err, Error::NotBlacklisted(_)));

        let blacklistings = fx
            .sink
            .events()
            .into_iter()
            .filter(|e| matches!(e, FraudEvent::ActorBlacklisted { reason: BlacklistReason::MaxViolations, .. }))
            .count();
        assert_eq!(blacklistings, 1);
    }

    #[test]
    fn test_stage_timing() {
        let mut fx = fixture();
        let id = create(&mut fx, 5);

        // Planted has no previous stage
        fx.clock.advance(Duration::days(365));
        assert!(fx
            .detector
            .validate_stage_timings(&monitor(), &fx.ledger, id)
            .unwrap()
            .is_none());

        fx.ledger.advance_stage(&farmer(), id, Stage::Growing).unwrap();

        // 30 days expected plus 1 day grace
        fx.clock.advance(Duration::minutes(43_200 + 1_440));
        assert!(fx
            .detector
            .validate_stage_timings(&monitor(), &fx.ledger, id)
            .unwrap()
            .is_none());

        fx.clock.advance(Duration::minutes(1));
        let violation = fx
            .detector
            .validate_stage_timings(&monitor(), &fx.ledger, id)
            .unwrap()
            .unwrap();
        assert_eq!(violation.id, 1);
        assert_eq!(violation.previous_stage, Stage::Planted);
        assert_eq!(violation.expected_minutes, 43_200);
        assert_eq!(violation.delay_minutes, 1_441);
        assert_eq!(fx.detector.fraud_pattern(&farmer()).unwrap().violation_count, 1);

        fx.detector.resolve_violation(&analyst(), 1, "weather delay").unwrap();
        assert_eq!(
            fx.detector.violation(1).unwrap().resolution.as_deref(),
            Some("weather delay")
        );
        let err = fx.detector.resolve_violation(&analyst(), 1, "again").unwrap_err();
        assert!(matches!(err, Error::ViolationAlreadyResolved(1)));
        let err = fx.detector.resolve_violation(&analyst(), 9, "?").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_comprehensive_analysis_blacklists_on_score() {
        let mut fx = fixture();
        let id = create(&mut fx, 100);
        fx.ledger.advance_stage(&farmer(), id, Stage::Growing).unwrap();
        for _ in 0..4 {
            analyze(&mut fx, id);
        }
        fx.ledger
            .transfer_ownership(&farmer(), id, &trader(), Amount::from_units(1000))
            .unwrap();
        fx.clock.advance(Duration::days(90));

        let assessment = fx
            .detector
            .comprehensive_analysis(&monitor(), &fx.ledger, id)
            .unwrap();

        // 4000 + 3000 + pattern risk (1000 + 1500)
        assert_eq!(assessment.risk_score, 9500);
        assert!(assessment.anomaly.is_some());
        assert!(assessment.violation.is_some());
        assert!(assessment.owner_blacklisted);
        assert_eq!(assessment.issues.len(), 4);

        let events = fx.sink.events();
        assert!(events.iter().any(|e| matches!(
            e,
            FraudEvent::ActorBlacklisted {
                reason: BlacklistReason::RiskScore,
                ..
            }
        )));
    }

    #[test]
    fn test_comprehensive_analysis_clean_product() {
        let mut fx = fixture();
        let id = create(&mut fx, 3);

        let assessment = fx
            .detector
            .comprehensive_analysis(&monitor(), &fx.ledger, id)
            .unwrap();
        assert_eq!(assessment.risk_score, 0);
        assert!(assessment.issues.is_empty());
        assert!(!assessment.owner_blacklisted);
    }

    #[test]
    fn test_actionable_anomalies() {
        let mut fx = fixture();
        let id = seed_price_jump(&mut fx);
        analyze(&mut fx, id).unwrap();
        analyze(&mut fx, id).unwrap();
        assert!(fx.detector.actionable_anomalies().is_empty());

        let config = DetectionConfig {
            confidence_threshold: 5000,
            ..DetectionConfig::default()
        };
        fx.detector.update_config(&admin(), config).unwrap();
        assert_eq!(fx.detector.actionable_anomalies().len(), 2);

        fx.detector.resolve_anomaly(&analyst(), 2, "fixed").unwrap();
        let actionable = fx.detector.actionable_anomalies();
        assert_eq!(actionable.len(), 1);
        assert_eq!(actionable[0].id, 1);
    }

    #[test]
    fn test_inactive_and_paused() {
        let mut fx = fixture();
        let id = create(&mut fx, 3);

        fx.detector.set_active(&admin(), false).unwrap();
        let err = fx
            .detector
            .analyze_price_anomaly(&monitor(), &fx.ledger, id)
            .unwrap_err();
        assert!(matches!(err, Error::DetectionInactive));
        assert!(matches!(
            fx.detector.set_active(&admin(), false),
            Err(Error::ActiveUnchanged { active: false })
        ));
        fx.detector.set_active(&admin(), true).unwrap();

        fx.registry.pause(&admin()).unwrap();
        let err = fx
            .detector
            .comprehensive_analysis(&monitor(), &fx.ledger, id)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Paused);
        assert!(fx.detector.price_history(id).is_none());
    }

    #[test]
    fn test_configuration_surface() {
        let mut fx = fixture();

        let err = fx
            .detector
            .set_expected_durations(&admin(), &[1, 2, 3])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        fx.detector
            .set_expected_durations(&admin(), &[10, 20, 30, 40, 50, 60, 70, 80])
            .unwrap();
        assert_eq!(fx.detector.config().expected_durations_minutes[7], 80);

        let err = fx
            .detector
            .set_expected_durations(&farmer(), &[0; 8])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        let bad = DetectionConfig {
            max_violations: 0,
            ..DetectionConfig::default()
        };
        assert!(fx.detector.update_config(&admin(), bad).is_err());
        assert_eq!(fx.detector.config().max_violations, 3);
    }
}
