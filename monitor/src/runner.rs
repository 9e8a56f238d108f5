//! Scenario replay against a fresh registry, ledger and both engines

use crate::config::MonitorConfig;
use crate::scenario::{to_amount, Scenario, Step};
use anyhow::Context;
use chrono::{DateTime, Duration, Utc};
use fraud_engine::{FraudAssessment, FraudDetector, FraudEvent};
use ledger_core::{
    AccessRegistry, ActorId, Clock, ContentHash, LedgerEvent, ManualClock, MemorySink, ProductId,
    ProductLedger,
};
use pricing_engine::{PriceValidation, PricingEngine, PricingEvent, ProductPriceFloor};
use serde::Serialize;
use std::sync::Arc;

/// What a successful step produced
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum StepOutcome {
    /// Nothing beyond the state change
    Applied,
    /// New product id
    Created {
        /// Product id
        product_id: ProductId,
    },
    /// Published floor
    Floor(ProductPriceFloor),
    /// Accepted sale price
    Validated(PriceValidation),
    /// Fraud assessment
    Assessment(FraudAssessment),
}

/// Per-step record in the report
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    /// Position in the scenario (0-based)
    pub index: usize,
    /// Operation name
    pub op: &'static str,
    /// Outcome on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<StepOutcome>,
    /// Error message on failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Notifications collected during the replay
#[derive(Debug, Clone, Serialize)]
pub struct Notifications {
    /// Registry and ledger
    pub ledger: Vec<LedgerEvent>,
    /// Pricing engine
    pub pricing: Vec<PricingEvent>,
    /// Fraud detector
    pub fraud: Vec<FraudEvent>,
}

/// Final replay report
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Scenario name
    pub scenario: String,
    /// Steps that succeeded
    pub applied: usize,
    /// Steps that failed
    pub failed: usize,
    /// Every step in order
    pub steps: Vec<StepReport>,
    /// Assessments produced by `analyze` steps
    pub assessments: Vec<FraudAssessment>,
    /// Emitted notifications
    pub notifications: Notifications,
    /// Clock value after the last step
    pub finished_at: DateTime<Utc>,
}

/// Wires the three components to one clock and in-memory notification sinks
pub struct Monitor {
    admin: ActorId,
    clock: Arc<ManualClock>,
    registry: Arc<AccessRegistry>,
    ledger: ProductLedger,
    pricing: PricingEngine,
    fraud: FraudDetector,
    ledger_events: Arc<MemorySink<LedgerEvent>>,
    pricing_events: Arc<MemorySink<PricingEvent>>,
    fraud_events: Arc<MemorySink<FraudEvent>>,
}

impl Monitor {
    /// Build a fresh system for `scenario`
    pub fn new(config: MonitorConfig, scenario: &Scenario) -> anyhow::Result<Self> {
        let clock = Arc::new(ManualClock::new(scenario.start.unwrap_or_default()));
        let ledger_events = Arc::new(MemorySink::new());
        let pricing_events = Arc::new(MemorySink::new());
        let fraud_events = Arc::new(MemorySink::new());

        let registry = Arc::new(
            AccessRegistry::new(scenario.admin.clone())
                .with_clock(clock.clone())
                .with_event_sink(ledger_events.clone()),
        );
        let ledger = ProductLedger::new(config.ledger, registry.clone())
            .with_clock(clock.clone())
            .with_event_sink(ledger_events.clone());
        let pricing = PricingEngine::new(config.pricing, registry.clone())?
            .with_clock(clock.clone())
            .with_event_sink(pricing_events.clone());
        let fraud = FraudDetector::new(config.detection, registry.clone())?
            .with_clock(clock.clone())
            .with_event_sink(fraud_events.clone());

        Ok(Self {
            admin: scenario.admin.clone(),
            clock,
            registry,
            ledger,
            pricing,
            fraud,
            ledger_events,
            pricing_events,
            fraud_events,
        })
    }

    /// Replay every step; failures are recorded and the replay continues
    pub fn run(mut self, scenario: &Scenario) -> Report {
        tracing::info!(scenario = %scenario.name, steps = scenario.steps.len(), "Replaying scenario");

        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut assessments = Vec::new();

        for (index, step) in scenario.steps.iter().enumerate() {
            match self.apply(step) {
                Ok(outcome) => {
                    if let StepOutcome::Assessment(assessment) = &outcome {
                        assessments.push(assessment.clone());
                    }
                    steps.push(StepReport {
                        index,
                        op: step.op(),
                        outcome: Some(outcome),
                        error: None,
                    });
                }
                Err(e) => {
                    tracing::warn!(index, op = step.op(), error = %format!("{:#}", e), "Step failed");
                    steps.push(StepReport {
                        index,
                        op: step.op(),
                        outcome: None,
                        error: Some(format!("{:#}", e)),
                    });
                }
            }
        }

        let failed = steps.iter().filter(|s| s.error.is_some()).count();
        tracing::info!(
            scenario = %scenario.name,
            applied = steps.len() - failed,
            failed,
            products = self.ledger.product_count(),
            "Scenario finished"
        );

        Report {
            scenario: scenario.name.clone(),
            applied: steps.len() - failed,
            failed,
            steps,
            assessments,
            notifications: Notifications {
                ledger: self.ledger_events.take(),
                pricing: self.pricing_events.take(),
                fraud: self.fraud_events.take(),
            },
            finished_at: self.clock.now(),
        }
    }

    fn apply(&mut self, step: &Step) -> anyhow::Result<StepOutcome> {
        let outcome = match step {
            Step::GrantRole { actor, role } => {
                self.registry.grant_role(&self.admin, actor, *role)?;
                StepOutcome::Applied
            }
            Step::Register { actor } => {
                self.pricing.register(&self.admin, actor)?;
                StepOutcome::Applied
            }
            Step::Create {
                actor,
                quantity,
                price,
                location,
            } => {
                let product_id = self.ledger.create(
                    actor,
                    *quantity,
                    to_amount(*price)?,
                    ContentHash::digest(location),
                    Vec::new(),
                )?;
                StepOutcome::Created { product_id }
            }
            Step::Advance {
                actor,
                product,
                stage,
            } => {
                self.ledger
                    .advance_stage(actor, ProductId::new(*product), *stage)?;
                StepOutcome::Applied
            }
            Step::Transfer {
                actor,
                product,
                to,
                price,
            } => {
                self.ledger
                    .transfer_ownership(actor, ProductId::new(*product), to, to_amount(*price)?)?;
                StepOutcome::Applied
            }
            Step::SetFloor {
                actor,
                product,
                price,
            } => StepOutcome::Floor(self.pricing.set_floor(
                actor,
                &self.ledger,
                ProductId::new(*product),
                to_amount(*price)?,
            )?),
            Step::Validate {
                actor,
                product,
                price,
                producer,
            } => StepOutcome::Validated(self.pricing.validate(
                actor,
                &self.ledger,
                ProductId::new(*product),
                to_amount(*price)?,
                producer,
            )?),
            Step::Analyze { actor, product } => StepOutcome::Assessment(
                self.fraud
                    .comprehensive_analysis(actor, &self.ledger, ProductId::new(*product))?,
            ),
            Step::AdvanceClock { minutes } => {
                if *minutes < 0 {
                    anyhow::bail!("clock cannot move backwards ({} minutes)", minutes);
                }
                Duration::try_minutes(*minutes)
                    .and_then(|by| self.clock.advance(by))
                    .with_context(|| format!("clock cannot advance by {} minutes", minutes))?;
                StepOutcome::Applied
            }
        };
        Ok(outcome)
    }
}

impl std::fmt::Debug for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Monitor")
            .field("admin", &self.admin)
            .field("ledger", &self.ledger)
            .field("pricing", &self.pricing)
            .field("fraud", &self.fraud)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"{
        "name": "harvest and resale",
        "steps": [
            { "op": "grant_role", "actor": "farmer", "role": "Producer" },
            { "op": "grant_role", "actor": "oracle", "role": "PriceOracle" },
            { "op": "register", "actor": "farmer" },
            { "op": "create", "actor": "farmer", "quantity": 100, "price": "100", "location": "field-7" },
            { "op": "advance", "actor": "farmer", "product": 1, "stage": "Growing" },
            { "op": "set_floor", "actor": "oracle", "product": 1, "price": "90" },
            { "op": "validate", "actor": "farmer", "product": 1, "price": "95", "producer": "farmer" },
            { "op": "validate", "actor": "farmer", "product": 1, "price": "50", "producer": "farmer" },
            { "op": "analyze", "actor": "auditor", "product": 1 },
            { "op": "analyze", "actor": "auditor", "product": 1 },
            { "op": "analyze", "actor": "auditor", "product": 1 },
            { "op": "analyze", "actor": "auditor", "product": 1 },
            { "op": "transfer", "actor": "farmer", "product": 1, "to": "trader", "price": "1000" },
            { "op": "advance_clock", "minutes": 129600 },
            { "op": "analyze", "actor": "auditor", "product": 1 },
            { "op": "advance", "actor": "trader", "product": 1, "stage": "Harvested" }
        ]
    }"#;

    fn replay(json: &str) -> Report {
        let scenario = Scenario::from_json(json).unwrap();
        Monitor::new(MonitorConfig::default(), &scenario)
            .unwrap()
            .run(&scenario)
    }

    #[test]
    fn test_replay_reports_failures_and_continues() {
        let report = replay(SCENARIO);

        assert_eq!(report.steps.len(), 16);
        // Underpriced validation and the trader's unauthorized stage change
        assert_eq!(report.failed, 2);
        assert!(report.steps[7].error.is_some());
        assert!(report.steps[15].error.is_some());
        assert!(matches!(
            report.steps[3].outcome,
            Some(StepOutcome::Created { product_id }) if product_id == ProductId::new(1)
        ));
    }

    #[test]
    fn test_replay_flags_resale() {
        let report = replay(SCENARIO);

        assert_eq!(report.assessments.len(), 5);
        let last = report.assessments.last().unwrap();
        assert_eq!(last.owner, ActorId::new("trader"));
        assert_eq!(last.risk_score, 9500);
        assert!(last.owner_blacklisted);

        assert!(report
            .notifications
            .fraud
            .iter()
            .any(|e| matches!(e, FraudEvent::ActorBlacklisted { .. })));
        assert!(!report.notifications.pricing.is_empty());
        assert!(!report.notifications.ledger.is_empty());
    }

    #[test]
    fn test_negative_clock_step_rejected() {
        let report = replay(
            r#"{ "name": "rewind", "steps": [ { "op": "advance_clock", "minutes": -5 } ] }"#,
        );
        assert_eq!(report.failed, 1);
    }

    #[test]
    fn test_out_of_range_clock_step_rejected() {
        let report = replay(
            r#"{
                "name": "far future",
                "steps": [
                    { "op": "advance_clock", "minutes": 1000000000000 },
                    { "op": "advance_clock", "minutes": 60 }
                ]
            }"#,
        );

        assert_eq!(report.failed, 1);
        assert!(report.steps[0].error.is_some());
        assert_eq!(
            report.finished_at,
            DateTime::<Utc>::default() + Duration::minutes(60)
        );
    }
}
