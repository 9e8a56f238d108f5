//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Stage authorization: the ledger agrees with the static role table
//! - Monotonic progression: stage never decreases
//! - Sequential ids: allocated 1..=n and never reused after erasure
//! - Idempotent reads: repeated reads return identical records

use ledger_core::{
    access::stage_permitted, AccessRegistry, ActorId, Amount, Config, ContentHash, Error,
    ErrorKind, ProductId, ProductLedger, ProductSource, Role, RoleSet, Stage,
};
use proptest::prelude::*;
use std::sync::Arc;

/// Strategy for generating stages
fn stage_strategy() -> impl Strategy<Value = Stage> {
    (0u8..9).prop_map(|i| Stage::from_index(i).unwrap())
}

/// Strategy for generating supply-chain roles
fn role_strategy() -> impl Strategy<Value = Role> {
    prop_oneof![
        Just(Role::Producer),
        Just(Role::IntermediateHandler),
        Just(Role::FinalHandler),
        Just(Role::Regulator),
        Just(Role::Auditor),
    ]
}

/// Strategy for generating positive prices in minor units
fn price_strategy() -> impl Strategy<Value = Amount> {
    (1u128..1_000_000_000_000u128).prop_map(Amount::from_minor)
}

fn admin() -> ActorId {
    ActorId::new("admin")
}

fn farmer() -> ActorId {
    ActorId::new("farmer")
}

/// Registry with one producer and an empty ledger
fn create_test_ledger(enforce_monotonic: bool) -> (Arc<AccessRegistry>, ProductLedger) {
    let registry = Arc::new(AccessRegistry::new(admin()));
    registry.grant_role(&admin(), &farmer(), Role::Producer).unwrap();

    let config = Config {
        enforce_monotonic_stages: enforce_monotonic,
        ..Config::default()
    };
    let ledger = ProductLedger::new(config, registry.clone());
    (registry, ledger)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: advance_stage succeeds exactly when the role table permits
    #[test]
    fn prop_stage_authorization_matches_table(role in role_strategy(), stage in stage_strategy()) {
        let (registry, mut ledger) = create_test_ledger(false);
        let caller = ActorId::new("caller");
        registry.grant_role(&admin(), &caller, role).unwrap();

        let id = ledger
            .create(&farmer(), 10, Amount::from_units(1), ContentHash::ZERO, vec![])
            .unwrap();
        let result = ledger.advance_stage(&caller, id, stage);

        if stage_permitted(RoleSet::of(&[role]), stage) {
            prop_assert!(result.is_ok());
            prop_assert_eq!(ledger.get(id).unwrap().stage, stage);
        } else {
            prop_assert_eq!(result.unwrap_err().kind(), ErrorKind::Authorization);
            prop_assert_eq!(ledger.get(id).unwrap().stage, Stage::Planted);
        }
    }

    /// Property: with monotonic enforcement the stage never decreases
    #[test]
    fn prop_stage_never_decreases(stages in prop::collection::vec(stage_strategy(), 1..30)) {
        let (registry, mut ledger) = create_test_ledger(true);
        let regulator = ActorId::new("regulator");
        registry.grant_role(&admin(), &regulator, Role::Regulator).unwrap();

        let id = ledger
            .create(&farmer(), 10, Amount::from_units(1), ContentHash::ZERO, vec![])
            .unwrap();

        let mut highest = Stage::Planted;
        for stage in stages {
            let result = ledger.advance_stage(&regulator, id, stage);
            if stage >= highest {
                prop_assert!(result.is_ok());
                highest = stage;
            } else {
                let is_regression = matches!(result, Err(Error::StageRegression { .. }));
                prop_assert!(is_regression);
            }
            prop_assert_eq!(ledger.get(id).unwrap().stage, highest);
        }
    }

    /// Property: new products start Planted, owned by the caller, with the
    /// next sequential id
    #[test]
    fn prop_create_initial_state(
        quantity in 1u64..1_000_000,
        prices in prop::collection::vec(price_strategy(), 1..20),
    ) {
        let (_registry, mut ledger) = create_test_ledger(true);

        for (i, price) in prices.iter().enumerate() {
            let id = ledger
                .create(&farmer(), quantity, *price, ContentHash::ZERO, vec![])
                .unwrap();
            prop_assert_eq!(id, ProductId::new(i as u64 + 1));

            let record = ledger.get(id).unwrap();
            prop_assert_eq!(record.stage, Stage::Planted);
            prop_assert_eq!(&record.owner, &farmer());
            prop_assert_eq!(record.price, *price);
        }
        prop_assert_eq!(ledger.products_of(&farmer()).len(), prices.len());
    }

    /// Property: ids are never reused after erasure
    #[test]
    fn prop_ids_never_reused(count in 1usize..20) {
        let (registry, mut ledger) = create_test_ledger(true);
        let regulator = ActorId::new("regulator");
        registry.grant_role(&admin(), &regulator, Role::Regulator).unwrap();

        for _ in 0..count {
            let id = ledger
                .create(&farmer(), 1, Amount::from_units(1), ContentHash::ZERO, vec![])
                .unwrap();
            ledger.erase(&regulator, id).unwrap();
        }

        let next = ledger
            .create(&farmer(), 1, Amount::from_units(1), ContentHash::ZERO, vec![])
            .unwrap();
        prop_assert_eq!(next, ProductId::new(count as u64 + 1));
        prop_assert_eq!(ledger.product_count(), 1);
    }

    /// Property: reads are idempotent
    #[test]
    fn prop_reads_idempotent(price in price_strategy(), reads in 1usize..10) {
        let (_registry, mut ledger) = create_test_ledger(true);
        let id = ledger
            .create(&farmer(), 5, price, ContentHash::digest("field-7"), vec![])
            .unwrap();

        let first = ledger.product(id).unwrap();
        for _ in 0..reads {
            prop_assert_eq!(&ledger.product(id).unwrap(), &first);
        }
    }
}

#[cfg(test)]
mod integration_tests {
    use super::*;
    use ledger_core::{LedgerEvent, ManualClock, MemorySink};

    #[test]
    fn test_full_custody_chain() {
        let registry = Arc::new(AccessRegistry::new(admin()));
        let processor = ActorId::new("processor");
        let retailer = ActorId::new("retailer");
        registry.grant_role(&admin(), &farmer(), Role::Producer).unwrap();
        registry
            .grant_role(&admin(), &processor, Role::IntermediateHandler)
            .unwrap();
        registry.grant_role(&admin(), &retailer, Role::FinalHandler).unwrap();

        let sink = Arc::new(MemorySink::<LedgerEvent>::new());
        let mut ledger = ProductLedger::new(Config::default(), registry.clone())
            .with_clock(Arc::new(ManualClock::default()))
            .with_event_sink(sink.clone());

        // 1. Producer registers the harvest
        let id = ledger
            .create(&farmer(), 500, Amount::from_units(2), ContentHash::digest("plot-12"), vec![])
            .unwrap();
        ledger.advance_stage(&farmer(), id, Stage::Growing).unwrap();
        ledger.advance_stage(&farmer(), id, Stage::Harvested).unwrap();

        // 2. Sold to the processor
        ledger
            .transfer_ownership(&farmer(), id, &processor, Amount::from_units(3))
            .unwrap();
        ledger.advance_stage(&processor, id, Stage::Processed).unwrap();
        ledger
            .record_quality(&processor, id, 4, 60, 910, ContentHash::digest("lab"), ContentHash::digest("photo"))
            .unwrap();
        ledger.advance_stage(&processor, id, Stage::Packaged).unwrap();
        ledger.advance_stage(&processor, id, Stage::InTransit).unwrap();

        // 3. Handed to the retailer
        ledger
            .transfer_ownership(&processor, id, &retailer, Amount::from_units(5))
            .unwrap();
        ledger.advance_stage(&retailer, id, Stage::Retail).unwrap();
        ledger.advance_stage(&retailer, id, Stage::Sold).unwrap();

        let record = ledger.get(id).unwrap();
        assert_eq!(record.owner, retailer);
        assert_eq!(record.stage, Stage::Sold);
        assert_eq!(record.price, Amount::from_units(5));
        assert_eq!(ledger.quality_history(id).unwrap().observations.len(), 1);
        assert_eq!(ledger.products_of(&processor), &[id]);

        // create + 7 stage changes + 2 transfers + 1 quality record
        assert_eq!(sink.len(), 11);
    }
}
