//! Actor registry and access policy
//!
//! Every mutating entry point in the workspace asks an [`AccessPolicy`] for a
//! [`Decision`] before touching state. The policy is the only place that knows
//! which roles may do what; the ledger, pricing and fraud components never
//! inline role checks.
//!
//! # Stage permissions
//!
//! | Destination stage | Permitted roles |
//! |---|---|
//! | any | Regulator |
//! | Planted, Growing, Harvested | Producer |
//! | Processed, Packaged | Producer, IntermediateHandler |
//! | InTransit, Distributed | IntermediateHandler |
//! | Retail, Sold | FinalHandler |

use crate::clock::{Clock, SystemClock};
use crate::events::{EventSink, LedgerEvent, TracingSink};
use crate::types::{ActorId, Stage};
use crate::{Error, Result};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Role held by an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// Farmer / grower
    Producer = 0,
    /// Processor or distributor
    IntermediateHandler = 1,
    /// Retailer
    FinalHandler = 2,
    /// Regulator (may move any stage, may erase records)
    Regulator = 3,
    /// Auditor
    Auditor = 4,
    /// Administrator of configuration, roles and the pause switch
    Admin = 5,
    /// Publishes product price floors
    PriceOracle = 6,
    /// Rates producers on behalf of the protection scheme
    ProducerProtection = 7,
    /// Resolves fraud findings
    FraudAnalyst = 8,
}

impl Role {
    /// Every role
    pub const ALL: [Role; 9] = [
        Role::Producer,
        Role::IntermediateHandler,
        Role::FinalHandler,
        Role::Regulator,
        Role::Auditor,
        Role::Admin,
        Role::PriceOracle,
        Role::ProducerProtection,
        Role::FraudAnalyst,
    ];

    fn bit(self) -> u16 {
        1 << (self as u8)
    }

    /// Role name
    pub fn name(&self) -> &'static str {
        match self {
            Role::Producer => "producer",
            Role::IntermediateHandler => "intermediate_handler",
            Role::FinalHandler => "final_handler",
            Role::Regulator => "regulator",
            Role::Auditor => "auditor",
            Role::Admin => "admin",
            Role::PriceOracle => "price_oracle",
            Role::ProducerProtection => "producer_protection",
            Role::FraudAnalyst => "fraud_analyst",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Set of roles, stored as a bitmask
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct RoleSet(u16);

impl RoleSet {
    /// No roles
    pub const EMPTY: RoleSet = RoleSet(0);

    /// Set containing the given roles
    pub fn of(roles: &[Role]) -> Self {
        roles.iter().copied().collect()
    }

    /// Add a role. Returns false if it was already present.
    pub fn insert(&mut self, role: Role) -> bool {
        let had = self.contains(role);
        self.0 |= role.bit();
        !had
    }

    /// Remove a role. Returns false if it was absent.
    pub fn remove(&mut self, role: Role) -> bool {
        let had = self.contains(role);
        self.0 &= !role.bit();
        had
    }

    /// Whether the role is present
    pub fn contains(&self, role: Role) -> bool {
        self.0 & role.bit() != 0
    }

    /// Whether any role of `other` is present
    pub fn intersects(&self, other: RoleSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the set is empty
    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Iterate roles in declaration order
    pub fn iter(&self) -> impl Iterator<Item = Role> + '_ {
        Role::ALL.into_iter().filter(|role| self.contains(*role))
    }
}

impl FromIterator<Role> for RoleSet {
    fn from_iter<I: IntoIterator<Item = Role>>(iter: I) -> Self {
        let mut set = RoleSet::EMPTY;
        for role in iter {
            set.insert(role);
        }
        set
    }
}

impl fmt::Display for RoleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.iter().map(|role| role.name()).collect();
        write!(f, "{}", names.join("|"))
    }
}

/// Roles (other than Regulator) allowed to move a product into `stage`.
pub fn roles_for_stage(stage: Stage) -> RoleSet {
    match stage {
        Stage::Planted | Stage::Growing | Stage::Harvested => RoleSet::of(&[Role::Producer]),
        Stage::Processed | Stage::Packaged => {
            RoleSet::of(&[Role::Producer, Role::IntermediateHandler])
        }
        Stage::InTransit | Stage::Distributed => RoleSet::of(&[Role::IntermediateHandler]),
        Stage::Retail | Stage::Sold => RoleSet::of(&[Role::FinalHandler]),
    }
}

/// Whether an actor holding `roles` may move a product into `stage`.
///
/// Evaluated against the destination only; progression rules live in the
/// ledger.
pub fn stage_permitted(roles: RoleSet, stage: Stage) -> bool {
    roles.contains(Role::Regulator) || roles.intersects(roles_for_stage(stage))
}

/// Operation a caller is attempting
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    /// Register a new product
    CreateProduct,
    /// Move a product into a stage
    AdvanceStage(Stage),
    /// Append a quality observation
    RecordQuality,
    /// Transfer a product held by `owner`
    TransferOwnership {
        /// Current owner
        owner: &'a ActorId,
    },
    /// Attach a document to a product held by `owner`
    AttachContent {
        /// Current owner
        owner: &'a ActorId,
    },
    /// Erase a product and its history
    EraseProduct,
    /// Grant or revoke roles
    ManageRoles,
    /// Pause or unpause all mutations
    TogglePause,
    /// Register or reactivate a producer profile
    RegisterProducer,
    /// Rate a producer
    RateProducer,
    /// Publish a product price floor
    SetPriceFloor,
    /// Validate a price on behalf of `producer`
    ValidatePrice {
        /// Producer being paid
        producer: &'a ActorId,
    },
    /// Change pricing configuration
    ConfigurePricing,
    /// Run fraud analysis on a product
    AnalyzeFraud,
    /// Resolve an anomaly or violation
    ResolveFinding,
    /// Remove an actor from the blacklist
    ManageBlacklist,
    /// Change detection configuration
    ConfigureDetection,
}

impl Action<'_> {
    /// Short name for logs
    pub fn name(&self) -> &'static str {
        match self {
            Action::CreateProduct => "create_product",
            Action::AdvanceStage(_) => "advance_stage",
            Action::RecordQuality => "record_quality",
            Action::TransferOwnership { .. } => "transfer_ownership",
            Action::AttachContent { .. } => "attach_content",
            Action::EraseProduct => "erase_product",
            Action::ManageRoles => "manage_roles",
            Action::TogglePause => "toggle_pause",
            Action::RegisterProducer => "register_producer",
            Action::RateProducer => "rate_producer",
            Action::SetPriceFloor => "set_price_floor",
            Action::ValidatePrice { .. } => "validate_price",
            Action::ConfigurePricing => "configure_pricing",
            Action::AnalyzeFraud => "analyze_fraud",
            Action::ResolveFinding => "resolve_finding",
            Action::ManageBlacklist => "manage_blacklist",
            Action::ConfigureDetection => "configure_detection",
        }
    }

    /// Unpausing has to work while paused
    fn bypasses_pause(&self) -> bool {
        matches!(self, Action::TogglePause)
    }

    fn requirement(&self) -> Requirement<'_> {
        match self {
            Action::CreateProduct => Requirement::AnyOf(RoleSet::of(&[Role::Producer])),
            Action::AdvanceStage(stage) => Requirement::Stage(*stage),
            Action::RecordQuality => Requirement::AnyOf(RoleSet::of(&[
                Role::Producer,
                Role::IntermediateHandler,
                Role::FinalHandler,
                Role::Regulator,
                Role::Auditor,
            ])),
            Action::TransferOwnership { owner } | Action::AttachContent { owner } => {
                Requirement::Owner(*owner)
            }
            Action::EraseProduct => Requirement::AnyOf(RoleSet::of(&[Role::Regulator])),
            Action::ManageRoles
            | Action::TogglePause
            | Action::RegisterProducer
            | Action::ConfigurePricing
            | Action::ManageBlacklist
            | Action::ConfigureDetection => Requirement::AnyOf(RoleSet::of(&[Role::Admin])),
            Action::RateProducer => {
                Requirement::AnyOf(RoleSet::of(&[Role::ProducerProtection]))
            }
            Action::SetPriceFloor => Requirement::AnyOf(RoleSet::of(&[Role::PriceOracle])),
            Action::ValidatePrice { producer } => Requirement::OwnerOrAnyOf(
                *producer,
                RoleSet::of(&[Role::ProducerProtection, Role::Admin]),
            ),
            Action::AnalyzeFraud => Requirement::Open,
            Action::ResolveFinding => Requirement::AnyOf(RoleSet::of(&[Role::FraudAnalyst])),
        }
    }
}

enum Requirement<'a> {
    Open,
    AnyOf(RoleSet),
    Stage(Stage),
    Owner(&'a ActorId),
    OwnerOrAnyOf(&'a ActorId, RoleSet),
}

/// Why a call was denied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenialReason {
    /// Mutations are paused
    Paused,
    /// Caller holds none of the required roles
    MissingRole {
        /// Roles that would have been accepted
        required: RoleSet,
    },
    /// Caller is not the owner
    NotOwner,
    /// Recipient is the sentinel identity
    InvalidRecipient,
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Paused => write!(f, "paused"),
            DenialReason::MissingRole { required } => write!(f, "requires one of {}", required),
            DenialReason::NotOwner => write!(f, "caller is not the owner"),
            DenialReason::InvalidRecipient => write!(f, "recipient is the sentinel identity"),
        }
    }
}

/// Outcome of a policy check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Go ahead
    Allowed,
    /// Rejected
    Denied(DenialReason),
}

impl Decision {
    /// Whether the call may proceed
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allowed)
    }

    /// Convert into a ledger result for `caller`
    pub fn into_result(self, caller: &ActorId) -> Result<()> {
        match self {
            Decision::Allowed => Ok(()),
            Decision::Denied(reason) => Err(Error::denied(caller, reason)),
        }
    }
}

/// Pure policy evaluation, independent of any registry
pub fn evaluate(roles: RoleSet, paused: bool, caller: &ActorId, action: &Action<'_>) -> Decision {
    if paused && !action.bypasses_pause() {
        return Decision::Denied(DenialReason::Paused);
    }

    let reason = match action.requirement() {
        Requirement::Open => return Decision::Allowed,
        Requirement::AnyOf(required) => {
            if roles.intersects(required) {
                return Decision::Allowed;
            }
            DenialReason::MissingRole { required }
        }
        Requirement::Stage(stage) => {
            if stage_permitted(roles, stage) {
                return Decision::Allowed;
            }
            let mut required = roles_for_stage(stage);
            required.insert(Role::Regulator);
            DenialReason::MissingRole { required }
        }
        Requirement::Owner(owner) => {
            if caller == owner && !caller.is_sentinel() {
                return Decision::Allowed;
            }
            DenialReason::NotOwner
        }
        Requirement::OwnerOrAnyOf(owner, required) => {
            if (caller == owner && !caller.is_sentinel()) || roles.intersects(required) {
                return Decision::Allowed;
            }
            DenialReason::MissingRole { required }
        }
    };

    Decision::Denied(reason)
}

/// Role-check contract consumed by the ledger, pricing and fraud components
pub trait AccessPolicy: Send + Sync {
    /// Roles currently held by `actor`
    fn roles_of(&self, actor: &ActorId) -> RoleSet;

    /// Whether mutations are paused
    fn is_paused(&self) -> bool;

    /// Whether `actor` holds `role`
    fn has_role(&self, actor: &ActorId, role: Role) -> bool {
        self.roles_of(actor).contains(role)
    }

    /// Structured authorization decision for `caller` attempting `action`
    fn authorize(&self, caller: &ActorId, action: &Action<'_>) -> Decision {
        evaluate(self.roles_of(caller), self.is_paused(), caller, action)
    }

    /// Fail with [`Error::Paused`] while mutations are paused
    fn ensure_active(&self) -> Result<()> {
        if self.is_paused() {
            return Err(Error::Paused);
        }
        Ok(())
    }

    /// Authorize and convert a denial into an error
    fn require(&self, caller: &ActorId, action: &Action<'_>) -> Result<()> {
        let decision = self.authorize(caller, action);
        if let Decision::Denied(reason) = decision {
            tracing::warn!(
                actor = %caller,
                action = action.name(),
                %reason,
                "Access denied"
            );
        }
        decision.into_result(caller)
    }
}

/// In-memory actor registry holding roles and the global pause switch
pub struct AccessRegistry {
    roles: RwLock<HashMap<ActorId, RoleSet>>,
    paused: AtomicBool,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink<LedgerEvent>>,
}

impl AccessRegistry {
    /// Create a registry whose only member is `admin`
    pub fn new(admin: ActorId) -> Self {
        let mut roles = HashMap::new();
        roles.insert(admin, RoleSet::of(&[Role::Admin]));

        Self {
            roles: RwLock::new(roles),
            paused: AtomicBool::new(false),
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingSink),
        }
    }

    /// Use a different clock for notification timestamps
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send notifications to `sink`
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink<LedgerEvent>>) -> Self {
        self.events = sink;
        self
    }

    /// Grant `role` to `actor`
    pub fn grant_role(&self, caller: &ActorId, actor: &ActorId, role: Role) -> Result<()> {
        self.require(caller, &Action::ManageRoles)?;
        if actor.is_sentinel() {
            return Err(Error::InvalidActor);
        }

        let mut roles = self.roles.write();
        let held = roles.entry(actor.clone()).or_default();
        if !held.insert(role) {
            return Err(Error::RoleAlreadyGranted {
                actor: actor.clone(),
                role,
            });
        }
        drop(roles);

        tracing::info!(%actor, %role, by = %caller, "Role granted");
        self.events.emit(&LedgerEvent::RoleGranted {
            actor: actor.clone(),
            role,
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Revoke `role` from `actor`
    pub fn revoke_role(&self, caller: &ActorId, actor: &ActorId, role: Role) -> Result<()> {
        self.require(caller, &Action::ManageRoles)?;

        let mut roles = self.roles.write();
        let removed = roles
            .get_mut(actor)
            .map(|held| held.remove(role))
            .unwrap_or(false);
        if !removed {
            return Err(Error::RoleNotHeld {
                actor: actor.clone(),
                role,
            });
        }
        roles.retain(|_, held| !held.is_empty());
        drop(roles);

        tracing::info!(%actor, %role, by = %caller, "Role revoked");
        self.events.emit(&LedgerEvent::RoleRevoked {
            actor: actor.clone(),
            role,
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Reject all mutations until unpaused
    pub fn pause(&self, caller: &ActorId) -> Result<()> {
        self.require(caller, &Action::TogglePause)?;
        if self.paused.swap(true, Ordering::SeqCst) {
            return Err(Error::AlreadyPaused);
        }

        tracing::warn!(by = %caller, "Mutations paused");
        self.events.emit(&LedgerEvent::Paused {
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Resume mutations
    pub fn unpause(&self, caller: &ActorId) -> Result<()> {
        self.require(caller, &Action::TogglePause)?;
        if !self.paused.swap(false, Ordering::SeqCst) {
            return Err(Error::NotPaused);
        }

        tracing::info!(by = %caller, "Mutations resumed");
        self.events.emit(&LedgerEvent::Unpaused {
            by: caller.clone(),
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Number of actors holding at least one role
    pub fn member_count(&self) -> usize {
        self.roles.read().len()
    }
}

impl AccessPolicy for AccessRegistry {
    fn roles_of(&self, actor: &ActorId) -> RoleSet {
        self.roles.read().get(actor).copied().unwrap_or_default()
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for AccessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessRegistry")
            .field("members", &self.member_count())
            .field("paused", &self.is_paused())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::MemorySink;
    use crate::ErrorKind;

    fn admin() -> ActorId {
        ActorId::new("admin")
    }

    #[test]
    fn test_stage_table() {
        let producer = RoleSet::of(&[Role::Producer]);
        let handler = RoleSet::of(&[Role::IntermediateHandler]);
        let retailer = RoleSet::of(&[Role::FinalHandler]);
        let regulator = RoleSet::of(&[Role::Regulator]);

        assert!(stage_permitted(producer, Stage::Harvested));
        assert!(stage_permitted(producer, Stage::Packaged));
        assert!(!stage_permitted(producer, Stage::InTransit));

        assert!(stage_permitted(handler, Stage::Processed));
        assert!(stage_permitted(handler, Stage::Distributed));
        assert!(!stage_permitted(handler, Stage::Growing));
        assert!(!stage_permitted(handler, Stage::Retail));

        assert!(stage_permitted(retailer, Stage::Sold));
        assert!(!stage_permitted(retailer, Stage::Packaged));

        for stage in Stage::ALL {
            assert!(stage_permitted(regulator, stage));
            assert!(!stage_permitted(RoleSet::of(&[Role::Auditor]), stage));
        }
    }

    #[test]
    fn test_pause_blocks_everything_but_unpause() {
        let roles = RoleSet::of(&[Role::Admin, Role::Producer]);
        let caller = admin();

        let decision = evaluate(roles, true, &caller, &Action::CreateProduct);
        assert_eq!(decision, Decision::Denied(DenialReason::Paused));

        let decision = evaluate(roles, true, &caller, &Action::TogglePause);
        assert!(decision.is_allowed());
    }

    #[test]
    fn test_owner_requirement() {
        let owner = ActorId::new("farmer");
        let other = ActorId::new("stranger");
        let action = Action::TransferOwnership { owner: &owner };

        assert!(evaluate(RoleSet::EMPTY, false, &owner, &action).is_allowed());
        assert_eq!(
            evaluate(RoleSet::of(&[Role::Admin]), false, &other, &action),
            Decision::Denied(DenialReason::NotOwner)
        );
    }

    #[test]
    fn test_grant_and_revoke() {
        let sink = Arc::new(MemorySink::<LedgerEvent>::new());
        let registry = AccessRegistry::new(admin()).with_event_sink(sink.clone());
        let farmer = ActorId::new("farmer");

        registry.grant_role(&admin(), &farmer, Role::Producer).unwrap();
        assert!(registry.has_role(&farmer, Role::Producer));

        let err = registry.grant_role(&admin(), &farmer, Role::Producer).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StateConflict);

        let err = registry.grant_role(&farmer, &farmer, Role::Admin).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);

        registry.revoke_role(&admin(), &farmer, Role::Producer).unwrap();
        assert!(!registry.has_role(&farmer, Role::Producer));
        assert_eq!(registry.member_count(), 1);

        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_pause_cycle() {
        let registry = AccessRegistry::new(admin());

        registry.pause(&admin()).unwrap();
        assert!(registry.is_paused());
        assert!(matches!(registry.pause(&admin()), Err(Error::AlreadyPaused)));

        // Role management is a mutation too
        let err = registry
            .grant_role(&admin(), &ActorId::new("x"), Role::Auditor)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Paused);

        registry.unpause(&admin()).unwrap();
        assert!(!registry.is_paused());
        assert!(matches!(registry.unpause(&admin()), Err(Error::NotPaused)));
    }
}
