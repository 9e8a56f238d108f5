//! Product ledger and stage state machine
//!
//! The ledger is the single source of truth for product state. Pricing and
//! fraud components read it through [`ProductSource`] and never mutate it.
//!
//! # Example
//!
//! ```
//! use ledger_core::{AccessRegistry, ActorId, Amount, Config, ContentHash, ProductLedger, Role, Stage};
//! use std::sync::Arc;
//!
//! let admin = ActorId::new("admin");
//! let farmer = ActorId::new("farmer");
//! let registry = Arc::new(AccessRegistry::new(admin.clone()));
//! registry.grant_role(&admin, &farmer, Role::Producer)?;
//!
//! let mut ledger = ProductLedger::new(Config::default(), registry);
//! let id = ledger.create(&farmer, 100, Amount::from_units(2), ContentHash::ZERO, vec![])?;
//! ledger.advance_stage(&farmer, id, Stage::Growing)?;
//!
//! assert_eq!(ledger.get(id)?.stage, Stage::Growing);
//! # Ok::<(), ledger_core::Error>(())
//! ```
//!
//! # Invariants
//!
//! - Ids are sequential, start at 1 and are never reused
//! - A product's owner is never the sentinel identity
//! - With `enforce_monotonic_stages`, stage never decreases
//! - Every precondition is checked before the first write, so a failed call
//!   leaves the ledger untouched

use crate::{
    access::{AccessPolicy, Action, DenialReason},
    clock::{Clock, SystemClock},
    events::{EventSink, LedgerEvent, TracingSink},
    types::{
        ActorId, Amount, ContentHash, ProductId, ProductRecord, QualityHistory,
        QualityObservation, Stage,
    },
    Config, Error, Result,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Read contract exposed to the pricing, fraud and presentation components
pub trait ProductSource {
    /// Current record of a product. Fails for unknown or erased ids.
    fn product(&self, id: ProductId) -> Result<ProductRecord>;
}

/// Product ledger
pub struct ProductLedger {
    /// Configuration
    config: Config,

    /// Authorization policy
    policy: Arc<dyn AccessPolicy>,

    /// Time source
    clock: Arc<dyn Clock>,

    /// Notification sink
    events: Arc<dyn EventSink<LedgerEvent>>,

    /// Last allocated id
    last_id: ProductId,

    /// Product records
    products: HashMap<ProductId, ProductRecord>,

    /// Quality observations and their content hashes
    quality: HashMap<ProductId, QualityHistory>,

    /// Products created by or transferred to each actor
    by_actor: HashMap<ActorId, Vec<ProductId>>,
}

impl ProductLedger {
    /// Create an empty ledger
    pub fn new(config: Config, policy: Arc<dyn AccessPolicy>) -> Self {
        Self {
            config,
            policy,
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingSink),
            last_id: ProductId::NONE,
            products: HashMap::new(),
            quality: HashMap::new(),
            by_actor: HashMap::new(),
        }
    }

    /// Use a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send notifications to `sink`
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink<LedgerEvent>>) -> Self {
        self.events = sink;
        self
    }

    /// Configuration in effect
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Register a new product owned by the calling producer
    pub fn create(
        &mut self,
        caller: &ActorId,
        quantity: u64,
        price: Amount,
        location_hash: ContentHash,
        content_hashes: Vec<ContentHash>,
    ) -> Result<ProductId> {
        self.policy.require(caller, &Action::CreateProduct)?;

        if quantity == 0 {
            return Err(Error::InvalidQuantity);
        }
        if price.is_zero() {
            return Err(Error::InvalidPrice);
        }
        if content_hashes.len() > self.config.max_content_hashes {
            return Err(Error::ExceedsMaxContentHashes {
                limit: self.config.max_content_hashes,
            });
        }

        let now = self.clock.now();
        let id = self.last_id.next();
        self.last_id = id;

        self.products.insert(
            id,
            ProductRecord {
                id,
                created_at: now,
                updated_at: now,
                quantity,
                price,
                owner: caller.clone(),
                stage: Stage::Planted,
                location_hash,
                content_hashes,
            },
        );
        self.by_actor.entry(caller.clone()).or_default().push(id);

        tracing::info!(product_id = %id, owner = %caller, quantity, %price, "Product created");
        self.events.emit(&LedgerEvent::ProductCreated {
            product_id: id,
            owner: caller.clone(),
            quantity,
            price,
            at: now,
        });

        Ok(id)
    }

    /// Move a product into `new_stage`
    pub fn advance_stage(&mut self, caller: &ActorId, id: ProductId, new_stage: Stage) -> Result<()> {
        self.policy.ensure_active()?;
        let current = self.get(id)?.stage;
        self.policy.require(caller, &Action::AdvanceStage(new_stage))?;

        if self.config.enforce_monotonic_stages && new_stage < current {
            tracing::warn!(product_id = %id, from = %current, to = %new_stage, "Stage regression rejected");
            return Err(Error::StageRegression {
                from: current,
                to: new_stage,
            });
        }

        let now = self.clock.now();
        let record = self.record_mut(id)?;
        record.stage = new_stage;
        record.updated_at = now;

        tracing::info!(product_id = %id, from = %current, to = %new_stage, actor = %caller, "Stage advanced");
        self.events.emit(&LedgerEvent::StageAdvanced {
            product_id: id,
            from: current,
            to: new_stage,
            actor: caller.clone(),
            at: now,
        });

        Ok(())
    }

    /// Append a quality observation
    #[allow(clippy::too_many_arguments)]
    pub fn record_quality(
        &mut self,
        caller: &ActorId,
        id: ProductId,
        temperature: i32,
        humidity: u32,
        score: u16,
        certification_hash: ContentHash,
        content_hash: ContentHash,
    ) -> Result<()> {
        self.policy.require(caller, &Action::RecordQuality)?;
        self.get(id)?;

        if score > self.config.max_quality_score {
            return Err(Error::InvalidQualityScore {
                score,
                max: self.config.max_quality_score,
            });
        }

        let limit = self.config.max_content_hashes;
        let history = self.quality.entry(id).or_default();
        if history.content_hashes.len() >= limit {
            return Err(Error::ExceedsMaxContentHashes { limit });
        }

        let now = self.clock.now();
        history.observations.push(QualityObservation {
            recorded_at: now,
            temperature,
            humidity,
            score,
            certification_hash,
            recorded_by: caller.clone(),
        });
        history.content_hashes.push(content_hash);

        tracing::debug!(product_id = %id, score, temperature, humidity, "Quality recorded");
        self.events.emit(&LedgerEvent::QualityRecorded {
            product_id: id,
            score,
            recorded_by: caller.clone(),
            at: now,
        });

        Ok(())
    }

    /// Hand a product to `new_owner` at `new_price`. Only the owner may call.
    pub fn transfer_ownership(
        &mut self,
        caller: &ActorId,
        id: ProductId,
        new_owner: &ActorId,
        new_price: Amount,
    ) -> Result<()> {
        self.policy.ensure_active()?;
        let owner = self.get(id)?.owner.clone();
        self.policy
            .require(caller, &Action::TransferOwnership { owner: &owner })?;

        if new_owner.is_sentinel() {
            return Err(Error::denied(caller, DenialReason::InvalidRecipient));
        }
        if new_price.is_zero() {
            return Err(Error::InvalidPrice);
        }

        let now = self.clock.now();
        let record = self.record_mut(id)?;
        record.owner = new_owner.clone();
        record.price = new_price;
        record.updated_at = now;

        let index = self.by_actor.entry(new_owner.clone()).or_default();
        if !index.contains(&id) {
            index.push(id);
        }

        tracing::info!(product_id = %id, from = %owner, to = %new_owner, price = %new_price, "Ownership transferred");
        self.events.emit(&LedgerEvent::OwnershipTransferred {
            product_id: id,
            from: owner,
            to: new_owner.clone(),
            price: new_price,
            at: now,
        });

        Ok(())
    }

    /// Attach a document reference to a product. Only the owner may call.
    pub fn attach_content_hash(
        &mut self,
        caller: &ActorId,
        id: ProductId,
        content_hash: ContentHash,
    ) -> Result<()> {
        self.policy.ensure_active()?;
        let owner = self.get(id)?.owner.clone();
        self.policy
            .require(caller, &Action::AttachContent { owner: &owner })?;

        let limit = self.config.max_content_hashes;
        let record = self.record_mut(id)?;
        if record.content_hashes.len() >= limit {
            return Err(Error::ExceedsMaxContentHashes { limit });
        }
        record.content_hashes.push(content_hash);
        let attached = record.content_hashes.len();

        let now = self.clock.now();
        tracing::info!(product_id = %id, %content_hash, attached, "Content hash attached");
        self.events.emit(&LedgerEvent::ContentAttached {
            product_id: id,
            content_hash,
            at: now,
        });

        Ok(())
    }

    /// Irreversibly remove a product with its quality history and index
    /// entries. Regulator only.
    pub fn erase(&mut self, caller: &ActorId, id: ProductId) -> Result<()> {
        self.policy.require(caller, &Action::EraseProduct)?;
        self.get(id)?;

        let now = self.clock.now();
        self.products.remove(&id);
        self.quality.remove(&id);
        for products in self.by_actor.values_mut() {
            products.retain(|p| *p != id);
        }
        self.by_actor.retain(|_, products| !products.is_empty());

        tracing::warn!(product_id = %id, by = %caller, "Product erased");
        self.events.emit(&LedgerEvent::ProductErased {
            product_id: id,
            by: caller.clone(),
            at: now,
        });

        Ok(())
    }

    /// Borrow a product record
    pub fn get(&self, id: ProductId) -> Result<&ProductRecord> {
        self.products.get(&id).ok_or(Error::ProductNotFound(id))
    }

    /// Quality observations and their content hashes
    pub fn quality_history(&self, id: ProductId) -> Result<QualityHistory> {
        self.get(id)?;
        Ok(self.quality.get(&id).cloned().unwrap_or_default())
    }

    /// Documents attached to the product record
    pub fn content_hashes(&self, id: ProductId) -> Result<&[ContentHash]> {
        Ok(&self.get(id)?.content_hashes)
    }

    /// Products created by or transferred to `actor`
    pub fn products_of(&self, actor: &ActorId) -> &[ProductId] {
        self.by_actor.get(actor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of live (non-erased) products
    pub fn product_count(&self) -> usize {
        self.products.len()
    }

    /// Highest id allocated so far
    pub fn last_product_id(&self) -> ProductId {
        self.last_id
    }

    fn record_mut(&mut self, id: ProductId) -> Result<&mut ProductRecord> {
        self.products.get_mut(&id).ok_or(Error::ProductNotFound(id))
    }
}

impl ProductSource for ProductLedger {
    fn product(&self, id: ProductId) -> Result<ProductRecord> {
        self.get(id).cloned()
    }
}

impl<T: ProductSource + ?Sized> ProductSource for &T {
    fn product(&self, id: ProductId) -> Result<ProductRecord> {
        (**self).product(id)
    }
}

impl fmt::Debug for ProductLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProductLedger")
            .field("config", &self.config)
            .field("last_id", &self.last_id)
            .field("products", &self.products.len())
            .finish()
    }
}
