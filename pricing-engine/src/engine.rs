//! Fair-pricing engine
//!
//! Maintains producer profiles and per-product price floors, and gates every
//! proposed transaction price against a minimum support price and a
//! volatility cap around the market reference.
//!
//! # Minimum support price
//!
//! ```text
//! base    = max(active product floor, global floor)
//! bonus   = base * rating / (MAX_RATING * 10)     when rating > MAX_RATING / 2
//! minimum = base + bonus
//! ```
//!
//! A perfect rating therefore earns a 10% bonus.

use crate::{
    config::{validate_threshold, PricingConfig},
    events::PricingEvent,
    types::{
        PriceQuote, PriceValidation, ProducerProfile, ProductPriceFloor, RatingEntry,
        BONUS_RATING_GATE, DEFAULT_RATING, LOW_RATING_CUTOFF, MAX_RATING, PENALTY_THRESHOLD,
    },
    Error, Result,
};
use ledger_core::{
    AccessPolicy, Action, ActorId, Amount, Clock, EventSink, ProductId, ProductSource,
    SystemClock, TracingSink, BASIS_POINTS,
};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Fair-pricing engine
pub struct PricingEngine {
    /// Global floor in minor units
    global_floor: Amount,

    /// Volatility cap in basis points
    volatility_threshold_bp: u32,

    policy: Arc<dyn AccessPolicy>,
    clock: Arc<dyn Clock>,
    events: Arc<dyn EventSink<PricingEvent>>,

    profiles: HashMap<ActorId, ProducerProfile>,
    floors: HashMap<ProductId, ProductPriceFloor>,
    ratings: HashMap<ActorId, Vec<RatingEntry>>,
    validations: HashMap<u64, PriceValidation>,
    transactions: HashMap<ActorId, Vec<u64>>,
    last_validation_id: u64,
}

impl PricingEngine {
    /// Create new pricing engine
    pub fn new(config: PricingConfig, policy: Arc<dyn AccessPolicy>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            global_floor: config.global_floor_amount()?,
            volatility_threshold_bp: config.volatility_threshold_bp,
            policy,
            clock: Arc::new(SystemClock),
            events: Arc::new(TracingSink),
            profiles: HashMap::new(),
            floors: HashMap::new(),
            ratings: HashMap::new(),
            validations: HashMap::new(),
            transactions: HashMap::new(),
            last_validation_id: 0,
        })
    }

    /// Use a different clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Send notifications to `sink`
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink<PricingEvent>>) -> Self {
        self.events = sink;
        self
    }

    /// Create a profile for `actor`, or reactivate a suspended one
    pub fn register(&mut self, caller: &ActorId, actor: &ActorId) -> Result<()> {
        self.policy.require(caller, &Action::RegisterProducer)?;
        if actor.is_sentinel() {
            return Err(ledger_core::Error::InvalidActor.into());
        }

        let now = self.clock.now();
        let reactivated = match self.profiles.get_mut(actor) {
            Some(profile) if profile.active => {
                return Err(Error::AlreadyRegistered(actor.clone()));
            }
            Some(profile) => {
                profile.active = true;
                profile.penalty_count = 0;
                profile.registered_at = now;
                true
            }
            None => {
                self.profiles
                    .insert(actor.clone(), ProducerProfile::new(actor.clone(), now));
                false
            }
        };

        tracing::info!(%actor, reactivated, "Producer registered");
        self.events.emit(&PricingEvent::ProducerRegistered {
            actor: actor.clone(),
            reactivated,
            at: now,
        });

        Ok(())
    }

    /// Apply a rating and return the producer's new average
    pub fn rate(
        &mut self,
        caller: &ActorId,
        actor: &ActorId,
        score: u16,
        reason: impl Into<String>,
    ) -> Result<u16> {
        self.policy.require(caller, &Action::RateProducer)?;
        if score > MAX_RATING {
            return Err(Error::InvalidRating {
                score,
                max: MAX_RATING,
            });
        }

        let now = self.clock.now();
        let profile = self
            .profiles
            .get_mut(actor)
            .ok_or_else(|| Error::FarmerNotRegistered(actor.clone()))?;

        profile.rating_sum += u64::from(score);
        profile.rating_count += 1;

        let mut deactivated = false;
        if score < LOW_RATING_CUTOFF {
            profile.penalty_count += 1;
            if profile.active && profile.penalty_count >= PENALTY_THRESHOLD {
                profile.active = false;
                deactivated = true;
            }
        }

        let rating = profile.current_rating();
        let penalty_count = profile.penalty_count;

        self.ratings.entry(actor.clone()).or_default().push(RatingEntry {
            score,
            reason: reason.into(),
            rated_by: caller.clone(),
            rated_at: now,
        });

        tracing::info!(%actor, score, rating, penalty_count, "Producer rated");
        self.events.emit(&PricingEvent::ProducerRated {
            actor: actor.clone(),
            score,
            rating,
            penalty_count,
            at: now,
        });

        if deactivated {
            tracing::warn!(%actor, penalty_count, "Producer deactivated");
            self.events.emit(&PricingEvent::ProducerDeactivated {
                actor: actor.clone(),
                penalty_count,
                at: now,
            });
        }

        Ok(rating)
    }

    /// Minimum support price for `actor` selling `product_id`
    pub fn minimum_price(
        &self,
        product_id: ProductId,
        actor: &ActorId,
        market_price: Amount,
    ) -> PriceQuote {
        let base = match self.floors.get(&product_id) {
            Some(floor) if floor.active => floor.minimum_price.max(self.global_floor),
            _ => self.global_floor,
        };

        let rating = self.current_rating(actor);
        let bonus = if rating > BONUS_RATING_GATE {
            let scaled = base.minor().saturating_mul(u128::from(rating));
            Amount::from_minor(scaled / (u128::from(MAX_RATING) * 10))
        } else {
            Amount::ZERO
        };

        let minimum = base.saturating_add(bonus);

        PriceQuote {
            base,
            bonus,
            minimum,
            rating,
            market_price,
            market_deviation_bp: market_price.deviation_bp(minimum),
        }
    }

    /// Accept `proposed` as the price paid to `producer` for `product_id`.
    ///
    /// The market reference is the product's current ledger price.
    pub fn validate(
        &mut self,
        caller: &ActorId,
        source: &dyn ProductSource,
        product_id: ProductId,
        proposed: Amount,
        producer: &ActorId,
    ) -> Result<PriceValidation> {
        self.policy.ensure_active()?;
        let product = source.product(product_id)?;
        self.policy
            .require(caller, &Action::ValidatePrice { producer })?;

        if !self.profiles.get(producer).map_or(false, |p| p.active) {
            return Err(Error::FarmerNotRegistered(producer.clone()));
        }

        let market_price = product.price;
        let quote = self.minimum_price(product_id, producer, market_price);

        if proposed < quote.minimum {
            tracing::warn!(
                product_id = %product_id,
                %producer,
                %proposed,
                minimum = %quote.minimum,
                "Price below minimum"
            );
            return Err(Error::InsufficientPrice {
                proposed,
                minimum: quote.minimum,
            });
        }

        if let Some(deviation_bp) = proposed.deviation_bp(market_price) {
            if deviation_bp > u128::from(self.volatility_threshold_bp) {
                tracing::warn!(
                    product_id = %product_id,
                    %proposed,
                    market = %market_price,
                    deviation_bp = deviation_bp as u64,
                    "Price too volatile"
                );
                return Err(Error::PriceTooVolatile {
                    deviation_bp,
                    threshold_bp: self.volatility_threshold_bp,
                });
            }
        }

        let now = self.clock.now();
        let id = self.last_validation_id + 1;
        self.last_validation_id = id;

        let validation = PriceValidation {
            id,
            product_id,
            producer: producer.clone(),
            price: proposed,
            minimum_price: quote.minimum,
            market_price,
            validated_at: now,
        };
        self.validations.insert(id, validation.clone());
        if let Some(profile) = self.profiles.get_mut(producer) {
            profile.transaction_count += 1;
        }
        self.transactions.entry(producer.clone()).or_default().push(id);

        tracing::info!(validation_id = id, product_id = %product_id, %producer, price = %proposed, "Price validated");
        self.events.emit(&PricingEvent::PriceValidated {
            validation_id: id,
            product_id,
            producer: producer.clone(),
            price: proposed,
            minimum_price: quote.minimum,
            at: now,
        });

        Ok(validation)
    }

    /// Publish the minimum support price for a product
    pub fn set_floor(
        &mut self,
        caller: &ActorId,
        source: &dyn ProductSource,
        product_id: ProductId,
        price: Amount,
    ) -> Result<ProductPriceFloor> {
        self.policy.require(caller, &Action::SetPriceFloor)?;
        source.product(product_id)?;
        if price.is_zero() {
            return Err(ledger_core::Error::InvalidPrice.into());
        }

        let volatility = price.deviation_bp(self.global_floor).unwrap_or(BASIS_POINTS);
        let confidence = BASIS_POINTS - volatility.min(BASIS_POINTS);

        let now = self.clock.now();
        let floor = ProductPriceFloor {
            product_id,
            minimum_price: price,
            updated_at: now,
            volatility_index: u32::try_from(volatility).unwrap_or(u32::MAX),
            // At most BASIS_POINTS
            confidence: confidence as u32,
            active: true,
        };
        self.floors.insert(product_id, floor.clone());

        tracing::info!(
            product_id = %product_id,
            %price,
            volatility_index = floor.volatility_index,
            confidence = floor.confidence,
            "Price floor set"
        );
        self.events.emit(&PricingEvent::PriceFloorSet {
            product_id,
            minimum_price: price,
            volatility_index: floor.volatility_index,
            confidence: floor.confidence,
            at: now,
        });

        Ok(floor)
    }

    /// Stop using a product floor
    pub fn deactivate_floor(&mut self, caller: &ActorId, product_id: ProductId) -> Result<()> {
        self.policy.require(caller, &Action::ConfigurePricing)?;

        let floor = self
            .floors
            .get_mut(&product_id)
            .ok_or(Error::FloorNotFound(product_id))?;
        if !floor.active {
            return Err(Error::FloorInactive(product_id));
        }

        let now = self.clock.now();
        floor.active = false;
        floor.updated_at = now;

        tracing::info!(product_id = %product_id, "Price floor deactivated");
        self.events
            .emit(&PricingEvent::PriceFloorDeactivated { product_id, at: now });
        Ok(())
    }

    /// Replace the global floor
    pub fn set_global_floor(&mut self, caller: &ActorId, price: Amount) -> Result<()> {
        self.policy.require(caller, &Action::ConfigurePricing)?;
        if price.is_zero() {
            return Err(ledger_core::Error::InvalidPrice.into());
        }

        self.global_floor = price;

        tracing::info!(%price, "Global floor updated");
        self.events.emit(&PricingEvent::GlobalFloorUpdated {
            price,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Replace the volatility cap
    pub fn set_volatility_threshold(&mut self, caller: &ActorId, threshold_bp: u32) -> Result<()> {
        self.policy.require(caller, &Action::ConfigurePricing)?;
        validate_threshold(threshold_bp)?;

        self.volatility_threshold_bp = threshold_bp;

        tracing::info!(threshold_bp, "Volatility threshold updated");
        self.events.emit(&PricingEvent::VolatilityThresholdUpdated {
            threshold_bp,
            at: self.clock.now(),
        });
        Ok(())
    }

    /// Producer profile
    pub fn profile(&self, actor: &ActorId) -> Result<&ProducerProfile> {
        self.profiles
            .get(actor)
            .ok_or_else(|| Error::FarmerNotRegistered(actor.clone()))
    }

    /// Current average rating, or the default for unknown producers
    pub fn current_rating(&self, actor: &ActorId) -> u16 {
        self.profiles
            .get(actor)
            .map_or(DEFAULT_RATING, ProducerProfile::current_rating)
    }

    /// Price floor of a product
    pub fn product_floor(&self, product_id: ProductId) -> Result<&ProductPriceFloor> {
        self.floors
            .get(&product_id)
            .ok_or(Error::FloorNotFound(product_id))
    }

    /// Validation ids recorded for a producer, oldest first
    pub fn transactions_of(&self, actor: &ActorId) -> &[u64] {
        self.transactions.get(actor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Validation record
    pub fn validation(&self, id: u64) -> Result<&PriceValidation> {
        self.validations.get(&id).ok_or(Error::ValidationNotFound(id))
    }

    /// Ratings applied to a producer, oldest first
    pub fn ratings_of(&self, actor: &ActorId) -> &[RatingEntry] {
        self.ratings.get(actor).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Global floor in effect
    pub fn global_floor(&self) -> Amount {
        self.global_floor
    }

    /// Volatility cap in effect
    pub fn volatility_threshold_bp(&self) -> u32 {
        self.volatility_threshold_bp
    }
}

impl fmt::Debug for PricingEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PricingEngine")
            .field("global_floor", &self.global_floor)
            .field("volatility_threshold_bp", &self.volatility_threshold_bp)
            .field("profiles", &self.profiles.len())
            .field("floors", &self.floors.len())
            .field("validations", &self.validations.len())
            .finish()
    }
}
