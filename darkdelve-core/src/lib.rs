//! Darkdelve rule-system engine.
//!
//! This crate is the rules half of a virtual-tabletop plugin: given a
//! semantic roll request (ability check, weapon attack, spell cast, NPC
//! attack, hit-point roll), it builds the dice formula, applies
//! advantage to the primary die, detects criticals, derives secondary
//! damage rolls, and packages the result for the host's chat log. The
//! host platform's own services (dice evaluation, templating, chat,
//! localization, dialogs, 3-D dice) are injected capabilities; see
//! [`host`].
//!
//! # Quick Start
//!
//! ```ignore
//! use darkdelve_core::{Advantage, Resolver, RollData, RollOptions, RollPart, RollRequest};
//!
//! let resolver = Resolver::new(&platform);
//! let request = RollRequest::ability(
//!     vec![RollPart::from("1d20"), RollPart::from("@abilityBonus")],
//!     RollData::new().with_bonus("abilityBonus", 2.0),
//! );
//! let outcome = resolver
//!     .resolve_roll(&request, None, Advantage::Normal, &RollOptions::new().fast_forward())
//!     .await?;
//! ```

pub mod chat;
pub mod dice;
pub mod documents;
pub mod host;
pub mod request;
pub mod resolver;
pub mod testing;

// Primary public API
pub use chat::{ChatPresentation, DEFAULT_CHAT_TEMPLATE};
pub use dice::{
    apply_advantage, digest_parts, is_d20, Advantage, DiceError, DiceTerm, DieSize, EvaluatedRoll,
    RollPart, StandardDiceEngine,
};
pub use documents::{
    Actor, ActorBonuses, ActorKind, CriticalThresholds, Grip, Item, ItemKind, NpcAttackData,
    SpellData, WeaponData,
};
pub use host::{ChatMessage, DialogSubmission, Host, HostError, RollMode};
pub use request::{FormData, RequestError, RollData, RollKind, RollOptions, RollRequest};
pub use resolver::{
    Critical, DamageResolution, Evaluation, ResolveError, Resolver, RollOutcome, TargetCheck,
};
