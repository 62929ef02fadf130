//! Tagged roll requests and per-roll options.
//!
//! Each roll kind carries only the documents it needs, validated at
//! construction instead of probed mid-resolution. All of this is
//! request-scoped: built for one roll, discarded after the chat message
//! is dispatched.

use crate::dice::RollPart;
use crate::documents::{Actor, CriticalThresholds, Item};
use crate::host::RollMode;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors from building a roll request.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("{kind:?} rolls require an item")]
    MissingItem { kind: RollKind },
    #[error("{kind:?} rolls need a {expected} item, got {found}")]
    ItemKindMismatch {
        kind: RollKind,
        expected: &'static str,
        found: &'static str,
    },
}

/// The semantic kind of a roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollKind {
    Ability,
    HitPoints,
    NpcAttack,
    Weapon,
    Spell,
}

impl RollKind {
    fn expected_item(&self) -> Option<&'static str> {
        match self {
            RollKind::Ability | RollKind::HitPoints => None,
            RollKind::NpcAttack => Some("npc_attack"),
            RollKind::Weapon => Some("weapon"),
            RollKind::Spell => Some("spell"),
        }
    }
}

/// The contextual data bag for a roll: named bonus values plus the
/// actor and item documents involved.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RollData {
    #[serde(default)]
    pub bonuses: BTreeMap<String, f64>,
    #[serde(default)]
    pub actor: Option<Actor>,
    #[serde(default)]
    pub item: Option<Item>,
}

impl RollData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bonus(mut self, name: impl Into<String>, value: f64) -> Self {
        self.bonuses.insert(name.into(), value);
        self
    }

    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_item(mut self, item: Item) -> Self {
        self.item = Some(item);
        self
    }

    /// Named bonus lookup; absent values are elided, never an error.
    pub fn bonus(&self, name: &str) -> Option<f64> {
        self.bonuses.get(name).copied()
    }

    /// Critical thresholds from the actor's bonus table, else defaults.
    pub fn critical_thresholds(&self) -> CriticalThresholds {
        self.actor
            .as_ref()
            .map(|a| a.critical_thresholds())
            .unwrap_or_default()
    }
}

/// A validated roll request: kind, ordered formula parts, data bag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollRequest {
    pub kind: RollKind,
    pub parts: Vec<RollPart>,
    pub data: RollData,
}

impl RollRequest {
    /// Build a request, checking that item-backed kinds carry an item
    /// of the matching kind.
    pub fn new(
        kind: RollKind,
        parts: Vec<RollPart>,
        data: RollData,
    ) -> Result<Self, RequestError> {
        if let Some(expected) = kind.expected_item() {
            match &data.item {
                None => return Err(RequestError::MissingItem { kind }),
                Some(item) if item.kind_name() != expected => {
                    return Err(RequestError::ItemKindMismatch {
                        kind,
                        expected,
                        found: item.kind_name(),
                    });
                }
                Some(_) => {}
            }
        }
        Ok(Self { kind, parts, data })
    }

    /// An ability check needs no item.
    pub fn ability(parts: Vec<RollPart>, data: RollData) -> Self {
        Self {
            kind: RollKind::Ability,
            parts,
            data,
        }
    }

    /// A hit-point roll needs no item.
    pub fn hit_points(parts: Vec<RollPart>, data: RollData) -> Self {
        Self {
            kind: RollKind::HitPoints,
            parts,
            data,
        }
    }
}

/// Recognized per-roll options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollOptions {
    /// Skip the pre-roll dialog and any form merge.
    #[serde(default)]
    pub fast_forward: bool,
    /// Force a chat visibility mode.
    #[serde(default)]
    pub roll_mode: Option<RollMode>,
    pub flavor: Option<String>,
    pub title: Option<String>,
    /// Success threshold override.
    pub target: Option<i64>,
    /// Backstab bonus dice were requested for this attack.
    #[serde(default)]
    pub backstab: bool,
    pub dialog_template: Option<String>,
    pub dialog_title: Option<String>,
    pub chat_card_template: Option<String>,
    pub speaker: Option<String>,
    /// When false, resolve the roll but do not post a chat message.
    #[serde(default = "default_true")]
    pub chat_message: bool,
}

fn default_true() -> bool {
    true
}

impl Default for RollOptions {
    fn default() -> Self {
        Self {
            fast_forward: false,
            roll_mode: None,
            flavor: None,
            title: None,
            target: None,
            backstab: false,
            dialog_template: None,
            dialog_title: None,
            chat_card_template: None,
            speaker: None,
            chat_message: true,
        }
    }
}

impl RollOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fast_forward(mut self) -> Self {
        self.fast_forward = true;
        self
    }

    pub fn with_roll_mode(mut self, mode: RollMode) -> Self {
        self.roll_mode = Some(mode);
        self
    }

    pub fn with_flavor(mut self, flavor: impl Into<String>) -> Self {
        self.flavor = Some(flavor.into());
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_target(mut self, target: i64) -> Self {
        self.target = Some(target);
        self
    }

    pub fn with_backstab(mut self) -> Self {
        self.backstab = true;
        self
    }

    pub fn with_dialog_title(mut self, title: impl Into<String>) -> Self {
        self.dialog_title = Some(title.into());
        self
    }

    pub fn with_dialog_template(mut self, template: impl Into<String>) -> Self {
        self.dialog_template = Some(template.into());
        self
    }

    pub fn with_chat_card_template(mut self, template: impl Into<String>) -> Self {
        self.chat_card_template = Some(template.into());
        self
    }

    pub fn with_speaker(mut self, speaker: impl Into<String>) -> Self {
        self.speaker = Some(speaker.into());
        self
    }

    pub fn without_chat_message(mut self) -> Self {
        self.chat_message = false;
        self
    }
}

/// Values harvested from a submitted pre-roll form: bonus overrides and
/// an optional roll-mode choice. Bonuses merge into the request data
/// only when the roll is not fast-forwarded.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FormData {
    #[serde(default)]
    pub bonuses: BTreeMap<String, f64>,
    #[serde(default)]
    pub roll_mode: Option<RollMode>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bonus(mut self, name: impl Into<String>, value: f64) -> Self {
        self.bonuses.insert(name.into(), value);
        self
    }

    pub fn with_roll_mode(mut self, mode: RollMode) -> Self {
        self.roll_mode = Some(mode);
        self
    }
}
