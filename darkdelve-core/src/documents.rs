//! Actor and item documents.
//!
//! Thin, serde-backed mirrors of the host's document model: just the
//! fields the resolver reads, plus builder helpers for embedders and
//! tests. The host remains the system of record; documents here are
//! request-scoped snapshots.

use crate::dice::DieSize;
use serde::{Deserialize, Serialize};

/// Whether an actor is a player character or host-controlled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorKind {
    Character,
    Npc,
}

/// Per-actor critical thresholds. Defaults match the base rules:
/// failure on 1 and below, success on 20 and above.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CriticalThresholds {
    pub failure: u32,
    pub success: u32,
}

impl Default for CriticalThresholds {
    fn default() -> Self {
        Self {
            failure: 1,
            success: 20,
        }
    }
}

/// Stored bonus tables on an actor document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorBonuses {
    /// Overrides the default 1/20 critical thresholds when present.
    #[serde(default)]
    pub critical: Option<CriticalThresholds>,
    /// Weapon-property names; each property the weapon possesses steps
    /// its damage die one rank up the progression.
    #[serde(default)]
    pub damage_die_improvements: Vec<String>,
    /// Weapon names or base-weapon tags whose damage die is hard-pinned
    /// to d12.
    #[serde(default)]
    pub pin_d12: Vec<String>,
    /// Flat extra backstab dice on top of the level-derived count.
    #[serde(default)]
    pub backstab_dice: u32,
    /// Actor-side flat damage multiplier, minimum 1.
    #[serde(default = "one")]
    pub damage_multiplier: u32,
}

impl Default for ActorBonuses {
    fn default() -> Self {
        Self {
            critical: None,
            damage_die_improvements: Vec::new(),
            pin_d12: Vec::new(),
            backstab_dice: 0,
            damage_multiplier: 1,
        }
    }
}

fn one() -> u32 {
    1
}

/// An actor document snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Actor {
    pub id: String,
    pub name: String,
    pub kind: ActorKind,
    pub level: u32,
    #[serde(default)]
    pub bonuses: ActorBonuses,
}

impl Actor {
    pub fn character(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            name,
            kind: ActorKind::Character,
            level: 1,
            bonuses: ActorBonuses::default(),
        }
    }

    pub fn npc(name: impl Into<String>) -> Self {
        let mut actor = Self::character(name);
        actor.kind = ActorKind::Npc;
        actor
    }

    pub fn with_level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    pub fn with_bonuses(mut self, bonuses: ActorBonuses) -> Self {
        self.bonuses = bonuses;
        self
    }

    pub fn is_npc(&self) -> bool {
        self.kind == ActorKind::Npc
    }

    /// Critical thresholds, falling back to the 1/20 defaults.
    pub fn critical_thresholds(&self) -> CriticalThresholds {
        self.bonuses.critical.unwrap_or_default()
    }
}

/// How a weapon is currently held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Grip {
    #[default]
    OneHanded,
    TwoHanded,
}

/// Weapon-specific item data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeaponData {
    pub one_handed: DieSize,
    /// The other grip's die; present only on versatile weapons.
    #[serde(default)]
    pub two_handed: Option<DieSize>,
    #[serde(default)]
    pub grip: Grip,
    #[serde(default)]
    pub properties: Vec<String>,
    /// Base-weapon tag, e.g. a named magic sword tagged "longsword".
    #[serde(default)]
    pub base_weapon: Option<String>,
    /// Dice-count multiplier on a critical success.
    #[serde(default = "two")]
    pub critical_multiplier: u32,
    /// Flat weapon-mastery damage bonus.
    #[serde(default)]
    pub damage_bonus: i32,
    /// Item-side flat damage multiplier, minimum 1.
    #[serde(default = "one")]
    pub damage_multiplier: u32,
}

fn two() -> u32 {
    2
}

impl WeaponData {
    pub fn new(one_handed: DieSize) -> Self {
        Self {
            one_handed,
            two_handed: None,
            grip: Grip::OneHanded,
            properties: Vec::new(),
            base_weapon: None,
            critical_multiplier: 2,
            damage_bonus: 0,
            damage_multiplier: 1,
        }
    }

    pub fn versatile(mut self, two_handed: DieSize) -> Self {
        self.two_handed = Some(two_handed);
        self
    }

    pub fn with_grip(mut self, grip: Grip) -> Self {
        self.grip = grip;
        self
    }

    pub fn with_properties(mut self, properties: Vec<String>) -> Self {
        self.properties = properties;
        self
    }

    pub fn with_base_weapon(mut self, tag: impl Into<String>) -> Self {
        self.base_weapon = Some(tag.into());
        self
    }

    pub fn with_damage_bonus(mut self, bonus: i32) -> Self {
        self.damage_bonus = bonus;
        self
    }

    pub fn with_damage_multiplier(mut self, multiplier: u32) -> Self {
        self.damage_multiplier = multiplier;
        self
    }

    pub fn is_versatile(&self) -> bool {
        self.two_handed.is_some()
    }

    pub fn has_property(&self, property: &str) -> bool {
        self.properties.iter().any(|p| p == property)
    }

    /// The damage die for the current grip.
    pub fn damage_die(&self) -> DieSize {
        match self.grip {
            Grip::TwoHanded => self.two_handed.unwrap_or(self.one_handed),
            Grip::OneHanded => self.one_handed,
        }
    }

    /// The other grip's die, when the weapon is versatile.
    pub fn versatile_die(&self) -> Option<DieSize> {
        let two_handed = self.two_handed?;
        Some(match self.grip {
            Grip::TwoHanded => self.one_handed,
            Grip::OneHanded => two_handed,
        })
    }
}

/// Spell-specific item data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpellData {
    pub tier: u32,
    /// NPC-authored spells store the difficulty directly; character
    /// spells derive it as tier + 10.
    #[serde(default)]
    pub difficulty: Option<u32>,
    /// Set when a cast misses its target number; the spell cannot be
    /// cast again until recovered.
    #[serde(default)]
    pub lost: bool,
}

impl SpellData {
    pub fn tier(tier: u32) -> Self {
        Self {
            tier,
            difficulty: None,
            lost: false,
        }
    }

    pub fn with_difficulty(mut self, difficulty: u32) -> Self {
        self.difficulty = Some(difficulty);
        self
    }
}

/// NPC-attack item data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NpcAttackData {
    /// Base damage formula; empty defaults to "1" at resolution time.
    #[serde(default)]
    pub damage_formula: String,
    #[serde(default = "two")]
    pub critical_multiplier: u32,
    #[serde(default)]
    pub damage_bonus: i32,
}

impl NpcAttackData {
    pub fn new(damage_formula: impl Into<String>) -> Self {
        Self {
            damage_formula: damage_formula.into(),
            critical_multiplier: 2,
            damage_bonus: 0,
        }
    }

    pub fn with_critical_multiplier(mut self, multiplier: u32) -> Self {
        self.critical_multiplier = multiplier;
        self
    }

    pub fn with_damage_bonus(mut self, bonus: i32) -> Self {
        self.damage_bonus = bonus;
        self
    }
}

/// Item kinds the resolver distinguishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ItemKind {
    Weapon(WeaponData),
    Spell(SpellData),
    NpcAttack(NpcAttackData),
}

/// An item document snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
}

impl Item {
    pub fn new(name: impl Into<String>, kind: ItemKind) -> Self {
        let name = name.into();
        Self {
            id: name.to_lowercase().replace(' ', "-"),
            name,
            kind,
        }
    }

    pub fn weapon(name: impl Into<String>, data: WeaponData) -> Self {
        Self::new(name, ItemKind::Weapon(data))
    }

    pub fn spell(name: impl Into<String>, data: SpellData) -> Self {
        Self::new(name, ItemKind::Spell(data))
    }

    pub fn npc_attack(name: impl Into<String>, data: NpcAttackData) -> Self {
        Self::new(name, ItemKind::NpcAttack(data))
    }

    pub fn is_weapon(&self) -> bool {
        matches!(self.kind, ItemKind::Weapon(_))
    }

    pub fn is_spell(&self) -> bool {
        matches!(self.kind, ItemKind::Spell(_))
    }

    pub fn is_npc_attack(&self) -> bool {
        matches!(self.kind, ItemKind::NpcAttack(_))
    }

    pub fn as_weapon(&self) -> Option<&WeaponData> {
        match &self.kind {
            ItemKind::Weapon(w) => Some(w),
            _ => None,
        }
    }

    pub fn as_spell(&self) -> Option<&SpellData> {
        match &self.kind {
            ItemKind::Spell(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_npc_attack(&self) -> Option<&NpcAttackData> {
        match &self.kind {
            ItemKind::NpcAttack(a) => Some(a),
            _ => None,
        }
    }

    /// Kind label used in mismatch errors.
    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            ItemKind::Weapon(_) => "weapon",
            ItemKind::Spell(_) => "spell",
            ItemKind::NpcAttack(_) => "npc_attack",
        }
    }
}
