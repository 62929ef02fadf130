//! The dice formula resolver.
//!
//! Turns a semantic roll request into an evaluated, classified,
//! chat-ready outcome: builds the formula from its parts, applies
//! advantage to the primary die, detects criticals against the actor's
//! thresholds, derives secondary damage rolls, and hands the result to
//! chat presentation. Each call is independent and request-scoped;
//! nothing is held across rolls.

use crate::chat::{keys, ChatPresentation};
use crate::dice::{
    apply_advantage, digest_parts, is_d20, normalize_leading, Advantage, DiceTerm, DieSize,
    EvaluatedRoll, RollPart,
};
use crate::documents::{Actor, ActorBonuses, CriticalThresholds, NpcAttackData, WeaponData};
use crate::host::{AdvantagePrompt, ChatSink, DiceEngine, Host, ItemStore, Localizer};
use crate::request::{FormData, RequestError, RollData, RollKind, RollOptions, RollRequest};
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::debug;

/// Errors from roll resolution.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("roll has no formula parts")]
    EmptyRoll,
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Host(#[from] crate::host::HostError),
}

/// Critical classification of the primary roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Critical {
    Success,
    Failure,
}

/// An evaluated primary roll plus its critical classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub roll: EvaluatedRoll,
    pub critical: Option<Critical>,
}

/// Target-number check on the primary roll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetCheck {
    pub target: i64,
    pub met: bool,
}

/// Secondary damage rolls derived from the primary roll.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DamageResolution {
    pub formula: String,
    pub primary: EvaluatedRoll,
    /// Independent other-grip roll for versatile weapons.
    pub versatile: Option<EvaluatedRoll>,
}

/// The finished product of a roll request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollOutcome {
    pub roll: EvaluatedRoll,
    pub critical: Option<Critical>,
    pub target: Option<TargetCheck>,
    pub damage: Option<DamageResolution>,
}

impl RollOutcome {
    pub fn is_critical_success(&self) -> bool {
        self.critical == Some(Critical::Success)
    }

    pub fn is_critical_failure(&self) -> bool {
        self.critical == Some(Critical::Failure)
    }

    pub fn met_target(&self) -> Option<bool> {
        self.target.map(|t| t.met)
    }
}

/// The resolver, generic over the injected host capabilities.
pub struct Resolver<'a, H: Host> {
    host: &'a H,
}

impl<'a, H: Host> Resolver<'a, H> {
    pub fn new(host: &'a H) -> Self {
        Self { host }
    }

    /// Normalize, digest, join, and evaluate a part list, classifying
    /// criticality from the leading die against the actor thresholds.
    ///
    /// The first part is always kept, even when it is a placeholder;
    /// later placeholder parts with missing or zero bonuses are elided.
    pub async fn evaluate(
        &self,
        parts: &[RollPart],
        data: &RollData,
    ) -> Result<Evaluation, ResolveError> {
        let Some(first) = parts.first() else {
            return Err(ResolveError::EmptyRoll);
        };

        let mut digested = vec![normalize_leading(first)];
        digested.extend(digest_parts(&parts[1..], &data.bonuses));

        let formula = digested
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("+");
        debug!(%formula, "evaluating roll");

        let roll = self.host.evaluate(&formula, &data.bonuses).await?;
        let critical = classify(digested.first(), &roll, data.critical_thresholds());
        Ok(Evaluation { roll, critical })
    }

    /// Apply advantage to the leading die, then evaluate.
    pub async fn roll_advantage(
        &self,
        parts: &[RollPart],
        data: &RollData,
        advantage: Advantage,
    ) -> Result<Evaluation, ResolveError> {
        let parts = apply_advantage(parts, advantage);
        self.evaluate(&parts, data).await
    }

    /// Top-level entry: evaluate the main roll, derive damage and
    /// target checks per roll kind, dispatch the chat card, and apply
    /// the spell-lost side effect.
    pub async fn resolve_roll(
        &self,
        request: &RollRequest,
        form: Option<&FormData>,
        advantage: Advantage,
        options: &RollOptions,
    ) -> Result<RollOutcome, ResolveError> {
        let mut data = request.data.clone();
        if !options.fast_forward {
            if let Some(form) = form {
                for (name, value) in &form.bonuses {
                    data.bonuses.insert(name.clone(), *value);
                }
            }
        }

        let roll_mode = options
            .roll_mode
            .or_else(|| form.and_then(|f| f.roll_mode))
            .unwrap_or_else(|| self.host.default_roll_mode());

        let main = self.roll_advantage(&request.parts, &data, advantage).await?;
        let mut outcome = RollOutcome {
            roll: main.roll,
            critical: main.critical,
            target: None,
            damage: None,
        };
        let mut flavor = options.flavor.clone();

        match request.kind {
            // Plain checks stop at the main roll.
            RollKind::Ability | RollKind::HitPoints => {}

            RollKind::NpcAttack => {
                let item = data.item.as_ref().ok_or(RequestError::MissingItem {
                    kind: request.kind,
                })?;
                let attack = item.as_npc_attack().ok_or(RequestError::ItemKindMismatch {
                    kind: request.kind,
                    expected: "npc_attack",
                    found: item.kind_name(),
                })?;

                if let Some(formula) = npc_attack_formula(attack, outcome.critical) {
                    debug!(%formula, "rolling npc attack damage");
                    let primary = self.host.evaluate(&formula, &data.bonuses).await?;
                    outcome.damage = Some(DamageResolution {
                        formula,
                        primary,
                        versatile: None,
                    });
                }
                if flavor.is_none() {
                    flavor = Some(
                        self.host
                            .format(keys::NPC_ATTACK_FLAVOR, &[("name", item.name.clone())]),
                    );
                }
            }

            RollKind::Weapon if is_d20(&request.parts) => {
                let item = data.item.as_ref().ok_or(RequestError::MissingItem {
                    kind: request.kind,
                })?;
                let weapon = item.as_weapon().ok_or(RequestError::ItemKindMismatch {
                    kind: request.kind,
                    expected: "weapon",
                    found: item.kind_name(),
                })?;

                let formulas = weapon_damage_formulas(
                    &item.name,
                    weapon,
                    data.actor.as_ref(),
                    options.backstab,
                    outcome.critical,
                );
                if let Some(formulas) = formulas {
                    debug!(formula = %formulas.primary, "rolling weapon damage");
                    let primary = self.host.evaluate(&formulas.primary, &data.bonuses).await?;
                    let versatile = match &formulas.versatile {
                        Some(other) => {
                            Some(self.host.evaluate(other, &data.bonuses).await?)
                        }
                        None => None,
                    };
                    outcome.damage = Some(DamageResolution {
                        formula: formulas.primary,
                        primary,
                        versatile,
                    });
                }
                if flavor.is_none() {
                    flavor = Some(
                        self.host
                            .format(keys::WEAPON_FLAVOR, &[("name", item.name.clone())]),
                    );
                }
            }

            RollKind::Spell if is_d20(&request.parts) => {
                let item = data.item.as_ref().ok_or(RequestError::MissingItem {
                    kind: request.kind,
                })?;
                let spell = item.as_spell().ok_or(RequestError::ItemKindMismatch {
                    kind: request.kind,
                    expected: "spell",
                    found: item.kind_name(),
                })?;

                let npc_caster = data.actor.as_ref().map(Actor::is_npc).unwrap_or(false);
                let (tier, difficulty) = if npc_caster {
                    let difficulty = spell.difficulty.unwrap_or(spell.tier + 10);
                    (difficulty.saturating_sub(10), difficulty)
                } else {
                    (spell.tier, spell.tier + 10)
                };

                let target = options.target.unwrap_or(difficulty as i64);
                outcome.target = Some(TargetCheck {
                    target,
                    met: outcome.roll.total >= target,
                });
                if flavor.is_none() {
                    flavor = Some(self.host.format(
                        keys::SPELL_FLAVOR,
                        &[
                            ("name", item.name.clone()),
                            ("tier", tier.to_string()),
                            ("difficulty", difficulty.to_string()),
                        ],
                    ));
                }
            }

            // Weapon or spell rolls that are not d20-led get no damage
            // or target resolution.
            RollKind::Weapon | RollKind::Spell => {}
        }

        // A caller-supplied target applies even when the kind derives
        // none of its own.
        if outcome.target.is_none() {
            if let Some(target) = options.target {
                outcome.target = Some(TargetCheck {
                    target,
                    met: outcome.roll.total >= target,
                });
            }
        }

        if options.chat_message {
            let presentation = ChatPresentation::build(
                self.host,
                request.kind,
                &outcome,
                options.chat_card_template.as_deref(),
                roll_mode,
                flavor,
                options.title.clone(),
                options.speaker.clone(),
            )
            .await?;
            presentation.dispatch(self.host).await?;
        }

        // A spell that missed its target number is marked lost.
        if request.kind == RollKind::Spell && outcome.met_target() == Some(false) {
            if let Some(item) = data.item.as_ref() {
                debug!(item = %item.name, "spell missed its target, marking lost");
                self.host
                    .update_item_flag(&item.id, "lost", json!(true))
                    .await?;
            }
        }

        Ok(outcome)
    }

    /// Dialog-driving variant: present the advantage choice first
    /// (unless fast-forwarded), then resolve. A dismissed dialog
    /// cancels the roll entirely: `Ok(None)`, nothing posted.
    pub async fn resolve_with_dialog(
        &self,
        request: &RollRequest,
        options: &RollOptions,
    ) -> Result<Option<RollOutcome>, ResolveError> {
        if options.fast_forward {
            let outcome = self
                .resolve_roll(request, None, Advantage::Normal, options)
                .await?;
            return Ok(Some(outcome));
        }

        let title = options
            .dialog_title
            .clone()
            .unwrap_or_else(|| self.host.localize(keys::DIALOG_TITLE));
        let Some(submission) = self
            .host
            .choose(&title, options.dialog_template.as_deref())
            .await?
        else {
            debug!("roll dialog dismissed, cancelling");
            return Ok(None);
        };

        self.resolve_roll(
            request,
            submission.form.as_ref(),
            submission.advantage,
            options,
        )
        .await
        .map(Some)
    }
}

/// Classify criticality from the leading part's die and the first
/// evaluated term. Only a 20-faced leading die classifies; anything
/// else, including flat or malformed leading parts, returns `None`.
fn classify(
    first: Option<&RollPart>,
    roll: &EvaluatedRoll,
    thresholds: CriticalThresholds,
) -> Option<Critical> {
    let lead = first?.as_term().and_then(DiceTerm::parse)?;
    if lead.sides != 20 {
        return None;
    }
    let value = roll.terms.first()?.subtotal;
    if value <= thresholds.failure {
        Some(Critical::Failure)
    } else if value >= thresholds.success {
        Some(Critical::Success)
    } else {
        None
    }
}

/// Build the NPC-attack damage formula.
///
/// Empty base formulas default to `1`; the literal `0` skips damage
/// entirely, as does a critical failure on the main roll. A critical
/// success multiplies the leading dice count and leaves any non-dice
/// suffix untouched; a formula with no die at all stays flat.
fn npc_attack_formula(attack: &NpcAttackData, critical: Option<Critical>) -> Option<String> {
    let base = attack.damage_formula.trim();
    let base = if base.is_empty() { "1" } else { base };
    if base == "0" {
        return None;
    }
    if critical == Some(Critical::Failure) {
        return None;
    }

    let mut formula = if critical == Some(Critical::Success) {
        multiply_leading_dice(base, attack.critical_multiplier)
    } else {
        base.to_string()
    };
    if attack.damage_bonus != 0 {
        formula = append_flat(&formula, attack.damage_bonus);
    }
    Some(formula)
}

/// Multiply the leading dice count of `<n>d<suffix>`; formulas with no
/// leading die are returned unchanged.
fn multiply_leading_dice(formula: &str, multiplier: u32) -> String {
    let Some(d_pos) = formula.find('d') else {
        return formula.to_string();
    };
    let prefix = &formula[..d_pos];
    if !prefix.chars().all(|c| c.is_ascii_digit()) {
        return formula.to_string();
    }
    let count: u32 = if prefix.is_empty() {
        1
    } else {
        prefix.parse().unwrap_or(1)
    };
    format!("{}d{}", count * multiplier.max(1), &formula[d_pos + 1..])
}

fn append_flat(formula: &str, bonus: i32) -> String {
    if bonus < 0 {
        format!("{formula}-{}", -(bonus as i64))
    } else {
        format!("{formula}+{bonus}")
    }
}

/// Primary and optional versatile weapon-damage formulas.
#[derive(Debug, Clone, PartialEq, Eq)]
struct WeaponFormulas {
    primary: String,
    versatile: Option<String>,
}

/// Build the weapon damage formulas per the damage rule table: grip die
/// selection, per-property die improvement, d12 pinning, backstab dice,
/// critical dice multiplication, and the flat damage multiplier.
fn weapon_damage_formulas(
    item_name: &str,
    weapon: &WeaponData,
    actor: Option<&Actor>,
    backstab: bool,
    critical: Option<Critical>,
) -> Option<WeaponFormulas> {
    let default_bonuses = ActorBonuses::default();
    let bonuses = actor.map(|a| &a.bonuses).unwrap_or(&default_bonuses);
    let level = actor.map(|a| a.level).unwrap_or(0);

    let mut die = weapon.damage_die();
    let mut other = weapon.versatile_die();

    for property in &bonuses.damage_die_improvements {
        if weapon.has_property(property) {
            die = die.step_up();
            other = other.map(DieSize::step_up);
        }
    }

    let pinned = bonuses.pin_d12.iter().any(|entry| {
        entry == item_name
            || weapon
                .base_weapon
                .as_deref()
                .map(|tag| entry == tag)
                .unwrap_or(false)
    });
    if pinned {
        die = DieSize::D12;
        other = other.map(|_| DieSize::D12);
    }

    if critical == Some(Critical::Failure) {
        return None;
    }

    let mut count: u32 = 1;
    if backstab {
        count += 1 + level / 2 + bonuses.backstab_dice;
    }
    if critical == Some(Critical::Success) {
        count *= weapon.critical_multiplier.max(1);
    }

    let multiplier = weapon
        .damage_multiplier
        .max(bonuses.damage_multiplier)
        .max(1);

    let build = |die: DieSize| {
        let mut formula = format!("{count}{die}");
        if weapon.damage_bonus != 0 {
            formula = append_flat(&formula, weapon.damage_bonus);
        }
        if multiplier > 1 {
            formula = format!("{formula} * {multiplier}");
        }
        formula
    };

    Some(WeaponFormulas {
        primary: build(die),
        versatile: other.map(build),
    })
}
