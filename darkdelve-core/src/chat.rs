//! Chat-card presentation.
//!
//! Built once per roll and discarded after dispatch: formula string,
//! rendered card markup, visibility mode, flags. The host's message
//! sink owns the message from there; nothing is persisted here.

use crate::host::{ChatMessage, ChatSink, DiceAnimator, HostError, Renderer, RollMode};
use crate::request::RollKind;
use crate::resolver::RollOutcome;
use serde_json::{json, Value};

/// Template reference used when the caller does not supply one.
pub const DEFAULT_CHAT_TEMPLATE: &str = "systems/darkdelve/templates/chat/roll-card.hbs";

/// Localization keys the resolver and chat layer interpolate.
pub mod keys {
    pub const DIALOG_TITLE: &str = "DARKDELVE.dialog.roll_title";
    pub const NPC_ATTACK_FLAVOR: &str = "DARKDELVE.chat.npc_attack";
    pub const WEAPON_FLAVOR: &str = "DARKDELVE.chat.weapon_attack";
    pub const SPELL_FLAVOR: &str = "DARKDELVE.chat.spell_cast";
}

/// A chat-ready rendering of a roll outcome.
#[derive(Debug, Clone)]
pub struct ChatPresentation {
    pub formula: String,
    pub content: String,
    pub flavor: Option<String>,
    pub title: Option<String>,
    pub roll_mode: RollMode,
    pub speaker: Option<String>,
    pub flags: Value,
    /// Every evaluated roll in display order, for dice animation.
    rolls: Vec<crate::dice::EvaluatedRoll>,
}

impl ChatPresentation {
    /// Render the chat card for an outcome.
    #[allow(clippy::too_many_arguments)]
    pub async fn build<H: Renderer>(
        host: &H,
        kind: RollKind,
        outcome: &RollOutcome,
        template: Option<&str>,
        roll_mode: RollMode,
        flavor: Option<String>,
        title: Option<String>,
        speaker: Option<String>,
    ) -> Result<Self, HostError> {
        let critical_success = outcome.is_critical_success();
        let critical_failure = outcome.is_critical_failure();

        let damage = outcome.damage.as_ref().map(|d| {
            json!({
                "formula": d.formula,
                "total": d.primary.total,
                "markup": d.primary.markup,
                "versatile": d.versatile.as_ref().map(|v| json!({
                    "total": v.total,
                    "markup": v.markup,
                })),
            })
        });

        let payload = json!({
            "kind": kind,
            "formula": outcome.roll.formula,
            "total": outcome.roll.total,
            "markup": outcome.roll.markup,
            "flavor": flavor,
            "title": title,
            "criticalSuccess": critical_success,
            "criticalFailure": critical_failure,
            "target": outcome.target,
            "damage": damage,
        });

        let template = template.unwrap_or(DEFAULT_CHAT_TEMPLATE);
        let content = host.render(template, payload).await?;

        let mut rolls = vec![outcome.roll.clone()];
        if let Some(damage) = &outcome.damage {
            rolls.push(damage.primary.clone());
            if let Some(versatile) = &damage.versatile {
                rolls.push(versatile.clone());
            }
        }

        let flags = json!({
            "darkdelve": {
                "kind": kind,
                "criticalSuccess": critical_success,
                "criticalFailure": critical_failure,
                "success": outcome.target.as_ref().map(|t| t.met),
            }
        });

        Ok(Self {
            formula: outcome.roll.formula.clone(),
            content,
            flavor,
            title,
            roll_mode,
            speaker,
            flags,
            rolls,
        })
    }

    /// Animate the rolls in order, awaiting only the last, then hand
    /// the message to the chat sink.
    pub async fn dispatch<H: ChatSink + DiceAnimator>(self, host: &H) -> Result<(), HostError> {
        host.show(&self.rolls).await;
        host.create_message(ChatMessage {
            content: self.content,
            flavor: self.flavor,
            speaker: self.speaker,
            roll_mode: self.roll_mode,
            flags: self.flags,
        })
        .await
    }
}
