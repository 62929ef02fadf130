//! Host platform capabilities, injected into the resolver.
//!
//! The virtual-tabletop host owns dice evaluation, templating, the chat
//! log, localization, dialogs, and optional 3-D dice animation. Each of
//! those surfaces is a narrow trait here so the resolver can run against
//! a real platform adapter or against the mocks in [`crate::testing`]
//! without a host runtime.

use crate::dice::{Advantage, EvaluatedRoll};
use crate::request::FormData;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors surfaced by host capabilities. The resolver does not retry;
/// failures propagate to the caller's own error surface.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("dice evaluation failed: {0}")]
    Dice(String),
    #[error("template render failed: {0}")]
    Render(String),
    #[error("chat dispatch failed: {0}")]
    Chat(String),
    #[error("document update failed: {0}")]
    Store(String),
}

/// Chat visibility modes understood by the host's message sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RollMode {
    #[default]
    Public,
    Private,
    Blind,
    SelfOnly,
}

/// A chat message handed off to the host. Nothing here is persisted by
/// this crate; the host owns the message once dispatched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub content: String,
    pub flavor: Option<String>,
    pub speaker: Option<String>,
    pub roll_mode: RollMode,
    /// Host-side metadata bag attached to the message.
    pub flags: Value,
}

/// The host's dice-evaluation primitive: a formula string plus a bonus
/// bag in, a structured roll with per-term breakdown and markup out.
pub trait DiceEngine {
    fn evaluate(
        &self,
        formula: &str,
        bonuses: &BTreeMap<String, f64>,
    ) -> impl std::future::Future<Output = Result<EvaluatedRoll, HostError>>;
}

/// The host's templating primitive, used for chat cards.
pub trait Renderer {
    fn render(
        &self,
        template: &str,
        data: Value,
    ) -> impl std::future::Future<Output = Result<String, HostError>>;
}

/// The host's chat log.
pub trait ChatSink {
    fn create_message(
        &self,
        message: ChatMessage,
    ) -> impl std::future::Future<Output = Result<(), HostError>>;

    /// Host-wide default visibility, used when neither the options nor
    /// the submitted form fix one.
    fn default_roll_mode(&self) -> RollMode;
}

/// Localization lookup keyed by string identifiers.
pub trait Localizer {
    fn localize(&self, key: &str) -> String;

    /// Lookup with interpolation parameters.
    fn format(&self, key: &str, args: &[(&str, String)]) -> String;
}

/// Optional third-party dice visualization. Rolls animate in order; the
/// caller awaits only the last one. The default implementation is a
/// no-op for hosts without the integration.
pub trait DiceAnimator {
    fn show(&self, _rolls: &[EvaluatedRoll]) -> impl std::future::Future<Output = ()> {
        async {}
    }
}

/// What a dismissable advantage/normal/disadvantage dialog returns.
#[derive(Debug, Clone)]
pub struct DialogSubmission {
    pub advantage: Advantage,
    /// Bonus overrides and roll-mode choice harvested from the form.
    pub form: Option<FormData>,
}

/// The pre-roll choice dialog. `None` means the user dismissed the
/// dialog; no roll occurs and no chat message is produced.
pub trait AdvantagePrompt {
    fn choose(
        &self,
        title: &str,
        template: Option<&str>,
    ) -> impl std::future::Future<Output = Result<Option<DialogSubmission>, HostError>>;
}

/// Persistence seam for single-field document updates, e.g. marking a
/// spell lost after a failed cast.
pub trait ItemStore {
    fn update_item_flag(
        &self,
        item_id: &str,
        field: &str,
        value: Value,
    ) -> impl std::future::Future<Output = Result<(), HostError>>;
}

/// The full set of capabilities the resolver needs. Implemented by the
/// embedder's platform adapter and by [`crate::testing::MockHost`].
pub trait Host:
    DiceEngine + Renderer + ChatSink + Localizer + DiceAnimator + AdvantagePrompt + ItemStore
{
}

impl<T> Host for T where
    T: DiceEngine + Renderer + ChatSink + Localizer + DiceAnimator + AdvantagePrompt + ItemStore
{
}
