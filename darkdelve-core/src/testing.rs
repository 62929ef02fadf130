//! Testing utilities for the rule system.
//!
//! Provides a scripted [`MockHost`] so resolution flows can run
//! deterministically without a tabletop host: queued die faces, a
//! recording chat sink, an echoing renderer, and a scripted advantage
//! dialog. Assertion helpers mirror the shape used across the
//! integration suites.

use crate::dice::{evaluate_formula, Advantage, EvaluatedRoll};
use crate::host::{
    AdvantagePrompt, ChatMessage, ChatSink, DialogSubmission, DiceAnimator, DiceEngine, HostError,
    ItemStore, Localizer, Renderer, RollMode,
};
use crate::request::FormData;
use serde_json::Value;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

/// What the scripted advantage dialog does when asked.
#[derive(Debug, Clone)]
enum PromptScript {
    Submit(DialogSubmission),
    Dismiss,
}

/// A deterministic host for tests.
///
/// Die faces come from a queue (falling back to the die's midpoint when
/// the queue runs dry), chat messages and document updates are
/// recorded, and the renderer echoes its payload.
pub struct MockHost {
    faces: Mutex<VecDeque<u32>>,
    prompt: Mutex<PromptScript>,
    default_mode: RollMode,
    pub messages: Mutex<Vec<ChatMessage>>,
    pub rendered: Mutex<Vec<(String, Value)>>,
    pub animated: Mutex<Vec<usize>>,
    pub flag_updates: Mutex<Vec<(String, String, Value)>>,
}

impl MockHost {
    pub fn new() -> Self {
        Self {
            faces: Mutex::new(VecDeque::new()),
            prompt: Mutex::new(PromptScript::Submit(DialogSubmission {
                advantage: Advantage::Normal,
                form: None,
            })),
            default_mode: RollMode::Public,
            messages: Mutex::new(Vec::new()),
            rendered: Mutex::new(Vec::new()),
            animated: Mutex::new(Vec::new()),
            flag_updates: Mutex::new(Vec::new()),
        }
    }

    /// Queue die faces, consumed in order by subsequent evaluations.
    pub fn queue_faces(&self, faces: &[u32]) -> &Self {
        self.faces.lock().unwrap().extend(faces.iter().copied());
        self
    }

    /// Script the next dialog to submit the given advantage state.
    pub fn submit_dialog(&self, advantage: Advantage) -> &Self {
        *self.prompt.lock().unwrap() = PromptScript::Submit(DialogSubmission {
            advantage,
            form: None,
        });
        self
    }

    /// Script the next dialog to submit with a harvested form.
    pub fn submit_dialog_with_form(&self, advantage: Advantage, form: FormData) -> &Self {
        *self.prompt.lock().unwrap() = PromptScript::Submit(DialogSubmission {
            advantage,
            form: Some(form),
        });
        self
    }

    /// Script the dialog to be dismissed: the roll is cancelled.
    pub fn dismiss_dialog(&self) -> &Self {
        *self.prompt.lock().unwrap() = PromptScript::Dismiss;
        self
    }

    pub fn message_count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }

    pub fn last_message(&self) -> Option<ChatMessage> {
        self.messages.lock().unwrap().last().cloned()
    }
}

impl Default for MockHost {
    fn default() -> Self {
        Self::new()
    }
}

impl DiceEngine for MockHost {
    async fn evaluate(
        &self,
        formula: &str,
        bonuses: &BTreeMap<String, f64>,
    ) -> Result<EvaluatedRoll, HostError> {
        let mut faces = self.faces.lock().unwrap();
        evaluate_formula(formula, bonuses, |sides| {
            faces.pop_front().unwrap_or((sides + 1) / 2)
        })
        .map_err(|e| HostError::Dice(e.to_string()))
    }
}

impl Renderer for MockHost {
    async fn render(&self, template: &str, data: Value) -> Result<String, HostError> {
        let content = format!("[{template}] {data}");
        self.rendered
            .lock()
            .unwrap()
            .push((template.to_string(), data));
        Ok(content)
    }
}

impl ChatSink for MockHost {
    async fn create_message(&self, message: ChatMessage) -> Result<(), HostError> {
        self.messages.lock().unwrap().push(message);
        Ok(())
    }

    fn default_roll_mode(&self) -> RollMode {
        self.default_mode
    }
}

impl Localizer for MockHost {
    fn localize(&self, key: &str) -> String {
        key.to_string()
    }

    fn format(&self, key: &str, args: &[(&str, String)]) -> String {
        let joined: Vec<String> = args.iter().map(|(k, v)| format!("{k}={v}")).collect();
        format!("{key}[{}]", joined.join(","))
    }
}

impl DiceAnimator for MockHost {
    async fn show(&self, rolls: &[EvaluatedRoll]) {
        self.animated.lock().unwrap().push(rolls.len());
    }
}

impl AdvantagePrompt for MockHost {
    async fn choose(
        &self,
        _title: &str,
        _template: Option<&str>,
    ) -> Result<Option<DialogSubmission>, HostError> {
        match &*self.prompt.lock().unwrap() {
            PromptScript::Submit(submission) => Ok(Some(submission.clone())),
            PromptScript::Dismiss => Ok(None),
        }
    }
}

impl ItemStore for MockHost {
    async fn update_item_flag(
        &self,
        item_id: &str,
        field: &str,
        value: Value,
    ) -> Result<(), HostError> {
        self.flag_updates
            .lock()
            .unwrap()
            .push((item_id.to_string(), field.to_string(), value));
        Ok(())
    }
}

/// Assert the host dispatched exactly `count` chat messages.
#[track_caller]
pub fn assert_messages(host: &MockHost, count: usize) {
    let actual = host.message_count();
    assert_eq!(actual, count, "expected {count} chat messages, got {actual}");
}

/// Assert a single-field document update was recorded.
#[track_caller]
pub fn assert_flag_update(host: &MockHost, item_id: &str, field: &str) {
    let updates = host.flag_updates.lock().unwrap();
    assert!(
        updates
            .iter()
            .any(|(id, f, _)| id == item_id && f == field),
        "expected flag update {field} on {item_id}, got {updates:?}"
    );
}

/// Assert no document updates happened.
#[track_caller]
pub fn assert_no_flag_updates(host: &MockHost) {
    let updates = host.flag_updates.lock().unwrap();
    assert!(updates.is_empty(), "expected no flag updates, got {updates:?}");
}
