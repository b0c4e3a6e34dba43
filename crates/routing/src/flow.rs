use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A flow file: an ordered list of definitions. Order is routing priority.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowSet {
    pub flows: Vec<FlowDefinition>,
}

/// A flow as written in a flow file, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowDefinition {
    pub id: String,
    /// Trigger keywords. Empty means catch-all unless `continuation` is set.
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Reachable through the pending flag. A continuation flow without
    /// keywords is never a catch-all.
    #[serde(default)]
    pub continuation: bool,
    #[serde(default)]
    pub actions: Vec<Action>,
}

/// One step of a flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Deliver a message to the conversation.
    SendMessage {
        body: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        media: Option<String>,
    },
    /// Store `key = value` in the conversation's session.
    SetState { key: String, value: String },
    /// Delete the conversation's session entirely.
    ClearState,
    /// Run `then` or `else` depending on the session state at this point.
    Branch {
        when: Predicate,
        #[serde(default, rename = "then")]
        then_actions: Vec<Action>,
        #[serde(default, rename = "else")]
        else_actions: Vec<Action>,
    },
}

impl Action {
    pub fn send(body: impl Into<String>) -> Self {
        Self::SendMessage {
            body: body.into(),
            media: None,
        }
    }

    pub fn send_media(body: impl Into<String>, media: impl Into<String>) -> Self {
        Self::SendMessage {
            body: body.into(),
            media: Some(media.into()),
        }
    }

    pub fn set(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::SetState {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Condition over session state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Exists { key: String },
    Equals { key: String, value: String },
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn evaluate(&self, state: &BTreeMap<String, String>) -> bool {
        match self {
            Self::Exists { key } => state.contains_key(key),
            Self::Equals { key, value } => state.get(key) == Some(value),
            Self::Not(inner) => !inner.evaluate(state),
            Self::All(preds) => preds.iter().all(|p| p.evaluate(state)),
            Self::Any(preds) => preds.iter().any(|p| p.evaluate(state)),
        }
    }
}

/// A validated flow. Immutable once the registry is built.
#[derive(Debug, Clone)]
pub struct Flow {
    id: String,
    keywords: Vec<String>,
    continuation: bool,
    actions: Vec<Action>,
}

impl Flow {
    pub(crate) fn new(
        id: String,
        keywords: Vec<String>,
        continuation: bool,
        actions: Vec<Action>,
    ) -> Self {
        Self {
            id,
            keywords,
            continuation,
            actions,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Normalized (trimmed, uppercased) trigger keywords.
    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn is_continuation(&self) -> bool {
        self.continuation
    }

    pub fn is_catch_all(&self) -> bool {
        self.keywords.is_empty() && !self.continuation
    }

    /// Returns the keyword equal to `normalized`, if any.
    pub fn keyword_for(&self, normalized: &str) -> Option<&str> {
        self.keywords
            .iter()
            .find(|kw| kw.as_str() == normalized)
            .map(String::as_str)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn state(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn predicate_exists_and_equals() {
        let s = state(&[("pending_flow", "after_quote")]);
        assert!(
            Predicate::Exists {
                key: "pending_flow".into()
            }
            .evaluate(&s)
        );
        assert!(
            Predicate::Equals {
                key: "pending_flow".into(),
                value: "after_quote".into(),
            }
            .evaluate(&s)
        );
        assert!(
            !Predicate::Equals {
                key: "pending_flow".into(),
                value: "other".into(),
            }
            .evaluate(&s)
        );
    }

    #[test]
    fn predicate_combinators() {
        let s = state(&[("a", "1")]);
        let has_a = Predicate::Exists { key: "a".into() };
        let has_b = Predicate::Exists { key: "b".into() };
        assert!(Predicate::Any(vec![has_a.clone(), has_b.clone()]).evaluate(&s));
        assert!(!Predicate::All(vec![has_a.clone(), has_b.clone()]).evaluate(&s));
        assert!(Predicate::Not(Box::new(has_b)).evaluate(&s));
        // Empty conjunction holds, empty disjunction does not.
        assert!(Predicate::All(vec![]).evaluate(&s));
        assert!(!Predicate::Any(vec![]).evaluate(&s));
    }

    #[test]
    fn deserialize_flow_from_toml() {
        let raw = r#"
            [[flows]]
            id = "services"
            keywords = ["1"]

            [[flows.actions]]
            type = "send_message"
            body = "prices"

            [[flows.actions]]
            type = "set_state"
            key = "pending_flow"
            value = "after_quote"

            [[flows]]
            id = "after_quote"
            continuation = true

            [[flows.actions]]
            type = "branch"
            when = { exists = { key = "pending_flow" } }

            [[flows.actions.then]]
            type = "send_message"
            body = "thanks"

            [[flows.actions.then]]
            type = "clear_state"
        "#;
        let set: FlowSet = toml::from_str(raw).unwrap();
        assert_eq!(set.flows.len(), 2);
        assert_eq!(set.flows[0].actions[1], Action::set("pending_flow", "after_quote"));
        assert!(set.flows[1].continuation);
        match &set.flows[1].actions[0] {
            Action::Branch {
                when,
                then_actions,
                else_actions,
            } => {
                assert_eq!(when, &Predicate::Exists {
                    key: "pending_flow".into()
                });
                assert_eq!(then_actions.len(), 2);
                assert_eq!(then_actions[1], Action::ClearState);
                assert!(else_actions.is_empty());
            },
            other => panic!("expected branch, got {other:?}"),
        }
    }

    #[test]
    fn deserialize_media_from_json() {
        let action: Action = serde_json::from_str(
            r#"{"type":"send_message","body":"logo","media":"https://example.com/a.png"}"#,
        )
        .unwrap();
        assert_eq!(action, Action::send_media("logo", "https://example.com/a.png"));
    }
}
