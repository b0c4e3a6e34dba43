use std::collections::BTreeMap;

use {
    keyflow_channels::ChannelOutbound,
    keyflow_common::{ConversationId, OutboundMessage},
    keyflow_routing::Action,
    keyflow_sessions::{Session, SessionStore},
    tracing::{debug, trace},
};

use crate::error::{ActionExecutionError, Result};

static EMPTY_STATE: BTreeMap<String, String> = BTreeMap::new();

/// Counters for one flow execution, kept up to date even when it aborts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecutionReport {
    pub actions_run: usize,
    pub messages_sent: usize,
}

/// Runs a flow's actions strictly in order.
///
/// State mutations are written through to the store before the next action
/// starts and mirrored into the caller's session copy, so later actions (and
/// branch predicates) see them. The first failure stops execution; nothing
/// already applied is undone.
pub struct ActionExecutor<'a> {
    store: &'a dyn SessionStore,
    outbound: &'a dyn ChannelOutbound,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(store: &'a dyn SessionStore, outbound: &'a dyn ChannelOutbound) -> Self {
        Self { store, outbound }
    }

    pub async fn execute(
        &self,
        conversation_id: &ConversationId,
        actions: &[Action],
        session: &mut Option<Session>,
        report: &mut ExecutionReport,
    ) -> Result<()> {
        // Explicit stack instead of recursion: each frame is the remainder
        // of an action list, innermost branch on top.
        let mut stack = vec![actions.iter()];
        while let Some(frame) = stack.last_mut() {
            let Some(action) = frame.next() else {
                stack.pop();
                continue;
            };
            let step = report.actions_run + 1;
            match action {
                Action::SendMessage { body, media } => {
                    let message = OutboundMessage::text(conversation_id.clone(), body.clone())
                        .with_media(media.clone());
                    self.outbound
                        .send(&message)
                        .await
                        .map_err(|e| ActionExecutionError::Send {
                            step,
                            source: e.into(),
                        })?;
                    report.messages_sent += 1;
                    trace!(conversation_id = %conversation_id, step, "message sent");
                },
                Action::SetState { key, value } => {
                    self.store
                        .set(conversation_id, key, value)
                        .await
                        .map_err(|source| ActionExecutionError::Session { step, source })?;
                    session
                        .get_or_insert_with(|| Session::new(conversation_id.clone()))
                        .insert(key.as_str(), value.as_str());
                    debug!(conversation_id = %conversation_id, key = %key, value = %value, "session state set");
                },
                Action::ClearState => {
                    self.store
                        .clear(conversation_id)
                        .await
                        .map_err(|source| ActionExecutionError::Session { step, source })?;
                    *session = None;
                    debug!(conversation_id = %conversation_id, "session cleared");
                },
                Action::Branch {
                    when,
                    then_actions,
                    else_actions,
                } => {
                    let state = session.as_ref().map_or(&EMPTY_STATE, |s| &s.state);
                    let taken = when.evaluate(state);
                    trace!(conversation_id = %conversation_id, step, taken, "branch evaluated");
                    let chosen = if taken {
                        then_actions
                    } else {
                        else_actions
                    };
                    report.actions_run += 1;
                    stack.push(chosen.iter());
                    continue;
                },
            }
            report.actions_run += 1;
        }
        Ok(())
    }
}
