use std::{sync::Arc, time::Instant};

use {
    keyflow_channels::ChannelOutbound,
    keyflow_common::{ConversationId, InboundMessage},
    keyflow_routing::{FlowRegistry, MatchReason, match_flow},
    keyflow_sessions::{Session, SessionStore},
    serde::Serialize,
    tracing::{debug, info, warn},
};

#[cfg(feature = "metrics")]
use keyflow_metrics::{counter, dispatch as dispatch_metrics, histogram, labels};

use crate::{
    executor::{ActionExecutor, ExecutionReport},
    locks::ConversationLocks,
};

/// Routing decision for one inbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Route {
    /// The session carried a pending flag naming this flow.
    Continuation { flow: String },
    /// The whole message matched a trigger keyword.
    Keyword { flow: String, keyword: String },
    /// Nothing else matched.
    CatchAll { flow: String },
    /// No flow applies; nothing is sent.
    Silent,
}

impl Route {
    pub fn flow_id(&self) -> Option<&str> {
        match self {
            Self::Continuation { flow } | Self::Keyword { flow, .. } | Self::CatchAll { flow } => {
                Some(flow)
            },
            Self::Silent => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Continuation { .. } => "continuation",
            Self::Keyword { .. } => "keyword",
            Self::CatchAll { .. } => "catch_all",
            Self::Silent => "silent",
        }
    }
}

/// Where a conversation sits in the dispatch state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ConversationState {
    Idle,
    AwaitingContinuation { flow: String },
}

/// What happened to one inbound message.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchOutcome {
    pub conversation_id: ConversationId,
    pub route: Route,
    pub actions_run: usize,
    pub messages_sent: usize,
    /// Set when the flow was aborted by a failing action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchOutcome {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Routes inbound messages to flows and runs them.
///
/// Routing priority: a pending continuation, then keyword flows in
/// registration order, then the catch-all. Dispatches for one conversation
/// are serialized; different conversations run concurrently.
pub struct Dispatcher {
    registry: Arc<FlowRegistry>,
    sessions: Arc<dyn SessionStore>,
    outbound: Arc<dyn ChannelOutbound>,
    locks: ConversationLocks,
}

impl Dispatcher {
    pub fn new(
        registry: Arc<FlowRegistry>,
        sessions: Arc<dyn SessionStore>,
        outbound: Arc<dyn ChannelOutbound>,
    ) -> Self {
        Self {
            registry,
            sessions,
            outbound,
            locks: ConversationLocks::new(),
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    /// The per-conversation locks every dispatch runs under.
    pub fn locks(&self) -> &ConversationLocks {
        &self.locks
    }

    /// Handle one inbound message. Never fails: action errors are logged and
    /// reported in the outcome, session read errors degrade to idle routing.
    pub async fn dispatch(&self, inbound: &InboundMessage) -> DispatchOutcome {
        let started = Instant::now();
        let id = &inbound.conversation_id;

        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::MESSAGES_RECEIVED_TOTAL).increment(1);

        info!(
            conversation_id = %id,
            text_len = inbound.text.len(),
            attachments = inbound.attachments.len(),
            "incoming message"
        );
        debug!(conversation_id = %id, text = %inbound.text, "incoming message text");

        let _guard = self.locks.acquire(id).await;

        let mut session = self.load_session(id).await;
        let route = self.route(&inbound.text, session.as_ref());
        debug!(conversation_id = %id, route = route.kind(), flow = route.flow_id(), "route resolved");

        #[cfg(feature = "metrics")]
        counter!(dispatch_metrics::ROUTES_TOTAL, labels::ROUTE => route.kind()).increment(1);

        let mut outcome = DispatchOutcome {
            conversation_id: id.clone(),
            route,
            actions_run: 0,
            messages_sent: 0,
            error: None,
        };

        let Some(flow) = outcome
            .route
            .flow_id()
            .and_then(|flow_id| self.registry.get(flow_id))
        else {
            debug!(conversation_id = %id, "no flow matched, staying silent");
            return outcome;
        };

        let executor = ActionExecutor::new(self.sessions.as_ref(), self.outbound.as_ref());
        let mut report = ExecutionReport::default();
        if let Err(e) = executor
            .execute(id, flow.actions(), &mut session, &mut report)
            .await
        {
            warn!(
                conversation_id = %id,
                flow = flow.id(),
                step = e.step(),
                error = %e,
                "flow aborted, earlier actions kept"
            );
            #[cfg(feature = "metrics")]
            counter!(
                dispatch_metrics::FLOW_FAILURES_TOTAL,
                labels::FLOW => flow.id().to_string(),
                labels::ERROR_TYPE => e.kind()
            )
            .increment(1);
            outcome.error = Some(e.to_string());
        }
        outcome.actions_run = report.actions_run;
        outcome.messages_sent = report.messages_sent;

        #[cfg(feature = "metrics")]
        {
            counter!(dispatch_metrics::MESSAGES_SENT_TOTAL).increment(report.messages_sent as u64);
            histogram!(dispatch_metrics::DURATION_SECONDS).record(started.elapsed().as_secs_f64());
        }

        debug!(
            conversation_id = %id,
            flow = flow.id(),
            actions = report.actions_run,
            sent = report.messages_sent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "dispatch finished"
        );
        outcome
    }

    /// Resolve the route for `inbound` without running anything.
    pub async fn resolve(&self, inbound: &InboundMessage) -> Route {
        let session = self.load_session(&inbound.conversation_id).await;
        self.route(&inbound.text, session.as_ref())
    }

    /// Current state-machine position of a conversation.
    pub async fn conversation_state(&self, id: &ConversationId) -> ConversationState {
        match self
            .load_session(id)
            .await
            .as_ref()
            .and_then(|s| self.pending_target(s))
        {
            Some(flow) => ConversationState::AwaitingContinuation {
                flow: flow.to_string(),
            },
            None => ConversationState::Idle,
        }
    }

    async fn load_session(&self, id: &ConversationId) -> Option<Session> {
        match self.sessions.get(id).await {
            Ok(session) => session,
            Err(e) => {
                warn!(
                    conversation_id = %id,
                    backend = self.sessions.backend(),
                    error = %e,
                    "session store unavailable, treating conversation as idle"
                );
                #[cfg(feature = "metrics")]
                counter!(
                    dispatch_metrics::SESSION_FALLBACKS_TOTAL,
                    labels::BACKEND => self.sessions.backend()
                )
                .increment(1);
                None
            },
        }
    }

    /// The registered continuation flow named by the session's pending flag.
    fn pending_target<'s>(&self, session: &'s Session) -> Option<&'s str> {
        let target = session.get(self.registry.pending_key())?;
        if self.registry.get(target).is_some() {
            Some(target)
        } else {
            warn!(
                conversation_id = %session.conversation_id,
                pending = target,
                "pending flag names an unknown flow, ignoring it"
            );
            None
        }
    }

    fn route(&self, text: &str, session: Option<&Session>) -> Route {
        if let Some(flow) = session.and_then(|s| self.pending_target(s)) {
            return Route::Continuation {
                flow: flow.to_string(),
            };
        }
        match match_flow(text, &self.registry) {
            Some(m) => match m.reason {
                MatchReason::Keyword(keyword) => Route::Keyword {
                    flow: m.flow.id().to_string(),
                    keyword,
                },
                MatchReason::CatchAll => Route::CatchAll {
                    flow: m.flow.id().to_string(),
                },
            },
            None => Route::Silent,
        }
    }
}
