use std::collections::{HashMap, HashSet};

use tracing::{debug, warn};

use crate::{
    Error, Result,
    flow::{Action, Flow, FlowDefinition},
    matcher::normalize,
};

/// Session key whose value names the continuation flow.
pub const DEFAULT_PENDING_KEY: &str = "pending_flow";

/// Maximum nesting of `branch` actions inside one flow.
pub const MAX_BRANCH_DEPTH: usize = 16;

/// Ordered, immutable collection of validated flows.
#[derive(Debug, Clone)]
pub struct FlowRegistry {
    flows: Vec<Flow>,
    index: HashMap<String, usize>,
    catch_all: Option<usize>,
    pending_key: String,
}

impl FlowRegistry {
    /// Validate `definitions` and build a registry. Registration order is
    /// the order of `definitions`.
    pub fn from_definitions(definitions: Vec<FlowDefinition>, pending_key: &str) -> Result<Self> {
        let pending_key = pending_key.trim();
        if pending_key.is_empty() {
            return Err(Error::EmptyPendingKey);
        }

        let mut flows = Vec::with_capacity(definitions.len());
        let mut index = HashMap::new();
        let mut catch_all: Option<usize> = None;
        let mut claimed: HashMap<String, String> = HashMap::new();

        for (position, def) in definitions.into_iter().enumerate() {
            let id = def.id.trim().to_string();
            if id.is_empty() {
                return Err(Error::EmptyFlowId { index: position });
            }
            if index.contains_key(&id) {
                return Err(Error::DuplicateFlowId { id });
            }

            let mut seen = HashSet::new();
            let mut keywords = Vec::with_capacity(def.keywords.len());
            for raw in &def.keywords {
                let kw = normalize(raw);
                if kw.is_empty() {
                    return Err(Error::EmptyKeyword { flow: id });
                }
                if !seen.insert(kw.clone()) {
                    continue;
                }
                if let Some(owner) = claimed.get(&kw) {
                    warn!(
                        keyword = %kw,
                        flow = %id,
                        owner = %owner,
                        "keyword already claimed by an earlier flow, it will never match here"
                    );
                } else {
                    claimed.insert(kw.clone(), id.clone());
                }
                keywords.push(kw);
            }

            if branch_depth(&def.actions) > MAX_BRANCH_DEPTH {
                return Err(Error::BranchTooDeep {
                    flow: id,
                    max: MAX_BRANCH_DEPTH,
                });
            }

            let flow = Flow::new(id.clone(), keywords, def.continuation, def.actions);
            if flow.is_catch_all() {
                if let Some(first) = catch_all {
                    return Err(Error::DuplicateCatchAll {
                        first: flows_id(&flows, first),
                        second: id,
                    });
                }
                catch_all = Some(position);
            }
            index.insert(id, position);
            flows.push(flow);
        }

        for flow in &flows {
            let mut targets = Vec::new();
            collect_pending_targets(flow.actions(), pending_key, &mut targets);
            for target in targets {
                if !index.contains_key(target) {
                    return Err(Error::UnknownContinuation {
                        flow: flow.id().to_string(),
                        target: target.to_string(),
                    });
                }
            }
        }

        debug!(
            flows = flows.len(),
            catch_all = catch_all.map(|i| flows[i].id()),
            pending_key,
            "flow registry built"
        );

        Ok(Self {
            flows,
            index,
            catch_all,
            pending_key: pending_key.to_string(),
        })
    }

    /// Flows in registration order.
    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn get(&self, id: &str) -> Option<&Flow> {
        self.index.get(id).map(|&i| &self.flows[i])
    }

    pub fn catch_all(&self) -> Option<&Flow> {
        self.catch_all.map(|i| &self.flows[i])
    }

    pub fn pending_key(&self) -> &str {
        &self.pending_key
    }

    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

fn flows_id(flows: &[Flow], i: usize) -> String {
    flows[i].id().to_string()
}

fn branch_depth(actions: &[Action]) -> usize {
    actions
        .iter()
        .map(|action| match action {
            Action::Branch {
                then_actions,
                else_actions,
                ..
            } => 1 + branch_depth(then_actions).max(branch_depth(else_actions)),
            _ => 0,
        })
        .max()
        .unwrap_or(0)
}

fn collect_pending_targets<'a>(actions: &'a [Action], pending_key: &str, out: &mut Vec<&'a str>) {
    for action in actions {
        match action {
            Action::SetState { key, value } if key == pending_key => out.push(value),
            Action::Branch {
                then_actions,
                else_actions,
                ..
            } => {
                collect_pending_targets(then_actions, pending_key, out);
                collect_pending_targets(else_actions, pending_key, out);
            },
            _ => {},
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::flow::Predicate;

    fn def(id: &str, keywords: &[&str], actions: Vec<Action>) -> FlowDefinition {
        FlowDefinition {
            id: id.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            continuation: false,
            actions,
        }
    }

    fn nested_branch(depth: usize) -> Vec<Action> {
        let mut actions = vec![Action::send("leaf")];
        for _ in 0..depth {
            actions = vec![Action::Branch {
                when: Predicate::Exists { key: "x".into() },
                then_actions: actions,
                else_actions: Vec::new(),
            }];
        }
        actions
    }

    #[test]
    fn keeps_registration_order_and_normalizes_keywords() {
        let reg = FlowRegistry::from_definitions(
            vec![
                def("welcome", &[" hola ", "Ola", "HOLA"], vec![]),
                def("fallback", &[], vec![]),
            ],
            DEFAULT_PENDING_KEY,
        )
        .unwrap();
        let ids: Vec<_> = reg.flows().iter().map(Flow::id).collect();
        assert_eq!(ids, ["welcome", "fallback"]);
        assert_eq!(reg.get("welcome").unwrap().keywords(), ["HOLA", "OLA"]);
        assert_eq!(reg.catch_all().map(Flow::id), Some("fallback"));
        assert_eq!(reg.pending_key(), DEFAULT_PENDING_KEY);
    }

    #[test]
    fn rejects_second_catch_all() {
        let err = FlowRegistry::from_definitions(
            vec![def("a", &[], vec![]), def("b", &[], vec![])],
            DEFAULT_PENDING_KEY,
        )
        .unwrap_err();
        match err {
            Error::DuplicateCatchAll { first, second } => {
                assert_eq!(first, "a");
                assert_eq!(second, "b");
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn continuation_without_keywords_is_not_catch_all() {
        let mut cont = def("after_quote", &[], vec![Action::ClearState]);
        cont.continuation = true;
        let reg = FlowRegistry::from_definitions(
            vec![cont, def("fallback", &[], vec![])],
            DEFAULT_PENDING_KEY,
        )
        .unwrap();
        assert_eq!(reg.catch_all().map(Flow::id), Some("fallback"));
        assert!(reg.get("after_quote").unwrap().is_continuation());
    }

    #[test]
    fn rejects_duplicate_and_empty_ids() {
        assert!(matches!(
            FlowRegistry::from_definitions(
                vec![def("a", &["X"], vec![]), def(" a ", &["Y"], vec![])],
                DEFAULT_PENDING_KEY
            ),
            Err(Error::DuplicateFlowId { .. })
        ));
        assert!(matches!(
            FlowRegistry::from_definitions(vec![def("  ", &["X"], vec![])], DEFAULT_PENDING_KEY),
            Err(Error::EmptyFlowId { index: 0 })
        ));
    }

    #[test]
    fn rejects_blank_keyword() {
        assert!(matches!(
            FlowRegistry::from_definitions(vec![def("a", &["  "], vec![])], DEFAULT_PENDING_KEY),
            Err(Error::EmptyKeyword { .. })
        ));
    }

    #[test]
    fn rejects_unknown_continuation_target_even_inside_branches() {
        let actions = vec![Action::Branch {
            when: Predicate::Exists { key: "x".into() },
            then_actions: vec![],
            else_actions: vec![Action::set(DEFAULT_PENDING_KEY, "nowhere")],
        }];
        let err =
            FlowRegistry::from_definitions(vec![def("a", &["1"], actions)], DEFAULT_PENDING_KEY)
                .unwrap_err();
        assert!(matches!(err, Error::UnknownContinuation { ref target, .. } if target == "nowhere"));
    }

    #[test]
    fn accepts_known_continuation_target() {
        let mut cont = def("after_quote", &[], vec![Action::ClearState]);
        cont.continuation = true;
        let reg = FlowRegistry::from_definitions(
            vec![
                def("services", &["1"], vec![Action::set("step", "after_quote")]),
                cont,
            ],
            "step",
        )
        .unwrap();
        assert_eq!(reg.pending_key(), "step");
    }

    #[test]
    fn other_state_keys_are_not_continuation_targets() {
        let reg = FlowRegistry::from_definitions(
            vec![def("a", &["1"], vec![Action::set("lang", "es")])],
            DEFAULT_PENDING_KEY,
        );
        assert!(reg.is_ok());
    }

    #[test]
    fn branch_depth_is_bounded() {
        assert!(
            FlowRegistry::from_definitions(
                vec![def("ok", &["A"], nested_branch(MAX_BRANCH_DEPTH))],
                DEFAULT_PENDING_KEY
            )
            .is_ok()
        );
        assert!(matches!(
            FlowRegistry::from_definitions(
                vec![def("deep", &["A"], nested_branch(MAX_BRANCH_DEPTH + 1))],
                DEFAULT_PENDING_KEY
            ),
            Err(Error::BranchTooDeep { .. })
        ));
    }

    #[test]
    fn rejects_blank_pending_key() {
        assert!(matches!(
            FlowRegistry::from_definitions(vec![], " "),
            Err(Error::EmptyPendingKey)
        ));
    }
}
