use crate::{flow::Flow, registry::FlowRegistry};

/// Why a flow was selected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchReason {
    /// The whole message equals this (normalized) keyword.
    Keyword(String),
    /// No keyword flow matched; the registry's catch-all was chosen.
    CatchAll,
}

#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub flow: &'a Flow,
    pub reason: MatchReason,
}

/// Normalize message text for keyword comparison: trim, then uppercase.
pub fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

/// Pick the flow for `text`.
///
/// Keyword flows are tried in registration order and the first whole-message
/// match wins. The catch-all is only considered after every keyword flow has
/// been tried.
pub fn match_flow<'a>(text: &str, registry: &'a FlowRegistry) -> Option<RouteMatch<'a>> {
    let normalized = normalize(text);
    if !normalized.is_empty() {
        for flow in registry.flows() {
            if let Some(kw) = flow.keyword_for(&normalized) {
                return Some(RouteMatch {
                    flow,
                    reason: MatchReason::Keyword(kw.to_string()),
                });
            }
        }
    }
    registry.catch_all().map(|flow| RouteMatch {
        flow,
        reason: MatchReason::CatchAll,
    })
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::{
        flow::{Action, FlowDefinition},
        registry::DEFAULT_PENDING_KEY,
    };

    fn def(id: &str, keywords: &[&str]) -> FlowDefinition {
        FlowDefinition {
            id: id.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            continuation: false,
            actions: vec![Action::send(id)],
        }
    }

    fn registry(with_catch_all: bool) -> FlowRegistry {
        let mut defs = vec![
            def("welcome", &["HOLA", "OLA", "BUENAS"]),
            def("services", &["1"]),
            def("shadow", &["hola"]),
        ];
        if with_catch_all {
            defs.push(def("fallback", &[]));
        }
        FlowRegistry::from_definitions(defs, DEFAULT_PENDING_KEY).unwrap()
    }

    #[rstest]
    #[case("HOLA", "welcome")]
    #[case("hola", "welcome")]
    #[case("  Hola \n", "welcome")]
    #[case("buenas", "welcome")]
    #[case("1", "services")]
    #[case(" 1 ", "services")]
    fn keyword_matches_whole_message(#[case] text: &str, #[case] expected: &str) {
        let reg = registry(true);
        let m = match_flow(text, &reg).unwrap();
        assert_eq!(m.flow.id(), expected);
        assert!(matches!(m.reason, MatchReason::Keyword(_)));
    }

    #[rstest]
    #[case("hola amigo")]
    #[case("HOLAS")]
    #[case("11")]
    #[case("1.")]
    #[case("")]
    #[case("   ")]
    fn substrings_fall_through_to_catch_all(#[case] text: &str) {
        let reg = registry(true);
        let m = match_flow(text, &reg).unwrap();
        assert_eq!(m.flow.id(), "fallback");
        assert_eq!(m.reason, MatchReason::CatchAll);
    }

    #[test]
    fn first_registered_flow_wins() {
        let reg = registry(false);
        assert_eq!(match_flow("HOLA", &reg).unwrap().flow.id(), "welcome");
    }

    #[test]
    fn no_match_without_catch_all_is_none() {
        let reg = registry(false);
        assert!(match_flow("xyz", &reg).is_none());
    }

    #[test]
    fn keyword_match_never_falls_through() {
        let reg = registry(true);
        let m = match_flow("ola", &reg).unwrap();
        assert_eq!(m.reason, MatchReason::Keyword("OLA".into()));
    }

    #[test]
    fn unicode_uppercase() {
        let reg = FlowRegistry::from_definitions(
            vec![def("menu", &["menú"])],
            DEFAULT_PENDING_KEY,
        )
        .unwrap();
        assert_eq!(match_flow("MENÚ", &reg).unwrap().flow.id(), "menu");
    }
}
