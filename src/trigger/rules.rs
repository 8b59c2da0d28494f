//! Execution rule resolution

use synthetics_protocol::{ExecutionRule, Test, UserConfigOverride};

/// Strictest of a configured rule and a test's own rule.
///
/// A test without a rule counts as blocking.
pub fn get_strictest_execution_rule(
    config_rule: ExecutionRule,
    test_rule: Option<ExecutionRule>,
) -> ExecutionRule {
    config_rule.max(test_rule.unwrap_or_default())
}

/// Effective rule of a test given an optional local override.
pub fn resolve_execution_rule(
    override_rule: Option<ExecutionRule>,
    server_rule: Option<ExecutionRule>,
) -> ExecutionRule {
    match override_rule {
        Some(rule) => get_strictest_execution_rule(rule, server_rule),
        None => server_rule.unwrap_or_default(),
    }
}

/// Effective rule of an (optionally fetched) test under its override
pub fn get_execution_rule(
    test: Option<&Test>,
    config: Option<&UserConfigOverride>,
) -> ExecutionRule {
    resolve_execution_rule(
        config.and_then(|c| c.execution_rule),
        test.and_then(Test::ci_execution_rule),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthetics_protocol::TestType;
    use synthetics_protocol::ExecutionRule::*;

    const RULES: [Option<ExecutionRule>; 4] =
        [None, Some(Blocking), Some(NonBlocking), Some(Skipped)];

    fn expected(a: Option<ExecutionRule>, b: Option<ExecutionRule>) -> ExecutionRule {
        if a == Some(Skipped) || b == Some(Skipped) {
            Skipped
        } else if a == Some(NonBlocking) || b == Some(NonBlocking) {
            NonBlocking
        } else {
            Blocking
        }
    }

    #[test]
    fn test_resolve_all_pairs() {
        for override_rule in RULES {
            for server_rule in RULES {
                assert_eq!(
                    resolve_execution_rule(override_rule, server_rule),
                    expected(override_rule, server_rule),
                    "override={:?} server={:?}",
                    override_rule,
                    server_rule
                );
            }
        }
    }

    #[test]
    fn test_strictest_defaults_to_blocking() {
        assert_eq!(get_strictest_execution_rule(Blocking, None), Blocking);
        assert_eq!(get_strictest_execution_rule(NonBlocking, Some(Blocking)), NonBlocking);
        assert_eq!(get_strictest_execution_rule(Blocking, Some(Skipped)), Skipped);
    }

    #[test]
    fn test_get_execution_rule() {
        let test = Test::new("abc-def-ghi", TestType::Api).with_ci_execution_rule(NonBlocking);
        let config = UserConfigOverride {
            execution_rule: Some(Blocking),
            ..Default::default()
        };

        assert_eq!(get_execution_rule(Some(&test), Some(&config)), NonBlocking);
        assert_eq!(get_execution_rule(Some(&test), None), NonBlocking);
        assert_eq!(get_execution_rule(None, Some(&config)), Blocking);
        assert_eq!(get_execution_rule(None, None), Blocking);
    }
}
