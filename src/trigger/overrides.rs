//! Local overrides applied to a fetched test

use std::collections::HashMap;
use std::sync::OnceLock;

use regex_lite::{Captures, Regex};
use synthetics_protocol::{ExecutionRule, Test, TestPayload, TestType, UserConfigOverride};

use super::rules::get_strictest_execution_rule;

fn template_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").unwrap())
}

/// Replace `{{ NAME }}` tokens with their value in `variables`.
///
/// Tokens naming an unknown variable are left untouched.
pub fn render_template(template: &str, variables: &HashMap<String, String>) -> String {
    template_regex()
        .replace_all(template, |caps: &Captures<'_>| match variables.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Rule sent with the payload, only when the override sets one
fn overridden_execution_rule(test: &Test, config: &UserConfigOverride) -> Option<ExecutionRule> {
    config
        .execution_rule
        .map(|rule| get_strictest_execution_rule(rule, test.ci_execution_rule()))
}

/// Build the payload that triggers `test` with `config` applied.
///
/// An empty override yields a payload carrying only the public id, so the
/// backend runs the test as saved. `startUrl` only applies to browser and
/// HTTP tests and is rendered against `variables`.
pub fn get_overridden_config(
    test: &Test,
    public_id: &str,
    config: &UserConfigOverride,
    variables: &HashMap<String, String>,
) -> TestPayload {
    let mut payload = TestPayload::new(public_id);

    if config.is_empty() {
        return payload;
    }

    payload.execution_rule = overridden_execution_rule(test, config);

    payload.base = config.base.clone();
    payload.base.start_url = None;

    if test.test_type == TestType::Browser || test.subtype_is("http") {
        payload.base.start_url = config
            .base
            .start_url
            .as_deref()
            .map(|url| render_template(url, variables));
    }

    payload
}
