//! Public id helpers.

use std::sync::OnceLock;

use regex_lite::Regex;

fn public_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[0-9A-Za-z_]{3}-[0-9A-Za-z_]{3}-[0-9A-Za-z_]{3}$").unwrap())
}

/// Whether `id` has the `xxx-xxx-xxx` public id shape
pub fn is_public_id(id: &str) -> bool {
    public_id_regex().is_match(id)
}

/// Public id from either a bare id or a test URL/path.
///
/// Anything that is not a bare public id is treated as a URL and its last
/// path segment is returned.
pub fn normalize_public_id(id: &str) -> String {
    if is_public_id(id) {
        return id.to_string();
    }

    id.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(id)
        .to_string()
}
