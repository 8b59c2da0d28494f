//! Links into the synthetics app and small display helpers

use synthetics_protocol::{ServerResult, Test, TestType};

pub const DEFAULT_SUBDOMAIN: &str = "app";

/// Base URL of the web app for a site, ending with `/`.
///
/// Three-part sites (`us3.datadoghq.com`) already name their own app
/// host; a custom subdomain replaces their first label.
pub fn get_app_base_url(site: &str, subdomain: &str) -> String {
    let subdomain = if subdomain.is_empty() { DEFAULT_SUBDOMAIN } else { subdomain };
    let parts: Vec<&str> = site.split('.').collect();

    if parts.len() == 3 {
        if subdomain == DEFAULT_SUBDOMAIN {
            return format!("https://{}/", site);
        }
        return format!("https://{}.{}.{}/", subdomain, parts[1], parts[2]);
    }

    format!("https://{}.{}/", subdomain, site)
}

pub fn get_batch_url(base_url: &str, batch_id: &str) -> String {
    format!("{}synthetics/explorer/ci?batchResultId={}", base_url, batch_id)
}

pub fn get_result_url(base_url: &str, test: &Test, result_id: &str) -> String {
    if test.test_type == TestType::Browser {
        return format!(
            "{}synthetics/details/{}/result/{}?from_ci=true",
            base_url, test.public_id, result_id
        );
    }

    format!(
        "{}synthetics/details/{}?resultId={}&from_ci=true",
        base_url, test.public_id, result_id
    )
}

/// Duration of a result in milliseconds
pub fn get_result_duration(result: &ServerResult) -> u64 {
    result
        .duration
        .or_else(|| result.timings.and_then(|t| t.total))
        .map(|ms| ms.max(0.0).round() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use synthetics_protocol::Timings;

    #[test]
    fn test_app_base_url() {
        assert_eq!(get_app_base_url("datadoghq.com", "app"), "https://app.datadoghq.com/");
        assert_eq!(get_app_base_url("datadoghq.eu", ""), "https://app.datadoghq.eu/");
        assert_eq!(get_app_base_url("datadoghq.com", "myorg"), "https://myorg.datadoghq.com/");
        assert_eq!(get_app_base_url("us3.datadoghq.com", "app"), "https://us3.datadoghq.com/");
        assert_eq!(get_app_base_url("us3.datadoghq.com", "myorg"), "https://myorg.datadoghq.com/");
    }

    #[test]
    fn test_result_urls() {
        let base = "https://app.datadoghq.com/";
        let browser = Test::new("abc-def-ghi", TestType::Browser);
        let api = Test::new("abc-def-ghi", TestType::Api);

        assert_eq!(
            get_result_url(base, &browser, "123"),
            "https://app.datadoghq.com/synthetics/details/abc-def-ghi/result/123?from_ci=true"
        );
        assert_eq!(
            get_result_url(base, &api, "123"),
            "https://app.datadoghq.com/synthetics/details/abc-def-ghi?resultId=123&from_ci=true"
        );
        assert_eq!(
            get_batch_url(base, "b-1"),
            "https://app.datadoghq.com/synthetics/explorer/ci?batchResultId=b-1"
        );
    }

    #[test]
    fn test_result_duration() {
        let mut result = ServerResult {
            timings: Some(Timings { total: Some(41.6) }),
            ..Default::default()
        };
        assert_eq!(get_result_duration(&result), 42);

        result.duration = Some(1000.2);
        assert_eq!(get_result_duration(&result), 1000);

        assert_eq!(get_result_duration(&ServerResult::default()), 0);
    }
}
