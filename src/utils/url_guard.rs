use crate::error::{Error, Result};
use url::Url;

// Providers that accept user-configured webhook URLs and the exact
// host + path prefixes we will deliver to. Anything else is refused
// before a request is issued.
const ALLOWED_PREFIXES: &[(&str, &[&str])] = &[
    ("zapier", &["https://hooks.zapier.com/hooks/"]),
    ("slack", &["https://hooks.slack.com/services/"]),
    (
        "teams",
        &[
            "https://outlook.office.com/webhook/",
            "https://outlook.office365.com/webhook/",
        ],
    ),
];

pub fn validate_outbound_url(provider: &str, raw_url: &str, extra_allow: &[String]) -> Result<Url> {
    let url = Url::parse(raw_url)
        .map_err(|_| Error::Forbidden(format!("Invalid webhook URL for {}", provider)))?;

    if url.scheme() != "https" {
        return Err(Error::Forbidden(format!(
            "Webhook URL for {} must use https",
            provider
        )));
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(Error::Forbidden(format!(
            "Webhook URL for {} must not embed credentials",
            provider
        )));
    }

    let static_prefixes = ALLOWED_PREFIXES
        .iter()
        .find(|(id, _)| *id == provider)
        .map(|(_, prefixes)| *prefixes)
        .unwrap_or(&[]);

    let matches_static = static_prefixes.iter().any(|prefix| prefix_match(&url, prefix));
    let matches_extra = provider == "custom_api"
        && extra_allow.iter().any(|prefix| prefix_match(&url, prefix));

    if matches_static || matches_extra {
        Ok(url)
    } else {
        Err(Error::Forbidden(format!(
            "Webhook URL not allow-listed for {}",
            provider
        )))
    }
}

// Host must match exactly (no look-alike domains); the path is a
// prefix check against the parsed allow-list entry.
fn prefix_match(candidate: &Url, allowed_prefix: &str) -> bool {
    let Ok(allowed) = Url::parse(allowed_prefix) else {
        return false;
    };
    if allowed.scheme() != "https" {
        return false;
    }
    let (Some(candidate_host), Some(allowed_host)) = (candidate.host_str(), allowed.host_str())
    else {
        return false;
    };
    if !candidate_host.eq_ignore_ascii_case(allowed_host) {
        return false;
    }
    if candidate.port_or_known_default() != allowed.port_or_known_default() {
        return false;
    }
    candidate.path().starts_with(allowed.path())
}
