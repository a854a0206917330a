//! Candidate credentials of one call.

use gatekeeper_sdk::CallMetadata;
use http::HeaderMap;
use http::header::{AUTHORIZATION, COOKIE, HeaderName};
use kubegate_security::constants;

/// Credentials to try, in order.
///
/// The first `authorization` header wins outright. Without one, every
/// `authorization` cookie is a candidate (wildcard-domain cookies can yield
/// several). With neither, a single empty credential is returned so that
/// Server mode can match a call that carries nothing.
#[must_use]
pub fn candidates(metadata: &CallMetadata) -> Vec<String> {
    if let Some(header) = metadata.authorization.first() {
        return vec![header.clone()];
    }
    let from_cookies: Vec<String> = metadata
        .cookies
        .iter()
        .flat_map(|header| cookie_values(header, constants::AUTHORIZATION))
        .collect();
    if from_cookies.is_empty() {
        vec![String::new()]
    } else {
        from_cookies
    }
}

/// Values of every cookie called `name` in one `Cookie` header.
fn cookie_values<'a>(header: &'a str, name: &'a str) -> impl Iterator<Item = String> + 'a {
    header.split(';').filter_map(move |pair| {
        let (key, value) = pair.trim().split_once('=')?;
        (key.trim() == name).then(|| strip_quotes(value.trim()).to_owned())
    })
}

fn strip_quotes(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

/// Collect credential-bearing headers of an HTTP request.
///
/// Values that are not visible ASCII are skipped.
#[must_use]
pub fn metadata_from_headers(headers: &HeaderMap) -> CallMetadata {
    let values = |name: HeaderName| {
        headers
            .get_all(name)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .map(str::to_owned)
            .collect::<Vec<_>>()
    };
    CallMetadata {
        authorization: values(AUTHORIZATION),
        cookies: values(COOKIE),
    }
}
