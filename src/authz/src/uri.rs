//! Strict parsing of the request URI the engine forwards to the plugin
//!
//! The target is split at the first `?` rather than validated as an RFC 3986
//! URI: the engine passes through raw characters such as `{` and `"` in
//! query strings. What must hold is that every `%` starts a valid escape,
//! since `url::form_urlencoded` silently passes malformed escapes through.
//! A malformed URI must produce an error so pre-call checks can fail closed.

use crate::error::{AuthzError, Result};

/// Path and decoded query parameters of an engine API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestUri {
    path: String,
    params: Vec<(String, String)>,
}

/// Split an origin-form request target into path and query, dropping any fragment
///
/// Performs no validation; the path can be matched before the query is parsed.
pub fn split_target(raw: &str) -> (&str, Option<&str>) {
    let target = raw.split_once('#').map_or(raw, |(before, _)| before);
    match target.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (target, None),
    }
}

impl RequestUri {
    /// Parse an origin-form request target such as `/v1.40/containers/create?name=web1`
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.chars().any(|c| c.is_ascii_control()) {
            return Err(AuthzError::InvalidInput(format!(
                "control character in request URI {:?}",
                raw
            )));
        }

        let (path, query) = split_target(raw);
        if !path.starts_with('/') {
            return Err(AuthzError::InvalidInput(format!(
                "request URI {:?} is not an absolute path",
                raw
            )));
        }
        check_escapes(path)?;

        let params = match query {
            Some(query) => {
                check_escapes(query)?;
                url::form_urlencoded::parse(query.as_bytes())
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect()
            }
            None => Vec::new(),
        };

        Ok(Self {
            path: path.to_string(),
            params,
        })
    }

    /// Request path without the query
    pub fn path(&self) -> &str {
        &self.path
    }

    /// First value of a query parameter
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Non-empty path segments (`/v1.40/containers/abc` → `["v1.40", "containers", "abc"]`)
    pub fn segments(&self) -> Vec<&str> {
        self.path
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .collect()
    }
}

fn check_escapes(s: &str) -> Result<()> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes.len() > i + 2
                && bytes[i + 1].is_ascii_hexdigit()
                && bytes[i + 2].is_ascii_hexdigit();
            if !valid {
                return Err(AuthzError::InvalidInput(format!(
                    "invalid percent-encoding at byte {} of {:?}",
                    i, s
                )));
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    Ok(())
}
