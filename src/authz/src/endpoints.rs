//! Engine API path patterns the plugin reacts to
//!
//! Compiled once at startup and shared read-only by every call.

use crate::error::{AuthzError, Result};
use regex::Regex;

/// Paths allowed without any evaluation: health check and image metadata
pub const DEFAULT_SKIP_ENDPOINTS: &[&str] = &[r"^/_ping", r"^/distribution/(.+)/json"];

const CONTAINER_CREATE: &str = r"^/v\d+\.\d+/containers/create";
const CONTAINER_CREATE_UNVERSIONED: &str = "/containers/create";
const CONTAINER_ITEM: &str = r"^/v\d+\.\d+/containers/[^/]+";

/// Compiled endpoint patterns
#[derive(Debug, Clone)]
pub struct Endpoints {
    skip: Vec<Regex>,
    bypass_options: bool,
    container_create: Regex,
    container_item: Regex,
}

impl Endpoints {
    /// Compile the skip list; OPTIONS requests bypass evaluation
    pub fn new<S: AsRef<str>>(skip_patterns: &[S]) -> Result<Self> {
        let skip = skip_patterns
            .iter()
            .map(|p| compile(p.as_ref()))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            skip,
            bypass_options: true,
            container_create: compile(CONTAINER_CREATE)?,
            container_item: compile(CONTAINER_ITEM)?,
        })
    }

    /// Endpoints with the default skip list
    pub fn standard() -> Result<Self> {
        Self::new(DEFAULT_SKIP_ENDPOINTS)
    }

    /// Whether OPTIONS requests skip evaluation
    pub fn with_options_bypass(mut self, bypass: bool) -> Self {
        self.bypass_options = bypass;
        self
    }

    /// Should this call be allowed without looking at it?
    pub fn is_skipped(&self, method: &str, path: &str) -> bool {
        (self.bypass_options && method.eq_ignore_ascii_case("OPTIONS"))
            || self.skip.iter().any(|re| re.is_match(path))
    }

    /// Container creation endpoint, versioned or not
    pub fn is_container_create(&self, path: &str) -> bool {
        path == CONTAINER_CREATE_UNVERSIONED || self.container_create.is_match(path)
    }

    /// Versioned per-container endpoint (`/v1.40/containers/<id>`)
    pub fn is_container_item(&self, path: &str) -> bool {
        self.container_item.is_match(path)
    }
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern)
        .map_err(|e| AuthzError::Config(format!("invalid endpoint pattern {:?}: {}", pattern, e)))
}
