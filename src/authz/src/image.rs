//! Image reference parsing.
//!
//! Splits the free-form image identifier a client asks the engine to pull
//! (`ubuntu`, `myorg/app:1.2`, `registry.example.com:5000/team/app@sha256:..`)
//! into the parts policy checks are keyed on.
//!
//! Parsing is total: anything that does not start with a registry-host-like
//! segment is treated as an image on the default registry.

use std::fmt;

/// Host form that is a registry even without a dot or port
const LOCALHOST: &str = "localhost";

/// Parsed image reference
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    /// Image lives in the implicit default namespace (no registry, single segment)
    pub official: bool,

    /// Registry host (with optional port); empty for the default registry
    pub registry: String,

    /// Repository path, possibly with nested namespace segments.
    /// Never carries the tag or digest.
    pub path: String,

    /// Tag, when the identifier carried one
    pub tag: Option<String>,

    /// Content digest, when the identifier carried one
    pub digest: Option<String>,
}

impl ImageReference {
    /// Parse an image identifier. Never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use hbm_authz::image::ImageReference;
    ///
    /// let image = ImageReference::parse("ubuntu");
    /// assert!(image.official);
    ///
    /// let image = ImageReference::parse("quay.io/myorg/app:v2");
    /// assert_eq!(image.registry, "quay.io");
    /// assert_eq!(image.path, "myorg/app");
    /// assert_eq!(image.tag.as_deref(), Some("v2"));
    /// ```
    pub fn parse(raw: &str) -> Self {
        let (name, digest) = split_digest(raw);
        let (registry, remainder) = split_registry(name);
        let (path, tag) = split_tag(remainder);

        let official = registry.is_empty() && !path.contains('/');

        Self {
            official,
            registry: registry.to_string(),
            path: path.to_string(),
            tag: tag.map(str::to_string),
            digest: digest.map(str::to_string),
        }
    }

    /// Set the tag if the identifier did not carry one
    ///
    /// Policy questions are keyed on `registry` and `path` only, so the tag
    /// never reaches the policy store: grants cannot be pinned to a tag. The
    /// tag is kept for display and logging.
    pub fn with_default_tag(mut self, tag: Option<&str>) -> Self {
        if self.tag.is_none() && self.digest.is_none() {
            self.tag = tag.filter(|t| !t.is_empty()).map(str::to_string);
        }
        self
    }

    /// Namespace directly above the repository (`myorg` for `myorg/app`)
    pub fn parent_dir(&self) -> Option<&str> {
        self.path
            .rfind('/')
            .map(|idx| &self.path[..idx])
            .filter(|dir| !dir.is_empty())
    }

    /// Every enclosing namespace, nearest first
    ///
    /// `a/b/c` yields `a/b` then `a`.
    pub fn ancestors(&self) -> impl Iterator<Item = &str> {
        let path = self.path.as_str();
        path.char_indices()
            .filter(|(_, c)| *c == '/')
            .map(move |(idx, _)| &path[..idx])
            .filter(|dir| !dir.is_empty())
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.registry.is_empty() {
            write!(f, "{}/", self.registry)?;
        }
        f.write_str(&self.path)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Split off `@algorithm:hex`. A candidate containing `/` is not a digest.
fn split_digest(raw: &str) -> (&str, Option<&str>) {
    match raw.rfind('@') {
        Some(at) => {
            let digest = &raw[at + 1..];
            if digest.contains(':') && !digest.contains('/') {
                (&raw[..at], Some(digest))
            } else {
                (raw, None)
            }
        }
        None => (raw, None),
    }
}

/// Split off a leading `host[:port]/` segment
fn split_registry(name: &str) -> (&str, &str) {
    if let Some(slash) = name.find('/') {
        let first = &name[..slash];
        if first.contains('.') || first.contains(':') || first == LOCALHOST {
            return (first, &name[slash + 1..]);
        }
    }
    ("", name)
}

/// Split off `:tag`, which can only appear in the last path segment
fn split_tag(remainder: &str) -> (&str, Option<&str>) {
    let last_segment_start = remainder.rfind('/').map(|idx| idx + 1).unwrap_or(0);
    match remainder[last_segment_start..].rfind(':') {
        Some(colon) => {
            let colon = last_segment_start + colon;
            (&remainder[..colon], Some(&remainder[colon + 1..]))
        }
        None => (remainder, None),
    }
}
