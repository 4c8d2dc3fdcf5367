//! Tile source descriptions and template expansion.
//!
//! A source is described by its [`SourceKind`] and a template string with
//! `{x}`, `{y}` and `{z}` placeholders, e.g.
//! `https://tile.openstreetmap.org/{z}/{x}/{y}.png`.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::SourceError;
use crate::tile::TileAddress;

/// Template of the "no source" sentinel.
pub const INVALID_TEMPLATE: &str = "tile_server_invalid";

/// URL scheme marking a template as resolved against an [`AssetBundle`](super::AssetBundle).
pub const BUNDLED_SCHEME: &str = "bundled://";

/// Resource prefix accepted as an alias of [`BUNDLED_SCHEME`].
pub const BUNDLED_RESOURCE_PREFIX: &str = ":/";

const PLACEHOLDERS: [&str; 3] = ["{x}", "{y}", "{z}"];

/// Where tile bytes come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// HTTP(S) tile server
    Remote,
    /// Image files on the local filesystem
    Local,
    /// Assets packaged with the application
    Bundled,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Remote => write!(f, "remote"),
            SourceKind::Local => write!(f, "local"),
            SourceKind::Bundled => write!(f, "bundled"),
        }
    }
}

// =============================================================================
// Tile Source Config
// =============================================================================

/// A tile source: its kind plus the URL or path template.
///
/// Two configs are equal when both kind and template match; the backup list
/// deduplicates on this equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileSourceConfig {
    kind: SourceKind,
    template: String,
}

impl TileSourceConfig {
    /// Build a config, checking the template against its kind.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidConfiguration`] if the template lacks one of
    /// the `{x}`, `{y}`, `{z}` placeholders, or if a remote template does not
    /// expand to an absolute `http`/`https` URL.
    pub fn new(kind: SourceKind, template: impl Into<String>) -> Result<Self, SourceError> {
        let config = Self {
            kind,
            template: template.into(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn remote(template: impl Into<String>) -> Result<Self, SourceError> {
        Self::new(SourceKind::Remote, template)
    }

    pub fn local(template: impl Into<String>) -> Result<Self, SourceError> {
        Self::new(SourceKind::Local, template)
    }

    pub fn bundled(template: impl Into<String>) -> Result<Self, SourceError> {
        Self::new(SourceKind::Bundled, template)
    }

    /// Infer the kind from the template text.
    ///
    /// `http://` and `https://` are remote, `bundled://` and `:/` are
    /// bundled, anything else is a local path.
    pub fn parse(template: &str) -> Result<Self, SourceError> {
        let template = template.trim();
        let lower = template.to_ascii_lowercase();

        let kind = if lower.starts_with("http://") || lower.starts_with("https://") {
            SourceKind::Remote
        } else if lower.starts_with(BUNDLED_SCHEME) || template.starts_with(BUNDLED_RESOURCE_PREFIX)
        {
            SourceKind::Bundled
        } else {
            SourceKind::Local
        };

        Self::new(kind, template)
    }

    /// The sentinel active before any source has been set successfully.
    pub fn invalid() -> Self {
        Self {
            kind: SourceKind::Remote,
            template: INVALID_TEMPLATE.to_string(),
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.template == INVALID_TEMPLATE
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Substitute an address into the template.
    pub fn format(&self, address: &TileAddress) -> String {
        self.template
            .replace("{x}", &address.x.to_string())
            .replace("{y}", &address.y.to_string())
            .replace("{z}", &address.zoom.to_string())
    }

    /// Path inside an asset bundle for a bundled template, with the bundle
    /// prefix and any leading slash stripped.
    pub fn bundle_key(&self, address: &TileAddress) -> String {
        let formatted = self.format(address);
        let stripped = strip_prefix_ignore_case(&formatted, BUNDLED_SCHEME)
            .or_else(|| formatted.strip_prefix(BUNDLED_RESOURCE_PREFIX))
            .unwrap_or(&formatted);
        stripped.trim_start_matches('/').to_string()
    }

    fn validate(&self) -> Result<(), SourceError> {
        if self.template.trim().is_empty() {
            return Err(SourceError::InvalidConfiguration(
                "tile source template is empty".to_string(),
            ));
        }

        let missing: Vec<&str> = PLACEHOLDERS
            .iter()
            .copied()
            .filter(|p| !self.template.contains(p))
            .collect();
        if !missing.is_empty() {
            return Err(SourceError::InvalidConfiguration(format!(
                "template {:?} is missing {}",
                self.template,
                missing.join(", ")
            )));
        }

        if self.kind == SourceKind::Remote {
            let sample = self.format(&TileAddress::root());
            let url = Url::parse(&sample).map_err(|e| {
                SourceError::InvalidConfiguration(format!("invalid URL {:?}: {}", self.template, e))
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(SourceError::InvalidConfiguration(format!(
                    "unsupported URL scheme {:?}",
                    url.scheme()
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for TileSourceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind, self.template)
    }
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if s.len() >= prefix.len() && s[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&s[prefix.len()..])
    } else {
        None
    }
}
