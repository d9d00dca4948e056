//! Provider identity and metadata.
//!
//! A provider is one library or catalog source. Its metadata is owned by the
//! provider registry; accounts keep a snapshot of it inside their description
//! and refresh it when the registry hands out a newer version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The stable identity URI of a provider.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Creates a provider ID from its identity URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Returns the identity URI.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProviderId({})", self.0)
    }
}

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProviderId {
    fn from(uri: &str) -> Self {
        Self::new(uri)
    }
}

impl From<String> for ProviderId {
    fn from(uri: String) -> Self {
        Self(uri)
    }
}

/// A snapshot of a provider's metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescription {
    /// Identity URI.
    pub id: ProviderId,
    /// Display name.
    pub title: String,
    /// Optional tagline.
    #[serde(default)]
    pub subtitle: Option<String>,
    /// Root catalog feed.
    #[serde(default, rename = "catalogURI")]
    pub catalog_uri: Option<String>,
    /// When the registry last changed this metadata.
    pub updated: DateTime<Utc>,
}

impl ProviderDescription {
    /// Creates a description with just an identity, title and timestamp.
    pub fn new(
        id: impl Into<ProviderId>,
        title: impl Into<String>,
        updated: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            subtitle: None,
            catalog_uri: None,
            updated,
        }
    }

    /// Sets the subtitle.
    #[must_use]
    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    /// Sets the catalog URI.
    #[must_use]
    pub fn with_catalog_uri(mut self, uri: impl Into<String>) -> Self {
        self.catalog_uri = Some(uri.into());
        self
    }

    /// Whether `self` is strictly more recent than `other`.
    #[must_use]
    pub fn is_newer_than(&self, other: &Self) -> bool {
        self.updated > other.updated
    }
}

/// Resolves provider identities to full metadata.
///
/// The registry behind this is network-facing and lives outside this crate;
/// the database only consults it while loading accounts.
pub trait ProviderResolver {
    /// Returns the current metadata for `id`, if known.
    fn resolve(&self, id: &ProviderId) -> Option<ProviderDescription>;
}

impl<F> ProviderResolver for F
where
    F: Fn(&ProviderId) -> Option<ProviderDescription>,
{
    fn resolve(&self, id: &ProviderId) -> Option<ProviderDescription> {
        self(id)
    }
}
