//! Account descriptions and their on-disk document format.
//!
//! The current document (`@version` 2) embeds a full provider snapshot:
//!
//! ```json
//! { "@version": 2,
//!   "provider": { "id": "...", "title": "...", "updated": "..." },
//!   "preferences": { "bookmarkSyncingPermitted": false,
//!                    "catalogURIOverride": null,
//!                    "announcementsAcknowledged": [] } }
//! ```
//!
//! Version 1 documents (no `@version`, or `@version` 1) only stored the
//! provider's identity URI. They are resolved through the provider registry
//! on load and written back in the current format.

use crate::error::{AccountsError, AccountsResult};
use crate::provider::{ProviderDescription, ProviderId, ProviderResolver};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Version written by this release.
pub const DESCRIPTION_VERSION: u64 = 2;

const VERSION_KEY: &str = "@version";

/// Per-account preferences.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountPreferences {
    /// Whether bookmarks may be synced to the provider.
    #[serde(default)]
    pub bookmark_syncing_permitted: bool,
    /// Replaces the provider's catalog URI for this account.
    #[serde(default, rename = "catalogURIOverride")]
    pub catalog_uri_override: Option<String>,
    /// Announcement IDs the user has dismissed.
    #[serde(default)]
    pub announcements_acknowledged: Vec<String>,
}

/// The persisted description of an account: provider snapshot plus
/// preferences.
///
/// Descriptions are values; changing one means building a new description
/// and swapping it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountDescription {
    /// Provider metadata snapshot.
    pub provider: ProviderDescription,
    /// User preferences.
    pub preferences: AccountPreferences,
}

impl AccountDescription {
    /// Creates a description with default preferences.
    #[must_use]
    pub fn new(provider: ProviderDescription) -> Self {
        Self {
            provider,
            preferences: AccountPreferences::default(),
        }
    }

    /// Returns a copy carrying a different provider snapshot.
    #[must_use]
    pub fn with_provider(&self, provider: ProviderDescription) -> Self {
        Self {
            provider,
            preferences: self.preferences.clone(),
        }
    }

    /// Returns a copy carrying different preferences.
    #[must_use]
    pub fn with_preferences(&self, preferences: AccountPreferences) -> Self {
        Self {
            provider: self.provider.clone(),
            preferences,
        }
    }

    /// Encodes the description as a current-version document.
    pub fn encode(&self) -> AccountsResult<Vec<u8>> {
        let document = CurrentDocumentRef {
            version: DESCRIPTION_VERSION,
            provider: &self.provider,
            preferences: &self.preferences,
        };
        serde_json::to_vec_pretty(&document).map_err(AccountsError::Serialize)
    }
}

#[derive(Serialize)]
struct CurrentDocumentRef<'a> {
    #[serde(rename = "@version")]
    version: u64,
    provider: &'a ProviderDescription,
    preferences: &'a AccountPreferences,
}

#[derive(Deserialize)]
struct CurrentDocument {
    provider: ProviderDescription,
    #[serde(default)]
    preferences: AccountPreferences,
}

#[derive(Deserialize)]
struct LegacyDocument {
    provider: ProviderId,
    #[serde(default)]
    preferences: AccountPreferences,
}

/// A decoded `account.json`, in whichever version it was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptionDocument {
    /// A current document with an embedded provider snapshot.
    Current(AccountDescription),
    /// A version 1 document that only references its provider.
    Legacy {
        /// The referenced provider.
        provider: ProviderId,
        /// Stored preferences.
        preferences: AccountPreferences,
    },
}

impl DescriptionDocument {
    /// Reads and decodes the document at `path`.
    pub fn read(path: &Path) -> AccountsResult<Self> {
        let data = fs::read(path)?;
        Self::decode(&data, path)
    }

    /// Decodes a document; `path` is only used for error reporting.
    pub fn decode(data: &[u8], path: &Path) -> AccountsResult<Self> {
        let parse_error = |source| AccountsError::Parse {
            path: path.to_path_buf(),
            source,
        };

        let value: Value = serde_json::from_slice(data).map_err(parse_error)?;
        let version = match value.get(VERSION_KEY) {
            None => 1,
            Some(v) => v.as_u64().ok_or_else(|| {
                AccountsError::invalid_format(format!(
                    "{}: {VERSION_KEY} must be a non-negative integer",
                    path.display()
                ))
            })?,
        };

        match version {
            1 => {
                let doc: LegacyDocument = serde_json::from_value(value).map_err(parse_error)?;
                Ok(Self::Legacy {
                    provider: doc.provider,
                    preferences: doc.preferences,
                })
            }
            DESCRIPTION_VERSION => {
                let doc: CurrentDocument = serde_json::from_value(value).map_err(parse_error)?;
                Ok(Self::Current(AccountDescription {
                    provider: doc.provider,
                    preferences: doc.preferences,
                }))
            }
            other => Err(AccountsError::invalid_format(format!(
                "{}: unsupported description version {other}",
                path.display()
            ))),
        }
    }

    /// Returns the identity of the provider this document refers to.
    #[must_use]
    pub fn provider_id(&self) -> &ProviderId {
        match self {
            Self::Current(description) => &description.provider.id,
            Self::Legacy { provider, .. } => provider,
        }
    }

    /// Whether this document predates the current format.
    #[must_use]
    pub fn is_legacy(&self) -> bool {
        matches!(self, Self::Legacy { .. })
    }

    /// Produces the description to use at load time.
    ///
    /// Legacy references must resolve. Current snapshots are replaced only if
    /// the resolver knows a strictly newer version of the same provider. The
    /// returned flag is `true` when the result differs from what is on disk
    /// and should be written back.
    pub fn resolve(
        self,
        resolver: &dyn ProviderResolver,
    ) -> AccountsResult<(AccountDescription, bool)> {
        match self {
            Self::Legacy {
                provider,
                preferences,
            } => {
                let resolved = resolver
                    .resolve(&provider)
                    .filter(|p| p.id == provider)
                    .ok_or(AccountsError::UnresolvableProvider { provider })?;
                Ok((
                    AccountDescription {
                        provider: resolved,
                        preferences,
                    },
                    true,
                ))
            }
            Self::Current(description) => match resolver.resolve(&description.provider.id) {
                Some(fresh)
                    if fresh.id == description.provider.id
                        && fresh.is_newer_than(&description.provider) =>
                {
                    debug!(provider = %fresh.id, "adopting newer provider metadata");
                    Ok((description.with_provider(fresh), true))
                }
                _ => Ok((description, false)),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use proptest::prelude::*;

    fn provider(secs: i64) -> ProviderDescription {
        ProviderDescription::new("urn:lib:a", "Library A", Utc.timestamp_opt(secs, 0).unwrap())
    }

    fn path() -> &'static Path {
        Path::new("account.json")
    }

    #[test]
    fn current_document_round_trip() {
        let mut description = AccountDescription::new(provider(100));
        description.preferences.bookmark_syncing_permitted = true;
        description.preferences.announcements_acknowledged = vec!["a1".into()];

        let data = description.encode().unwrap();
        let decoded = DescriptionDocument::decode(&data, path()).unwrap();
        assert_eq!(decoded, DescriptionDocument::Current(description));
    }

    #[test]
    fn encoded_document_carries_version_and_field_names() {
        let data = AccountDescription::new(provider(0)).encode().unwrap();
        let value: Value = serde_json::from_slice(&data).unwrap();
        assert_eq!(value["@version"], 2);
        assert_eq!(value["preferences"]["bookmarkSyncingPermitted"], false);
        assert!(value["preferences"]["catalogURIOverride"].is_null());
        assert!(value["preferences"]["announcementsAcknowledged"].is_array());
    }

    #[test]
    fn unversioned_document_is_legacy() {
        let data =
            br#"{ "provider": "urn:lib:a", "preferences": { "bookmarkSyncingPermitted": true } }"#;
        let decoded = DescriptionDocument::decode(data, path()).unwrap();
        assert!(decoded.is_legacy());
        assert_eq!(decoded.provider_id().as_str(), "urn:lib:a");
    }

    #[test]
    fn future_version_is_rejected() {
        let data = br#"{ "@version": 3, "provider": "urn:lib:a" }"#;
        let result = DescriptionDocument::decode(data, path());
        assert!(matches!(result, Err(AccountsError::InvalidFormat { .. })));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let result = DescriptionDocument::decode(b"{ not json", path());
        assert!(matches!(result, Err(AccountsError::Parse { .. })));

        let result = DescriptionDocument::decode(b"", path());
        assert!(matches!(result, Err(AccountsError::Parse { .. })));
    }

    #[test]
    fn legacy_resolves_through_registry() {
        let doc = DescriptionDocument::Legacy {
            provider: ProviderId::from("urn:lib:a"),
            preferences: AccountPreferences::default(),
        };
        let resolver = |_: &ProviderId| Some(provider(5));
        let (description, rewrite) = doc.resolve(&resolver).unwrap();
        assert!(rewrite);
        assert_eq!(description.provider, provider(5));
    }

    #[test]
    fn unresolvable_legacy_fails() {
        let doc = DescriptionDocument::Legacy {
            provider: ProviderId::from("urn:lib:a"),
            preferences: AccountPreferences::default(),
        };
        let resolver = |_: &ProviderId| -> Option<ProviderDescription> { None };
        assert!(matches!(
            doc.resolve(&resolver),
            Err(AccountsError::UnresolvableProvider { .. })
        ));
    }

    #[test]
    fn current_keeps_snapshot_unless_resolver_is_newer() {
        let doc = DescriptionDocument::Current(AccountDescription::new(provider(50)));

        let older = |_: &ProviderId| Some(provider(10));
        let (kept, rewrite) = doc.clone().resolve(&older).unwrap();
        assert_eq!(kept.provider, provider(50));
        assert!(!rewrite);

        let newer = |_: &ProviderId| Some(provider(90));
        let (adopted, rewrite) = doc.resolve(&newer).unwrap();
        assert_eq!(adopted.provider, provider(90));
        assert!(rewrite);
    }

    fn text() -> impl Strategy<Value = String> {
        prop::string::string_regex("[a-zA-Z0-9 éß\"\\\\/]{0,16}").unwrap()
    }

    fn description_strategy() -> impl Strategy<Value = AccountDescription> {
        (
            "urn:[a-z]{1,8}",
            text(),
            proptest::option::of(text()),
            0i64..2_000_000_000,
            any::<bool>(),
            proptest::option::of(text()),
            prop::collection::vec(text(), 0..3),
        )
            .prop_map(|(id, title, subtitle, secs, syncing, catalog, announcements)| {
                let mut provider =
                    ProviderDescription::new(id, title, Utc.timestamp_opt(secs, 0).unwrap());
                provider.subtitle = subtitle;
                AccountDescription {
                    provider,
                    preferences: AccountPreferences {
                        bookmark_syncing_permitted: syncing,
                        catalog_uri_override: catalog,
                        announcements_acknowledged: announcements,
                    },
                }
            })
    }

    proptest! {
        #[test]
        fn encoded_description_decodes_as_current(description in description_strategy()) {
            let data = description.encode().unwrap();
            let decoded = DescriptionDocument::decode(&data, path()).unwrap();
            prop_assert_eq!(decoded, DescriptionDocument::Current(description));
        }
    }
}
