//! Login state and credentials.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A cookie captured during a SAML login.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cookie {
    /// The URL the cookie was issued for.
    pub url: String,
    /// The raw `Set-Cookie` value.
    pub value: String,
}

impl fmt::Debug for Cookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cookie")
            .field("url", &self.url)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

/// Authentication material for a logged-in account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type", rename_all = "camelCase")]
pub enum Credentials {
    /// Barcode/PIN style credentials.
    #[serde(rename_all = "camelCase")]
    Basic {
        /// User name or barcode.
        username: String,
        /// Password or PIN.
        password: String,
        /// Which of the provider's authentication methods was used.
        #[serde(default)]
        authentication_description: Option<String>,
        /// Where annotations are synced.
        #[serde(default, rename = "annotationsURI")]
        annotations_uri: Option<String>,
    },
    /// A token obtained through an OAuth intermediary.
    #[serde(rename_all = "camelCase")]
    OAuthWithIntermediary {
        /// Bearer token.
        access_token: String,
        /// Which of the provider's authentication methods was used.
        #[serde(default)]
        authentication_description: Option<String>,
        /// Where annotations are synced.
        #[serde(default, rename = "annotationsURI")]
        annotations_uri: Option<String>,
    },
    /// A token and session obtained through SAML 2.0.
    #[serde(rename_all = "camelCase")]
    Saml2 {
        /// Bearer token.
        access_token: String,
        /// Patron information returned by the identity provider.
        patron_info: String,
        /// Session cookies.
        #[serde(default)]
        cookies: Vec<Cookie>,
        /// Which of the provider's authentication methods was used.
        #[serde(default)]
        authentication_description: Option<String>,
        /// Where annotations are synced.
        #[serde(default, rename = "annotationsURI")]
        annotations_uri: Option<String>,
    },
}

impl Credentials {
    /// Creates basic credentials.
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
            authentication_description: None,
            annotations_uri: None,
        }
    }

    /// Creates OAuth credentials.
    pub fn oauth(access_token: impl Into<String>) -> Self {
        Self::OAuthWithIntermediary {
            access_token: access_token.into(),
            authentication_description: None,
            annotations_uri: None,
        }
    }

    /// Returns the annotations URI, whatever the credential kind.
    #[must_use]
    pub fn annotations_uri(&self) -> Option<&str> {
        match self {
            Self::Basic {
                annotations_uri, ..
            }
            | Self::OAuthWithIntermediary {
                annotations_uri, ..
            }
            | Self::Saml2 {
                annotations_uri, ..
            } => annotations_uri.as_deref(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Basic {
                username,
                authentication_description,
                ..
            } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"[REDACTED]")
                .field("authentication_description", authentication_description)
                .finish_non_exhaustive(),
            Self::OAuthWithIntermediary {
                authentication_description,
                ..
            } => f
                .debug_struct("OAuthWithIntermediary")
                .field("access_token", &"[REDACTED]")
                .field("authentication_description", authentication_description)
                .finish_non_exhaustive(),
            Self::Saml2 {
                cookies,
                authentication_description,
                ..
            } => f
                .debug_struct("Saml2")
                .field("access_token", &"[REDACTED]")
                .field("cookies", &cookies.len())
                .field("authentication_description", authentication_description)
                .finish_non_exhaustive(),
        }
    }
}

/// Whether an account is logged in.
///
/// Transitions are driven from outside (authentication, logout, revocation);
/// the database only records and persists them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum LoginState {
    /// No credentials are held.
    #[default]
    NotLoggedIn,
    /// Logged in with these credentials.
    LoggedIn(Credentials),
}

impl LoginState {
    /// Builds the state implied by an optional credential record.
    #[must_use]
    pub fn from_credentials(credentials: Option<Credentials>) -> Self {
        match credentials {
            Some(c) => Self::LoggedIn(c),
            None => Self::NotLoggedIn,
        }
    }

    /// Returns the credentials, if logged in.
    #[must_use]
    pub fn credentials(&self) -> Option<&Credentials> {
        match self {
            Self::NotLoggedIn => None,
            Self::LoggedIn(c) => Some(c),
        }
    }

    /// Whether credentials are held.
    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        matches!(self, Self::LoggedIn(_))
    }
}
