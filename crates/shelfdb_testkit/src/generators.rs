//! Property-based test generators using proptest.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use shelfdb_accounts::{
    AccountPreferences, Cookie, Credentials, LoginState, ProviderDescription, ProviderId,
};

/// Strategy for provider identity URIs.
pub fn provider_id_strategy() -> impl Strategy<Value = ProviderId> {
    prop::string::string_regex("urn:[a-z]{1,12}(:[a-z0-9]{1,8})?")
        .expect("Invalid regex")
        .prop_map(ProviderId::new)
}

/// Strategy for short free text, including non-ASCII.
pub fn text_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z0-9 éüß\"\\\\/]{0,24}").expect("Invalid regex")
}

/// Strategy for provider descriptions with timestamps within a few decades.
pub fn provider_strategy() -> impl Strategy<Value = ProviderDescription> {
    (
        provider_id_strategy(),
        text_strategy(),
        proptest::option::of(text_strategy()),
        proptest::option::of(Just("https://catalog.example/feed".to_string())),
        0i64..2_000_000_000,
    )
        .prop_map(|(id, title, subtitle, catalog_uri, secs)| {
            let mut description = ProviderDescription::new(
                id,
                title,
                Utc.timestamp_opt(secs, 0).single().expect("timestamp in range"),
            );
            description.subtitle = subtitle;
            description.catalog_uri = catalog_uri;
            description
        })
}

/// Strategy for account preferences.
pub fn preferences_strategy() -> impl Strategy<Value = AccountPreferences> {
    (
        any::<bool>(),
        proptest::option::of(text_strategy()),
        prop::collection::vec(text_strategy(), 0..4),
    )
        .prop_map(
            |(bookmark_syncing_permitted, catalog_uri_override, announcements_acknowledged)| {
                AccountPreferences {
                    bookmark_syncing_permitted,
                    catalog_uri_override,
                    announcements_acknowledged,
                }
            },
        )
}

fn annotations_strategy() -> impl Strategy<Value = Option<String>> {
    proptest::option::of(Just("https://annotations.example/".to_string()))
}

/// Strategy for credentials of every kind.
pub fn credentials_strategy() -> impl Strategy<Value = Credentials> {
    prop_oneof![
        (text_strategy(), text_strategy(), annotations_strategy()).prop_map(
            |(username, password, annotations_uri)| Credentials::Basic {
                username,
                password,
                authentication_description: None,
                annotations_uri,
            }
        ),
        (text_strategy(), proptest::option::of(text_strategy())).prop_map(
            |(access_token, authentication_description)| Credentials::OAuthWithIntermediary {
                access_token,
                authentication_description,
                annotations_uri: None,
            }
        ),
        (
            text_strategy(),
            text_strategy(),
            prop::collection::vec((text_strategy(), text_strategy()), 0..3),
            annotations_strategy(),
        )
            .prop_map(|(access_token, patron_info, cookies, annotations_uri)| {
                Credentials::Saml2 {
                    access_token,
                    patron_info,
                    cookies: cookies
                        .into_iter()
                        .map(|(url, value)| Cookie { url, value })
                        .collect(),
                    authentication_description: None,
                    annotations_uri,
                }
            }),
    ]
}

/// Strategy for login states.
pub fn login_state_strategy() -> impl Strategy<Value = LoginState> {
    prop_oneof![
        Just(LoginState::NotLoggedIn),
        credentials_strategy().prop_map(LoginState::LoggedIn),
    ]
}
