//! Credential persistence and its agreement with account login state.

use proptest::prelude::*;
use shelfdb_accounts::{
    AccountId, AccountsError, CredentialStore, Credentials, LoginState, ProviderId,
};
use shelfdb_testkit::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn credentials_survive_reopen() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("credentials.json");
    let tmp = temp.path().join("credentials.json.tmp");
    let id = AccountId::new();
    let credentials = Credentials::Saml2 {
        access_token: "token".into(),
        patron_info: "{\"name\":\"Reader\"}".into(),
        cookies: vec![shelfdb_accounts::Cookie {
            url: "https://idp.example".into(),
            value: "session=1".into(),
        }],
        authentication_description: Some("SAML".into()),
        annotations_uri: None,
    };

    let store = CredentialStore::open(&path, &tmp).unwrap();
    store.put(id, credentials.clone()).unwrap();
    drop(store);

    let store = CredentialStore::open(&path, &tmp).unwrap();
    assert_eq!(store.get(&id), Some(credentials));
    assert_eq!(store.size(), 1);
}

#[test]
fn unparseable_store_fails_to_open() {
    let temp = tempdir().unwrap();
    let path = temp.path().join("credentials.json");
    fs::write(&path, b"[not json").unwrap();

    let result = CredentialStore::open(&path, &temp.path().join("credentials.json.tmp"));
    assert!(matches!(result, Err(AccountsError::Parse { .. })));
}

#[test]
fn login_state_is_mirrored_in_store() {
    let (env, db) = scenarios::with_accounts(&["urn:a"]);
    let account = db.account_by_provider(&ProviderId::from("urn:a")).unwrap();
    let credentials = Credentials::basic("patron", "1234");

    account
        .set_login_state(LoginState::LoggedIn(credentials.clone()))
        .unwrap();
    assert_eq!(env.credentials().get(&account.id()), Some(credentials));

    account.set_login_state(LoginState::NotLoggedIn).unwrap();
    assert_eq!(env.credentials().get(&account.id()), None);
}

#[test]
fn secrets_are_not_debug_printed() {
    let credentials = Credentials::basic("patron", "hunter2");
    let state = LoginState::LoggedIn(credentials);
    assert!(!format!("{state:?}").contains("hunter2"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_credentials_round_trip_through_disk(credentials in credentials_strategy()) {
        let temp = tempdir().unwrap();
        let path = temp.path().join("credentials.json");
        let tmp = temp.path().join("credentials.json.tmp");
        let id = AccountId::new();

        CredentialStore::open(&path, &tmp).unwrap().put(id, credentials.clone()).unwrap();
        let reopened = CredentialStore::open(&path, &tmp).unwrap();

        prop_assert_eq!(reopened.get(&id), Some(credentials));
    }

    #[test]
    fn login_state_always_matches_credential_store(
        states in prop::collection::vec(login_state_strategy(), 1..5)
    ) {
        let (mut env, db) = scenarios::with_accounts(&["urn:a"]);
        let account = db.account_by_provider(&ProviderId::from("urn:a")).unwrap();
        let id = account.id();

        for state in &states {
            account.set_login_state(state.clone()).unwrap();
            prop_assert_eq!(account.login_state(), state.clone());
            prop_assert_eq!(env.credentials().get(&id), state.credentials().cloned());
        }
        drop(account);
        drop(db);

        env.reload_credentials();
        let db = env.open().unwrap();
        let last = states.last().cloned().unwrap();
        prop_assert_eq!(db.account(&id).unwrap().login_state(), last);
    }
}
