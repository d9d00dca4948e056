//! Read-only snapshots of the account indices.

use crate::account::Account;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// An immutable snapshot of one account index.
///
/// The snapshot shares the index map with the database. Later changes to
/// the database copy the map instead of touching this one, so a view never
/// changes once taken.
pub struct AccountsView<K> {
    map: Arc<BTreeMap<K, Arc<Account>>>,
}

impl<K: Ord> AccountsView<K> {
    pub(crate) fn new(map: Arc<BTreeMap<K, Arc<Account>>>) -> Self {
        Self { map }
    }

    /// Returns the account stored under `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<&Arc<Account>> {
        self.map.get(key)
    }

    /// Whether an account is stored under `key`.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Number of accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Whether there are no accounts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over entries in key order.
    pub fn iter(&self) -> btree_map::Iter<'_, K, Arc<Account>> {
        self.map.iter()
    }

    /// Iterates over keys in order.
    pub fn keys(&self) -> btree_map::Keys<'_, K, Arc<Account>> {
        self.map.keys()
    }

    /// Iterates over accounts in key order.
    pub fn values(&self) -> btree_map::Values<'_, K, Arc<Account>> {
        self.map.values()
    }
}

impl<K> Clone for AccountsView<K> {
    fn clone(&self) -> Self {
        Self {
            map: Arc::clone(&self.map),
        }
    }
}

impl<K: fmt::Debug> fmt::Debug for AccountsView<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.map.keys()).finish()
    }
}

impl<'a, K> IntoIterator for &'a AccountsView<K> {
    type Item = (&'a K, &'a Arc<Account>);
    type IntoIter = btree_map::Iter<'a, K, Arc<Account>>;

    fn into_iter(self) -> Self::IntoIter {
        self.map.iter()
    }
}
