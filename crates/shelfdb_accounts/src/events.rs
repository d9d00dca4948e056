//! Account notifications.
//!
//! Events are emitted after the change they describe has been persisted.
//! Subscribers receive them over a channel; a subscriber whose receiver has
//! been dropped is pruned on the next emit.
//!
//! ```rust,ignore
//! let receiver = db.events().subscribe();
//! std::thread::spawn(move || {
//!     while let Ok(event) = receiver.recv() {
//!         println!("{event:?}");
//!     }
//! });
//! ```

use crate::id::AccountId;
use crate::login::LoginState;
use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};

/// Something that happened to an account.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountEvent {
    /// An account was created and indexed.
    Created {
        /// The new account.
        id: AccountId,
    },
    /// An account's description (provider or preferences) changed.
    Updated {
        /// The changed account.
        id: AccountId,
    },
    /// An account logged in or out.
    LoginStateChanged {
        /// The account.
        id: AccountId,
        /// State before the change.
        old: LoginState,
        /// State after the change.
        new: LoginState,
    },
    /// An account was removed from the database.
    Deleted {
        /// The removed account.
        id: AccountId,
    },
}

impl AccountEvent {
    /// The account this event concerns.
    #[must_use]
    pub fn account_id(&self) -> AccountId {
        match self {
            Self::Created { id }
            | Self::Updated { id }
            | Self::LoginStateChanged { id, .. }
            | Self::Deleted { id } => *id,
        }
    }
}

/// Distributes account events to any number of subscribers.
#[derive(Debug, Default)]
pub struct AccountEvents {
    subscribers: RwLock<Vec<Sender<AccountEvent>>>,
}

impl AccountEvents {
    /// Creates a feed with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all future events.
    pub fn subscribe(&self) -> Receiver<AccountEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Sends `event` to every live subscriber.
    pub fn emit(&self, event: AccountEvent) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers as of the last emit.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn emit_and_receive() {
        let events = AccountEvents::new();
        let rx = events.subscribe();
        let id = AccountId::new();

        events.emit(AccountEvent::Created { id });

        let received = rx.recv_timeout(Duration::from_millis(100)).unwrap();
        assert_eq!(received, AccountEvent::Created { id });
        assert_eq!(received.account_id(), id);
    }

    #[test]
    fn every_subscriber_receives() {
        let events = AccountEvents::new();
        let rx1 = events.subscribe();
        let rx2 = events.subscribe();
        let id = AccountId::new();

        events.emit(AccountEvent::Updated { id });

        assert_eq!(rx1.recv().unwrap(), AccountEvent::Updated { id });
        assert_eq!(rx2.recv().unwrap(), AccountEvent::Updated { id });
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let events = AccountEvents::new();
        let rx = events.subscribe();
        assert_eq!(events.subscriber_count(), 1);

        drop(rx);
        events.emit(AccountEvent::Deleted { id: AccountId::new() });
        assert_eq!(events.subscriber_count(), 0);
    }
}
