//! Asking Card Core - cards and the store that owns them
//!
//! This crate holds the data side of Asking Card: the [`Card`] record,
//! the rules that turn a client's [`CardRequest`] into a card, and the
//! [`CardStore`] that keeps every live card in newest-first order.
//!
//! Nothing in here does I/O. The sync server owns a single `CardStore`
//! and is the only thing allowed to mutate it.
//!
//! # Example
//!
//! ```
//! use asking_core::{CardRequest, CardStore, ValidationRules};
//!
//! let rules = ValidationRules::default();
//! let mut store = CardStore::new();
//!
//! let card = rules
//!     .validate(CardRequest::text("Deploys", "When do we ship on Fridays?"))
//!     .unwrap();
//! let id = card.id();
//! store.insert_front(card);
//!
//! assert_eq!(store.len(), 1);
//! assert!(store.remove(id).is_ok());
//! ```

mod card;
mod error;
mod store;

pub use card::{Card, CardContent, CardFile, CardRequest, ValidationRules};
pub use error::{StoreError, ValidationError};
pub use store::CardStore;

/// Cards are addressed by a server-generated UUID.
pub type CardId = uuid::Uuid;
