//! The authoritative card collection.
//!
//! Cards are kept newest-first by insertion order. `created_at` is never
//! consulted for ordering, so a clock step on the server cannot reshuffle
//! the list.

use crate::card::{Card, CardContent};
use crate::error::StoreError;
use crate::CardId;
use tracing::debug;

/// Ordered, in-memory set of live cards.
#[derive(Debug, Default, Clone)]
pub struct CardStore {
    cards: Vec<Card>,
}

impl CardStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store from cards already in newest-first order.
    pub fn with_cards(cards: impl IntoIterator<Item = Card>) -> Self {
        Self {
            cards: cards.into_iter().collect(),
        }
    }

    /// Creates a store holding the two welcome cards a fresh deployment
    /// starts with.
    pub fn seeded() -> Self {
        Self::with_cards([
            Card::new(
                "Welcome to Asking Card",
                CardContent::Text {
                    description: "This is your first card. Create more by filling out the form below."
                        .to_string(),
                },
            ),
            Card::new(
                "Real-time Updates",
                CardContent::Text {
                    description:
                        "All cards update in real-time across all connected users.".to_string(),
                },
            ),
        ])
    }

    /// Puts a card at the front of the list.
    ///
    /// The card is assumed to be validated already.
    pub fn insert_front(&mut self, card: Card) {
        debug!("Inserting card {} ({})", card.id(), card.topic());
        self.cards.insert(0, card);
    }

    /// Removes the card with the given id and hands it back.
    pub fn remove(&mut self, id: CardId) -> Result<Card, StoreError> {
        let index = self
            .cards
            .iter()
            .position(|card| card.id() == id)
            .ok_or(StoreError::NotFound(id))?;

        let card = self.cards.remove(index);
        debug!("Removed card {} ({})", card.id(), card.topic());
        Ok(card)
    }

    /// Copies the current list, newest first.
    pub fn snapshot(&self) -> Vec<Card> {
        self.cards.clone()
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.cards.iter().find(|card| card.id() == id)
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Iterates over cards, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Card> {
        self.cards.iter()
    }
}
