//! The control loop that owns the card store.
//!
//! Every mutation goes through one `mpsc` queue and is handled to
//! completion before the next one is read: store update, broadcast, and
//! the notifier hand-off happen in a single step. That is what gives all
//! connections the same event order, and what keeps the initial snapshot
//! of a new connection consistent with the broadcasts that follow it.

use crate::error::{Result, ServerError};
use crate::protocol::{CardDeletedPayload, Frame, ServerEvent};
use crate::registry::{ConnectionId, ConnectionRegistry};
use asking_core::{
    Card, CardId, CardRequest, CardStore, StoreError, ValidationError, ValidationRules,
};
use asking_notify::Notifier;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

/// Requests handled by the control loop.
enum Command {
    Connect {
        outbound: mpsc::Sender<Frame>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Create {
        request: CardRequest,
        reply: oneshot::Sender<std::result::Result<Card, ValidationError>>,
    },
    Delete {
        id: CardId,
        reply: oneshot::Sender<Option<Card>>,
    },
    Snapshot {
        reply: oneshot::Sender<Vec<Card>>,
    },
}

/// A cloneable handle for talking to a running sync server.
///
/// The WebSocket transport uses this for every connection, and it can be
/// used directly by in-process callers.
#[derive(Clone)]
pub struct SyncServerHandle {
    commands: mpsc::Sender<Command>,
    registry: Arc<ConnectionRegistry>,
}

impl SyncServerHandle {
    /// Registers an outbound channel.
    ///
    /// The first frame on the channel is `initial_cards`, taken at the
    /// moment of registration.
    pub async fn connect(&self, outbound: mpsc::Sender<Frame>) -> Result<ConnectionId> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Connect { outbound, reply }).await?;
        rx.await.map_err(|_| ServerError::Closed)
    }

    /// Drops a connection. Safe to call more than once.
    pub async fn disconnect(&self, id: ConnectionId) -> bool {
        self.registry.unregister(id).await
    }

    /// Creates a card and broadcasts it.
    ///
    /// Fails with [`ServerError::Rejected`] when the request does not
    /// validate; nothing is broadcast in that case.
    pub async fn create_card(&self, request: CardRequest) -> Result<Card> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Create { request, reply }).await?;
        let outcome = rx.await.map_err(|_| ServerError::Closed)?;
        Ok(outcome?)
    }

    /// Deletes a card. Returns `None` when no card had that id.
    pub async fn delete_card(&self, id: CardId) -> Result<Option<Card>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Delete { id, reply }).await?;
        rx.await.map_err(|_| ServerError::Closed)
    }

    /// Current card list, newest first.
    pub async fn snapshot(&self) -> Result<Vec<Card>> {
        let (reply, rx) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        rx.await.map_err(|_| ServerError::Closed)
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ServerError::Closed)
    }
}

/// Owner of the card store. Runs until every handle is dropped.
pub(crate) struct ControlLoop {
    store: CardStore,
    registry: Arc<ConnectionRegistry>,
    notifier: Arc<dyn Notifier>,
    rules: ValidationRules,
    commands: mpsc::Receiver<Command>,
}

/// Creates a control loop and the handle that feeds it.
pub(crate) fn control_channel(
    store: CardStore,
    notifier: Arc<dyn Notifier>,
    rules: ValidationRules,
    capacity: usize,
) -> (SyncServerHandle, ControlLoop) {
    let (tx, rx) = mpsc::channel(capacity);
    let registry = Arc::new(ConnectionRegistry::new());

    let handle = SyncServerHandle {
        commands: tx,
        registry: registry.clone(),
    };
    let control = ControlLoop {
        store,
        registry,
        notifier,
        rules,
        commands: rx,
    };

    (handle, control)
}

impl ControlLoop {
    pub(crate) async fn run(mut self) {
        info!(
            "🔧 Control loop started ({} cards, notifier: {})",
            self.store.len(),
            self.notifier.name()
        );

        while let Some(command) = self.commands.recv().await {
            // A dropped reply means the requester went away; the mutation
            // still stands.
            match command {
                Command::Connect { outbound, reply } => {
                    let id = self.connect(outbound).await;
                    let _ = reply.send(id);
                }
                Command::Create { request, reply } => {
                    let _ = reply.send(self.create(request).await);
                }
                Command::Delete { id, reply } => {
                    let _ = reply.send(self.delete(id).await);
                }
                Command::Snapshot { reply } => {
                    let _ = reply.send(self.store.snapshot());
                }
            }
        }

        info!("Control loop stopped");
    }

    async fn connect(&mut self, outbound: mpsc::Sender<Frame>) -> ConnectionId {
        let id = self.registry.register(outbound).await;

        match ServerEvent::InitialCards(self.store.snapshot()).encode() {
            Ok(frame) => {
                if self.registry.send_to(id, frame).await {
                    debug!("📤 Sent {} initial cards to {}", self.store.len(), id);
                } else {
                    warn!("Could not deliver initial cards to {}", id);
                }
            }
            Err(e) => error!("Failed to encode initial cards: {}", e),
        }

        id
    }

    async fn create(
        &mut self,
        request: CardRequest,
    ) -> std::result::Result<Card, ValidationError> {
        let card = match self.rules.validate(request) {
            Ok(card) => card,
            Err(e) => {
                debug!("Rejected card: {}", e);
                return Err(e);
            }
        };

        self.store.insert_front(card.clone());
        self.broadcast(ServerEvent::NewCard(card.clone())).await;
        self.dispatch_notification(card.clone());

        info!("📝 New card created: {}", card.topic());
        Ok(card)
    }

    async fn delete(&mut self, id: CardId) -> Option<Card> {
        match self.store.remove(id) {
            Ok(card) => {
                self.broadcast(ServerEvent::CardDeleted(CardDeletedPayload { id }))
                    .await;
                info!("🗑️  Card deleted: {}", card.topic());
                Some(card)
            }
            Err(StoreError::NotFound(_)) => {
                debug!("Delete of unknown card {} ignored", id);
                None
            }
        }
    }

    async fn broadcast(&self, event: ServerEvent) {
        match event.encode() {
            Ok(frame) => {
                let delivered = self.registry.broadcast_all(&frame).await;
                debug!("📡 {} delivered to {} connections", event.name(), delivered);
            }
            Err(e) => error!("Failed to encode {}: {}", event.name(), e),
        }
    }

    /// Hands the card to the notifier on a detached task.
    fn dispatch_notification(&self, card: Card) {
        let notifier = self.notifier.clone();
        tokio::spawn(async move {
            match notifier.notify(&card).await {
                Ok(()) => debug!("{} notification sent for {}", notifier.name(), card.id()),
                Err(e) => warn!(
                    "❌ {} notification failed for {}: {}",
                    notifier.name(),
                    card.id(),
                    e
                ),
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asking_notify::{NoopNotifier, NotifyError};
    use async_trait::async_trait;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio::time::{timeout, Duration};

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _card: &Card) -> std::result::Result<(), NotifyError> {
            Err(NotifyError::Status(500))
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct HangingNotifier;

    #[async_trait]
    impl Notifier for HangingNotifier {
        async fn notify(&self, _card: &Card) -> std::result::Result<(), NotifyError> {
            std::future::pending::<()>().await;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "hanging"
        }
    }

    struct RecordingNotifier {
        seen: mpsc::UnboundedSender<CardId>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, card: &Card) -> std::result::Result<(), NotifyError> {
            let _ = self.seen.send(card.id());
            Ok(())
        }

        fn name(&self) -> &'static str {
            "recording"
        }
    }

    struct TestClient {
        id: ConnectionId,
        rx: mpsc::Receiver<Frame>,
    }

    impl TestClient {
        async fn connect(handle: &SyncServerHandle) -> Self {
            let (tx, rx) = mpsc::channel(128);
            let id = handle.connect(tx).await.unwrap();
            Self { id, rx }
        }

        async fn next(&mut self) -> ServerEvent {
            let frame = timeout(Duration::from_secs(2), self.rx.recv())
                .await
                .expect("timed out waiting for frame")
                .expect("connection channel closed");
            ServerEvent::decode(&frame).unwrap()
        }

        async fn initial(&mut self) -> Vec<Card> {
            match self.next().await {
                ServerEvent::InitialCards(cards) => cards,
                other => panic!("expected initial_cards, got {}", other.name()),
            }
        }

        async fn new_card(&mut self) -> Card {
            match self.next().await {
                ServerEvent::NewCard(card) => card,
                other => panic!("expected new_card, got {}", other.name()),
            }
        }

        async fn deleted(&mut self) -> CardId {
            match self.next().await {
                ServerEvent::CardDeleted(payload) => payload.id,
                other => panic!("expected card_deleted, got {}", other.name()),
            }
        }

        fn assert_idle(&mut self) {
            assert!(matches!(self.rx.try_recv(), Err(TryRecvError::Empty)));
        }
    }

    fn start_with(store: CardStore, notifier: Arc<dyn Notifier>) -> SyncServerHandle {
        let (handle, control) =
            control_channel(store, notifier, ValidationRules::default(), 64);
        tokio::spawn(control.run());
        handle
    }

    fn start() -> SyncServerHandle {
        start_with(CardStore::new(), Arc::new(NoopNotifier))
    }

    #[tokio::test]
    async fn test_connect_receives_snapshot() {
        let handle = start_with(CardStore::seeded(), Arc::new(NoopNotifier));
        handle
            .create_card(CardRequest::text("Newest", "on top"))
            .await
            .unwrap();

        let mut client = TestClient::connect(&handle).await;
        let cards = client.initial().await;

        let topics: Vec<_> = cards.iter().map(|c| c.topic()).collect();
        assert_eq!(
            topics,
            vec!["Newest", "Welcome to Asking Card", "Real-time Updates"]
        );
        client.assert_idle();
    }

    #[tokio::test]
    async fn test_create_and_delete_scenario() {
        let handle = start();
        let mut a = TestClient::connect(&handle).await;
        let mut b = TestClient::connect(&handle).await;
        assert!(a.initial().await.is_empty());
        assert!(b.initial().await.is_empty());

        // A creates
        let created = handle
            .create_card(CardRequest::text("T1", "D1"))
            .await
            .unwrap();
        assert_eq!(a.new_card().await, created);
        assert_eq!(b.new_card().await, created);

        let store = handle.snapshot().await.unwrap();
        assert_eq!(store, vec![created.clone()]);

        // B deletes
        let removed = handle.delete_card(created.id()).await.unwrap();
        assert_eq!(removed.map(|c| c.id()), Some(created.id()));
        assert_eq!(a.deleted().await, created.id());
        assert_eq!(b.deleted().await, created.id());
        assert!(handle.snapshot().await.unwrap().is_empty());

        // B deletes again: nothing happens
        assert!(handle.delete_card(created.id()).await.unwrap().is_none());
        a.assert_idle();
        b.assert_idle();
        assert!(handle.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_create_is_not_broadcast() {
        let handle = start();
        let mut a = TestClient::connect(&handle).await;
        a.initial().await;

        let err = handle
            .create_card(CardRequest::text("   ", "no topic"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ServerError::Rejected(ValidationError::EmptyTopic)
        ));

        a.assert_idle();
        assert!(handle.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failing_notifier_does_not_affect_create() {
        let handle = start_with(CardStore::new(), Arc::new(FailingNotifier));
        let mut a = TestClient::connect(&handle).await;
        a.initial().await;

        let card = handle
            .create_card(CardRequest::text("Still works", ""))
            .await
            .unwrap();
        assert_eq!(a.new_card().await.id(), card.id());
    }

    #[tokio::test]
    async fn test_hanging_notifier_does_not_block() {
        let handle = start_with(CardStore::new(), Arc::new(HangingNotifier));
        let mut a = TestClient::connect(&handle).await;
        a.initial().await;

        for i in 0..5 {
            let created = timeout(
                Duration::from_secs(2),
                handle.create_card(CardRequest::text(format!("card {i}"), "")),
            )
            .await
            .expect("create stalled behind the notifier")
            .unwrap();
            assert_eq!(a.new_card().await.id(), created.id());
        }
    }

    #[tokio::test]
    async fn test_notifier_sees_created_cards_only() {
        let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
        let handle = start_with(
            CardStore::new(),
            Arc::new(RecordingNotifier { seen: seen_tx }),
        );

        let card = handle
            .create_card(CardRequest::text("Notify me", ""))
            .await
            .unwrap();
        let notified = timeout(Duration::from_secs(2), seen_rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notified, card.id());

        handle.delete_card(card.id()).await.unwrap();
        handle.snapshot().await.unwrap();
        tokio::task::yield_now().await;
        assert!(seen_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_concurrent_creates_same_order_everywhere() {
        let handle = start();
        let mut a = TestClient::connect(&handle).await;
        let mut b = TestClient::connect(&handle).await;
        a.initial().await;
        b.initial().await;

        let h1 = handle.clone();
        let h2 = handle.clone();
        let (r1, r2) = tokio::join!(
            tokio::spawn(async move { h1.create_card(CardRequest::text("T1", "")).await }),
            tokio::spawn(async move { h2.create_card(CardRequest::text("T2", "")).await }),
        );
        r1.unwrap().unwrap();
        r2.unwrap().unwrap();

        let seen_a = vec![a.new_card().await, a.new_card().await];
        let seen_b = vec![b.new_card().await, b.new_card().await];
        assert_eq!(seen_a, seen_b);

        // Store is newest-first, broadcasts arrive oldest-first
        let mut store = handle.snapshot().await.unwrap();
        store.reverse();
        assert_eq!(store, seen_a);

        let mut topics: Vec<_> = store.iter().map(|c| c.topic().to_string()).collect();
        topics.sort();
        assert_eq!(topics, vec!["T1", "T2"]);
    }

    #[tokio::test]
    async fn test_snapshot_and_broadcasts_never_overlap() {
        let handle = start();

        let writer = {
            let handle = handle.clone();
            tokio::spawn(async move {
                for i in 0..50 {
                    handle
                        .create_card(CardRequest::text(format!("card {i}"), ""))
                        .await
                        .unwrap();
                }
            })
        };

        tokio::task::yield_now().await;
        let mut late = TestClient::connect(&handle).await;
        writer.await.unwrap();

        let mut seen: Vec<CardId> = late.initial().await.iter().map(|c| c.id()).collect();
        while let Ok(frame) = late.rx.try_recv() {
            if let ServerEvent::NewCard(card) = ServerEvent::decode(&frame).unwrap() {
                seen.push(card.id());
            }
        }

        let mut expected: Vec<CardId> = handle
            .snapshot()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id())
            .collect();

        assert_eq!(seen.len(), expected.len(), "a card was missed or duplicated");
        seen.sort();
        expected.sort();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_slow_connection_is_dropped_others_continue() {
        let handle = start();
        let mut healthy = TestClient::connect(&handle).await;
        healthy.initial().await;

        // Room for the initial snapshot only
        let (slow_tx, _slow_rx) = mpsc::channel(1);
        let slow = handle.connect(slow_tx).await.unwrap();
        assert_eq!(handle.connection_count().await, 2);

        let card = handle
            .create_card(CardRequest::text("Fan out", ""))
            .await
            .unwrap();

        assert_eq!(healthy.new_card().await.id(), card.id());
        assert_eq!(handle.connection_count().await, 1);
        assert!(!handle.disconnect(slow).await);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let handle = start();
        let mut client = TestClient::connect(&handle).await;
        client.initial().await;

        assert!(handle.disconnect(client.id).await);
        assert!(!handle.disconnect(client.id).await);
        assert_eq!(handle.connection_count().await, 0);

        handle
            .create_card(CardRequest::text("After", ""))
            .await
            .unwrap();
        assert!(client.rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_handle_after_shutdown() {
        let (handle, control) = control_channel(
            CardStore::new(),
            Arc::new(NoopNotifier),
            ValidationRules::default(),
            8,
        );
        drop(control);

        let err = handle
            .create_card(CardRequest::text("Too late", ""))
            .await
            .unwrap_err();
        assert!(matches!(err, ServerError::Closed));
    }
}
