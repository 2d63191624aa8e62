//! End-to-end results pipeline: a worker-side publisher sends
//! `availability_result` through a real broker, and the server's channel
//! listener caches the data and fans out the change notification.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use cardwatch_bus::broker::EventBroker;
use cardwatch_bus::messages::{names, AvailabilityResult};
use cardwatch_bus::{
    BrokerSockets, Channel, ChannelListener, DeadLetterSink, Envelope, EventPublisher,
    MemoryDeadLetter, ZmqPublisher, ZmqSubscriber,
};
use cardwatch_catalog::MemoryCatalog;
use cardwatch_core::{Listing, TrackedCard};
use cardwatch_server::{
    result_handlers, AvailabilityTracker, CardChangeSummary, ClientNotifier, ServerContext,
};
use cardwatch_store::{AvailabilityCache, MemoryUserDirectory, SnapshotStore};

#[derive(Default)]
struct RecordingNotifier {
    changed: Mutex<Vec<(String, CardChangeSummary)>>,
}

#[async_trait]
impl ClientNotifier for RecordingNotifier {
    async fn availability_changed(&self, username: &str, summary: &CardChangeSummary) {
        self.changed
            .lock()
            .await
            .push((username.to_string(), summary.clone()));
    }

    async fn card_availability_data(&self, _store: &str, _card: &str, _items: &[Listing]) {}

    async fn job_interrupted(&self, _username: &str, _card: &str, _message: &str) {}
}

fn listing() -> Listing {
    Listing {
        store_id: "authority_games".into(),
        card_name: "Sol Ring".into(),
        set_code: Some("C21".into()),
        collector_number: Some("263".into()),
        finish: "non-foil".into(),
        price: "1.99".parse().unwrap(),
        stock_count: 3,
        condition: "NM-Mint".into(),
        url: "https://authoritygames.example/products/12345".into(),
    }
}

#[tokio::test]
async fn availability_result_flows_broker_to_notification() {
    let sockets = BrokerSockets::tcp("127.0.0.1", 25730, 25731, 25732);

    let broker = Arc::new(EventBroker::new(sockets.clone()));
    let broker_task = {
        let broker = broker.clone();
        tokio::spawn(async move { broker.run().await })
    };
    tokio::time::sleep(Duration::from_millis(100)).await;

    // Server side: listener with the real handler table.
    let users = Arc::new(MemoryUserDirectory::new());
    users
        .add_user(
            "kara",
            vec!["authority_games".into()],
            vec![TrackedCard::any_printing("Sol Ring")],
        )
        .await;

    let cache = Arc::new(AvailabilityCache::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let tracker = Arc::new(AvailabilityTracker::new(
        cache.clone(),
        Arc::new(SnapshotStore::new()),
        users,
        notifier.clone(),
    ));
    let ctx = Arc::new(ServerContext {
        tracker,
        catalog: Arc::new(MemoryCatalog::new()),
        notifier: notifier.clone(),
    });

    let dlq = Arc::new(MemoryDeadLetter::new());
    let subscriber = ZmqSubscriber::connect(&sockets.backend).await.unwrap();
    let listener = ChannelListener::new(Channel::WorkerResults, result_handlers(ctx), dlq.clone());
    let handle = listener.spawn(subscriber).await.unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    // Worker side: publish one refreshed cell.
    let publisher = ZmqPublisher::connect(&sockets.frontend).await.unwrap();
    // Let the PUB socket finish connecting to the broker frontend before the
    // first send, otherwise ZMQ's slow-joiner behavior drops it.
    tokio::time::sleep(Duration::from_millis(200)).await;
    let payload = AvailabilityResult {
        store: "authority_games".into(),
        card: "Sol Ring".into(),
        items: vec![listing()],
    };
    publisher
        .publish(
            Channel::WorkerResults,
            Envelope::new(names::AVAILABILITY_RESULT, &payload).unwrap(),
        )
        .await
        .unwrap();

    // Give the message time to cross broker → listener → handlers.
    let mut notified = false;
    for _ in 0..40 {
        tokio::time::sleep(Duration::from_millis(50)).await;
        if !notifier.changed.lock().await.is_empty() {
            notified = true;
            break;
        }
    }
    assert!(notified, "expected an availability_changed notification");

    let changed = notifier.changed.lock().await;
    let (user, summary) = &changed[0];
    assert_eq!(user, "kara");
    assert_eq!(summary.card_name, "Sol Ring");
    assert!(summary.added.is_some());

    assert_eq!(
        cache.get("authority_games", "Sol Ring").await,
        Some(vec![listing()])
    );
    assert_eq!(dlq.depth("worker-results-dlq").await, 0);

    handle.stop(Duration::from_secs(1)).await;
    broker.shutdown_handle().notify_waiters();
    let _ = tokio::time::timeout(Duration::from_secs(2), broker_task).await;
}
