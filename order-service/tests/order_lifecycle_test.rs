//! Order engine tests against the in-memory adapters.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use order_service::models::{ActorContext, Order, OrderStatus, ShippingDetails, StockItem};
use order_service::services::error::{OrderError, RepositoryError, StockError};
use order_service::services::notification::NotifyError;
use order_service::services::stock::{ReserveOutcome, RestoreOutcome};
use order_service::services::{
    EngineSettings, InMemoryOrderRepository, InMemoryStockLedger, NotificationChannel, Notifier,
    OrderFilter, OrderRepository, OrderService, PlaceOrder, StatusChangeEvent, StatusFilter,
    StockLedger, StockUpdate, TransitionRequest,
};

const PRODUCT: &str = "rice-25kg";

#[derive(Default)]
struct RecordingChannel {
    events: Mutex<Vec<StatusChangeEvent>>,
}

impl RecordingChannel {
    fn events(&self) -> Vec<StatusChangeEvent> {
        self.events.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationChannel for RecordingChannel {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn notify(&self, event: &StatusChangeEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Fails the first `update` with a version conflict.
struct ConflictOnceRepository {
    inner: InMemoryOrderRepository,
    tripped: AtomicBool,
}

#[async_trait]
impl OrderRepository for ConflictOnceRepository {
    async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        self.inner.create(order).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        self.inner.get(id).await
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        self.inner.list(filter, offset, limit).await
    }

    async fn update(&self, order: &Order, expected_version: i64) -> Result<(), RepositoryError> {
        if !self.tripped.swap(true, Ordering::SeqCst) {
            return Err(RepositoryError::VersionConflict);
        }
        self.inner.update(order, expected_version).await
    }

    async fn delete(&self, id: Uuid, expected_version: i64) -> Result<(), RepositoryError> {
        self.inner.delete(id, expected_version).await
    }
}

/// Serves one outdated snapshot to the first matching `get`, like an
/// instance that read the order just before another instance wrote it.
struct StaleOnceRepository {
    inner: InMemoryOrderRepository,
    stale: Mutex<Option<Order>>,
}

impl StaleOnceRepository {
    fn new(inner: InMemoryOrderRepository, snapshot: Order) -> Self {
        Self {
            inner,
            stale: Mutex::new(Some(snapshot)),
        }
    }
}

#[async_trait]
impl OrderRepository for StaleOnceRepository {
    async fn create(&self, order: &Order) -> Result<(), RepositoryError> {
        self.inner.create(order).await
    }

    async fn get(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let stale = {
            let mut slot = self.stale.lock().unwrap();
            match slot.as_ref() {
                Some(order) if order.id == id => slot.take(),
                _ => None,
            }
        };
        match stale {
            Some(order) => Ok(Some(order)),
            None => self.inner.get(id).await,
        }
    }

    async fn list(
        &self,
        filter: &OrderFilter,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Order>, u64), RepositoryError> {
        self.inner.list(filter, offset, limit).await
    }

    async fn update(&self, order: &Order, expected_version: i64) -> Result<(), RepositoryError> {
        self.inner.update(order, expected_version).await
    }

    async fn delete(&self, id: Uuid, expected_version: i64) -> Result<(), RepositoryError> {
        self.inner.delete(id, expected_version).await
    }
}

/// A ledger whose `reserve` never answers in time.
struct StalledLedger {
    inner: InMemoryStockLedger,
}

#[async_trait]
impl StockLedger for StalledLedger {
    async fn lookup(&self, product_id: &str) -> Result<Option<StockItem>, StockError> {
        self.inner.lookup(product_id).await
    }

    async fn upsert(&self, item: StockItem) -> Result<StockItem, StockError> {
        self.inner.upsert(item).await
    }

    async fn reserve(
        &self,
        order_id: Uuid,
        product_id: &str,
        quantity: u32,
    ) -> Result<ReserveOutcome, StockError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        self.inner.reserve(order_id, product_id, quantity).await
    }

    async fn restore(&self, order_id: Uuid) -> Result<RestoreOutcome, StockError> {
        self.inner.restore(order_id).await
    }
}

struct Harness {
    service: OrderService,
    ledger: InMemoryStockLedger,
    channel: Arc<RecordingChannel>,
}

fn settings() -> EngineSettings {
    EngineSettings {
        lock_timeout: Duration::from_secs(1),
        ledger_timeout: Duration::from_millis(200),
        default_page_size: 20,
        max_page_size: 50,
    }
}

async fn harness_with(repository: Arc<dyn OrderRepository>, stock: u32) -> Harness {
    let ledger = InMemoryStockLedger::new();
    let channel = Arc::new(RecordingChannel::default());
    let service = OrderService::new(
        repository,
        Arc::new(ledger.clone()),
        Notifier::new(channel.clone()),
        settings(),
    );
    service
        .put_stock(&wholesaler(), PRODUCT, stock_update(stock, 1))
        .await
        .unwrap();
    Harness {
        service,
        ledger,
        channel,
    }
}

async fn harness(stock: u32) -> Harness {
    harness_with(Arc::new(InMemoryOrderRepository::new()), stock).await
}

fn retailer() -> ActorContext {
    ActorContext::retailer("R1")
}

fn wholesaler() -> ActorContext {
    ActorContext::wholesaler("W1")
}

fn transporter() -> ActorContext {
    ActorContext::transporter("T1")
}

fn stock_update(quantity: u32, min_order_quantity: u32) -> StockUpdate {
    StockUpdate {
        quantity,
        unit_price: Decimal::from(1000),
        measurement_unit: "bag".to_string(),
        min_order_quantity,
    }
}

fn place(quantity: u32) -> PlaceOrder {
    PlaceOrder {
        product_id: PRODUCT.to_string(),
        quantity,
        shipping_details: ShippingDetails {
            recipient_name: "Asha Traders".to_string(),
            phone: "+919800000000".to_string(),
            address_line: "12 Market Road".to_string(),
            city: "Pune".to_string(),
            notes: None,
        },
    }
}

impl Harness {
    async fn stock(&self) -> u32 {
        self.service.get_stock(PRODUCT).await.unwrap().quantity
    }

    async fn order(&self, quantity: u32) -> Order {
        self.service.place_order(&retailer(), place(quantity)).await.unwrap()
    }

    async fn move_to(
        &self,
        order_id: Uuid,
        target: OrderStatus,
        actor: ActorContext,
    ) -> Result<Order, OrderError> {
        self.service
            .update_status(order_id, TransitionRequest::new(target, actor))
            .await
    }
}

#[tokio::test]
async fn concrete_lifecycle_through_dispute() {
    let h = harness(100).await;

    let order = h.order(5).await;
    assert_eq!(order.total_price, Decimal::from(5000));
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(h.stock().await, 100);

    let order = h.move_to(order.id, OrderStatus::Accepted, wholesaler()).await.unwrap();
    assert_eq!(order.status, OrderStatus::Accepted);
    assert_eq!(h.stock().await, 95);

    let order = h.move_to(order.id, OrderStatus::Processing, wholesaler()).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);

    let order = h
        .service
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::AssignedToTransporter, wholesaler())
                .with_transporter("T1"),
        )
        .await
        .unwrap();
    assert_eq!(order.transporter_id.as_deref(), Some("T1"));

    let order = h
        .move_to(order.id, OrderStatus::AcceptedByTransporter, transporter())
        .await
        .unwrap();
    let order = h.move_to(order.id, OrderStatus::Delivered, transporter()).await.unwrap();
    assert!(order.actual_delivery_date.is_some());

    let order = h
        .service
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::Disputed, retailer()).with_reason("damaged goods"),
        )
        .await
        .unwrap();
    let dispute = order.delivery_dispute.clone().unwrap();
    assert_eq!(dispute.reason, "damaged goods");

    let err = h
        .move_to(order.id, OrderStatus::Certified, retailer())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            current: OrderStatus::Disputed,
            ..
        }
    ));

    assert_eq!(order.status_history.len(), 7);
    assert_eq!(order.version, 6);
    assert_eq!(h.stock().await, 95);
}

#[tokio::test]
async fn replayed_accept_decrements_stock_once() {
    let h = harness(10).await;
    let order = h.order(4).await;

    h.move_to(order.id, OrderStatus::Accepted, wholesaler()).await.unwrap();
    let err = h
        .move_to(order.id, OrderStatus::Accepted, wholesaler())
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::InvalidTransition { .. }));
    assert_eq!(h.stock().await, 6);
    assert_eq!(h.ledger.reservation(order.id).map(|r| r.quantity), Some(4));
}

#[tokio::test]
async fn insufficient_stock_leaves_order_pending() {
    let h = harness(10).await;
    let first = h.order(7).await;
    let second = h.order(7).await;

    h.move_to(first.id, OrderStatus::Accepted, wholesaler()).await.unwrap();
    let err = h
        .move_to(second.id, OrderStatus::Accepted, wholesaler())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::InsufficientStock {
            requested: 7,
            available: 3,
            ..
        }
    ));
    let second = h.service.get_order(&retailer(), second.id).await.unwrap();
    assert_eq!(second.status, OrderStatus::Pending);
    assert_eq!(second.version, 0);
    assert_eq!(h.stock().await, 3);
}

#[tokio::test]
async fn place_order_enforces_quantity_bounds_and_role() {
    let h = harness(10).await;
    h.service
        .put_stock(&wholesaler(), PRODUCT, stock_update(10, 3))
        .await
        .unwrap();

    let below = h.service.place_order(&retailer(), place(2)).await.unwrap_err();
    assert!(matches!(below, OrderError::InvalidQuantity(_)));

    let above = h.service.place_order(&retailer(), place(11)).await.unwrap_err();
    assert!(matches!(above, OrderError::InvalidQuantity(_)));

    let wrong_role = h.service.place_order(&wholesaler(), place(5)).await.unwrap_err();
    assert!(matches!(wrong_role, OrderError::Forbidden(_)));

    h.service.place_order(&retailer(), place(10)).await.unwrap();
}

#[tokio::test]
async fn cancelling_after_acceptance_restores_stock() {
    let h = harness(10).await;
    let order = h.order(4).await;
    h.move_to(order.id, OrderStatus::Accepted, wholesaler()).await.unwrap();
    assert_eq!(h.stock().await, 6);

    let cancelled = h
        .service
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::CancelledByWholesaler, wholesaler())
                .with_reason("out of trucks"),
        )
        .await
        .unwrap();

    assert_eq!(cancelled.cancellation_reason.as_deref(), Some("out of trucks"));
    assert_eq!(h.stock().await, 10);
    assert!(h.ledger.reservation(order.id).is_none());
}

#[tokio::test]
async fn leaving_pending_gives_back_a_stray_reservation() {
    let h = harness(20).await;
    let cancelled = h.order(4).await;
    let rejected = h.order(4).await;
    let deleted = h.order(4).await;
    for order in [&cancelled, &rejected, &deleted] {
        // A reserve whose reply was lost after the ledger applied it.
        h.ledger.reserve(order.id, PRODUCT, 4).await.unwrap();
    }
    assert_eq!(h.stock().await, 8);

    h.service
        .update_status(
            cancelled.id,
            TransitionRequest::new(OrderStatus::CancelledByRetailer, retailer())
                .with_reason("ordered twice"),
        )
        .await
        .unwrap();
    h.service
        .update_status(
            rejected.id,
            TransitionRequest::new(OrderStatus::Rejected, wholesaler())
                .with_reason("out of season"),
        )
        .await
        .unwrap();
    h.service.delete_order(&retailer(), deleted.id).await.unwrap();

    assert_eq!(h.stock().await, 20);
    for order in [&cancelled, &rejected, &deleted] {
        assert!(h.ledger.reservation(order.id).is_none());
    }
}

#[tokio::test]
async fn cancelling_pending_order_without_reservation_keeps_stock() {
    let h = harness(10).await;
    let order = h.order(4).await;

    h.service
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::CancelledByRetailer, retailer())
                .with_reason("ordered twice"),
        )
        .await
        .unwrap();

    assert_eq!(h.stock().await, 10);
}

#[tokio::test]
async fn accepted_return_puts_stock_back() {
    let h = harness(10).await;
    let order = h.order(3).await;
    h.move_to(order.id, OrderStatus::Accepted, wholesaler()).await.unwrap();
    h.move_to(order.id, OrderStatus::Processing, wholesaler()).await.unwrap();
    h.service
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::AssignedToTransporter, wholesaler())
                .with_transporter("T1"),
        )
        .await
        .unwrap();
    h.move_to(order.id, OrderStatus::AcceptedByTransporter, transporter()).await.unwrap();
    h.move_to(order.id, OrderStatus::InTransit, transporter()).await.unwrap();
    h.move_to(order.id, OrderStatus::Delivered, transporter()).await.unwrap();
    h.service
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::ReturnToWholesaler, retailer())
                .with_reason("wrong grade"),
        )
        .await
        .unwrap();
    assert_eq!(h.stock().await, 7);

    let order = h
        .move_to(order.id, OrderStatus::ReturnAccepted, wholesaler())
        .await
        .unwrap();
    assert_eq!(order.return_reason.as_deref(), Some("wrong grade"));
    assert_eq!(h.stock().await, 10);
}

#[tokio::test]
async fn terminal_orders_reject_every_transition() {
    let h = harness(10).await;
    let order = h.order(1).await;
    h.service
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::Rejected, wholesaler()).with_reason("closed"),
        )
        .await
        .unwrap();

    for target in OrderStatus::ALL {
        for actor in [retailer(), wholesaler(), transporter()] {
            let err = h
                .service
                .update_status(
                    order.id,
                    TransitionRequest::new(target, actor)
                        .with_reason("again")
                        .with_transporter("T1"),
                )
                .await
                .unwrap_err();
            assert!(
                matches!(err, OrderError::InvalidTransition { .. }),
                "{} accepted from rejected",
                target
            );
        }
    }
}

#[tokio::test]
async fn deletion_follows_the_whitelist() {
    let h = harness(10).await;

    let pending = h.order(1).await;
    h.service.delete_order(&retailer(), pending.id).await.unwrap();
    let err = h.service.get_order(&retailer(), pending.id).await.unwrap_err();
    assert!(matches!(err, OrderError::NotFound(_)));

    let accepted = h.order(1).await;
    h.move_to(accepted.id, OrderStatus::Accepted, wholesaler()).await.unwrap();
    let err = h.service.delete_order(&wholesaler(), accepted.id).await.unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));

    let by_retailer = h.order(1).await;
    h.service
        .update_status(
            by_retailer.id,
            TransitionRequest::new(OrderStatus::CancelledByRetailer, retailer())
                .with_reason("changed mind"),
        )
        .await
        .unwrap();
    let err = h.service.delete_order(&retailer(), by_retailer.id).await.unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));

    let by_wholesaler = h.order(1).await;
    h.move_to(by_wholesaler.id, OrderStatus::Accepted, wholesaler()).await.unwrap();
    h.service
        .update_status(
            by_wholesaler.id,
            TransitionRequest::new(OrderStatus::CancelledByWholesaler, wholesaler())
                .with_reason("discontinued"),
        )
        .await
        .unwrap();
    h.service.delete_order(&wholesaler(), by_wholesaler.id).await.unwrap();

    let stranger = ActorContext::retailer("R2");
    let pending = h.order(1).await;
    let err = h.service.delete_order(&stranger, pending.id).await.unwrap_err();
    assert!(matches!(err, OrderError::Forbidden(_)));

    let missing = h.service.delete_order(&retailer(), Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(missing, OrderError::NotFound(_)));
}

#[tokio::test]
async fn racing_accept_and_reject_have_one_winner() {
    let h = harness(10).await;
    let order = h.order(4).await;

    let accept = h
        .service
        .update_status(order.id, TransitionRequest::new(OrderStatus::Accepted, wholesaler()));
    let reject = h.service.update_status(
        order.id,
        TransitionRequest::new(OrderStatus::Rejected, wholesaler()).with_reason("no capacity"),
    );
    let (accepted, rejected) = tokio::join!(accept, reject);

    match (accepted, rejected) {
        (Ok(_), Err(OrderError::InvalidTransition { current, .. })) => {
            assert_eq!(current, OrderStatus::Accepted);
            assert_eq!(h.stock().await, 6);
        }
        (Err(OrderError::InvalidTransition { current, .. }), Ok(_)) => {
            assert_eq!(current, OrderStatus::Rejected);
            assert_eq!(h.stock().await, 10);
        }
        other => panic!("expected exactly one winner, got {:?}", other),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_acceptances_never_oversell() {
    let h = harness(20).await;
    let mut ids = Vec::new();
    for _ in 0..10 {
        ids.push(h.order(3).await.id);
    }

    let handles: Vec<_> = ids
        .into_iter()
        .map(|id| {
            let service = h.service.clone();
            tokio::spawn(async move {
                service
                    .update_status(id, TransitionRequest::new(OrderStatus::Accepted, wholesaler()))
                    .await
            })
        })
        .collect();

    let mut accepted = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(OrderError::InsufficientStock { .. }) => {}
            Err(other) => panic!("unexpected error: {}", other),
        }
    }

    assert_eq!(accepted, 6);
    assert_eq!(h.stock().await, 2);
}

#[tokio::test]
async fn version_conflict_is_retried_once_without_double_reservation() {
    let repository = Arc::new(ConflictOnceRepository {
        inner: InMemoryOrderRepository::new(),
        tripped: AtomicBool::new(false),
    });
    let h = harness_with(repository, 10).await;
    let order = h.order(4).await;

    let accepted = h.move_to(order.id, OrderStatus::Accepted, wholesaler()).await.unwrap();

    assert_eq!(accepted.status, OrderStatus::Accepted);
    assert_eq!(accepted.version, 1);
    assert_eq!(h.stock().await, 6);
}

/// Two services sharing one store and one ledger, as two running instances
/// would. They do not share the in-process order locks.
struct TwoInstances {
    first: OrderService,
    store: InMemoryOrderRepository,
    ledger: InMemoryStockLedger,
}

impl TwoInstances {
    async fn new(stock: u32) -> Self {
        let store = InMemoryOrderRepository::new();
        let ledger = InMemoryStockLedger::new();
        let first = OrderService::new(
            Arc::new(store.clone()),
            Arc::new(ledger.clone()),
            Notifier::new(Arc::new(RecordingChannel::default())),
            settings(),
        );
        first
            .put_stock(&wholesaler(), PRODUCT, stock_update(stock, 1))
            .await
            .unwrap();
        Self {
            first,
            store,
            ledger,
        }
    }

    /// The other instance, whose first read of `snapshot.id` returns `snapshot`.
    fn second_reading(&self, snapshot: Order) -> OrderService {
        OrderService::new(
            Arc::new(StaleOnceRepository::new(self.store.clone(), snapshot)),
            Arc::new(self.ledger.clone()),
            Notifier::new(Arc::new(RecordingChannel::default())),
            settings(),
        )
    }

    async fn stock(&self) -> u32 {
        self.first.get_stock(PRODUCT).await.unwrap().quantity
    }
}

#[tokio::test]
async fn losing_a_stale_accept_keeps_the_winners_reservation() {
    let cluster = TwoInstances::new(10).await;
    let order = cluster.first.place_order(&retailer(), place(4)).await.unwrap();
    let second = cluster.second_reading(order.clone());

    cluster
        .first
        .update_status(order.id, TransitionRequest::new(OrderStatus::Accepted, wholesaler()))
        .await
        .unwrap();

    let err = second
        .update_status(order.id, TransitionRequest::new(OrderStatus::Accepted, wholesaler()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            current: OrderStatus::Accepted,
            ..
        }
    ));
    let stored = cluster.first.get_order(&wholesaler(), order.id).await.unwrap();
    assert_eq!(stored.status, OrderStatus::Accepted);
    assert_eq!(cluster.stock().await, 6);
    assert_eq!(cluster.ledger.reservation(order.id).map(|r| r.quantity), Some(4));
}

#[tokio::test]
async fn stale_accept_after_a_rejection_rolls_its_reservation_back() {
    let cluster = TwoInstances::new(10).await;
    let order = cluster.first.place_order(&retailer(), place(4)).await.unwrap();
    let second = cluster.second_reading(order.clone());

    cluster
        .first
        .update_status(
            order.id,
            TransitionRequest::new(OrderStatus::Rejected, wholesaler())
                .with_reason("out of season"),
        )
        .await
        .unwrap();

    let err = second
        .update_status(order.id, TransitionRequest::new(OrderStatus::Accepted, wholesaler()))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        OrderError::InvalidTransition {
            current: OrderStatus::Rejected,
            ..
        }
    ));
    assert_eq!(cluster.stock().await, 10);
    assert!(cluster.ledger.reservation(order.id).is_none());
}

#[tokio::test]
async fn stalled_ledger_fails_retryably_and_keeps_order_pending() {
    let inner = InMemoryStockLedger::new();
    let service = OrderService::new(
        Arc::new(InMemoryOrderRepository::new()),
        Arc::new(StalledLedger {
            inner: inner.clone(),
        }),
        Notifier::new(Arc::new(RecordingChannel::default())),
        settings(),
    );
    service
        .put_stock(&wholesaler(), PRODUCT, stock_update(10, 1))
        .await
        .unwrap();
    let order = service.place_order(&retailer(), place(2)).await.unwrap();

    let err = service
        .update_status(order.id, TransitionRequest::new(OrderStatus::Accepted, wholesaler()))
        .await
        .unwrap_err();

    assert!(matches!(err, OrderError::Unavailable(_)));
    assert!(err.is_retryable());
    let order = service.get_order(&wholesaler(), order.id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(service.get_stock(PRODUCT).await.unwrap().quantity, 10);
}

#[tokio::test]
async fn listings_are_scoped_paginated_and_filtered() {
    let h = harness(100).await;
    let mut placed = Vec::new();
    for _ in 0..5 {
        placed.push(h.order(1).await);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    h.move_to(placed[0].id, OrderStatus::Accepted, wholesaler()).await.unwrap();

    let page = h
        .service
        .list_orders(&retailer(), StatusFilter::All, Some(1), Some(2))
        .await
        .unwrap();
    assert_eq!(page.total, 5);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.orders[0].id, placed[4].id);

    let accepted = h
        .service
        .list_orders(
            &wholesaler(),
            StatusFilter::Only(OrderStatus::Accepted),
            None,
            None,
        )
        .await
        .unwrap();
    assert_eq!(accepted.total, 1);
    assert_eq!(accepted.orders[0].id, placed[0].id);

    let clamped = h
        .service
        .list_orders(&retailer(), StatusFilter::All, Some(0), Some(1_000))
        .await
        .unwrap();
    assert_eq!(clamped.page, 1);
    assert_eq!(clamped.page_size, 50);

    let far = h
        .service
        .list_orders(&retailer(), StatusFilter::All, Some(u64::MAX), Some(20))
        .await
        .unwrap();
    assert!(far.orders.is_empty());
    assert_eq!(far.total, 5);
    assert_eq!(far.page, u64::MAX);

    let unassigned = h
        .service
        .list_orders(&transporter(), StatusFilter::All, None, None)
        .await
        .unwrap();
    assert_eq!(unassigned.total, 0);
}

#[tokio::test]
async fn transitions_notify_the_other_parties() {
    let h = harness(10).await;
    let order = h.order(1).await;
    h.move_to(order.id, OrderStatus::Accepted, wholesaler()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = h.channel.events();

    let placed: Vec<_> = events.iter().filter(|e| e.previous_status.is_none()).collect();
    assert_eq!(placed.len(), 1);
    assert_eq!(placed[0].recipient_id, "W1");

    let accepted: Vec<_> = events
        .iter()
        .filter(|e| e.new_status == OrderStatus::Accepted)
        .collect();
    assert_eq!(accepted.len(), 1);
    assert_eq!(accepted[0].recipient_id, "R1");
    assert_eq!(accepted[0].previous_status, Some(OrderStatus::Pending));
}
