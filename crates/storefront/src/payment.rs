//! Post-payment reconciliation.
//!
//! When the shopper lands back from the gateway, the order's real state is
//! only knowable from the backend. This module turns the redirect's query
//! parameters into a provisional view, triggers a server-side verification,
//! and watches the order row over the realtime channel until a terminal
//! state is reached. Terminal states are sticky: once a payment is shown as
//! approved or rejected, no later signal can change the view.

use std::future::Future;
use std::sync::Arc;

use portal_sete_core::{OrderId, OrderStatus, PaymentId};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::backend::{BackendError, OrderSubscription};
use crate::cart::CartStore;

/// Tag sent with verification requests so server logs can attribute the
/// trigger.
const VERIFICATION_SOURCE: &str = "success_page_active_sync";

/// What the shopper is shown about their payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaymentView {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PaymentView {
    /// Terminal views never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// An input to the payment view reducer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentSignal {
    /// The gateway redirect's status hint, if any.
    Redirect(Option<String>),
    /// The order row changed on the backend.
    OrderChanged(OrderStatus),
}

/// Fold one signal into the current view.
///
/// The only transitions out of [`PaymentView::Pending`] are to a terminal
/// view; signals arriving after that are ignored, so a late or duplicate
/// event can never downgrade an outcome.
#[must_use]
pub fn reduce(current: PaymentView, signal: &PaymentSignal) -> PaymentView {
    if current.is_terminal() {
        return current;
    }

    match signal {
        PaymentSignal::Redirect(status) => match status.as_deref() {
            Some("approved" | "completed") => PaymentView::Approved,
            Some("rejected" | "failure") => PaymentView::Rejected,
            _ => PaymentView::Pending,
        },
        PaymentSignal::OrderChanged(status) => {
            if status.is_paid() {
                PaymentView::Approved
            } else if *status == OrderStatus::Rejected {
                PaymentView::Rejected
            } else {
                PaymentView::Pending
            }
        }
    }
}

/// Parameters extracted from the gateway's return redirect.
///
/// The gateway is inconsistent about parameter names across flows, so each
/// field accepts an alias.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RedirectParams {
    pub payment_id: Option<PaymentId>,
    pub status: Option<String>,
    pub order_id: Option<OrderId>,
}

impl RedirectParams {
    /// Parse from a raw query string (without the leading `?`).
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        let get = |name: &str| {
            pairs
                .iter()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.clone())
        };

        Self {
            payment_id: get("payment_id")
                .or_else(|| get("collection_id"))
                .map(PaymentId::new),
            status: get("status").or_else(|| get("collection_status")),
            order_id: get("external_reference").and_then(|v| v.parse().ok()),
        }
    }
}

/// Backend operations the watcher depends on, as a seam for tests.
pub trait OrderEvents {
    /// Ask the backend to re-check the order against the gateway.
    fn verify_payment(
        &self,
        order_id: OrderId,
        source: &str,
    ) -> impl Future<Output = Result<(), BackendError>> + Send;

    /// Subscribe to the order's row changes.
    fn subscribe_order(
        &self,
        order_id: OrderId,
    ) -> impl Future<Output = Result<OrderSubscription, BackendError>> + Send;
}

/// Observable watcher state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WatchState {
    pub view: PaymentView,
    /// A server-side verification is in flight.
    pub syncing: bool,
}

/// Drives the payment view for one gateway return.
///
/// Dropping the watcher aborts the background driver and with it any open
/// realtime subscription.
pub struct PaymentWatcher {
    state: watch::Receiver<WatchState>,
    driver: Option<JoinHandle<()>>,
}

impl PaymentWatcher {
    /// Start watching after a gateway redirect.
    ///
    /// The cart is cleared unconditionally: reaching the return page means
    /// the purchase attempt happened, whatever its outcome. The redirect's
    /// status hint sets the initial view; if an order id is present and the
    /// redirect did not already report a rejection, the order row is
    /// watched and a verification is triggered, racing until a terminal
    /// state is reached.
    #[instrument(skip(api, cart))]
    pub fn start<A>(api: A, cart: &CartStore, params: RedirectParams) -> Self
    where
        A: OrderEvents + Send + Sync + 'static,
    {
        cart.clear();

        let initial = reduce(
            PaymentView::default(),
            &PaymentSignal::Redirect(params.status.clone()),
        );
        let (tx, rx) = watch::channel(WatchState {
            view: initial,
            syncing: false,
        });

        // A rejected redirect needs no confirmation of either kind; the
        // driver only exists to verify and to watch for a settlement.
        let driver = params
            .order_id
            .filter(|_| initial != PaymentView::Rejected)
            .map(|order_id| {
                let tx = Arc::new(tx);
                tokio::spawn(drive(api, tx, order_id))
            });

        Self { state: rx, driver }
    }

    /// Current state snapshot.
    #[must_use]
    pub fn current(&self) -> WatchState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<WatchState> {
        self.state.clone()
    }

    /// Stop the driver without waiting for a terminal state.
    pub fn stop(&mut self) {
        if let Some(driver) = self.driver.take() {
            driver.abort();
        }
    }
}

impl Drop for PaymentWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Background driver: watch the row and verify, concurrently.
async fn drive<A>(api: A, tx: Arc<watch::Sender<WatchState>>, order_id: OrderId)
where
    A: OrderEvents + Send + Sync + 'static,
{
    // The subscription must exist before verification starts: the row
    // change the verification itself triggers is push-only, and a change
    // that lands before the channel is open is never delivered.
    let subscription = if tx.borrow().view.is_terminal() {
        None
    } else {
        match api.subscribe_order(order_id).await {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                warn!(%order_id, "could not watch order updates: {e}");
                None
            }
        }
    };

    // Active verification always runs, even when the redirect already
    // claimed success, so the server reconciles its row with the gateway.
    let verify = async {
        tx.send_modify(|state| state.syncing = true);
        if let Err(e) = api.verify_payment(order_id, VERIFICATION_SOURCE).await {
            // The realtime watch still covers us; verification is
            // best-effort.
            warn!(%order_id, "payment verification failed: {e}");
        }
        tx.send_modify(|state| state.syncing = false);
    };

    let watch_updates = async {
        let Some(mut subscription) = subscription else {
            return;
        };
        while let Some(update) = subscription.next().await {
            let signal = PaymentSignal::OrderChanged(update.status);
            tx.send_modify(|state| state.view = reduce(state.view, &signal));

            if tx.borrow().view.is_terminal() {
                info!(%order_id, status = %update.status, "payment reached terminal state");
                break;
            }
        }
    };

    tokio::join!(verify, watch_updates);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::mpsc;

    use super::*;
    use crate::backend::OrderUpdate;

    #[test]
    fn test_reducer_maps_redirect_hints() {
        let pending = PaymentView::Pending;
        for hint in ["approved", "completed"] {
            let signal = PaymentSignal::Redirect(Some(hint.to_string()));
            assert_eq!(reduce(pending, &signal), PaymentView::Approved);
        }
        for hint in ["rejected", "failure"] {
            let signal = PaymentSignal::Redirect(Some(hint.to_string()));
            assert_eq!(reduce(pending, &signal), PaymentView::Rejected);
        }
        assert_eq!(
            reduce(pending, &PaymentSignal::Redirect(None)),
            PaymentView::Pending
        );
        assert_eq!(
            reduce(
                pending,
                &PaymentSignal::Redirect(Some("in_process".to_string()))
            ),
            PaymentView::Pending
        );
    }

    #[test]
    fn test_terminal_views_are_sticky() {
        let approved = PaymentView::Approved;
        assert_eq!(
            reduce(
                approved,
                &PaymentSignal::OrderChanged(OrderStatus::Rejected)
            ),
            PaymentView::Approved
        );
        let rejected = PaymentView::Rejected;
        assert_eq!(
            reduce(
                rejected,
                &PaymentSignal::Redirect(Some("approved".to_string()))
            ),
            PaymentView::Rejected
        );
    }

    #[test]
    fn test_order_change_signals() {
        let pending = PaymentView::Pending;
        assert_eq!(
            reduce(pending, &PaymentSignal::OrderChanged(OrderStatus::Approved)),
            PaymentView::Approved
        );
        assert_eq!(
            reduce(
                pending,
                &PaymentSignal::OrderChanged(OrderStatus::Completed)
            ),
            PaymentView::Approved
        );
        assert_eq!(
            reduce(pending, &PaymentSignal::OrderChanged(OrderStatus::Rejected)),
            PaymentView::Rejected
        );
        assert_eq!(
            reduce(pending, &PaymentSignal::OrderChanged(OrderStatus::Pending)),
            PaymentView::Pending
        );
    }

    #[test]
    fn test_redirect_param_aliases() {
        let id = OrderId::generate();
        let query = format!("collection_id=123&collection_status=approved&external_reference={id}");
        let params = RedirectParams::from_query(&query);

        assert_eq!(params.payment_id, Some(PaymentId::new("123".to_string())));
        assert_eq!(params.status.as_deref(), Some("approved"));
        assert_eq!(params.order_id, Some(id));

        let params = RedirectParams::from_query("payment_id=9&status=pending");
        assert_eq!(params.payment_id, Some(PaymentId::new("9".to_string())));
        assert_eq!(params.status.as_deref(), Some("pending"));
        assert_eq!(params.order_id, None);
    }

    #[test]
    fn test_primary_params_win_over_aliases() {
        let params = RedirectParams::from_query(
            "payment_id=primary&collection_id=alias&status=approved&collection_status=rejected",
        );
        assert_eq!(params.payment_id, Some(PaymentId::new("primary".to_string())));
        assert_eq!(params.status.as_deref(), Some("approved"));
    }

    /// Fake backend with a scripted verify result and a pushable update
    /// stream.
    struct FakeEvents {
        verify_ok: bool,
        updates: Mutex<Option<mpsc::Receiver<OrderUpdate>>>,
    }

    use std::sync::Mutex;

    impl OrderEvents for FakeEvents {
        async fn verify_payment(
            &self,
            _order_id: OrderId,
            source: &str,
        ) -> Result<(), BackendError> {
            assert_eq!(source, "success_page_active_sync");
            if self.verify_ok {
                Ok(())
            } else {
                Err(BackendError::Api {
                    status: 500,
                    message: "verify exploded".to_string(),
                })
            }
        }

        async fn subscribe_order(
            &self,
            _order_id: OrderId,
        ) -> Result<OrderSubscription, BackendError> {
            let rx = self
                .updates
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take()
                .ok_or_else(|| BackendError::Realtime("no stream scripted".to_string()))?;
            Ok(OrderSubscription::from_channel(rx))
        }
    }

    fn temp_cart() -> (tempfile::TempDir, CartStore) {
        let dir = tempfile::tempdir().unwrap();
        let cart = CartStore::open(dir.path().join("cart.json"));
        (dir, cart)
    }

    async fn wait_for<F: Fn(&WatchState) -> bool>(
        rx: &mut watch::Receiver<WatchState>,
        predicate: F,
    ) {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if predicate(&rx.borrow().clone()) {
                    return;
                }
                rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_approved_redirect_shows_approved_despite_failed_verify() {
        let (_dir, cart) = temp_cart();
        let api = FakeEvents {
            verify_ok: false,
            updates: Mutex::new(None),
        };
        let params = RedirectParams {
            payment_id: Some(PaymentId::new("1".to_string())),
            status: Some("approved".to_string()),
            order_id: Some(OrderId::generate()),
        };

        let watcher = PaymentWatcher::start(api, &cart, params);
        assert_eq!(watcher.current().view, PaymentView::Approved);

        let mut rx = watcher.subscribe();
        wait_for(&mut rx, |s| !s.syncing).await;
        assert_eq!(watcher.current().view, PaymentView::Approved);
    }

    #[tokio::test]
    async fn test_pending_redirect_resolves_via_realtime() {
        let (_dir, cart) = temp_cart();
        let order_id = OrderId::generate();

        let (update_tx, update_rx) = mpsc::channel(4);
        let api = FakeEvents {
            verify_ok: true,
            updates: Mutex::new(Some(update_rx)),
        };
        let params = RedirectParams {
            payment_id: None,
            status: Some("pending".to_string()),
            order_id: Some(order_id),
        };

        let watcher = PaymentWatcher::start(api, &cart, params);
        assert_eq!(watcher.current().view, PaymentView::Pending);

        update_tx
            .send(OrderUpdate {
                order_id,
                status: OrderStatus::Pending,
            })
            .await
            .unwrap();
        update_tx
            .send(OrderUpdate {
                order_id,
                status: OrderStatus::Completed,
            })
            .await
            .unwrap();

        let mut rx = watcher.subscribe();
        wait_for(&mut rx, |s| s.view == PaymentView::Approved).await;

        // A late contradictory event changes nothing.
        let _ = update_tx
            .send(OrderUpdate {
                order_id,
                status: OrderStatus::Rejected,
            })
            .await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(watcher.current().view, PaymentView::Approved);
    }

    /// Backend whose order row settles while the verification call is in
    /// flight. The resulting update is only delivered if the subscription
    /// was opened before verification started.
    struct SettlingEvents {
        subscribed: AtomicBool,
        update_tx: mpsc::Sender<OrderUpdate>,
        updates: Mutex<Option<mpsc::Receiver<OrderUpdate>>>,
    }

    impl OrderEvents for SettlingEvents {
        async fn verify_payment(
            &self,
            order_id: OrderId,
            _source: &str,
        ) -> Result<(), BackendError> {
            if self.subscribed.load(Ordering::SeqCst) {
                let _ = self
                    .update_tx
                    .send(OrderUpdate {
                        order_id,
                        status: OrderStatus::Approved,
                    })
                    .await;
            }
            Ok(())
        }

        async fn subscribe_order(
            &self,
            _order_id: OrderId,
        ) -> Result<OrderSubscription, BackendError> {
            self.subscribed.store(true, Ordering::SeqCst);
            let rx = self
                .updates
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .take()
                .ok_or_else(|| BackendError::Realtime("already subscribed".to_string()))?;
            Ok(OrderSubscription::from_channel(rx))
        }
    }

    #[tokio::test]
    async fn test_update_during_verification_is_not_missed() {
        let (_dir, cart) = temp_cart();
        let order_id = OrderId::generate();

        let (update_tx, update_rx) = mpsc::channel(4);
        let api = SettlingEvents {
            subscribed: AtomicBool::new(false),
            update_tx,
            updates: Mutex::new(Some(update_rx)),
        };
        let params = RedirectParams {
            payment_id: Some(PaymentId::new("7".to_string())),
            status: Some("pending".to_string()),
            order_id: Some(order_id),
        };

        let watcher = PaymentWatcher::start(api, &cart, params);
        let mut rx = watcher.subscribe();
        wait_for(&mut rx, |s| s.view == PaymentView::Approved).await;
    }

    /// Backend that counts verification calls.
    struct CountingEvents {
        verify_calls: Arc<AtomicUsize>,
    }

    impl OrderEvents for CountingEvents {
        async fn verify_payment(
            &self,
            _order_id: OrderId,
            _source: &str,
        ) -> Result<(), BackendError> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn subscribe_order(
            &self,
            _order_id: OrderId,
        ) -> Result<OrderSubscription, BackendError> {
            Err(BackendError::Realtime("not expected".to_string()))
        }
    }

    #[tokio::test]
    async fn test_rejected_redirect_skips_verification() {
        let (_dir, cart) = temp_cart();
        let verify_calls = Arc::new(AtomicUsize::new(0));
        let api = CountingEvents {
            verify_calls: Arc::clone(&verify_calls),
        };
        let params = RedirectParams {
            payment_id: Some(PaymentId::new("9".to_string())),
            status: Some("rejected".to_string()),
            order_id: Some(OrderId::generate()),
        };

        let watcher = PaymentWatcher::start(api, &cart, params);
        assert_eq!(watcher.current().view, PaymentView::Rejected);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(verify_calls.load(Ordering::SeqCst), 0);
        assert!(!watcher.current().syncing);
    }

    #[tokio::test]
    async fn test_start_clears_cart_unconditionally() {
        let (_dir, cart) = temp_cart();
        cart.add(crate::models::Product {
            id: portal_sete_core::ProductId::generate(),
            name: "Leftover".to_string(),
            description: String::new(),
            price: portal_sete_core::Price::from_cents(1000),
            image_url: String::new(),
            is_active: true,
            tags: Vec::new(),
            youtube_url: None,
            download_label_main: None,
            download_label_extras: None,
            download_label_bonus: None,
        });

        let api = FakeEvents {
            verify_ok: true,
            updates: Mutex::new(None),
        };
        let _watcher = PaymentWatcher::start(api, &cart, RedirectParams::default());
        assert!(cart.is_empty());
    }
}
