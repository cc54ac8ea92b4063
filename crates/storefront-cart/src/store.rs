#![forbid(unsafe_code)]

//! The cart store: named cells, derived totals, and the actions that are the
//! only way to change them.
//!
//! # Edge cases
//!
//! "No cart yet" and "an empty cart" read the same through `item_count` and
//! `raw_total` (both 0). Only `formatted_total` tells them apart: `None` for
//! no cart, `Some("$0.00")` for an empty USD cart.

use serde::Serialize;
use storefront_reactive::{Cell, Derived, ReadOnly, Runtime, Subscription};
use tracing::debug;

use crate::cart::{Cart, SharedCart};
use crate::config::CartConfig;
use crate::money::{CurrencyCode, format_minor_units};

/// A consistent one-shot read of every cart value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub item_count: u64,
    pub raw_total: i64,
    pub formatted_total: Option<String>,
    pub panel_open: bool,
}

/// Reactive cart state for one storefront session.
///
/// Build it once at application start and hand out references. Consumers
/// observe through the read-only accessors and change state only through the
/// action methods.
pub struct CartStore {
    runtime: Runtime,
    config: CartConfig,
    cart: Cell<Option<SharedCart>>,
    panel_open: Cell<bool>,
    item_count: Derived<u64>,
    raw_total: Derived<i64>,
    formatted_total: Derived<Option<String>>,
}

impl std::fmt::Debug for CartStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStore")
            .field("runtime", &self.runtime)
            .field("cart", &self.cart)
            .field("panel_open", &self.panel_open)
            .finish_non_exhaustive()
    }
}

impl Default for CartStore {
    fn default() -> Self {
        Self::new(CartConfig::default())
    }
}

impl CartStore {
    #[must_use]
    pub fn new(config: CartConfig) -> Self {
        let runtime = Runtime::with_config(config.runtime.clone());
        let cart = Cell::new(&runtime, None::<SharedCart>);
        let panel_open = Cell::new(&runtime, false);

        let item_count = Derived::from_source(&cart, |cart: &Option<SharedCart>| {
            cart.as_ref().map_or(0, |c| c.item_count())
        });
        let raw_total = Derived::from_source(&cart, |cart: &Option<SharedCart>| {
            cart.as_ref().map_or(0, |c| c.total)
        });
        let default_currency = config.default_currency.clone();
        let divisor = config.minor_unit_divisor;
        let formatted_total = Derived::from_source(&cart, move |cart: &Option<SharedCart>| {
            cart.as_ref()
                .map(|c| format_cart_total(c, &default_currency, divisor))
        });

        Self {
            runtime,
            config,
            cart,
            panel_open,
            item_count,
            raw_total,
            formatted_total,
        }
    }

    // ── Actions ─────────────────────────────────────────────────────────

    /// Replace the cart with a freshly received payload, or drop it.
    pub fn set_cart(&self, cart: Option<Cart>) {
        self.set_shared_cart(cart.map(SharedCart::new));
    }

    /// Replace the cart with an existing handle. Setting the handle that is
    /// already stored is a no-op.
    pub fn set_shared_cart(&self, cart: Option<SharedCart>) {
        debug!(
            action = "set_cart",
            present = cart.is_some(),
            items = cart.as_ref().map_or(0, |c| c.items.len()),
            "cart action"
        );
        self.cart.set(cart);
    }

    pub fn clear_cart(&self) {
        debug!(action = "clear_cart", "cart action");
        self.cart.set(None);
    }

    pub fn open_cart(&self) {
        debug!(action = "open_cart", "cart action");
        self.panel_open.set(true);
    }

    pub fn close_cart(&self) {
        debug!(action = "close_cart", "cart action");
        self.panel_open.set(false);
    }

    pub fn toggle_cart(&self) {
        debug!(action = "toggle_cart", "cart action");
        self.panel_open.set(!self.panel_open.get());
    }

    /// Apply several actions with one round of notifications.
    pub fn batch<R>(&self, f: impl FnOnce(&Self) -> R) -> R {
        self.runtime.batch(|| f(self))
    }

    // ── Observation ─────────────────────────────────────────────────────

    #[must_use]
    pub fn cart(&self) -> ReadOnly<Option<SharedCart>> {
        self.cart.read_only()
    }

    #[must_use]
    pub fn panel_open(&self) -> ReadOnly<bool> {
        self.panel_open.read_only()
    }

    #[must_use]
    pub fn item_count(&self) -> &Derived<u64> {
        &self.item_count
    }

    /// Cart total in minor units; 0 when there is no cart.
    #[must_use]
    pub fn raw_total(&self) -> &Derived<i64> {
        &self.raw_total
    }

    #[must_use]
    pub fn formatted_total(&self) -> &Derived<Option<String>> {
        &self.formatted_total
    }

    /// Shorthand for `item_count().subscribe(..)`.
    pub fn on_item_count(&self, callback: impl Fn(&u64) + 'static) -> Subscription {
        self.item_count.subscribe(callback)
    }

    #[must_use]
    pub fn snapshot(&self) -> CartSummary {
        CartSummary {
            item_count: self.item_count.get(),
            raw_total: self.raw_total.get(),
            formatted_total: self.formatted_total.get(),
            panel_open: self.panel_open.get(),
        }
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    #[must_use]
    pub fn config(&self) -> &CartConfig {
        &self.config
    }
}

/// Render a cart's total, falling back to `default_currency` when the cart's
/// code is missing or malformed.
#[must_use]
pub fn format_cart_total(cart: &Cart, default_currency: &CurrencyCode, divisor: u32) -> String {
    let currency = cart
        .currency_code
        .as_deref()
        .and_then(|code| CurrencyCode::parse(code).ok())
        .unwrap_or_else(|| default_currency.clone());
    format_minor_units(cart.total, divisor, &currency)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::LineItem;
    use std::cell::{Cell as Counter, RefCell};
    use std::rc::Rc;
    use std::sync::{Arc, Mutex};
    use tracing::{Level, Subscriber};
    use tracing_subscriber::Layer;
    use tracing_subscriber::layer::{Context, SubscriberExt};

    fn cart(quantities: &[u32], total: i64, currency: &str) -> Cart {
        Cart::default()
            .with_items(quantities.iter().copied().map(LineItem::with_quantity))
            .with_total(total)
            .with_currency(currency)
    }

    #[test]
    fn initial_state() {
        let store = CartStore::default();
        assert_eq!(
            store.snapshot(),
            CartSummary {
                item_count: 0,
                raw_total: 0,
                formatted_total: None,
                panel_open: false,
            }
        );
        assert!(store.cart().get().is_none());
    }

    #[test]
    fn item_count_sums_quantities() {
        let store = CartStore::default();
        store.set_cart(Some(cart(&[2, 3], 0, "usd")));
        assert_eq!(store.item_count().get(), 5);
    }

    #[test]
    fn null_cart_reports_zero_and_no_total() {
        let store = CartStore::default();
        store.set_cart(Some(cart(&[1], 500, "usd")));
        store.set_cart(None);
        assert_eq!(store.item_count().get(), 0);
        assert_eq!(store.raw_total().get(), 0);
        assert_eq!(store.formatted_total().get(), None);
    }

    #[test]
    fn empty_cart_formats_zero() {
        let store = CartStore::default();
        store.set_cart(Some(cart(&[], 0, "usd")));
        assert_eq!(store.item_count().get(), 0);
        assert_eq!(store.raw_total().get(), 0);
        assert_eq!(store.formatted_total().get().as_deref(), Some("$0.00"));
    }

    #[test]
    fn euro_total() {
        let store = CartStore::default();
        store.set_cart(Some(cart(&[1], 1999, "eur")));
        assert_eq!(store.formatted_total().get().as_deref(), Some("€19.99"));
        assert_eq!(store.raw_total().get(), 1999);
    }

    #[test]
    fn missing_currency_uses_default() {
        let store = CartStore::default();
        store.set_cart(Some(Cart::default().with_total(250)));
        assert_eq!(store.formatted_total().get().as_deref(), Some("$2.50"));

        let store = CartStore::new(
            CartConfig::default().with_default_currency(CurrencyCode::parse("gbp").unwrap()),
        );
        store.set_cart(Some(Cart::default().with_total(250).with_currency("??")));
        assert_eq!(store.formatted_total().get().as_deref(), Some("£2.50"));
    }

    #[test]
    fn clear_cart_resets() {
        let store = CartStore::default();
        store.set_cart(Some(cart(&[4], 800, "usd")));
        store.clear_cart();
        assert!(store.cart().get().is_none());
        assert_eq!(store.formatted_total().get(), None);
    }

    #[test]
    fn panel_actions() {
        let store = CartStore::default();
        let initial = store.panel_open().get();
        store.toggle_cart();
        assert_eq!(store.panel_open().get(), !initial);
        store.toggle_cart();
        assert_eq!(store.panel_open().get(), initial);

        for start_open in [false, true] {
            if start_open {
                store.open_cart();
            }
            store.open_cart();
            store.close_cart();
            assert!(!store.panel_open().get());
        }
    }

    #[test]
    fn subscribe_item_count_delivers_immediately() {
        let store = CartStore::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_cb = Rc::clone(&seen);
        let _sub = store.on_item_count(move |n| seen_cb.borrow_mut().push(*n));
        assert_eq!(*seen.borrow(), vec![0]);

        store.set_cart(Some(cart(&[1, 1], 0, "usd")));
        assert_eq!(*seen.borrow(), vec![0, 2]);
    }

    #[test]
    fn diamond_over_count_and_total_notifies_once() {
        let store = CartStore::default();
        let per_item = Derived::from2(store.item_count(), store.raw_total(), |count, total| {
            if *count == 0 { 0 } else { total / *count as i64 }
        })
        .unwrap();

        let hits = Rc::new(Counter::new(0u32));
        let hits_cb = Rc::clone(&hits);
        let _sub = per_item.subscribe(move |_| hits_cb.set(hits_cb.get() + 1));
        assert_eq!(hits.get(), 1);

        store.set_cart(Some(cart(&[2, 2], 1000, "usd")));
        assert_eq!(hits.get(), 2);
        assert_eq!(per_item.get(), 250);
    }

    #[test]
    fn same_handle_is_idempotent_new_payload_is_not() {
        let store = CartStore::default();
        let hits = Rc::new(Counter::new(0u32));
        let hits_cb = Rc::clone(&hits);
        let _sub = store.cart().subscribe(move |_| hits_cb.set(hits_cb.get() + 1));

        let shared = SharedCart::new(cart(&[1], 100, "usd"));
        store.set_shared_cart(Some(shared.clone()));
        store.set_shared_cart(Some(shared));
        assert_eq!(hits.get(), 2);

        // Equal contents, new payload: the cell changes...
        store.set_cart(Some(cart(&[1], 100, "usd")));
        assert_eq!(hits.get(), 3);
    }

    #[test]
    fn equal_derived_output_does_not_notify() {
        let store = CartStore::default();
        store.set_cart(Some(cart(&[1], 100, "usd")));
        let hits = Rc::new(Counter::new(0u32));
        let hits_cb = Rc::clone(&hits);
        let _sub = store.formatted_total().subscribe(move |_| hits_cb.set(hits_cb.get() + 1));

        // ...but derived values only notify when their output differs.
        store.set_cart(Some(cart(&[3], 100, "usd")));
        assert_eq!(hits.get(), 1);
        store.set_cart(Some(cart(&[3], 200, "usd")));
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn batch_coalesces_actions() {
        let store = CartStore::default();
        let hits = Rc::new(Counter::new(0u32));
        let hits_cb = Rc::clone(&hits);
        let _sub = store.panel_open().subscribe(move |_| hits_cb.set(hits_cb.get() + 1));

        store.batch(|s| {
            s.open_cart();
            s.toggle_cart();
            s.toggle_cart();
            s.set_cart(Some(cart(&[1], 100, "usd")));
        });
        assert!(store.panel_open().get());
        assert_eq!(hits.get(), 2);
        assert_eq!(store.item_count().get(), 1);
    }

    #[test]
    fn subscriber_may_trigger_actions() {
        let store = Rc::new(CartStore::default());
        let weak = Rc::downgrade(&store);
        // Open the panel whenever the cart gains items.
        let _auto_open = store.on_item_count(move |n| {
            if *n > 0 {
                if let Some(store) = weak.upgrade() {
                    store.open_cart();
                }
            }
        });
        assert!(!store.panel_open().get());

        store.set_cart(Some(cart(&[1], 100, "usd")));
        assert!(store.panel_open().get());
    }

    #[test]
    fn batched_toggle_round_trip_is_silent() {
        let store = CartStore::default();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_cb = Rc::clone(&seen);
        let _panel = store
            .panel_open()
            .subscribe(move |open| seen_cb.borrow_mut().push(*open));

        store.batch(|s| {
            s.toggle_cart();
            s.toggle_cart();
        });
        assert_eq!(*seen.borrow(), vec![false]);
    }

    #[test]
    fn actions_emit_debug_events() {
        let actions = Arc::new(Mutex::new(Vec::new()));
        let subscriber = tracing_subscriber::registry().with(ActionCapture {
            actions: Arc::clone(&actions),
        });
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = CartStore::default();
        store.set_cart(Some(cart(&[1], 100, "usd")));
        store.open_cart();
        store.toggle_cart();
        store.close_cart();
        store.clear_cart();

        assert_eq!(
            *actions.lock().expect("action capture lock"),
            vec![
                "set_cart",
                "open_cart",
                "toggle_cart",
                "close_cart",
                "clear_cart"
            ]
        );
    }

    struct ActionCapture {
        actions: Arc<Mutex<Vec<String>>>,
    }

    impl<S: Subscriber> Layer<S> for ActionCapture {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            struct Action {
                name: Option<String>,
            }
            impl tracing::field::Visit for Action {
                fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                    if field.name() == "action" {
                        self.name = Some(value.to_string());
                    }
                }

                fn record_debug(
                    &mut self,
                    _field: &tracing::field::Field,
                    _value: &dyn std::fmt::Debug,
                ) {
                }
            }
            if *event.metadata().level() != Level::DEBUG {
                return;
            }
            let mut action = Action { name: None };
            event.record(&mut action);
            if let Some(name) = action.name {
                self.actions
                    .lock()
                    .expect("action capture lock")
                    .push(name);
            }
        }
    }
}
