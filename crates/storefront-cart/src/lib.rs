#![forbid(unsafe_code)]

//! Cart domain layer: the storefront's shared shopping-cart state.
//!
//! A [`CartStore`] holds two cells, the fetched cart and the panel-open flag,
//! and three derived values computed from the cart:
//!
//! | Value | No cart | Cart |
//! |---|---|---|
//! | `item_count` | `0` | sum of line quantities |
//! | `raw_total` | `0` | `total` in minor units |
//! | `formatted_total` | `None` | en-US currency string |
//!
//! State changes only through the store's actions (`set_cart`, `clear_cart`,
//! `open_cart`, `close_cart`, `toggle_cart`).

pub mod cart;
pub mod config;
pub mod error;
pub mod money;
pub mod store;

pub use cart::{Cart, LineItem, SharedCart};
pub use config::CartConfig;
pub use error::{CartError, Result};
pub use money::{CurrencyCode, format_minor_units};
pub use store::{CartStore, CartSummary, format_cart_total};
