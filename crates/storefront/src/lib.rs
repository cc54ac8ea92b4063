#![forbid(unsafe_code)]

//! Storefront client state facade.
//!
//! This crate provides the stable, ergonomic surface area for UI code.

pub use storefront_cart as cart;
pub use storefront_reactive as reactive;

pub mod prelude {
    pub use storefront_cart::{Cart, CartConfig, CartStore, CartSummary, LineItem, SharedCart};
    pub use storefront_reactive::{Cell, Derived, ReadOnly, Runtime, Subscription};
}
