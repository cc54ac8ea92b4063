#![forbid(unsafe_code)]

//! Typed cart payload received from the commerce API.
//!
//! The API may omit or null out any field while a cart is still loading.
//! Decoding normalizes those to empty/zero values so everything downstream is
//! a total function of a well-formed [`Cart`].

use std::fmt;
use std::ops::Deref;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::Result;

/// One line of a cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItem {
    pub id: Option<String>,
    pub title: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub quantity: u32,
    /// Price per unit in minor currency units.
    pub unit_price: Option<i64>,
}

impl LineItem {
    #[must_use]
    pub fn with_quantity(quantity: u32) -> Self {
        Self {
            quantity,
            ..Self::default()
        }
    }
}

/// Cart snapshot as delivered by the commerce API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cart {
    pub id: Option<String>,
    #[serde(deserialize_with = "null_as_default")]
    pub items: Vec<LineItem>,
    /// Grand total in minor currency units (cents for USD).
    #[serde(deserialize_with = "null_as_default")]
    pub total: i64,
    /// ISO 4217 code, any case. `None` falls back to the configured default.
    pub currency_code: Option<String>,
}

impl Cart {
    /// Decode a cart from the API's JSON body.
    pub fn from_json(body: &str) -> Result<Self> {
        Ok(serde_json::from_str(body)?)
    }

    /// Decode a cart from an already-parsed JSON value.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Sum of line item quantities.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    #[must_use]
    pub fn with_items(mut self, items: impl IntoIterator<Item = LineItem>) -> Self {
        self.items = items.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_total(mut self, total: i64) -> Self {
        self.total = total;
        self
    }

    #[must_use]
    pub fn with_currency(mut self, code: impl Into<String>) -> Self {
        self.currency_code = Some(code.into());
        self
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A cart as stored in the cart cell.
///
/// Equality is pointer identity: the cart is always replaced wholesale, so a
/// freshly fetched cart counts as a change even when its contents match the
/// previous one, while re-setting the same handle is a no-op.
#[derive(Clone)]
pub struct SharedCart(Rc<Cart>);

impl SharedCart {
    #[must_use]
    pub fn new(cart: Cart) -> Self {
        Self(Rc::new(cart))
    }

    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl PartialEq for SharedCart {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for SharedCart {}

impl Deref for SharedCart {
    type Target = Cart;

    fn deref(&self) -> &Cart {
        &self.0
    }
}

impl From<Cart> for SharedCart {
    fn from(cart: Cart) -> Self {
        Self::new(cart)
    }
}

impl fmt::Debug for SharedCart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}
