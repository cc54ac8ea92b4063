#![forbid(unsafe_code)]

//! en-US currency rendering for minor-unit amounts.
//!
//! Output matches the `en-US` currency style used by browsers: a symbol
//! prefix for currencies that have one in that locale (`$`, `€`, `CA$`), or
//! the ISO code followed by a no-break space otherwise (`CHF 12.50`). The
//! minus sign goes before the symbol, the integer part is grouped by
//! thousands, and the fraction is rounded half away from zero to the
//! currency's digit count.
//!
//! All arithmetic is integer-based; amounts are never routed through `f64`.

use std::fmt;

use num_format::{Locale, ToFormattedString};
use serde::{Deserialize, Serialize};

use crate::error::{CartError, Result};

/// A validated, upper-cased ISO 4217 currency code.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CurrencyCode(String);

impl CurrencyCode {
    /// Parse a three-letter code in any case.
    pub fn parse(code: &str) -> Result<Self> {
        let trimmed = code.trim();
        if trimmed.len() == 3 && trimmed.bytes().all(|b| b.is_ascii_alphabetic()) {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(CartError::invalid_currency(code))
        }
    }

    #[must_use]
    pub fn usd() -> Self {
        Self("USD".to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn info(&self) -> CurrencyInfo {
        CURRENCIES
            .iter()
            .find(|c| c.code == self.0)
            .copied()
            .unwrap_or(CurrencyInfo {
                code: "",
                symbol: None,
                fraction_digits: 2,
            })
    }

    /// Digits shown after the decimal point.
    #[must_use]
    pub fn fraction_digits(&self) -> u32 {
        self.info().fraction_digits
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for CurrencyCode {
    type Error = CartError;

    fn try_from(code: String) -> Result<Self> {
        Self::parse(&code)
    }
}

impl From<CurrencyCode> for String {
    fn from(code: CurrencyCode) -> Self {
        code.0
    }
}

#[derive(Debug, Clone, Copy)]
struct CurrencyInfo {
    code: &'static str,
    symbol: Option<&'static str>,
    fraction_digits: u32,
}

const fn currency(
    code: &'static str,
    symbol: Option<&'static str>,
    fraction_digits: u32,
) -> CurrencyInfo {
    CurrencyInfo {
        code,
        symbol,
        fraction_digits,
    }
}

/// en-US display data. Codes absent here render as `CODE 1.00`.
const CURRENCIES: &[CurrencyInfo] = &[
    currency("USD", Some("$"), 2),
    currency("EUR", Some("€"), 2),
    currency("GBP", Some("£"), 2),
    currency("JPY", Some("¥"), 0),
    currency("CAD", Some("CA$"), 2),
    currency("AUD", Some("A$"), 2),
    currency("NZD", Some("NZ$"), 2),
    currency("HKD", Some("HK$"), 2),
    currency("MXN", Some("MX$"), 2),
    currency("BRL", Some("R$"), 2),
    currency("CNY", Some("CN¥"), 2),
    currency("TWD", Some("NT$"), 2),
    currency("INR", Some("₹"), 2),
    currency("ILS", Some("₪"), 2),
    currency("KRW", Some("₩"), 0),
    currency("VND", Some("₫"), 0),
    currency("PHP", Some("₱"), 2),
    currency("CLP", None, 0),
    currency("ISK", None, 0),
    currency("UGX", None, 0),
    currency("PYG", None, 0),
    currency("BHD", None, 3),
    currency("JOD", None, 3),
    currency("KWD", None, 3),
    currency("OMR", None, 3),
    currency("TND", None, 3),
];

/// Render `amount_minor / divisor` units of `currency` in en-US style.
///
/// `divisor` is the number of stored minor units per major unit (100 for
/// amounts kept in cents). A zero divisor is treated as 1.
#[must_use]
pub fn format_minor_units(amount_minor: i64, divisor: u32, currency: &CurrencyCode) -> String {
    let info = currency.info();
    let digits = info.fraction_digits;
    let scale = 10i128.pow(digits);
    let divisor = i128::from(divisor.max(1));

    // Round |amount| * 10^digits / divisor half away from zero.
    let numerator = i128::from(amount_minor).abs() * scale;
    let mut scaled = numerator / divisor;
    if (numerator % divisor) * 2 >= divisor {
        scaled += 1;
    }

    let whole = (scaled / scale).to_formatted_string(&Locale::en);
    let mut out = String::new();
    if amount_minor < 0 {
        out.push('-');
    }
    match info.symbol {
        Some(symbol) => out.push_str(symbol),
        None => {
            out.push_str(currency.as_str());
            out.push('\u{a0}');
        }
    }
    out.push_str(&whole);
    if digits > 0 {
        let fraction = scaled % scale;
        out.push('.');
        out.push_str(&format!("{fraction:0width$}", width = digits as usize));
    }
    out
}
