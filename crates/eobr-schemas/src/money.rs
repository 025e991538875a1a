//! Fixed-point money type.
//!
//! Every amount that flows through the pipeline (line charges, assigned
//! rates, report totals) is held as integer cents. Input JSON carries
//! floating-point dollars; they are rounded to the nearest cent exactly
//! once, at the boundary, by [`Cents::from_dollars`]. Summing and
//! formatting never touch floats again.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A monetary amount in cents (1 USD = `Cents(100)`).
///
/// Construct with [`Cents::new`] or [`Cents::from_dollars`]; there is no
/// `From<i64>`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub const fn new(raw: i64) -> Self {
        Cents(raw)
    }

    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Round a dollar amount to the nearest cent.
    ///
    /// Returns `None` for NaN, infinities, and values outside the `i64`
    /// cent range.
    pub fn from_dollars(dollars: f64) -> Option<Self> {
        if !dollars.is_finite() {
            return None;
        }
        let cents = (dollars * 100.0).round();
        if cents < i64::MIN as f64 || cents > i64::MAX as f64 {
            return None;
        }
        Some(Cents(cents as i64))
    }

    /// Dollar value for storage columns that hold `REAL`.
    pub fn to_dollars(self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn checked_add(self, rhs: Cents) -> Option<Cents> {
        self.0.checked_add(rhs.0).map(Cents)
    }

    /// Sum that reports overflow as `None` instead of wrapping or panicking.
    /// There are no `Add`/`Sum` impls; totals go through here.
    pub fn checked_sum<I: IntoIterator<Item = Cents>>(amounts: I) -> Option<Cents> {
        amounts
            .into_iter()
            .try_fold(Cents::ZERO, |acc, c| acc.checked_add(c))
    }

    /// Plain decimal rendering: `1234.50`, `-0.05`.
    pub fn to_plain_string(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        format!("{sign}{}.{:02}", abs / 100, abs % 100)
    }

    /// Currency rendering with thousands separators: `$1,234.50`, `-$5.00`.
    pub fn to_currency_string(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let whole = (abs / 100).to_string();

        let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
        for (i, ch) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        format!("{sign}${grouped}.{:02}", abs % 100)
    }
}

impl fmt::Display for Cents {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_currency_string())
    }
}
