/*
 * Copyright 2025 Paul Moore Parks and contributors
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! Currency-tagged minor-unit integer money. The kernel never scales,
//! rounds, or formats an amount - it records exactly what the host passes
//! in and refuses to guess when currencies disagree.

use crate::error::{KernelError, KernelResult};

/// A 3-letter ASCII currency code, normalized to uppercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurrencyCode([u8; 3]);

impl CurrencyCode {
    pub fn parse(code: &str) -> KernelResult<Self> {
        if !is_valid_currency(code) {
            return Err(KernelError::ValidationFailed(format!(
                "currency code must be exactly 3 ASCII letters, got {code:?}"
            )));
        }
        let upper = code.to_ascii_uppercase();
        let bytes = upper.as_bytes();
        Ok(Self([bytes[0], bytes[1], bytes[2]]))
    }

    pub fn as_str(&self) -> &str {
        // SAFETY: constructed only from validated ASCII letters.
        std::str::from_utf8(&self.0).expect("currency code is always ASCII")
    }
}

impl std::fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exactly 3 ASCII letters, case-insensitive.
pub fn is_valid_currency(code: &str) -> bool {
    code.len() == 3 && code.bytes().all(|b| b.is_ascii_alphabetic())
}

const STANDARD_CURRENCIES: &[&str] = &["USD", "EUR", "JPY", "GBP", "CAD", "AUD"];

/// Membership in the fixed "standard" table, not an exhaustive ISO list.
pub fn is_standard_currency(code: &str) -> bool {
    if !is_valid_currency(code) {
        return false;
    }
    let upper = code.to_ascii_uppercase();
    STANDARD_CURRENCIES.contains(&upper.as_str())
}

/// Recommended minor-unit scale for well-known codes; unknown codes
/// default to 2. The kernel never infers this on its own - hosts that
/// care about a precise scale should pass it along at `begin_transaction`
/// time rather than rely solely on this table.
pub fn decimal_places_for(code: &str) -> u8 {
    match code.to_ascii_uppercase().as_str() {
        "JPY" => 0,
        "BHD" | "KWD" => 3,
        _ => 2,
    }
}

/// A currency-tagged integer amount in minor units (cents, fils, etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Money {
    pub minor_units: i64,
    pub currency: CurrencyCode,
}

impl Money {
    pub fn zero(currency: CurrencyCode) -> Self {
        Self { minor_units: 0, currency }
    }

    pub fn new(minor_units: i64, currency: CurrencyCode) -> Self {
        Self { minor_units, currency }
    }

    fn require_same_currency(&self, other: &Money) -> KernelResult<()> {
        if self.currency != other.currency {
            return Err(KernelError::CurrencyMismatch);
        }
        Ok(())
    }

    pub fn add(&self, other: &Money) -> KernelResult<Money> {
        self.require_same_currency(other)?;
        let minor_units = self
            .minor_units
            .checked_add(other.minor_units)
            .ok_or(KernelError::Overflow)?;
        Ok(Money { minor_units, currency: self.currency })
    }

    pub fn subtract(&self, other: &Money) -> KernelResult<Money> {
        self.require_same_currency(other)?;
        let minor_units = self
            .minor_units
            .checked_sub(other.minor_units)
            .ok_or(KernelError::Overflow)?;
        Ok(Money { minor_units, currency: self.currency })
    }

    pub fn multiply(&self, scalar: i64) -> KernelResult<Money> {
        let minor_units = self.minor_units.checked_mul(scalar).ok_or(KernelError::Overflow)?;
        Ok(Money { minor_units, currency: self.currency })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(minor: i64) -> Money {
        Money::new(minor, CurrencyCode::parse("USD").unwrap())
    }

    fn eur(minor: i64) -> Money {
        Money::new(minor, CurrencyCode::parse("EUR").unwrap())
    }

    #[test]
    fn add_same_currency() {
        assert_eq!(usd(199).add(&usd(99)).unwrap().minor_units, 298);
    }

    #[test]
    fn add_mismatched_currency_fails() {
        assert_eq!(usd(199).add(&eur(99)), Err(KernelError::CurrencyMismatch));
    }

    #[test]
    fn add_is_commutative_and_associative() {
        let (a, b, c) = (usd(101), usd(-50), usd(7));
        assert_eq!(a.add(&b).unwrap().minor_units, b.add(&a).unwrap().minor_units);
        let lhs = a.add(&b).unwrap().add(&c).unwrap();
        let rhs = a.add(&b.add(&c).unwrap()).unwrap();
        assert_eq!(lhs.minor_units, rhs.minor_units);
    }

    #[test]
    fn multiply_overflows_cleanly() {
        let m = Money::new(i64::MAX, CurrencyCode::parse("USD").unwrap());
        assert_eq!(m.multiply(2), Err(KernelError::Overflow));
    }

    #[test]
    fn multiply_is_exact() {
        assert_eq!(usd(199).multiply(3).unwrap().minor_units, 597);
    }

    #[test]
    fn currency_validation() {
        assert!(is_valid_currency("USD"));
        assert!(!is_valid_currency("us"));
        assert!(!is_valid_currency("USDX"));
        assert!(!is_valid_currency("US1"));
    }

    #[test]
    fn standard_currency_membership() {
        assert!(is_standard_currency("usd"));
        assert!(!is_standard_currency("SGD"));
        assert!(!is_standard_currency("US1"));
    }

    #[test]
    fn decimal_places_table() {
        assert_eq!(decimal_places_for("JPY"), 0);
        assert_eq!(decimal_places_for("BHD"), 3);
        assert_eq!(decimal_places_for("KWD"), 3);
        assert_eq!(decimal_places_for("USD"), 2);
        assert_eq!(decimal_places_for("SGD"), 2);
    }

    proptest::proptest! {
        #[test]
        fn prop_add_commutative_associative(a in -1_000_000_000i64..1_000_000_000, b in -1_000_000_000i64..1_000_000_000, c in -1_000_000_000i64..1_000_000_000) {
            let (ma, mb, mc) = (usd(a), usd(b), usd(c));
            let lhs = ma.add(&mb).unwrap().add(&mc).unwrap();
            let rhs = ma.add(&mb.add(&mc).unwrap()).unwrap();
            proptest::prop_assert_eq!(lhs.minor_units, rhs.minor_units);
            proptest::prop_assert_eq!(ma.add(&mb).unwrap().minor_units, mb.add(&ma).unwrap().minor_units);
        }
    }
}
