// orderflow/src/models/money.rs

use crate::error::{AppError, Result};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currencies the payment providers are configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
  Usd,
  Eur,
  Gbp,
  Inr,
  Jpy,
}

impl Currency {
  /// Number of decimal places in the currency's minor unit.
  pub fn exponent(self) -> u32 {
    match self {
      Currency::Jpy => 0,
      Currency::Usd | Currency::Eur | Currency::Gbp | Currency::Inr => 2,
    }
  }

  pub fn code(self) -> &'static str {
    match self {
      Currency::Usd => "USD",
      Currency::Eur => "EUR",
      Currency::Gbp => "GBP",
      Currency::Inr => "INR",
      Currency::Jpy => "JPY",
    }
  }

  /// Lower-case code, as Stripe expects it.
  pub fn lower_code(self) -> String {
    self.code().to_ascii_lowercase()
  }

  /// Converts a major-unit amount to integer minor units, rounding half away
  /// from zero.
  pub fn to_minor_units(self, amount: Decimal) -> Result<i64> {
    amount
      .checked_mul(Decimal::from(10_i64.pow(self.exponent())))
      .and_then(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_i64())
      .ok_or_else(|| AppError::Validation(format!("Amount {} is out of range for {}", amount, self)))
  }

  /// Rounds a major-unit amount to the currency's precision.
  pub fn round_major(self, amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(self.exponent(), RoundingStrategy::MidpointAwayFromZero)
  }
}

impl fmt::Display for Currency {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.code())
  }
}

impl FromStr for Currency {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "USD" => Ok(Currency::Usd),
      "EUR" => Ok(Currency::Eur),
      "GBP" => Ok(Currency::Gbp),
      "INR" => Ok(Currency::Inr),
      "JPY" => Ok(Currency::Jpy),
      other => Err(AppError::Config(format!("Unsupported currency '{}'", other))),
    }
  }
}
