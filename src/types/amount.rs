use crate::types::errors::AmountError;
use crate::types::format_money;
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// A strictly positive currency amount.
///
/// Invoices and review events only ever carry amounts of this type, so a zero or
/// negative charge cannot be represented past the parsing boundary. The precision is
/// kept as given, nothing is rounded. On the wire the amount is a plain JSON number.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, AmountError> {
        if value <= Decimal::ZERO {
            return Err(AmountError::NotPositive(value));
        }

        Ok(Amount(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Display for Amount {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(&format_money(self.0))
    }
}

impl FromStr for Amount {
    type Err = AmountError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();

        if value.is_empty() {
            return Err(AmountError::InvalidFormat("Value is an empty string".to_string()));
        }

        let decimal = Decimal::from_str(value).map_err(|error| {
            AmountError::InvalidFormat(format!("Value [{value}] is not a decimal: {error}"))
        })?;

        Amount::new(decimal)
    }
}

impl Serialize for Amount {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        rust_decimal::serde::float::serialize(&self.0, serializer)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = rust_decimal::serde::float::deserialize(deserializer)?;
        Amount::new(value).map_err(de::Error::custom)
    }
}
