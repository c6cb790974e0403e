use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AmountError {
    #[error("Amount error: {0}")]
    InvalidFormat(String),
    #[error("Amount error: [{0}] must be positive")]
    NotPositive(Decimal)
}
