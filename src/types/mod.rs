mod amount;
mod errors;

use rust_decimal::Decimal;
use uuid::Uuid;

pub use amount::Amount;
pub use errors::AmountError;

pub type AccountId = String;
pub type InvoiceId = String;
pub type ApiKey = String;

/// Generates a fresh identifier for accounts and invoices.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generates a 32 character hexadecimal API key.
pub fn generate_api_key() -> ApiKey {
    Uuid::new_v4().simple().to_string()
}

/// Renders a money value with at least two decimal places. Finer precision is shown as
/// is rather than rounded away.
pub fn format_money(value: Decimal) -> String {
    let mut value = value.normalize();

    if value.scale() < 2 {
        value.rescale(2);
    }

    value.to_string()
}
