use crate::models::errors::GatewayError;
use crate::types::{generate_api_key, generate_id, AccountId, Amount, ApiKey, InvoiceId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// A merchant account and its running balance.
///
/// Besides the balance the account keeps the record of every invoice that has been
/// credited to it. That record is what makes settlement idempotent: the same invoice can
/// be offered any number of times and is only ever counted once.
#[derive(Debug, Clone)]
pub struct Account {
    /// Unique identifier of the account.
    pub id: AccountId,
    pub name: String,
    pub email: String,
    /// Secret used by merchants to authenticate, unique across accounts.
    pub api_key: ApiKey,
    /// Sum of every settled invoice plus any direct balance adjustment.
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Amount credited per invoice id.
    settlements: HashMap<InvoiceId, Amount>
}

impl Account {
    /// Creates an empty account with a generated id and API key.
    pub fn new(name: &str, email: &str) -> Self {
        let now = Utc::now();

        Self {
            id: generate_id(),
            name: name.to_string(),
            email: email.to_string(),
            api_key: generate_api_key(),
            balance: Decimal::ZERO,
            created_at: now,
            updated_at: now,
            settlements: HashMap::new()
        }
    }

    /// Adds `amount` to the balance. A negative amount is applied as is.
    ///
    /// # Errors
    /// `BalanceOverflow` if the result does not fit; the balance is unchanged then.
    pub fn add_balance(&mut self, amount: Decimal) -> Result<(), GatewayError> {
        self.balance = self.balance.checked_add(amount)
            .ok_or_else(|| GatewayError::balance_overflow(&self.id))?;
        self.updated_at = Utc::now();

        Ok(())
    }

    /// Credits the amount of `invoice_id` exactly once.
    ///
    /// # Errors
    /// Returns `DuplicateSettlement` if the invoice was already credited and
    /// `BalanceOverflow` if the credit does not fit. The account is left untouched in
    /// both cases.
    pub fn settle(&mut self, invoice_id: &str, amount: Amount) -> Result<(), GatewayError> {
        if self.settlements.contains_key(invoice_id) {
            return Err(GatewayError::duplicate_settlement(&self.id, invoice_id))
        }

        self.add_balance(amount.value())?;
        self.settlements.insert(invoice_id.to_string(), amount);

        Ok(())
    }

    /// Removes a previous settlement of `invoice_id` and takes its amount back out of
    /// the balance. Returns the amount that was reverted, if any.
    pub fn unsettle(&mut self, invoice_id: &str) -> Result<Option<Amount>, GatewayError> {
        let Some(amount) = self.settlements.get(invoice_id).copied() else {
            return Ok(None)
        };

        self.add_balance(-amount.value())?;
        self.settlements.remove(invoice_id);

        Ok(Some(amount))
    }

    pub fn is_settled(&self, invoice_id: &str) -> bool {
        self.settlements.contains_key(invoice_id)
    }
}
