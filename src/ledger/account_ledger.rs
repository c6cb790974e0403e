use std::sync::Arc;

use moka::future::Cache;
use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::models::{Account, GatewayError};
use crate::storage::AccountRepository;
use crate::types::{AccountId, Amount, ApiKey};

/// The account balance store and the only way to mutate a balance.
///
/// Every mutation goes through [`AccountRepository::update`], which holds the account's
/// row lock for the duration of the change. Synchronous and asynchronous settlement of the
/// same account therefore serialize instead of overwriting each other.
pub struct Ledger {
    accounts: Arc<dyn AccountRepository>,
    api_keys: Cache<ApiKey, AccountId>
}

impl Ledger {
    pub fn new(accounts: Arc<dyn AccountRepository>, api_key_cache_capacity: u64) -> Self {
        Self {
            accounts,
            api_keys: Cache::builder()
                .max_capacity(api_key_cache_capacity)
                .build()
        }
    }

    /// Opens an account with a freshly generated API key.
    pub fn create_account(&self, name: &str, email: &str) -> Result<Account, GatewayError> {
        let account = Account::new(name, email);
        self.accounts.save(account.clone())?;

        debug!("Account [{}] created for [{}]", account.id, account.name);

        Ok(account)
    }

    /// Resolves the account owning `api_key`.
    ///
    /// The key to id mapping is cached. A cached id is always re-read from the repository
    /// and dropped from the cache if it no longer matches.
    pub async fn find_by_api_key(&self, api_key: &str) -> Result<Account, GatewayError> {
        if let Some(account_id) = self.api_keys.get(api_key).await {
            if let Some(account) = self.accounts.find_by_id(&account_id)
                && account.api_key == api_key {
                return Ok(account)
            }

            self.api_keys.invalidate(api_key).await;
        }

        let account = self.accounts.find_by_api_key(api_key)
            .ok_or(GatewayError::InvalidApiKey)?;

        self.api_keys.insert(api_key.to_string(), account.id.clone()).await;

        Ok(account)
    }

    pub fn find_by_id(&self, account_id: &str) -> Result<Account, GatewayError> {
        self.accounts.find_by_id(account_id)
            .ok_or_else(|| GatewayError::account_not_found(account_id))
    }

    /// Adds `amount` to the balance of `account_id` atomically and returns the account.
    pub fn add_balance(&self, account_id: &str, amount: Decimal) -> Result<Account, GatewayError> {
        self.accounts.update(account_id, &mut |account| account.add_balance(amount))
    }

    /// Credits `amount` for `invoice_id` unless the invoice was credited before.
    ///
    /// # Errors
    /// `AccountNotFound` for an unknown account, `DuplicateSettlement` when the invoice has
    /// already been credited. The balance is unchanged on error.
    pub fn settle(&self, account_id: &str, invoice_id: &str, amount: Amount) -> Result<Account, GatewayError> {
        let account = self.accounts.update(account_id, &mut |account| account.settle(invoice_id, amount))?;

        debug!("Invoice [{invoice_id}] settled for account [{account_id}] with [{amount}], balance [{}]", account.balance);

        Ok(account)
    }

    /// Whether `invoice_id` has been credited to `account_id`. Unknown accounts have no
    /// settlements.
    pub fn is_settled(&self, account_id: &str, invoice_id: &str) -> bool {
        self.accounts.find_by_id(account_id)
            .is_some_and(|account| account.is_settled(invoice_id))
    }

    /// Takes back the credit of `invoice_id`. Used to compensate a settlement whose
    /// invoice could not be recorded.
    pub fn reverse(&self, account_id: &str, invoice_id: &str) -> Result<Account, GatewayError> {
        self.accounts.update(account_id, &mut |account| {
            if account.unsettle(invoice_id)?.is_none() {
                warn!("Invoice [{invoice_id}] has no settlement on account [{account_id}] to reverse");
            }
            Ok(())
        })
    }
}
