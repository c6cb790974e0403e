use crate::models::{Account, GatewayError};
use crate::storage::{AccountMutation, AccountRepository};
use crate::types::{AccountId, ApiKey};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory account repository.
///
/// Each account lives in its own [`DashMap`] entry; holding the entry's write guard is
/// the row lock that serializes balance updates.
#[derive(Default)]
pub struct AccountStorage {
    accounts: DashMap<AccountId, Account>,
    api_keys: DashMap<ApiKey, AccountId>
}

impl AccountStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepository for AccountStorage {
    fn save(&self, account: Account) -> Result<(), GatewayError> {
        match self.api_keys.entry(account.api_key.clone()) {
            Entry::Occupied(_) => Err(GatewayError::AccountDuplicateKey),
            Entry::Vacant(entry) => {
                entry.insert(account.id.clone());
                self.accounts.insert(account.id.clone(), account);
                Ok(())
            }
        }
    }

    fn find_by_api_key(&self, api_key: &str) -> Option<Account> {
        let account_id = self.api_keys.get(api_key)?.value().clone();
        self.find_by_id(&account_id)
    }

    fn find_by_id(&self, account_id: &str) -> Option<Account> {
        self.accounts.get(account_id).map(|account| account.value().clone())
    }

    fn update(&self, account_id: &str, mutation: AccountMutation<'_>) -> Result<Account, GatewayError> {
        let mut account = self.accounts.get_mut(account_id)
            .ok_or_else(|| GatewayError::account_not_found(account_id))?;

        mutation(account.value_mut())?;

        Ok(account.value().clone())
    }
}
