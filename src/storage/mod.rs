mod account_storage;
mod invoice_storage;

use crate::models::{Account, GatewayError, Invoice, InvoiceStatus};

pub use account_storage::AccountStorage;
pub use invoice_storage::InvoiceStorage;

/// Mutation applied to a single account while its row is locked.
pub type AccountMutation<'a> = &'a mut dyn FnMut(&mut Account) -> Result<(), GatewayError>;

/// Persistence contract for accounts.
pub trait AccountRepository: Send + Sync + 'static {
    /// Stores a new account. Fails with `AccountDuplicateKey` if the API key is taken.
    fn save(&self, account: Account) -> Result<(), GatewayError>;
    fn find_by_api_key(&self, api_key: &str) -> Option<Account>;
    fn find_by_id(&self, account_id: &str) -> Option<Account>;
    /// Runs `mutation` against the stored account with exclusive access to it, so that
    /// concurrent updates of the same account serialize. Returns the updated account.
    fn update(&self, account_id: &str, mutation: AccountMutation<'_>) -> Result<Account, GatewayError>;
}

/// Persistence contract for invoices.
pub trait InvoiceRepository: Send + Sync + 'static {
    /// Stores a new invoice. Fails with `InvoiceAlreadyExists` on an id clash.
    fn save(&self, invoice: Invoice) -> Result<(), GatewayError>;
    fn find_by_id(&self, invoice_id: &str) -> Option<Invoice>;
    fn find_by_account_id(&self, account_id: &str) -> Vec<Invoice>;
    fn find_by_status(&self, statuses: &[InvoiceStatus]) -> Vec<Invoice>;
    /// Applies [`Invoice::update_status`] atomically against the stored invoice.
    fn update_status(&self, invoice_id: &str, status: InvoiceStatus) -> Result<Invoice, GatewayError>;
}
