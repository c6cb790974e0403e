use crate::models::{GatewayError, Invoice, InvoiceStatus};
use crate::storage::InvoiceRepository;
use crate::types::InvoiceId;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// In-memory invoice repository backed by a [`DashMap`].
#[derive(Default)]
pub struct InvoiceStorage {
    invoices: DashMap<InvoiceId, Invoice>
}

impl InvoiceStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl InvoiceRepository for InvoiceStorage {
    fn save(&self, invoice: Invoice) -> Result<(), GatewayError> {
        match self.invoices.entry(invoice.id.clone()) {
            Entry::Occupied(entry) => Err(GatewayError::InvoiceAlreadyExists { invoice_id: entry.key().clone() }),
            Entry::Vacant(entry) => {
                entry.insert(invoice);
                Ok(())
            }
        }
    }

    fn find_by_id(&self, invoice_id: &str) -> Option<Invoice> {
        self.invoices.get(invoice_id).map(|invoice| invoice.value().clone())
    }

    fn find_by_account_id(&self, account_id: &str) -> Vec<Invoice> {
        let mut invoices: Vec<Invoice> = self.invoices.iter()
            .filter(|invoice| invoice.account_id == account_id)
            .map(|invoice| invoice.value().clone())
            .collect();

        invoices.sort_by_key(|invoice| invoice.created_at);
        invoices
    }

    fn find_by_status(&self, statuses: &[InvoiceStatus]) -> Vec<Invoice> {
        self.invoices.iter()
            .filter(|invoice| statuses.contains(&invoice.status))
            .map(|invoice| invoice.value().clone())
            .collect()
    }

    fn update_status(&self, invoice_id: &str, status: InvoiceStatus) -> Result<Invoice, GatewayError> {
        let mut invoice = self.invoices.get_mut(invoice_id)
            .ok_or_else(|| GatewayError::invoice_not_found(invoice_id))?;

        invoice.update_status(status)?;

        Ok(invoice.value().clone())
    }
}
