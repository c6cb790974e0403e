mod account_ledger;

pub use account_ledger::Ledger;
