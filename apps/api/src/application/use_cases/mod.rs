pub mod ledger;
pub mod payments;
pub mod reconciliation;
