pub mod models;
pub mod ledger;


pub use models::*;
pub use ledger::HoldingLedger;
