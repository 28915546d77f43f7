pub mod ledger;
pub mod summary;

pub use ledger::*;
pub use summary::*;
