pub mod ledger_store;
pub mod memory_store;
pub mod operation_engine;
pub mod pg_store;

pub use ledger_store::{LedgerStore, LedgerTransaction};
pub use memory_store::MemoryLedgerStore;
pub use operation_engine::{OperationEngine, OperationRequest};
pub use pg_store::PgLedgerStore;
