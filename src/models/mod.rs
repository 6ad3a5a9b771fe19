//! Domain types: wallet and operation records, ID aliases, fixed-point money.

pub mod ids;
pub mod money;
pub mod wallet;

pub use ids::{OperationId, WalletId};
pub use money::{Amount, AmountError};
pub use wallet::{Operation, OperationType, Wallet};
