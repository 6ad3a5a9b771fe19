pub mod wallets;

pub use wallets::{
    apply_operation,
    create_wallet,
    get_wallet,
    list_wallets,
};
