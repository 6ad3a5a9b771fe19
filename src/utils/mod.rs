pub mod money_serde;
