pub mod balance_transaction_entity;
pub mod wallet_entity;
