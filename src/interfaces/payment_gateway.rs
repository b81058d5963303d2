use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::middleware::error::AppResult;

/// Hosted-checkout session returned when a deposit starts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitializedTransaction {
    pub authorization_url: String,
    pub access_code: String,
    pub reference: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GatewayPaymentStatus {
    Success,
    Failed,
    Abandoned,
    Pending,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BankAccount {
    pub bank_code: String,
    pub account_number: String,
    pub account_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitiatedTransfer {
    pub reference: String,
    pub transfer_code: String,
    pub status: GatewayTransferStatus,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum GatewayTransferStatus {
    Success,
    Failed,
    Pending,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Bank {
    pub id: i64,
    pub name: String,
    pub code: String,
    pub active: bool,
}

/// External payment provider seam. Amounts cross this boundary in minor
/// currency units, matching what the provider expects on the wire.
#[async_trait]
pub trait PaymentGatewayInterface: Send + Sync {
    async fn initialize_transaction(
        &self,
        email: &str,
        amount: i64,
        reference: &str,
    ) -> AppResult<InitializedTransaction>;

    async fn verify_transaction(&self, reference: &str) -> AppResult<GatewayPaymentStatus>;

    async fn create_transfer_recipient(&self, account: &BankAccount) -> AppResult<String>;

    async fn initiate_transfer(
        &self,
        amount: i64,
        recipient_code: &str,
        reason: &str,
    ) -> AppResult<InitiatedTransfer>;

    async fn verify_transfer(&self, reference: &str) -> AppResult<GatewayTransferStatus>;

    async fn list_banks(&self) -> AppResult<Vec<Bank>>;
}
