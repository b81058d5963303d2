use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::interfaces::payment_gateway::{
    Bank, BankAccount, GatewayPaymentStatus, GatewayTransferStatus, InitializedTransaction,
    InitiatedTransfer, PaymentGatewayInterface,
};
use crate::middleware::error::{AppError, AppResult};

/// Paystack REST client. Every endpoint wraps its payload in the same
/// `{ status, message, data }` envelope.
#[derive(Clone, Debug)]
pub struct PaystackClient {
    http: Client,
    secret_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct PaystackResponse<T> {
    status: bool,
    message: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct TransactionStatusData {
    status: String,
}

#[derive(Debug, Deserialize)]
struct RecipientData {
    recipient_code: String,
}

#[derive(Debug, Deserialize)]
struct TransferData {
    reference: String,
    transfer_code: String,
    status: String,
}

#[derive(Debug, Serialize)]
struct InitializeBody<'a> {
    email: &'a str,
    amount: i64,
    reference: &'a str,
}

#[derive(Debug, Serialize)]
struct RecipientBody<'a> {
    r#type: &'a str,
    name: &'a str,
    account_number: &'a str,
    bank_code: &'a str,
    currency: &'a str,
}

#[derive(Debug, Serialize)]
struct TransferBody<'a> {
    source: &'a str,
    amount: i64,
    recipient: &'a str,
    reason: &'a str,
}

impl PaystackClient {
    pub fn new(secret_key: String, base_url: String) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("reqwest client");
        PaystackClient {
            http,
            secret_key,
            base_url,
        }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("paystack POST {url}");
        let res = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .json(body)
            .send()
            .await?;
        Self::unwrap_envelope(res.json::<PaystackResponse<T>>().await?)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("paystack GET {url}");
        let res = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await?;
        Self::unwrap_envelope(res.json::<PaystackResponse<T>>().await?)
    }

    fn unwrap_envelope<T>(envelope: PaystackResponse<T>) -> AppResult<T> {
        if !envelope.status {
            return Err(AppError::Gateway {
                source: envelope.message,
            });
        }
        envelope.data.ok_or(AppError::Gateway {
            source: "empty data in provider response".to_string(),
        })
    }

    fn payment_status(raw: &str) -> GatewayPaymentStatus {
        match raw {
            "success" => GatewayPaymentStatus::Success,
            "failed" | "reversed" => GatewayPaymentStatus::Failed,
            "abandoned" => GatewayPaymentStatus::Abandoned,
            _ => GatewayPaymentStatus::Pending,
        }
    }

    fn transfer_status(raw: &str) -> GatewayTransferStatus {
        match raw {
            "success" => GatewayTransferStatus::Success,
            "failed" | "reversed" => GatewayTransferStatus::Failed,
            _ => GatewayTransferStatus::Pending,
        }
    }
}

#[async_trait]
impl PaymentGatewayInterface for PaystackClient {
    async fn initialize_transaction(
        &self,
        email: &str,
        amount: i64,
        reference: &str,
    ) -> AppResult<InitializedTransaction> {
        self.post(
            "/transaction/initialize",
            &InitializeBody {
                email,
                amount,
                reference,
            },
        )
        .await
    }

    async fn verify_transaction(&self, reference: &str) -> AppResult<GatewayPaymentStatus> {
        let data: TransactionStatusData =
            self.get(&format!("/transaction/verify/{reference}")).await?;
        Ok(Self::payment_status(&data.status))
    }

    async fn create_transfer_recipient(&self, account: &BankAccount) -> AppResult<String> {
        let data: RecipientData = self
            .post(
                "/transferrecipient",
                &RecipientBody {
                    r#type: "nuban",
                    name: &account.account_name,
                    account_number: &account.account_number,
                    bank_code: &account.bank_code,
                    currency: "NGN",
                },
            )
            .await?;
        Ok(data.recipient_code)
    }

    async fn initiate_transfer(
        &self,
        amount: i64,
        recipient_code: &str,
        reason: &str,
    ) -> AppResult<InitiatedTransfer> {
        let data: TransferData = self
            .post(
                "/transfer",
                &TransferBody {
                    source: "balance",
                    amount,
                    recipient: recipient_code,
                    reason,
                },
            )
            .await?;
        Ok(InitiatedTransfer {
            reference: data.reference,
            transfer_code: data.transfer_code,
            status: Self::transfer_status(&data.status),
        })
    }

    async fn verify_transfer(&self, reference: &str) -> AppResult<GatewayTransferStatus> {
        let data: TransactionStatusData =
            self.get(&format!("/transfer/verify/{reference}")).await?;
        Ok(Self::transfer_status(&data.status))
    }

    async fn list_banks(&self) -> AppResult<Vec<Bank>> {
        self.get("/bank?currency=NGN").await
    }
}
