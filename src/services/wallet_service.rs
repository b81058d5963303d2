use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::database::client::Db;
use crate::entities::wallet::balance_transaction_entity::{
    generate_reference, BalanceTransaction, BalanceTransactionDbService, TransactionMetadata,
    TransactionStatus, TransactionType,
};
use crate::entities::wallet::wallet_entity::{CurrencySymbol, WalletBalanceView, WalletDbService};
use crate::interfaces::payment_gateway::{
    Bank, BankAccount, GatewayPaymentStatus, GatewayTransferStatus, InitializedTransaction,
    PaymentGatewayInterface,
};
use crate::middleware::auth_data::Caller;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxResult};
use crate::middleware::mw_ctx::{AppEvent, AppEventType};
use crate::middleware::utils::db_utils::Pagination;

#[derive(Debug, Serialize, Deserialize)]
pub struct TxHistoryView {
    pub items: Vec<BalanceTransaction>,
    pub total: i64,
    pub pages: i64,
}

#[derive(Debug, Serialize)]
pub struct StartedDeposit {
    pub transaction: BalanceTransaction,
    pub checkout: InitializedTransaction,
}

/// Deposit and withdrawal flows against the payment provider, plus wallet
/// reads. Local journal entries are only written after the provider has
/// acknowledged the operation, and the wallet balance only moves when a
/// pending entry settles.
pub struct WalletService<'a, G: PaymentGatewayInterface> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
    pub gateway: &'a G,
    pub event_sender: &'a broadcast::Sender<AppEvent>,
}

impl<'a, G: PaymentGatewayInterface> WalletService<'a, G> {
    fn wallet_db(&self) -> WalletDbService {
        WalletDbService {
            db: self.db,
            ctx: self.ctx,
        }
    }

    fn tx_db(&self) -> BalanceTransactionDbService {
        BalanceTransactionDbService {
            db: self.db,
            ctx: self.ctx,
        }
    }

    pub async fn balance(&self, caller: &Caller) -> CtxResult<WalletBalanceView> {
        self.wallet_db().get_user_balance(&caller.id).await
    }

    /// Opens a hosted checkout with the provider and records a pending
    /// deposit under a fresh reference. A provider error leaves no local
    /// record behind.
    pub async fn deposit_start(
        &self,
        caller: &Caller,
        email: &str,
        amount: i64,
    ) -> CtxResult<StartedDeposit> {
        if amount <= 0 {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "amount must be positive".to_string(),
            }));
        }
        let reference = generate_reference();
        let checkout = self
            .gateway
            .initialize_transaction(email, amount, &reference)
            .await
            .map_err(|e| self.ctx.to_ctx_error(e))?;

        let transaction = self
            .tx_db()
            .create_tx(
                &caller.id,
                TransactionType::Deposit,
                amount,
                CurrencySymbol::NGN.to_string(),
                Some(checkout.reference.clone()),
                None,
            )
            .await?;
        info!("deposit started ref={}", transaction.reference);
        Ok(StartedDeposit {
            transaction,
            checkout,
        })
    }

    /// Confirms a deposit with the provider and settles the journal entry.
    /// Safe to call repeatedly for the same reference.
    pub async fn deposit_verify(&self, reference: &str) -> CtxResult<BalanceTransaction> {
        let tx = self.tx_db().get_by_reference(reference).await?;
        if tx.status != TransactionStatus::Pending {
            return Ok(tx);
        }
        let status = self
            .gateway
            .verify_transaction(reference)
            .await
            .map_err(|e| self.ctx.to_ctx_error(e))?;
        match status {
            GatewayPaymentStatus::Success => {
                let settled = self
                    .tx_db()
                    .settle(reference, TransactionStatus::Completed)
                    .await?;
                self.emit_balance_updated(&settled.user.to_raw());
                Ok(settled)
            }
            GatewayPaymentStatus::Failed | GatewayPaymentStatus::Abandoned => {
                self.tx_db().settle(reference, TransactionStatus::Failed).await
            }
            GatewayPaymentStatus::Pending => Ok(tx),
        }
    }

    /// Registers the bank account with the provider, starts the transfer
    /// and records a pending withdrawal. The balance check here is
    /// advisory; the debit itself happens at settlement and re-checks.
    pub async fn withdraw_start(
        &self,
        caller: &Caller,
        amount: i64,
        account: &BankAccount,
        reason: &str,
    ) -> CtxResult<BalanceTransaction> {
        if amount <= 0 {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "amount must be positive".to_string(),
            }));
        }
        let balance = self.wallet_db().get_user_balance(&caller.id).await?;
        if balance.balance < amount {
            return Err(self.ctx.to_ctx_error(AppError::BalanceTooLow));
        }

        let recipient_code = self
            .gateway
            .create_transfer_recipient(account)
            .await
            .map_err(|e| self.ctx.to_ctx_error(e))?;
        let transfer = self
            .gateway
            .initiate_transfer(amount, &recipient_code, reason)
            .await
            .map_err(|e| self.ctx.to_ctx_error(e))?;

        let metadata = TransactionMetadata {
            bank_code: Some(account.bank_code.clone()),
            account_number: Some(account.account_number.clone()),
            account_name: Some(account.account_name.clone()),
            recipient_code: Some(recipient_code),
        };
        let tx = self
            .tx_db()
            .create_tx(
                &caller.id,
                TransactionType::Withdrawal,
                amount,
                CurrencySymbol::NGN.to_string(),
                Some(transfer.reference.clone()),
                Some(metadata),
            )
            .await?;
        info!("withdrawal started ref={}", tx.reference);

        match transfer.status {
            GatewayTransferStatus::Success => {
                let settled = self
                    .tx_db()
                    .settle(&tx.reference, TransactionStatus::Completed)
                    .await?;
                self.emit_balance_updated(&settled.user.to_raw());
                Ok(settled)
            }
            GatewayTransferStatus::Failed => {
                self.tx_db().settle(&tx.reference, TransactionStatus::Failed).await
            }
            GatewayTransferStatus::Pending => Ok(tx),
        }
    }

    /// Confirms a withdrawal transfer with the provider and settles it.
    pub async fn withdraw_verify(&self, reference: &str) -> CtxResult<BalanceTransaction> {
        let tx = self.tx_db().get_by_reference(reference).await?;
        if tx.status != TransactionStatus::Pending {
            return Ok(tx);
        }
        let status = self
            .gateway
            .verify_transfer(reference)
            .await
            .map_err(|e| self.ctx.to_ctx_error(e))?;
        match status {
            GatewayTransferStatus::Success => {
                let settled = self
                    .tx_db()
                    .settle(reference, TransactionStatus::Completed)
                    .await?;
                self.emit_balance_updated(&settled.user.to_raw());
                Ok(settled)
            }
            GatewayTransferStatus::Failed => {
                self.tx_db().settle(reference, TransactionStatus::Failed).await
            }
            GatewayTransferStatus::Pending => Ok(tx),
        }
    }

    pub async fn history(
        &self,
        caller: &Caller,
        tx_type: Option<TransactionType>,
        pagination: Option<Pagination>,
    ) -> CtxResult<TxHistoryView> {
        let count = pagination.as_ref().map(|p| p.count).unwrap_or(20) as i64;
        let (items, total) = self
            .tx_db()
            .user_history(&caller.id, tx_type, pagination)
            .await?;
        let pages = if count > 0 { (total + count - 1) / count } else { 1 };
        Ok(TxHistoryView {
            items,
            total,
            pages,
        })
    }

    pub async fn banks(&self) -> CtxResult<Vec<Bank>> {
        self.gateway
            .list_banks()
            .await
            .map_err(|e| self.ctx.to_ctx_error(e))
    }

    fn emit_balance_updated(&self, user_id: &str) {
        let _ = self.event_sender.send(AppEvent {
            user_id: user_id.to_string(),
            event: AppEventType::BalanceUpdated,
        });
    }
}
