use std::collections::HashMap;

use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use strum::Display;
use surrealdb::sql::Thing;

use crate::database::client::Db;
use crate::entities::wallet::wallet_entity::{
    check_custom_query_error, to_db_value, WalletDbService, TABLE_NAME as WALLET_TABLE,
    USER_TABLE,
};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxError, CtxResult};
use crate::middleware::utils::db_utils::{
    get_entity, get_entity_count, get_entity_list, with_not_found_err, IdentIdName, Pagination,
    QryBindingsVal, QryOrder,
};

pub const TABLE_NAME: &str = "balance_transaction";

pub const THROW_TX_NOT_FOUND: &str = "Transaction not found";

#[derive(Display, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Reward,
    Purchase,
}

#[derive(Display, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Bank routing details attached to withdrawal transactions.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient_code: Option<String>,
}

/// Journal entry for money moving in or out of a wallet. The wallet
/// balance only changes when a pending entry settles as completed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BalanceTransaction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub user: Thing,
    pub wallet: Thing,
    pub r#type: TransactionType,
    pub amount: i64,
    pub currency: String,
    pub status: TransactionStatus,
    pub reference: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TransactionMetadata>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_updated: Option<String>,
}

/// `TRX_<unix millis>_<9 random alphanumerics>` - unique per journal entry.
pub fn generate_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!("TRX_{}_{}", Utc::now().timestamp_millis(), suffix)
}

pub struct BalanceTransactionDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

impl<'a> BalanceTransactionDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let t_deposit = TransactionType::Deposit;
        let t_withdrawal = TransactionType::Withdrawal;
        let t_reward = TransactionType::Reward;
        let t_purchase = TransactionType::Purchase;
        let s_pending = TransactionStatus::Pending;
        let s_completed = TransactionStatus::Completed;
        let s_failed = TransactionStatus::Failed;
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS user ON TABLE {TABLE_NAME} TYPE record<{USER_TABLE}>;
    DEFINE FIELD IF NOT EXISTS wallet ON TABLE {TABLE_NAME} TYPE record<{WALLET_TABLE}>;
    DEFINE FIELD IF NOT EXISTS type ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{t_deposit}','{t_withdrawal}','{t_reward}','{t_purchase}'];
    DEFINE FIELD IF NOT EXISTS amount ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS currency ON TABLE {TABLE_NAME} TYPE string;
    DEFINE FIELD IF NOT EXISTS status ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{s_pending}','{s_completed}','{s_failed}'];
    DEFINE FIELD IF NOT EXISTS reference ON TABLE {TABLE_NAME} TYPE string;
    DEFINE INDEX IF NOT EXISTS reference_idx ON TABLE {TABLE_NAME} COLUMNS reference UNIQUE;
    DEFINE FIELD IF NOT EXISTS metadata ON TABLE {TABLE_NAME} FLEXIBLE TYPE option<object>;
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    DEFINE FIELD IF NOT EXISTS r_updated ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE time::now();
    ");
        let mutation = self.db.query(sql).await?;

        mutation.check().expect("should mutate balance_transaction");

        Ok(())
    }

    /// Records a new pending journal entry. The wallet itself is untouched
    /// until the entry settles. A fresh reference is generated when the
    /// caller has none from the provider.
    pub async fn create_tx(
        &self,
        user_id: &Thing,
        tx_type: TransactionType,
        amount: i64,
        currency: String,
        reference: Option<String>,
        metadata: Option<TransactionMetadata>,
    ) -> CtxResult<BalanceTransaction> {
        if amount <= 0 {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "amount must be positive".to_string(),
            }));
        }
        let reference = reference.unwrap_or_else(generate_reference);
        let wallet = WalletDbService::get_user_wallet_id(user_id);
        self.db
            .create(TABLE_NAME)
            .content(BalanceTransaction {
                id: None,
                user: user_id.clone(),
                wallet,
                r#type: tx_type,
                amount,
                currency,
                status: TransactionStatus::Pending,
                reference,
                metadata,
                r_created: None,
                r_updated: None,
            })
            .await
            .map_err(CtxError::from(self.ctx))
            .map(|v: Option<BalanceTransaction>| v.expect("created balance transaction"))
    }

    pub async fn get_by_reference(&self, reference: &str) -> CtxResult<BalanceTransaction> {
        let ident = IdentIdName::ColumnIdent {
            column: "reference".to_string(),
            val: reference.to_string(),
            rec: false,
        };
        let opt = get_entity::<BalanceTransaction>(self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, reference)
    }

    /// Finalizes a pending entry as completed or failed. Completing a
    /// withdrawal debits the wallet, completing anything else credits it,
    /// and failing is status-only. Settling an already settled entry
    /// returns it unchanged, so gateway callbacks can be replayed.
    pub async fn settle(
        &self,
        reference: &str,
        new_status: TransactionStatus,
    ) -> CtxResult<BalanceTransaction> {
        if new_status == TransactionStatus::Pending {
            return Err(self.ctx.to_ctx_error(AppError::InvalidTransition {
                from: TransactionStatus::Pending.to_string(),
                to: new_status.to_string(),
            }));
        }

        let tx = self.get_by_reference(reference).await?;
        if tx.status != TransactionStatus::Pending {
            return Ok(tx);
        }

        let wallet_qry = if new_status == TransactionStatus::Completed {
            let qry = match tx.r#type {
                TransactionType::Withdrawal => {
                    WalletDbService::get_debit_qry(&tx.wallet, tx.amount, true)
                }
                _ => WalletDbService::get_credit_qry(&tx.wallet, &tx.user, tx.amount, true),
            };
            qry.map_err(|e| self.ctx.to_ctx_error(e))?
        } else {
            QryBindingsVal::new(String::new(), HashMap::new())
        };

        let qry = format!(
            "BEGIN TRANSACTION;
            LET $tx = (SELECT * FROM type::table($_settle_table) WHERE reference = $settle_reference)[0];
            IF $tx == NONE {{
                THROW \"{THROW_TX_NOT_FOUND}\";
            }};
            IF $tx.status == '{}' {{
                UPDATE $tx.id SET status = $settle_status;
                {}
            }};
        COMMIT TRANSACTION;",
            TransactionStatus::Pending,
            wallet_qry.get_query_string(),
        );
        let mut bindings = wallet_qry.get_bindings();
        bindings.insert(
            "_settle_table".to_string(),
            to_db_value(TABLE_NAME.to_string()).map_err(|e| self.ctx.to_ctx_error(e))?,
        );
        bindings.insert(
            "settle_reference".to_string(),
            to_db_value(reference.to_string()).map_err(|e| self.ctx.to_ctx_error(e))?,
        );
        bindings.insert(
            "settle_status".to_string(),
            to_db_value(new_status.to_string()).map_err(|e| self.ctx.to_ctx_error(e))?,
        );

        let query = bindings
            .into_iter()
            .fold(self.db.query(qry), |q, n_val| q.bind(n_val));
        let mut res = query.await?;
        check_custom_query_error(&mut res).map_err(|e| self.ctx.to_ctx_error(e))?;

        self.get_by_reference(reference).await
    }

    pub async fn user_history(
        &self,
        user_id: &Thing,
        tx_type: Option<TransactionType>,
        pagination: Option<Pagination>,
    ) -> CtxResult<(Vec<BalanceTransaction>, i64)> {
        let user_ident = IdentIdName::ColumnIdent {
            column: "user".to_string(),
            val: user_id.to_raw(),
            rec: true,
        };
        let ident = match tx_type {
            None => user_ident,
            Some(t) => IdentIdName::ColumnIdentAnd(vec![
                user_ident,
                IdentIdName::ColumnIdent {
                    column: "type".to_string(),
                    val: t.to_string(),
                    rec: false,
                },
            ]),
        };
        let pagination = pagination.unwrap_or(Pagination {
            order_by: Some("r_created".to_string()),
            order_dir: Some(QryOrder::DESC),
            count: 20,
            start: 0,
        });
        let total = get_entity_count(self.db, TABLE_NAME.to_string(), &ident).await?;
        let items =
            get_entity_list::<BalanceTransaction>(self.db, TABLE_NAME.to_string(), &ident, Some(pagination))
                .await?;
        Ok((items, total))
    }
}
