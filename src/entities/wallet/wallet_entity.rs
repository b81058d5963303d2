use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use surrealdb::sql::{to_value, Thing, Value};

use crate::database::client::Db;
use crate::entities::reward::reward_entity::{THROW_REWARD_ALREADY_CREDITED, THROW_REWARD_NOT_FOUND};
use crate::entities::task::task_pool_entity::{
    THROW_ALREADY_SUBMITTED, THROW_POOL_CLOSED, THROW_SUBMISSION_NOT_FOUND,
};
use crate::entities::wallet::balance_transaction_entity::THROW_TX_NOT_FOUND;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, AppResult, CtxResult};
use crate::middleware::utils::db_utils::{
    get_entity, record_exists, with_not_found_err, IdentIdName, QryBindingsVal,
};

pub const TABLE_NAME: &str = "wallet";
pub const USER_TABLE: &str = "local_user";

pub const THROW_BALANCE_TOO_LOW: &str = "Not enough balance";

/// Maps `THROW`n statement errors inside a transaction query back to
/// typed errors. Statements cancelled by an earlier throw are ignored
/// once a known error is found.
pub fn check_custom_query_error(query_response: &mut surrealdb::Response) -> AppResult<()> {
    let errors = query_response.take_errors();
    if errors.is_empty() {
        return Ok(());
    }
    let mut fallback: Option<AppError> = None;
    for error in errors.values() {
        let msg = error.to_string();
        if msg.contains(THROW_BALANCE_TOO_LOW) {
            return Err(AppError::BalanceTooLow);
        }
        if msg.contains(THROW_POOL_CLOSED) {
            return Err(AppError::TaskPoolClosed);
        }
        if msg.contains(THROW_ALREADY_SUBMITTED) {
            return Err(AppError::AlreadySubmitted);
        }
        if msg.contains(THROW_SUBMISSION_NOT_FOUND) {
            return Err(AppError::SubmissionNotFound);
        }
        if msg.contains(THROW_REWARD_ALREADY_CREDITED) {
            return Err(AppError::RewardAlreadyCredited);
        }
        if msg.contains(THROW_REWARD_NOT_FOUND) || msg.contains(THROW_TX_NOT_FOUND) {
            return Err(AppError::EntityFailIdNotFound { ident: msg });
        }
        if !(msg.contains("not executed") || msg.contains("cancelled")) {
            fallback = Some(AppError::SurrealDb { source: msg });
        }
    }
    Err(fallback.unwrap_or(AppError::SurrealDb {
        source: "query transaction cancelled".to_string(),
    }))
}

#[derive(Display, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CurrencySymbol {
    NGN,
    USD,
}

/// Per-user custodial balance. Amounts are integers in minor currency
/// units (kobo for NGN).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub user: Thing,
    pub balance: i64,
    pub currency: CurrencySymbol,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_transaction_date: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_updated: Option<String>,
}

#[derive(Serialize, Deserialize, Debug)]
pub struct WalletBalanceView {
    pub id: Thing,
    pub balance: i64,
    pub currency: CurrencySymbol,
}

pub struct WalletDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

impl<'a> WalletDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let curr_ngn = CurrencySymbol::NGN;
        let curr_usd = CurrencySymbol::USD;
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS user ON TABLE {TABLE_NAME} TYPE record<{USER_TABLE}>;
    DEFINE INDEX IF NOT EXISTS user_idx ON TABLE {TABLE_NAME} COLUMNS user UNIQUE;
    DEFINE FIELD IF NOT EXISTS balance ON TABLE {TABLE_NAME} TYPE number DEFAULT 0 ASSERT {{
    IF $value >= 0 {{
        RETURN true
    }} ELSE {{
        THROW \"{THROW_BALANCE_TOO_LOW}\"
    }} }};
    DEFINE FIELD IF NOT EXISTS currency ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{curr_ngn}','{curr_usd}'];
    DEFINE FIELD IF NOT EXISTS last_transaction_date ON TABLE {TABLE_NAME} TYPE option<datetime>;
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    DEFINE FIELD IF NOT EXISTS r_updated ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE time::now();
    ");
        let mutation = self.db.query(sql).await?;

        mutation.check().expect("should mutate wallet");

        Ok(())
    }

    pub fn get_user_wallet_id(user_id: &Thing) -> Thing {
        Thing::from((TABLE_NAME, user_id.id.clone()))
    }

    pub fn is_wallet_id(ctx: &Ctx, wallet_id: &Thing) -> CtxResult<()> {
        if wallet_id.tb != TABLE_NAME {
            return Err(ctx.to_ctx_error(AppError::Generic {
                description: "wrong tb in wallet_id".to_string(),
            }));
        }
        Ok(())
    }

    /// Exactly one wallet per user. The pre-check catches the common case;
    /// racing creates lose on the record id itself and are mapped to the
    /// same error.
    pub async fn create_wallet(&self, user_id: &Thing) -> CtxResult<Wallet> {
        let wallet_id = Self::get_user_wallet_id(user_id);
        if record_exists(self.db, &wallet_id).await.is_ok() {
            return Err(self.ctx.to_ctx_error(AppError::WalletAlreadyExists));
        }
        self.db
            .create((TABLE_NAME, wallet_id.id.to_raw()))
            .content(Wallet {
                id: None,
                user: user_id.clone(),
                balance: 0,
                currency: CurrencySymbol::NGN,
                last_transaction_date: None,
                r_created: None,
                r_updated: None,
            })
            .await
            .map_err(|e| {
                if e.to_string().contains("already exists") {
                    self.ctx.to_ctx_error(AppError::WalletAlreadyExists)
                } else {
                    self.ctx.to_ctx_error(e.into())
                }
            })
            .map(|v: Option<Wallet>| v.expect("created wallet"))
    }

    /// Wallets are created lazily on the first money-touching action.
    pub async fn get_or_create(&self, user_id: &Thing) -> CtxResult<Wallet> {
        let wallet_id = Self::get_user_wallet_id(user_id);
        if record_exists(self.db, &wallet_id).await.is_ok() {
            return self.get(IdentIdName::Id(wallet_id)).await;
        }
        self.create_wallet(user_id).await
    }

    pub async fn get_user_balance(&self, user_id: &Thing) -> CtxResult<WalletBalanceView> {
        let wallet_id = Self::get_user_wallet_id(user_id);
        Self::is_wallet_id(self.ctx, &wallet_id)?;
        if record_exists(self.db, &wallet_id).await.is_ok() {
            let wallet = self.get(IdentIdName::Id(wallet_id)).await?;
            Ok(WalletBalanceView {
                id: wallet.id.expect("saved wallet has id"),
                balance: wallet.balance,
                currency: wallet.currency,
            })
        } else {
            Ok(WalletBalanceView {
                id: wallet_id,
                balance: 0,
                currency: CurrencySymbol::NGN,
            })
        }
    }

    /// Atomic balance decrement. The balance check and the update are a
    /// single storage statement; the field assert aborts the enclosing
    /// transaction when the result would go negative.
    pub async fn debit(&self, user_id: &Thing, amount: i64) -> CtxResult<()> {
        let wallet_id = Self::get_user_wallet_id(user_id);
        let qry = Self::get_debit_qry(&wallet_id, amount, false)?;
        let mut res = qry.into_query(self.db).await?;
        check_custom_query_error(&mut res).map_err(|e| self.ctx.to_ctx_error(e))?;
        Ok(())
    }

    /// Atomic balance increment; creates the wallet on first credit.
    pub async fn credit(&self, user_id: &Thing, amount: i64) -> CtxResult<()> {
        let wallet_id = Self::get_user_wallet_id(user_id);
        let qry = Self::get_credit_qry(&wallet_id, user_id, amount, false)?;
        let mut res = qry.into_query(self.db).await?;
        check_custom_query_error(&mut res).map_err(|e| self.ctx.to_ctx_error(e))?;
        Ok(())
    }

    pub(crate) fn get_debit_qry(
        wallet_id: &Thing,
        amount: i64,
        exclude_sql_transaction: bool,
    ) -> AppResult<QryBindingsVal<Value>> {
        if amount <= 0 {
            return Err(AppError::Validation {
                description: "amount must be positive".to_string(),
            });
        }
        let (begin_tx, commit_tx) = if exclude_sql_transaction {
            ("", "")
        } else {
            ("BEGIN TRANSACTION;", "COMMIT TRANSACTION;")
        };
        let qry = format!(
            "{begin_tx}
            LET $w_debit = UPDATE $w_debit_id SET balance -= type::number($debit_amt), last_transaction_date = time::now();
            IF array::len($w_debit) == 0 {{
                THROW \"{THROW_BALANCE_TOO_LOW}\";
            }};
        {commit_tx}
        "
        );
        let mut bindings = HashMap::new();
        bindings.insert("w_debit_id".to_string(), to_db_value(wallet_id.clone())?);
        bindings.insert("debit_amt".to_string(), to_db_value(amount)?);
        Ok(QryBindingsVal::new(qry, bindings))
    }

    pub(crate) fn get_credit_qry(
        wallet_id: &Thing,
        user_id: &Thing,
        amount: i64,
        exclude_sql_transaction: bool,
    ) -> AppResult<QryBindingsVal<Value>> {
        if amount <= 0 {
            return Err(AppError::Validation {
                description: "amount must be positive".to_string(),
            });
        }
        let (begin_tx, commit_tx) = if exclude_sql_transaction {
            ("", "")
        } else {
            ("BEGIN TRANSACTION;", "COMMIT TRANSACTION;")
        };
        let curr_ngn = CurrencySymbol::NGN;
        let qry = format!(
            "{begin_tx}
            LET $w_credit = UPDATE $w_credit_id SET balance += type::number($credit_amt), last_transaction_date = time::now();
            IF array::len($w_credit) == 0 {{
                CREATE $w_credit_id CONTENT {{
                    user: $credit_user,
                    balance: type::number($credit_amt),
                    currency: '{curr_ngn}',
                    last_transaction_date: time::now(),
                }};
            }};
        {commit_tx}
        "
        );
        let mut bindings = HashMap::new();
        bindings.insert("w_credit_id".to_string(), to_db_value(wallet_id.clone())?);
        bindings.insert("credit_user".to_string(), to_db_value(user_id.clone())?);
        bindings.insert("credit_amt".to_string(), to_db_value(amount)?);
        Ok(QryBindingsVal::new(qry, bindings))
    }

    pub async fn get(&self, ident: IdentIdName) -> CtxResult<Wallet> {
        let opt = get_entity::<Wallet>(&self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, ident.to_string().as_str())
    }
}

pub(crate) fn to_db_value<T: Serialize + 'static>(val: T) -> AppResult<Value> {
    to_value(val).map_err(|e| AppError::SurrealDb {
        source: e.to_string(),
    })
}
