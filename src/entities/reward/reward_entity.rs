use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use surrealdb::sql::{Id, Thing, Value};

use crate::database::client::Db;
use crate::entities::task::task_pool_entity::TABLE_NAME as TASK_POOL_TABLE;
use crate::entities::wallet::wallet_entity::{
    check_custom_query_error, to_db_value, WalletDbService, USER_TABLE,
};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxResult};
use crate::middleware::utils::db_utils::{
    get_entity, get_entity_count, get_entity_list, get_list_qry, with_not_found_err, IdentIdName,
    Pagination, QryBindingsVal, QryOrder,
};

pub const TABLE_NAME: &str = "reward";

pub const THROW_REWARD_NOT_FOUND: &str = "Reward not found";
pub const THROW_REWARD_ALREADY_CREDITED: &str = "Reward already credited";

#[derive(Display, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RewardStatus {
    Pending,
    Credited,
}

/// An earned reward waiting to be paid into the earner's wallet. The task
/// title is denormalized so reward listings survive pool deletion.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Reward {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub user: Thing,
    pub task: Thing,
    pub amount: i64,
    pub status: RewardStatus,
    pub task_title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credited_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_updated: Option<String>,
}

pub struct RewardDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

impl<'a> RewardDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let st_pending = RewardStatus::Pending;
        let st_credited = RewardStatus::Credited;
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS user ON TABLE {TABLE_NAME} TYPE record<{USER_TABLE}>;
    DEFINE FIELD IF NOT EXISTS task ON TABLE {TABLE_NAME} TYPE record<{TASK_POOL_TABLE}>;
    DEFINE FIELD IF NOT EXISTS amount ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS status ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{st_pending}','{st_credited}'];
    DEFINE FIELD IF NOT EXISTS task_title ON TABLE {TABLE_NAME} TYPE string;
    DEFINE FIELD IF NOT EXISTS credited_at ON TABLE {TABLE_NAME} TYPE option<datetime>;
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    DEFINE FIELD IF NOT EXISTS r_updated ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE time::now();
    ");
        let mutation = self.db.query(sql).await?;

        mutation.check().expect("should mutate reward");

        Ok(())
    }

    pub fn new_reward_id() -> Thing {
        Thing::from((TABLE_NAME, Id::rand()))
    }

    /// Query fragment that marks one pending reward as credited, throwing
    /// when it is missing or already paid. Composed by callers together
    /// with the wallet credit fragment.
    pub fn get_credit_qry(reward_id: &Thing) -> Result<QryBindingsVal<Value>, AppError> {
        let st_pending = RewardStatus::Pending;
        let st_credited = RewardStatus::Credited;
        let qry = format!(
            "LET $r = (SELECT * FROM $credit_reward_id)[0];
            IF $r == NONE {{
                THROW \"{THROW_REWARD_NOT_FOUND}\";
            }};
            IF $r.status != '{st_pending}' {{
                THROW \"{THROW_REWARD_ALREADY_CREDITED}\";
            }};
            UPDATE $credit_reward_id SET status = '{st_credited}', credited_at = time::now();"
        );
        let mut bindings = HashMap::new();
        bindings.insert(
            "credit_reward_id".to_string(),
            to_db_value(reward_id.clone())?,
        );
        Ok(QryBindingsVal::new(qry, bindings))
    }

    /// Pays a pending reward into its owner's wallet. Status flip and
    /// wallet credit commit together; a replay throws on the status guard.
    pub async fn credit(&self, reward_id: &Thing) -> CtxResult<Reward> {
        let reward = self.get(IdentIdName::Id(reward_id.clone())).await?;
        if reward.status != RewardStatus::Pending {
            return Err(self.ctx.to_ctx_error(AppError::RewardAlreadyCredited));
        }

        let reward_qry =
            Self::get_credit_qry(reward_id).map_err(|e| self.ctx.to_ctx_error(e))?;
        let wallet_id = WalletDbService::get_user_wallet_id(&reward.user);
        let wallet_qry =
            WalletDbService::get_credit_qry(&wallet_id, &reward.user, reward.amount, true)
                .map_err(|e| self.ctx.to_ctx_error(e))?;

        let qry = format!(
            "BEGIN TRANSACTION;
            {}
            {}
        COMMIT TRANSACTION;",
            reward_qry.get_query_string(),
            wallet_qry.get_query_string(),
        );
        let mut bindings = reward_qry.get_bindings();
        bindings.extend(wallet_qry.get_bindings());

        let query = bindings
            .into_iter()
            .fold(self.db.query(qry), |q, n_val| q.bind(n_val));
        let mut res = query.await?;
        check_custom_query_error(&mut res).map_err(|e| self.ctx.to_ctx_error(e))?;

        self.get(IdentIdName::Id(reward_id.clone())).await
    }

    pub async fn get(&self, ident: IdentIdName) -> CtxResult<Reward> {
        let opt = get_entity::<Reward>(self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, ident.to_string().as_str())
    }

    pub async fn user_rewards(
        &self,
        user_id: &Thing,
        pagination: Option<Pagination>,
    ) -> CtxResult<(Vec<Reward>, i64)> {
        let ident = IdentIdName::ColumnIdent {
            column: "user".to_string(),
            val: user_id.to_raw(),
            rec: true,
        };
        let pagination = pagination.unwrap_or(Pagination {
            order_by: Some("r_created".to_string()),
            order_dir: Some(QryOrder::DESC),
            count: 20,
            start: 0,
        });
        let total = get_entity_count(self.db, TABLE_NAME.to_string(), &ident).await?;
        let items =
            get_entity_list::<Reward>(self.db, TABLE_NAME.to_string(), &ident, Some(pagination))
                .await?;
        Ok((items, total))
    }

    /// Recently credited rewards, newest payout first, for landing-page
    /// showcases. Pending rewards are never shown.
    pub async fn featured(&self, count: i8) -> CtxResult<Vec<Reward>> {
        let count = if count <= 0 { 4 } else { count };
        let mut q_bindings = HashMap::new();
        q_bindings.insert("_table".to_string(), TABLE_NAME.to_string());
        q_bindings.insert("status".to_string(), RewardStatus::Credited.to_string());
        q_bindings.insert("_limit_val".to_string(), count.to_string());
        let qry =
            "SELECT * FROM type::table($_table) WHERE status = $status ORDER BY credited_at DESC LIMIT BY type::int($_limit_val);"
                .to_string();
        get_list_qry(self.db, QryBindingsVal::new(qry, q_bindings)).await
    }
}
