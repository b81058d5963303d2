use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use surrealdb::sql::{Id, Thing, Value};

use crate::database::client::Db;
use crate::entities::reward::reward_entity::RewardStatus;
use crate::entities::wallet::wallet_entity::{
    check_custom_query_error, to_db_value, USER_TABLE,
};
use crate::middleware::auth_data::Role;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxResult};
use crate::middleware::utils::db_utils::{
    get_entity, get_entity_list, get_list_qry, record_exists, with_not_found_err, IdentIdName,
    Pagination, QryBindingsVal, QryOrder,
};

pub const TABLE_NAME: &str = "task_pool";

pub const THROW_POOL_CLOSED: &str = "Task pool closed";
pub const THROW_ALREADY_SUBMITTED: &str = "Already submitted";
pub const THROW_SUBMISSION_NOT_FOUND: &str = "Submission not found";

#[derive(Display, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum TaskPoolStatus {
    Open,
    Closed,
}

#[derive(Display, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolCreator {
    pub user: Thing,
    pub role: Role,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskSubmission {
    pub user: Thing,
    pub status: SubmissionStatus,
    pub proof: String,
    pub submission_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_date: Option<DateTime<Utc>>,
}

/// A funded pool of identical task spots. Submissions are embedded so a
/// pool and its entries always change under one record lock.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TaskPool {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Thing>,
    pub title: String,
    pub description: String,
    pub total_spots: i64,
    pub reward_per_user: i64,
    pub total_reward_budget: i64,
    pub status: TaskPoolStatus,
    pub created_by: PoolCreator,
    pub completed_count: i64,
    pub submissions: Vec<TaskSubmission>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub r_updated: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct TaskPoolCreate {
    pub title: String,
    pub description: String,
    pub total_spots: i64,
    pub reward_per_user: i64,
}

pub struct TaskPoolDbService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
}

impl<'a> TaskPoolDbService<'a> {
    pub async fn mutate_db(&self) -> Result<(), AppError> {
        let st_open = TaskPoolStatus::Open;
        let st_closed = TaskPoolStatus::Closed;
        let sub_pending = SubmissionStatus::Pending;
        let sub_approved = SubmissionStatus::Approved;
        let sub_rejected = SubmissionStatus::Rejected;
        let role_admin = Role::Admin;
        let role_user = Role::User;
        let sql = format!("
    DEFINE TABLE IF NOT EXISTS {TABLE_NAME} SCHEMAFULL;
    DEFINE FIELD IF NOT EXISTS title ON TABLE {TABLE_NAME} TYPE string ASSERT string::len($value) > 0;
    DEFINE FIELD IF NOT EXISTS description ON TABLE {TABLE_NAME} TYPE string;
    DEFINE FIELD IF NOT EXISTS total_spots ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS reward_per_user ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS total_reward_budget ON TABLE {TABLE_NAME} TYPE number ASSERT $value > 0;
    DEFINE FIELD IF NOT EXISTS status ON TABLE {TABLE_NAME} TYPE string ASSERT $value INSIDE ['{st_open}','{st_closed}'];
    DEFINE FIELD IF NOT EXISTS created_by ON TABLE {TABLE_NAME} TYPE {{ user: record<{USER_TABLE}>, role: string }} ASSERT $value.role INSIDE ['{role_admin}','{role_user}'];
    DEFINE FIELD IF NOT EXISTS completed_count ON TABLE {TABLE_NAME} TYPE number DEFAULT 0;
    DEFINE FIELD IF NOT EXISTS submissions ON TABLE {TABLE_NAME} TYPE array<{{ user: record<{USER_TABLE}>, status: '{sub_pending}' | '{sub_approved}' | '{sub_rejected}', proof: string, submission_date: datetime, approval_date: option<datetime> }}> DEFAULT [];
    DEFINE FIELD IF NOT EXISTS r_created ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE $before OR time::now();
    DEFINE FIELD IF NOT EXISTS r_updated ON TABLE {TABLE_NAME} TYPE option<datetime> DEFAULT time::now() VALUE time::now();
    ");
        let mutation = self.db.query(sql).await?;

        mutation.check().expect("should mutate task_pool");

        Ok(())
    }

    pub fn new_pool_id() -> Thing {
        Thing::from((TABLE_NAME, Id::rand()))
    }

    /// Inserts the pool record, optionally inside the same storage
    /// transaction as an escrow debit so a failed debit leaves no pool.
    pub async fn create(
        &self,
        pool_id: Thing,
        pool: TaskPool,
        escrow_qry: Option<QryBindingsVal<Value>>,
    ) -> CtxResult<TaskPool> {
        let escrow_qry =
            escrow_qry.unwrap_or_else(|| QryBindingsVal::new(String::new(), HashMap::new()));
        let qry = format!(
            "BEGIN TRANSACTION;
            {}
            CREATE ONLY $pool_id CONTENT $pool_content;
        COMMIT TRANSACTION;",
            escrow_qry.get_query_string()
        );
        let mut bindings = escrow_qry.get_bindings();
        bindings.insert(
            "pool_id".to_string(),
            to_db_value(pool_id.clone()).map_err(|e| self.ctx.to_ctx_error(e))?,
        );
        bindings.insert(
            "pool_content".to_string(),
            to_db_value(pool).map_err(|e| self.ctx.to_ctx_error(e))?,
        );

        let query = bindings
            .into_iter()
            .fold(self.db.query(qry), |q, n_val| q.bind(n_val));
        let mut res = query.await?;
        check_custom_query_error(&mut res).map_err(|e| self.ctx.to_ctx_error(e))?;

        self.get(IdentIdName::Id(pool_id)).await
    }

    /// Appends a pending submission. Pool status, duplicate check and the
    /// append happen atomically against the pool record.
    pub async fn submit(&self, pool_id: &Thing, user_id: &Thing, proof: String) -> CtxResult<TaskPool> {
        record_exists(self.db, pool_id)
            .await
            .map_err(|e| self.ctx.to_ctx_error(e))?;

        let sub_pending = SubmissionStatus::Pending;
        let st_closed = TaskPoolStatus::Closed;
        let qry = format!(
            "BEGIN TRANSACTION;
            LET $task = (SELECT * FROM $sub_task_id)[0];
            IF $task.status == '{st_closed}' {{
                THROW \"{THROW_POOL_CLOSED}\";
            }};
            IF $sub_user INSIDE $task.submissions.user {{
                THROW \"{THROW_ALREADY_SUBMITTED}\";
            }};
            UPDATE $sub_task_id SET submissions += {{
                user: $sub_user,
                status: '{sub_pending}',
                proof: $sub_proof,
                submission_date: time::now(),
            }};
        COMMIT TRANSACTION;"
        );
        let mut bindings = HashMap::new();
        bindings.insert(
            "sub_task_id".to_string(),
            to_db_value(pool_id.clone()).map_err(|e| self.ctx.to_ctx_error(e))?,
        );
        bindings.insert(
            "sub_user".to_string(),
            to_db_value(user_id.clone()).map_err(|e| self.ctx.to_ctx_error(e))?,
        );
        bindings.insert(
            "sub_proof".to_string(),
            to_db_value(proof).map_err(|e| self.ctx.to_ctx_error(e))?,
        );

        let query = bindings
            .into_iter()
            .fold(self.db.query(qry), |q, n_val| q.bind(n_val));
        let mut res = query.await?;
        check_custom_query_error(&mut res).map_err(|e| self.ctx.to_ctx_error(e))?;

        self.get(IdentIdName::Id(pool_id.clone())).await
    }

    /// Query fragment that flips one pending submission to approved, bumps
    /// the completed count, closes the pool at capacity and creates the
    /// pending reward. No BEGIN/COMMIT of its own - the caller composes it
    /// into a larger transaction.
    pub fn get_approve_qry(
        pool_id: &Thing,
        user_id: &Thing,
        reward_id: &Thing,
    ) -> Result<QryBindingsVal<Value>, AppError> {
        let sub_pending = SubmissionStatus::Pending;
        let sub_approved = SubmissionStatus::Approved;
        let st_open = TaskPoolStatus::Open;
        let st_closed = TaskPoolStatus::Closed;
        let reward_pending = RewardStatus::Pending;
        let qry = format!(
            "LET $task = (SELECT * FROM $approve_task_id)[0];
            IF $task == NONE {{
                THROW \"{THROW_SUBMISSION_NOT_FOUND}\";
            }};
            IF $task.status == '{st_closed}' {{
                THROW \"{THROW_SUBMISSION_NOT_FOUND}\";
            }};
            LET $sub = $task.submissions[WHERE user = $approve_user AND status = '{sub_pending}'][0];
            IF $sub == NONE {{
                THROW \"{THROW_SUBMISSION_NOT_FOUND}\";
            }};
            LET $others = $task.submissions[WHERE user != $approve_user];
            LET $approved_sub = {{
                user: $sub.user,
                status: '{sub_approved}',
                proof: $sub.proof,
                submission_date: $sub.submission_date,
                approval_date: time::now(),
            }};
            LET $completed = $task.completed_count + 1;
            LET $pool_status = IF $completed >= $task.total_spots {{ '{st_closed}' }} ELSE {{ '{st_open}' }};
            UPDATE $approve_task_id SET
                submissions = array::append($others, $approved_sub),
                completed_count = $completed,
                status = $pool_status;
            CREATE ONLY $approve_reward_id CONTENT {{
                user: $approve_user,
                task: $approve_task_id,
                amount: $task.reward_per_user,
                status: '{reward_pending}',
                task_title: $task.title,
            }};"
        );
        let mut bindings = HashMap::new();
        bindings.insert("approve_task_id".to_string(), to_db_value(pool_id.clone())?);
        bindings.insert("approve_user".to_string(), to_db_value(user_id.clone())?);
        bindings.insert(
            "approve_reward_id".to_string(),
            to_db_value(reward_id.clone())?,
        );
        Ok(QryBindingsVal::new(qry, bindings))
    }

    pub async fn get(&self, ident: IdentIdName) -> CtxResult<TaskPool> {
        let opt = get_entity::<TaskPool>(self.db, TABLE_NAME.to_string(), &ident).await?;
        with_not_found_err(opt, self.ctx, ident.to_string().as_str())
    }

    pub async fn list_by_status(
        &self,
        status: Option<TaskPoolStatus>,
        pagination: Option<Pagination>,
    ) -> CtxResult<Vec<TaskPool>> {
        let pagination = pagination.unwrap_or(Pagination {
            order_by: Some("r_created".to_string()),
            order_dir: Some(QryOrder::DESC),
            count: 20,
            start: 0,
        });
        match status {
            Some(st) => {
                let ident = IdentIdName::ColumnIdent {
                    column: "status".to_string(),
                    val: st.to_string(),
                    rec: false,
                };
                get_entity_list::<TaskPool>(self.db, TABLE_NAME.to_string(), &ident, Some(pagination))
                    .await
            }
            None => {
                let count = if pagination.count <= 0 { 20 } else { pagination.count };
                let start = if pagination.start <= 0 { 0 } else { pagination.start };
                let mut q_bindings = HashMap::new();
                q_bindings.insert("_table".to_string(), TABLE_NAME.to_string());
                q_bindings.insert("_limit_val".to_string(), count.to_string());
                q_bindings.insert("_start_val".to_string(), start.to_string());
                let qry = "SELECT * FROM type::table($_table) ORDER BY r_created DESC LIMIT BY type::int($_limit_val) START AT type::int($_start_val);".to_string();
                get_list_qry(self.db, QryBindingsVal::new(qry, q_bindings)).await
            }
        }
    }
}
