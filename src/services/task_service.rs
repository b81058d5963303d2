use tokio::sync::broadcast;
use tracing::info;

use crate::database::client::Db;
use crate::entities::reward::reward_entity::RewardDbService;
use crate::entities::task::task_pool_entity::{
    PoolCreator, TaskPool, TaskPoolCreate, TaskPoolDbService, TaskPoolStatus,
};
use crate::entities::wallet::wallet_entity::{check_custom_query_error, WalletDbService};
use crate::middleware::auth_data::{Caller, Role};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::{AppError, CtxResult};
use crate::middleware::mw_ctx::{AppEvent, AppEventType};
use crate::middleware::utils::db_utils::{IdentIdName, Pagination};
use surrealdb::sql::Thing;

/// Task pool lifecycle: funding, submissions and approvals. A regular
/// user funds the full reward budget from their wallet up front; admin
/// pools are house funded and skip the escrow debit.
pub struct TaskService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
    pub event_sender: &'a broadcast::Sender<AppEvent>,
}

impl<'a> TaskService<'a> {
    fn pool_db(&self) -> TaskPoolDbService {
        TaskPoolDbService {
            db: self.db,
            ctx: self.ctx,
        }
    }

    /// Creates an open pool. The escrow debit and the pool insert commit
    /// in one storage transaction, so an underfunded wallet leaves no
    /// pool record.
    pub async fn create_pool(&self, caller: &Caller, input: TaskPoolCreate) -> CtxResult<TaskPool> {
        if input.title.trim().is_empty() {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "title must not be empty".to_string(),
            }));
        }
        if input.total_spots <= 0 {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "total_spots must be positive".to_string(),
            }));
        }
        if input.reward_per_user <= 0 {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "reward_per_user must be positive".to_string(),
            }));
        }
        let budget = input
            .reward_per_user
            .checked_mul(input.total_spots)
            .ok_or_else(|| {
                self.ctx.to_ctx_error(AppError::Validation {
                    description: "reward budget overflows".to_string(),
                })
            })?;

        let escrow_qry = match caller.role {
            Role::User => {
                let wallet_id = WalletDbService::get_user_wallet_id(&caller.id);
                Some(
                    WalletDbService::get_debit_qry(&wallet_id, budget, true)
                        .map_err(|e| self.ctx.to_ctx_error(e))?,
                )
            }
            Role::Admin => None,
        };

        let pool_id = TaskPoolDbService::new_pool_id();
        let pool = TaskPool {
            id: None,
            title: input.title,
            description: input.description,
            total_spots: input.total_spots,
            reward_per_user: input.reward_per_user,
            total_reward_budget: budget,
            status: TaskPoolStatus::Open,
            created_by: PoolCreator {
                user: caller.id.clone(),
                role: caller.role.clone(),
            },
            completed_count: 0,
            submissions: vec![],
            r_created: None,
            r_updated: None,
        };
        let created = self.pool_db().create(pool_id, pool, escrow_qry).await?;
        info!(
            "task pool created id={:?} budget={budget}",
            created.id
        );
        let _ = self.event_sender.send(AppEvent {
            user_id: caller.id.to_raw(),
            event: AppEventType::TaskPoolCreated {
                pool: created.id.clone().expect("created pool has id"),
            },
        });
        Ok(created)
    }

    pub async fn submit(
        &self,
        caller: &Caller,
        pool_id: &Thing,
        proof: String,
    ) -> CtxResult<TaskPool> {
        if proof.trim().is_empty() {
            return Err(self.ctx.to_ctx_error(AppError::Validation {
                description: "proof must not be empty".to_string(),
            }));
        }
        self.pool_db().submit(pool_id, &caller.id, proof).await
    }

    /// Approves one pending submission. Submission flip, completed count,
    /// pool close at capacity, reward creation, reward crediting and the
    /// wallet credit all commit in one storage transaction.
    pub async fn approve(
        &self,
        caller: &Caller,
        pool_id: &Thing,
        submitter: &Thing,
    ) -> CtxResult<TaskPool> {
        let pool = self.pool_db().get(IdentIdName::Id(pool_id.clone())).await?;
        if !caller.is_admin() && pool.created_by.user != caller.id {
            return Err(self.ctx.to_ctx_error(AppError::Generic {
                description: "only the pool creator or an admin can approve".to_string(),
            }));
        }

        let reward_id = RewardDbService::new_reward_id();
        let approve_qry = TaskPoolDbService::get_approve_qry(pool_id, submitter, &reward_id)
            .map_err(|e| self.ctx.to_ctx_error(e))?;
        let reward_qry =
            RewardDbService::get_credit_qry(&reward_id).map_err(|e| self.ctx.to_ctx_error(e))?;
        let wallet_id = WalletDbService::get_user_wallet_id(submitter);
        let wallet_qry =
            WalletDbService::get_credit_qry(&wallet_id, submitter, pool.reward_per_user, true)
                .map_err(|e| self.ctx.to_ctx_error(e))?;

        let qry = format!(
            "BEGIN TRANSACTION;
            {}
            {}
            {}
        COMMIT TRANSACTION;",
            approve_qry.get_query_string(),
            reward_qry.get_query_string(),
            wallet_qry.get_query_string(),
        );
        let mut bindings = approve_qry.get_bindings();
        bindings.extend(reward_qry.get_bindings());
        bindings.extend(wallet_qry.get_bindings());

        let query = bindings
            .into_iter()
            .fold(self.db.query(qry), |q, n_val| q.bind(n_val));
        let mut res = query.await?;
        check_custom_query_error(&mut res).map_err(|e| self.ctx.to_ctx_error(e))?;

        info!("submission approved pool={pool_id} user={submitter}");
        let _ = self.event_sender.send(AppEvent {
            user_id: submitter.to_raw(),
            event: AppEventType::RewardCredited {
                reward: reward_id,
                amount: pool.reward_per_user,
            },
        });
        let _ = self.event_sender.send(AppEvent {
            user_id: submitter.to_raw(),
            event: AppEventType::BalanceUpdated,
        });

        self.pool_db().get(IdentIdName::Id(pool_id.clone())).await
    }

    pub async fn get_pool(&self, pool_id: &Thing) -> CtxResult<TaskPool> {
        self.pool_db().get(IdentIdName::Id(pool_id.clone())).await
    }

    pub async fn list_pools(
        &self,
        status: Option<TaskPoolStatus>,
        pagination: Option<Pagination>,
    ) -> CtxResult<Vec<TaskPool>> {
        self.pool_db().list_by_status(status, pagination).await
    }
}
