use tracing::info;
use uuid::Uuid;

use crate::database::client::Db;
use crate::entities::reward::reward_entity::RewardDbService;
use crate::entities::task::task_pool_entity::TaskPoolDbService;
use crate::entities::wallet::balance_transaction_entity::BalanceTransactionDbService;
use crate::entities::wallet::wallet_entity::{WalletDbService, USER_TABLE};
use crate::middleware::ctx::Ctx;
use crate::middleware::error::AppError;

/// Defines all tables, fields and indexes. Every statement is
/// IF NOT EXISTS, so reruns on an existing database are no-ops.
pub async fn run_migrations(db: Db) -> Result<(), AppError> {
    let c = Ctx::new(Ok("migrations".to_string()), Uuid::new_v4());

    db.query(format!(
        "DEFINE TABLE IF NOT EXISTS {USER_TABLE} SCHEMALESS;"
    ))
    .await?
    .check()?;

    WalletDbService { db: &db, ctx: &c }.mutate_db().await?;
    BalanceTransactionDbService { db: &db, ctx: &c }
        .mutate_db()
        .await?;
    TaskPoolDbService { db: &db, ctx: &c }.mutate_db().await?;
    RewardDbService { db: &db, ctx: &c }.mutate_db().await?;

    info!("->> migrations done");
    Ok(())
}
