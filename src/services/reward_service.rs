use serde::{Deserialize, Serialize};
use surrealdb::sql::Thing;
use tokio::sync::broadcast;
use tracing::info;

use crate::database::client::Db;
use crate::entities::reward::reward_entity::{Reward, RewardDbService};
use crate::middleware::auth_data::Caller;
use crate::middleware::ctx::Ctx;
use crate::middleware::error::CtxResult;
use crate::middleware::mw_ctx::{AppEvent, AppEventType};
use crate::middleware::utils::db_utils::Pagination;

#[derive(Debug, Serialize, Deserialize)]
pub struct RewardListView {
    pub items: Vec<Reward>,
    pub total: i64,
    pub pages: i64,
}

/// Reward payout and listing operations.
pub struct RewardService<'a> {
    pub db: &'a Db,
    pub ctx: &'a Ctx,
    pub event_sender: &'a broadcast::Sender<AppEvent>,
}

impl<'a> RewardService<'a> {
    fn reward_db(&self) -> RewardDbService {
        RewardDbService {
            db: self.db,
            ctx: self.ctx,
        }
    }

    /// Pays a pending reward into the earner's wallet exactly once.
    pub async fn credit(&self, reward_id: &Thing) -> CtxResult<Reward> {
        let credited = self.reward_db().credit(reward_id).await?;
        info!("reward credited id={reward_id} amount={}", credited.amount);
        let _ = self.event_sender.send(AppEvent {
            user_id: credited.user.to_raw(),
            event: AppEventType::RewardCredited {
                reward: reward_id.clone(),
                amount: credited.amount,
            },
        });
        let _ = self.event_sender.send(AppEvent {
            user_id: credited.user.to_raw(),
            event: AppEventType::BalanceUpdated,
        });
        Ok(credited)
    }

    pub async fn user_rewards(
        &self,
        caller: &Caller,
        pagination: Option<Pagination>,
    ) -> CtxResult<RewardListView> {
        let count = pagination.as_ref().map(|p| p.count).unwrap_or(20) as i64;
        let (items, total) = self
            .reward_db()
            .user_rewards(&caller.id, pagination)
            .await?;
        let pages = if count > 0 { (total + count - 1) / count } else { 1 };
        Ok(RewardListView {
            items,
            total,
            pages,
        })
    }

    pub async fn featured(&self, count: i8) -> CtxResult<Vec<Reward>> {
        self.reward_db().featured(count).await
    }
}
