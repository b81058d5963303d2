use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use serde::Serialize;
use surrealdb::sql::Thing;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::database::client::Database;

/// Logical events emitted after a successful commit. Delivery and
/// fan-out belong to the notification collaborator; the core never
/// retries a failed send.
#[derive(Debug, Clone, Serialize)]
pub enum AppEventType {
    TaskPoolCreated { pool: Thing },
    RewardCredited { reward: Thing, amount: i64 },
    BalanceUpdated,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppEvent {
    pub user_id: String,
    pub event: AppEventType,
}

pub struct CtxState {
    pub db: Database,
    pub is_development: bool,
    pub paystack_secret_key: String,
    pub paystack_api_url: String,
    pub event_sender: broadcast::Sender<AppEvent>,
}

impl Debug for CtxState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str("CTX STATE HERE :)")
    }
}

pub fn create_ctx_state(db: Database, config: &AppConfig) -> Arc<CtxState> {
    let (event_sender, _) = broadcast::channel(100);
    let ctx_state = CtxState {
        db,
        is_development: config.is_development,
        paystack_secret_key: config.paystack_secret_key.clone(),
        paystack_api_url: config.paystack_api_url.clone(),
        event_sender,
    };
    Arc::new(ctx_state)
}
