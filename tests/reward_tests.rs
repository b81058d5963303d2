mod helpers;

use serial_test::serial;
use surrealdb::sql::Thing;

use taskpool_core::database::client::Db;
use taskpool_core::entities::reward::reward_entity::{Reward, RewardStatus};
use taskpool_core::entities::task::task_pool_entity::{TaskPoolCreate, TaskPoolDbService};
use taskpool_core::middleware::auth_data::Caller;
use taskpool_core::middleware::error::AppError;
use taskpool_core::services::reward_service::RewardService;
use taskpool_core::services::task_service::TaskService;

use helpers::{balance_of, create_test_user, endow, setup};

async fn insert_pending_reward(db: &Db, user: &Thing, amount: i64) -> Thing {
    let reward: Option<Reward> = db
        .create("reward")
        .content(Reward {
            id: None,
            user: user.clone(),
            task: TaskPoolDbService::new_pool_id(),
            amount,
            status: RewardStatus::Pending,
            task_title: "Share the launch post".to_string(),
            credited_at: None,
            r_created: None,
            r_updated: None,
        })
        .await
        .expect("reward insert");
    reward.expect("reward").id.expect("reward id")
}

#[tokio::test]
#[serial]
async fn pending_reward_credits_wallet_once() {
    let (db, ctx, sender) = setup().await;
    let user = create_test_user(&db).await;
    let service = RewardService {
        db: &db,
        ctx: &ctx,
        event_sender: &sender,
    };

    let reward_id = insert_pending_reward(&db, &user, 2500).await;
    let credited = service.credit(&reward_id).await.expect("credit");
    assert_eq!(credited.status, RewardStatus::Credited);
    assert!(credited.credited_at.is_some());
    assert_eq!(balance_of(&db, &ctx, &user).await, 2500);

    let err = service.credit(&reward_id).await.err().expect("replay rejected");
    assert_eq!(err.error, AppError::RewardAlreadyCredited);
    assert_eq!(balance_of(&db, &ctx, &user).await, 2500);
}

#[tokio::test]
#[serial]
async fn crediting_missing_reward_fails() {
    let (db, ctx, sender) = setup().await;
    let service = RewardService {
        db: &db,
        ctx: &ctx,
        event_sender: &sender,
    };

    let missing = taskpool_core::entities::reward::reward_entity::RewardDbService::new_reward_id();
    let err = service.credit(&missing).await.err().expect("missing reward");
    assert!(matches!(err.error, AppError::EntityFailIdNotFound { .. }));
}

#[tokio::test]
#[serial]
async fn approval_produces_a_credited_reward() {
    let (db, ctx, sender) = setup().await;
    let creator = create_test_user(&db).await;
    let worker = create_test_user(&db).await;
    endow(&db, &ctx, &creator, 5000).await;
    let task_service = TaskService {
        db: &db,
        ctx: &ctx,
        event_sender: &sender,
    };
    let reward_service = RewardService {
        db: &db,
        ctx: &ctx,
        event_sender: &sender,
    };
    let creator_caller = Caller::user(creator.clone());

    let pool = task_service
        .create_pool(
            &creator_caller,
            TaskPoolCreate {
                title: "Test the beta build".to_string(),
                description: "File at least one report".to_string(),
                total_spots: 2,
                reward_per_user: 2000,
            },
        )
        .await
        .expect("pool");
    let pool_id = pool.id.expect("id");

    task_service
        .submit(&Caller::user(worker.clone()), &pool_id, "report-1".to_string())
        .await
        .expect("submit");
    task_service
        .approve(&creator_caller, &pool_id, &worker)
        .await
        .expect("approve");

    let listed = reward_service
        .user_rewards(&Caller::user(worker.clone()), None)
        .await
        .expect("rewards");
    assert_eq!(listed.total, 1);
    assert_eq!(listed.items.len(), 1);
    let reward = &listed.items[0];
    assert_eq!(reward.status, RewardStatus::Credited);
    assert_eq!(reward.amount, 2000);
    assert_eq!(reward.task_title, "Test the beta build");
    assert_eq!(reward.task, pool_id);
    assert_eq!(balance_of(&db, &ctx, &worker).await, 2000);
}

#[tokio::test]
#[serial]
async fn featured_lists_recently_credited_only() {
    let (db, ctx, sender) = setup().await;
    let user = create_test_user(&db).await;
    let service = RewardService {
        db: &db,
        ctx: &ctx,
        event_sender: &sender,
    };

    // large but unpaid, must never make the showcase
    insert_pending_reward(&db, &user, 9000).await;
    let first = insert_pending_reward(&db, &user, 100).await;
    let second = insert_pending_reward(&db, &user, 500).await;
    service.credit(&first).await.expect("credit first");
    service.credit(&second).await.expect("credit second");

    let featured = service.featured(10).await.expect("featured");
    assert_eq!(featured.len(), 2);
    assert!(featured
        .iter()
        .all(|r| r.status == RewardStatus::Credited));
    assert_eq!(featured[0].id, Some(second));
    assert_eq!(featured[1].id, Some(first));
}

#[tokio::test]
#[serial]
async fn reward_listing_is_scoped_to_the_user() {
    let (db, ctx, sender) = setup().await;
    let user_a = create_test_user(&db).await;
    let user_b = create_test_user(&db).await;
    let service = RewardService {
        db: &db,
        ctx: &ctx,
        event_sender: &sender,
    };

    insert_pending_reward(&db, &user_a, 100).await;
    insert_pending_reward(&db, &user_a, 200).await;
    insert_pending_reward(&db, &user_b, 300).await;

    let listed_a = service
        .user_rewards(&Caller::user(user_a), None)
        .await
        .expect("user a rewards");
    assert_eq!(listed_a.total, 2);

    let listed_b = service
        .user_rewards(&Caller::user(user_b), None)
        .await
        .expect("user b rewards");
    assert_eq!(listed_b.total, 1);
    assert_eq!(listed_b.items[0].amount, 300);
}
