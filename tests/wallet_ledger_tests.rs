mod helpers;

use futures::future::join_all;
use serial_test::serial;

use taskpool_core::entities::reward::reward_entity::{RewardDbService, RewardStatus};
use taskpool_core::entities::task::task_pool_entity::{TaskPoolCreate, TaskPoolStatus};
use taskpool_core::entities::wallet::balance_transaction_entity::{
    generate_reference, BalanceTransactionDbService, TransactionStatus, TransactionType,
};
use taskpool_core::entities::wallet::wallet_entity::{CurrencySymbol, WalletDbService};
use taskpool_core::middleware::auth_data::Caller;
use taskpool_core::middleware::error::AppError;
use taskpool_core::services::task_service::TaskService;

use helpers::{balance_of, create_test_user, endow, setup};

#[tokio::test]
#[serial]
async fn creates_wallet_once_per_user() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let service = WalletDbService { db: &db, ctx: &ctx };

    let wallet = service.create_wallet(&user).await.expect("first create");
    assert_eq!(wallet.balance, 0);
    assert_eq!(wallet.currency, CurrencySymbol::NGN);

    let err = service.create_wallet(&user).await.err().expect("second create fails");
    assert_eq!(err.error, AppError::WalletAlreadyExists);
}

#[tokio::test]
#[serial]
async fn balance_is_zero_without_wallet() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;

    let view = WalletDbService { db: &db, ctx: &ctx }
        .get_user_balance(&user)
        .await
        .expect("balance");
    assert_eq!(view.balance, 0);
}

#[tokio::test]
#[serial]
async fn credit_and_debit_move_balance() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let service = WalletDbService { db: &db, ctx: &ctx };

    service.credit(&user, 5000).await.expect("credit");
    service.debit(&user, 2000).await.expect("debit");

    assert_eq!(balance_of(&db, &ctx, &user).await, 3000);
}

#[tokio::test]
#[serial]
async fn debit_over_balance_is_rejected() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let service = WalletDbService { db: &db, ctx: &ctx };

    service.credit(&user, 1000).await.expect("credit");
    let err = service.debit(&user, 5000).await.err().expect("debit fails");
    assert_eq!(err.error, AppError::BalanceTooLow);

    assert_eq!(balance_of(&db, &ctx, &user).await, 1000);
}

#[tokio::test]
#[serial]
async fn zero_amount_is_rejected() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let service = WalletDbService { db: &db, ctx: &ctx };

    assert!(service.credit(&user, 0).await.is_err());
    assert!(service.debit(&user, -5).await.is_err());
}

#[tokio::test]
#[serial]
async fn completed_deposit_settles_once() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };

    let reference = generate_reference();
    tx_db
        .create_tx(
            &user,
            TransactionType::Deposit,
            5000,
            CurrencySymbol::NGN.to_string(),
            Some(reference.clone()),
            None,
        )
        .await
        .expect("pending deposit");
    assert_eq!(balance_of(&db, &ctx, &user).await, 0);

    let settled = tx_db
        .settle(&reference, TransactionStatus::Completed)
        .await
        .expect("settle");
    assert_eq!(settled.status, TransactionStatus::Completed);
    assert_eq!(balance_of(&db, &ctx, &user).await, 5000);

    // replaying the callback must not credit again
    let replay = tx_db
        .settle(&reference, TransactionStatus::Completed)
        .await
        .expect("replay settle");
    assert_eq!(replay.status, TransactionStatus::Completed);
    assert_eq!(balance_of(&db, &ctx, &user).await, 5000);
}

#[tokio::test]
#[serial]
async fn failed_settlement_never_touches_balance() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };

    let reference = generate_reference();
    tx_db
        .create_tx(
            &user,
            TransactionType::Deposit,
            5000,
            CurrencySymbol::NGN.to_string(),
            Some(reference.clone()),
            None,
        )
        .await
        .expect("pending deposit");

    let settled = tx_db
        .settle(&reference, TransactionStatus::Failed)
        .await
        .expect("settle failed");
    assert_eq!(settled.status, TransactionStatus::Failed);
    assert_eq!(balance_of(&db, &ctx, &user).await, 0);

    // a failed entry stays failed even if a success callback arrives late
    let replay = tx_db
        .settle(&reference, TransactionStatus::Completed)
        .await
        .expect("late settle");
    assert_eq!(replay.status, TransactionStatus::Failed);
    assert_eq!(balance_of(&db, &ctx, &user).await, 0);
}

#[tokio::test]
#[serial]
async fn settling_back_to_pending_is_invalid() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };

    let reference = generate_reference();
    tx_db
        .create_tx(
            &user,
            TransactionType::Deposit,
            100,
            CurrencySymbol::NGN.to_string(),
            Some(reference.clone()),
            None,
        )
        .await
        .expect("pending deposit");

    let err = tx_db
        .settle(&reference, TransactionStatus::Pending)
        .await
        .err()
        .expect("pending target rejected");
    assert!(matches!(err.error, AppError::InvalidTransition { .. }));
}

#[tokio::test]
#[serial]
async fn unknown_reference_is_not_found() {
    let (db, ctx, _) = setup().await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };

    let err = tx_db
        .settle("TRX_0_missing", TransactionStatus::Completed)
        .await
        .err()
        .expect("missing reference");
    assert!(matches!(err.error, AppError::EntityFailIdNotFound { .. }));
}

#[tokio::test]
#[serial]
async fn completed_withdrawal_debits_wallet() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };
    endow(&db, &ctx, &user, 10000).await;

    let reference = generate_reference();
    tx_db
        .create_tx(
            &user,
            TransactionType::Withdrawal,
            4000,
            CurrencySymbol::NGN.to_string(),
            Some(reference.clone()),
            None,
        )
        .await
        .expect("pending withdrawal");
    assert_eq!(balance_of(&db, &ctx, &user).await, 10000);

    let settled = tx_db
        .settle(&reference, TransactionStatus::Completed)
        .await
        .expect("settle");
    assert_eq!(settled.status, TransactionStatus::Completed);
    assert_eq!(balance_of(&db, &ctx, &user).await, 6000);
}

#[tokio::test]
#[serial]
async fn withdrawal_settlement_rechecks_balance() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };
    endow(&db, &ctx, &user, 1000).await;

    let reference = generate_reference();
    tx_db
        .create_tx(
            &user,
            TransactionType::Withdrawal,
            5000,
            CurrencySymbol::NGN.to_string(),
            Some(reference.clone()),
            None,
        )
        .await
        .expect("pending withdrawal");

    let err = tx_db
        .settle(&reference, TransactionStatus::Completed)
        .await
        .err()
        .expect("settle rejected");
    assert_eq!(err.error, AppError::BalanceTooLow);

    // aborted settlement leaves the entry pending and the balance intact
    let tx = tx_db.get_by_reference(&reference).await.expect("entry");
    assert_eq!(tx.status, TransactionStatus::Pending);
    assert_eq!(balance_of(&db, &ctx, &user).await, 1000);
}

#[tokio::test]
#[serial]
async fn history_filters_by_type() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };

    for tx_type in [
        TransactionType::Deposit,
        TransactionType::Deposit,
        TransactionType::Withdrawal,
    ] {
        tx_db
            .create_tx(
                &user,
                tx_type,
                100,
                CurrencySymbol::NGN.to_string(),
                None,
                None,
            )
            .await
            .expect("entry");
    }

    let (all, total_all) = tx_db.user_history(&user, None, None).await.expect("all");
    assert_eq!(total_all, 3);
    assert_eq!(all.len(), 3);

    let (withdrawals, total_w) = tx_db
        .user_history(&user, Some(TransactionType::Withdrawal), None)
        .await
        .expect("withdrawals");
    assert_eq!(total_w, 1);
    assert_eq!(withdrawals.len(), 1);
    assert_eq!(withdrawals[0].r#type, TransactionType::Withdrawal);

    let other = create_test_user(&db).await;
    let (none, total_none) = tx_db.user_history(&other, None, None).await.expect("empty");
    assert_eq!(total_none, 0);
    assert!(none.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_debits_never_overdraw() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;
    let service = WalletDbService { db: &db, ctx: &ctx };
    service.credit(&user, 100).await.expect("endow");

    let results = join_all((0..5).map(|_| {
        let db = db.clone();
        let ctx = ctx.clone();
        let user = user.clone();
        async move {
            WalletDbService { db: &db, ctx: &ctx }
                .debit(&user, 30)
                .await
        }
    }))
    .await;

    let successes = results.iter().filter(|r| r.is_ok()).count() as i64;
    assert!(successes <= 3);
    assert_eq!(balance_of(&db, &ctx, &user).await, 100 - 30 * successes);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[serial]
async fn concurrent_wallet_creates_collapse_to_one() {
    let (db, ctx, _) = setup().await;
    let user = create_test_user(&db).await;

    let results = join_all((0..4).map(|_| {
        let db = db.clone();
        let ctx = ctx.clone();
        let user = user.clone();
        async move {
            WalletDbService { db: &db, ctx: &ctx }
                .create_wallet(&user)
                .await
        }
    }))
    .await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for err in results.into_iter().filter_map(|r| r.err()) {
        assert_eq!(err.error, AppError::WalletAlreadyExists);
    }
}

#[tokio::test]
#[serial]
async fn balance_matches_the_accounting_identity() {
    let (db, ctx, sender) = setup().await;
    let user = create_test_user(&db).await;
    let sponsor = create_test_user(&db).await;
    let admin = create_test_user(&db).await;
    let tx_db = BalanceTransactionDbService { db: &db, ctx: &ctx };
    let task_service = TaskService {
        db: &db,
        ctx: &ctx,
        event_sender: &sender,
    };

    let deposit = tx_db
        .create_tx(
            &user,
            TransactionType::Deposit,
            10000,
            CurrencySymbol::NGN.to_string(),
            None,
            None,
        )
        .await
        .expect("deposit entry");
    tx_db
        .settle(&deposit.reference, TransactionStatus::Completed)
        .await
        .expect("deposit settles");

    let withdrawal = tx_db
        .create_tx(
            &user,
            TransactionType::Withdrawal,
            2000,
            CurrencySymbol::NGN.to_string(),
            None,
            None,
        )
        .await
        .expect("withdrawal entry");
    tx_db
        .settle(&withdrawal.reference, TransactionStatus::Completed)
        .await
        .expect("withdrawal settles");

    // open pool escrows part of the balance
    task_service
        .create_pool(
            &Caller::user(user.clone()),
            TaskPoolCreate {
                title: "Escrowed pool".to_string(),
                description: "Stays open".to_string(),
                total_spots: 3,
                reward_per_user: 1000,
            },
        )
        .await
        .expect("escrowed pool");

    // a sponsored pool pays the user one credited reward
    endow(&db, &ctx, &sponsor, 500).await;
    let sponsored = task_service
        .create_pool(
            &Caller::user(sponsor.clone()),
            TaskPoolCreate {
                title: "Sponsored pool".to_string(),
                description: "One spot".to_string(),
                total_spots: 1,
                reward_per_user: 500,
            },
        )
        .await
        .expect("sponsored pool");
    let sponsored_id = sponsored.id.expect("id");
    task_service
        .submit(&Caller::user(user.clone()), &sponsored_id, "proof".to_string())
        .await
        .expect("submit");
    task_service
        .approve(&Caller::admin(admin), &sponsored_id, &user)
        .await
        .expect("approve");

    let (entries, _) = tx_db.user_history(&user, None, None).await.expect("history");
    let deposits: i64 = entries
        .iter()
        .filter(|t| t.r#type == TransactionType::Deposit && t.status == TransactionStatus::Completed)
        .map(|t| t.amount)
        .sum();
    let withdrawals: i64 = entries
        .iter()
        .filter(|t| {
            t.r#type == TransactionType::Withdrawal && t.status == TransactionStatus::Completed
        })
        .map(|t| t.amount)
        .sum();
    let (rewards, _) = RewardDbService { db: &db, ctx: &ctx }
        .user_rewards(&user, None)
        .await
        .expect("rewards");
    let credited: i64 = rewards
        .iter()
        .filter(|r| r.status == RewardStatus::Credited)
        .map(|r| r.amount)
        .sum();
    let open_pools = task_service
        .list_pools(Some(TaskPoolStatus::Open), None)
        .await
        .expect("open pools");
    let escrowed: i64 = open_pools
        .iter()
        .filter(|p| p.created_by.user == user)
        .map(|p| p.total_reward_budget)
        .sum();

    assert_eq!(deposits, 10000);
    assert_eq!(withdrawals, 2000);
    assert_eq!(credited, 500);
    assert_eq!(escrowed, 3000);
    assert_eq!(
        balance_of(&db, &ctx, &user).await,
        deposits - withdrawals - escrowed + credited
    );
}
