#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use fake::faker::internet::en::Username;
use fake::Fake;
use surrealdb::sql::{Id, Thing};
use tokio::sync::broadcast;
use uuid::Uuid;

use taskpool_core::database::client::{Database, Db, DbConfig};
use taskpool_core::entities::wallet::balance_transaction_entity::generate_reference;
use taskpool_core::entities::wallet::wallet_entity::{WalletDbService, USER_TABLE};
use taskpool_core::init::run_migrations;
use taskpool_core::interfaces::payment_gateway::{
    Bank, BankAccount, GatewayPaymentStatus, GatewayTransferStatus, InitializedTransaction,
    InitiatedTransfer, PaymentGatewayInterface,
};
use taskpool_core::middleware::ctx::Ctx;
use taskpool_core::middleware::error::{AppError, AppResult};
use taskpool_core::middleware::mw_ctx::AppEvent;

pub async fn setup() -> (Db, Ctx, broadcast::Sender<AppEvent>) {
    let database = Database::connect(DbConfig {
        url: "mem://",
        database: "test",
        namespace: "test",
        username: None,
        password: None,
    })
    .await
    .expect("test db connects");
    let db = database.client.clone();
    run_migrations(db.clone()).await.expect("migrations run");
    let ctx = Ctx::new(Ok("test".to_string()), Uuid::new_v4());
    let (event_sender, _) = broadcast::channel(100);
    (db, ctx, event_sender)
}

pub async fn create_test_user(db: &Db) -> Thing {
    let user_id = Thing::from((USER_TABLE, Id::rand()));
    let username: String = Username().fake();
    db.query("CREATE $user_id SET username = $username;")
        .bind(("user_id", user_id.clone()))
        .bind(("username", username))
        .await
        .expect("user created")
        .check()
        .expect("user create ok");
    user_id
}

pub async fn endow(db: &Db, ctx: &Ctx, user_id: &Thing, amount: i64) {
    WalletDbService { db, ctx }
        .credit(user_id, amount)
        .await
        .expect("endow wallet");
}

pub async fn balance_of(db: &Db, ctx: &Ctx, user_id: &Thing) -> i64 {
    WalletDbService { db, ctx }
        .get_user_balance(user_id)
        .await
        .expect("balance read")
        .balance
}

/// Programmable in-memory payment provider. Statuses are swapped by
/// tests to walk a reference through its lifecycle; counters record how
/// often each provider endpoint was hit.
pub struct MockPaymentGateway {
    pub payment_status: Mutex<GatewayPaymentStatus>,
    pub transfer_status: Mutex<GatewayTransferStatus>,
    pub fail_next: AtomicBool,
    pub initialize_calls: AtomicUsize,
    pub verify_payment_calls: AtomicUsize,
    pub transfer_calls: AtomicUsize,
    pub verify_transfer_calls: AtomicUsize,
}

impl Default for MockPaymentGateway {
    fn default() -> Self {
        MockPaymentGateway {
            payment_status: Mutex::new(GatewayPaymentStatus::Pending),
            transfer_status: Mutex::new(GatewayTransferStatus::Pending),
            fail_next: AtomicBool::new(false),
            initialize_calls: AtomicUsize::new(0),
            verify_payment_calls: AtomicUsize::new(0),
            transfer_calls: AtomicUsize::new(0),
            verify_transfer_calls: AtomicUsize::new(0),
        }
    }
}

impl MockPaymentGateway {
    pub fn set_payment_status(&self, status: GatewayPaymentStatus) {
        *self.payment_status.lock().unwrap() = status;
    }

    pub fn set_transfer_status(&self, status: GatewayTransferStatus) {
        *self.transfer_status.lock().unwrap() = status;
    }

    fn check_fail(&self) -> AppResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(AppError::Gateway {
                source: "provider unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl PaymentGatewayInterface for MockPaymentGateway {
    async fn initialize_transaction(
        &self,
        _email: &str,
        _amount: i64,
        reference: &str,
    ) -> AppResult<InitializedTransaction> {
        self.initialize_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.example/{reference}"),
            access_code: "AC_test".to_string(),
            reference: reference.to_string(),
        })
    }

    async fn verify_transaction(&self, _reference: &str) -> AppResult<GatewayPaymentStatus> {
        self.verify_payment_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(*self.payment_status.lock().unwrap())
    }

    async fn create_transfer_recipient(&self, _account: &BankAccount) -> AppResult<String> {
        self.check_fail()?;
        Ok("RCP_test".to_string())
    }

    async fn initiate_transfer(
        &self,
        _amount: i64,
        _recipient_code: &str,
        _reason: &str,
    ) -> AppResult<InitiatedTransfer> {
        self.transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(InitiatedTransfer {
            reference: generate_reference(),
            transfer_code: "TRF_test".to_string(),
            status: *self.transfer_status.lock().unwrap(),
        })
    }

    async fn verify_transfer(&self, _reference: &str) -> AppResult<GatewayTransferStatus> {
        self.verify_transfer_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fail()?;
        Ok(*self.transfer_status.lock().unwrap())
    }

    async fn list_banks(&self) -> AppResult<Vec<Bank>> {
        self.check_fail()?;
        Ok(vec![
            Bank {
                id: 1,
                name: "Access Bank".to_string(),
                code: "044".to_string(),
                active: true,
            },
            Bank {
                id: 2,
                name: "Guaranty Trust Bank".to_string(),
                code: "058".to_string(),
                active: true,
            },
        ])
    }
}

pub fn test_bank_account() -> BankAccount {
    BankAccount {
        bank_code: "044".to_string(),
        account_number: "0123456789".to_string(),
        account_name: "Test Person".to_string(),
    }
}
