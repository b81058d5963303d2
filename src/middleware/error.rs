use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::middleware::ctx::Ctx;

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CtxError {
    pub error: AppError,
    pub req_id: Uuid,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AppError {
    Generic { description: String },
    Validation { description: String },
    EntityFailIdNotFound { ident: String },
    WalletAlreadyExists,
    BalanceTooLow,
    TaskPoolClosed,
    AlreadySubmitted,
    SubmissionNotFound,
    RewardAlreadyCredited,
    InvalidTransition { from: String, to: String },
    Gateway { source: String },
    Serde { source: String },
    SurrealDb { source: String },
}

/// CtxError carries the req_id so failures can be reported per request.
pub type CtxResult<T> = core::result::Result<T, CtxError>;
/// Any error for storing before a request id is attached.
pub type AppResult<T> = core::result::Result<T, AppError>;

impl std::error::Error for AppError {}

// for slightly less verbose error mappings
impl CtxError {
    pub fn from<T: Into<AppError>>(ctx: &Ctx) -> impl FnOnce(T) -> CtxError + '_ {
        |err| CtxError {
            req_id: ctx.req_id(),
            error: err.into(),
        }
    }
}

impl From<surrealdb::Error> for CtxError {
    fn from(value: surrealdb::Error) -> Self {
        CtxError {
            req_id: Uuid::new_v4(),
            error: value.into(),
        }
    }
}

impl From<AppError> for CtxError {
    fn from(value: AppError) -> Self {
        CtxError {
            req_id: Uuid::new_v4(),
            error: value,
        }
    }
}

const INTERNAL: &str = "Internal error";

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Generic { description } => write!(f, "{description}"),
            Self::Validation { description } => write!(f, "{description}"),
            Self::EntityFailIdNotFound { ident } => write!(f, "Record id= {ident} not found"),
            Self::WalletAlreadyExists => write!(f, "Wallet already exists"),
            Self::BalanceTooLow => write!(f, "Not enough balance"),
            Self::TaskPoolClosed => write!(f, "Task pool closed"),
            Self::AlreadySubmitted => write!(f, "Already submitted"),
            Self::SubmissionNotFound => write!(f, "Submission not found"),
            Self::RewardAlreadyCredited => write!(f, "Reward already credited"),
            Self::InvalidTransition { from, to } => {
                write!(f, "Invalid transition from {from} to {to}")
            }
            Self::Gateway { .. } => write!(f, "Payment gateway error"),
            Self::Serde { source } => write!(f, "Serde error - {source}"),
            Self::SurrealDb { .. } => write!(f, "{INTERNAL}"),
        }
    }
}

impl AppError {
    /// Gateway failures leave no local state behind, so the same call
    /// can be issued again from either initiation or verification.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Gateway { .. })
    }
}

// External Errors
impl From<serde_json::Error> for AppError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde {
            source: value.to_string(),
        }
    }
}

impl From<surrealdb::Error> for AppError {
    fn from(value: surrealdb::Error) -> Self {
        Self::SurrealDb {
            source: value.to_string(),
        }
    }
}

impl From<reqwest::Error> for AppError {
    fn from(value: reqwest::Error) -> Self {
        Self::Gateway {
            source: value.to_string(),
        }
    }
}

impl From<CtxError> for AppError {
    fn from(value: CtxError) -> Self {
        value.error
    }
}
