pub mod reward_service;
pub mod task_service;
pub mod wallet_service;
