pub mod reward;
pub mod task;
pub mod wallet;
