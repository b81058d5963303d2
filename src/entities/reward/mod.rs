pub mod reward_entity;
