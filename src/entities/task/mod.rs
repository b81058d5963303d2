pub mod task_pool_entity;
