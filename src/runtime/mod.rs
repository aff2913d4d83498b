pub mod task;
pub mod storage;
pub mod memory;
pub mod redis_storage;
pub mod lock;
