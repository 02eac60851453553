pub mod add_task;
pub mod completion;
pub mod format;
pub mod hierarchy;
pub mod mirror;
