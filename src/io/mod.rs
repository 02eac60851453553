pub mod config_io;
pub mod document;
pub mod remote;
pub mod vault;
pub mod watcher;
