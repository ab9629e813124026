/*
[INPUT]:  repack-adapter transport + live channels
[OUTPUT]: Task, file and system stores, config loading, tracing setup
[POS]:    Crate root - module wiring
[UPDATE]: When public modules or exports change
*/

pub mod config;
pub mod console;
pub mod file_store;
pub mod format;
pub mod system_store;
pub mod task_store;
pub mod telemetry;
pub mod validate;

pub use config::ConsoleConfig;
pub use console::RepackConsole;
pub use file_store::FileStore;
pub use system_store::{STORAGE_CRITICAL_PERCENT, STORAGE_WARNING_PERCENT, SystemStore};
pub use task_store::{TaskSnapshot, TaskStore, TaskStoreOptions};
pub use telemetry::init_tracing;
