pub mod runner;
pub mod settings;
pub mod tasks;

pub use runner::WorkerLoop;
pub use settings::WorkerSettings;
pub use tasks::{build_registry, CheckSingleCardArgs, TaskContext};
