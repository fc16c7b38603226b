pub mod election;
pub mod gate;
pub mod watcher;
