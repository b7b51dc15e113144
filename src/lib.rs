pub mod config;
pub mod controller;
pub mod daemon;
pub mod model;
pub mod notifier;
pub mod output;
pub mod paths;
pub mod scheduler;
pub mod store;
pub mod tui;
pub mod validate;
pub mod watch;
