pub mod api;
pub mod auth;
pub mod cli;
pub mod config;
pub mod search;
pub mod session;
pub mod store;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use store::{NoteStore, StoreError};
