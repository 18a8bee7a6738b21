//! Data layer: SQLite persistence and models

mod database;
mod models;

pub use database::{Database, TweetFeedFilter, WATCH_HISTORY_CAP};
pub use models::*;

#[cfg(test)]
mod database_test;
