// Library root: re-exports all modules so integration tests and the `lms`
// binary share one public API.

pub mod app;
pub mod config;
pub mod db;
pub mod odds_client;
pub mod sources;
