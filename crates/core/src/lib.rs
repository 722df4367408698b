pub mod actions_engine;
pub mod connection_manager;
pub mod favorites;
pub mod history;
pub mod json_store;
pub mod query_builder;
pub mod query_runner;
pub mod results;
pub mod safe_mode;
pub mod schema_cache;
pub mod settings;
pub mod sql_formatter;
pub mod sql_generator;
pub mod sql_validator;
pub mod templates;
