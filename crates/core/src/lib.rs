pub mod config;
pub mod connection_manager;
pub mod fault;
pub mod profiles;
pub mod query_history;
pub mod query_runner;
pub mod result_set;
pub mod schema_cache;
pub mod schema_tree;
pub mod secrets;
pub mod session;
pub mod sorting;
pub mod sql_generator;
