pub mod agent;
pub mod commands;
pub mod error;
pub mod health;
pub mod hooks;
pub mod model;
pub mod output;
pub mod store;
