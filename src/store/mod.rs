pub mod files;
pub mod inbox;
pub mod lock;
pub mod paths;
pub mod repo;
pub mod runtime;
pub mod tasks;
pub mod team;
