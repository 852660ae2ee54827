pub mod inbox;
pub mod status;
pub mod task;
pub mod team;
