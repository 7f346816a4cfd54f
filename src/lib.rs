pub mod commands;
pub mod config;
pub mod inventory;
pub mod orchestration;
pub mod planner;
pub mod shared;
pub mod tools;
