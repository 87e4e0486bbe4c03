pub mod data;
pub mod helpers;
pub mod binding;
pub mod commands;
pub mod endpoints;
