pub mod data;
pub mod helpers;
pub mod timing;
pub mod completion;
pub mod commands;
pub mod endpoints;
