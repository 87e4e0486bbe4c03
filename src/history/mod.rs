pub mod data;
pub mod helpers;
pub mod endpoints;
