//! API Controller modules

pub mod admin;
pub mod index;
pub mod supply;
