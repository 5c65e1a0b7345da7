//! Subcommand implementations, one module per screen.

pub mod auth;
pub mod cart;
pub mod count;
pub mod inventory;
pub mod movements;
pub mod notifications;
pub mod orders;
pub mod requests;
pub mod spares;
pub mod warranties;
