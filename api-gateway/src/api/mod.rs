//! API route handlers

pub mod escrow;
pub mod health;
pub mod market;
pub mod order;
pub mod response;
pub mod trigger;
