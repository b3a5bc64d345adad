//! Domain models for the order engine

pub mod pair;
pub mod order;
pub mod fill;
pub mod market;
pub mod escrow;
