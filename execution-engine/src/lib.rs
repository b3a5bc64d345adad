//! Execution engine: condition evaluation and trigger-driven order cycles
//!
//! The engine is reactive. It holds no timers of its own; every pass over a
//! pair's order book happens because an external trigger arrived. Each pass
//! reads one oracle quote, evaluates the pair's eligible orders against it,
//! and settles the ones whose conditions hold.

pub mod engine;
pub mod evaluator;
pub mod events;

pub use engine::{CycleReport, EngineConfig, ExecutionEngine, LimitFillPolicy, OrderSkip};
pub use evaluator::{evaluate, Decision, EvaluatorConfig, SkipReason};
pub use events::FillFeed;
