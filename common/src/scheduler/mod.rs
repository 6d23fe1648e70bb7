// Scheduler module for periodic polling tasks

pub mod delay;
pub mod engine;
pub mod task;

pub use delay::{DelayStrategy, FixedDelay, UniformJitter};
pub use engine::{action, Action, TaskFuture, TaskScheduler};
pub use task::ScraperTask;
