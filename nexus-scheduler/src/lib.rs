//! # nexus-scheduler
//!
//! The cron-driven fetch/submit task runner bound to bank accounts
//! (spec.md §4.5): cron-spec parsing plus a cooperative polling loop that
//! dispatches due tasks through a caller-supplied [`TaskHandler`].

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod cron;
pub mod error;
pub mod runner;

pub use cron::CronSpec;
pub use error::{Error, Result};
pub use runner::{Scheduler, TaskHandler};
