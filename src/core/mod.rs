//! Core types and utilities shared by every subsystem

pub mod types;
pub mod error;
pub mod logging;
pub mod time;
pub mod observer;

pub use types::*;
pub use error::Error;
pub use observer::{Notifier, Setting, Subscription};
pub use time::{Clock, ManualClock, SystemClock};
