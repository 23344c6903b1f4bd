#![doc = include_str!("../README.md")]

mod config;
mod error;
mod pool;
mod state;
mod task;
mod worker;


pub use crate::config::*;
pub use crate::error::*;
pub use crate::pool::{Pool, PoolStats};
pub use crate::task::{TaskHandle, TaskId};
