//! Foundation module - Core utilities and types
//!
//! - Math types shared by the scene update
//! - Frame clock
//! - Logging setup

pub mod logging;
pub mod math;
pub mod time;
