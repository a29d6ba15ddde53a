//! Common configuration shared across the GEMIP workspace.
//!
//! Every crate that formulates, solves, or drives a matching reads its knobs
//! from the [`Config`] defined here.

mod config;

pub use crate::config::*;
