//! Matcher orchestration.
//!
//! A [`Matcher`] drives one formulation through
//! `Idle -> Formulating -> Solving -> Decoding` to a terminal
//! [`MatchOutcome`]. Matchers are independent units of work: a
//! [`MatchPool`] runs them on a rayon pool and hands back a [`MatchHandle`]
//! without blocking, and a [`MatchSession`] fans several formulations out
//! over one graph pair and merges their solutions into a
//! [`SolutionList`](gemip_formulation::SolutionList).

mod error;
mod matcher;
mod pool;
mod session;
mod state;

pub use crate::error::{DriverError, Failure, MatchError, Stage};
pub use crate::matcher::{MatchHandle, Matcher};
pub use crate::pool::MatchPool;
pub use crate::session::{MatchSession, SessionReport};
pub use crate::state::{MatchOutcome, MatcherState};
