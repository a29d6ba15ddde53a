use gemip_common::PoolConfig;
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::DriverError;
use crate::matcher::{MatchHandle, Matcher};
use crate::state::MatchOutcome;

/// Runs matchers on a dedicated rayon pool.
///
/// Submission never blocks: the caller gets a [`MatchHandle`] back at once
/// and collects the outcome by polling, waiting or through a callback.
#[derive(Debug)]
pub struct MatchPool {
    pool: ThreadPool,
}

impl MatchPool {
    /// A pool with `config.threads` workers, rayon's default when zero.
    ///
    /// # Errors
    /// [`DriverError::Pool`] when the threads cannot be spawned.
    pub fn new(config: &PoolConfig) -> Result<Self, DriverError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(config.threads)
            .thread_name(|i| format!("gemip-matcher-{i}"))
            .build()?;
        tracing::debug!("matcher pool with {} threads", pool.current_num_threads());
        Ok(Self { pool })
    }

    /// Number of worker threads.
    #[must_use]
    pub fn threads(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Queues `matcher` and returns immediately.
    pub fn submit(&self, matcher: Matcher) -> MatchHandle {
        self.submit_with(matcher, |_| {})
    }

    /// Queues `matcher`; `callback` receives the outcome on the worker thread.
    pub fn submit_with<F>(&self, matcher: Matcher, callback: F) -> MatchHandle
    where
        F: FnOnce(MatchOutcome) + Send + 'static,
    {
        let handle = matcher.handle();
        tracing::trace!("queueing {}", matcher.kind());
        self.pool.spawn(move || callback(matcher.run()));
        handle
    }
}
