use crate::error::SamplerError;

use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::sync::Arc;

/// Runs independent jobs either on the calling thread or on a shared thread pool
///
/// Results are always returned in input order.
#[derive(Clone, Debug, Default)]
pub enum Executor {
    #[default]
    Sequential,
    Pool(Arc<ThreadPool>),
}

impl Executor {
    pub fn sequential() -> Self {
        Self::Sequential
    }

    /// Dedicated pool of `threads` workers, `0` means one per logical CPU
    pub fn thread_pool(threads: usize) -> Result<Self, SamplerError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .build()
            .map_err(|err| SamplerError::ThreadPool(err.to_string()))?;
        Ok(Self::Pool(Arc::new(pool)))
    }

    pub fn threads(&self) -> usize {
        match self {
            Self::Sequential => 1,
            Self::Pool(pool) => pool.current_num_threads(),
        }
    }

    pub fn map<T, R, F>(&self, items: Vec<T>, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> R + Send + Sync,
    {
        match self {
            Self::Sequential => items.into_iter().map(f).collect(),
            Self::Pool(pool) => pool.install(|| items.into_par_iter().map(f).collect()),
        }
    }

    /// Like [Executor::map], but every worker gets its own state created by `init`
    pub fn map_init<T, R, S, I, F>(&self, items: Vec<T>, init: I, f: F) -> Vec<R>
    where
        T: Send,
        R: Send,
        I: Fn() -> S + Send + Sync,
        F: Fn(&mut S, T) -> R + Send + Sync,
    {
        match self {
            Self::Sequential => {
                let mut state = init();
                items.into_iter().map(|item| f(&mut state, item)).collect()
            }
            Self::Pool(pool) => {
                pool.install(|| items.into_par_iter().map_init(&init, &f).collect())
            }
        }
    }
}
