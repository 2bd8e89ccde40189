//! Executor policy for parallel bootstrap replicate loops (§5).
//!
//! Any parallel region inside the bootstrap engines is a pure map over
//! replicate index `b`; the executor decides how that map is scheduled.
//! Two implementations are required: a trivial in-thread executor (used by
//! deterministic tests and wherever reproducing exact interleaving matters)
//! and a `rayon`-backed thread-pool executor with a chunk-size hint.

pub trait Executor: Sync {
    fn parallel_for(&self, n: u32, chunk_hint: u32, body: impl Fn(u32) + Sync);
}

#[derive(Default, Clone, Copy)]
pub struct SingleThreadExecutor;

impl Executor for SingleThreadExecutor {
    fn parallel_for(&self, n: u32, _chunk_hint: u32, body: impl Fn(u32) + Sync) {
        for b in 0..n {
            body(b);
        }
    }
}

#[derive(Default, Clone, Copy)]
pub struct RayonExecutor;

impl Executor for RayonExecutor {
    fn parallel_for(&self, n: u32, chunk_hint: u32, body: impl Fn(u32) + Sync) {
        use rayon::prelude::*;

        if chunk_hint > 0 {
            (0..n)
                .into_par_iter()
                .with_min_len(chunk_hint as usize)
                .for_each(|b| body(b));
        } else {
            (0..n).into_par_iter().for_each(|b| body(b));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn single_thread_executor_visits_every_index() {
        let sum = AtomicU32::new(0);
        SingleThreadExecutor.parallel_for(10, 0, |b| {
            sum.fetch_add(b, Ordering::Relaxed);
        });
        assert_eq!(sum.load(Ordering::Relaxed), 45);
    }

    #[test]
    fn rayon_executor_visits_every_index() {
        let sum = AtomicU32::new(0);
        RayonExecutor.parallel_for(100, 4, |b| {
            sum.fetch_add(b, Ordering::Relaxed);
        });
        assert_eq!(sum.load(Ordering::Relaxed), (0..100u32).sum());
    }
}
