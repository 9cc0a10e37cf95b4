// THEORY:
// The `partition` module is the single place where per-pixel work is divided
// between threads. Both the motion estimator and every effect run through it,
// so the partitioning contract is defined exactly once:
//
// - `T` is the platform's hardware parallelism (never less than 1).
// - The first `T - 1` ranges hold `floor(total / T)` pixels each and run on the
//   pool's worker threads.
// - The last range starts where they stop and runs to `total`; it absorbs the
//   remainder and always runs on the calling thread.
// - `scatter` returns only after every range has finished (a full fork-join
//   barrier). Nothing is pipelined across phases.
//
// The pool itself is persistent: it is built once per pipeline and reused for
// every phase of every frame, so no thread is created on the hot path.

use crate::error::GlitchError;
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::ops::Range;
use tracing::debug;

/// A contiguous run of pixel indices owned by exactly one thread for one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Partition {
    /// Position of this range in the phase; the caller's range is always last.
    pub index: usize,
    pub start: usize,
    pub end: usize,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }
}

/// Hardware parallelism as reported by the platform, treating 0 as 1.
pub fn available_parallelism() -> usize {
    num_cpus::get().max(1)
}

/// Splits `[0, total)` into `threads` contiguous ranges.
pub fn partition(total: usize, threads: usize) -> Vec<Partition> {
    let threads = threads.max(1);
    let per_thread = total / threads;

    let mut parts: Vec<Partition> = (0..threads - 1)
        .map(|index| Partition {
            index,
            start: index * per_thread,
            end: (index + 1) * per_thread,
        })
        .collect();

    parts.push(Partition {
        index: threads - 1,
        start: (threads - 1) * per_thread,
        end: total,
    });

    parts
}

/// Cuts `buffer` into one disjoint chunk per partition, `stride` bytes per item.
fn split_by_partition<'a>(parts: &[Partition], buffer: &'a mut [u8], stride: usize) -> Vec<&'a mut [u8]> {
    let mut rest = buffer;
    let mut chunks = Vec::with_capacity(parts.len());
    for part in parts {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(part.len() * stride);
        chunks.push(head);
        rest = tail;
    }
    chunks
}

/// A fixed-size fork-join pool: `threads - 1` workers plus the calling thread.
pub struct WorkerPool {
    threads: usize,
    pool: Option<ThreadPool>,
}

impl WorkerPool {
    pub fn new(threads: usize) -> Result<Self, GlitchError> {
        let threads = threads.max(1);
        let pool = if threads > 1 {
            Some(
                ThreadPoolBuilder::new()
                    .num_threads(threads - 1)
                    .thread_name(|i| format!("glitch-worker-{i}"))
                    .build()?,
            )
        } else {
            None
        };
        debug!(threads, "worker pool ready");
        Ok(Self { threads, pool })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Runs `job` once per partition of `[0, total)`, handing each call the
    /// slice of `out` that belongs to its range (`stride` bytes per item).
    ///
    /// Blocks until every range has completed.
    pub fn scatter<F>(&self, total: usize, out: &mut [u8], stride: usize, job: F)
    where
        F: Fn(Partition, &mut [u8]) + Sync,
    {
        assert_eq!(out.len(), total * stride, "output does not cover the partitioned range");

        let parts = partition(total, self.threads);
        let mut work: Vec<_> = parts
            .iter()
            .copied()
            .zip(split_by_partition(&parts, out, stride))
            .collect();

        let Some((caller_part, caller_chunk)) = work.pop() else {
            return;
        };

        match &self.pool {
            Some(pool) => pool.in_place_scope(|scope| {
                let job = &job;
                for (part, chunk) in work {
                    scope.spawn(move |_| job(part, chunk));
                }
                job(caller_part, caller_chunk);
            }),
            None => {
                for (part, chunk) in work {
                    job(part, chunk);
                }
                job(caller_part, caller_chunk);
            }
        }
    }

    /// Like `scatter`, but each range owns matching chunks of two outputs with
    /// their own strides (e.g. an RGB buffer and a one-byte mask).
    pub fn scatter2<F>(
        &self,
        total: usize,
        first: &mut [u8],
        first_stride: usize,
        second: &mut [u8],
        second_stride: usize,
        job: F,
    ) where
        F: Fn(Partition, &mut [u8], &mut [u8]) + Sync,
    {
        assert_eq!(first.len(), total * first_stride, "first output does not cover the range");
        assert_eq!(second.len(), total * second_stride, "second output does not cover the range");

        let parts = partition(total, self.threads);
        let mut work: Vec<_> = parts
            .iter()
            .copied()
            .zip(split_by_partition(&parts, first, first_stride))
            .zip(split_by_partition(&parts, second, second_stride))
            .map(|((part, a), b)| (part, a, b))
            .collect();

        let Some((caller_part, caller_a, caller_b)) = work.pop() else {
            return;
        };

        match &self.pool {
            Some(pool) => pool.in_place_scope(|scope| {
                let job = &job;
                for (part, a, b) in work {
                    scope.spawn(move |_| job(part, a, b));
                }
                job(caller_part, caller_a, caller_b);
            }),
            None => {
                for (part, a, b) in work {
                    job(part, a, b);
                }
                job(caller_part, caller_a, caller_b);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Mutex;
    use std::thread;

    #[test]
    fn remainder_goes_to_the_last_range() {
        let parts = partition(10, 4);

        assert_eq!(parts.len(), 4);
        assert_eq!(parts[0].range(), 0..2);
        assert_eq!(parts[1].range(), 2..4);
        assert_eq!(parts[2].range(), 4..6);
        assert_eq!(parts[3].range(), 6..10);
    }

    #[test]
    fn single_thread_gets_everything() {
        assert_eq!(partition(17, 1), vec![Partition { index: 0, start: 0, end: 17 }]);
        assert_eq!(partition(17, 0), vec![Partition { index: 0, start: 0, end: 17 }]);
    }

    #[test]
    fn more_threads_than_items_leaves_worker_ranges_empty() {
        let parts = partition(3, 8);

        assert!(parts[..7].iter().all(Partition::is_empty));
        assert_eq!(parts[7].range(), 0..3);
    }

    #[test]
    fn scatter_writes_every_item_exactly_once() {
        let pool = WorkerPool::new(4).expect("pool");
        let total = 1001;
        let mut out = vec![0u8; total * 3];

        pool.scatter(total, &mut out, 3, |part, chunk| {
            assert_eq!(chunk.len(), part.len() * 3);
            for byte in chunk.iter_mut() {
                *byte += 1;
            }
        });

        assert!(out.iter().all(|&b| b == 1));
    }

    #[test]
    fn last_range_runs_on_the_calling_thread() {
        let pool = WorkerPool::new(3).expect("pool");
        let caller = thread::current().id();
        let seen = Mutex::new(Vec::new());
        let mut out = vec![0u8; 30];

        pool.scatter(30, &mut out, 1, |part, _| {
            seen.lock().unwrap().push((part.index, thread::current().id()));
        });

        let seen = seen.into_inner().unwrap();
        assert_eq!(seen.len(), 3);
        let (_, last_thread) = seen.iter().find(|(index, _)| *index == 2).expect("caller range ran");
        assert_eq!(*last_thread, caller);
    }

    #[test]
    fn scatter2_keeps_both_outputs_aligned() {
        let pool = WorkerPool::new(3).expect("pool");
        let total = 50;
        let mut rgb = vec![0u8; total * 3];
        let mut mask = vec![0u8; total];

        pool.scatter2(total, &mut rgb, 3, &mut mask, 1, |part, rgb, mask| {
            assert_eq!(rgb.len(), mask.len() * 3);
            for (offset, (px, m)) in rgb.chunks_exact_mut(3).zip(mask.iter_mut()).enumerate() {
                let value = (part.start + offset) as u8;
                px.fill(value);
                *m = value;
            }
        });

        for index in 0..total {
            assert_eq!(rgb[index * 3], index as u8);
            assert_eq!(mask[index], index as u8);
        }
    }

    proptest! {
        #[test]
        fn partitions_cover_the_range_in_order(total in 0usize..5000, threads in 0usize..64) {
            let parts = partition(total, threads);

            prop_assert_eq!(parts.len(), threads.max(1));
            prop_assert_eq!(parts[0].start, 0);
            prop_assert_eq!(parts.last().unwrap().end, total);
            for pair in parts.windows(2) {
                prop_assert_eq!(pair[0].end, pair[1].start);
                prop_assert_eq!(pair[0].len(), total / threads.max(1));
            }
            for (i, part) in parts.iter().enumerate() {
                prop_assert_eq!(part.index, i);
            }
        }
    }
}
