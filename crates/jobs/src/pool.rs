use anyhow::{Context, Result};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;
use std::thread;

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of named worker threads fed from one channel
pub struct ThreadPool {
    tx: Mutex<Option<Sender<Job>>>,
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    size: usize,
}

impl ThreadPool {
    pub fn new(name: &str, size: usize) -> Result<Self> {
        let size = size.max(1);
        let (tx, rx) = unbounded::<Job>();
        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || {
                    while let Ok(job) = rx.recv() {
                        job();
                    }
                    tracing::trace!("worker stopped");
                })
                .with_context(|| format!("spawning {name} worker {i}"))?;
            workers.push(handle);
        }
        Ok(Self {
            tx: Mutex::new(Some(tx)),
            workers: Mutex::new(workers),
            size,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue a job; returns it back when the pool has shut down
    pub fn execute(&self, job: Job) -> Result<(), Job> {
        match self.tx.lock().as_ref() {
            Some(tx) => tx.send(job).map_err(|e| e.into_inner()),
            None => Err(job),
        }
    }

    /// Stop accepting jobs, let queued ones finish and join the workers
    pub fn shutdown(&self) {
        self.tx.lock().take();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        let current = thread::current().id();
        for handle in workers {
            // the last gate handle can be dropped from inside one of our jobs
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                tracing::warn!("worker panicked");
            }
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Where the jobs of one gate domain run
pub enum Executor {
    /// On the submitting thread, before `spawn` returns
    Inline,
    Pool(ThreadPool),
}

impl Executor {
    pub fn spawn(&self, job: Job) {
        match self {
            Executor::Inline => job(),
            Executor::Pool(pool) => {
                if let Err(job) = pool.execute(job) {
                    tracing::warn!("pool is shut down, running job inline");
                    job();
                }
            }
        }
    }

    pub fn parallelism(&self) -> usize {
        match self {
            Executor::Inline => 1,
            Executor::Pool(pool) => pool.size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn shutdown_drains_queued_jobs() {
        let pool = ThreadPool::new("test", 2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..16 {
            let counter = counter.clone();
            pool.execute(Box::new(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            }))
            .ok()
            .unwrap();
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::SeqCst), 16);
        assert!(pool.execute(Box::new(|| {})).is_err());
    }
}
