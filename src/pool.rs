use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Fixed set of worker threads pulling jobs off a shared queue.
///
/// At most `size` jobs run at once; the rest wait in the queue in no
/// particular completion order.
pub struct WorkerPool {
    tx: Option<Sender<Job>>,
    rx: Receiver<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> anyhow::Result<Self> {
        let size = size.max(1);
        let (tx, rx) = unbounded::<Job>();

        let mut workers = Vec::with_capacity(size);
        for i in 0..size {
            let rx = rx.clone();
            let handle = thread::Builder::new()
                .name(format!("image-loader-{}", i))
                .spawn(move || {
                    for job in rx.iter() {
                        if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                            log::error!("image loader job panicked");
                        }
                    }
                })?;
            workers.push(handle);
        }

        Ok(Self {
            tx: Some(tx),
            rx,
            workers,
        })
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Queue a job. Returns false once the pool has been shut down.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        match &self.tx {
            Some(tx) => tx.send(Box::new(job)).is_ok(),
            None => {
                log::warn!("job submitted after pool shutdown, dropping it");
                false
            }
        }
    }

    /// Drop every queued job that no worker has picked up yet.
    pub fn cancel_pending(&self) -> usize {
        self.rx.try_iter().count()
    }

    /// Stop accepting work, discard what has not started and block until
    /// running jobs finish. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.tx.is_none() && self.workers.is_empty() {
            return;
        }

        let discarded = self.cancel_pending();
        // Workers leave their loop once the queue is closed and empty.
        self.tx = None;
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                log::error!("image loader worker exited abnormally");
            }
        }
        log::info!("worker pool stopped ({} pending jobs discarded)", discarded);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.shutdown();
    }
}
