//! Fixed-size worker pool for CPU-bound inference.
//!
//! Forecast computation is synchronous and CPU-heavy; dispatching it
//! here keeps the calling layer free to accept further requests while
//! several inferences run in parallel. Workers drain a shared channel
//! and exit when the pool is dropped.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

type Job = Box<dyn FnOnce() + Send + 'static>;

pub struct WorkerPool {
    tx: Mutex<Option<mpsc::Sender<Job>>>,
    handles: Vec<thread::JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        let (tx, rx) = mpsc::channel::<Job>();
        let shared_rx = Arc::new(Mutex::new(rx));

        let mut handles = Vec::with_capacity(size);
        for i in 0..size {
            let rx = Arc::clone(&shared_rx);
            let handle = thread::Builder::new()
                .name(format!("forecast-worker-{i}"))
                .spawn(move || loop {
                    let job = {
                        let guard = rx.lock();
                        guard.recv()
                    };
                    match job {
                        Ok(job) => job(),
                        Err(_) => break,
                    }
                })
                .expect("failed to spawn inference worker");
            handles.push(handle);
        }

        Self {
            tx: Mutex::new(Some(tx)),
            handles,
        }
    }

    /// Run a job on a worker thread.
    pub fn submit<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(tx) = self.tx.lock().as_ref() {
            let _ = tx.send(Box::new(job));
        }
    }

    /// Run a job on a worker and block for its value.
    pub fn run<F, T>(&self, job: F) -> Option<T>
    where
        F: FnOnce() -> T + Send + 'static,
        T: Send + 'static,
    {
        let (tx, rx) = mpsc::channel();
        self.submit(move || {
            let _ = tx.send(job());
        });
        rx.recv().ok()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the channel unblocks every worker's recv.
        self.tx.lock().take();
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
    }
}
