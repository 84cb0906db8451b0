use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use parking_lot::{Condvar, Mutex};
use thiserror::Error;

type CloseJob = Box<dyn FnOnce() -> io::Result<()> + Send + 'static>;

#[derive(Debug, Error, Clone)]
pub enum CloseError {
    #[error("deferred close failed: {0}")]
    CloseFailed(Arc<io::Error>),
    #[error("close pool is shut down")]
    ShutDown,
}

/// Closes output streams off the caller's thread, on a small fixed pool.
///
/// `submit` hands the close to an idle worker; when every worker is busy
/// the close runs synchronously on the caller, which is the pool's
/// backpressure valve. The first close failure is latched: it fails the
/// next `submit` (so a caller cannot keep operating against a resource
/// whose close already failed) and is reported again by `sync`, which
/// blocks until every outstanding close has completed.
pub struct ClosePool {
    sender: Option<Sender<CloseJob>>,
    workers: Vec<thread::JoinHandle<()>>,
    shared: Arc<CloserShared>,
}

struct CloserShared {
    outstanding: Mutex<u64>,
    all_done: Condvar,
    first_error: Mutex<Option<CloseError>>,
}

impl CloserShared {
    /// Run-to-completion bookkeeping for one close, wherever it executed.
    fn finish(&self, result: io::Result<()>) -> Result<(), CloseError> {
        let outcome = match result {
            Ok(()) => Ok(()),
            Err(err) => {
                let err = CloseError::CloseFailed(Arc::new(err));
                let mut slot = self.first_error.lock();
                if slot.is_none() {
                    *slot = Some(err.clone());
                }
                Err(err)
            }
        };
        let mut outstanding = self.outstanding.lock();
        *outstanding = outstanding.saturating_sub(1);
        if *outstanding == 0 {
            self.all_done.notify_all();
        }
        outcome
    }
}

impl ClosePool {
    pub fn new(workers: usize) -> Self {
        let workers = workers.max(1);
        let shared = Arc::new(CloserShared {
            outstanding: Mutex::new(0),
            all_done: Condvar::new(),
            first_error: Mutex::new(None),
        });

        // Rendezvous channel: a send succeeds only when a worker is idle
        // and ready to take the job.
        let (sender, receiver) = crossbeam_channel::bounded::<CloseJob>(0);
        let (ready_tx, ready_rx) = crossbeam_channel::bounded::<()>(workers);
        let handles = (0..workers)
            .map(|_| {
                let receiver: Receiver<CloseJob> = receiver.clone();
                let shared = Arc::clone(&shared);
                let ready_tx = ready_tx.clone();
                thread::spawn(move || {
                    let _ = ready_tx.send(());
                    for job in receiver.iter() {
                        let _ = shared.finish(job());
                    }
                })
            })
            .collect();

        // Hand the pool out only once every worker is parked at the
        // channel; otherwise early submits would spill to the caller.
        for _ in 0..workers {
            let _ = ready_rx.recv();
        }

        Self {
            sender: Some(sender),
            workers: handles,
            shared,
        }
    }

    /// Queue `close` for asynchronous execution, or run it on the caller
    /// when no worker is idle. Fails immediately, without running the
    /// close, if an earlier close already failed.
    pub fn submit<F>(&self, close: F) -> Result<(), CloseError>
    where
        F: FnOnce() -> io::Result<()> + Send + 'static,
    {
        if let Some(err) = self.shared.first_error.lock().clone() {
            return Err(err);
        }
        let Some(sender) = &self.sender else {
            return Err(CloseError::ShutDown);
        };

        *self.shared.outstanding.lock() += 1;
        match sender.try_send(Box::new(close)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(job)) | Err(TrySendError::Disconnected(job)) => {
                // Caller-runs backpressure: execute here, report directly.
                self.shared.finish(job())
            }
        }
    }

    /// Block until every outstanding close has completed, then report the
    /// first failure the pool observed, if any.
    pub fn sync(&self) -> Result<(), CloseError> {
        let mut outstanding = self.shared.outstanding.lock();
        while *outstanding > 0 {
            self.shared.all_done.wait(&mut outstanding);
        }
        drop(outstanding);

        match self.shared.first_error.lock().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl Drop for ClosePool {
    fn drop(&mut self) {
        // Dropping the sender ends each worker's receive loop.
        self.sender.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::time::Duration;

    use super::*;

    #[test]
    fn closes_run_and_sync_joins_them() {
        let pool = ClosePool::new(2);
        let executed = Arc::new(AtomicU64::new(0));
        for _ in 0..8 {
            let executed = Arc::clone(&executed);
            pool.submit(move || {
                executed.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .unwrap();
        }
        pool.sync().unwrap();
        assert_eq!(executed.load(Ordering::SeqCst), 8);
    }

    /// Occupy one pool worker until the returned sender fires. Retries if
    /// the gate job spills to the caller instead of a worker.
    fn occupy_worker(pool: &ClosePool) -> Sender<()> {
        let caller = std::thread::current().id();
        loop {
            let (gate_tx, gate_rx) = crossbeam_channel::bounded::<()>(0);
            let (ran_on_tx, ran_on_rx) = crossbeam_channel::bounded(1);
            pool.submit(move || {
                let here = std::thread::current().id();
                let _ = ran_on_tx.send(here);
                if here != caller {
                    let _ = gate_rx.recv_timeout(Duration::from_secs(10));
                }
                Ok(())
            })
            .unwrap();
            let ran_on = ran_on_rx
                .recv_timeout(Duration::from_secs(10))
                .expect("gate job never ran");
            if ran_on != caller {
                return gate_tx;
            }
        }
    }

    #[test]
    fn overflow_runs_on_the_caller() {
        let pool = ClosePool::new(1);
        let gate = occupy_worker(&pool);

        let caller = std::thread::current().id();
        let ran_on = Arc::new(Mutex::new(None));
        {
            let ran_on = Arc::clone(&ran_on);
            pool.submit(move || {
                *ran_on.lock() = Some(std::thread::current().id());
                Ok(())
            })
            .unwrap();
        }
        assert_eq!(*ran_on.lock(), Some(caller));

        gate.send(()).unwrap();
        pool.sync().unwrap();
    }

    #[test]
    fn first_error_fails_the_next_submit_and_sync() {
        let pool = ClosePool::new(1);
        // The failure is latched whether a worker or the caller ran it.
        let _ = pool.submit(|| Err(io::Error::new(io::ErrorKind::Other, "disk gone")));
        pool.sync().unwrap_err();

        // The latched failure surfaces on the next attempted operation...
        let later = pool.submit(|| Ok(()));
        assert!(matches!(later, Err(CloseError::CloseFailed(_))));

        // ...and again on the join point.
        assert!(matches!(pool.sync(), Err(CloseError::CloseFailed(_))));
    }

    #[test]
    fn caller_run_failure_is_reported_directly_and_latched() {
        let pool = ClosePool::new(1);
        let gate = occupy_worker(&pool);

        let direct = pool.submit(|| Err(io::Error::new(io::ErrorKind::Other, "bad fd")));
        assert!(matches!(direct, Err(CloseError::CloseFailed(_))));

        gate.send(()).unwrap();
        assert!(matches!(pool.sync(), Err(CloseError::CloseFailed(_))));
    }

    #[test]
    fn closes_flush_real_files() {
        let dir = tempfile::tempdir().unwrap();
        let pool = ClosePool::new(2);
        let path = dir.path().join("part-00000");

        let mut file = std::io::BufWriter::new(std::fs::File::create(&path).unwrap());
        file.write_all(b"segment data\n").unwrap();
        pool.submit(move || {
            file.flush()?;
            file.into_inner()?.sync_all()
        })
        .unwrap();

        pool.sync().unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"segment data\n");
    }
}
