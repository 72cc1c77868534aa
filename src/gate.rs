use std::io;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

/// Runs one blocking job on a dedicated worker thread, one run per request.
///
/// Only [`request_start`](Self::request_start) raises the signal and only the
/// worker lowers it, so [`is_done`](Self::is_done) can be polled from a UI
/// loop without ever blocking on the job itself.
pub struct CompletionGate {
    signal: Arc<Signal>,
    worker: JoinHandle<()>,
}

#[derive(Default)]
struct Signal {
    busy: Mutex<bool>,
    wake: Condvar,
}

impl Signal {
    fn lock(&self) -> MutexGuard<'_, bool> {
        self.busy.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl CompletionGate {
    pub fn spawn<F>(name: &str, mut job: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let signal = Arc::new(Signal::default());
        let worker_signal = Arc::clone(&signal);
        let worker = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                loop {
                    {
                        let mut busy = worker_signal.lock();
                        while !*busy {
                            busy = worker_signal
                                .wake
                                .wait(busy)
                                .unwrap_or_else(|poisoned| poisoned.into_inner());
                        }
                    }
                    job();
                    *worker_signal.lock() = false;
                }
            })?;
        Ok(Self { signal, worker })
    }

    /// Asks the worker to run the job. A request made while a run is still
    /// in flight is absorbed by that run.
    pub fn request_start(&self) {
        let mut busy = self.signal.lock();
        if *busy {
            log::debug!("completion gate already running; request absorbed");
            return;
        }
        *busy = true;
        self.signal.wake.notify_one();
    }

    pub fn is_done(&self) -> bool {
        !*self.signal.lock()
    }

    /// False once the worker has exited. That only happens if the job panicked,
    /// and such a gate stays busy forever.
    pub fn is_alive(&self) -> bool {
        !self.worker.is_finished()
    }
}
