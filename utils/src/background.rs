//! Background task execution.
//!
//! Components that must not run callbacks on their own thread (for example
//! while holding a lock) hand closures to a [`Spawner`]. Production code uses
//! a [`ThreadPool`]; tests inject a spawner that runs tasks inline.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

pub type Task = Box<dyn FnOnce() + Send + 'static>;

pub trait Spawner: Send + Sync {
    fn spawn(&self, task: Task);
}

/// Fixed-size pool of worker threads fed through a channel.
pub struct ThreadPool {
    sender: Mutex<Option<Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl ThreadPool {
    pub fn new(threads: usize, name: &str) -> Self {
        let (sender, receiver) = mpsc::channel::<Task>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(threads);
        for i in 0..threads.max(1) {
            let receiver = Arc::clone(&receiver);
            let spawned = std::thread::Builder::new()
                .name(format!("{name}-{i}"))
                .spawn(move || worker_loop(receiver));
            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => tracing::error!(error = %e, pool = name, "failed to spawn worker thread"),
            }
        }
        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }

    /// Finish queued tasks, then join every worker.
    pub fn stop(&self) {
        self.sender.lock().unwrap_or_else(|e| e.into_inner()).take();
        let workers = std::mem::take(&mut *self.workers.lock().unwrap_or_else(|e| e.into_inner()));
        for worker in workers {
            if worker.join().is_err() {
                tracing::error!("background worker panicked");
            }
        }
    }
}

fn worker_loop(receiver: Arc<Mutex<Receiver<Task>>>) {
    loop {
        let task = {
            let guard = receiver.lock().unwrap_or_else(|e| e.into_inner());
            guard.recv()
        };
        match task {
            Ok(task) => task(),
            Err(_) => break,
        }
    }
}

impl Spawner for ThreadPool {
    fn spawn(&self, task: Task) {
        let sender = self.sender.lock().unwrap_or_else(|e| e.into_inner());
        match sender.as_ref() {
            Some(sender) => {
                if sender.send(task).is_err() {
                    tracing::warn!("background pool closed, task dropped");
                }
            }
            None => tracing::warn!("background pool stopped, task dropped"),
        }
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.stop();
    }
}
