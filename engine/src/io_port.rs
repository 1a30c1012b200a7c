//! Async I/O port: a submission/completion queue backed by one dedicated
//! thread, so host and peer ticks never block on disk (spec.md §5).
//! Requests are tagged with an opaque `echo` id chosen by the caller;
//! completions surface it unchanged so the caller can match them back up.

use std::sync::mpsc::{channel, Receiver, Sender};
use std::thread::JoinHandle;
use std::time::Duration;

/// How long the dedicated thread sleeps between scans when its queue is
/// empty (spec.md §5: "the dedicated I/O thread sleeps ~100 µs between
/// work scans").
const IDLE_SLEEP: Duration = Duration::from_micros(100);

struct Job<Req, Resp> {
    echo: u64,
    req: Req,
    worker: Box<dyn FnOnce(Req) -> Resp + Send>,
}

pub struct IoPort<Req, Resp> {
    tx: Sender<Job<Req, Resp>>,
    completions: Receiver<(u64, Resp)>,
    handle: Option<JoinHandle<()>>,
}

impl<Req: Send + 'static, Resp: Send + 'static> IoPort<Req, Resp> {
    pub fn spawn() -> Self {
        let (job_tx, job_rx) = channel::<Job<Req, Resp>>();
        let (done_tx, done_rx) = channel();
        let handle = std::thread::spawn(move || loop {
            match job_rx.try_recv() {
                Ok(job) => {
                    let resp = (job.worker)(job.req);
                    if done_tx.send((job.echo, resp)).is_err() {
                        return;
                    }
                }
                Err(std::sync::mpsc::TryRecvError::Empty) => {
                    std::thread::sleep(IDLE_SLEEP);
                }
                Err(std::sync::mpsc::TryRecvError::Disconnected) => return,
            }
        });
        Self {
            tx: job_tx,
            completions: done_rx,
            handle: Some(handle),
        }
    }

    /// Submits `req` tagged with `echo`, to be transformed by `worker`
    /// on the I/O thread. Never blocks the caller.
    pub fn submit(&self, echo: u64, req: Req, worker: impl FnOnce(Req) -> Resp + Send + 'static) {
        let _ = self.tx.send(Job {
            echo,
            req,
            worker: Box::new(worker),
        });
    }

    /// Drains every completion currently available without blocking.
    pub fn poll_completions(&self) -> Vec<(u64, Resp)> {
        self.completions.try_iter().collect()
    }
}

impl<Req, Resp> Drop for IoPort<Req, Resp> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.join().ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn submit_and_poll_roundtrip() {
        let port: IoPort<u32, u32> = IoPort::spawn();
        port.submit(7, 5, |n| n * 2);
        let mut completions = Vec::new();
        for _ in 0..50 {
            completions.extend(port.poll_completions());
            if !completions.is_empty() {
                break;
            }
            sleep(Duration::from_millis(1));
        }
        assert_eq!(completions, vec![(7, 10)]);
    }
}
