use parking_lot::{Condvar, Mutex};

/// One-shot readiness gate.
///
/// Starts closed; [`open`](Self::open) flips it exactly once and wakes
/// every waiter. Session-start operations (DESCRIBE/SETUP) block on
/// [`wait`](Self::wait) until startup has produced a servable stream,
/// so no client can negotiate against a half-initialized server.
#[derive(Default)]
pub struct ReadyGate {
    open: Mutex<bool>,
    cond: Condvar,
}

impl ReadyGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the gate and wake all waiters. Idempotent.
    pub fn open(&self) {
        let mut open = self.open.lock();
        if !*open {
            *open = true;
            self.cond.notify_all();
            tracing::debug!("readiness gate opened");
        }
    }

    /// Block until the gate is open. Returns immediately once opened.
    pub fn wait(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.cond.wait(&mut open);
        }
    }

    pub fn is_open(&self) -> bool {
        *self.open.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn starts_closed_and_open_is_idempotent() {
        let gate = ReadyGate::new();
        assert!(!gate.is_open());
        gate.open();
        gate.open();
        assert!(gate.is_open());
        gate.wait();
    }

    #[test]
    fn waiters_block_until_opened() {
        let gate = Arc::new(ReadyGate::new());
        let (tx, rx) = mpsc::channel();

        let g = gate.clone();
        thread::spawn(move || {
            g.wait();
            tx.send(()).ok();
        });

        assert!(rx.recv_timeout(Duration::from_millis(100)).is_err());
        gate.open();
        assert!(rx.recv_timeout(Duration::from_secs(2)).is_ok());
    }
}
