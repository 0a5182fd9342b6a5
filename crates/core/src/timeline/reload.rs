use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use crate::Result;

/// Coalescing "reload requested" flag consumed once per frame.
///
/// Any number of [`ReloadHandle`]s may set it from signal handlers, key
/// callbacks or other threads; setting never blocks or allocates. Several
/// requests between two consumptions collapse into one reload.
#[derive(Debug, Default)]
pub struct ReloadTrigger {
    flag: Arc<AtomicBool>,
}

impl ReloadTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Producer handle that sets this trigger.
    pub fn handle(&self) -> ReloadHandle {
        ReloadHandle {
            flag: self.flag.clone(),
        }
    }

    /// Test-and-clear: true if at least one reload was requested since the
    /// previous call.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Cloneable producer side of a [`ReloadTrigger`].
#[derive(Debug, Clone)]
pub struct ReloadHandle {
    flag: Arc<AtomicBool>,
}

impl ReloadHandle {
    pub fn request(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Sets the trigger whenever the process receives `signal`. The handler
    /// only performs an atomic store.
    #[cfg(unix)]
    pub fn register_signal(&self, signal: i32) -> Result<signal_hook::SigId> {
        Ok(signal_hook::flag::register(signal, self.flag.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_clears_the_flag() {
        let trigger = ReloadTrigger::new();
        assert!(!trigger.take());

        trigger.handle().request();
        assert!(trigger.take());
        assert!(!trigger.take());
    }

    #[test]
    fn requests_from_several_producers_coalesce() {
        let trigger = ReloadTrigger::new();
        let key = trigger.handle();
        let signal = trigger.handle();

        key.request();
        signal.request();
        key.request();

        assert!(trigger.take());
        assert!(!trigger.take());
    }

    #[test]
    fn request_from_another_thread_is_observed() {
        let trigger = ReloadTrigger::new();
        let handle = trigger.handle();
        std::thread::spawn(move || handle.request()).join().unwrap();

        assert!(trigger.is_pending());
        assert!(trigger.take());
    }

    #[cfg(unix)]
    #[test]
    fn signal_sets_the_flag() {
        let trigger = ReloadTrigger::new();
        let id = trigger
            .handle()
            .register_signal(signal_hook::consts::SIGUSR2)
            .unwrap();

        signal_hook::low_level::raise(signal_hook::consts::SIGUSR2).unwrap();
        assert!(trigger.take());
        signal_hook::low_level::unregister(id);
    }
}
