use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::task::JoinHandle;
use tracing::warn;

/// Exit status used when the user stops a run
pub const INTERRUPTED_EXIT_CODE: u8 = 130;

/// Shared cancellation flag, checked between entries and batches.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Trigger on the first Ctrl+C; exit on the second.
    ///
    /// An in-flight request is never cancelled by the first signal, so a hung
    /// provider call can only be escaped with the second one.
    pub fn listen_for_ctrl_c(&self) -> JoinHandle<()> {
        let interrupt = self.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            warn!("Interrupt received, finishing the current request and saving progress (press Ctrl+C again to quit now)");
            interrupt.trigger();

            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(i32::from(INTERRUPTED_EXIT_CODE));
            }
        })
    }
}
