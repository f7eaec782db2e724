use std::{error::Error, fmt::Display, sync::Arc};

use tokio::sync::watch;

/// Whether the user asked to stop, e.g. with Ctrl-C.
#[derive(Clone, Debug)]
pub struct InterruptState {
    interrupted: Arc<watch::Sender<bool>>,
}

#[derive(Clone, Debug)]
pub struct InterruptedError {}
impl Display for InterruptedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "interrupted")
    }
}
impl Error for InterruptedError {}

impl InterruptState {
    pub fn new() -> Self {
        Self {
            interrupted: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn set_interrupted(&self) {
        self.interrupted.send_replace(true);
    }

    pub fn is_interrupted(&self) -> bool {
        *self.interrupted.borrow()
    }

    pub fn check_interrupted(&self) -> anyhow::Result<()> {
        if self.is_interrupted() {
            Err(InterruptedError {}.into())
        } else {
            Ok(())
        }
    }

    /// Resolves once interrupted.
    pub async fn interrupted(&self) {
        let mut rx = self.interrupted.subscribe();
        // The sender lives in self, so this cannot fail
        let _ = rx.wait_for(|interrupted| *interrupted).await;
    }
}

fn set_process_interrupt_handler(interrupted: &InterruptState) -> anyhow::Result<()> {
    let interrupted = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted.set_interrupted();
    })?;
    Ok(())
}

pub fn set_up_process_interrupt_handler() -> anyhow::Result<InterruptState> {
    let interrupt_state = InterruptState::new();
    set_process_interrupt_handler(&interrupt_state)?;
    Ok(interrupt_state)
}
