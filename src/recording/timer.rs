use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// At most one pending auto-stop at a time; re-arming cancels the previous one
#[derive(Default)]
pub struct AutoStopTimer {
    handle: Option<JoinHandle<()>>,
}

impl AutoStopTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `on_fire` after `delay`, replacing any pending timer
    pub fn arm<F>(&mut self, delay: Duration, on_fire: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.disarm();

        debug!("Auto-stop armed for {:?}", delay);
        self.handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            on_fire.await;
        }));
    }

    /// Cancel the pending timer. Returns true if one was pending.
    pub fn disarm(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                let pending = !handle.is_finished();
                handle.abort();
                if pending {
                    debug!("Auto-stop disarmed");
                }
                pending
            }
            None => false,
        }
    }

    /// Forget the handle without aborting it; used from inside the firing task
    pub fn release(&mut self) {
        self.handle.take();
    }

    pub fn is_pending(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for AutoStopTimer {
    fn drop(&mut self) {
        self.disarm();
    }
}
