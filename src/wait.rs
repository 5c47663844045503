//! Bounded polling. Every suspension in a run goes through [`Waiter`].

use crate::driver::{Driver, Node};
use crate::{Error, Result};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace};

/// Run-wide stop signal, set from outside the controller (e.g. Ctrl-C).
#[derive(Debug, Clone, Default)]
pub struct Interrupt(Arc<AtomicBool>);

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Poll-until-ready with a deadline.
#[derive(Debug, Clone)]
pub struct Waiter {
    poll: Duration,
    interrupt: Interrupt,
}

impl Waiter {
    pub fn new(poll: Duration, interrupt: Interrupt) -> Self {
        Self {
            poll: poll.max(Duration::from_millis(1)),
            interrupt,
        }
    }

    pub fn interrupt(&self) -> &Interrupt {
        &self.interrupt
    }

    fn check(&self) -> Result<()> {
        if self.interrupt.is_triggered() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Poll `probe` until it yields a value. Transient browser errors count
    /// as "not yet"; any other error ends the wait.
    pub async fn until<T, F, Fut>(&self, what: &str, timeout: Duration, mut probe: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        let deadline = Instant::now() + timeout;
        let mut last_error: Option<String> = None;
        loop {
            self.check()?;
            match probe().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(e) if e.is_transient() => {
                    trace!("{}: transient error while polling: {}", what, e);
                    last_error = Some(e.to_string());
                }
                Err(e) => return Err(e),
            }

            let now = Instant::now();
            if now >= deadline {
                let mut msg = format!("{} not met after {}ms", what, timeout.as_millis());
                if let Some(err) = last_error {
                    msg.push_str(&format!(" (last error: {})", err));
                }
                debug!("{}", msg);
                return Err(Error::Timeout(msg));
            }
            tokio::time::sleep(self.poll.min(deadline - now)).await;
        }
    }

    /// Wait for `node` to resolve on the active context.
    pub async fn until_present<D: Driver>(
        &self,
        driver: &D,
        node: &Node,
        timeout: Duration,
    ) -> Result<()> {
        self.until(&format!("presence of {}", node), timeout, move || async move {
            Ok(driver.exists(node).await?.then_some(()))
        })
        .await
    }

    /// Fixed pause, cut short by the interrupt.
    pub async fn pause(&self, duration: Duration) -> Result<()> {
        let deadline = Instant::now() + duration;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            tokio::time::sleep(self.poll.min(deadline - now)).await;
        }
    }
}
