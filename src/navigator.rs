//! Browsing-context bookkeeping: one primary context for the whole run,
//! secondary contexts per event, exactly one current at a time.

use crate::driver::{is_blank, ContextId, Driver, Node};
use crate::wait::Waiter;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Contexts and address observed before an action that may open a context
/// or navigate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Baseline {
    pub contexts: Vec<ContextId>,
    pub url: String,
}

/// What `wait_for_arrival` observed first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Arrival {
    NewContext(ContextId),
    AddressChanged(String),
    Marker,
}

pub struct Navigator<D> {
    driver: D,
    primary: Option<ContextId>,
    current: Option<ContextId>,
}

impl<D: Driver> Navigator<D> {
    pub fn new(driver: D) -> Self {
        Self {
            driver,
            primary: None,
            current: None,
        }
    }

    /// The driver, addressing the current context.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn current(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn require_primary(&self) -> Result<ContextId> {
        self.primary
            .clone()
            .ok_or_else(|| Error::Navigation("primary context not open".into()))
    }

    /// Create the primary context at `url` and make it current.
    pub async fn open(&mut self, url: &str) -> Result<ContextId> {
        if self.primary.is_some() {
            return Err(Error::Navigation("primary context already open".into()));
        }
        let id = self.driver.open(url).await?;
        debug!("primary context {} opened at {}", id, url);
        self.primary = Some(id.clone());
        self.current = Some(id.clone());
        Ok(id)
    }

    /// Direct all subsequent commands at `id`.
    pub async fn switch_to(&mut self, id: &str) -> Result<()> {
        if self.current.as_deref() == Some(id) {
            return Ok(());
        }
        self.driver.activate(id).await?;
        debug!("switched to context {}", id);
        self.current = Some(id.to_string());
        Ok(())
    }

    pub async fn restore_primary(&mut self) -> Result<()> {
        let primary = self.require_primary()?;
        self.switch_to(&primary).await
    }

    pub async fn baseline(&self) -> Result<Baseline> {
        Ok(Baseline {
            contexts: self.driver.contexts().await?,
            url: self.driver.current_url().await?,
        })
    }

    /// Block until a context outside `baseline` appears, the current address
    /// changes, or `marker` (when given) resolves. A new context only counts
    /// once it has an address of its own. Does not switch contexts.
    pub async fn wait_for_arrival(
        &self,
        waiter: &Waiter,
        baseline: &Baseline,
        marker: Option<&Node>,
        timeout: Duration,
    ) -> Result<Arrival> {
        let driver = &self.driver;
        let arrival = waiter
            .until("new context or address change", timeout, move || async move {
                let contexts = driver.contexts().await?;
                if let Some(new) = contexts.into_iter().find(|c| !baseline.contexts.contains(c)) {
                    let url = driver.context_url(&new).await?;
                    if is_blank(&url) {
                        trace!("context {} opened, still loading", new);
                        return Ok(None);
                    }
                    return Ok(Some(Arrival::NewContext(new)));
                }
                let url = driver.current_url().await?;
                if url != baseline.url {
                    return Ok(Some(Arrival::AddressChanged(url)));
                }
                if let Some(marker) = marker {
                    if driver.exists(marker).await? {
                        return Ok(Some(Arrival::Marker));
                    }
                }
                Ok(None)
            })
            .await?;
        debug!("arrival: {:?}", arrival);
        Ok(arrival)
    }

    /// Destroy a secondary context and make the primary current again.
    pub async fn close(&mut self, id: &str) -> Result<()> {
        let primary = self.require_primary()?;
        if id == primary {
            return Err(Error::Navigation("refusing to close the primary context".into()));
        }
        self.driver.close_context(id).await?;
        debug!("closed context {}", id);
        if self.current.as_deref() == Some(id) {
            self.current = None;
        }
        self.switch_to(&primary).await
    }

    /// Close every context except the primary and `keep`, then make `keep`
    /// (or the primary) current.
    pub async fn close_others(&mut self, keep: Option<&str>) -> Result<()> {
        let primary = self.require_primary()?;
        for id in self.driver.contexts().await? {
            if id == primary || Some(id.as_str()) == keep {
                continue;
            }
            if let Err(e) = self.close(&id).await {
                warn!("failed to close context {}: {}", id, e);
            }
        }
        match keep {
            Some(id) => self.switch_to(id).await,
            None => self.switch_to(&primary).await,
        }
    }

    /// Close every secondary context and restore the primary.
    pub async fn close_secondaries(&mut self) -> Result<()> {
        self.close_others(None).await
    }

    pub async fn quit(self) -> Result<()> {
        self.driver.quit().await
    }
}
