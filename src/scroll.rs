use crate::config::{FieldSpecs, Locator};
use crate::driver::{Driver, Node, Nth};
use crate::extract::{Extractor, Record};
use crate::wait::Waiter;
use crate::Result;
use std::time::Duration;
use tracing::{debug, warn};

/// Harvests an infinite-scroll list: grow, re-read only the new tail, repeat
/// until the page height stops growing.
pub struct ScrollCollector<'a> {
    waiter: &'a Waiter,
    extractor: Extractor<'a>,
    settle: Duration,
    max_rounds: usize,
}

impl<'a> ScrollCollector<'a> {
    pub fn new(
        waiter: &'a Waiter,
        extractor: Extractor<'a>,
        settle: Duration,
        max_rounds: usize,
    ) -> Self {
        Self {
            waiter,
            extractor,
            settle,
            max_rounds: max_rounds.max(1),
        }
    }

    /// Collect every item under `container`, each extracted exactly once.
    pub async fn collect<D: Driver>(
        &self,
        driver: &D,
        container: &Locator,
        item: &Locator,
        fields: &FieldSpecs,
    ) -> Result<Vec<Record>> {
        let root = Node::first(container);
        let items = root.child(item, Nth::First);
        let mut records = Vec::new();
        let mut last_extent = driver.scroll_extent().await?;

        for round in 1..=self.max_rounds {
            self.extract_tail(driver, &root, &items, item, fields, &mut records)
                .await?;

            driver.scroll_to_bottom().await?;
            self.waiter.pause(self.settle).await?;
            let extent = driver.scroll_extent().await?;
            debug!(
                "scroll round {}: {} items, extent {} -> {}",
                round,
                records.len(),
                last_extent,
                extent
            );
            if extent <= last_extent {
                return Ok(records);
            }
            last_extent = extent;
        }

        // The last scroll may have rendered items no round has read yet.
        self.extract_tail(driver, &root, &items, item, fields, &mut records)
            .await?;
        warn!(
            "list still growing after {} scroll rounds; keeping {} items",
            self.max_rounds,
            records.len()
        );
        Ok(records)
    }

    /// Extract the items past `records.len()`.
    async fn extract_tail<D: Driver>(
        &self,
        driver: &D,
        root: &Node,
        items: &Node,
        item: &Locator,
        fields: &FieldSpecs,
        records: &mut Vec<Record>,
    ) -> Result<()> {
        let visible = driver.count(items).await?;
        for index in records.len()..visible {
            let node = root.child(item, Nth::Index(index));
            records.push(self.extractor.extract(driver, Some(&node), fields).await?);
        }
        Ok(())
    }
}
