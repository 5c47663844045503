//! The sell-wizard state machine.
//!
//! One [`FlowController`] drives every event through
//! quantity → ticket type → seat → price → compare, entirely from the
//! locator table in [`Config`]. Failures are contained per unit: a failed
//! seat is skipped, a failed event is abandoned, and the run continues.

pub mod setup;

use crate::config::Config;
use crate::dedup::{filter, merge};
use crate::diagnostics::Diagnostics;
use crate::driver::{ContextId, Driver, Node, Nth};
use crate::extract::Extractor;
use crate::model::{Event, Listing, OutputRow, RunReport, Seat, WizardState};
use crate::navigator::{Arrival, Navigator};
use crate::output::RowSink;
use crate::scroll::ScrollCollector;
use crate::wait::{Interrupt, Waiter};
use crate::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Native click, falling back to a script click when something covers the
/// target.
pub(crate) async fn click<D: Driver>(driver: &D, node: &Node) -> Result<()> {
    match driver.click(node).await {
        Err(Error::InteractionBlocked(reason)) => {
            debug!("native click blocked ({}), using script click", reason);
            driver.script_click(node).await
        }
        other => other,
    }
}

/// Wait for `node`, then click it.
pub(crate) async fn press<D: Driver>(
    driver: &D,
    waiter: &Waiter,
    node: &Node,
    timeout: Duration,
) -> Result<()> {
    waiter.until_present(driver, node, timeout).await?;
    click(driver, node).await
}

/// Drives the wizard for every event and accumulates output rows.
pub struct FlowController<D> {
    nav: Navigator<D>,
    config: Arc<Config>,
    waiter: Waiter,
    diagnostics: Option<Diagnostics>,
    rows: Vec<OutputRow>,
    state: WizardState,
}

impl<D: Driver> FlowController<D> {
    pub fn new(driver: D, config: Config, interrupt: Interrupt) -> Self {
        let waiter = Waiter::new(config.timeouts.poll(), interrupt);
        let diagnostics = config.on_failure.as_ref().map(Diagnostics::from_config);
        Self {
            nav: Navigator::new(driver),
            config: Arc::new(config),
            waiter,
            diagnostics,
            rows: Vec::new(),
            state: WizardState::EventList,
        }
    }

    /// Rows harvested so far.
    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn state(&self) -> WizardState {
        self.state
    }

    pub fn navigator(&self) -> &Navigator<D> {
        &self.nav
    }

    /// Open the login page and wait for the operator to log in.
    pub async fn login(&mut self) -> Result<()> {
        let config = Arc::clone(&self.config);
        let login = &config.login;
        info!("opening {}", login.url);
        self.nav.open(&login.url).await?;

        let timeout = Duration::from_millis(login.timeout_ms);
        info!("waiting up to {}s for manual login", timeout.as_secs());
        let marker = Node::first(&login.marker);
        match self
            .waiter
            .until_present(self.nav.driver(), &marker, timeout)
            .await
        {
            Ok(()) => {
                info!("login detected");
                Ok(())
            }
            Err(Error::Timeout(_)) => Err(Error::LoginTimeout(timeout.as_secs())),
            Err(e) => Err(e),
        }
    }

    /// Run the configured setup actions on the primary context.
    pub async fn setup(&mut self) -> Result<()> {
        let config = Arc::clone(&self.config);
        if config.setup.is_empty() {
            return Ok(());
        }
        self.nav.restore_primary().await?;
        let failed = setup::run(
            self.nav.driver(),
            &self.waiter,
            &config.setup,
            config.timeouts.step(),
        )
        .await?;
        if failed > 0 {
            warn!("{}/{} setup actions failed", failed, config.setup.len());
        }
        Ok(())
    }

    /// Scrape the event list in several passes, merged and filtered.
    pub async fn collect_events(&mut self) -> Result<Vec<Event>> {
        let config = Arc::clone(&self.config);
        let events = &config.events;
        let mut passes = Vec::new();
        for pass in 0..events.passes {
            if pass > 0 {
                self.waiter
                    .pause(Duration::from_millis(events.pass_interval_ms))
                    .await?;
            }
            match self.scrape_events().await {
                Ok(found) => {
                    info!("pass {}/{}: {} event cards", pass + 1, events.passes, found.len());
                    passes.push(found);
                }
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(e) => warn!("pass {}/{} failed: {}", pass + 1, events.passes, e),
            }
        }
        let unique = filter(merge(&passes), &config.sentinel);
        info!("{} unique events", unique.len());
        Ok(unique)
    }

    async fn scrape_events(&self) -> Result<Vec<Event>> {
        let events = &self.config.events;
        let driver = self.nav.driver();
        self.waiter
            .until_present(driver, &Node::first(&events.ready), self.config.timeouts.step())
            .await?;
        let extractor = Extractor::new(&self.config.sentinel);
        let count = driver.count(&Node::first(&events.card)).await?;
        let mut found = Vec::with_capacity(count);
        for index in 0..count {
            let card = Node::nth(&events.card, index);
            let record = extractor.extract(driver, Some(&card), &events.fields).await?;
            found.push(Event::from_record(&record, &self.config.sentinel));
        }
        Ok(found)
    }

    /// Log in, run setup, then harvest every event. Rows are saved to `sink`
    /// after each event and once more at the end, including on interrupt.
    pub async fn run<S: RowSink>(&mut self, sink: &mut S) -> Result<RunReport> {
        let start = Instant::now();
        let mut report = RunReport::default();
        let outcome = self.run_events(sink, &mut report).await;

        report.rows = self.rows.len();
        report.duration_ms = start.elapsed().as_millis() as u64;
        self.checkpoint(sink);

        match outcome {
            Ok(()) => Ok(report),
            Err(Error::Interrupted) => {
                warn!("interrupted; keeping {} rows", self.rows.len());
                report.interrupted = true;
                Ok(report)
            }
            Err(e) => Err(e),
        }
    }

    async fn run_events<S: RowSink>(&mut self, sink: &mut S, report: &mut RunReport) -> Result<()> {
        self.login().await?;
        match self.setup().await {
            Ok(()) => {}
            Err(Error::Interrupted) => return Err(Error::Interrupted),
            Err(e) => warn!("setup did not complete: {}", e),
        }
        let events = self.collect_events().await?;
        report.events_found = events.len();
        if events.is_empty() {
            warn!("no events to process");
            return Ok(());
        }

        let list_url = match self.nav.driver().current_url().await {
            Ok(url) => url,
            Err(e) => {
                warn!("cannot read the event list address, stopping: {}", e);
                return Ok(());
            }
        };
        let limit = self.config.events.max.unwrap_or(events.len()).min(events.len());
        if limit < events.len() {
            info!("processing the first {} of {} events", limit, events.len());
        }

        for (index, event) in events.iter().take(limit).enumerate() {
            if self.waiter.interrupt().is_triggered() {
                return Err(Error::Interrupted);
            }
            info!("=== event {}/{}: {} ===", index + 1, limit, event);
            let before = self.rows.len();

            let outcome = self.walk_event(index, event, report).await;
            match outcome {
                Ok(true) => report.events_processed += 1,
                Ok(false) => report.events_failed += 1,
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(e) => {
                    warn!("event {} ({}) failed in {}: {}", index + 1, event.name, self.state, e);
                    self.capture(&format!("event {} {}", index + 1, event.name)).await;
                    report.events_failed += 1;
                }
            }

            if let Err(e) = self.leave_event(&list_url).await {
                if matches!(e, Error::Interrupted) {
                    return Err(e);
                }
                warn!("could not return to the event list after event {}: {}", index + 1, e);
            }

            info!(
                "event {} done: {} rows ({} total)",
                index + 1,
                self.rows.len() - before,
                self.rows.len()
            );
            self.checkpoint(sink);
        }
        Ok(())
    }

    fn checkpoint<S: RowSink>(&self, sink: &mut S) {
        if let Err(e) = sink.save(&self.rows) {
            warn!("failed to save rows: {}", e);
        }
    }

    async fn capture(&self, label: &str) {
        if let Some(ref diagnostics) = self.diagnostics {
            diagnostics.capture(self.nav.driver(), label).await;
        }
    }

    /// Walk one event through every seat. `Ok(false)` when remaining seats
    /// had to be abandoned.
    async fn walk_event(&mut self, index: usize, event: &Event, report: &mut RunReport) -> Result<bool> {
        self.state = WizardState::EventList;
        let event_ctx = self.open_event(event).await?;
        self.fill_quantity().await?;
        self.choose_ticket_type().await?;
        let seats = self.enumerate_seats().await?;
        info!("event {}: {} seats", index + 1, seats.len());

        for (n, seat) in seats.iter().enumerate() {
            info!(
                "event {} ({}): seat {}/{} '{}'",
                index + 1,
                event.name,
                n + 1,
                seats.len(),
                seat.label
            );

            match self.select_seat(seat).await {
                Ok(()) => {}
                // The wizard is somewhere unknown; nothing more to do here.
                Err(e @ (Error::Timeout(_) | Error::Interrupted)) => return Err(e),
                Err(e) => {
                    warn!(
                        "event {} ({}), seat '{}': selection failed: {}",
                        index + 1,
                        event.name,
                        seat.label,
                        e
                    );
                    report.seats_failed += 1;
                    self.capture(&format!("event {} seat {}", index + 1, seat.label)).await;
                    continue;
                }
            }

            match self.harvest_listings(event, seat, &event_ctx).await {
                Ok(count) => info!("seat '{}': {} listings", seat.label, count),
                Err(Error::Interrupted) => return Err(Error::Interrupted),
                Err(e) => {
                    warn!(
                        "event {} ({}), seat '{}' failed in {}: {}",
                        index + 1,
                        event.name,
                        seat.label,
                        self.state,
                        e
                    );
                    report.seats_failed += 1;
                    self.capture(&format!("event {} seat {}", index + 1, seat.label)).await;
                    self.nav.close_others(Some(&event_ctx)).await?;
                }
            }

            let remaining = seats.len() - n - 1;
            if remaining > 0 && !self.return_to_seat_select().await? {
                warn!(
                    "event {} ({}): could not return to seat selection, abandoning {} seats",
                    index + 1,
                    event.name,
                    remaining
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Find the event's card by identity on the primary context and click
    /// it. Returns the context the wizard opened in.
    async fn open_event(&mut self, event: &Event) -> Result<ContextId> {
        let config = Arc::clone(&self.config);
        self.nav.restore_primary().await?;
        let primary = self
            .nav
            .primary()
            .map(str::to_string)
            .ok_or_else(|| Error::Navigation("primary context not open".into()))?;

        let card = self.locate_event(event).await?;
        let baseline = self.nav.baseline().await?;
        click(self.nav.driver(), &card).await?;

        let marker = Node::first(&config.wizard.quantity.marker);
        let arrival = self
            .nav
            .wait_for_arrival(&self.waiter, &baseline, Some(&marker), config.timeouts.arrival())
            .await?;
        match arrival {
            Arrival::NewContext(id) => {
                self.nav.switch_to(&id).await?;
                Ok(id)
            }
            Arrival::AddressChanged(_) | Arrival::Marker => Ok(primary),
        }
    }

    async fn locate_event(&self, event: &Event) -> Result<Node> {
        let events = &self.config.events;
        let driver = self.nav.driver();
        self.waiter
            .until_present(driver, &Node::first(&events.ready), self.config.timeouts.step())
            .await?;
        let extractor = Extractor::new(&self.config.sentinel);
        let count = driver.count(&Node::first(&events.card)).await?;
        for index in 0..count {
            let card = Node::nth(&events.card, index);
            let record = extractor.extract(driver, Some(&card), &events.fields).await?;
            if Event::from_record(&record, &self.config.sentinel) == *event {
                debug!("event {} is card {}", event, index);
                return Ok(card);
            }
        }
        Err(Error::ElementMissing(format!("event card for {}", event)))
    }

    async fn fill_quantity(&mut self) -> Result<()> {
        let quantity = &self.config.wizard.quantity;
        let step = self.config.timeouts.step();
        let driver = self.nav.driver();

        self.waiter
            .until_present(driver, &Node::first(&quantity.marker), self.config.timeouts.arrival())
            .await?;
        self.state = WizardState::QuantityForm;

        driver.scroll_to_bottom().await?;
        let select = Node::first(&quantity.select);
        self.waiter.until_present(driver, &select, step).await?;
        driver.select_option(&select, &quantity.option_label).await?;
        debug!("quantity set to '{}'", quantity.option_label);

        for confirm in &quantity.confirm {
            press(driver, &self.waiter, &Node::first(confirm), step).await?;
        }
        Ok(())
    }

    async fn choose_ticket_type(&mut self) -> Result<()> {
        let ticket_type = &self.config.wizard.ticket_type;
        let timeouts = &self.config.timeouts;
        let driver = self.nav.driver();

        self.waiter
            .until_present(driver, &Node::first(&ticket_type.marker), timeouts.arrival())
            .await?;
        self.state = WizardState::TicketTypeForm;

        press(driver, &self.waiter, &Node::first(&ticket_type.option), timeouts.step()).await?;

        if let Some(ref deferred) = ticket_type.deferred_upload {
            let node = Node::first(deferred);
            match self
                .waiter
                .until_present(driver, &node, timeouts.optional())
                .await
            {
                Ok(()) => {
                    driver.scroll_into_view(&node).await?;
                    click(driver, &node).await?;
                    debug!("chose deferred upload");
                }
                Err(Error::Timeout(_)) => info!("deferred upload not offered, skipping"),
                Err(e) => return Err(e),
            }
        }

        for confirm in &ticket_type.confirm {
            press(driver, &self.waiter, &Node::first(confirm), timeouts.step()).await?;
        }
        Ok(())
    }

    fn seat_toggle(&self) -> Node {
        let seats = &self.config.wizard.seats;
        let control = Node::first(&seats.control);
        match seats.toggle {
            Some(ref toggle) => control.child(toggle, Nth::First),
            None => control,
        }
    }

    /// Open the seat dropdown and read every option. Blank options are
    /// skipped but keep their position.
    async fn enumerate_seats(&mut self) -> Result<Vec<Seat>> {
        let seats = &self.config.wizard.seats;
        let timeouts = &self.config.timeouts;
        let driver = self.nav.driver();

        self.waiter
            .until_present(driver, &Node::first(&seats.control), timeouts.arrival())
            .await?;
        self.state = WizardState::SeatSelect;

        let toggle = self.seat_toggle();
        click(driver, &toggle).await?;
        self.waiter
            .until_present(driver, &Node::first(&seats.option), timeouts.step())
            .await?;

        let count = driver.count(&Node::first(&seats.option)).await?;
        let mut found = Vec::with_capacity(count);
        for index in 0..count {
            let label = driver
                .read(&Node::nth(&seats.option, index), None)
                .await?
                .unwrap_or_default();
            let label = label.trim();
            if label.is_empty() {
                debug!("seat option {} is blank, skipping", index);
                continue;
            }
            found.push(Seat {
                index,
                label: label.to_string(),
            });
        }
        debug!("seats: {:?}", found.iter().map(|s| &s.label).collect::<Vec<_>>());

        // Close the dropdown again; a native click may land on an option.
        driver.script_click(&toggle).await?;
        Ok(found)
    }

    /// Choose `seat` and advance to the price page. The confirm click is
    /// skipped when the page already auto-forwarded.
    async fn select_seat(&mut self, seat: &Seat) -> Result<()> {
        let wizard = &self.config.wizard;
        let timeouts = &self.config.timeouts;
        let driver = self.nav.driver();

        self.waiter
            .until_present(driver, &Node::first(&wizard.seats.control), timeouts.step())
            .await?;
        click(driver, &self.seat_toggle()).await?;

        let option = Node::nth(&wizard.seats.option, seat.index);
        self.waiter.until_present(driver, &option, timeouts.step()).await?;
        driver.scroll_into_view(&option).await?;
        click(driver, &option).await?;

        let marker = Node::first(&wizard.price.marker);
        if driver.exists(&marker).await? {
            debug!("auto-forwarded to the price page");
        } else {
            press(driver, &self.waiter, &Node::first(&wizard.seats.confirm), timeouts.step()).await?;
        }
        self.waiter
            .until_present(driver, &marker, timeouts.arrival())
            .await?;
        self.state = WizardState::PricePage;
        Ok(())
    }

    /// Read the per-ticket price, open the comparison, collect every listing
    /// and return to the price page.
    async fn harvest_listings(&mut self, event: &Event, seat: &Seat, event_ctx: &str) -> Result<usize> {
        let config = Arc::clone(&self.config);
        let price_step = &config.wizard.price;
        let compare = &config.wizard.compare;
        let timeouts = &config.timeouts;
        let extractor = Extractor::new(&config.sentinel);

        let price = extractor
            .field(self.nav.driver(), None, &price_step.field)
            .await?;
        debug!("per-ticket price for '{}': {}", seat.label, price);

        let link = Node::first(&price_step.compare);
        self.waiter
            .until_present(self.nav.driver(), &link, timeouts.step())
            .await?;
        let baseline = self.nav.baseline().await?;
        click(self.nav.driver(), &link).await?;

        let marker = Node::first(&compare.marker);
        let arrival = self
            .nav
            .wait_for_arrival(&self.waiter, &baseline, Some(&marker), timeouts.arrival())
            .await?;
        let compare_ctx = match arrival {
            Arrival::NewContext(id) => {
                self.nav.switch_to(&id).await?;
                Some(id)
            }
            Arrival::AddressChanged(_) | Arrival::Marker => None,
        };

        self.waiter
            .until_present(self.nav.driver(), &marker, timeouts.step())
            .await?;
        self.state = WizardState::ComparePage;

        let collector = ScrollCollector::new(
            &self.waiter,
            extractor,
            Duration::from_millis(compare.settle_ms),
            compare.max_rounds,
        );
        let records = collector
            .collect(self.nav.driver(), &compare.container, &compare.item, &compare.fields)
            .await?;
        let count = records.len();
        for record in &records {
            let listing = Listing::from_record(record, &config.sentinel);
            self.rows.push(OutputRow::new(event, seat, &price, listing));
        }

        match compare_ctx {
            Some(id) => {
                self.nav.close(&id).await?;
                self.nav.switch_to(event_ctx).await?;
            }
            None => {
                let driver = self.nav.driver();
                driver.back().await?;
                self.waiter
                    .until_present(driver, &Node::first(&price_step.marker), timeouts.back())
                    .await?;
            }
        }
        self.state = WizardState::PricePage;
        Ok(count)
    }

    /// Back-navigate until the seat dropdown is visible again.
    async fn return_to_seat_select(&mut self) -> Result<bool> {
        let config = Arc::clone(&self.config);
        let control = Node::first(&config.wizard.seats.control);
        let attempts = config.wizard.back_attempts;
        let driver = self.nav.driver();

        for attempt in 1..=attempts {
            if let Err(e) = driver.back().await {
                debug!("back attempt {}/{} failed: {}", attempt, attempts, e);
                continue;
            }
            match self
                .waiter
                .until_present(driver, &control, config.timeouts.back())
                .await
            {
                Ok(()) => {
                    self.state = WizardState::SeatSelect;
                    return Ok(true);
                }
                Err(Error::Timeout(_)) => {
                    debug!("back attempt {}/{} did not reach seat selection", attempt, attempts)
                }
                Err(e) => return Err(e),
            }
        }
        Ok(false)
    }

    /// Close the event's contexts and put the primary back on the list.
    async fn leave_event(&mut self, list_url: &str) -> Result<()> {
        self.nav.close_secondaries().await?;
        let driver = self.nav.driver();
        if driver.current_url().await? != list_url {
            debug!("returning to {}", list_url);
            driver.navigate(list_url).await?;
            self.waiter
                .until_present(
                    driver,
                    &Node::first(&self.config.events.ready),
                    self.config.timeouts.step(),
                )
                .await?;
        }
        self.state = WizardState::EventList;
        Ok(())
    }

    /// Shut the browser down.
    pub async fn shutdown(self) -> Result<()> {
        self.nav.quit().await
    }
}
