//! # resale-harvest
//!
//! Config-driven harvesting of resale ticket listings. A single wizard state
//! machine walks every event on a marketplace "sell" page through
//! quantity, ticket type, seat, price and comparison steps, then writes one
//! CSV row per comparable listing.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use resale_harvest::{ChromeDriver, Config, CsvSink, FlowController, Interrupt};
//!
//! # #[tokio::main]
//! # async fn main() -> resale_harvest::Result<()> {
//! let config = Config::load("configs/stubhub-parking.yaml")?;
//! let driver = ChromeDriver::launch(&config.browser).await?;
//! let mut sink = CsvSink::new(&config.output.path);
//! let mut flow = FlowController::new(driver, config, Interrupt::new());
//! let report = flow.run(&mut sink).await?;
//! println!("rows: {}", report.rows);
//! flow.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod config;
mod dedup;
mod diagnostics;
mod driver;
mod extract;
mod flow;
mod model;
mod navigator;
mod output;
mod scroll;
mod wait;

pub use config::{
    Action, BrowserConfig, CompareStep, Config, EventsConfig, FieldSpec, FieldSpecs,
    LoginConfig, Locator, OnFailure, OutputConfig, ParamDef, Params, Pick, PriceStep,
    QuantityStep, SeatStep, TicketTypeStep, Timeouts, Viewport, WizardConfig,
};
pub use dedup::{filter, merge};
pub use diagnostics::Diagnostics;
pub use driver::{ChromeDriver, ContextId, Driver, Node, Nth};
pub use extract::{Extractor, Record};
pub use flow::FlowController;
pub use model::{Event, Listing, OutputRow, RunReport, Seat, WizardState};
pub use navigator::{Arrival, Baseline, Navigator};
pub use output::{CsvSink, RowSink, COLUMNS};
pub use scroll::ScrollCollector;
pub use wait::{Interrupt, Waiter};

/// Result type for resale-harvest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during config loading or a harvest run.
///
/// An optional field that matches nothing is not an error: the extractor
/// records the configured sentinel instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("yaml parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("browser error: {0}")]
    Browser(#[from] eoka::Error),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("interaction blocked: {0}")]
    InteractionBlocked(String),

    #[error("element missing: {0}")]
    ElementMissing(String),

    #[error("navigation failed: {0}")]
    Navigation(String),

    #[error("login not detected within {0}s")]
    LoginTimeout(u64),

    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// Browser errors raised while a page is mid-navigation; pollers retry them.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Browser(_))
    }
}
