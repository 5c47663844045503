pub mod actions;
pub mod locator;
pub mod params;
pub mod schema;

pub use actions::Action;
pub use locator::{FieldSpec, FieldSpecs, Locator, Pick, Query};
pub use params::{ParamDef, Params};
pub use schema::{
    BrowserConfig, CompareStep, Config, EventsConfig, LoginConfig, OnFailure, OutputConfig,
    PriceStep, QuantityStep, SeatStep, TicketTypeStep, Timeouts, Viewport, WizardConfig,
};
