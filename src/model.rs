use crate::extract::Record;
use serde::Serialize;
use std::fmt;

/// One event card from the list page. Identity is all four fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Event {
    pub date: String,
    pub time: String,
    pub name: String,
    pub location: String,
}

impl Event {
    /// Build from an extracted card; missing fields become `sentinel`.
    pub fn from_record(record: &Record, sentinel: &str) -> Self {
        let get = |name: &str| {
            record
                .get(name)
                .cloned()
                .unwrap_or_else(|| sentinel.to_string())
        };
        Self {
            date: get("date"),
            time: get("time"),
            name: get("name"),
            location: get("location"),
        }
    }

    pub fn key(&self) -> (&str, &str, &str, &str) {
        (&self.date, &self.time, &self.name, &self.location)
    }

    /// Every field is the sentinel: a card that rendered without data.
    pub fn is_placeholder(&self, sentinel: &str) -> bool {
        [&self.date, &self.time, &self.name, &self.location]
            .iter()
            .all(|f| f.as_str() == sentinel)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {}, {})",
            self.name, self.date, self.time, self.location
        )
    }
}

/// A seat dropdown option. `index` is its position among all options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Seat {
    pub index: usize,
    pub label: String,
}

/// One comparable listing on the comparison page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    pub title: String,
    pub price: String,
    pub passes: String,
    pub rating_score: String,
    pub rating_label: String,
}

impl Listing {
    pub fn from_record(record: &Record, sentinel: &str) -> Self {
        let get = |name: &str| {
            record
                .get(name)
                .cloned()
                .unwrap_or_else(|| sentinel.to_string())
        };
        Self {
            title: get("title"),
            price: get("price"),
            passes: get("passes"),
            rating_score: get("rating_score"),
            rating_label: get("rating_label"),
        }
    }
}

/// One CSV row: event × seat × listing. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRow {
    pub event_date: String,
    pub event_time: String,
    pub event_name: String,
    pub event_location: String,
    pub selected_seat: String,
    pub per_ticket_price: String,
    pub listing_title: String,
    pub listing_price: String,
    pub listing_passes: String,
    pub listing_rating_score: String,
    pub listing_rating_label: String,
}

impl OutputRow {
    pub fn new(event: &Event, seat: &Seat, per_ticket_price: &str, listing: Listing) -> Self {
        Self {
            event_date: event.date.clone(),
            event_time: event.time.clone(),
            event_name: event.name.clone(),
            event_location: event.location.clone(),
            selected_seat: seat.label.clone(),
            per_ticket_price: per_ticket_price.to_string(),
            listing_title: listing.title,
            listing_price: listing.price,
            listing_passes: listing.passes,
            listing_rating_score: listing.rating_score,
            listing_rating_label: listing.rating_label,
        }
    }
}

/// Where the wizard is for the event being processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WizardState {
    EventList,
    QuantityForm,
    TicketTypeForm,
    SeatSelect,
    PricePage,
    ComparePage,
}

impl fmt::Display for WizardState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EventList => "event list",
            Self::QuantityForm => "quantity form",
            Self::TicketTypeForm => "ticket type form",
            Self::SeatSelect => "seat select",
            Self::PricePage => "price page",
            Self::ComparePage => "compare page",
        };
        f.write_str(name)
    }
}

/// Result of one harvest run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Unique events after merging and filtering.
    pub events_found: usize,
    /// Events walked to completion, with or without failed seats.
    pub events_processed: usize,
    /// Events aborted before all their seats were tried.
    pub events_failed: usize,
    pub seats_failed: usize,
    pub rows: usize,
    pub duration_ms: u64,
    /// Stopped early by the interrupt.
    pub interrupted: bool,
}
