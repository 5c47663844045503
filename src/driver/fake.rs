//! In-memory marketplace for tests: an event list, the sell wizard and a
//! comparison page, each screen rendered as a small element tree.

use super::{ContextId, Driver, Node, Nth};
use crate::config::Query;
use crate::{Error, Result};
use std::cell::RefCell;
use std::collections::HashMap;

pub const LIST_URL: &str = "fake://sell";
const QUANTITY_LABEL: &str = "1 Ticket";

#[derive(Debug, Clone)]
pub struct FakeListing {
    pub title: String,
    pub price: String,
    pub passes: String,
    pub rating_score: Option<String>,
    pub rating_label: Option<String>,
}

#[derive(Debug, Clone)]
pub struct FakeSeat {
    pub label: String,
    pub price: String,
    pub listings: Vec<FakeListing>,
}

#[derive(Debug, Clone)]
pub struct FakeEvent {
    pub date: Option<String>,
    pub time: Option<String>,
    pub name: Option<String>,
    pub location: Option<String>,
    pub seats: Vec<FakeSeat>,
    /// Seat confirm never reaches the price page.
    pub stall_price: bool,
}

impl FakeEvent {
    /// A card with no readable fields.
    pub fn placeholder() -> Self {
        Self {
            date: None,
            time: None,
            name: None,
            location: None,
            seats: Vec::new(),
            stall_price: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeSite {
    pub events: Vec<FakeEvent>,
    /// Renders the post-login marker.
    pub logged_in: bool,
    pub event_in_new_tab: bool,
    pub compare_in_new_tab: bool,
    /// Choosing a seat jumps straight to the price page.
    pub auto_forward: bool,
    /// Offers (and requires) the "upload later" choice.
    pub deferred_upload: bool,
    /// Listings rendered per scroll batch.
    pub listing_batch: usize,
    /// Every scroll grows the page, even with nothing left to show.
    pub endless_scroll: bool,
    /// Back-navigation does nothing.
    pub broken_back: bool,
    /// Native clicks are intercepted by an overlay.
    pub blocked_clicks: bool,
    /// Pop-ups on the event list.
    pub popups: usize,
    /// Address lookups a page-opened tab answers with `about:blank` before
    /// its navigation commits.
    pub loading_polls: usize,
    /// Reading the current address fails.
    pub broken_address: bool,
}

impl Default for FakeSite {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            logged_in: true,
            event_in_new_tab: true,
            compare_in_new_tab: true,
            auto_forward: false,
            deferred_upload: false,
            listing_batch: 100,
            endless_scroll: false,
            broken_back: false,
            blocked_clicks: false,
            popups: 0,
            loading_polls: 0,
            broken_address: false,
        }
    }
}

impl FakeSite {
    pub fn with_events(events: usize, seats: usize, listings: usize) -> Self {
        let events = (0..events)
            .map(|e| FakeEvent {
                date: Some(format!("Apr {}", e + 1)),
                time: Some("7:00 PM".into()),
                name: Some(format!("Show {}", e)),
                location: Some(format!("Arena {}", e)),
                seats: (0..seats)
                    .map(|s| FakeSeat {
                        label: format!("Lot {}", s + 1),
                        price: format!("{}.00", 25 + s * 5),
                        listings: (0..listings)
                            .map(|l| FakeListing {
                                title: format!("Listing {}-{}-{}", e, s, l),
                                price: format!("${}.00", 20 + l),
                                passes: "1 pass".into(),
                                rating_score: Some("4.5".into()),
                                rating_label: Some("Great".into()),
                            })
                            .collect(),
                    })
                    .collect(),
                stall_price: false,
            })
            .collect();
        Self {
            events,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Screen {
    EventList,
    Quantity {
        event: usize,
        selected: Option<String>,
        next: bool,
    },
    TicketType {
        event: usize,
        chosen: bool,
        deferred: bool,
    },
    SeatSelect {
        event: usize,
        open: bool,
        selected: Option<usize>,
    },
    Price {
        event: usize,
        seat: usize,
    },
    Compare {
        event: usize,
        seat: usize,
        batches: usize,
    },
    Blank,
}

impl Screen {
    fn from_url(url: &str) -> Self {
        if url == LIST_URL {
            return Screen::EventList;
        }
        if let Some(event) = url.strip_prefix("fake://event/") {
            if let Ok(event) = event.parse() {
                return Screen::Quantity {
                    event,
                    selected: None,
                    next: false,
                };
            }
        }
        if let Some(rest) = url.strip_prefix("fake://compare/") {
            if let Some((event, seat)) = rest.split_once('/') {
                if let (Ok(event), Ok(seat)) = (event.parse(), seat.parse()) {
                    return Screen::Compare {
                        event,
                        seat,
                        batches: 1,
                    };
                }
            }
        }
        Screen::Blank
    }
}

#[derive(Debug, Clone)]
struct Page {
    url: String,
    screen: Screen,
}

impl Page {
    fn at(url: &str) -> Self {
        Self {
            url: url.to_string(),
            screen: Screen::from_url(url),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Click {
    OpenEvent(usize),
    QtyNext,
    QtyContinue,
    ChooseType,
    Deferred,
    TypeContinue,
    ToggleSeats,
    PickSeat(usize),
    SeatContinue,
    Compare,
    DismissPopup,
}

#[derive(Debug, Default)]
struct El {
    css: &'static str,
    text: String,
    value: Option<String>,
    options: Vec<String>,
    on_click: Option<Click>,
    /// Listing index whose title this element shows.
    probe: Option<usize>,
    children: Vec<El>,
}

impl El {
    fn new(css: &'static str) -> Self {
        Self {
            css,
            ..Self::default()
        }
    }

    fn text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    fn click(mut self, click: Click) -> Self {
        self.on_click = Some(click);
        self
    }

    fn with(mut self, children: Vec<El>) -> Self {
        self.children = children;
        self
    }

    fn full_text(&self) -> String {
        let mut out = self.text.clone();
        for child in &self.children {
            out.push_str(&child.full_text());
        }
        out
    }

    fn matches(&self, query: &Query) -> bool {
        match query {
            Query::Css(s) => self.css == *s,
            Query::XPath(_) => false,
            Query::Text(t) => {
                let needle = t.trim().to_lowercase();
                let has = |el: &El| el.full_text().to_lowercase().contains(&needle);
                has(self) && !self.children.iter().any(has)
            }
        }
    }
}

fn find_all<'a>(scope: &'a [El], query: &Query, out: &mut Vec<&'a El>) {
    for el in scope {
        if el.matches(query) {
            out.push(el);
        }
        find_all(&el.children, query, out);
    }
}

fn pick<'a>(list: &[&'a El], nth: Nth) -> Option<&'a El> {
    match nth {
        Nth::First => list.first().copied(),
        Nth::Last => list.last().copied(),
        Nth::Index(i) => list.get(i).copied(),
    }
}

/// Every match of the node's last step, and the picked one.
fn resolve<'a>(doc: &'a [El], node: &Node) -> (Vec<&'a El>, Option<&'a El>) {
    let steps = node.steps();
    let mut scope = doc;
    for step in &steps[..steps.len() - 1] {
        let mut found = Vec::new();
        find_all(scope, &step.locator.query(), &mut found);
        match pick(&found, step.nth) {
            Some(el) => scope = &el.children,
            None => return (Vec::new(), None),
        }
    }
    let last = node.leaf();
    let mut all = Vec::new();
    find_all(scope, &last.locator.query(), &mut all);
    let el = pick(&all, last.nth);
    (all, el)
}

enum Effect {
    Replace(Screen),
    Push(String, Screen),
    Spawn(String),
}

#[derive(Debug)]
struct State {
    site: FakeSite,
    contexts: Vec<(ContextId, Vec<Page>)>,
    active: Option<ContextId>,
    /// Remaining blank address lookups per context.
    loading: HashMap<ContextId, usize>,
    next_id: usize,
    extents: Vec<u64>,
    title_reads: HashMap<usize, usize>,
    script_clicks: usize,
    fills: Vec<(String, String)>,
    keys: Vec<String>,
}

impl State {
    fn spawn(&mut self, url: &str) -> ContextId {
        self.next_id += 1;
        let id = format!("tab-{}", self.next_id);
        self.contexts.push((id.clone(), vec![Page::at(url)]));
        id
    }

    fn history_mut(&mut self) -> Result<&mut Vec<Page>> {
        let active = self
            .active
            .clone()
            .ok_or_else(|| Error::Navigation("no active context".into()))?;
        self.contexts
            .iter_mut()
            .find(|(id, _)| *id == active)
            .map(|(_, history)| history)
            .ok_or_else(|| Error::Navigation(format!("context {} is gone", active)))
    }

    fn page(&self) -> Result<&Page> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| Error::Navigation("no active context".into()))?;
        self.contexts
            .iter()
            .find(|(id, _)| id == active)
            .and_then(|(_, history)| history.last())
            .ok_or_else(|| Error::Navigation(format!("context {} is gone", active)))
    }

    fn page_mut(&mut self) -> Result<&mut Page> {
        self.history_mut()?
            .last_mut()
            .ok_or_else(|| Error::Navigation("empty history".into()))
    }

    fn push(&mut self, url: String, screen: Screen) -> Result<()> {
        self.history_mut()?.push(Page { url, screen });
        Ok(())
    }

    fn stalls(&self, event: usize) -> bool {
        self.site.events.get(event).is_some_and(|e| e.stall_price)
    }

    fn listing_count(&self, event: usize, seat: usize) -> usize {
        self.site
            .events
            .get(event)
            .and_then(|e| e.seats.get(seat))
            .map(|s| s.listings.len())
            .unwrap_or(0)
    }

    fn total_batches(&self, event: usize, seat: usize) -> usize {
        let batch = self.site.listing_batch.max(1);
        self.listing_count(event, seat).div_ceil(batch).max(1)
    }

    fn render(&self) -> Result<Vec<El>> {
        let site = &self.site;
        let doc = match &self.page()?.screen {
            Screen::EventList => {
                let mut doc = Vec::new();
                if site.logged_in {
                    doc.push(El::new("#sell-link").text("Sell"));
                }
                for _ in 0..site.popups {
                    doc.push(El::new(".popup-close").text("Close").click(Click::DismissPopup));
                }
                doc.push(El::new("input[type=search]"));
                let cards = site
                    .events
                    .iter()
                    .enumerate()
                    .map(|(i, event)| event_card(i, event))
                    .collect();
                doc.push(El::new("#events").with(cards));
                doc
            }
            Screen::Quantity { next, .. } => {
                let mut select = El::new("select[name=quantity]");
                select.options = vec!["Select".into(), QUANTITY_LABEL.into(), "2 Tickets".into()];
                let mut form = vec![select, El::new(".qty-next").text("Next").click(Click::QtyNext)];
                if *next {
                    form.push(El::new(".qty-continue").text("Continue").click(Click::QtyContinue));
                }
                vec![El::new("#qty-form").with(form)]
            }
            Screen::TicketType { chosen, .. } => {
                let mut form = vec![El::new(".etickets").text("E-Tickets").click(Click::ChooseType)];
                if site.deferred_upload && *chosen {
                    form.push(
                        El::new("label.upload-later")
                            .text("I'll upload later")
                            .click(Click::Deferred),
                    );
                }
                form.push(El::new(".type-continue").text("Continue").click(Click::TypeContinue));
                vec![El::new("#type-form").with(form)]
            }
            Screen::SeatSelect { event, open, .. } => {
                let control = El::new(".seat-control")
                    .click(Click::ToggleSeats)
                    .with(vec![El::new(".seat-toggle").text("Select seat").click(Click::ToggleSeats)]);
                let mut doc = vec![control];
                if *open {
                    let options = site.events[*event]
                        .seats
                        .iter()
                        .enumerate()
                        .map(|(i, seat)| {
                            El::new(".seat-option")
                                .text(seat.label.clone())
                                .click(Click::PickSeat(i))
                        })
                        .collect();
                    doc.push(El::new(".seat-menu").with(options));
                }
                doc.push(El::new(".seat-continue").text("Continue").click(Click::SeatContinue));
                doc
            }
            Screen::Price { event, seat } => {
                let seat = &site.events[*event].seats[*seat];
                vec![
                    El::new("input[name=price]").value(seat.price.clone()),
                    El::new("a.compare")
                        .text("Compare similar tickets")
                        .click(Click::Compare),
                ]
            }
            Screen::Compare {
                event,
                seat,
                batches,
            } => {
                let listings = &site.events[*event].seats[*seat].listings;
                let visible = listings.len().min(batches * site.listing_batch.max(1));
                let items = listings[..visible]
                    .iter()
                    .enumerate()
                    .map(|(i, listing)| listing_item(i, listing))
                    .collect();
                vec![El::new("#listings").with(items)]
            }
            Screen::Blank => Vec::new(),
        };
        Ok(doc)
    }

    fn act(&mut self, click: Click) -> Result<()> {
        let page = self.page()?.clone();
        let url = page.url;

        let effects = match (click, page.screen) {
            (Click::OpenEvent(i), _) => {
                let url = format!("fake://event/{}", i);
                if self.site.event_in_new_tab {
                    vec![Effect::Spawn(url)]
                } else {
                    let screen = Screen::from_url(&url);
                    vec![Effect::Push(url, screen)]
                }
            }
            (Click::QtyNext, Screen::Quantity { event, selected, .. })
                if selected.as_deref() == Some(QUANTITY_LABEL) =>
            {
                vec![Effect::Replace(Screen::Quantity {
                    event,
                    selected,
                    next: true,
                })]
            }
            (Click::QtyContinue, Screen::Quantity { event, next: true, .. }) => {
                vec![Effect::Push(
                    url,
                    Screen::TicketType {
                        event,
                        chosen: false,
                        deferred: false,
                    },
                )]
            }
            (Click::ChooseType, Screen::TicketType { event, deferred, .. }) => {
                vec![Effect::Replace(Screen::TicketType {
                    event,
                    chosen: true,
                    deferred,
                })]
            }
            (Click::Deferred, Screen::TicketType { event, chosen, .. }) => {
                vec![Effect::Replace(Screen::TicketType {
                    event,
                    chosen,
                    deferred: true,
                })]
            }
            (
                Click::TypeContinue,
                Screen::TicketType {
                    event,
                    chosen: true,
                    deferred,
                },
            ) if deferred || !self.site.deferred_upload => vec![Effect::Push(
                url,
                Screen::SeatSelect {
                    event,
                    open: false,
                    selected: None,
                },
            )],
            (Click::ToggleSeats, Screen::SeatSelect { event, open, selected }) => {
                vec![Effect::Replace(Screen::SeatSelect {
                    event,
                    open: !open,
                    selected,
                })]
            }
            (Click::PickSeat(seat), Screen::SeatSelect { event, .. }) => {
                let mut effects = vec![Effect::Replace(Screen::SeatSelect {
                    event,
                    open: false,
                    selected: Some(seat),
                })];
                if self.site.auto_forward && !self.stalls(event) {
                    effects.push(Effect::Push(url, Screen::Price { event, seat }));
                }
                effects
            }
            (
                Click::SeatContinue,
                Screen::SeatSelect {
                    event,
                    selected: Some(seat),
                    ..
                },
            ) if !self.stalls(event) => vec![Effect::Push(url, Screen::Price { event, seat })],
            (Click::Compare, Screen::Price { event, seat }) => {
                let url = format!("fake://compare/{}/{}", event, seat);
                if self.site.compare_in_new_tab {
                    vec![Effect::Spawn(url)]
                } else {
                    let screen = Screen::from_url(&url);
                    vec![Effect::Push(url, screen)]
                }
            }
            (Click::DismissPopup, _) => {
                self.site.popups = self.site.popups.saturating_sub(1);
                Vec::new()
            }
            _ => Vec::new(),
        };

        for effect in effects {
            match effect {
                Effect::Replace(screen) => self.page_mut()?.screen = screen,
                Effect::Push(url, screen) => self.push(url, screen)?,
                Effect::Spawn(url) => {
                    let id = self.spawn(&url);
                    if self.site.loading_polls > 0 {
                        self.loading.insert(id, self.site.loading_polls);
                    }
                }
            }
        }
        Ok(())
    }
}

fn event_card(index: usize, event: &FakeEvent) -> El {
    let mut fields = Vec::new();
    if let Some(ref date) = event.date {
        fields.push(El::new(".date").text(date.clone()));
    }
    if let Some(ref time) = event.time {
        fields.push(El::new(".time").text(time.clone()));
    }
    if let Some(ref name) = event.name {
        fields.push(El::new(".name").text(name.clone()));
    }
    if let Some(ref location) = event.location {
        fields.push(El::new(".location").text(format!("{} (short)", location)));
        fields.push(El::new(".location").text(location.clone()));
    }
    El::new(".event-card")
        .click(Click::OpenEvent(index))
        .with(fields)
}

fn listing_item(index: usize, listing: &FakeListing) -> El {
    let mut title = El::new(".title").text(listing.title.clone());
    title.probe = Some(index);
    let mut fields = vec![
        title,
        El::new(".price").text(listing.price.clone()),
        El::new(".passes").text(listing.passes.clone()),
    ];
    if let Some(ref score) = listing.rating_score {
        fields.push(El::new(".score").text(score.clone()));
    }
    if let Some(ref label) = listing.rating_label {
        fields.push(El::new(".label").text(label.clone()));
    }
    El::new(".listing").with(fields)
}

/// What a resolved element offers, copied out of the render.
struct Resolved {
    text: String,
    value: Option<String>,
    options: Vec<String>,
    on_click: Option<Click>,
    probe: Option<usize>,
}

pub struct FakeDriver {
    state: RefCell<State>,
}

impl FakeDriver {
    pub fn new(site: FakeSite) -> Self {
        Self {
            state: RefCell::new(State {
                site,
                contexts: Vec::new(),
                active: None,
                loading: HashMap::new(),
                next_id: 0,
                extents: Vec::new(),
                title_reads: HashMap::new(),
                script_clicks: 0,
                fills: Vec::new(),
                keys: Vec::new(),
            }),
        }
    }

    /// Open a context the way the page would: without activating it.
    pub fn spawn_context(&self, url: &str) -> ContextId {
        self.state.borrow_mut().spawn(url)
    }

    /// Like `spawn_context`, but the address reads `about:blank` for the
    /// first `polls` lookups.
    pub fn spawn_loading_context(&self, url: &str, polls: usize) -> ContextId {
        let mut state = self.state.borrow_mut();
        let id = state.spawn(url);
        state.loading.insert(id.clone(), polls);
        id
    }

    /// Every scroll extent measured so far.
    pub fn extents_seen(&self) -> Vec<u64> {
        self.state.borrow().extents.clone()
    }

    /// Times the title of listing `index` was read.
    pub fn listing_reads(&self, index: usize) -> usize {
        self.state
            .borrow()
            .title_reads
            .get(&index)
            .copied()
            .unwrap_or(0)
    }

    pub fn script_clicks(&self) -> usize {
        self.state.borrow().script_clicks
    }

    pub fn fills(&self) -> Vec<(String, String)> {
        self.state.borrow().fills.clone()
    }

    pub fn keys(&self) -> Vec<String> {
        self.state.borrow().keys.clone()
    }

    pub fn popups_left(&self) -> usize {
        self.state.borrow().site.popups
    }

    fn resolve(&self, node: &Node) -> Result<Option<Resolved>> {
        let doc = self.state.borrow().render()?;
        let (_, el) = resolve(&doc, node);
        Ok(el.map(|el| Resolved {
            text: el.full_text(),
            value: el.value.clone(),
            options: el.options.clone(),
            on_click: el.on_click,
            probe: el.probe,
        }))
    }

    fn require(&self, node: &Node) -> Result<Resolved> {
        self.resolve(node)?
            .ok_or_else(|| Error::ElementMissing(node.to_string()))
    }

    fn perform(&self, el: Resolved) -> Result<()> {
        match el.on_click {
            Some(click) => self.state.borrow_mut().act(click),
            None => Ok(()),
        }
    }
}

impl Driver for FakeDriver {
    async fn open(&mut self, url: &str) -> Result<ContextId> {
        let mut state = self.state.borrow_mut();
        let id = state.spawn(url);
        state.active = Some(id.clone());
        Ok(id)
    }

    async fn contexts(&self) -> Result<Vec<ContextId>> {
        Ok(self
            .state
            .borrow()
            .contexts
            .iter()
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn context_url(&self, id: &str) -> Result<String> {
        let mut state = self.state.borrow_mut();
        if let Some(left) = state.loading.get_mut(id) {
            if *left > 0 {
                *left -= 1;
                return Ok("about:blank".into());
            }
        }
        state
            .contexts
            .iter()
            .find(|(c, _)| c == id)
            .and_then(|(_, history)| history.last())
            .map(|page| page.url.clone())
            .ok_or_else(|| Error::Navigation(format!("context {} not found", id)))
    }

    async fn activate(&mut self, id: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if !state.contexts.iter().any(|(c, _)| c == id) {
            return Err(Error::Navigation(format!("context {} not found", id)));
        }
        state.active = Some(id.to_string());
        Ok(())
    }

    async fn close_context(&mut self, id: &str) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let before = state.contexts.len();
        state.contexts.retain(|(c, _)| c != id);
        if state.contexts.len() == before {
            return Err(Error::Navigation(format!("context {} not found", id)));
        }
        if state.active.as_deref() == Some(id) {
            state.active = None;
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.state
            .borrow_mut()
            .push(url.to_string(), Screen::from_url(url))
    }

    async fn back(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.site.broken_back {
            return Ok(());
        }
        let history = state.history_mut()?;
        if history.len() > 1 {
            history.pop();
        }
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        let state = self.state.borrow();
        if state.site.broken_address {
            return Err(Error::Navigation("address unavailable".into()));
        }
        Ok(state.page()?.url.clone())
    }

    async fn count(&self, node: &Node) -> Result<usize> {
        let doc = self.state.borrow().render()?;
        Ok(resolve(&doc, node).0.len())
    }

    async fn read(&self, node: &Node, attribute: Option<&str>) -> Result<Option<String>> {
        let Some(el) = self.resolve(node)? else {
            return Ok(None);
        };
        if let Some(index) = el.probe {
            *self.state.borrow_mut().title_reads.entry(index).or_insert(0) += 1;
        }
        Ok(match attribute {
            None => Some(el.text),
            Some("value") => el.value,
            Some(_) => None,
        })
    }

    async fn click(&self, node: &Node) -> Result<()> {
        let el = self.require(node)?;
        if self.state.borrow().site.blocked_clicks {
            return Err(Error::InteractionBlocked(node.to_string()));
        }
        self.perform(el)
    }

    async fn script_click(&self, node: &Node) -> Result<()> {
        let el = self.require(node)?;
        self.state.borrow_mut().script_clicks += 1;
        self.perform(el)
    }

    async fn fill(&self, node: &Node, value: &str) -> Result<()> {
        self.require(node)?;
        self.state
            .borrow_mut()
            .fills
            .push((node.to_string(), value.to_string()));
        Ok(())
    }

    async fn select_option(&self, node: &Node, label: &str) -> Result<()> {
        let el = self.require(node)?;
        if !el.options.iter().any(|o| o == label) {
            return Err(Error::ElementMissing(format!("option '{}' in {}", label, node)));
        }
        let mut state = self.state.borrow_mut();
        let page = state.page_mut()?;
        if let Screen::Quantity { ref mut selected, .. } = page.screen {
            *selected = Some(label.to_string());
        }
        Ok(())
    }

    async fn scroll_into_view(&self, node: &Node) -> Result<()> {
        self.require(node).map(|_| ())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.state.borrow_mut().keys.push(key.to_string());
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<u64> {
        let mut state = self.state.borrow_mut();
        let extent = match state.page()?.screen {
            Screen::Compare { batches, .. } => 100 * batches as u64,
            _ => 100,
        };
        state.extents.push(extent);
        Ok(extent)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        let screen = state.page()?.screen.clone();
        if let Screen::Compare {
            event,
            seat,
            batches,
        } = screen
        {
            if state.site.endless_scroll || batches < state.total_batches(event, seat) {
                state.page_mut()?.screen = Screen::Compare {
                    event,
                    seat,
                    batches: batches + 1,
                };
            }
        }
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        self.state.borrow().page()?;
        Ok(b"\x89PNG fake".to_vec())
    }

    async fn page_source(&self) -> Result<String> {
        let url = self.state.borrow().page()?.url.clone();
        Ok(format!("<html><body data-url=\"{}\"></body></html>", url))
    }

    async fn quit(self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Locator;

    #[tokio::test]
    async fn test_wizard_walkthrough() {
        let mut driver = FakeDriver::new(FakeSite::with_events(1, 2, 1));
        driver.open("fake://event/0").await.unwrap();

        let qty = Node::first(&Locator::css("select[name=quantity]"));
        driver.select_option(&qty, "1 Ticket").await.unwrap();
        driver.click(&Node::first(&Locator::css(".qty-next"))).await.unwrap();
        driver.click(&Node::first(&Locator::css(".qty-continue"))).await.unwrap();
        driver.click(&Node::first(&Locator::css(".etickets"))).await.unwrap();
        driver.click(&Node::first(&Locator::css(".type-continue"))).await.unwrap();

        let toggle = Node::first(&Locator::css(".seat-control"))
            .child(&Locator::css(".seat-toggle"), Nth::First);
        driver.click(&toggle).await.unwrap();
        assert_eq!(driver.count(&Node::first(&Locator::css(".seat-option"))).await.unwrap(), 2);
        driver.click(&Node::nth(&Locator::css(".seat-option"), 1)).await.unwrap();
        driver.click(&Node::first(&Locator::css(".seat-continue"))).await.unwrap();

        let price = driver
            .read(&Node::first(&Locator::css("input[name=price]")), Some("value"))
            .await
            .unwrap();
        assert_eq!(price.as_deref(), Some("30.00"));

        driver.back().await.unwrap();
        assert!(driver.exists(&Node::first(&Locator::css(".seat-control"))).await.unwrap());
    }

    #[tokio::test]
    async fn test_text_locator_matches_innermost() {
        let mut driver = FakeDriver::new(FakeSite::with_events(1, 1, 1));
        driver.open("fake://event/0").await.unwrap();
        let mut state = driver.state.borrow_mut();
        state.page_mut().unwrap().screen = Screen::Price { event: 0, seat: 0 };
        drop(state);

        let link = Node::first(&Locator::text("compare similar"));
        assert_eq!(driver.count(&link).await.unwrap(), 1);
        driver.click(&link).await.unwrap();
        assert_eq!(driver.contexts().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_blocked_click_needs_script_click() {
        let mut site = FakeSite::with_events(1, 1, 1);
        site.blocked_clicks = true;
        let mut driver = FakeDriver::new(site);
        driver.open(LIST_URL).await.unwrap();

        let card = Node::nth(&Locator::css(".event-card"), 0);
        assert!(matches!(
            driver.click(&card).await,
            Err(Error::InteractionBlocked(_))
        ));
        driver.script_click(&card).await.unwrap();
        assert_eq!(driver.script_clicks(), 1);
        assert_eq!(driver.contexts().await.unwrap().len(), 2);
    }
}
