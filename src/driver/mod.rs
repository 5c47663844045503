//! The browser-automation surface the harvester consumes.
//!
//! Elements are never held across calls: every operation takes a [`Node`],
//! a chain of locators resolved afresh against the live page. Re-rendering
//! pages invalidate element handles, so re-resolution is the only safe model.

mod chrome;
#[cfg(test)]
pub(crate) mod fake;

pub use chrome::ChromeDriver;

use crate::config::{Locator, Pick};
use crate::Result;
use std::fmt;

/// Identifier of one browsing context (tab).
pub type ContextId = String;

/// Which of a locator's matches a step refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Nth {
    First,
    Last,
    Index(usize),
}

impl Nth {
    /// Whether `count` matches are enough for this pick to resolve.
    pub fn within(self, count: usize) -> bool {
        match self {
            Nth::First | Nth::Last => count > 0,
            Nth::Index(i) => i < count,
        }
    }
}

impl From<Pick> for Nth {
    fn from(pick: Pick) -> Self {
        match pick {
            Pick::First => Nth::First,
            Pick::Last => Nth::Last,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    pub locator: Locator,
    pub nth: Nth,
}

/// A path to one element: each step is resolved inside the element picked by
/// the previous one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    steps: Vec<Step>,
}

impl Node {
    pub fn at(locator: &Locator, nth: Nth) -> Self {
        Self {
            steps: vec![Step {
                locator: locator.clone(),
                nth,
            }],
        }
    }

    pub fn first(locator: &Locator) -> Self {
        Self::at(locator, Nth::First)
    }

    pub fn nth(locator: &Locator, index: usize) -> Self {
        Self::at(locator, Nth::Index(index))
    }

    /// A node resolved inside this one.
    pub fn child(&self, locator: &Locator, nth: Nth) -> Self {
        let mut steps = self.steps.clone();
        steps.push(Step {
            locator: locator.clone(),
            nth,
        });
        Self { steps }
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// The final step; nodes always have at least one.
    pub fn leaf(&self) -> &Step {
        &self.steps[self.steps.len() - 1]
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" >> ")?;
            }
            write!(f, "{}", step.locator)?;
            match step.nth {
                Nth::First => {}
                Nth::Last => f.write_str("[last]")?,
                Nth::Index(n) => write!(f, "[{}]", n)?,
            }
        }
        Ok(())
    }
}

/// True for the address a freshly opened tab reports before its first
/// navigation commits.
pub(crate) fn is_blank(url: &str) -> bool {
    let url = url.trim();
    url.is_empty() || url == "about:blank"
}

/// Browser automation driver. Page operations target the active context.
///
/// Commands are issued one at a time by a single controller; implementations
/// need no internal synchronization beyond what `&self` methods require.
#[allow(async_fn_in_trait)]
pub trait Driver {
    /// Open a new context at `url` and make it active.
    async fn open(&mut self, url: &str) -> Result<ContextId>;

    /// Every live context, including ones opened by the page.
    async fn contexts(&self) -> Result<Vec<ContextId>>;

    /// Address of any context, without activating it. A tab the page just
    /// opened may still report `about:blank` or an empty string.
    async fn context_url(&self, id: &str) -> Result<String>;

    async fn activate(&mut self, id: &str) -> Result<()>;

    async fn close_context(&mut self, id: &str) -> Result<()>;

    async fn navigate(&self, url: &str) -> Result<()>;

    async fn back(&self) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Number of elements matching the node's final locator inside its
    /// resolved parent; the final pick is ignored.
    async fn count(&self, node: &Node) -> Result<usize>;

    async fn exists(&self, node: &Node) -> Result<bool> {
        Ok(node.leaf().nth.within(self.count(node).await?))
    }

    /// Text of the element, or the named attribute/property. `None` when the
    /// node does not resolve.
    async fn read(&self, node: &Node, attribute: Option<&str>) -> Result<Option<String>>;

    /// Native click. Fails with `InteractionBlocked` when another element
    /// would receive it or the target is disabled.
    async fn click(&self, node: &Node) -> Result<()>;

    /// Click dispatched from script, bypassing hit testing.
    async fn script_click(&self, node: &Node) -> Result<()>;

    /// Clear the input and type `value`.
    async fn fill(&self, node: &Node, value: &str) -> Result<()>;

    /// Choose the `<select>` option whose visible text or value equals `label`.
    async fn select_option(&self, node: &Node, label: &str) -> Result<()>;

    async fn scroll_into_view(&self, node: &Node) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Current scrollable height of the document.
    async fn scroll_extent(&self) -> Result<u64>;

    async fn scroll_to_bottom(&self) -> Result<()>;

    async fn screenshot(&self) -> Result<Vec<u8>>;

    async fn page_source(&self) -> Result<String>;

    /// Shut the browser down.
    async fn quit(self) -> Result<()>
    where
        Self: Sized;
}
