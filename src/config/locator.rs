use crate::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;

/// A rule identifying zero or more elements: a CSS selector, an XPath
/// expression, or visible text. Exactly one must be set.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq, Hash)]
pub struct Locator {
    /// CSS selector.
    pub css: Option<String>,
    /// XPath expression.
    pub xpath: Option<String>,
    /// Visible text (case-insensitive substring, innermost element wins).
    pub text: Option<String>,
}

/// Borrowed view of whichever locator kind is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query<'a> {
    Css(&'a str),
    XPath(&'a str),
    Text(&'a str),
}

impl Locator {
    pub fn css(selector: impl Into<String>) -> Self {
        Self {
            css: Some(selector.into()),
            ..Default::default()
        }
    }

    pub fn xpath(expr: impl Into<String>) -> Self {
        Self {
            xpath: Some(expr.into()),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }

    /// The configured query. Validated configs always have exactly one.
    pub fn query(&self) -> Query<'_> {
        match (&self.css, &self.xpath, &self.text) {
            (Some(css), _, _) => Query::Css(css),
            (_, Some(xpath), _) => Query::XPath(xpath),
            (_, _, Some(text)) => Query::Text(text),
            _ => Query::Css(""),
        }
    }

    pub(crate) fn validate(&self, at: &str) -> Result<()> {
        let set = [&self.css, &self.xpath, &self.text]
            .into_iter()
            .filter(|v| v.is_some())
            .count();
        if set != 1 {
            return Err(Error::Config(format!(
                "{at}: exactly one of css, xpath or text is required"
            )));
        }
        let empty = [&self.css, &self.xpath, &self.text]
            .into_iter()
            .flatten()
            .any(|v| v.trim().is_empty());
        if empty {
            return Err(Error::Config(format!("{at}: locator must not be empty")));
        }
        Ok(())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.query() {
            Query::Css(s) => write!(f, "css '{}'", s),
            Query::XPath(x) => write!(f, "xpath '{}'", x),
            Query::Text(t) => write!(f, "text '{}'", t),
        }
    }
}

/// Which match to use when a field's locator renders more than once.
#[derive(Debug, Clone, Copy, Deserialize, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Pick {
    #[default]
    First,
    Last,
}

/// How to read one named field.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FieldSpec {
    #[serde(flatten)]
    pub locator: Locator,
    #[serde(default)]
    pub pick: Pick,
    /// Read this attribute (or DOM property, e.g. `value`) instead of the text.
    pub attribute: Option<String>,
}

impl FieldSpec {
    pub fn new(locator: Locator) -> Self {
        Self {
            locator,
            pick: Pick::First,
            attribute: None,
        }
    }
}

/// Field name to spec. Ordered so extraction runs deterministically.
pub type FieldSpecs = BTreeMap<String, FieldSpec>;

pub(crate) fn validate_fields(specs: &FieldSpecs, at: &str, required: &[&str]) -> Result<()> {
    for name in required {
        if !specs.contains_key(*name) {
            return Err(Error::Config(format!("{at}: missing field '{name}'")));
        }
    }
    for (name, spec) in specs {
        spec.locator.validate(&format!("{at}.{name}"))?;
    }
    Ok(())
}
