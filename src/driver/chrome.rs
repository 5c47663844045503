//! [`Driver`] over a stealth Chrome instance driven by `eoka`.

use super::{ContextId, Driver, Node, Nth};
use crate::config::{BrowserConfig, Query};
use crate::{Error, Result};
use eoka::{Browser, Page};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

/// Counter for element refs handed to CSS-based eoka calls.
static REF_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Resolves a node path (`[{q, nth}]`) to `{all, el}`: every match of the last
/// step and the picked one.
const RESOLVE_JS: &str = r#"((steps) => {
    const matchAll = (root, q) => {
        const doc = root.ownerDocument || root;
        if (q.css !== undefined) return Array.from(root.querySelectorAll(q.css));
        if (q.xpath !== undefined) {
            const snap = doc.evaluate(q.xpath, root, null, XPathResult.ORDERED_NODE_SNAPSHOT_TYPE, null);
            const out = [];
            for (let i = 0; i < snap.snapshotLength; i++) {
                const n = snap.snapshotItem(i);
                if (n.nodeType === 1) out.push(n);
            }
            return out;
        }
        const needle = q.text.trim().toLowerCase();
        const has = (el) => (el.textContent || '').toLowerCase().includes(needle);
        const start = root === doc ? doc.body : root;
        const out = [];
        const walker = doc.createTreeWalker(start, NodeFilter.SHOW_ELEMENT, null);
        while (walker.nextNode()) {
            const el = walker.currentNode;
            if (has(el) && !Array.from(el.children).some(has)) out.push(el);
        }
        return out;
    };
    const pick = (list, nth) =>
        nth === 'first' ? list[0] : nth === 'last' ? list[list.length - 1] : list[nth];
    let root = document;
    for (let i = 0; i < steps.length - 1; i++) {
        const el = pick(matchAll(root, steps[i].q), steps[i].nth);
        if (!el) return { all: [], el: null };
        root = el;
    }
    const last = steps[steps.length - 1];
    const all = matchAll(root, last.q);
    return { all, el: pick(all, last.nth) || null };
})"#;

/// Outcome of tagging an element for a native click.
#[derive(Debug, Deserialize)]
struct Tagged {
    status: String,
    selector: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReadResult {
    found: bool,
    value: Option<String>,
}

/// Chrome via `eoka`. Tabs opened by the page are adopted on first
/// activation by reopening their address in a controlled page.
pub struct ChromeDriver {
    browser: Browser,
    pages: HashMap<ContextId, Page>,
    /// Tab id seen by the caller -> id of the page that replaced it.
    adopted: HashMap<ContextId, ContextId>,
    active: Option<ContextId>,
}

impl ChromeDriver {
    /// Launch a browser with the configured stealth settings.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let stealth = eoka::StealthConfig {
            headless: config.headless,
            proxy: config.proxy.clone(),
            user_agent: config.user_agent.clone(),
            viewport_width: config.viewport.as_ref().map(|v| v.width).unwrap_or(1280),
            viewport_height: config.viewport.as_ref().map(|v| v.height).unwrap_or(720),
            ..Default::default()
        };

        debug!(
            "Launching browser (headless: {}, proxy: {:?})",
            config.headless, config.proxy
        );
        let browser = Browser::launch_with_config(stealth).await?;
        Ok(Self {
            browser,
            pages: HashMap::new(),
            adopted: HashMap::new(),
            active: None,
        })
    }

    fn resolve_id<'a>(&'a self, id: &'a str) -> &'a str {
        self.adopted.get(id).map(|s| s.as_str()).unwrap_or(id)
    }

    fn page(&self) -> Result<&Page> {
        self.active
            .as_ref()
            .and_then(|id| self.pages.get(id))
            .ok_or_else(|| Error::Navigation("no active context".into()))
    }

    /// Take control of a tab the page opened: reopen its address and close
    /// the original.
    async fn adopt(&mut self, id: &str) -> Result<ContextId> {
        let tabs = self.browser.tabs().await?;
        let tab = tabs
            .iter()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::Navigation(format!("context {} not found", id)))?;
        let url = tab.url.clone();
        if super::is_blank(&url) {
            return Err(Error::Navigation(format!(
                "context {} has no address yet",
                id
            )));
        }
        debug!("adopting context {} at {}", id, url);
        let page = self.browser.new_page(&url).await?;
        let page_id = page.target_id().to_string();
        self.browser.close_tab(id).await?;
        self.pages.insert(page_id.clone(), page);
        self.adopted.insert(id.to_string(), page_id.clone());
        Ok(page_id)
    }

    /// Wrap `body` so it runs with `el` (the resolved element) and `all` bound.
    fn script(node: &Node, body: &str) -> String {
        let steps: Vec<Value> = node
            .steps()
            .iter()
            .map(|step| {
                let q = match step.locator.query() {
                    Query::Css(s) => json!({ "css": s }),
                    Query::XPath(x) => json!({ "xpath": x }),
                    Query::Text(t) => json!({ "text": t }),
                };
                let nth = match step.nth {
                    Nth::First => json!("first"),
                    Nth::Last => json!("last"),
                    Nth::Index(i) => json!(i),
                };
                json!({ "q": q, "nth": nth })
            })
            .collect();
        format!(
            "(() => {{ const __r = {resolve}({steps}); const el = __r.el; const all = __r.all; {body} }})()",
            resolve = RESOLVE_JS,
            steps = Value::Array(steps),
        )
    }

    /// Tag the element with a unique attribute so CSS-only eoka calls can
    /// address it. Hit-tests the element's center first.
    async fn tag(&self, node: &Node, hit_test: bool) -> Result<String> {
        let id = REF_COUNTER.fetch_add(1, Ordering::Relaxed);
        let body = format!(
            r#"if (!el) return {{ status: 'missing' }};
            el.scrollIntoView({{ block: 'center' }});
            if ({hit_test}) {{
                if (el.disabled) return {{ status: 'blocked' }};
                const rect = el.getBoundingClientRect();
                const top = document.elementFromPoint(rect.x + rect.width / 2, rect.y + rect.height / 2);
                if (!top || !(top === el || el.contains(top) || top.contains(el))) return {{ status: 'blocked' }};
            }}
            el.setAttribute('data-harvest-ref', '{id}');
            return {{ status: 'ok', selector: '[data-harvest-ref="{id}"]' }};"#
        );
        let tagged: Tagged = self.page()?.evaluate(&Self::script(node, &body)).await?;
        match (tagged.status.as_str(), tagged.selector) {
            ("ok", Some(selector)) => Ok(selector),
            ("blocked", _) => Err(Error::InteractionBlocked(node.to_string())),
            _ => Err(Error::ElementMissing(node.to_string())),
        }
    }
}

impl Driver for ChromeDriver {
    async fn open(&mut self, url: &str) -> Result<ContextId> {
        let page = self.browser.new_page(url).await?;
        let id = page.target_id().to_string();
        self.browser.activate_tab(&id).await?;
        self.pages.insert(id.clone(), page);
        self.active = Some(id.clone());
        Ok(id)
    }

    async fn contexts(&self) -> Result<Vec<ContextId>> {
        let tabs = self.browser.tabs().await?;
        Ok(tabs
            .into_iter()
            .map(|tab| {
                self.adopted
                    .iter()
                    .find(|(_, page_id)| **page_id == tab.id)
                    .map(|(seen, _)| seen.clone())
                    .unwrap_or(tab.id)
            })
            .collect())
    }

    async fn context_url(&self, id: &str) -> Result<String> {
        let resolved = self.resolve_id(id);
        if let Some(page) = self.pages.get(resolved) {
            return Ok(page.url().await?);
        }
        let tabs = self.browser.tabs().await?;
        tabs.into_iter()
            .find(|t| t.id == resolved)
            .map(|t| t.url)
            .ok_or_else(|| Error::Navigation(format!("context {} not found", id)))
    }

    async fn activate(&mut self, id: &str) -> Result<()> {
        let resolved = self.resolve_id(id).to_string();
        let page_id = if self.pages.contains_key(&resolved) {
            resolved
        } else {
            self.adopt(&resolved).await?
        };
        self.browser.activate_tab(&page_id).await?;
        self.active = Some(page_id);
        Ok(())
    }

    async fn close_context(&mut self, id: &str) -> Result<()> {
        let resolved = self.resolve_id(id).to_string();
        self.browser.close_tab(&resolved).await?;
        self.pages.remove(&resolved);
        self.adopted.remove(id);
        if self.active.as_deref() == Some(resolved.as_str()) {
            self.active = None;
        }
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.page()?.goto(url).await?;
        Ok(())
    }

    async fn back(&self) -> Result<()> {
        self.page()?.back().await?;
        Ok(())
    }

    async fn current_url(&self) -> Result<String> {
        Ok(self.page()?.url().await?)
    }

    async fn count(&self, node: &Node) -> Result<usize> {
        let js = Self::script(node, "return all.length;");
        Ok(self.page()?.evaluate(&js).await?)
    }

    async fn read(&self, node: &Node, attribute: Option<&str>) -> Result<Option<String>> {
        let attr = serde_json::to_string(&attribute)?;
        let body = format!(
            r#"if (!el) return {{ found: false, value: null }};
            const name = {attr};
            if (name === null) return {{ found: true, value: (el.innerText ?? el.textContent ?? '') }};
            const v = (name in el) ? el[name] : el.getAttribute(name);
            return {{ found: true, value: v === null || v === undefined ? null : String(v) }};"#
        );
        let result: ReadResult = self.page()?.evaluate(&Self::script(node, &body)).await?;
        Ok(if result.found { result.value } else { None })
    }

    async fn click(&self, node: &Node) -> Result<()> {
        let selector = self.tag(node, true).await?;
        self.page()?
            .click(&selector)
            .await
            .map_err(|e| Error::InteractionBlocked(format!("{}: {}", node, e)))
    }

    async fn script_click(&self, node: &Node) -> Result<()> {
        let js = Self::script(node, "if (!el) return false; el.click(); return true;");
        let clicked: bool = self.page()?.evaluate(&js).await?;
        if clicked {
            Ok(())
        } else {
            Err(Error::ElementMissing(node.to_string()))
        }
    }

    async fn fill(&self, node: &Node, value: &str) -> Result<()> {
        let selector = self.tag(node, false).await?;
        self.page()?.fill(&selector, value).await?;
        Ok(())
    }

    async fn select_option(&self, node: &Node, label: &str) -> Result<()> {
        let body = format!(
            r#"if (!el) return 'element_not_found';
            const label = {label};
            const opt = Array.from(el.options || []).find(o => o.text.trim() === label || o.value === label);
            if (!opt) return 'option_not_found';
            el.value = opt.value;
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return 'ok';"#,
            label = serde_json::to_string(label)?
        );
        let result: String = self.page()?.evaluate(&Self::script(node, &body)).await?;
        match result.as_str() {
            "ok" => Ok(()),
            "element_not_found" => Err(Error::ElementMissing(node.to_string())),
            "option_not_found" => Err(Error::ElementMissing(format!(
                "option '{}' in {}",
                label, node
            ))),
            other => Err(Error::Navigation(format!("select failed: {}", other))),
        }
    }

    async fn scroll_into_view(&self, node: &Node) -> Result<()> {
        let js = Self::script(
            node,
            "if (!el) return false; el.scrollIntoView({ block: 'center' }); return true;",
        );
        let found: bool = self.page()?.evaluate(&js).await?;
        if found {
            Ok(())
        } else {
            Err(Error::ElementMissing(node.to_string()))
        }
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.page()?.human().press_key(key).await?;
        Ok(())
    }

    async fn scroll_extent(&self) -> Result<u64> {
        let height: f64 = self
            .page()?
            .evaluate(
                "Math.max(document.body.scrollHeight, document.documentElement.scrollHeight)",
            )
            .await?;
        Ok(height as u64)
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page()?
            .execute("window.scrollTo(0, document.body.scrollHeight)")
            .await?;
        Ok(())
    }

    async fn screenshot(&self) -> Result<Vec<u8>> {
        Ok(self.page()?.screenshot().await?)
    }

    async fn page_source(&self) -> Result<String> {
        Ok(self.page()?.content().await?)
    }

    async fn quit(self) -> Result<()> {
        self.browser.close().await?;
        Ok(())
    }
}
