use crate::config::OnFailure;
use crate::driver::Driver;
use crate::Result;
use chrono::Local;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Screenshot and page-source dumps for failed units.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    dir: PathBuf,
    page_source: bool,
}

impl Diagnostics {
    pub fn new(dir: impl AsRef<Path>, page_source: bool) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            page_source,
        }
    }

    pub fn from_config(on_failure: &OnFailure) -> Self {
        Self::new(&on_failure.dir, on_failure.page_source)
    }

    /// Dump the active context. Failures are logged, never returned.
    /// Returns the screenshot path when one was written.
    pub async fn capture<D: Driver>(&self, driver: &D, label: &str) -> Option<PathBuf> {
        let stem = format!("{}_{}", slug(label), Local::now().format("%Y%m%d_%H%M%S_%3f"));
        match self.dump(driver, &stem).await {
            Ok(path) => {
                info!("saved diagnostics to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("failed to save diagnostics for '{}': {}", label, e);
                None
            }
        }
    }

    async fn dump<D: Driver>(&self, driver: &D, stem: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let png = self.dir.join(format!("{stem}.png"));
        std::fs::write(&png, driver.screenshot().await?)?;
        if self.page_source {
            let html = self.dir.join(format!("{stem}.html"));
            std::fs::write(html, driver.page_source().await?)?;
        }
        Ok(png)
    }
}

/// File-name-safe form of a free-text label.
fn slug(label: &str) -> String {
    static NON_WORD: OnceLock<Regex> = OnceLock::new();
    let re = NON_WORD.get_or_init(|| Regex::new(r"[^A-Za-z0-9]+").expect("static regex"));
    let slug = re.replace_all(label, "_");
    let slug: String = slug.trim_matches('_').to_lowercase().chars().take(60).collect();
    if slug.is_empty() {
        "capture".into()
    } else {
        slug
    }
}
