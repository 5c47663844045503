use super::{click, press};
use crate::config::Action;
use crate::driver::{Driver, Node};
use crate::wait::Waiter;
use crate::{Error, Result};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run every setup action in order. A failed action is logged and skipped;
/// only an interrupt stops the sequence. Returns the number that failed.
pub async fn run<D: Driver>(
    driver: &D,
    waiter: &Waiter,
    actions: &[Action],
    step: Duration,
) -> Result<usize> {
    let mut failed = 0;
    for (i, action) in actions.iter().enumerate() {
        debug!("setup action {}/{}: {}", i + 1, actions.len(), action.name());
        match execute(driver, waiter, action, step).await {
            Ok(()) => {}
            Err(Error::Interrupted) => return Err(Error::Interrupted),
            Err(e) => {
                warn!("setup action {} ({}) failed: {}", i + 1, action.name(), e);
                failed += 1;
            }
        }
    }
    Ok(failed)
}

/// Execute a single setup action on the active context.
pub async fn execute<D: Driver>(
    driver: &D,
    waiter: &Waiter,
    action: &Action,
    step: Duration,
) -> Result<()> {
    match action {
        Action::Goto(a) => {
            info!("goto: {}", a.url);
            driver.navigate(&a.url).await?;
        }
        Action::Click(a) => {
            info!("click: {}", a.target);
            press(driver, waiter, &Node::first(&a.target), step).await?;
        }
        Action::TryClickAll(a) => {
            let node = Node::first(&a.target);
            let found = driver.count(&node).await?;
            let mut clicked = 0;
            // Dismissed elements usually leave the DOM, so keep taking the first.
            for _ in 0..found {
                if !driver.exists(&node).await? {
                    break;
                }
                match click(driver, &node).await {
                    Ok(()) => clicked += 1,
                    Err(e) => {
                        debug!("try_click_all: {} stopped: {}", a.target, e);
                        break;
                    }
                }
            }
            debug!("try_click_all: {} clicked {}/{}", a.target, clicked, found);
        }
        Action::Fill(a) => {
            info!("fill: {} = '{}'", a.target, a.value);
            let node = Node::first(&a.target);
            waiter.until_present(driver, &node, step).await?;
            driver.fill(&node, &a.value).await?;
        }
        Action::PressKey(a) => {
            debug!("press_key: {}", a.key);
            driver.press_key(&a.key).await?;
        }
        Action::ScrollToBottom => {
            debug!("scroll_to_bottom");
            driver.scroll_to_bottom().await?;
        }
        Action::WaitFor(a) => {
            debug!("wait_for: {}", a.target);
            let node = Node::first(&a.target);
            waiter
                .until_present(driver, &node, Duration::from_millis(a.timeout_ms))
                .await?;
        }
        Action::Pause(a) => {
            debug!("pause: {}ms", a.ms);
            waiter.pause(Duration::from_millis(a.ms)).await?;
        }
        Action::Screenshot(a) => {
            info!("screenshot: {}", a.path);
            let data = driver.screenshot().await?;
            std::fs::write(&a.path, data)?;
        }
        Action::Log(a) => {
            info!("[log] {}", a.message);
        }
        Action::WarnIfPresent(a) => {
            if driver.exists(&Node::first(&a.target)).await? {
                warn!("{}", a.message);
            } else {
                debug!("warn_if_present: {} absent", a.target);
            }
        }
    }
    Ok(())
}
