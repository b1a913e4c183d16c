pub mod error;

pub use error::{BrowserClientError, Result};

use std::path::PathBuf;

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tracing::{debug, info, warn};

/// One headless-Chrome session: a browser process, its CDP event loop, and
/// a single page. Scoped to one fetch call — construct, use, `close`.
/// Dropping without `close` still kills the browser via the kill-on-drop
/// child handle; `close` is the clean path.
pub struct ChromeSession {
    browser: Browser,
    page: Page,
    handler_task: tokio::task::JoinHandle<()>,
}

impl ChromeSession {
    /// Launch headless Chrome and open a blank page.
    pub async fn launch(chrome_bin: Option<&str>) -> Result<Self> {
        let mut builder = BrowserConfig::builder();
        if let Some(bin) = chrome_bin.map(PathBuf::from).or_else(find_chrome_binary) {
            builder = builder.chrome_executable(bin);
        }

        let config = builder
            .args(vec![
                "--headless=new",
                "--disable-gpu",
                "--disable-dev-shm-usage",
                "--no-sandbox",
                "--window-size=1920,1080",
            ])
            .build()
            .map_err(BrowserClientError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserClientError::Launch(e.to_string()))?;

        // CDP websocket event loop. Must be polled for the session to work.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            debug!("Chrome event loop exited");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserClientError::Session(e.to_string()))?;

        info!("Chrome session launched");
        Ok(Self {
            browser,
            page,
            handler_task,
        })
    }

    /// Navigate and wait for the page load to settle.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserClientError::Navigate {
                url: url.to_string(),
                details: e.to_string(),
            })?
            .wait_for_navigation()
            .await
            .map_err(|e| BrowserClientError::Navigate {
                url: url.to_string(),
                details: e.to_string(),
            })?;
        Ok(())
    }

    /// Number of elements currently matching `selector`.
    pub async fn count(&self, selector: &str) -> Result<usize> {
        match self.page.find_elements(selector).await {
            Ok(elements) => Ok(elements.len()),
            // find_elements errors when nothing matches; treat as zero
            Err(_) => Ok(0),
        }
    }

    /// Click the `index`-th element matching `selector`. Returns false when
    /// no such element exists.
    pub async fn click_nth(&self, selector: &str, index: usize) -> Result<bool> {
        let elements = match self.page.find_elements(selector).await {
            Ok(e) => e,
            Err(_) => return Ok(false),
        };
        let Some(element) = elements.into_iter().nth(index) else {
            return Ok(false);
        };
        element
            .click()
            .await
            .map_err(|e| BrowserClientError::Session(e.to_string()))?;
        Ok(true)
    }

    /// For each element matching `container`, read the inner text of each
    /// child field selector. One page-side evaluation, no per-field round trips.
    pub async fn extract_records(
        &self,
        container: &str,
        fields: &[&str],
    ) -> Result<Vec<Vec<Option<String>>>> {
        let container_json = serde_json::to_string(container)
            .map_err(|e| BrowserClientError::Session(e.to_string()))?;
        let fields_json = serde_json::to_string(fields)
            .map_err(|e| BrowserClientError::Session(e.to_string()))?;

        let script = format!(
            r#"Array.from(document.querySelectorAll({container_json})).map(el =>
                {fields_json}.map(sel => {{
                    const child = el.querySelector(sel);
                    return child ? child.innerText : null;
                }})
            )"#
        );

        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserClientError::Session(e.to_string()))?;

        result
            .into_value()
            .map_err(|e| BrowserClientError::Session(e.to_string()))
    }

    /// Current rendered DOM as HTML.
    pub async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| BrowserClientError::Session(e.to_string()))
    }

    /// Shut the browser down and stop the event loop.
    pub async fn close(mut self) -> Result<()> {
        if let Err(e) = self.browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        let _ = self.browser.wait().await;
        self.handler_task.abort();
        Ok(())
    }
}

fn find_chrome_binary() -> Option<PathBuf> {
    let candidates = [
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
    ];
    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
