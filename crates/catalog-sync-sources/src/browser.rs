use crate::error::SourceError;
use crate::scraper::PageFetcher;
use async_trait::async_trait;
use catalog_sync_config::{ImdbConfig, PathManager};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::element::Element;
use chromiumoxide::fetcher::{BrowserFetcher, BrowserFetcherOptions};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use which::which;

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const MAX_HANDLER_ERRORS: usize = 10;

#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Persistent profile, keeps cookies (and the IMDB login) between runs
    pub profile_dir: PathBuf,
    pub executable: Option<PathBuf>,
    pub headless: bool,
}

impl BrowserOptions {
    pub fn from_config(config: &ImdbConfig, paths: &PathManager) -> Self {
        Self {
            profile_dir: paths.browser_profile_dir(),
            executable: config.browser_executable.clone(),
            headless: config.headless,
        }
    }
}

/// A headless Chromium with a single page, owned by one run.
///
/// Every scraper and the IMDB list adapter drive the browser through this
/// type, so DOM polling is always the bounded [`BrowserSession::wait_for`].
pub struct BrowserSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler_task: Option<JoinHandle<()>>,
}

impl BrowserSession {
    pub async fn launch(options: &BrowserOptions) -> Result<Self, SourceError> {
        let executable = match options.executable.clone().or_else(find_system_chromium) {
            Some(path) => path,
            None => fetch_chromium(&options.profile_dir).await?,
        };

        let config = build_browser_config(&executable, options)
            .map_err(SourceError::SessionAcquisition)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SourceError::SessionAcquisition(format!("failed to launch browser: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            let mut error_count = 0;
            while let Some(event) = handler.next().await {
                match event {
                    Ok(_) => error_count = 0,
                    Err(e) => {
                        error_count += 1;
                        warn!("Browser handler error ({}/{}): {:?}", error_count, MAX_HANDLER_ERRORS, e);
                        if error_count >= MAX_HANDLER_ERRORS {
                            error!("Browser handler stopped after {} consecutive errors", error_count);
                            break;
                        }
                    }
                }
            }
            debug!("Browser handler task ended");
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| SourceError::SessionAcquisition(format!("failed to open page: {}", e)))?;

        info!(executable = %executable.display(), "Browser session started");

        Ok(Self {
            browser: Some(browser),
            page: Some(page),
            handler_task: Some(handler_task),
        })
    }

    pub fn page(&self) -> Result<&Page, SourceError> {
        self.page
            .as_ref()
            .ok_or_else(|| SourceError::SessionLost("browser session already closed".to_string()))
    }

    pub async fn goto(&self, url: &str) -> Result<(), SourceError> {
        debug!("Navigating to {}", url);
        let page = self.page()?;
        page.goto(url).await?;
        page.wait_for_navigation().await?;
        Ok(())
    }

    /// Poll for `selector` until it appears or `timeout` passes
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<Option<Element>, SourceError> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Ok(element) = page.find_element(selector).await {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                debug!("Timed out after {:?} waiting for '{}'", timeout, selector);
                return Ok(None);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Trimmed inner text of every match, in document order
    pub async fn texts(&self, selector: &str) -> Result<Vec<String>, SourceError> {
        let page = self.page()?;
        let elements = match page.find_elements(selector).await {
            Ok(elements) => elements,
            Err(_) => return Ok(Vec::new()),
        };
        let mut texts = Vec::with_capacity(elements.len());
        for element in elements {
            if let Some(text) = element.inner_text().await? {
                texts.push(text.trim().to_string());
            }
        }
        Ok(texts)
    }

    /// Wait for `selector`, then click it. Returns false if it never appeared.
    pub async fn click(&self, selector: &str, timeout: Duration) -> Result<bool, SourceError> {
        match self.wait_for(selector, timeout).await? {
            Some(element) => {
                element.click().await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run a script in the page, awaiting a returned promise
    pub async fn evaluate(&self, script: &str) -> Result<serde_json::Value, SourceError> {
        let page = self.page()?;
        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .build()
            .map_err(SourceError::Rejected)?;
        let result = page.evaluate_expression(params).await?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    /// Liveness probe for long runs
    pub async fn check_health(&self) -> Result<(), SourceError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| SourceError::SessionLost("browser session already closed".to_string()))?;
        browser
            .version()
            .await
            .map(|_| ())
            .map_err(|e| SourceError::SessionLost(format!("browser not responding: {}", e)))
    }

    pub async fn close(&mut self) -> Result<(), SourceError> {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                warn!("Failed to close page: {}", e);
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            let _ = browser.wait().await;
            info!("Browser session closed");
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        Ok(())
    }
}

#[async_trait]
impl PageFetcher for BrowserSession {
    async fn fetch_page(&mut self, url: &str) -> Result<String, SourceError> {
        self.goto(url).await?;
        Ok(self.page()?.content().await?)
    }
}

impl Drop for BrowserSession {
    fn drop(&mut self) {
        if self.browser.is_some() {
            debug!("Browser session dropped without close(), process is killed with the handle");
        }
        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
    }
}

fn build_browser_config(executable: &Path, options: &BrowserOptions) -> Result<BrowserConfig, String> {
    let mut builder = BrowserConfig::builder()
        .chrome_executable(executable)
        .user_data_dir(&options.profile_dir)
        .request_timeout(Duration::from_secs(30));

    if !options.headless {
        builder = builder.with_head();
    }

    if !cfg!(target_os = "macos") {
        builder = builder.arg("--no-sandbox").arg("--disable-dev-shm-usage");
    }

    builder
        .arg("--disable-extensions")
        .arg("--disable-notifications")
        .arg("--log-level=3")
        .arg("--disable-sync")
        .arg("--disable-default-apps")
        .arg("--window-size=1280,900")
        .build()
}

fn find_system_chromium() -> Option<PathBuf> {
    let candidates = [
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/usr/local/bin/chromium",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    ];
    for path in candidates {
        if Path::new(path).exists() {
            return Some(PathBuf::from(path));
        }
    }

    which("chromium")
        .or_else(|_| which("chromium-browser"))
        .or_else(|_| which("google-chrome"))
        .ok()
}

async fn fetch_chromium(profile_dir: &Path) -> Result<PathBuf, SourceError> {
    info!("No system Chromium found, downloading via BrowserFetcher...");
    let download_dir = profile_dir
        .parent()
        .unwrap_or(profile_dir)
        .join("chromium_downloads");
    tokio::fs::create_dir_all(&download_dir)
        .await
        .map_err(|e| SourceError::SessionAcquisition(format!("cannot create {}: {}", download_dir.display(), e)))?;

    let options = BrowserFetcherOptions::builder()
        .with_path(&download_dir)
        .build()
        .map_err(|e| SourceError::SessionAcquisition(format!("invalid fetcher options: {}", e)))?;
    let installation = BrowserFetcher::new(options)
        .fetch()
        .await
        .map_err(|e| SourceError::SessionAcquisition(format!("failed to fetch Chromium: {}", e)))?;

    info!("Chromium downloaded to {}", installation.executable_path.display());
    Ok(installation.executable_path)
}
