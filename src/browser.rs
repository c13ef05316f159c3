use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use fantoccini::{Client, ClientBuilder, Locator};
use tracing::{debug, info, instrument};

use crate::error::ScrapeError;

/// WebDriver code point for the Enter key.
const ENTER_KEY: char = '\u{e007}';
const VISIBLE_TIMEOUT: Duration = Duration::from_secs(30);
const VISIBLE_POLL: Duration = Duration::from_millis(100);

/// Where the browser keeps authentication state between runs, so the identity provider
/// keeps recognising it and does not ask for a second factor every time.
pub trait SessionStore {
    /// Profile directory to launch the browser with, prepared for use.
    /// `None` means start from an empty profile.
    fn profile_dir(&self) -> Result<Option<PathBuf>, ScrapeError>;
}

/// Session state persisted in a local directory. The directory holds live login
/// cookies, so it is created owner-only.
#[derive(Debug, Clone)]
pub struct DirectorySessionStore {
    path: PathBuf,
}

impl DirectorySessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl SessionStore for DirectorySessionStore {
    fn profile_dir(&self) -> Result<Option<PathBuf>, ScrapeError> {
        let io_err = |source| ScrapeError::SessionStore { path: self.path.display().to_string(), source };
        if !self.path.exists() {
            std::fs::create_dir_all(&self.path).map_err(io_err)?;
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o700)).map_err(io_err)?;
            }
            info!(path = %self.path.display(), "Created browser session directory");
        }
        let absolute = std::fs::canonicalize(&self.path).map_err(io_err)?;
        Ok(Some(absolute))
    }
}

/// No persistence: every run logs in from scratch.
#[derive(Debug, Clone, Copy, Default)]
pub struct EphemeralSessionStore;

impl SessionStore for EphemeralSessionStore {
    fn profile_dir(&self) -> Result<Option<PathBuf>, ScrapeError> {
        Ok(None)
    }
}

/// The handful of browser actions the portal login and scrape need.
#[allow(async_fn_in_trait)]
pub trait PortalBrowser {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError>;

    /// Run a script in the current page, ignoring its result.
    async fn run_script(&mut self, script: &str) -> Result<(), ScrapeError>;

    /// Wait for an element matching `selector` and click it.
    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError>;

    /// Wait for an input matching `selector`, type `value` and press Enter.
    async fn submit_field(&mut self, selector: &str, value: &str) -> Result<(), ScrapeError>;

    /// Rendered HTML of the current page.
    async fn page_source(&mut self) -> Result<String, ScrapeError>;

    /// Give the page time to render. This is a fixed delay, not a completion signal.
    async fn settle(&mut self, ms: u64) {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }

    /// End the session and release the browser.
    async fn close(self) -> Result<(), ScrapeError>
    where
        Self: Sized;
}

/// Run `check` every `interval` until it reports true or `timeout` has passed.
/// Returns whether the condition was met.
pub async fn poll_until<F, Fut>(timeout: Duration, interval: Duration, mut check: F) -> Result<bool, ScrapeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, ScrapeError>>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await? {
            return Ok(true);
        }
        if tokio::time::Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(interval).await;
    }
}

fn browser_err(e: impl std::fmt::Display) -> ScrapeError {
    ScrapeError::Browser(e.to_string())
}

/// Chrome driven over WebDriver (e.g. a local chromedriver).
pub struct WebDriverBrowser {
    client: Client,
}

impl WebDriverBrowser {
    /// Start a browser session against the WebDriver server at `webdriver_url`.
    #[instrument(level = "info", skip(store))]
    pub async fn launch(webdriver_url: &str, store: &impl SessionStore, headless: bool) -> Result<Self, ScrapeError> {
        let mut args: Vec<String> = Vec::new();
        if let Some(dir) = store.profile_dir()? {
            args.push(format!("--user-data-dir={}", dir.display()));
        }
        if headless {
            args.push("--headless=new".to_string());
        }

        let mut capabilities = serde_json::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), serde_json::json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(capabilities)
            .connect(webdriver_url)
            .await
            .map_err(browser_err)?;
        info!("Browser session started");
        Ok(Self { client })
    }
}

impl PortalBrowser for WebDriverBrowser {
    async fn goto(&mut self, url: &str) -> Result<(), ScrapeError> {
        debug!(url, "Navigating");
        self.client.goto(url).await.map_err(browser_err)
    }

    async fn run_script(&mut self, script: &str) -> Result<(), ScrapeError> {
        self.client.execute(script, Vec::new()).await.map(|_| ()).map_err(browser_err)
    }

    async fn click(&mut self, selector: &str) -> Result<(), ScrapeError> {
        let element = self.client.wait().for_element(Locator::Css(selector)).await.map_err(browser_err)?;
        // The login modal is in the DOM before it is shown; clicking it early is rejected.
        let target = &element;
        let visible = poll_until(VISIBLE_TIMEOUT, VISIBLE_POLL, move || async move {
            target.is_displayed().await.map_err(browser_err)
        })
        .await?;
        if !visible {
            return Err(ScrapeError::Browser(format!("{} never became visible", selector)));
        }
        element.click().await.map_err(browser_err)
    }

    async fn submit_field(&mut self, selector: &str, value: &str) -> Result<(), ScrapeError> {
        let element = self.client.wait().for_element(Locator::Css(selector)).await.map_err(browser_err)?;
        let mut keys = String::with_capacity(value.len() + 1);
        keys.push_str(value);
        keys.push(ENTER_KEY);
        element.send_keys(&keys).await.map_err(browser_err)
    }

    async fn page_source(&mut self) -> Result<String, ScrapeError> {
        self.client.source().await.map_err(browser_err)
    }

    async fn close(self) -> Result<(), ScrapeError> {
        self.client.close().await.map_err(browser_err)
    }
}
