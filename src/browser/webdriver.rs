//! WebDriver-backed rendering engine.
//!
//! Spawns the driver binary (chromedriver by default) as a child process,
//! connects a WebDriver session to it, and implements [`Browser`] on top.
//! The driver process is tied to the struct's lifetime; dropping it kills
//! the child.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Value, json};

use super::crop::Rect;
use super::{Browser, BrowserError};

/// Browser window size in CSS pixels. Chrome will not go below roughly
/// 500px wide; embeds that need to render narrower must constrain
/// themselves with a max-width block in the snippet.
const WINDOW_WIDTH: u32 = 600;
const WINDOW_HEIGHT: u32 = 1000;

/// Interval for the driver's own bounded element waits.
const WAIT_POLL: Duration = Duration::from_millis(100);

/// Attempts and spacing while waiting for the spawned driver to listen.
const CONNECT_ATTEMPTS: u32 = 20;
const CONNECT_RETRY: Duration = Duration::from_millis(250);

const FIRST_NODE_BY_XPATH: &str = "document.evaluate(arguments[0], document, null, \
     XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue";

/// How the engine is launched. Built from the application config.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// WebDriver binary to spawn.
    pub webdriver: String,
    /// Port the driver listens on.
    pub port: u16,
    /// Browser binary override; the driver's platform default otherwise.
    pub browser: Option<String>,
}

/// A WebDriver session plus the driver process backing it.
pub struct WebDriverBrowser {
    client: Client,
    // Held for its Drop: kill_on_drop reaps the driver with the session.
    _driver: tokio::process::Child,
}

impl WebDriverBrowser {
    /// Spawn the driver and establish a session sized for embed rendering.
    pub async fn launch(config: &BrowserConfig) -> Result<Self, BrowserError> {
        tracing::info!(
            webdriver = %config.webdriver,
            port = config.port,
            "launching rendering engine"
        );

        let driver = tokio::process::Command::new(&config.webdriver)
            .arg(format!("--port={}", config.port))
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;

        let mut chrome_options = json!({
            "args": ["--headless=new", "--hide-scrollbars"],
            // Suppresses the automation banner, which would end up in
            // screenshots.
            "excludeSwitches": ["enable-automation"],
        });
        if let Some(binary) = &config.browser {
            chrome_options["binary"] = Value::String(binary.clone());
        }
        let mut capabilities = serde_json::map::Map::new();
        capabilities.insert("goog:chromeOptions".to_string(), chrome_options);

        let url = format!("http://localhost:{}", config.port);
        let client = Self::connect_with_retry(&url, capabilities).await?;

        client.set_window_size(WINDOW_WIDTH, WINDOW_HEIGHT).await?;

        tracing::info!(window_width = WINDOW_WIDTH, window_height = WINDOW_HEIGHT, "rendering engine ready");

        Ok(Self { client, _driver: driver })
    }

    /// Connect to the driver, retrying while it starts listening.
    async fn connect_with_retry(
        url: &str,
        capabilities: serde_json::map::Map<String, Value>,
    ) -> Result<Client, BrowserError> {
        let mut attempt = 0;
        loop {
            match ClientBuilder::native()
                .capabilities(capabilities.clone())
                .connect(url)
                .await
            {
                Ok(client) => return Ok(client),
                Err(_) if attempt < CONNECT_ATTEMPTS => {
                    attempt += 1;
                    tracing::debug!(attempt, "driver not listening yet, retrying");
                    tokio::time::sleep(CONNECT_RETRY).await;
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    async fn eval_bool(&self, script: String, args: Vec<Value>) -> Result<bool, BrowserError> {
        let value = self.client.execute(&script, args).await?;
        Ok(value.as_bool().unwrap_or(false))
    }
}

#[async_trait]
impl Browser for WebDriverBrowser {
    async fn goto(&mut self, url: &str) -> Result<(), BrowserError> {
        Ok(self.client.goto(url).await?)
    }

    async fn enter_embed_frame(
        &mut self,
        within: Duration,
    ) -> Result<Option<Rect>, BrowserError> {
        let found = self
            .client
            .wait()
            .at_most(within)
            .every(WAIT_POLL)
            .for_element(Locator::Css("iframe"))
            .await;
        let element = match found {
            Ok(element) => element,
            Err(CmdError::WaitTimeout) => return Ok(None),
            Err(err) => return Err(err.into()),
        };

        let (x, y, w, h) = element.rectangle().await?;
        // Frame switches are session state; the client keeps operating
        // inside the frame until enter_parent_frame.
        element.enter_frame().await?;
        Ok(Some(Rect { x, y, w, h }))
    }

    async fn leave_frame(&mut self) -> Result<(), BrowserError> {
        self.client.enter_parent_frame().await?;
        Ok(())
    }

    async fn wait_present(
        &mut self,
        xpath: &str,
        within: Duration,
    ) -> Result<bool, BrowserError> {
        match self
            .client
            .wait()
            .at_most(within)
            .every(WAIT_POLL)
            .for_element(Locator::XPath(xpath))
            .await
        {
            Ok(_) => Ok(true),
            Err(CmdError::WaitTimeout) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn is_displayed(&mut self, xpath: &str) -> Result<bool, BrowserError> {
        match self.client.find(Locator::XPath(xpath)).await {
            Ok(element) => Ok(element.is_displayed().await?),
            Err(err) if err.is_no_such_element() => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    async fn rect_of(&mut self, xpath: &str) -> Result<Option<Rect>, BrowserError> {
        match self.client.find(Locator::XPath(xpath)).await {
            Ok(element) => {
                let (x, y, w, h) = element.rectangle().await?;
                Ok(Some(Rect { x, y, w, h }))
            }
            Err(err) if err.is_no_such_element() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn text_of(&mut self, xpath: &str) -> Result<Option<String>, BrowserError> {
        match self.client.find(Locator::XPath(xpath)).await {
            Ok(element) => Ok(Some(element.text().await?)),
            Err(err) if err.is_no_such_element() => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    async fn set_inner_html(&mut self, xpath: &str, html: &str) -> Result<bool, BrowserError> {
        let script = format!(
            "const node = {FIRST_NODE_BY_XPATH};\
             if (!node) {{ return false; }}\
             node.innerHTML = arguments[1];\
             return true;"
        );
        self.eval_bool(
            script,
            vec![Value::String(xpath.to_string()), Value::String(html.to_string())],
        )
        .await
    }

    async fn image_decoded(&mut self, xpath: &str) -> Result<bool, BrowserError> {
        // is_displayed() alone is not enough: a visible <img> may not have
        // decoded pixel data yet, and a screenshot taken then captures a
        // blank box.
        let script = format!(
            "const node = {FIRST_NODE_BY_XPATH};\
             return !!node && !!node.complete && node.naturalWidth > 0 \
                && node.getClientRects().length > 0;"
        );
        self.eval_bool(script, vec![Value::String(xpath.to_string())]).await
    }

    async fn all_images_decoded(&mut self) -> Result<bool, BrowserError> {
        let script = "return Array.from(document.images).every((img) => \
             img.complete && img.naturalWidth > 0 && img.getClientRects().length > 0);";
        self.eval_bool(script.to_string(), Vec::new()).await
    }

    async fn viewport_width(&mut self) -> Result<f64, BrowserError> {
        let value = self
            .client
            .execute("return window.innerWidth;", Vec::new())
            .await?;
        Ok(value.as_f64().unwrap_or(0.0))
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, BrowserError> {
        Ok(self.client.screenshot().await?)
    }
}
