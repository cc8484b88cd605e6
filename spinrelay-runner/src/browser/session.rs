use std::time::Duration;

use thirtyfour::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BrowserKind {
    Chrome,
    Edge,
    Firefox,
    Safari,
}

impl BrowserKind {
    /// Where a locally started driver listens by default.
    pub const fn default_driver_url(self) -> &'static str {
        match self {
            Self::Chrome => "http://localhost:9515",
            Self::Edge => "http://localhost:17556",
            Self::Firefox => "http://localhost:4444",
            Self::Safari => "http://localhost:4445",
        }
    }
}

#[derive(Debug, Clone)]
pub struct BrowserConfig {
    pub headless: bool,
    pub script_timeout_secs: u64,
    pub remote_hub: Option<String>,
    /// Logged-in game page every request is sent from.
    pub page_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            script_timeout_secs: 30,
            remote_hub: None,
            page_url: String::new(),
        }
    }
}

impl BrowserConfig {
    fn driver_url(&self, kind: BrowserKind) -> &str {
        self.remote_hub
            .as_deref()
            .unwrap_or_else(|| kind.default_driver_url())
    }
}

/// Open a session and park it on the game page so `fetch` carries its cookies.
pub async fn new_session(kind: BrowserKind, cfg: &BrowserConfig) -> WebDriverResult<WebDriver> {
    let url = cfg.driver_url(kind);
    let driver = match kind {
        BrowserKind::Chrome => {
            let mut caps = DesiredCapabilities::chrome();
            if cfg.headless {
                caps.set_headless()?;
            }
            WebDriver::new(url, caps).await?
        }
        BrowserKind::Edge => {
            let mut caps = DesiredCapabilities::edge();
            if cfg.headless {
                caps.set_headless()?;
            }
            WebDriver::new(url, caps).await?
        }
        BrowserKind::Firefox => {
            let mut caps = DesiredCapabilities::firefox();
            if cfg.headless {
                caps.set_headless()?;
            }
            WebDriver::new(url, caps).await?
        }
        BrowserKind::Safari => WebDriver::new(url, DesiredCapabilities::safari()).await?,
    };

    driver
        .set_script_timeout(Duration::from_secs(cfg.script_timeout_secs))
        .await?;
    if !cfg.page_url.is_empty() {
        driver.goto(&cfg.page_url).await?;
    }
    Ok(driver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hub_overrides_local_driver() {
        let cfg = BrowserConfig {
            remote_hub: Some("http://grid.test:4444".into()),
            ..BrowserConfig::default()
        };
        assert_eq!(cfg.driver_url(BrowserKind::Edge), "http://grid.test:4444");
        assert_eq!(
            BrowserConfig::default().driver_url(BrowserKind::Chrome),
            "http://localhost:9515"
        );
    }
}
