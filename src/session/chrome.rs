use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use super::{ElementKey, PageSession, SessionFactory};
use crate::config::{BrowserConfig, SelectorConfig};
use crate::models::DeliveryCode;
use crate::utils::error::{AppError, Result};

/// Launches one Chrome instance per run and hands out a fresh tab per product.
pub struct ChromeSessionFactory {
    browser: Arc<Browser>,
    selectors: Arc<SelectorConfig>,
    user_agent: Option<String>,
    navigation_timeout: Duration,
}

pub struct ChromeSession {
    url: String,
    tab: Arc<Tab>,
    selectors: Arc<SelectorConfig>,
    closed: AtomicBool,
}

impl ChromeSessionFactory {
    pub fn new(config: &BrowserConfig, selectors: SelectorConfig) -> Result<Self> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(config.headless)
            .sandbox(false) // Often needed in containerized environments
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| AppError::Session(format!("Failed to create launch options: {}", e)))?;

        if let Some(chrome_path) = &config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        let browser = Browser::new(launch_options)
            .map_err(|e| AppError::Session(format!("Failed to launch browser: {}", e)))?;

        tracing::info!(headless = config.headless, "Browser launched");

        Ok(Self {
            browser: Arc::new(browser),
            selectors: Arc::new(selectors),
            user_agent: config.user_agent.clone(),
            navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
        })
    }
}

#[async_trait]
impl SessionFactory for ChromeSessionFactory {
    async fn open(&self, url: &str) -> Result<Box<dyn PageSession>> {
        let browser = Arc::clone(&self.browser);
        let user_agent = self.user_agent.clone();
        let navigation_timeout = self.navigation_timeout;
        let target = url.to_string();

        let tab = tokio::task::spawn_blocking(move || -> Result<Arc<Tab>> {
            let tab = browser
                .new_tab()
                .map_err(|e| AppError::Session(format!("Failed to create tab: {}", e)))?;
            tab.set_default_timeout(navigation_timeout);

            let navigated = (|| -> anyhow::Result<()> {
                if let Some(user_agent) = &user_agent {
                    tab.set_user_agent(user_agent, None, None)?;
                }
                tab.navigate_to(&target)?;
                tab.wait_until_navigated()?;
                Ok(())
            })();

            if let Err(e) = navigated {
                let _ = tab.close(false);
                return Err(AppError::Session(format!("Navigation to {} failed: {}", target, e)));
            }
            Ok(tab)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Browser task failed: {}", e)))??;

        tracing::debug!(url, "Session opened");

        Ok(Box::new(ChromeSession {
            url: url.to_string(),
            tab,
            selectors: Arc::clone(&self.selectors),
            closed: AtomicBool::new(false),
        }))
    }
}

impl ChromeSession {
    fn selector(&self, key: ElementKey) -> String {
        self.selectors.selector_for(key).to_string()
    }

    // headless_chrome blocks on every CDP round trip.
    async fn with_tab<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Tab) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(&tab))
            .await
            .map_err(|e| AppError::Internal(format!("Browser task failed: {}", e)))?
    }
}

#[async_trait]
impl PageSession for ChromeSession {
    fn url(&self) -> &str {
        &self.url
    }

    async fn read_text(&self, key: ElementKey) -> Result<String> {
        let selector = self.selector(key);
        self.with_tab(move |tab| {
            let element = tab
                .find_element(&selector)
                .map_err(|_| AppError::ElementNotFound { selector: selector.clone() })?;
            let text = element
                .get_inner_text()
                .map_err(|e| AppError::Session(format!("Failed to read {}: {}", selector, e)))?;
            Ok(text.trim().to_string())
        })
        .await
    }

    async fn exists(&self, key: ElementKey) -> Result<bool> {
        let selector = self.selector(key);
        self.with_tab(move |tab| {
            let quoted = serde_json::to_string(&selector)?;
            let js = format!("document.querySelector({}) !== null", quoted);
            let result = tab
                .evaluate(&js, false)
                .map_err(|e| AppError::Session(format!("Failed to query {}: {}", selector, e)))?;
            Ok(result.value.and_then(|v| v.as_bool()).unwrap_or(false))
        })
        .await
    }

    async fn submit_code(&self, code: &DeliveryCode) -> Result<()> {
        let selector = self.selector(ElementKey::CodeInput);
        let code = code.to_string();
        self.with_tab(move |tab| {
            let input = tab
                .find_element(&selector)
                .map_err(|_| AppError::ElementNotFound { selector: selector.clone() })?;
            input
                .call_js_fn("function() { this.value = ''; }", vec![], false)
                .map_err(|e| AppError::Session(format!("Failed to clear {}: {}", selector, e)))?;
            input
                .click()
                .and_then(|el| el.type_into(&code))
                .map_err(|e| AppError::Session(format!("Failed to type into {}: {}", selector, e)))?;
            Ok(())
        })
        .await
    }

    async fn click(&self, key: ElementKey) -> Result<()> {
        let selector = self.selector(key);
        self.with_tab(move |tab| {
            tab.find_element(&selector)
                .map_err(|_| AppError::ElementNotFound { selector: selector.clone() })?
                .click()
                .map_err(|e| AppError::Session(format!("Failed to click {}: {}", selector, e)))?;
            Ok(())
        })
        .await
    }

    async fn wait_until_ready(&self, key: ElementKey, timeout: Duration) -> Result<bool> {
        let selector = self.selector(key);
        self.with_tab(move |tab| {
            let element = match tab.wait_for_element_with_custom_timeout(&selector, timeout) {
                Ok(element) => element,
                Err(e) => {
                    tracing::debug!(selector = %selector, error = %e, "Element did not appear");
                    return Ok(false);
                }
            };
            let enabled = element
                .call_js_fn("function() { return !this.disabled; }", vec![], false)
                .map_err(|e| AppError::Session(format!("Failed to inspect {}: {}", selector, e)))?;
            Ok(enabled.value.and_then(|v| v.as_bool()).unwrap_or(true))
        })
        .await
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.with_tab(|tab| {
            tab.close(true)
                .map_err(|e| AppError::Session(format!("Failed to close tab: {}", e)))?;
            Ok(())
        })
        .await
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let tab = Arc::clone(&self.tab);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || {
                    let _ = tab.close(false);
                });
            }
            Err(_) => {
                let _ = tab.close(false);
            }
        }
    }
}
