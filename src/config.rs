use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::models::DeliveryCode;
use crate::session::ElementKey;
use crate::utils::error::AppError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub monitor: MonitorConfig,
    pub browser: BrowserConfig,
    pub selectors: SelectorConfig,
    pub output: OutputConfig,
    pub notifications: NotificationsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    pub url_file: PathBuf,
    #[serde(deserialize_with = "list_or_csv")]
    pub delivery_codes: Vec<String>,
    /// `None` keeps cycling until shutdown.
    pub max_cycles: Option<u32>,
    pub inter_cycle_delay_secs: u64,
    pub ready_timeout_secs: u64,
    pub settle_delay_ms: u64,
    pub max_concurrent_products: usize,
    pub session_retry_attempts: u32,
    pub session_retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub chrome_path: Option<String>,
    pub user_agent: Option<String>,
    pub navigation_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub product_name: String,
    pub price: String,
    pub sold_out: String,
    pub code_input: String,
    pub check_button: String,
    pub out_of_stock: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub result_log_path: PathBuf,
    pub console: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub bell: bool,
    pub sound_command: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub discord_username: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            url_file: PathBuf::from("urls.txt"),
            delivery_codes: Vec::new(),
            max_cycles: Some(10),
            inter_cycle_delay_secs: 300,
            ready_timeout_secs: 10,
            settle_delay_ms: 5000,
            max_concurrent_products: 1,
            session_retry_attempts: 1,
            session_retry_delay_ms: 2000,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            chrome_path: None,
            user_agent: None,
            navigation_timeout_secs: 30,
        }
    }
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            product_name: ".VU-ZEz".to_string(),
            price: ".Nx9bqj.CxhGGd".to_string(),
            sold_out: ".Z8JjpR".to_string(),
            code_input: "#pincodeInputId".to_string(),
            check_button: ".i40dM4".to_string(),
            out_of_stock: ".nyRpc8".to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            result_log_path: PathBuf::from("availability.csv"),
            console: true,
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            bell: true,
            sound_command: None,
            discord_webhook_url: None,
            discord_username: "Stock Watcher".to_string(),
        }
    }
}

/// Values given on the command line; they win over files and environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub url_file: Option<PathBuf>,
    pub delivery_codes: Option<Vec<String>>,
    pub max_cycles: Option<u32>,
    pub forever: bool,
    pub inter_cycle_delay_secs: Option<u64>,
    pub headed: bool,
    pub result_log_path: Option<PathBuf>,
    pub max_concurrent_products: Option<usize>,
}

impl ConfigOverrides {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(path) = &self.url_file {
            config.monitor.url_file = path.clone();
        }
        if let Some(codes) = &self.delivery_codes {
            config.monitor.delivery_codes = codes.clone();
        }
        if self.forever {
            config.monitor.max_cycles = None;
        } else if let Some(cycles) = self.max_cycles {
            config.monitor.max_cycles = Some(cycles);
        }
        if let Some(delay) = self.inter_cycle_delay_secs {
            config.monitor.inter_cycle_delay_secs = delay;
        }
        if self.headed {
            config.browser.headless = false;
        }
        if let Some(path) = &self.result_log_path {
            config.output.result_log_path = path.clone();
        }
        if let Some(pool) = self.max_concurrent_products {
            config.monitor.max_concurrent_products = pool;
        }
    }
}

impl AppConfig {
    /// Defaults, then `config/default`, an explicit file, `STOCKWATCH__*`
    /// environment variables and finally command line overrides.
    pub fn load(config_file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false));

        if let Some(path) = config_file {
            builder = builder.add_source(File::from(path.to_path_buf()));
        }

        let s = builder
            .add_source(Environment::with_prefix("STOCKWATCH").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        overrides.apply(&mut config);

        // Add Chrome path from environment if not set
        if config.browser.chrome_path.is_none() {
            config.browser.chrome_path = env::var("CHROME_PATH").ok();
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let monitor = &self.monitor;

        if monitor.delivery_codes.is_empty() {
            return Err(ConfigError::Message("At least one delivery code must be configured".into()));
        }

        let mut seen = HashSet::new();
        for code in monitor.delivery_codes.iter().map(|code| code.trim()) {
            if code.is_empty() {
                return Err(ConfigError::Message("Delivery codes must not be blank".into()));
            }
            if !seen.insert(code) {
                return Err(ConfigError::Message(format!("Duplicate delivery code: {}", code)));
            }
        }

        if monitor.max_cycles == Some(0) {
            return Err(ConfigError::Message("max_cycles must be greater than 0".into()));
        }

        if monitor.ready_timeout_secs == 0 {
            return Err(ConfigError::Message("ready_timeout_secs must be greater than 0".into()));
        }

        if monitor.max_concurrent_products == 0 {
            return Err(ConfigError::Message("max_concurrent_products must be greater than 0".into()));
        }

        if self.browser.navigation_timeout_secs == 0 {
            return Err(ConfigError::Message("navigation_timeout_secs must be greater than 0".into()));
        }

        for key in ElementKey::ALL {
            if self.selectors.selector_for(key).trim().is_empty() {
                return Err(ConfigError::Message(format!("Selector for {} must not be empty", key)));
            }
        }

        if self.output.result_log_path.as_os_str().is_empty() {
            return Err(ConfigError::Message("result_log_path must not be empty".into()));
        }

        if let Some(webhook) = &self.notifications.discord_webhook_url {
            if !webhook.starts_with("https://discord.com/api/webhooks/") {
                return Err(ConfigError::Message("Invalid Discord webhook URL format".into()));
            }
        }

        Ok(())
    }

    pub fn delivery_codes(&self) -> Vec<DeliveryCode> {
        self.monitor
            .delivery_codes
            .iter()
            .map(|code| DeliveryCode::new(code.trim()))
            .collect()
    }
}

impl MonitorConfig {
    pub fn ready_timeout(&self) -> Duration {
        Duration::from_secs(self.ready_timeout_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn inter_cycle_delay(&self) -> Duration {
        Duration::from_secs(self.inter_cycle_delay_secs)
    }

    pub fn session_retry_delay(&self) -> Duration {
        Duration::from_millis(self.session_retry_delay_ms)
    }
}

impl SelectorConfig {
    pub fn selector_for(&self, key: ElementKey) -> &str {
        match key {
            ElementKey::ProductName => &self.product_name,
            ElementKey::Price => &self.price,
            ElementKey::SoldOut => &self.sold_out,
            ElementKey::CodeInput => &self.code_input,
            ElementKey::CheckButton => &self.check_button,
            ElementKey::OutOfStock => &self.out_of_stock,
        }
    }
}

/// Reads the product URL file: one URL per line, blank lines and `#` comments skipped.
pub fn load_product_urls(path: &Path) -> Result<Vec<String>, AppError> {
    let content = std::fs::read_to_string(path)?;
    parse_product_urls(&content)
}

pub fn parse_product_urls(content: &str) -> Result<Vec<String>, AppError> {
    let mut urls = Vec::new();
    for (index, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        Url::parse(line)
            .map_err(|e| AppError::Validation(format!("Invalid URL on line {}: {} ({})", index + 1, line, e)))?;
        urls.push(line.to_string());
    }

    if urls.is_empty() {
        return Err(AppError::Validation("Product URL list is empty".into()));
    }
    Ok(urls)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv {
    List(Vec<String>),
    Csv(String),
}

// Environment variables arrive as one comma separated string.
fn list_or_csv<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(raw) => raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect(),
    })
}
