// Shared fixtures for integration tests: a scripted page session that plays
// back canned page states, plus recording notifier and sink.

pub mod persistence_tests;
pub mod scheduler_tests;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use stock_watcher::notifiers::{AvailabilityEvent, Notifier};
use stock_watcher::session::{ElementKey, PageSession, SessionFactory};
use stock_watcher::sinks::ResultSink;
use stock_watcher::{
    AppError, AvailabilityResolver, CycleAggregator, CycleResult, DeliveryCode, ResolverTimings, SessionPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeScript {
    InStock,
    OutOfStock,
    /// Check button never becomes ready.
    Timeout,
    /// Session dies while submitting the code.
    Stale,
    /// Page never settles after the check is clicked.
    Hang,
}

#[derive(Debug, Clone)]
pub struct ProductScript {
    pub name: Option<String>,
    pub price: Option<String>,
    pub sold_out: bool,
    pub codes: HashMap<String, CodeScript>,
    pub fail_open: bool,
}

impl ProductScript {
    pub fn new(name: &str, price: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            price: Some(price.to_string()),
            sold_out: false,
            codes: HashMap::new(),
            fail_open: false,
        }
    }

    pub fn sold_out(mut self) -> Self {
        self.sold_out = true;
        self
    }

    pub fn unopenable(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn code(mut self, code: &str, script: CodeScript) -> Self {
        self.codes.insert(code.to_string(), script);
        self
    }
}

#[derive(Debug, Default)]
pub struct SessionStats {
    pub opens: AtomicUsize,
    pub closes: AtomicUsize,
    pub submits: AtomicUsize,
    pub settling: AtomicUsize,
    pub dropped: AtomicUsize,
    pub submitted: Mutex<Vec<String>>,
}

impl SessionStats {
    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn settling(&self) -> usize {
        self.settling.load(Ordering::SeqCst)
    }

    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::SeqCst)
    }

    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().unwrap().clone()
    }
}

pub struct ScriptedSession {
    url: String,
    script: ProductScript,
    current: Mutex<Option<String>>,
    stats: Arc<SessionStats>,
}

impl ScriptedSession {
    pub fn new(url: &str, script: ProductScript, stats: Arc<SessionStats>) -> Self {
        Self {
            url: url.to_string(),
            script,
            current: Mutex::new(None),
            stats,
        }
    }

    fn current_script(&self) -> CodeScript {
        let current = self.current.lock().unwrap();
        current
            .as_ref()
            .and_then(|code| self.script.codes.get(code).copied())
            .unwrap_or(CodeScript::OutOfStock)
    }
}

#[async_trait]
impl PageSession for ScriptedSession {
    fn url(&self) -> &str {
        &self.url
    }

    async fn read_text(&self, key: ElementKey) -> stock_watcher::Result<String> {
        let value = match key {
            ElementKey::ProductName => self.script.name.clone(),
            ElementKey::Price => self.script.price.clone(),
            _ => None,
        };
        value.ok_or_else(|| AppError::ElementNotFound { selector: key.to_string() })
    }

    async fn exists(&self, key: ElementKey) -> stock_watcher::Result<bool> {
        match key {
            ElementKey::SoldOut => Ok(self.script.sold_out),
            ElementKey::OutOfStock => Ok(self.current_script() != CodeScript::InStock),
            _ => Ok(true),
        }
    }

    async fn submit_code(&self, code: &DeliveryCode) -> stock_watcher::Result<()> {
        self.stats.submits.fetch_add(1, Ordering::SeqCst);
        self.stats.submitted.lock().unwrap().push(code.to_string());
        *self.current.lock().unwrap() = Some(code.to_string());

        if self.current_script() == CodeScript::Stale {
            return Err(AppError::Session("target closed".into()));
        }
        Ok(())
    }

    async fn click(&self, _key: ElementKey) -> stock_watcher::Result<()> {
        Ok(())
    }

    async fn wait_until_ready(&self, key: ElementKey, _timeout: Duration) -> stock_watcher::Result<bool> {
        Ok(!(key == ElementKey::CheckButton && self.current_script() == CodeScript::Timeout))
    }

    async fn settle(&self, _delay: Duration) -> stock_watcher::Result<()> {
        self.stats.settling.fetch_add(1, Ordering::SeqCst);
        if self.current_script() == CodeScript::Hang {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn close(&self) -> stock_watcher::Result<()> {
        self.stats.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.stats.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opens scripted sessions keyed by URL.
#[derive(Default)]
pub struct ScriptedFactory {
    scripts: HashMap<String, ProductScript>,
    pub stats: Arc<SessionStats>,
}

impl ScriptedFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn product(mut self, url: &str, script: ProductScript) -> Self {
        self.scripts.insert(url.to_string(), script);
        self
    }
}

#[async_trait]
impl SessionFactory for ScriptedFactory {
    async fn open(&self, url: &str) -> stock_watcher::Result<Box<dyn PageSession>> {
        self.stats.opens.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(url)
            .cloned()
            .ok_or_else(|| AppError::Session(format!("no script for {}", url)))?;
        if script.fail_open {
            return Err(AppError::Session("browser refused to open tab".into()));
        }
        Ok(Box::new(ScriptedSession::new(url, script, Arc::clone(&self.stats))))
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub events: Mutex<Vec<AvailabilityEvent>>,
}

impl RecordingNotifier {
    pub fn codes(&self) -> Vec<String> {
        self.events.lock().unwrap().iter().map(|e| e.code.to_string()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, event: &AvailabilityEvent) -> stock_watcher::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingSink {
    pub headers: Mutex<Vec<(u32, Vec<String>)>>,
    pub results: Mutex<Vec<CycleResult>>,
    pub finished: Mutex<Vec<u32>>,
}

#[async_trait]
impl ResultSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn cycle_started(&self, cycle: u32, codes: &[DeliveryCode]) -> stock_watcher::Result<()> {
        let codes = codes.iter().map(|c| c.to_string()).collect();
        self.headers.lock().unwrap().push((cycle, codes));
        Ok(())
    }

    async fn record(&self, result: &CycleResult) -> stock_watcher::Result<()> {
        self.results.lock().unwrap().push(result.clone());
        Ok(())
    }

    async fn cycle_finished(&self, cycle: u32, _elapsed: Duration) -> stock_watcher::Result<()> {
        self.finished.lock().unwrap().push(cycle);
        Ok(())
    }
}

pub fn codes(list: &[&str]) -> Vec<DeliveryCode> {
    list.iter().map(|c| DeliveryCode::from(*c)).collect()
}

pub fn fast_timings() -> ResolverTimings {
    ResolverTimings {
        ready_timeout: Duration::from_millis(50),
        settle_delay: Duration::ZERO,
    }
}

pub fn build_aggregator(factory: ScriptedFactory, notifier: Arc<RecordingNotifier>) -> (CycleAggregator, Arc<SessionStats>) {
    let stats = Arc::clone(&factory.stats);
    let resolver = AvailabilityResolver::new(fast_timings(), notifier);
    let aggregator = CycleAggregator::new(Arc::new(factory), Arc::new(resolver), SessionPolicy::default());
    (aggregator, stats)
}
