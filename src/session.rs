//! Scrape session management: one rendering-engine process per batch,
//! a bounded number of pages rendered at once, and guaranteed release of
//! every page and of the engine.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use headless_chrome::browser::tab::{RequestInterceptor, RequestPausedDecision};
use headless_chrome::browser::transport::{SessionId, Transport};
use headless_chrome::protocol::cdp::Fetch::events::RequestPausedEvent;
use headless_chrome::protocol::cdp::Fetch::{FailRequest, RequestPattern, RequestStage};
use headless_chrome::protocol::cdp::Network::{ErrorReason, ResourceType};
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::ScraperConfig;
use crate::extract::{extract_post, is_auth_wall, ready_selector};
use crate::models::{ResolvedPost, ScrapeTask};
use crate::utils::error::AppError;
use crate::Result;

/// How long to wait for the platform's post container after settling.
const READY_SELECTOR_TIMEOUT: Duration = Duration::from_secs(5);

/// Per-page rendering rules shared by all tasks of a batch.
#[derive(Debug, Clone)]
pub struct RenderPolicy {
    pub navigation_timeout: Duration,
    pub settle_delay: Duration,
    pub ready_timeout: Duration,
    pub block_resources: bool,
    pub user_agent: String,
}

impl RenderPolicy {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            navigation_timeout: config.navigation_timeout(),
            settle_delay: config.settle_delay(),
            ready_timeout: READY_SELECTOR_TIMEOUT,
            block_resources: config.block_resources,
            user_agent: config.user_agent.clone(),
        }
    }
}

/// Terminal state of one scrape task. Every outcome is followed by the
/// page's context being closed.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    TimedOut,
    AuthWalled,
    Extracted(ResolvedPost),
    ExtractionFailed(String),
}

impl TaskOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            TaskOutcome::TimedOut => "timed_out",
            TaskOutcome::AuthWalled => "auth_walled",
            TaskOutcome::Extracted(_) => "extracted",
            TaskOutcome::ExtractionFailed(_) => "extraction_failed",
        }
    }

    pub fn into_post(self) -> Option<ResolvedPost> {
        match self {
            TaskOutcome::Extracted(post) => Some(post),
            _ => None,
        }
    }
}

/// A launched rendering engine. `render` is blocking and runs on the
/// blocking thread pool; implementations must release the page they open
/// before returning.
pub trait RenderSession: Send + Sync {
    fn render(&self, task: &ScrapeTask, policy: &RenderPolicy) -> TaskOutcome;
}

/// Starts rendering engines. Dropping the returned session shuts it down.
pub trait RenderEngine: Send + Sync {
    fn launch(&self) -> Result<Arc<dyn RenderSession>>;
}

/// Executes scrape tasks, one result per task in input order.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScrapeBackend: Send + Sync {
    async fn scrape_batch(&self, tasks: Vec<ScrapeTask>) -> Vec<Option<ResolvedPost>>;
}

pub struct ScrapeSessionManager {
    engine: Arc<dyn RenderEngine>,
    policy: RenderPolicy,
    concurrency: usize,
    task_deadline: Duration,
}

impl ScrapeSessionManager {
    pub fn new(engine: Arc<dyn RenderEngine>, config: &ScraperConfig) -> Self {
        Self {
            engine,
            policy: RenderPolicy::from_config(config),
            concurrency: config.max_concurrent_tasks.max(1),
            task_deadline: config.task_deadline(),
        }
    }

    /// Manager backed by a real headless Chrome.
    pub fn chrome(config: &ScraperConfig) -> Self {
        let engine = ChromeEngine::new(config.chrome_path.clone().map(PathBuf::from), config.task_deadline());
        Self::new(Arc::new(engine), config)
    }

    async fn launch(&self) -> Result<Arc<dyn RenderSession>> {
        let engine = Arc::clone(&self.engine);
        tokio::task::spawn_blocking(move || engine.launch())
            .await
            .map_err(|e| AppError::EngineLaunch(e.to_string()))?
    }

    async fn run_task(
        session: Arc<dyn RenderSession>,
        task: ScrapeTask,
        policy: RenderPolicy,
        deadline: Duration,
    ) -> Option<ResolvedPost> {
        let platform = task.platform;
        let url = task.url.clone();
        let started = Instant::now();
        tracing::debug!(%platform, %url, "Scrape task loading");

        let render = tokio::task::spawn_blocking(move || session.render(&task, &policy));
        let outcome = match tokio::time::timeout(deadline, render).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(join_error)) => TaskOutcome::ExtractionFailed(format!("render task panicked: {}", join_error)),
            // The blocking render keeps running and releases its page when it ends.
            Err(_) => TaskOutcome::TimedOut,
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            TaskOutcome::Extracted(post) => {
                tracing::info!(%platform, link = %post.link, elapsed_ms, "Scrape extracted post")
            }
            TaskOutcome::ExtractionFailed(reason) => {
                tracing::warn!(%platform, %url, elapsed_ms, "Scrape extraction failed: {}", reason)
            }
            other => tracing::warn!(%platform, %url, elapsed_ms, outcome = other.label(), "Scrape produced no post"),
        }
        metrics::counter!("herald_scrape_tasks_total", "outcome" => outcome.label()).increment(1);

        outcome.into_post()
    }
}

#[async_trait]
impl ScrapeBackend for ScrapeSessionManager {
    async fn scrape_batch(&self, tasks: Vec<ScrapeTask>) -> Vec<Option<ResolvedPost>> {
        if tasks.is_empty() {
            return Vec::new();
        }
        let count = tasks.len();

        let session = match self.launch().await {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(tasks = count, "Skipping scrape batch: {}", e);
                metrics::counter!("herald_scrape_tasks_total", "outcome" => "engine_unavailable")
                    .increment(count as u64);
                return vec![None; count];
            }
        };
        tracing::debug!(tasks = count, concurrency = self.concurrency, "Scrape batch started");

        let results = stream::iter(tasks.into_iter().map(|task| {
            Self::run_task(Arc::clone(&session), task, self.policy.clone(), self.task_deadline)
        }))
        .buffered(self.concurrency)
        .collect::<Vec<_>>()
        .await;

        // Last handle; the engine process exits once straggling renders finish.
        drop(session);
        tracing::debug!(tasks = count, found = results.iter().flatten().count(), "Scrape batch finished");
        results
    }
}

/// Headless Chrome via the DevTools protocol.
pub struct ChromeEngine {
    chrome_path: Option<PathBuf>,
    idle_timeout: Duration,
}

impl ChromeEngine {
    pub fn new(chrome_path: Option<PathBuf>, task_deadline: Duration) -> Self {
        Self {
            chrome_path,
            idle_timeout: task_deadline * 2,
        }
    }
}

impl RenderEngine for ChromeEngine {
    fn launch(&self) -> Result<Arc<dyn RenderSession>> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false) // Often needed in containerized environments
            .idle_browser_timeout(self.idle_timeout)
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-setuid-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
                OsStr::new("--disable-background-timer-throttling"),
                OsStr::new("--disable-backgrounding-occluded-windows"),
                OsStr::new("--disable-renderer-backgrounding"),
            ])
            .build()
            .map_err(|e| AppError::EngineLaunch(format!("invalid launch options: {}", e)))?;

        if let Some(chrome_path) = &self.chrome_path {
            launch_options.path = Some(chrome_path.clone());
        }

        let browser = Browser::new(launch_options).map_err(|e| AppError::EngineLaunch(e.to_string()))?;
        Ok(Arc::new(ChromeSession { browser }))
    }
}

struct ChromeSession {
    browser: Browser,
}

/// Fails every paused request of a blocked resource class.
struct ResourceBlocker;

fn is_blocked(resource_type: &ResourceType) -> bool {
    matches!(
        resource_type,
        ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font | ResourceType::Media
    )
}

impl RequestInterceptor for ResourceBlocker {
    fn intercept(
        &self,
        _transport: Arc<Transport>,
        _session_id: SessionId,
        event: RequestPausedEvent,
    ) -> RequestPausedDecision {
        if is_blocked(&event.params.resource_Type) {
            RequestPausedDecision::Fail(FailRequest {
                request_id: event.params.request_id,
                error_reason: ErrorReason::BlockedByClient,
            })
        } else {
            RequestPausedDecision::Continue(None)
        }
    }
}

fn is_timeout(error: &anyhow::Error) -> bool {
    if error.downcast_ref::<headless_chrome::util::Timeout>().is_some() {
        return true;
    }
    let message = error.to_string().to_lowercase();
    message.contains("timeout") || message.contains("timed out")
}

impl ChromeSession {
    fn block_subresources(tab: &Arc<Tab>) -> anyhow::Result<()> {
        let patterns: Vec<RequestPattern> = [
            ResourceType::Image,
            ResourceType::Stylesheet,
            ResourceType::Font,
            ResourceType::Media,
        ]
        .into_iter()
        .map(|resource_type| RequestPattern {
            url_pattern: None,
            resource_Type: Some(resource_type),
            request_stage: Some(RequestStage::Request),
        })
        .collect();

        tab.enable_fetch(Some(patterns.as_slice()), None)?;
        tab.enable_request_interception(Arc::new(ResourceBlocker))?;
        Ok(())
    }

    fn render_in_tab(&self, tab: &Arc<Tab>, task: &ScrapeTask, policy: &RenderPolicy) -> TaskOutcome {
        tab.set_default_timeout(policy.navigation_timeout);

        if let Err(e) = tab.set_user_agent(&policy.user_agent, None, None) {
            tracing::debug!(platform = %task.platform, "Could not set user agent: {}", e);
        }
        if policy.block_resources {
            if let Err(e) = Self::block_subresources(tab) {
                tracing::debug!(platform = %task.platform, "Resource blocking unavailable: {}", e);
            }
        }

        let navigated = tab.navigate_to(&task.url).and_then(|tab| tab.wait_until_navigated());
        if let Err(e) = navigated {
            return if is_timeout(&e) {
                TaskOutcome::TimedOut
            } else {
                TaskOutcome::ExtractionFailed(format!("navigation failed: {}", e))
            };
        }

        std::thread::sleep(policy.settle_delay);

        match tab.get_title() {
            Ok(title) if is_auth_wall(&title) => return TaskOutcome::AuthWalled,
            Ok(_) => {}
            Err(e) => tracing::debug!(platform = %task.platform, "Could not read title: {}", e),
        }

        if let Some(selector) = ready_selector(task.platform) {
            if tab.wait_for_element_with_custom_timeout(selector, policy.ready_timeout).is_err() {
                tracing::debug!(platform = %task.platform, selector, "Post container did not appear");
            }
        }

        let html = match tab.get_content() {
            Ok(html) => html,
            Err(e) => return TaskOutcome::ExtractionFailed(format!("could not read page: {}", e)),
        };
        let page_url = {
            let url = tab.get_url();
            if url.is_empty() {
                task.url.clone()
            } else {
                url
            }
        };

        match extract_post(task.platform, &html, &page_url) {
            Some(post) => TaskOutcome::Extracted(post),
            None => TaskOutcome::ExtractionFailed("no post matched the extraction rule".to_string()),
        }
    }
}

impl RenderSession for ChromeSession {
    fn render(&self, task: &ScrapeTask, policy: &RenderPolicy) -> TaskOutcome {
        // Isolated browser context per task. Contexts are not disposed one by
        // one; they go away with the browser when the batch's session drops.
        let context = match self.browser.new_context() {
            Ok(context) => context,
            Err(e) => return TaskOutcome::ExtractionFailed(format!("could not open context: {}", e)),
        };
        let tab = match context.new_tab() {
            Ok(tab) => tab,
            Err(e) => return TaskOutcome::ExtractionFailed(format!("could not open tab: {}", e)),
        };

        let outcome = self.render_in_tab(&tab, task, policy);

        if let Err(e) = tab.close(true) {
            tracing::debug!(platform = %task.platform, "Tab close failed: {}", e);
        }
        outcome
    }
}
