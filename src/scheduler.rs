use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::Instrument;
use uuid::Uuid;

use crate::announcer::Announcer;
use crate::config::SchedulerConfig;
use crate::models::{AnnouncementEvent, Platform};
use crate::plugins::traits::AnnouncementNotifier;
use crate::resolver::Resolver;
use crate::Result;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SchedulerStats {
    pub cycles_run: u64,
    pub cycles_skipped: u64,
    pub announcements: u64,
    pub resolution_failures: u64,
    pub last_cycle_started: Option<DateTime<Utc>>,
    pub last_cycle_duration_ms: Option<u64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub resolved: usize,
    pub unavailable: usize,
    pub events: Vec<AnnouncementEvent>,
}

/// One poll cycle's collaborators plus the overlap guard.
struct PollCycle {
    resolver: Arc<Resolver>,
    announcer: Arc<Announcer>,
    notifier: Arc<dyn AnnouncementNotifier>,
    platforms: Vec<Platform>,
    running: Mutex<()>,
    stats: RwLock<SchedulerStats>,
}

impl PollCycle {
    /// `None` when another cycle is still running.
    async fn run(&self) -> Option<CycleReport> {
        let Ok(_running) = self.running.try_lock() else {
            self.stats.write().await.cycles_skipped += 1;
            metrics::counter!("herald_cycles_total", "result" => "skipped").increment(1);
            tracing::warn!("Previous poll cycle still running, skipping this one");
            return None;
        };

        let id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", cycle = %id);
        let report = self.execute(id).instrument(span).await;

        {
            let mut stats = self.stats.write().await;
            stats.cycles_run += 1;
            stats.announcements += report.events.len() as u64;
            stats.resolution_failures += report.unavailable as u64;
            stats.last_cycle_started = Some(report.started_at);
            stats.last_cycle_duration_ms = Some(report.duration_ms);
        }
        metrics::counter!("herald_cycles_total", "result" => "completed").increment(1);

        Some(report)
    }

    async fn execute(&self, id: Uuid) -> CycleReport {
        let started_at = Utc::now();
        let start_time = tokio::time::Instant::now();
        tracing::info!(platforms = self.platforms.len(), "Starting poll cycle");

        let results = self.resolver.resolve_cycle(&self.platforms).await;

        let mut resolved = 0;
        let mut unavailable = 0;
        let mut events = Vec::new();

        for (platform, post) in results {
            if post.is_some() {
                resolved += 1;
            } else {
                unavailable += 1;
            }

            let Some(event) = self.announcer.evaluate(platform, post).await else {
                continue;
            };

            // History is already written; a failed delivery is not retried.
            if let Err(e) = self.notifier.notify(&event).await {
                tracing::error!(%platform, notifier = self.notifier.name(), "Failed to deliver announcement: {}", e);
            }
            events.push(event);
        }

        let duration_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(resolved, unavailable, announced = events.len(), duration_ms, "Poll cycle finished");

        CycleReport {
            id,
            started_at,
            duration_ms,
            resolved,
            unavailable,
            events,
        }
    }
}

/// Runs the poll cycle once at start and then on a fixed period. Cycles
/// never overlap: one that fires while another runs is skipped.
pub struct PollScheduler {
    scheduler: JobScheduler,
    cycle: Arc<PollCycle>,
    config: SchedulerConfig,
}

impl PollScheduler {
    pub async fn new(
        resolver: Arc<Resolver>,
        announcer: Arc<Announcer>,
        notifier: Arc<dyn AnnouncementNotifier>,
        platforms: Vec<Platform>,
        config: SchedulerConfig,
    ) -> Result<Self> {
        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            cycle: Arc::new(PollCycle {
                resolver,
                announcer,
                notifier,
                platforms,
                running: Mutex::new(()),
                stats: RwLock::new(SchedulerStats::default()),
            }),
            config,
        })
    }

    pub async fn start(&mut self) -> Result<()> {
        let cycle = Arc::clone(&self.cycle);
        let job = Job::new_repeated_async(self.config.interval(), move |_uuid, _l| {
            let cycle = Arc::clone(&cycle);
            Box::pin(async move {
                cycle.run().await;
            })
        })?;

        self.scheduler.add(job).await?;
        self.scheduler.start().await?;
        tracing::info!(interval_secs = self.config.interval_secs, "Poll scheduler started");

        if self.config.run_on_start {
            let cycle = Arc::clone(&self.cycle);
            tokio::spawn(async move {
                cycle.run().await;
            });
        }
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.scheduler.shutdown().await?;
        tracing::info!("Poll scheduler shutdown");
        Ok(())
    }

    /// Run a cycle immediately, outside of the schedule. Returns `None` if a
    /// cycle is already in progress.
    pub async fn run_cycle_now(&self) -> Option<CycleReport> {
        self.cycle.run().await
    }

    pub async fn stats(&self) -> SchedulerStats {
        self.cycle.stats.read().await.clone()
    }
}
