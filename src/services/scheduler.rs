//! Background job loop driving the scan pipelines and download polling.

use crate::config::SchedulerConfig;
use crate::services::download_tracker::DownloadTracker;
use crate::services::radarr_scanner::MovieScanner;
use crate::services::sonarr_scanner::SeriesScanner;
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};

pub struct Scheduler {
    movies: Arc<MovieScanner>,
    series: Arc<SeriesScanner>,
    downloads: Arc<DownloadTracker>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(
        movies: Arc<MovieScanner>,
        series: Arc<SeriesScanner>,
        downloads: Arc<DownloadTracker>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            movies,
            series,
            downloads,
            config,
            running: Arc::new(RwLock::new(false)),
        }
    }

    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if let Some(cron_expr) = &self.config.cron_expression {
            self.run_with_cron(cron_expr).await
        } else {
            self.run_with_interval().await
        }
    }

    async fn run_with_cron(&self, cron_expr: &str) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        let movies = Arc::clone(&self.movies);
        let series = Arc::clone(&self.series);
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let movies = Arc::clone(&movies);
            let series = Arc::clone(&series);
            let running = Arc::clone(&running);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_scans(&movies, &series).await;
            })
        })?;

        sched.add(job).await?;
        sched.start().await?;

        info!("Scheduler running with cron: {}", cron_expr);

        let mut download_interval =
            interval(Duration::from_secs(u64::from(self.config.download_poll_seconds)));
        loop {
            tokio::select! {
                _ = download_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    run_job("download_poll", self.downloads.poll()).await;
                }
                () = tokio::time::sleep(Duration::from_secs(1)) => {
                    if !*self.running.read().await {
                        break;
                    }
                }
            }
        }

        sched.shutdown().await?;
        Ok(())
    }

    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.scan_interval_minutes;
        info!("Scheduler running every {} minutes", interval_mins);

        let mut scan_interval = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        let mut download_interval =
            interval(Duration::from_secs(u64::from(self.config.download_poll_seconds)));

        loop {
            tokio::select! {
                _ = scan_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    run_scans(&self.movies, &self.series).await;
                }
                _ = download_interval.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    run_job("download_poll", self.downloads.poll()).await;
                }
            }
        }

        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub async fn run_once(&self) -> Result<()> {
        info!("Running manual check...");
        run_scans(&self.movies, &self.series).await;
        self.downloads.poll().await;
        Ok(())
    }
}

async fn run_scans(movies: &MovieScanner, series: &SeriesScanner) {
    run_fallible_job("movie_scan", movies.run()).await;
    run_fallible_job("series_scan", series.run()).await;
}

async fn run_job(name: &str, fut: impl Future<Output = ()>) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job = name, "Job started");
    fut.await;
    info!(
        event = "job_finished",
        job = name,
        duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        "Job finished"
    );
}

async fn run_fallible_job(name: &str, fut: impl Future<Output = Result<()>>) {
    let start = std::time::Instant::now();
    info!(event = "job_started", job = name, "Job started");
    match fut.await {
        Ok(()) => info!(
            event = "job_finished",
            job = name,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Job finished"
        ),
        Err(e) => error!(
            event = "job_failed",
            job = name,
            error = %e,
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Job failed"
        ),
    }
}
