use chrono::Utc;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use rand::Rng;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::models::{ProductRecord, Target};
use crate::plugins::manager::SourceStrategyRef;
use crate::reconcile::Transition;
use crate::targets::TargetCatalog;
use crate::watcher::Watcher;

/// A target paired with the strategy chosen for it when it was loaded.
#[derive(Clone)]
pub struct ScanJob {
    pub target: Target,
    pub strategy: SourceStrategyRef,
}

/// Result of scanning one target.
#[derive(Debug, Default)]
pub struct TargetOutcome {
    pub had_error: bool,
    pub restocked: Vec<ProductRecord>,
    pub changed: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OriginReport {
    pub origin: String,
    pub targets: usize,
    pub failed: usize,
    pub restocked: usize,
    pub changed: bool,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CycleReport {
    pub had_error: bool,
    pub changed: bool,
    pub origins: usize,
    pub targets_scanned: usize,
    pub targets_failed: usize,
    pub restocked: usize,
}

/// Group jobs by origin, keeping the order in which origins first appear.
pub fn group_by_origin(jobs: Vec<ScanJob>) -> Vec<(String, Vec<ScanJob>)> {
    let mut groups: Vec<(String, Vec<ScanJob>)> = Vec::new();
    for job in jobs {
        match groups.iter_mut().find(|(origin, _)| *origin == job.target.origin) {
            Some((_, group)) => group.push(job),
            None => groups.push((job.target.origin.clone(), vec![job])),
        }
    }
    groups
}

impl Watcher {
    /// Scan every target once.
    ///
    /// Origins run concurrently; within an origin at most
    /// `max_concurrent_per_origin` targets are in flight. Each origin
    /// publishes its dashboard update and restock alerts as soon as it
    /// finishes. The store is saved at the end.
    pub async fn run_cycle(&self, targets: Vec<Target>) -> CycleReport {
        let started = Instant::now();
        let mut report = CycleReport::default();

        if self.purge_stale(&targets).await {
            report.changed = true;
            self.refresh_dashboard(true).await;
        }

        let (jobs, unresolved) = self.plugins.resolve(targets).await;
        if !unresolved.is_empty() {
            report.had_error = true;
            report.targets_failed += unresolved.len();
        }

        let groups = group_by_origin(jobs);
        report.origins = groups.len();

        let origin_reports = join_all(
            groups
                .into_iter()
                .map(|(origin, jobs)| self.scan_origin(origin, jobs)),
        )
        .await;

        for origin in &origin_reports {
            report.targets_scanned += origin.targets;
            report.targets_failed += origin.failed;
            report.restocked += origin.restocked;
            report.had_error |= origin.failed > 0;
            report.changed |= origin.changed;
        }

        self.record_health(report.had_error).await;
        self.state.lock().await.cold_start = false;

        if let Err(e) = self.save().await {
            tracing::error!(error = %e, "failed to persist state");
        }

        tracing::info!(
            origins = report.origins,
            scanned = report.targets_scanned,
            failed = report.targets_failed,
            restocked = report.restocked,
            changed = report.changed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "scan cycle complete"
        );
        report
    }

    async fn scan_origin(&self, origin: String, jobs: Vec<ScanJob>) -> OriginReport {
        let targets = jobs.len();
        // Jobs are moved into the stream so a spawned cycle stays `Send`.
        let outcomes: Vec<TargetOutcome> = stream::iter(jobs)
            .map(move |job: ScanJob| async move { self.scan_target(&job).await })
            .buffer_unordered(self.max_concurrent_per_origin)
            .collect()
            .await;

        let mut report = OriginReport {
            origin,
            targets,
            ..OriginReport::default()
        };
        let mut restocked = Vec::new();
        for outcome in outcomes {
            if outcome.had_error {
                report.failed += 1;
            }
            report.changed |= outcome.changed;
            restocked.extend(outcome.restocked);
        }
        report.restocked = restocked.len();

        tracing::debug!(
            origin = %report.origin,
            targets = report.targets,
            failed = report.failed,
            "origin finished, publishing"
        );
        self.refresh_dashboard(report.changed).await;
        self.send_restock_alerts(restocked).await;

        report
    }

    async fn scan_target(&self, job: &ScanJob) -> TargetOutcome {
        if self.jitter_ms > 0 {
            let delay = rand::thread_rng().gen_range(0..=self.jitter_ms);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let target = &job.target;
        metrics::counter!("watcher_targets_scanned_total").increment(1);

        let observations = match job.strategy.fetch_observations(target).await {
            Ok(observations) => observations,
            Err(e) => {
                tracing::warn!(origin = %target.origin, url = %target.url, error = %e, "target scan failed");
                metrics::counter!("watcher_target_failures_total", "origin" => target.origin.clone())
                    .increment(1);
                return TargetOutcome {
                    had_error: true,
                    ..TargetOutcome::default()
                };
            }
        };

        let now = Utc::now();
        let mut outcome = TargetOutcome::default();
        let mut retractions = Vec::new();
        {
            let mut state = self.state.lock().await;
            let cold_start = state.cold_start;
            for observation in &observations {
                let result =
                    self.reconciler
                        .reconcile(&mut state.store, target, observation, cold_start, now);

                match result.transition {
                    Transition::Restocked => tracing::info!(
                        identity = %result.record.identity,
                        notify = result.notify,
                        "restocked"
                    ),
                    Transition::SoldOut => {
                        tracing::info!(identity = %result.record.identity, "sold out")
                    }
                    Transition::None => {}
                }

                outcome.changed |= result.changed;
                retractions.extend(result.retract);
                if result.notify {
                    outcome.restocked.retain(|r| r.identity != result.record.identity);
                    outcome.restocked.push(result.record);
                }
            }

            // A later duplicate of the same identity may have sold it out again.
            outcome.restocked.retain(|r| {
                state
                    .store
                    .get(&r.identity)
                    .is_some_and(|stored| stored.is_in_stock())
            });
        }
        self.retract(retractions).await;

        outcome
    }
}

/// Scan until the future is dropped: reload targets, run a cycle, sleep.
/// A cycle that panics or cannot load its targets counts as failed.
pub async fn run_forever(watcher: Arc<Watcher>, catalog: TargetCatalog, interval: Duration) {
    loop {
        match catalog.load().await {
            Ok(targets) => {
                let cycle = tokio::spawn({
                    let watcher = watcher.clone();
                    async move { watcher.run_cycle(targets).await }
                });
                if let Err(e) = cycle.await {
                    tracing::error!(error = %e, "scan cycle aborted");
                    watcher.record_health(true).await;
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load targets");
                watcher.record_health(true).await;
            }
        }

        tokio::time::sleep(interval).await;
    }
}
