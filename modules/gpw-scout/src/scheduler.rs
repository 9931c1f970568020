// Bounded-concurrency batch runner.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{error, info, Instrument};
use uuid::Uuid;

use gpw_common::CompanyIdentity;

use crate::deps::ScrapeDeps;
use crate::error::ScrapeError;
use crate::task::{CompanyScrapeTask, Outcome};

/// Outcomes of one batch, in completion order.
#[derive(Debug)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub outcomes: Vec<(CompanyIdentity, Outcome)>,
}

impl BatchReport {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            outcomes: Vec::new(),
        }
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_success()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_skipped()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }

    pub fn outcome(&self, identity: &CompanyIdentity) -> Option<&Outcome> {
        self.outcomes
            .iter()
            .find(|(id, _)| id == identity)
            .map(|(_, outcome)| outcome)
    }

    pub fn failures(&self) -> impl Iterator<Item = (&CompanyIdentity, &ScrapeError)> {
        self.outcomes.iter().filter_map(|(id, outcome)| match outcome {
            Outcome::Failed(e) => Some((id, e)),
            _ => None,
        })
    }
}

impl std::fmt::Display for BatchReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Scrape Batch Complete ===")?;
        writeln!(f, "Run:        {}", self.run_id)?;
        writeln!(f, "Companies:  {}", self.total())?;
        writeln!(f, "Scraped:    {}", self.succeeded())?;
        writeln!(f, "Skipped:    {} (fresh)", self.skipped())?;
        writeln!(f, "Failed:     {}", self.failed())?;
        let mut failures = self.failures().peekable();
        if failures.peek().is_some() {
            writeln!(f, "\nFailures:")?;
            for (identity, e) in failures {
                writeln!(f, "  {identity}: {e}")?;
            }
        }
        Ok(())
    }
}

/// Runs company scrapes over a fixed pool of workers sharing one queue.
pub struct ScrapeScheduler {
    task: Arc<CompanyScrapeTask>,
    concurrency_limit: usize,
}

impl ScrapeScheduler {
    pub fn new(deps: ScrapeDeps) -> Self {
        let concurrency_limit = deps.concurrency_limit.max(1);
        Self {
            task: Arc::new(CompanyScrapeTask::new(deps)),
            concurrency_limit,
        }
    }

    /// Scrape every distinct identity once. Returns after all workers drain.
    pub async fn run(&self, identities: Vec<CompanyIdentity>) -> BatchReport {
        let run_id = Uuid::new_v4();

        let mut seen = HashSet::new();
        let queue: VecDeque<CompanyIdentity> = identities
            .into_iter()
            .filter(|id| seen.insert(id.clone()))
            .collect();
        let total = queue.len();
        let workers = self.concurrency_limit.min(total);

        info!(%run_id, companies = total, workers, "Starting scrape batch");

        let queue = Arc::new(Mutex::new(queue));
        let mut pool = JoinSet::new();
        for worker in 0..workers {
            let queue = queue.clone();
            let task = self.task.clone();
            pool.spawn(
                drain_queue(queue, task).instrument(tracing::info_span!("worker", worker)),
            );
        }

        let mut report = BatchReport::new(run_id);
        while let Some(joined) = pool.join_next().await {
            match joined {
                Ok(done) => report.outcomes.extend(done),
                Err(e) => error!(error = %e, "Scrape worker died"),
            }
        }

        info!(
            %run_id,
            scraped = report.succeeded(),
            skipped = report.skipped(),
            failed = report.failed(),
            "Scrape batch finished"
        );
        report
    }
}

async fn drain_queue(
    queue: Arc<Mutex<VecDeque<CompanyIdentity>>>,
    task: Arc<CompanyScrapeTask>,
) -> Vec<(CompanyIdentity, Outcome)> {
    let mut done = Vec::new();
    loop {
        let next = queue.lock().await.pop_front();
        let Some(identity) = next else { break };

        let task = task.clone();
        let id = identity.clone();
        let outcome = match tokio::spawn(async move { task.run(&id).await }).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(identity = %identity, error = %e, "Company scrape aborted");
                Outcome::Failed(ScrapeError::Aborted(e.to_string()))
            }
        };
        done.push((identity, outcome));
    }
    done
}
