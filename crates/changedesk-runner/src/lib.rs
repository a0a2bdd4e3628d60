// crates/changedesk-runner/src/lib.rs
// ============================================================================
// Module: Changedesk Concurrency Runner
// Description: Bounded worker pool mapping a job over customer codes.
// Purpose: Run per-customer side effects with partial-failure semantics.
// Dependencies: changedesk-core, tokio, tokio-util
// ============================================================================

//! ## Overview
//! [`run_fanout`] maps one job over a list of customers on at most
//! `max_concurrency` workers and aggregates per-customer outcomes into a
//! summary. The contract the reactor depends on:
//! - one outcome per customer, regardless of what the job does;
//! - a panicking job becomes a failed outcome, never an aborted fan-out;
//! - cancellation skips not-yet-started jobs (`success = false`,
//!   `error = None`) while in-flight jobs observe the token they received;
//! - `failed` counts outcomes with an error, `skipped` counts unsuccessful
//!   outcomes without one.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::time::Instant;

use changedesk_core::CustomerCode;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

// ============================================================================
// SECTION: Types
// ============================================================================

/// One fan-out recipient: customer code plus display name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FanoutTarget {
    /// Customer code.
    pub code: CustomerCode,
    /// Friendly customer name for reporting.
    pub name: String,
}

/// Job signature run once per customer.
///
/// The job receives the customer code and the fan-out cancellation token;
/// long-running work should observe the token at its next I/O boundary.
pub type CustomerJob =
    Arc<dyn Fn(&CustomerCode, &CancellationToken) -> Result<Option<Value>, String> + Send + Sync>;

/// Outcome of one per-customer job.
///
/// # Invariants
/// - `error = Some` implies `success = false`.
/// - `success = false` with `error = None` means the job was skipped.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerOutcome {
    /// Customer code.
    pub customer_code: CustomerCode,
    /// Friendly customer name.
    pub customer_name: String,
    /// Whether the job completed successfully.
    pub success: bool,
    /// Failure message, when the job ran and failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Job result payload, when one was produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Wall-clock job duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Aggregated fan-out counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FanoutSummary {
    /// Total number of customers.
    pub total: usize,
    /// Jobs that completed successfully.
    pub successful: usize,
    /// Jobs that ran and failed.
    pub failed: usize,
    /// Jobs skipped before starting.
    pub skipped: usize,
}

/// Full fan-out report: per-customer outcomes plus summary.
#[derive(Debug, Clone, Serialize)]
pub struct FanoutReport {
    /// Per-customer outcomes, in input order.
    pub outcomes: Vec<CustomerOutcome>,
    /// Aggregated counts.
    pub summary: FanoutSummary,
}

impl FanoutReport {
    /// Returns true when every job completed successfully.
    #[must_use]
    pub const fn all_successful(&self) -> bool {
        self.summary.failed == 0 && self.summary.skipped == 0
    }
}

// ============================================================================
// SECTION: Fan-out
// ============================================================================

/// Runs a job once per customer on a bounded worker pool.
///
/// `max_concurrency <= 0` defaults to the number of customers. Jobs run on
/// blocking worker threads; panics are converted into failed outcomes for
/// that customer only. Outcomes are returned in input order.
pub async fn run_fanout(
    targets: Vec<FanoutTarget>,
    job: CustomerJob,
    max_concurrency: i64,
    cancel: CancellationToken,
) -> FanoutReport {
    let total = targets.len();
    let limit = resolve_concurrency(max_concurrency, total);
    let semaphore = Arc::new(Semaphore::new(limit));
    let mut tasks: JoinSet<(usize, CustomerOutcome)> = JoinSet::new();
    for (index, target) in targets.into_iter().enumerate() {
        let semaphore = Arc::clone(&semaphore);
        let job = Arc::clone(&job);
        let cancel = cancel.clone();
        tasks.spawn(async move {
            let outcome = run_one(target, job, semaphore, cancel).await;
            (index, outcome)
        });
    }
    let mut indexed: Vec<(usize, CustomerOutcome)> = Vec::with_capacity(total);
    while let Some(joined) = tasks.join_next().await {
        if let Ok(entry) = joined {
            indexed.push(entry);
        }
    }
    indexed.sort_by_key(|(index, _)| *index);
    let outcomes: Vec<CustomerOutcome> =
        indexed.into_iter().map(|(_, outcome)| outcome).collect();
    let summary = summarize(total, &outcomes);
    FanoutReport {
        outcomes,
        summary,
    }
}

/// Resolves the effective worker-pool size.
fn resolve_concurrency(max_concurrency: i64, total: usize) -> usize {
    if max_concurrency <= 0 {
        return total.max(1);
    }
    usize::try_from(max_concurrency).unwrap_or(usize::MAX)
}

/// Runs one customer job behind the semaphore.
async fn run_one(
    target: FanoutTarget,
    job: CustomerJob,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> CustomerOutcome {
    let Ok(_permit) = semaphore.acquire_owned().await else {
        return skipped_outcome(target);
    };
    if cancel.is_cancelled() {
        return skipped_outcome(target);
    }
    let started = Instant::now();
    let code = target.code.clone();
    let joined = tokio::task::spawn_blocking(move || job(&code, &cancel)).await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    match joined {
        Ok(Ok(result)) => CustomerOutcome {
            customer_code: target.code,
            customer_name: target.name,
            success: true,
            error: None,
            result,
            elapsed_ms,
        },
        Ok(Err(message)) => CustomerOutcome {
            customer_code: target.code,
            customer_name: target.name,
            success: false,
            error: Some(message),
            result: None,
            elapsed_ms,
        },
        Err(join_error) => {
            let message = if join_error.is_panic() {
                "job panicked".to_string()
            } else {
                "job aborted".to_string()
            };
            CustomerOutcome {
                customer_code: target.code,
                customer_name: target.name,
                success: false,
                error: Some(message),
                result: None,
                elapsed_ms,
            }
        }
    }
}

/// Builds the skipped outcome for a customer whose job never started.
fn skipped_outcome(target: FanoutTarget) -> CustomerOutcome {
    CustomerOutcome {
        customer_code: target.code,
        customer_name: target.name,
        success: false,
        error: None,
        result: None,
        elapsed_ms: 0,
    }
}

/// Aggregates outcome counts.
fn summarize(total: usize, outcomes: &[CustomerOutcome]) -> FanoutSummary {
    let successful = outcomes.iter().filter(|outcome| outcome.success).count();
    let failed =
        outcomes.iter().filter(|outcome| !outcome.success && outcome.error.is_some()).count();
    let skipped =
        outcomes.iter().filter(|outcome| !outcome.success && outcome.error.is_none()).count();
    FanoutSummary {
        total,
        successful,
        failed,
        skipped,
    }
}
