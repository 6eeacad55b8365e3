//! # Dispatcher
//!
//! One dispatch step moves one event through its state machine:
//!
//! ```text
//! [QUEUED] ──select──→ [DISPATCHING] ──all handlers ok──→ [DONE]
//!                           │
//!                           ├── a handler failed, retries left ──→ [RETRY] (front of bucket)
//!                           └── retries exhausted / no room / deadline missed ──→ [DROPPED]
//! ```
//!
//! The lock is taken three times per subscriber at most (admit, invoke with
//! the lock released, record) and once on each side of the step. The
//! dispatcher owns the event for the whole step and writes the outcome back.

use super::bus::Shared;
use crate::domain::{Admission, DispatchState, Event, Priority, ProcessingStrategy};
use tracing::{debug, warn};

/// What one dispatch step did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// Nothing to select, or the bus is not initialized.
    Idle,
    Processed,
    Retried,
    /// Retries exhausted.
    Failed,
    /// Failed with retries left but the queue had no room to take it back.
    Dropped,
    DeadlineMissed,
    /// The bus was re-initialized or shut down while handlers ran.
    Discarded,
}

/// Select and deliver one event.
pub(crate) fn dispatch_next(shared: &Shared, only: Option<Priority>) -> StepOutcome {
    let now = shared.now_us();
    let taken = shared.with_state(|state| {
        let strategy = state.config.processing_strategy;
        let mut event = state.queues.pop_next(strategy, only)?;

        if strategy == ProcessingStrategy::Deadline && event.is_expired(now) {
            event.state = DispatchState::Dropped;
            state.stats.on_deadline_missed();
            state.stats.observe_depth(state.queues.len());
            warn!(
                event_type = state.registry.name(event.type_id),
                sequence = event.sequence_number,
                missed_by_us = now - event.deadline_us,
                "Event missed its deadline"
            );
            return Some(Err(()));
        }

        event.state = DispatchState::Dispatching;
        let candidates = state.subscriptions.candidates(event.type_id, event.priority);
        Some(Ok((
            event,
            candidates,
            state.config.enable_analytics,
            state.generation,
        )))
    });

    let (mut event, candidates, analytics, generation) = match taken {
        Ok(Some(Ok(work))) => work,
        Ok(Some(Err(()))) => return StepOutcome::DeadlineMissed,
        Ok(None) | Err(_) => return StepOutcome::Idle,
    };

    let started = shared.now_us();
    let mut succeeded = true;

    for candidate in candidates {
        if let Some(predicate) = &candidate.predicate {
            if !predicate(&event) {
                continue;
            }
        }

        let admission = shared
            .with_state(|state| {
                if state.generation != generation {
                    return Admission::Gone;
                }
                state.subscriptions.admit(candidate.id, shared.now_us())
            })
            .unwrap_or(Admission::Gone);
        if admission != Admission::Admitted {
            continue;
        }

        let callback_start = shared.now_us();
        let ok = candidate.handler.handle(&event);
        let callback_end = shared.now_us();

        if analytics {
            let _ = shared.with_state(|state| {
                if state.generation == generation {
                    state.subscriptions.record_callback(
                        candidate.id,
                        callback_end.saturating_sub(callback_start),
                        callback_end,
                    );
                }
            });
        }

        // Keep going: every subscriber sees the event even if one fails.
        if !ok {
            succeeded = false;
        }
    }

    let finished = shared.now_us();
    shared
        .with_state(|state| {
            if state.generation != generation {
                return StepOutcome::Discarded;
            }
            if analytics {
                state
                    .stats
                    .add_processing_time(finished.saturating_sub(started));
            }
            let outcome = if succeeded {
                complete(state, &mut event, finished, analytics)
            } else {
                retry_or_drop(state, event)
            };
            state.stats.observe_depth(state.queues.len());
            outcome
        })
        .unwrap_or(StepOutcome::Discarded)
}

fn complete(
    state: &mut super::bus::BusState,
    event: &mut Event,
    finished_us: u64,
    analytics: bool,
) -> StepOutcome {
    event.state = DispatchState::Done;
    state.stats.on_processed();
    if analytics {
        state
            .stats
            .record_latency(finished_us.saturating_sub(event.timestamp_us));
    }
    StepOutcome::Processed
}

fn retry_or_drop(state: &mut super::bus::BusState, mut event: Event) -> StepOutcome {
    event.retry_count += 1;
    if event.retry_count >= event.max_retries {
        event.state = DispatchState::Dropped;
        state.stats.on_failed();
        warn!(
            event_type = state.registry.name(event.type_id),
            sequence = event.sequence_number,
            attempts = event.retry_count,
            "Event failed after exhausting retries"
        );
        return StepOutcome::Failed;
    }

    event.state = DispatchState::Retry;
    let (type_id, sequence, attempt) = (event.type_id, event.sequence_number, event.retry_count);
    match state.queues.push_front(event) {
        Ok(()) => {
            state.stats.on_retried();
            debug!(
                event_type = state.registry.name(type_id),
                sequence,
                attempt,
                "Requeued event for retry"
            );
            StepOutcome::Retried
        }
        Err(mut event) => {
            event.state = DispatchState::Dropped;
            state.stats.on_failed();
            state.stats.on_dropped();
            warn!(
                event_type = state.registry.name(type_id),
                sequence,
                "No room to requeue failed event, dropped"
            );
            StepOutcome::Dropped
        }
    }
}

/// Run dispatch steps until `max_events` steps were taken, the budget ran
/// out or nothing is left. Returns the number of processed events.
pub(crate) fn drain(
    shared: &Shared,
    max_events: u32,
    time_budget_us: u64,
    only: Option<Priority>,
) -> u32 {
    let start = shared.now_us();
    let mut steps = 0u32;
    let mut processed = 0u32;

    while steps < max_events {
        if time_budget_us > 0 && shared.now_us().saturating_sub(start) >= time_budget_us {
            break;
        }
        match dispatch_next(shared, only) {
            StepOutcome::Idle | StepOutcome::Discarded => break,
            StepOutcome::Processed => processed += 1,
            _ => {}
        }
        steps += 1;
    }

    if processed > 0 {
        debug!(
            processed,
            steps,
            elapsed_us = shared.now_us().saturating_sub(start),
            "Processed events"
        );
    }
    processed
}
