//! Completion tracking for submitted work.
//!
//! Every command queue owns a [`Timeline`]. Each execute takes a ticket from
//! it; the device worker finishes tickets in order. `synchronize` waits for
//! the last ticket and reports the first failure seen since the previous
//! synchronize. A [`Submission`] waits for one ticket only.

use crate::core::error::{FilterError, FilterResult};
use crate::core::handle::QueueId;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Timings of one completed job.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct JobReport {
    /// Wall time spent running every attachment of the job.
    pub execution_time: Duration,
    /// Number of attachments that ran.
    pub attachments: usize,
}

#[derive(Debug, Default)]
struct TimelineState {
    submitted: u64,
    completed: u64,
    first_error: Option<FilterError>,
}

/// Ordered submitted/completed counters of one command queue.
#[derive(Debug)]
pub struct Timeline {
    queue: QueueId,
    state: Mutex<TimelineState>,
    changed: Condvar,
}

impl Timeline {
    /// Create a shared timeline for a queue.
    pub fn new(queue: QueueId) -> Arc<Self> {
        Arc::new(Self {
            queue,
            state: Mutex::new(TimelineState::default()),
            changed: Condvar::new(),
        })
    }

    /// Queue this timeline belongs to.
    pub fn queue(&self) -> QueueId {
        self.queue
    }

    /// Reserve the next ticket.
    pub(crate) fn begin(&self) -> u64 {
        let mut state = self.state.lock();
        state.submitted += 1;
        state.submitted
    }

    /// Give back a ticket whose job never reached the device.
    pub(crate) fn cancel(&self, ticket: u64) {
        let mut state = self.state.lock();
        if state.submitted == ticket {
            state.submitted -= 1;
        }
    }

    /// Mark a ticket complete.
    pub(crate) fn finish(&self, ticket: u64, result: &FilterResult<JobReport>) {
        let mut state = self.state.lock();
        state.completed = state.completed.max(ticket);
        if let Err(error) = result {
            if state.first_error.is_none() {
                state.first_error = Some(error.clone());
            }
        }
        self.changed.notify_all();
    }

    /// Number of tickets submitted but not yet complete.
    pub fn pending(&self) -> u64 {
        let state = self.state.lock();
        state.submitted - state.completed
    }

    /// Block until `ticket` is complete.
    pub fn wait_for(&self, ticket: u64) {
        let mut state = self.state.lock();
        while state.completed < ticket {
            self.changed.wait(&mut state);
        }
    }

    /// Block until every submitted ticket is complete.
    ///
    /// Returns the first failure since the previous call and forgets it.
    pub fn synchronize(&self) -> FilterResult<()> {
        let mut state = self.state.lock();
        while state.completed < state.submitted {
            self.changed.wait(&mut state);
        }
        match state.first_error.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Result slot of a single job, filled by the worker.
#[derive(Debug, Default)]
pub(crate) struct Outcome {
    result: Mutex<Option<FilterResult<JobReport>>>,
    ready: Condvar,
}

impl Outcome {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set(&self, result: FilterResult<JobReport>) {
        *self.result.lock() = Some(result);
        self.ready.notify_all();
    }

    fn wait(&self) -> FilterResult<JobReport> {
        let mut result = self.result.lock();
        loop {
            if let Some(result) = result.as_ref() {
                return result.clone();
            }
            self.ready.wait(&mut result);
        }
    }

    fn peek(&self) -> Option<FilterResult<JobReport>> {
        self.result.lock().clone()
    }
}

/// Handle to one submitted execution.
///
/// Returned once the job is handed to the device. Waiting on it blocks only
/// for this job; [`Context::synchronize`](crate::runtime::Context::synchronize)
/// waits for the whole queue.
#[derive(Debug, Clone)]
pub struct Submission {
    ticket: u64,
    timeline: Arc<Timeline>,
    outcome: Arc<Outcome>,
}

impl Submission {
    pub(crate) fn new(ticket: u64, timeline: Arc<Timeline>, outcome: Arc<Outcome>) -> Self {
        Self {
            ticket,
            timeline,
            outcome,
        }
    }

    /// Position of this job on its queue's timeline, starting at 1.
    pub fn ticket(&self) -> u64 {
        self.ticket
    }

    /// Queue the job was submitted on.
    pub fn queue(&self) -> QueueId {
        self.timeline.queue()
    }

    /// Whether the job has finished, successfully or not.
    pub fn is_complete(&self) -> bool {
        self.outcome.peek().is_some()
    }

    /// Block until the job finishes and return its report.
    pub fn wait(&self) -> FilterResult<JobReport> {
        self.outcome.wait()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::kind::FilterType;
    use std::thread;

    fn failure() -> FilterError {
        FilterError::Kernel {
            filter_type: FilterType::GaussianBlur,
            message: "boom".to_string(),
        }
    }

    #[test]
    fn test_synchronize_waits_for_all() {
        let timeline = Timeline::new(QueueId::new());
        let a = timeline.begin();
        let b = timeline.begin();
        assert_eq!(timeline.pending(), 2);

        let worker = {
            let timeline = timeline.clone();
            thread::spawn(move || {
                timeline.finish(a, &Ok(JobReport::default()));
                timeline.finish(b, &Ok(JobReport::default()));
            })
        };
        timeline.synchronize().unwrap();
        assert_eq!(timeline.pending(), 0);
        worker.join().unwrap();
    }

    #[test]
    fn test_first_error_reported_once() {
        let timeline = Timeline::new(QueueId::new());
        let a = timeline.begin();
        let b = timeline.begin();
        timeline.finish(a, &Err(failure()));
        timeline.finish(b, &Err(FilterError::Internal("second".to_string())));

        let err = timeline.synchronize().unwrap_err();
        assert_eq!(err, failure());
        assert!(timeline.synchronize().is_ok());
    }

    #[test]
    fn test_cancelled_ticket_not_awaited() {
        let timeline = Timeline::new(QueueId::new());
        let ticket = timeline.begin();
        timeline.cancel(ticket);
        assert_eq!(timeline.pending(), 0);
        timeline.synchronize().unwrap();
    }

    #[test]
    fn test_submission_wait() {
        let timeline = Timeline::new(QueueId::new());
        let outcome = Outcome::new();
        let ticket = timeline.begin();
        let submission = Submission::new(ticket, timeline.clone(), outcome.clone());
        assert!(!submission.is_complete());

        let report = JobReport {
            execution_time: Duration::from_micros(5),
            attachments: 1,
        };
        outcome.set(Ok(report));
        timeline.finish(ticket, &Ok(report));
        assert!(submission.is_complete());
        assert_eq!(submission.wait().unwrap(), report);
        assert_eq!(submission.ticket(), 1);
    }
}
