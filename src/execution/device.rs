//! Compute devices.
//!
//! A device runs submitted jobs strictly in submission order. The host
//! reference device is the only one this build ships: it is available as
//! device 0 under every backend API and runs kernels on a dedicated worker
//! thread, spreading each kernel over the rayon pool.

use crate::core::error::{FilterError, FilterResult};
use crate::core::types::BackendApi;
use crate::execution::engine::{run_job, Job};
use crate::execution::timeline::{Outcome, Submission, Timeline};
use crossbeam::channel::{self, Receiver, Sender};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

/// Static properties of a device, as answered by device info queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDescription {
    pub backend: BackendApi,
    pub index: u32,
    pub name: String,
    pub vendor: String,
    /// Memory available to the device in bytes
    pub memory_size: u64,
}

/// Number of devices exposed under a backend API.
pub fn device_count(_backend: BackendApi) -> u32 {
    1
}

/// Describe a device without opening it.
pub fn describe(backend: BackendApi, index: u32) -> FilterResult<DeviceDescription> {
    if index >= device_count(backend) {
        return Err(FilterError::InvalidParameter(format!(
            "device {} out of range, {} has {} device(s)",
            index,
            backend,
            device_count(backend)
        )));
    }
    Ok(DeviceDescription {
        backend,
        index,
        name: format!("Host Reference Device ({})", backend.name()),
        vendor: "filterworks".to_string(),
        memory_size: host_memory_size(),
    })
}

/// Total system memory, 0 when it cannot be determined.
fn host_memory_size() -> u64 {
    std::fs::read_to_string("/proc/meminfo")
        .ok()
        .and_then(|meminfo| {
            meminfo
                .lines()
                .find(|line| line.starts_with("MemTotal:"))
                .and_then(|line| line.split_whitespace().nth(1))
                .and_then(|kb| kb.parse::<u64>().ok())
        })
        .map(|kb| kb * 1024)
        .unwrap_or(0)
}

/// A device that accepts jobs.
pub trait Device: Send {
    /// Properties of this device.
    fn description(&self) -> &DeviceDescription;

    /// Hand a job to the device and return without waiting for it.
    fn submit(&self, job: Job, timeline: Arc<Timeline>) -> FilterResult<Submission>;

    /// Push any batched work to the device without blocking.
    fn flush(&self) {}
}

struct Message {
    job: Job,
    ticket: u64,
    timeline: Arc<Timeline>,
    outcome: Arc<Outcome>,
}

/// Device backed by a host worker thread.
pub struct HostDevice {
    description: DeviceDescription,
    sender: Option<Sender<Message>>,
    worker: Option<JoinHandle<()>>,
}

impl HostDevice {
    /// Open a device and start its worker.
    pub fn open(backend: BackendApi, index: u32) -> FilterResult<Self> {
        let description = describe(backend, index)?;
        let (sender, receiver) = channel::unbounded();
        let worker = thread::Builder::new()
            .name(format!("filterworks-{}-{}", backend.name(), index))
            .spawn(move || worker_loop(receiver))
            .map_err(|e| FilterError::io("starting device worker", e))?;
        log::debug!("opened {}", description.name);
        Ok(Self {
            description,
            sender: Some(sender),
            worker: Some(worker),
        })
    }
}

fn worker_loop(receiver: Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        let result = run_job(&message.job);
        match &result {
            Ok(report) => log::debug!(
                "queue {}: job {} finished {} attachment(s) in {:?}",
                message.job.queue,
                message.ticket,
                report.attachments,
                report.execution_time
            ),
            Err(e) => log::error!(
                "queue {}: job {} failed: {}",
                message.job.queue,
                message.ticket,
                e
            ),
        }
        message.timeline.finish(message.ticket, &result);
        message.outcome.set(result);
    }
}

impl Device for HostDevice {
    fn description(&self) -> &DeviceDescription {
        &self.description
    }

    fn submit(&self, job: Job, timeline: Arc<Timeline>) -> FilterResult<Submission> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| FilterError::Internal("device worker has shut down".to_string()))?;
        let ticket = timeline.begin();
        let outcome = Outcome::new();
        let message = Message {
            job,
            ticket,
            timeline: timeline.clone(),
            outcome: outcome.clone(),
        };
        if sender.send(message).is_err() {
            timeline.cancel(ticket);
            return Err(FilterError::Internal(
                "device worker stopped unexpectedly".to_string(),
            ));
        }
        Ok(Submission::new(ticket, timeline, outcome))
    }
}

impl Drop for HostDevice {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain queued jobs and exit
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::error!("{} worker panicked", self.description.name);
            }
        }
    }
}
