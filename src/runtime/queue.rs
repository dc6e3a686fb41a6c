//! Command queues.

use crate::core::error::{FilterError, FilterResult};
use crate::core::handle::{FilterId, ImageId, QueueId};
use crate::core::types::Rect;
use crate::execution::timeline::Timeline;
use std::sync::Arc;

/// One filter bound to its input and output images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attachment {
    pub filter: FilterId,
    pub input: ImageId,
    pub output: ImageId,
    /// Output region to write; the whole output when `None`
    pub rect: Option<Rect>,
}

/// Lifecycle of a queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueState {
    /// No attachments.
    Empty,
    /// Attachments changed since the last execute.
    Building,
    /// Work submitted and possibly still running.
    Submitted,
    /// Everything submitted has completed.
    Synchronized,
}

/// Ordered list of attachments executed as one unit.
#[derive(Debug)]
pub struct CommandQueue {
    id: QueueId,
    attachments: Vec<Attachment>,
    state: QueueState,
    timeline: Arc<Timeline>,
    executions: u64,
}

impl CommandQueue {
    pub(crate) fn new(id: QueueId) -> Self {
        Self {
            id,
            attachments: Vec::new(),
            state: QueueState::Empty,
            timeline: Timeline::new(id),
            executions: 0,
        }
    }

    pub fn id(&self) -> QueueId {
        self.id
    }

    /// Attachments in execution order.
    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn state(&self) -> QueueState {
        self.state
    }

    /// Number of successful submissions.
    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub(crate) fn timeline(&self) -> Arc<Timeline> {
        self.timeline.clone()
    }

    /// Position of a filter in the queue.
    pub fn position(&self, filter: FilterId) -> Option<usize> {
        self.attachments.iter().position(|a| a.filter == filter)
    }

    /// Append an attachment, or replace the filter's existing one in place.
    pub(crate) fn attach(&mut self, attachment: Attachment) -> FilterResult<()> {
        if let Some(rect) = attachment.rect {
            if !rect.is_aligned() {
                return Err(FilterError::InvalidParameter(format!(
                    "rect {} is not aligned to {} pixels",
                    rect,
                    Rect::ALIGNMENT
                )));
            }
        }
        match self.position(attachment.filter) {
            Some(index) => self.attachments[index] = attachment,
            None => self.attachments.push(attachment),
        }
        self.state = QueueState::Building;
        Ok(())
    }

    /// Remove a filter; the remaining attachments keep their order.
    pub(crate) fn detach(&mut self, filter: FilterId) -> FilterResult<Attachment> {
        let index = self.position(filter).ok_or_else(|| {
            FilterError::InvalidParameter(format!(
                "filter {} is not attached to queue {}",
                filter, self.id
            ))
        })?;
        let removed = self.attachments.remove(index);
        self.state = if self.attachments.is_empty() {
            QueueState::Empty
        } else {
            QueueState::Building
        };
        Ok(removed)
    }

    pub(crate) fn mark_submitted(&mut self) {
        self.executions += 1;
        self.state = QueueState::Submitted;
    }

    pub(crate) fn mark_synchronized(&mut self) {
        if self.state == QueueState::Submitted {
            self.state = QueueState::Synchronized;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::Status;

    fn attachment(filter: FilterId) -> Attachment {
        Attachment {
            filter,
            input: ImageId::new(),
            output: ImageId::new(),
            rect: None,
        }
    }

    #[test]
    fn test_attach_detach_order() {
        let mut queue = CommandQueue::new(QueueId::new());
        let (a, b, c) = (FilterId::new(), FilterId::new(), FilterId::new());
        for f in [a, b, c] {
            queue.attach(attachment(f)).unwrap();
        }
        assert_eq!(queue.state(), QueueState::Building);

        queue.detach(b).unwrap();
        let order: Vec<_> = queue.attachments().iter().map(|x| x.filter).collect();
        assert_eq!(order, vec![a, c]);
        assert_eq!(queue.detach(b).unwrap_err().status(), Status::InvalidParameter);
    }

    #[test]
    fn test_reattach_replaces_in_place() {
        let mut queue = CommandQueue::new(QueueId::new());
        let (a, b) = (FilterId::new(), FilterId::new());
        queue.attach(attachment(a)).unwrap();
        queue.attach(attachment(b)).unwrap();

        let replacement = attachment(a);
        queue.attach(replacement).unwrap();
        assert_eq!(queue.attachments().len(), 2);
        assert_eq!(queue.attachments()[0], replacement);
    }

    #[test]
    fn test_unaligned_rect_rejected() {
        let mut queue = CommandQueue::new(QueueId::new());
        let mut bad = attachment(FilterId::new());
        bad.rect = Some(Rect::new(4, 0, 8, 8));
        assert_eq!(queue.attach(bad).unwrap_err().status(), Status::InvalidParameter);
        assert!(queue.attachments().is_empty());
        assert_eq!(queue.state(), QueueState::Empty);
    }

    #[test]
    fn test_state_transitions() {
        let mut queue = CommandQueue::new(QueueId::new());
        let a = FilterId::new();
        queue.attach(attachment(a)).unwrap();
        queue.mark_submitted();
        assert_eq!(queue.state(), QueueState::Submitted);
        queue.mark_synchronized();
        assert_eq!(queue.state(), QueueState::Synchronized);
        queue.detach(a).unwrap();
        assert_eq!(queue.state(), QueueState::Empty);
        assert_eq!(queue.executions(), 1);
    }
}
