use std::collections::VecDeque;

use fleetsim_common::{ParseEnumError, Priority, TaskId, TaskKind};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Reasons a task submission is rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),
    #[error(transparent)]
    OutOfRange(#[from] ParseEnumError),
}

/// A queued unit of work. Immutable once enqueued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comments: Option<String>,
    pub created_at: u64,
}

/// A task submission exactly as a collaborator sent it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct TaskRequest {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    #[serde(default)]
    pub to: Option<String>,
    #[serde(default)]
    pub comments: Option<String>,
}

impl TaskRequest {
    pub fn new(kind: TaskKind, priority: Priority) -> Self {
        Self {
            kind: Some(kind.to_string()),
            priority: Some(priority.to_string()),
            ..Self::default()
        }
    }

    pub fn from_zone(mut self, zone: impl Into<String>) -> Self {
        self.from = Some(zone.into());
        self
    }

    pub fn to_zone(mut self, zone: impl Into<String>) -> Self {
        self.to = Some(zone.into());
        self
    }

    pub fn with_comments(mut self, comments: impl Into<String>) -> Self {
        self.comments = Some(comments.into());
        self
    }

    /// Check the required fields and parse them into the fixed enumerations.
    /// Blank strings count as missing.
    pub fn validate(self) -> Result<NewTask, ValidationError> {
        let kind = required(self.kind.as_deref(), "type")?.parse::<TaskKind>()?;
        let priority = required(self.priority.as_deref(), "priority")?.parse::<Priority>()?;
        Ok(NewTask {
            kind,
            priority,
            from: self.from,
            to: self.to,
            comments: self.comments,
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, ValidationError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(ValidationError::MissingField(field)),
    }
}

/// A validated submission, waiting for identity and timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    pub kind: TaskKind,
    pub priority: Priority,
    pub from: Option<String>,
    pub to: Option<String>,
    pub comments: Option<String>,
}

/// Strict FIFO of pending tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskQueue {
    items: VecDeque<Task>,
    /// Highest numeric id issued so far; ids never repeat or go backwards.
    last_issued: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate `count` starter tasks `task-1..task-count`, backdated one minute
    /// apart so that creation time agrees with queue order.
    pub fn seed_initial<R: Rng + ?Sized>(&mut self, count: usize, rng: &mut R, now_ms: u64) {
        for i in 1..=count as u64 {
            let age_minutes = count as u64 + 1 - i;
            self.items.push_back(Task {
                id: TaskId::numbered(i),
                kind: if i % 2 == 0 { TaskKind::Drop } else { TaskKind::Pickup },
                priority: if i % 3 == 0 { Priority::High } else { Priority::Medium },
                from: Some(format!("A{}", rng.gen_range(1..=10_u32))),
                to: Some(format!("B{}", rng.gen_range(1..=10_u32))),
                comments: Some("Initial".into()),
                created_at: now_ms.saturating_sub(age_minutes * 60_000),
            });
            self.last_issued = self.last_issued.max(i);
        }
    }

    /// Validate a submission and append it to the tail.
    ///
    /// The id is derived from `now_ms`, bumped past the last issued id when
    /// several tasks arrive within the same millisecond.
    pub fn enqueue(&mut self, request: TaskRequest, now_ms: u64) -> Result<Task, ValidationError> {
        let new = request.validate()?;
        let number = now_ms.max(self.last_issued + 1);
        self.last_issued = number;

        let task = Task {
            id: TaskId::numbered(number),
            kind: new.kind,
            priority: new.priority,
            from: new.from,
            to: new.to,
            comments: new.comments,
            created_at: now_ms,
        };
        tracing::debug!(id = %task.id, kind = %task.kind, priority = %task.priority, "task enqueued");
        self.items.push_back(task.clone());
        Ok(task)
    }

    /// Remove the head task. `None` means the queue is drained.
    pub fn dequeue(&mut self) -> Option<Task> {
        let task = self.items.pop_front();
        if let Some(ref t) = task {
            tracing::debug!(id = %t.id, remaining = self.items.len(), "task dequeued");
        }
        task
    }

    /// Current contents in queue order.
    pub fn list(&self) -> Vec<Task> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
