use std::fmt;

/// Identifier of a task in a task graph; ids follow emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(usize);

impl TaskId {
    pub fn new(id: usize) -> Self {
        TaskId(id)
    }

    pub fn id(&self) -> usize {
        self.0
    }

    /// One-based step number used in location names.
    pub fn step(&self) -> usize {
        self.0 + 1
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task{}", self.0)
    }
}
