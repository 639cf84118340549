//! Stores

use crate::fees::FeeSchedule;

/// A participating retailer and its shipping fee schedule.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Store {
    id: String,
    schedule: FeeSchedule,
    synthesized: bool,
}

impl Store {
    /// Create a store with a configured fee schedule.
    pub fn new(id: impl Into<String>, schedule: FeeSchedule) -> Self {
        Self {
            id: id.into(),
            schedule,
            synthesized: false,
        }
    }

    /// Create a store whose fee schedule was filled in because none was configured.
    pub fn synthesized(id: impl Into<String>, schedule: FeeSchedule) -> Self {
        Self {
            synthesized: true,
            ..Self::new(id, schedule)
        }
    }

    /// Store identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Sparse fee schedule
    pub fn schedule(&self) -> &FeeSchedule {
        &self.schedule
    }

    /// Whether the fee schedule is a default rather than configured data.
    pub fn is_synthesized(&self) -> bool {
        self.synthesized
    }
}
