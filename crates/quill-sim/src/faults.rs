use serde::{Deserialize, Serialize};

/// Fault injection plan: per-operation failure percentages.
///
/// Each knob is rolled independently on every call of its kind. `save_vanish`
/// is rolled before `save_fail` so an entity-vanished response and a plain
/// outage stay distinguishable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultPlan {
    /// Percentage of draft loads answered "no such entity".
    pub load_missing_percent: u8,
    /// Percentage of saves answered with an entity-vanished error.
    pub save_vanish_percent: u8,
    /// Percentage of saves answered with a plain remote error.
    pub save_fail_percent: u8,
    /// Percentage of issue creations that fail.
    pub create_fail_percent: u8,
    /// Percentage of attachment uploads that fail.
    pub attach_fail_percent: u8,
    /// Percentage of file acquisitions the user cancels.
    pub acquire_cancel_percent: u8,
    /// Percentage of key-value store operations that fail.
    pub store_fail_percent: u8,
}

impl Default for FaultPlan {
    fn default() -> Self {
        Self {
            load_missing_percent: 10,
            save_vanish_percent: 5,
            save_fail_percent: 10,
            create_fail_percent: 10,
            attach_fail_percent: 10,
            acquire_cancel_percent: 10,
            store_fail_percent: 5,
        }
    }
}

impl FaultPlan {
    /// A plan with every fault disabled.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            load_missing_percent: 0,
            save_vanish_percent: 0,
            save_fail_percent: 0,
            create_fail_percent: 0,
            attach_fail_percent: 0,
            acquire_cancel_percent: 0,
            store_fail_percent: 0,
        }
    }

    /// Largest configured percentage, used to reject out-of-range plans.
    #[must_use]
    pub fn max_percent(&self) -> u8 {
        [
            self.load_missing_percent,
            self.save_vanish_percent,
            self.save_fail_percent,
            self.create_fail_percent,
            self.attach_fail_percent,
            self.acquire_cancel_percent,
            self.store_fail_percent,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}
