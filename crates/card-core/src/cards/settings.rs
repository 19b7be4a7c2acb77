use chrono::{FixedOffset, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::domain::ReplacementReason;

/// Which replacement reasons are currently offered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplacementToggles {
    pub lost: bool,
    pub stolen: bool,
    pub damaged: bool,
}

impl ReplacementToggles {
    pub fn all_enabled() -> Self {
        Self {
            lost: true,
            stolen: true,
            damaged: true,
        }
    }

    pub fn allows(&self, reason: ReplacementReason) -> bool {
        match reason {
            ReplacementReason::Lost => self.lost,
            ReplacementReason::Stolen => self.stolen,
            ReplacementReason::Damaged => self.damaged,
        }
    }
}

impl Default for ReplacementToggles {
    fn default() -> Self {
        Self::all_enabled()
    }
}

/// Source of feature toggles, read once per request.
pub trait FeatureFlags: Send + Sync {
    fn replacement_toggles(&self) -> ReplacementToggles;
}

impl FeatureFlags for ReplacementToggles {
    fn replacement_toggles(&self) -> ReplacementToggles {
        *self
    }
}

/// Current calendar date in the card's reference timezone.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.offset).date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
