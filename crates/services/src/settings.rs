use exam_core::model::DEFAULT_EXAM_DURATION_MS;

/// Tunables for new exam sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExamSettings {
    duration_ms: u64,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            duration_ms: DEFAULT_EXAM_DURATION_MS,
        }
    }
}

impl ExamSettings {
    /// Time allowed for a fresh session.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    #[must_use]
    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_to_ninety_minutes() {
        assert_eq!(ExamSettings::default().duration_ms(), 5_400_000);
        assert_eq!(
            ExamSettings::default().with_duration_ms(60_000).duration_ms(),
            60_000
        );
    }
}
