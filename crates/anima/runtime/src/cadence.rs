use serde::{Deserialize, Serialize};

/// A tick-modulo schedule. Every periodic subsystem shares the one tick
/// counter and asks its own cadence whether it is due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cadence {
    period: u64,
}

impl Cadence {
    /// Period `0` disables the cadence.
    pub const fn every(period: u64) -> Self {
        Self { period }
    }

    pub const fn disabled() -> Self {
        Self { period: 0 }
    }

    pub fn period(&self) -> u64 {
        self.period
    }

    pub fn is_enabled(&self) -> bool {
        self.period > 0
    }

    /// Due at every positive multiple of the period. Never due at tick 0.
    pub fn is_due(&self, tick: u64) -> bool {
        self.period > 0 && tick > 0 && tick % self.period == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_due_on_multiples_only() {
        let cadence = Cadence::every(10);
        let due: Vec<u64> = (0..=35).filter(|t| cadence.is_due(*t)).collect();
        assert_eq!(due, vec![10, 20, 30]);
    }

    #[test]
    fn test_disabled_never_due() {
        let cadence = Cadence::disabled();
        assert!(!cadence.is_enabled());
        assert!((0..100).all(|t| !cadence.is_due(t)));
    }
}
