//! Statistics output helpers

use std::{fmt::Display, time::Duration};

use human_repr::HumanThroughput as _;

/// Human friendly output helper
#[derive(Debug, Clone, Copy)]
pub(crate) struct DataRate {
    /// Bytes per second; if None, we were unable to compute a rate.
    rate: Option<f64>,
}

impl DataRate {
    /// Standard constructor
    #[must_use]
    pub(crate) fn new(bytes: u64, time: Duration) -> Self {
        if time.is_zero() {
            // divide by zero is not meaningful
            return Self { rate: None };
        }
        Self {
            #[allow(clippy::cast_precision_loss)]
            rate: Some((bytes as f64) / time.as_secs_f64()),
        }
    }
    /// Accessor
    #[must_use]
    pub(crate) fn byte_rate(&self) -> Option<f64> {
        self.rate
    }
}

impl Display for DataRate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.byte_rate() {
            None => f.write_str("unknown rate"),
            Some(rate) => rate.human_throughput_bytes().fmt(f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::DataRate;
    use assertables::assert_contains;
    use std::time::Duration;

    #[test]
    fn rate() {
        let r = DataRate::new(1_000_000, Duration::from_secs(2));
        assert_eq!(r.byte_rate(), Some(500_000.0));
        assert_contains!(r.to_string(), "kB/s");
    }

    #[test]
    fn zero_time() {
        let r = DataRate::new(1_000, Duration::ZERO);
        assert_eq!(r.byte_rate(), None);
        assert_eq!(r.to_string(), "unknown rate");
    }
}
