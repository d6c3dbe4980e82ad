// horizon_core/src/stamp.rs

use serde::{Deserialize, Serialize};
use std::fmt;

const NANOS_PER_SEC: i64 = 1_000_000_000;

/// A point in time, stored as signed nanoseconds since an arbitrary epoch.
///
/// Stamps are totally ordered so they can key ordered maps (the smoother's
/// window and the synchronizer both rely on that). Floating-point seconds are
/// only used at the edges, for construction and for window arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Stamp(i64);

impl Stamp {
    pub const ZERO: Stamp = Stamp(0);
    pub const MIN: Stamp = Stamp(i64::MIN);
    pub const MAX: Stamp = Stamp(i64::MAX);

    pub const fn from_nanos(nanos: i64) -> Self {
        Self(nanos)
    }

    /// Builds a stamp from whole seconds plus a nanosecond remainder.
    pub const fn new(sec: i64, nsec: u32) -> Self {
        Self(sec * NANOS_PER_SEC + nsec as i64)
    }

    /// Builds a stamp from floating-point seconds, rounding to the nearest nanosecond.
    pub fn from_secs_f64(secs: f64) -> Self {
        Self((secs * NANOS_PER_SEC as f64).round() as i64)
    }

    pub const fn as_nanos(self) -> i64 {
        self.0
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / NANOS_PER_SEC as f64
    }

    /// Shifts the stamp by a (possibly negative) number of seconds, saturating at the
    /// representable range.
    pub fn offset_secs(self, secs: f64) -> Self {
        let delta = (secs * NANOS_PER_SEC as f64).round();
        if delta >= i64::MAX as f64 {
            return Self::MAX;
        }
        if delta <= i64::MIN as f64 {
            return Self::MIN;
        }
        Self(self.0.saturating_add(delta as i64))
    }

    /// Signed difference `self - earlier` in seconds.
    pub fn secs_since(self, earlier: Stamp) -> f64 {
        (self.0 as i128 - earlier.0 as i128) as f64 / NANOS_PER_SEC as f64
    }
}

impl fmt::Display for Stamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sec = self.0.div_euclid(NANOS_PER_SEC);
        let nsec = self.0.rem_euclid(NANOS_PER_SEC);
        write!(f, "{}.{:09}", sec, nsec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_seconds_round_trip() {
        let stamp = Stamp::from_secs_f64(12.5);
        assert_eq!(stamp, Stamp::new(12, 500_000_000));
        assert_abs_diff_eq!(stamp.as_secs_f64(), 12.5, epsilon = 1e-12);
    }

    #[test]
    fn test_ordering_and_offsets() {
        let a = Stamp::from_secs_f64(1.0);
        let b = a.offset_secs(0.25);
        assert!(b > a);
        assert_abs_diff_eq!(b.secs_since(a), 0.25, epsilon = 1e-12);
        assert_eq!(a.offset_secs(-2.0), Stamp::from_secs_f64(-1.0));
        assert_eq!(Stamp::MAX.offset_secs(10.0), Stamp::MAX);
    }

    #[test]
    fn test_display_handles_negative_stamps() {
        assert_eq!(Stamp::new(3, 5).to_string(), "3.000000005");
        assert_eq!(Stamp::from_nanos(-1).to_string(), "-1.999999999");
    }
}
