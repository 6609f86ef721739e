//! The lazy `Range` value (C3, §3.3).
//!
//! Grounded in the teacher's `vm/value/range.rs::RangeValue`, extended with
//! the epsilon-tolerant element count the spec requires and the full-range
//! `:` sentinel the teacher's range (always fully bound) doesn't model.

use std::fmt;

use super::array::{ArrayBody, ArrayData, ArrayRef};

const EPS: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeValue {
    pub start: f64,
    pub step: f64,
    pub end: f64,
    /// Marks the `:` full-range sentinel standing for an entire dimension.
    /// `start`/`step`/`end` are unused when this is set.
    pub is_full: bool,
}

impl RangeValue {
    pub fn new(start: f64, step: f64, end: f64) -> Self {
        RangeValue { start, step, end, is_full: false }
    }

    pub fn full() -> Self {
        RangeValue { start: 0.0, step: 0.0, end: 0.0, is_full: true }
    }

    /// Element count: `0` if `step == 0` or the sign mismatches `end -
    /// start`, else `⌊(end - start) / step⌋ + 1` with an epsilon-tolerant
    /// ceiling at the boundary.
    pub fn len(&self) -> usize {
        if self.is_full {
            return 0;
        }
        if self.step == 0.0 {
            return 0;
        }
        if self.step > 0.0 && self.end < self.start {
            return 0;
        }
        if self.step < 0.0 && self.end > self.start {
            return 0;
        }
        let raw = (self.end - self.start) / self.step;
        let floor = raw.floor();
        let count = if raw - floor > 1.0 - EPS { floor + 1.0 } else { floor };
        (count + 1.0).max(0.0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        if i >= self.len() {
            return None;
        }
        Some(self.start + self.step * i as f64)
    }

    pub fn to_vec(&self) -> Vec<f64> {
        (0..self.len()).map(|i| self.start + self.step * i as f64).collect()
    }

    /// Materializes the range into a row-vector `Value`, as required when a
    /// range is used as an r-value (never when used as an index, §3.3).
    pub fn expand(&self) -> ArrayRef {
        let values = self.to_vec();
        let is_integral = values.iter().all(|v| v.fract() == 0.0);
        let n = values.len();
        if is_integral {
            ArrayBody::new(vec![1, n], ArrayData::Int(values.into_iter().map(|v| v as i64).collect()))
        } else {
            ArrayBody::new(vec![1, n], ArrayData::Float(values))
        }
    }
}

impl fmt::Display for RangeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_full {
            write!(f, ":")
        } else {
            write!(f, "{}:{}:{}", self.start, self.step, self.end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── element count ──
    #[test]
    fn positive_step_count() {
        let r = RangeValue::new(1.0, 1.0, 5.0);
        assert_eq!(r.len(), 5);
    }

    #[test]
    fn negative_step_count_scenario() {
        // 5:-2:0 visits 5, 3, 1
        let r = RangeValue::new(5.0, -2.0, 0.0);
        assert_eq!(r.to_vec(), vec![5.0, 3.0, 1.0]);
    }

    #[test]
    fn zero_step_is_empty() {
        assert_eq!(RangeValue::new(1.0, 0.0, 5.0).len(), 0);
    }

    #[test]
    fn sign_mismatch_is_empty() {
        assert_eq!(RangeValue::new(5.0, 1.0, 1.0).len(), 0);
    }

    #[test]
    fn epsilon_tolerance_includes_boundary() {
        // 0 : 0.1 : 1 in floating point accrues drift near 1.0.
        let r = RangeValue::new(0.0, 0.1, 1.0);
        assert_eq!(r.len(), 11);
    }

    #[test]
    fn full_range_has_no_length() {
        assert_eq!(RangeValue::full().len(), 0);
    }
}
