use crate::error::{EdcError, Result};
use serde::{Deserialize, Serialize};

/// Membership function variants a [`FuzzySet`] may carry (§3 Data model).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum MembershipFunction {
    Triangular { left: f64, center: f64, right: f64 },
    Trapezoidal { left: f64, left_top: f64, right_top: f64, right: f64 },
    Gaussian { center: f64, sigma: f64 },
    Sigmoid { center: f64, slope: f64 },
    /// Piecewise-linear, sorted by `x`; `y` values must lie in `[0, 1]`.
    Custom { points: Vec<(f64, f64)> },
}

/// A named fuzzy set over a closed interval. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzySet {
    pub name: String,
    pub universe_min: f64,
    pub universe_max: f64,
    pub membership_function: MembershipFunction,
}

impl FuzzySet {
    pub fn new(
        name: impl Into<String>,
        universe_min: f64,
        universe_max: f64,
        membership_function: MembershipFunction,
    ) -> Result<Self> {
        if !(universe_min < universe_max) {
            return Err(EdcError::invalid_input("universe lo must be less than hi"));
        }
        if let MembershipFunction::Custom { points } = &membership_function {
            if points.is_empty() {
                return Err(EdcError::invalid_input("custom membership function needs at least one point"));
            }
            let sorted = points.windows(2).all(|w| w[0].0 <= w[1].0);
            if !sorted {
                return Err(EdcError::invalid_input("custom membership function points must be sorted by x"));
            }
            if points.iter().any(|(_, y)| !(0.0..=1.0).contains(y)) {
                return Err(EdcError::invalid_input("custom membership function y values must be in [0, 1]"));
            }
        }
        Ok(Self {
            name: name.into(),
            universe_min,
            universe_max,
            membership_function,
        })
    }

    /// Membership degree of `x` in this set. Deterministic; outside the universe, always 0.
    pub fn membership(&self, x: f64) -> f64 {
        if x < self.universe_min || x > self.universe_max {
            return 0.0;
        }
        let raw = match &self.membership_function {
            MembershipFunction::Triangular { left, center, right } => {
                triangular(x, *left, *center, *right)
            }
            MembershipFunction::Trapezoidal { left, left_top, right_top, right } => {
                trapezoidal(x, *left, *left_top, *right_top, *right)
            }
            MembershipFunction::Gaussian { center, sigma } => gaussian(x, *center, *sigma),
            MembershipFunction::Sigmoid { center, slope } => sigmoid(x, *center, *slope),
            MembershipFunction::Custom { points } => custom(x, points),
        };
        raw.clamp(0.0, 1.0)
    }
}

fn triangular(x: f64, left: f64, center: f64, right: f64) -> f64 {
    if x <= left || x >= right {
        0.0
    } else if x <= center {
        (x - left) / (center - left)
    } else {
        (right - x) / (right - center)
    }
}

fn trapezoidal(x: f64, left: f64, left_top: f64, right_top: f64, right: f64) -> f64 {
    if x <= left || x >= right {
        0.0
    } else if x <= left_top {
        (x - left) / (left_top - left)
    } else if x <= right_top {
        1.0
    } else {
        (right - x) / (right - right_top)
    }
}

fn gaussian(x: f64, center: f64, sigma: f64) -> f64 {
    (-0.5 * ((x - center) / sigma).powi(2)).exp()
}

fn sigmoid(x: f64, center: f64, slope: f64) -> f64 {
    1.0 / (1.0 + (-slope * (x - center)).exp())
}

fn custom(x: f64, points: &[(f64, f64)]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    for window in points.windows(2) {
        let (x1, y1) = window[0];
        let (x2, y2) = window[1];
        if x >= x1 && x <= x2 {
            if (x2 - x1).abs() < f64::EPSILON {
                return y1;
            }
            return y1 + (y2 - y1) * (x - x1) / (x2 - x1);
        }
    }
    if x < points[0].0 {
        points[0].1
    } else {
        points[points.len() - 1].1
    }
}

/// A single piece of evidence carrying uncertainty metadata (§3 Data model: Evidence datum).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FuzzyEvidence {
    pub value: f64,
    pub membership_degree: f64,
    pub confidence: f64,
    pub source_reliability: f64,
    pub temporal_decay: f64,
    pub context_relevance: f64,
}

impl FuzzyEvidence {
    /// `confidence · source_reliability · temporal_decay · context_relevance`.
    pub fn effective_weight(&self) -> f64 {
        self.confidence * self.source_reliability * self.temporal_decay * self.context_relevance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triangular_peaks_at_center() {
        let set = FuzzySet::new(
            "medium",
            0.0,
            1.0,
            MembershipFunction::Triangular { left: 0.0, center: 0.5, right: 1.0 },
        )
        .unwrap();
        assert!((set.membership(0.5) - 1.0).abs() < 1e-9);
        assert_eq!(set.membership(0.0), 0.0);
        assert_eq!(set.membership(1.0), 0.0);
    }

    #[test]
    fn membership_is_zero_outside_universe() {
        let set = FuzzySet::new(
            "low",
            0.0,
            1.0,
            MembershipFunction::Triangular { left: 0.0, center: 0.2, right: 0.5 },
        )
        .unwrap();
        assert_eq!(set.membership(-1.0), 0.0);
        assert_eq!(set.membership(2.0), 0.0);
    }

    #[test]
    fn universe_order_is_validated() {
        let result = FuzzySet::new(
            "bad",
            1.0,
            0.0,
            MembershipFunction::Gaussian { center: 0.5, sigma: 0.1 },
        );
        assert!(result.is_err());
    }

    #[test]
    fn membership_always_in_unit_interval() {
        let set = FuzzySet::new(
            "sig",
            -10.0,
            10.0,
            MembershipFunction::Sigmoid { center: 0.0, slope: 5.0 },
        )
        .unwrap();
        for i in -100..=100 {
            let x = i as f64 / 10.0;
            let m = set.membership(x);
            assert!((0.0..=1.0).contains(&m));
        }
    }
}
