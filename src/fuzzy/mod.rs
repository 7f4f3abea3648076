mod engine;
mod membership;
mod rule;

pub use engine::{CombinedEvidence, DefuzzifyMethod, FuzzyInferenceEngine, FuzzyOutputSet};
pub use membership::{FuzzyEvidence, FuzzySet, MembershipFunction};
pub use rule::{Connective, FuzzyAntecedent, FuzzyConsequent, FuzzyRule};

/// A small starter set of linguistic terms (`low`/`medium`/`high`) over the unit interval,
/// mirroring the teacher's bootstrap fixture for quick experimentation and tests.
pub fn create_default_fuzzy_sets() -> Vec<FuzzySet> {
    vec![
        FuzzySet::new("low", 0.0, 1.0, MembershipFunction::Triangular { left: 0.0, center: 0.0, right: 0.5 })
            .expect("default fuzzy sets are well-formed"),
        FuzzySet::new("medium", 0.0, 1.0, MembershipFunction::Triangular { left: 0.0, center: 0.5, right: 1.0 })
            .expect("default fuzzy sets are well-formed"),
        FuzzySet::new("high", 0.0, 1.0, MembershipFunction::Triangular { left: 0.5, center: 1.0, right: 1.0 })
            .expect("default fuzzy sets are well-formed"),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_fuzzy_sets_cover_the_unit_interval() {
        let sets = create_default_fuzzy_sets();
        assert_eq!(sets.len(), 3);
        for x in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let total: f64 = sets.iter().map(|s| s.membership(x)).sum();
            assert!(total > 0.0, "no set covers x = {x}");
        }
    }
}
