use criterion::{criterion_group, criterion_main, Criterion};
use edc_core::fuzzy::{
    create_default_fuzzy_sets, Connective, DefuzzifyMethod, FuzzyAntecedent, FuzzyConsequent,
    FuzzyInferenceEngine, FuzzyRule,
};
use std::collections::HashMap;

fn build_engine() -> FuzzyInferenceEngine {
    let mut engine = FuzzyInferenceEngine::new();
    for set in create_default_fuzzy_sets() {
        engine.add_fuzzy_set(set).unwrap();
    }
    engine
        .add_rule(FuzzyRule {
            id: "r1".to_string(),
            antecedents: vec![FuzzyAntecedent {
                variable: "quality".to_string(),
                fuzzy_set: "medium".to_string(),
                negated: false,
            }],
            connective: Connective::And,
            consequent: FuzzyConsequent { variable: "action".to_string(), fuzzy_set: "high".to_string() },
            weight: 1.0,
        })
        .unwrap();
    engine
}

fn inference_and_defuzzify(c: &mut Criterion) {
    let engine = build_engine();
    let mut inputs = HashMap::new();
    inputs.insert("quality".to_string(), 0.63);

    c.bench_function("fuzzy inference + centroid defuzzify", |b| {
        b.iter(|| {
            let outputs = engine.inference(&inputs).unwrap();
            for output in outputs.values() {
                let _ = engine.defuzzify(output, DefuzzifyMethod::Centroid).unwrap();
            }
        });
    });
}

criterion_group!(benches, inference_and_defuzzify);
criterion_main!(benches);
