/// Completeness scoring.
///
/// A record's score is the reliability-weighted share of expected variables
/// that are present. Every variable of every source is expected on every
/// day. A gap in a complete-coverage source therefore costs more than a gap
/// in a sparse remote-sensing product, which is missing most days anyway.

use crate::config::CompletenessConfig;
use crate::model::{AlignedRecord, Variable, VariableValues};

/// Score one record's values. Always in `[0, 1]`, never null.
pub fn completeness_score(values: &VariableValues, weights: &CompletenessConfig) -> f64 {
    let mut expected = 0.0;
    let mut present = 0.0;
    for variable in Variable::ALL {
        let weight = weights.weight_for(variable.source().tier());
        expected += weight;
        if values.contains_key(&variable) {
            present += weight;
        }
    }
    if expected <= 0.0 {
        return 0.0;
    }
    (present / expected).clamp(0.0, 1.0)
}

/// Score every record independently, in input order.
pub fn score_records(records: &[AlignedRecord], weights: &CompletenessConfig) -> Vec<f64> {
    records
        .iter()
        .map(|r| completeness_score(&r.values, weights))
        .collect()
}
