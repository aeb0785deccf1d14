use super::reading::Reading;
use crate::config::FilterConfig;
use serde_json::Number;
use std::collections::HashMap;

/// Last accepted reading of a meter, the baseline for the next one
#[derive(Debug, Clone, PartialEq)]
pub struct MeterState {
    pub last_reading: Number,
    pub last_other_fields: Vec<String>,
}

/// Deviation limits, each one optional. Zero or negative limits disable the check.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OutlierPolicy {
    pub percent: Option<f64>,
    pub absolute: Option<f64>,
}

impl OutlierPolicy {
    pub fn new(percent: Option<f64>, absolute: Option<f64>) -> Self {
        OutlierPolicy {
            percent: percent.filter(|p| *p > 0.0),
            absolute: absolute.filter(|a| *a > 0.0),
        }
    }

    pub fn is_outlier(&self, reading: f64, baseline: f64) -> bool {
        if let Some(p) = self.percent {
            let a = baseline * (1.0 - p / 100.0);
            let b = baseline * (1.0 + p / 100.0);
            if reading < a.min(b) || reading > a.max(b) {
                return true;
            }
        }

        if let Some(limit) = self.absolute {
            if (reading - baseline).abs() > limit {
                return true;
            }
        }

        false
    }
}

/// Exact comparison for integers of any size, 500 and 500.0 are still the same reading
pub fn same_number(a: &Number, b: &Number) -> bool {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return x == y;
    }
    if a.is_f64() || b.is_f64() {
        return a.as_f64() == b.as_f64();
    }
    /* one negative, one beyond i64 */
    false
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// No baseline yet, always published
    Initial,
    Changed,
    /// Same reading and fields as the baseline
    Unchanged { republish: bool },
    /// Rejected, baseline kept as it was
    Outlier,
}

impl Verdict {
    pub fn publishes(&self) -> bool {
        match self {
            Verdict::Initial | Verdict::Changed => true,
            Verdict::Unchanged { republish } => *republish,
            Verdict::Outlier => false,
        }
    }
}

/// Per-meter baselines, owned by one pipeline instance
#[derive(Debug, Default)]
pub struct MeterStates {
    states: HashMap<u64, MeterState>,
    policy: OutlierPolicy,
    publish_duplicates: bool,
}

impl MeterStates {
    pub fn new(policy: OutlierPolicy, publish_duplicates: bool) -> Self {
        MeterStates { states: HashMap::new(), policy, publish_duplicates }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(OutlierPolicy::new(config.outlier_percent, config.outlier_absolute), config.publish_duplicates)
    }

    pub fn get(&self, id: u64) -> Option<&MeterState> {
        self.states.get(&id)
    }

    /// Classify a reading and store it as the new baseline when it is accepted
    pub fn evaluate(&mut self, id: u64, reading: &Reading) -> Verdict {
        let verdict = match self.states.get(&id) {
            None => Verdict::Initial,
            Some(state) if same_number(&state.last_reading, &reading.value) && state.last_other_fields == reading.other_fields => {
                return Verdict::Unchanged { republish: self.publish_duplicates };
            }
            Some(state) => {
                let baseline = state.last_reading.as_f64().unwrap_or_default();
                /* A band around a zero baseline is empty, treat it like no baseline */
                if baseline != 0.0 && self.policy.is_outlier(reading.as_f64(), baseline) {
                    return Verdict::Outlier;
                }
                Verdict::Changed
            }
        };

        self.states.insert(id, MeterState {
            last_reading: reading.value.clone(),
            last_other_fields: reading.other_fields.clone(),
        });
        verdict
    }
}
