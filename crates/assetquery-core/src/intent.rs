use crate::errors::Result;
use crate::mapping::{IntentMappingTable, LabelSpace, MappingRow};
use crate::model::{IntentMatch, IntentPrediction};

pub const ASSET_COUNT: &str = "asset_count";
pub const VULNERABILITY_LABNAME: &str = "vulnerability_labname";
pub const NOT_PATCHABLE: &str = "not_patchable";
pub const COUNT_VULNERABILITIES: &str = "count_vulnerabilities";

/// How many ranked intents a prediction keeps.
pub const TOP_K: usize = 4;

/// Query strategy chosen for a predicted intent.
///
/// The analytic intents are matched before the mapping table, so a mapping row that happens to
/// share one of their labels never takes effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IntentKind<'a> {
    AssetCount,
    VulnerabilityLabname,
    NotPatchable,
    CountVulnerabilities,
    Generic(&'a MappingRow),
    /// Not special and absent from the mapping table; carries the predicted label.
    Unmapped(&'a str),
}

impl<'a> IntentKind<'a> {
    pub fn resolve(label: &'a str, table: &'a IntentMappingTable) -> Self {
        match label {
            ASSET_COUNT => IntentKind::AssetCount,
            VULNERABILITY_LABNAME => IntentKind::VulnerabilityLabname,
            NOT_PATCHABLE => IntentKind::NotPatchable,
            COUNT_VULNERABILITIES => IntentKind::CountVulnerabilities,
            other => table
                .lookup(other)
                .map(IntentKind::Generic)
                .unwrap_or(IntentKind::Unmapped(other)),
        }
    }

    /// Low-cardinality name for logs and metric labels.
    pub fn name(&self) -> &'static str {
        match self {
            IntentKind::AssetCount => ASSET_COUNT,
            IntentKind::VulnerabilityLabname => VULNERABILITY_LABNAME,
            IntentKind::NotPatchable => NOT_PATCHABLE,
            IntentKind::CountVulnerabilities => COUNT_VULNERABILITIES,
            IntentKind::Generic(_) => "generic",
            IntentKind::Unmapped(_) => "unmapped",
        }
    }
}

/// Turns raw logits into the top intents: softmax, stable sort by probability, keep [`TOP_K`],
/// confidences in percent rounded to two decimals.
pub fn rank_intents(logits: &[f32], labels: &LabelSpace) -> Result<IntentPrediction> {
    labels.validate(logits.len())?;
    let probs = softmax(logits);
    let mut order: Vec<usize> = (0..probs.len()).collect();
    order.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    let top = order
        .into_iter()
        .take(TOP_K)
        .filter_map(|i| {
            labels
                .label(i)
                .map(|label| IntentMatch(label.to_string(), round2(probs[i] * 100.0)))
        })
        .collect();
    Ok(IntentPrediction(top))
}

fn softmax(logits: &[f32]) -> Vec<f64> {
    let max = logits
        .iter()
        .map(|&x| x as f64)
        .fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x as f64 - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(n: usize) -> LabelSpace {
        LabelSpace::new((0..n).map(|i| format!("intent_{i}")).collect())
    }

    #[test]
    fn keeps_top_four_sorted_descending() {
        let pred = rank_intents(&[0.1, 3.0, -1.0, 2.0, 0.5, 1.0], &labels(6)).unwrap();
        assert_eq!(pred.len(), 4);
        let names: Vec<&str> = pred.iter().map(|m| m.label()).collect();
        assert_eq!(names, ["intent_1", "intent_3", "intent_5", "intent_4"]);
        for pair in pred.0.windows(2) {
            assert!(pair[0].confidence() >= pair[1].confidence());
        }
        let total: f64 = pred.iter().map(|m| m.confidence()).sum();
        assert!(total <= 100.0 + 1e-9);
    }

    #[test]
    fn four_intents_sum_to_one_hundred() {
        let pred = rank_intents(&[1.0, 2.0, 3.0, 4.0], &labels(4)).unwrap();
        let total: f64 = pred.iter().map(|m| m.confidence()).sum();
        assert!((total - 100.0).abs() <= 0.02);
    }

    #[test]
    fn ties_keep_index_order() {
        let pred = rank_intents(&[1.0, 1.0, 1.0], &labels(3)).unwrap();
        let names: Vec<&str> = pred.iter().map(|m| m.label()).collect();
        assert_eq!(names, ["intent_0", "intent_1", "intent_2"]);
        assert_eq!(pred.0[0].confidence(), 33.33);
    }

    #[test]
    fn fewer_intents_than_slots() {
        let pred = rank_intents(&[0.0, 5.0], &labels(2)).unwrap();
        assert_eq!(pred.len(), 2);
        assert_eq!(pred.selected().unwrap().label(), "intent_1");
    }

    #[test]
    fn nan_logit_does_not_break_ranking() {
        let mut logits: Vec<f32> = (0..40).map(|i| i as f32 / 10.0).collect();
        logits[7] = f32::NAN;
        let pred = rank_intents(&logits, &labels(40)).unwrap();
        assert_eq!(pred.len(), 4);
    }

    #[test]
    fn length_mismatch_fails_loudly() {
        let err = rank_intents(&[0.0, 1.0, 2.0], &labels(4)).unwrap_err();
        assert_eq!(err.code(), "model");
    }

    #[test]
    fn special_intents_override_mapping_rows() {
        let table = IntentMappingTable::from_rows(vec![
            MappingRow {
                intent: ASSET_COUNT.into(),
                entities: vec!["MAC Address".into()],
            },
            MappingRow {
                intent: "open_ports".into(),
                entities: vec!["Port".into()],
            },
        ]);
        assert_eq!(IntentKind::resolve(ASSET_COUNT, &table), IntentKind::AssetCount);
        assert_eq!(
            IntentKind::resolve(COUNT_VULNERABILITIES, &table),
            IntentKind::CountVulnerabilities
        );
        assert!(matches!(
            IntentKind::resolve("open_ports", &table),
            IntentKind::Generic(row) if row.entities == ["Port"]
        ));
        assert_eq!(IntentKind::resolve("nope", &table), IntentKind::Unmapped("nope"));
        assert_eq!(IntentKind::resolve("nope", &table).name(), "unmapped");
    }
}
