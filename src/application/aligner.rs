//! Schema aligner: keyed features to a vector in training column order.

use crate::domain::{EncodedFeatures, FeatureVector, TrainingSchema};

/// Lay `features` out in `schema` order. Missing columns become 0, columns
/// outside the schema are dropped.
#[must_use]
pub fn align(schema: &TrainingSchema, features: &EncodedFeatures) -> FeatureVector {
    let mut missing = 0usize;
    let values: Vec<f64> = schema
        .columns()
        .iter()
        .map(|column| match features.get(column) {
            Some(v) => *v,
            None => {
                tracing::trace!(column = %column, "Column absent; filled with 0");
                missing += 1;
                0.0
            }
        })
        .collect();

    let dropped = features.keys().filter(|k| !schema.contains(k)).count();
    if missing > 0 || dropped > 0 {
        tracing::debug!(missing, dropped, "Aligned features to training schema");
    }

    FeatureVector::new(schema.shared_columns(), values)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TrainingSchema {
        TrainingSchema::new(vec!["age".into(), "gender".into(), "long_stay".into()])
            .expect("valid schema")
    }

    #[test]
    fn test_order_fill_and_drop() {
        let mut features = EncodedFeatures::new();
        features.insert("long_stay".into(), 1.0);
        features.insert("age".into(), 75.0);
        features.insert("ward".into(), 3.0);

        let vector = align(&schema(), &features);
        assert_eq!(vector.columns(), schema().columns());
        assert_eq!(vector.values(), &[75.0, 0.0, 1.0]);
        assert!(vector.get("ward").is_none());
    }

    #[test]
    fn test_idempotent() {
        let mut features = EncodedFeatures::new();
        features.insert("age".into(), 70.0);
        features.insert("extra".into(), 9.0);

        let once = align(&schema(), &features);
        let twice = align(&schema(), &once.to_features());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_serializes_in_column_order() {
        let mut features = EncodedFeatures::new();
        features.insert("long_stay".into(), 1.0);
        let json = serde_json::to_string(&align(&schema(), &features)).expect("serialize");
        assert_eq!(json, r#"{"age":0.0,"gender":0.0,"long_stay":1.0}"#);
    }
}
