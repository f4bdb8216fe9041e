//! Categorical encoder: label indices and discharge-destination dummies.

use std::sync::Arc;

use crate::domain::patient::field;
use crate::domain::{
    dummy_column, is_numeric_like, EncodedFeatures, EncodingTable, FeatureFrame, UnseenCategory,
};

/// Encodes the categorical side of a [`FeatureFrame`] against the learned
/// label encoders.
///
/// Values never seen during training are encoded as class 0. This keeps
/// scoring total but silently conflates unknown values with the first learned
/// class; each occurrence is reported as an [`UnseenCategory`].
#[derive(Debug, Clone)]
pub struct CategoricalEncoder {
    table: Arc<EncodingTable>,
}

impl CategoricalEncoder {
    #[must_use]
    pub fn new(table: Arc<EncodingTable>) -> Self {
        Self { table }
    }

    #[must_use]
    pub fn table(&self) -> &EncodingTable {
        &self.table
    }

    /// Produce the purely numeric feature mapping.
    #[must_use]
    pub fn encode(&self, frame: FeatureFrame) -> (EncodedFeatures, Vec<UnseenCategory>) {
        let (mut features, categorical) = frame.into_parts();
        let mut unseen = Vec::new();

        self.encode_discharge_destination(
            categorical
                .get(field::DISCHARGE_DESTINATION)
                .map(String::as_str),
            &mut features,
            &mut unseen,
        );

        for (name, value) in &categorical {
            if name == field::DISCHARGE_DESTINATION || is_numeric_like(name) {
                continue;
            }
            let Some(encoder) = self.table.get(name) else {
                tracing::debug!(column = %name, "No encoder for categorical column; dropped");
                continue;
            };
            let index = match encoder.index_of(value) {
                Some(index) => index,
                None => {
                    tracing::warn!(column = %name, "Unseen category; encoded as class 0");
                    unseen.push(UnseenCategory {
                        column: name.clone(),
                        value: value.clone(),
                    });
                    0
                }
            };
            // Class lists are tiny; the index is exact as f64.
            features.insert(name.clone(), index as f64);
        }

        (features, unseen)
    }

    /// Dummy encoding with the first class dropped.
    fn encode_discharge_destination(
        &self,
        value: Option<&str>,
        features: &mut EncodedFeatures,
        unseen: &mut Vec<UnseenCategory>,
    ) {
        let prefix = field::DISCHARGE_DESTINATION;
        match self.table.get(prefix) {
            Some(encoder) => {
                for class in encoder.classes.iter().skip(1) {
                    let hit = value == Some(class.as_str());
                    features.insert(dummy_column(prefix, class), if hit { 1.0 } else { 0.0 });
                }
                if let Some(v) = value {
                    if encoder.index_of(v).is_none() {
                        tracing::warn!(column = prefix, "Unseen category; encoded as class 0");
                        unseen.push(UnseenCategory {
                            column: prefix.to_string(),
                            value: v.to_string(),
                        });
                    }
                }
            }
            None => {
                if let Some(v) = value {
                    features.insert(dummy_column(prefix, v), 1.0);
                }
            }
        }
    }
}
