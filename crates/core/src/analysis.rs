//! Analysis results returned by the backend for an uploaded file.
//!
//! An [`AnalysisResult`] is received once per selected file and is
//! immutable for the rest of the import. [`validate_analysis`] enforces
//! the structural guarantees the decision model relies on.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::SchemaId;

// ---------------------------------------------------------------------------
// Variance
// ---------------------------------------------------------------------------

/// Backend classification of how structurally diverse the records are.
///
/// Ordered: `Low < Medium < High < Extreme`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VarianceLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl VarianceLevel {
    /// `High` and `Extreme` trigger the override gate.
    pub fn is_high(self) -> bool {
        self >= VarianceLevel::High
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Extreme => "extreme",
        }
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Where the backend recommends storing a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    Sql,
    Nosql,
}

impl StorageKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Sql => "SQL",
            Self::Nosql => "NOSQL",
        }
    }
}

// ---------------------------------------------------------------------------
// Schemas
// ---------------------------------------------------------------------------

/// Quality metrics reported per schema, as percentages or counts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchemaMetrics {
    #[serde(default)]
    pub null_density: f64,
    #[serde(default)]
    pub type_consistency: f64,
    #[serde(default)]
    pub schema_variants: u32,
    #[serde(default)]
    pub max_allowed_variants: u32,
}

/// Collision between a suggested name and an entity already in storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaConflict {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub existing_schema: Option<String>,
    #[serde(default)]
    pub similarity: Option<f64>,
    #[serde(default)]
    pub impact: Option<String>,
}

/// One structural shape detected in the uploaded records.
///
/// The merged schema offered by the backend uses the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaDescriptor {
    pub schema_id: SchemaId,
    pub suggested_name: String,
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    #[serde(default)]
    pub record_count: u64,
    #[serde(default)]
    pub confidence: f64,
    pub storage_recommendation: StorageKind,
    #[serde(default)]
    pub metrics: SchemaMetrics,
    #[serde(default)]
    pub conflict: Option<SchemaConflict>,
    #[serde(default)]
    pub reasons: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SchemaDescriptor {
    /// Only schemas with a typed conflict may be evolved.
    pub fn has_conflict(&self) -> bool {
        self.conflict.as_ref().is_some_and(|c| !c.kind.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Recommendation
// ---------------------------------------------------------------------------

/// Rationale attached to an analysis. The backend sends either a bare
/// string or an object with a `reason`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Recommendation {
    Text(String),
    Detailed {
        #[serde(default)]
        reason: Option<String>,
        #[serde(default)]
        suggested_action: Option<String>,
    },
}

impl Recommendation {
    pub fn reason(&self) -> Option<&str> {
        let reason = match self {
            Self::Text(text) => Some(text.as_str()),
            Self::Detailed { reason, .. } => reason.as_deref(),
        };
        reason.filter(|r| !r.trim().is_empty())
    }
}

// ---------------------------------------------------------------------------
// Analysis result
// ---------------------------------------------------------------------------

/// Response of the analysis endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub analysis_id: String,
    #[serde(default)]
    pub total_records: u64,
    pub schemas_detected: Vec<SchemaDescriptor>,
    #[serde(default)]
    pub merged_schema: Option<SchemaDescriptor>,
    #[serde(default)]
    pub schema_variants: u32,
    pub variance_level: VarianceLevel,
    #[serde(default)]
    pub max_allowed_variants: u32,
    #[serde(default)]
    pub recommendation: Option<Recommendation>,
}

impl AnalysisResult {
    pub fn is_high_variance(&self) -> bool {
        self.variance_level.is_high()
    }

    pub fn schema(&self, schema_id: &str) -> Option<&SchemaDescriptor> {
        self.schemas_detected
            .iter()
            .find(|s| s.schema_id == schema_id)
    }

    /// Explanation shown when variance is high, `None` otherwise.
    pub fn variance_warning(&self) -> Option<String> {
        if !self.is_high_variance() {
            return None;
        }
        Some(format!(
            "High schema variance detected: {} schema variants found, \
             which exceeds the recommended maximum of {}. \
             Consider the merged schema to combine all variants into one table/collection.",
            self.schema_variants, self.max_allowed_variants
        ))
    }
}

/// Check the guarantees the decision model relies on: at least one
/// schema, and schema ids unique within the analysis.
pub fn validate_analysis(analysis: &AnalysisResult) -> Result<(), CoreError> {
    if analysis.analysis_id.trim().is_empty() {
        return Err(CoreError::Validation(
            "Analysis response is missing an analysis id".to_string(),
        ));
    }
    if analysis.schemas_detected.is_empty() {
        return Err(CoreError::Validation(
            "Analysis did not detect any schemas in the file".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for schema in &analysis.schemas_detected {
        if !seen.insert(schema.schema_id.as_str()) {
            return Err(CoreError::Validation(format!(
                "Analysis reported schema '{}' more than once",
                schema.schema_id
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn schema(id: &str, name: &str) -> SchemaDescriptor {
        SchemaDescriptor {
            schema_id: id.to_string(),
            suggested_name: name.to_string(),
            fields: BTreeMap::from([("id".to_string(), "integer".to_string())]),
            record_count: 10,
            confidence: 0.9,
            storage_recommendation: StorageKind::Sql,
            metrics: SchemaMetrics::default(),
            conflict: None,
            reasons: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn conflicting_schema(id: &str, name: &str) -> SchemaDescriptor {
        SchemaDescriptor {
            conflict: Some(SchemaConflict {
                kind: "name_collision".to_string(),
                existing_schema: Some(name.to_string()),
                similarity: Some(87.5),
                impact: Some("Existing table will gain new columns".to_string()),
            }),
            ..schema(id, name)
        }
    }

    /// Three schemas `A`, `B`, `C` (only `B` conflicts) with a merged
    /// candidate named `merged_events`.
    pub fn analysis(variance_level: VarianceLevel) -> AnalysisResult {
        AnalysisResult {
            analysis_id: "an-1".to_string(),
            total_records: 30,
            schemas_detected: vec![
                schema("A", "events_a"),
                conflicting_schema("B", "events_b"),
                schema("C", "events_c"),
            ],
            merged_schema: Some(schema("M", "merged_events")),
            schema_variants: 4,
            variance_level,
            max_allowed_variants: 1,
            recommendation: None,
        }
    }
}
