//! Per-schema import decisions and the high-variance override gate.
//!
//! A [`DecisionModel`] is seeded from an [`AnalysisResult`] and is the
//! only place user choices live until execution. The selection is either
//! per-schema ([`SelectionMode::Individual`]) or the backend's merged
//! schema ([`SelectionMode::Merged`]); the two modes never coexist.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{validate_analysis, AnalysisResult, SchemaDescriptor};
use crate::error::CoreError;
use crate::types::SchemaId;

/// Shown when execution is attempted with nothing to import.
pub const EMPTY_PAYLOAD_MESSAGE: &str = "Please select at least one schema to upload";

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// How a schema should be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Create a new table/collection.
    Create,
    /// Extend the conflicting entity already in storage.
    Evolve,
    /// Leave the schema out of the import.
    Skip,
}

impl DecisionAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Evolve => "evolve",
            Self::Skip => "skip",
        }
    }
}

/// The user's choice for one schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub action: DecisionAction,
    pub custom_name: String,
}

impl Decision {
    /// `create` under the backend's suggested name.
    pub fn default_for(schema: &SchemaDescriptor) -> Self {
        Self {
            action: DecisionAction::Create,
            custom_name: schema.suggested_name.clone(),
        }
    }
}

/// Decisions keyed by schema id, as sent to the execution endpoint.
pub type DecisionPayload = BTreeMap<SchemaId, Decision>;

// ---------------------------------------------------------------------------
// Override consent
// ---------------------------------------------------------------------------

/// Two-step risk consent for high-variance per-schema imports.
///
/// Acknowledging the risks without first overriding the recommendation
/// cannot be represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverrideConsent {
    #[default]
    NotGiven,
    /// The user chose separate tables against the recommendation.
    Overridden,
    /// ...and then acknowledged the consequences.
    Acknowledged,
}

impl OverrideConsent {
    pub fn user_override(self) -> bool {
        !matches!(self, Self::NotGiven)
    }

    pub fn acknowledge_risks(self) -> bool {
        matches!(self, Self::Acknowledged)
    }

    /// Toggle the first step. Withdrawing the override also withdraws
    /// any acknowledgment.
    pub fn with_override(self, checked: bool) -> Self {
        match (self, checked) {
            (_, false) => Self::NotGiven,
            (Self::NotGiven, true) => Self::Overridden,
            (current, true) => current,
        }
    }

    /// Toggle the second step. Requires the first step.
    pub fn with_acknowledgment(self, checked: bool) -> Result<Self, CoreError> {
        match (self, checked) {
            (Self::NotGiven, false) => Ok(Self::NotGiven),
            (Self::NotGiven, true) => Err(CoreError::Validation(
                "Risks can only be acknowledged after choosing to override the recommendation"
                    .to_string(),
            )),
            (_, true) => Ok(Self::Acknowledged),
            (_, false) => Ok(Self::Overridden),
        }
    }
}

// ---------------------------------------------------------------------------
// Selection mode
// ---------------------------------------------------------------------------

/// Which payload execution will send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionMode {
    /// One decision per detected schema.
    Individual {
        decisions: DecisionPayload,
        consent: OverrideConsent,
    },
    /// The merged schema is the sole target.
    Merged,
}

// ---------------------------------------------------------------------------
// Execute request
// ---------------------------------------------------------------------------

/// Body of the execution endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteRequest {
    pub analysis_id: String,
    pub decisions: DecisionPayload,
    pub user_override: bool,
    pub acknowledge_risks: bool,
}

/// Response of the execution endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResponse {
    pub job_id: String,
}

// ---------------------------------------------------------------------------
// Decision model
// ---------------------------------------------------------------------------

/// User decisions for one analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionModel {
    analysis: AnalysisResult,
    mode: SelectionMode,
    merged_name: String,
}

impl DecisionModel {
    /// Seed one `create` decision per detected schema and, when a merged
    /// schema is offered, default its name to the suggested one.
    pub fn new(analysis: AnalysisResult) -> Result<Self, CoreError> {
        validate_analysis(&analysis)?;

        let merged_name = analysis
            .merged_schema
            .as_ref()
            .map(|m| m.suggested_name.clone())
            .unwrap_or_default();
        let mode = SelectionMode::Individual {
            decisions: default_decisions(&analysis),
            consent: OverrideConsent::NotGiven,
        };

        Ok(Self {
            analysis,
            mode,
            merged_name,
        })
    }

    pub fn analysis(&self) -> &AnalysisResult {
        &self.analysis
    }

    pub fn mode(&self) -> &SelectionMode {
        &self.mode
    }

    pub fn is_merged(&self) -> bool {
        matches!(self.mode, SelectionMode::Merged)
    }

    /// Current decision for `schema_id`; `None` in merged mode.
    pub fn decision(&self, schema_id: &str) -> Option<&Decision> {
        match &self.mode {
            SelectionMode::Individual { decisions, .. } => decisions.get(schema_id),
            SelectionMode::Merged => None,
        }
    }

    /// Consent state; always `NotGiven` in merged mode.
    pub fn consent(&self) -> OverrideConsent {
        match &self.mode {
            SelectionMode::Individual { consent, .. } => *consent,
            SelectionMode::Merged => OverrideConsent::NotGiven,
        }
    }

    /// Name the merged schema will be created under.
    pub fn merged_name(&self) -> &str {
        &self.merged_name
    }

    // -- per-schema mutation --

    pub fn set_action(&mut self, schema_id: &str, action: DecisionAction) -> Result<(), CoreError> {
        if action == DecisionAction::Evolve {
            let schema = self.analysis.schema(schema_id).ok_or_else(|| unknown(schema_id))?;
            if !schema.has_conflict() {
                return Err(CoreError::Validation(format!(
                    "Schema '{}' has no conflicting entity to evolve",
                    schema.suggested_name
                )));
            }
        }
        self.decision_mut(schema_id)?.action = action;
        Ok(())
    }

    pub fn set_custom_name(&mut self, schema_id: &str, name: impl Into<String>) -> Result<(), CoreError> {
        self.decision_mut(schema_id)?.custom_name = name.into();
        Ok(())
    }

    fn decision_mut(&mut self, schema_id: &str) -> Result<&mut Decision, CoreError> {
        match &mut self.mode {
            SelectionMode::Individual { decisions, .. } => {
                decisions.get_mut(schema_id).ok_or_else(|| unknown(schema_id))
            }
            SelectionMode::Merged => Err(CoreError::Validation(
                "Per-schema decisions are unavailable while the merged schema is selected"
                    .to_string(),
            )),
        }
    }

    // -- mode switching --

    /// Make the merged schema the sole target, discarding per-schema
    /// decisions and consent.
    pub fn select_merged_schema(&mut self) -> Result<(), CoreError> {
        if self.analysis.merged_schema.is_none() {
            return Err(CoreError::Validation(
                "This analysis did not offer a merged schema".to_string(),
            ));
        }
        self.mode = SelectionMode::Merged;
        Ok(())
    }

    /// Return to per-schema mode. Decisions restart from defaults; edits
    /// made before selecting the merged schema are not restored.
    pub fn select_individual_schemas(&mut self) {
        if self.is_merged() {
            self.mode = SelectionMode::Individual {
                decisions: default_decisions(&self.analysis),
                consent: OverrideConsent::NotGiven,
            };
        }
    }

    pub fn set_merged_name(&mut self, name: impl Into<String>) -> Result<(), CoreError> {
        if self.analysis.merged_schema.is_none() {
            return Err(CoreError::Validation(
                "This analysis did not offer a merged schema".to_string(),
            ));
        }
        self.merged_name = name.into();
        Ok(())
    }

    // -- override gate --

    /// First consent step. Only offered while the gate applies, but it
    /// can always be withdrawn.
    pub fn set_user_override(&mut self, checked: bool) -> Result<(), CoreError> {
        let show = self.show_consent();
        match &mut self.mode {
            SelectionMode::Individual { consent, .. } => {
                if checked && !show {
                    return Err(CoreError::Validation(
                        "Overriding the recommendation is only needed for high-variance imports \
                         with more than one schema"
                            .to_string(),
                    ));
                }
                *consent = consent.with_override(checked);
                Ok(())
            }
            SelectionMode::Merged => Err(CoreError::Validation(
                "No override is needed when importing the merged schema".to_string(),
            )),
        }
    }

    /// Second consent step. Requires the first.
    pub fn set_acknowledge_risks(&mut self, checked: bool) -> Result<(), CoreError> {
        match &mut self.mode {
            SelectionMode::Individual { consent, .. } => {
                *consent = consent.with_acknowledgment(checked)?;
                Ok(())
            }
            SelectionMode::Merged => Err(CoreError::Validation(
                "No override is needed when importing the merged schema".to_string(),
            )),
        }
    }

    // -- derived state --

    pub fn is_high_variance(&self) -> bool {
        self.analysis.is_high_variance()
    }

    /// Number of schemas that will be imported in per-schema mode.
    pub fn non_skip_count(&self) -> usize {
        match &self.mode {
            SelectionMode::Individual { decisions, .. } => decisions
                .values()
                .filter(|d| d.action != DecisionAction::Skip)
                .count(),
            SelectionMode::Merged => 0,
        }
    }

    /// High variance, per-schema mode, and more than one schema kept.
    pub fn needs_override(&self) -> bool {
        self.is_high_variance() && !self.is_merged() && self.non_skip_count() > 1
    }

    /// Whether the first consent checkbox is presented.
    pub fn show_consent(&self) -> bool {
        self.needs_override()
    }

    /// Whether the second consent checkbox is presented.
    pub fn show_acknowledgment(&self) -> bool {
        self.show_consent() && self.consent().user_override()
    }

    /// Evaluated fresh on every call; never cached across edits.
    pub fn can_execute(&self) -> bool {
        let has_target = self.is_merged() || self.non_skip_count() > 0;
        let gate_open = !self.needs_override() || self.consent().acknowledge_risks();
        has_target && gate_open
    }

    /// Build the execution body.
    ///
    /// Merged mode sends a single `create` entry for the merged schema
    /// (falling back to its suggested name when the custom name is
    /// blank). Per-schema mode sends every non-skipped decision.
    pub fn build_request(&self) -> Result<ExecuteRequest, CoreError> {
        let (decisions, consent) = match (&self.mode, &self.analysis.merged_schema) {
            (SelectionMode::Merged, Some(merged)) => {
                let custom_name = if self.merged_name.trim().is_empty() {
                    merged.suggested_name.clone()
                } else {
                    self.merged_name.clone()
                };
                let payload = DecisionPayload::from([(
                    merged.schema_id.clone(),
                    Decision {
                        action: DecisionAction::Create,
                        custom_name,
                    },
                )]);
                (payload, OverrideConsent::NotGiven)
            }
            (SelectionMode::Merged, None) => (DecisionPayload::new(), OverrideConsent::NotGiven),
            (SelectionMode::Individual { decisions, consent }, _) => {
                let payload = decisions
                    .iter()
                    .filter(|(_, d)| d.action != DecisionAction::Skip)
                    .map(|(id, d)| (id.clone(), d.clone()))
                    .collect();
                (payload, *consent)
            }
        };

        if decisions.is_empty() {
            return Err(CoreError::Validation(EMPTY_PAYLOAD_MESSAGE.to_string()));
        }
        if self.needs_override() && !consent.acknowledge_risks() {
            return Err(CoreError::Validation(
                "High schema variance: confirm the override and acknowledge the risks first"
                    .to_string(),
            ));
        }

        Ok(ExecuteRequest {
            analysis_id: self.analysis.analysis_id.clone(),
            decisions,
            user_override: consent.user_override(),
            acknowledge_risks: consent.acknowledge_risks(),
        })
    }
}

fn default_decisions(analysis: &AnalysisResult) -> DecisionPayload {
    analysis
        .schemas_detected
        .iter()
        .map(|s| (s.schema_id.clone(), Decision::default_for(s)))
        .collect()
}

fn unknown(schema_id: &str) -> CoreError {
    CoreError::NotFound {
        entity: "schema",
        id: schema_id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::fixtures::analysis;
    use crate::analysis::VarianceLevel;
    use assert_matches::assert_matches;

    fn model(level: VarianceLevel) -> DecisionModel {
        DecisionModel::new(analysis(level)).unwrap()
    }

    // -- seeding --

    #[test]
    fn seeds_one_create_decision_per_schema() {
        let m = model(VarianceLevel::Low);
        for schema in &m.analysis().schemas_detected {
            let d = m.decision(&schema.schema_id).unwrap();
            assert_eq!(d.action, DecisionAction::Create);
            assert_eq!(d.custom_name, schema.suggested_name);
        }
        assert_eq!(m.non_skip_count(), 3);
        assert_eq!(m.merged_name(), "merged_events");
        assert_eq!(m.consent(), OverrideConsent::NotGiven);
    }

    #[test]
    fn rejects_analysis_without_schemas() {
        let mut a = analysis(VarianceLevel::Low);
        a.schemas_detected.clear();
        assert!(DecisionModel::new(a).is_err());
    }

    // -- per-schema mutation --

    #[test]
    fn evolve_requires_conflict() {
        let mut m = model(VarianceLevel::Low);
        assert_matches!(
            m.set_action("A", DecisionAction::Evolve),
            Err(CoreError::Validation(_))
        );
        m.set_action("B", DecisionAction::Evolve).unwrap();
        assert_eq!(m.decision("B").unwrap().action, DecisionAction::Evolve);
    }

    #[test]
    fn unknown_schema_is_not_found() {
        let mut m = model(VarianceLevel::Low);
        assert_matches!(
            m.set_action("Z", DecisionAction::Skip),
            Err(CoreError::NotFound { entity: "schema", .. })
        );
        assert_matches!(m.set_custom_name("Z", "x"), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn rename_keeps_action() {
        let mut m = model(VarianceLevel::Low);
        m.set_action("A", DecisionAction::Skip).unwrap();
        m.set_custom_name("A", "renamed").unwrap();
        let d = m.decision("A").unwrap();
        assert_eq!(d.action, DecisionAction::Skip);
        assert_eq!(d.custom_name, "renamed");
    }

    // -- merged toggle --

    #[test]
    fn merged_selection_clears_decisions() {
        let mut m = model(VarianceLevel::Low);
        m.select_merged_schema().unwrap();
        assert!(m.is_merged());
        assert!(m.decision("A").is_none());
        assert_eq!(m.non_skip_count(), 0);
        assert_matches!(
            m.set_action("A", DecisionAction::Skip),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn leaving_merged_mode_restores_defaults_not_edits() {
        let mut m = model(VarianceLevel::High);
        m.set_action("A", DecisionAction::Skip).unwrap();
        m.set_custom_name("C", "edited").unwrap();
        m.set_user_override(true).unwrap();

        m.select_merged_schema().unwrap();
        m.select_individual_schemas();

        assert_eq!(m.decision("A").unwrap().action, DecisionAction::Create);
        assert_eq!(m.decision("C").unwrap().custom_name, "events_c");
        assert_eq!(m.consent(), OverrideConsent::NotGiven);
    }

    #[test]
    fn select_individual_in_individual_mode_keeps_edits() {
        let mut m = model(VarianceLevel::Low);
        m.set_action("A", DecisionAction::Skip).unwrap();
        m.select_individual_schemas();
        assert_eq!(m.decision("A").unwrap().action, DecisionAction::Skip);
    }

    #[test]
    fn merged_selection_requires_merged_schema() {
        let mut a = analysis(VarianceLevel::Low);
        a.merged_schema = None;
        let mut m = DecisionModel::new(a).unwrap();
        assert!(m.select_merged_schema().is_err());
        assert!(m.set_merged_name("x").is_err());
        assert_eq!(m.merged_name(), "");
    }

    // -- override gate --

    #[test]
    fn medium_variance_never_needs_override() {
        let m = model(VarianceLevel::Medium);
        assert_eq!(m.non_skip_count(), 3);
        assert!(!m.needs_override());
        assert!(m.can_execute());
    }

    #[test]
    fn extreme_variance_with_single_schema_needs_no_override() {
        let mut m = model(VarianceLevel::Extreme);
        m.set_action("A", DecisionAction::Skip).unwrap();
        m.set_action("B", DecisionAction::Skip).unwrap();
        assert!(!m.needs_override());
        assert!(m.can_execute());
    }

    #[test]
    fn high_variance_with_two_schemas_needs_override() {
        let mut m = model(VarianceLevel::High);
        m.set_action("C", DecisionAction::Skip).unwrap();
        assert!(m.needs_override());
        assert!(m.show_consent());
        assert!(!m.show_acknowledgment());
        assert!(!m.can_execute());
    }

    #[test]
    fn merged_mode_bypasses_gate() {
        let mut m = model(VarianceLevel::Extreme);
        m.select_merged_schema().unwrap();
        assert!(!m.needs_override());
        assert!(m.can_execute());
    }

    #[test]
    fn all_skipped_cannot_execute() {
        let mut m = model(VarianceLevel::Low);
        for id in ["A", "B", "C"] {
            m.set_action(id, DecisionAction::Skip).unwrap();
        }
        assert!(!m.can_execute());
        let err = m.build_request().unwrap_err();
        assert_eq!(err.user_message(), EMPTY_PAYLOAD_MESSAGE);
    }

    #[test]
    fn acknowledgment_requires_override() {
        let mut m = model(VarianceLevel::High);
        assert!(m.set_acknowledge_risks(true).is_err());
        m.set_user_override(true).unwrap();
        assert!(m.show_acknowledgment());
        m.set_acknowledge_risks(true).unwrap();
        assert_eq!(m.consent(), OverrideConsent::Acknowledged);
        assert!(m.can_execute());
    }

    #[test]
    fn withdrawing_override_resets_acknowledgment() {
        let mut m = model(VarianceLevel::High);
        m.set_user_override(true).unwrap();
        m.set_acknowledge_risks(true).unwrap();

        m.set_user_override(false).unwrap();
        assert_eq!(m.consent(), OverrideConsent::NotGiven);

        // Re-checking the override must not bring back the old acknowledgment.
        m.set_user_override(true).unwrap();
        assert_eq!(m.consent(), OverrideConsent::Overridden);
        assert!(!m.consent().acknowledge_risks());
        assert!(!m.can_execute());
    }

    #[test]
    fn override_not_offered_when_gate_inactive() {
        let mut m = model(VarianceLevel::Low);
        assert!(m.set_user_override(true).is_err());
        assert!(m.set_user_override(false).is_ok());
    }

    #[test]
    fn consent_transitions() {
        use OverrideConsent::*;
        assert_eq!(NotGiven.with_override(true), Overridden);
        assert_eq!(Acknowledged.with_override(true), Acknowledged);
        assert_eq!(Acknowledged.with_override(false), NotGiven);
        assert_eq!(Acknowledged.with_acknowledgment(false).unwrap(), Overridden);
        assert_eq!(NotGiven.with_acknowledgment(false).unwrap(), NotGiven);
    }

    // -- payloads --

    #[test]
    fn merged_payload_uses_merged_schema_id() {
        let mut m = model(VarianceLevel::Extreme);
        m.select_merged_schema().unwrap();
        assert!(m.can_execute());

        let request = m.build_request().unwrap();
        assert_eq!(request.analysis_id, "an-1");
        assert_eq!(
            request.decisions,
            DecisionPayload::from([(
                "M".to_string(),
                Decision {
                    action: DecisionAction::Create,
                    custom_name: "merged_events".to_string(),
                }
            )])
        );
        assert!(!request.user_override);
        assert!(!request.acknowledge_risks);
    }

    #[test]
    fn blank_merged_name_falls_back_to_suggestion() {
        let mut m = model(VarianceLevel::Low);
        m.select_merged_schema().unwrap();
        m.set_merged_name("  ").unwrap();
        let request = m.build_request().unwrap();
        assert_eq!(request.decisions["M"].custom_name, "merged_events");

        m.set_merged_name("all_events").unwrap();
        let request = m.build_request().unwrap();
        assert_eq!(request.decisions["M"].custom_name, "all_events");
    }

    #[test]
    fn individual_payload_excludes_skipped_and_carries_consent() {
        let mut m = model(VarianceLevel::High);
        m.set_action("C", DecisionAction::Skip).unwrap();
        assert!(m.build_request().is_err());

        m.set_user_override(true).unwrap();
        assert!(!m.can_execute());
        m.set_acknowledge_risks(true).unwrap();
        assert!(m.can_execute());

        let request = m.build_request().unwrap();
        let ids: Vec<&str> = request.decisions.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["A", "B"]);
        assert!(request.user_override);
        assert!(request.acknowledge_risks);
    }

    #[test]
    fn execute_request_wire_format() {
        let mut m = model(VarianceLevel::Low);
        m.set_action("A", DecisionAction::Skip).unwrap();
        m.set_action("B", DecisionAction::Evolve).unwrap();
        m.set_action("C", DecisionAction::Skip).unwrap();

        let body = serde_json::to_value(m.build_request().unwrap()).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "analysis_id": "an-1",
                "decisions": {"B": {"action": "evolve", "custom_name": "events_b"}},
                "user_override": false,
                "acknowledge_risks": false
            })
        );
    }
}
