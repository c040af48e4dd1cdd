//! Command-line flags that stand in for the decision review screen.

use clap::Args;
use smartstore_core::decisions::{DecisionAction, DecisionModel};
use smartstore_core::error::CoreError;

/// Per-schema and merged-mode choices.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct DecisionArgs {
    /// Import the merged schema as a single table/collection.
    #[arg(long)]
    pub merged: bool,

    /// Name for the merged table/collection.
    #[arg(long, value_name = "NAME", requires = "merged")]
    pub merged_name: Option<String>,

    /// Leave a schema out of the import. Repeatable.
    #[arg(long = "skip", value_name = "SCHEMA_ID")]
    pub skip: Vec<String>,

    /// Extend the conflicting entity instead of creating a new one. Repeatable.
    #[arg(long = "evolve", value_name = "SCHEMA_ID")]
    pub evolve: Vec<String>,

    /// Store a schema under a custom name. Repeatable.
    #[arg(long = "rename", value_name = "SCHEMA_ID=NAME", value_parser = parse_rename)]
    pub rename: Vec<(String, String)>,

    /// Import separate schemas despite a high-variance recommendation.
    #[arg(long = "override", conflicts_with = "merged")]
    pub user_override: bool,

    /// Acknowledge the risks of the override.
    #[arg(long, requires = "user_override")]
    pub acknowledge_risks: bool,
}

/// Parse `SCHEMA_ID=NAME`.
pub fn parse_rename(raw: &str) -> Result<(String, String), String> {
    let (id, name) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SCHEMA_ID=NAME, got '{raw}'"))?;
    let (id, name) = (id.trim(), name.trim());
    if id.is_empty() || name.is_empty() {
        return Err(format!("expected SCHEMA_ID=NAME, got '{raw}'"));
    }
    Ok((id.to_string(), name.to_string()))
}

/// Apply the flags to a freshly analyzed model.
///
/// Renames and actions come before consent, so skipping schemas can
/// close the override gate before it is evaluated.
pub fn apply_decision_args(model: &mut DecisionModel, args: &DecisionArgs) -> Result<(), CoreError> {
    if args.merged {
        model.select_merged_schema()?;
        if let Some(name) = &args.merged_name {
            model.set_merged_name(name.clone())?;
        }
        return Ok(());
    }

    for (id, name) in &args.rename {
        model.set_custom_name(id, name.clone())?;
    }
    for id in &args.skip {
        model.set_action(id, DecisionAction::Skip)?;
    }
    for id in &args.evolve {
        model.set_action(id, DecisionAction::Evolve)?;
    }

    if args.user_override {
        if model.show_consent() {
            model.set_user_override(true)?;
            model.set_acknowledge_risks(args.acknowledge_risks)?;
        } else {
            tracing::warn!("--override has no effect: the import does not need it");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use assert_matches::assert_matches;
    use clap::Parser;
    use serde_json::json;
    use smartstore_core::analysis::AnalysisResult;

    use super::*;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        decisions: DecisionArgs,
    }

    fn parse(args: &[&str]) -> DecisionArgs {
        let argv = std::iter::once("test").chain(args.iter().copied());
        TestCli::parse_from(argv).decisions
    }

    fn model(variance_level: &str) -> DecisionModel {
        let analysis: AnalysisResult = serde_json::from_value(json!({
            "analysis_id": "an-1",
            "variance_level": variance_level,
            "schema_variants": 3,
            "max_allowed_variants": 1,
            "schemas_detected": [
                {"schema_id": "A", "suggested_name": "users", "storage_recommendation": "sql"},
                {"schema_id": "B", "suggested_name": "orders", "storage_recommendation": "sql",
                 "conflict": {"type": "name_collision"}},
                {"schema_id": "C", "suggested_name": "events", "storage_recommendation": "nosql"}
            ],
            "merged_schema": {"schema_id": "M", "suggested_name": "merged_events",
                              "storage_recommendation": "nosql"}
        }))
        .unwrap();
        DecisionModel::new(analysis).unwrap()
    }

    #[test]
    fn rename_parsing() {
        assert_eq!(
            parse_rename("A=people").unwrap(),
            ("A".to_string(), "people".to_string())
        );
        assert_eq!(
            parse_rename(" B = order_lines ").unwrap(),
            ("B".to_string(), "order_lines".to_string())
        );
        assert!(parse_rename("A").is_err());
        assert!(parse_rename("=x").is_err());
        assert!(parse_rename("A=").is_err());
    }

    #[test]
    fn flags_parse() {
        let args = parse(&["--skip", "C", "--evolve", "B", "--rename", "A=people"]);
        assert_eq!(args.skip, vec!["C"]);
        assert_eq!(args.evolve, vec!["B"]);
        assert_eq!(args.rename, vec![("A".into(), "people".into())]);
        assert!(!args.merged);

        assert!(TestCli::try_parse_from(["test", "--acknowledge-risks"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--merged", "--override"]).is_err());
        assert!(TestCli::try_parse_from(["test", "--merged-name", "x"]).is_err());
    }

    #[test]
    fn individual_flags_build_expected_payload() {
        let mut m = model("low");
        apply_decision_args(&mut m, &parse(&["--skip", "C", "--evolve", "B", "--rename", "A=people"]))
            .unwrap();

        let request = m.build_request().unwrap();
        let actions: BTreeMap<_, _> = request
            .decisions
            .iter()
            .map(|(id, d)| (id.as_str(), (d.action, d.custom_name.as_str())))
            .collect();
        assert_eq!(
            actions,
            BTreeMap::from([
                ("A", (DecisionAction::Create, "people")),
                ("B", (DecisionAction::Evolve, "orders")),
            ])
        );
    }

    #[test]
    fn merged_flags() {
        let mut m = model("extreme");
        apply_decision_args(&mut m, &parse(&["--merged", "--merged-name", "all"])).unwrap();
        let request = m.build_request().unwrap();
        assert_eq!(request.decisions["M"].custom_name, "all");
        assert!(!request.user_override);
    }

    #[test]
    fn override_opens_the_gate_only_with_acknowledgment() {
        let mut m = model("high");
        apply_decision_args(&mut m, &parse(&["--override"])).unwrap();
        assert!(!m.can_execute());

        let mut m = model("high");
        apply_decision_args(&mut m, &parse(&["--override", "--acknowledge-risks"])).unwrap();
        assert!(m.can_execute());
    }

    #[test]
    fn skipping_down_to_one_schema_closes_the_gate() {
        let mut m = model("high");
        apply_decision_args(&mut m, &parse(&["--skip", "B", "--skip", "C", "--override"])).unwrap();
        assert!(!m.needs_override());
        assert!(m.can_execute());
    }

    #[test]
    fn unknown_schema_is_reported() {
        let mut m = model("low");
        assert_matches!(
            apply_decision_args(&mut m, &parse(&["--skip", "Z"])),
            Err(CoreError::NotFound { .. })
        );
    }

    #[test]
    fn evolve_without_conflict_is_rejected() {
        let mut m = model("low");
        assert_matches!(
            apply_decision_args(&mut m, &parse(&["--evolve", "A"])),
            Err(CoreError::Validation(_))
        );
    }
}
