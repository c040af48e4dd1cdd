//! Plain-text views of analyses, decisions and job progress.

use std::fmt::Write as _;

use smartstore_client::api::DataEntity;
use smartstore_client::auth::UserProfile;
use smartstore_core::analysis::{AnalysisResult, SchemaDescriptor};
use smartstore_core::decisions::{DecisionAction, DecisionModel, SelectionMode};
use smartstore_core::file_selection::SelectedFile;
use smartstore_core::job::{FailedRecord, Job, JobOutcome};

pub fn selected_file(file: &SelectedFile) -> String {
    format!("Selected {} ({})", file.name, file.size_label())
}

pub fn signed_in(profile: &UserProfile) -> String {
    if profile.is_admin() {
        format!("{} (admin)", profile.email)
    } else {
        profile.email.clone()
    }
}

fn schema_line(schema: &SchemaDescriptor) -> String {
    let mut line = format!(
        "  [{}] {} -> {}, {} records, confidence {}",
        schema.schema_id,
        schema.suggested_name,
        schema.storage_recommendation.label(),
        schema.record_count,
        schema.confidence,
    );
    if let Some(conflict) = schema.conflict.as_ref().filter(|_| schema.has_conflict()) {
        let _ = write!(line, " (conflict: {}", conflict.kind);
        if let Some(existing) = &conflict.existing_schema {
            let _ = write!(line, " with '{existing}'");
        }
        line.push(')');
    }
    line
}

/// Analysis overview: totals, variance and every detected schema.
pub fn analysis_summary(analysis: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Analysis {}: {} records, {} schema(s) detected",
        analysis.analysis_id,
        analysis.total_records,
        analysis.schemas_detected.len()
    );
    let _ = writeln!(
        out,
        "Variance: {} ({} variants, recommended maximum {})",
        analysis.variance_level.as_str(),
        analysis.schema_variants,
        analysis.max_allowed_variants
    );
    if let Some(warning) = analysis.variance_warning() {
        let _ = writeln!(out, "Warning: {warning}");
    }
    if let Some(reason) = analysis.recommendation.as_ref().and_then(|r| r.reason()) {
        let _ = writeln!(out, "Recommendation: {reason}");
    }
    for schema in &analysis.schemas_detected {
        let _ = writeln!(out, "{}", schema_line(schema));
        for warning in &schema.warnings {
            let _ = writeln!(out, "      ! {warning}");
        }
    }
    if let Some(merged) = &analysis.merged_schema {
        let _ = writeln!(
            out,
            "Merged schema available: [{}] {} ({} fields)",
            merged.schema_id,
            merged.suggested_name,
            merged.fields.len()
        );
    }
    out
}

/// What execution would send, in reading order.
pub fn decisions_summary(model: &DecisionModel) -> String {
    let mut out = String::new();
    match model.mode() {
        SelectionMode::Merged => {
            let name = if model.merged_name().trim().is_empty() {
                model
                    .analysis()
                    .merged_schema
                    .as_ref()
                    .map(|m| m.suggested_name.as_str())
                    .unwrap_or_default()
            } else {
                model.merged_name()
            };
            let _ = writeln!(out, "Importing merged schema as '{name}'");
        }
        SelectionMode::Individual { decisions, consent } => {
            for (id, decision) in decisions {
                let line = match decision.action {
                    DecisionAction::Skip => format!("  {id}: skip"),
                    action => format!("  {id}: {} '{}'", action.as_str(), decision.custom_name),
                };
                let _ = writeln!(out, "{line}");
            }
            if model.needs_override() {
                let _ = writeln!(
                    out,
                    "Override: {}, risks acknowledged: {}",
                    yes_no(consent.user_override()),
                    yes_no(consent.acknowledge_risks())
                );
            }
        }
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// One line per polled status.
pub fn progress_line(job: &Job) -> String {
    match job.progress_label() {
        Some(progress) => format!("{}: {progress}", job.status.label()),
        None => job.status.label().to_string(),
    }
}

/// Final report for a finished job.
pub fn outcome_summary(outcome: &JobOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", outcome.status().label());
    match outcome {
        JobOutcome::Completed(summary) | JobOutcome::CompletedWithErrors(summary) => {
            let _ = writeln!(
                out,
                "Records imported: {}, failed: {}",
                summary.successful_records, summary.failed_records
            );
            if let Some(rate) = summary.success_rate {
                let _ = writeln!(out, "Success rate: {rate:.1}%");
            }
            if !summary.entities_created.is_empty() {
                let _ = writeln!(
                    out,
                    "Successfully created {} entities:",
                    summary.entities_created.len()
                );
                for entity in &summary.entities_created {
                    let _ = writeln!(
                        out,
                        "  {} ({}, {} records)",
                        entity.name,
                        entity.storage_type.label(),
                        entity.record_count
                    );
                }
            }
        }
        JobOutcome::Failed { message } => {
            let _ = writeln!(out, "{message}");
        }
    }
    out
}

pub fn failed_records(records: &[FailedRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let index = record
            .record_index
            .map(|i| format!("#{i}"))
            .unwrap_or_else(|| "?".to_string());
        let schema = record.schema_id.as_deref().unwrap_or("-");
        let _ = writeln!(out, "  {index} [{schema}] {}: {}", record.error, record.record);
    }
    out
}

pub fn entities(entities: &[DataEntity]) -> String {
    if entities.is_empty() {
        return "No entities stored yet\n".to_string();
    }
    let mut out = String::new();
    for entity in entities {
        let _ = writeln!(
            out,
            "{:<32} {:<6} {:>10} records",
            entity.name,
            entity.storage_type.label(),
            entity.record_count
        );
    }
    out
}
