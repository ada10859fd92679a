// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot quality validator (`spec.md` §4.6).
//!
//! A weighted check matrix over a [`MemorySnapshot`], separate tables for
//! PRD and orchestration snapshots. `score` is the weight-normalized sum
//! of passed checks; `valid` requires every critical check to pass
//! regardless of score.

use cp_core::MemorySnapshot;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub severity: Severity,
    pub weight: u32,
    pub passed: bool,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    pub valid: bool,
    pub score: f64,
    pub findings: Vec<CheckResult>,
    pub passed_checks: u32,
    pub total_checks: u32,
}

/// Extra context the validator needs beyond the snapshot itself: the set
/// of files the outgoing agent actually touched, used to cross-reference
/// `files_state`.
#[derive(Debug, Clone, Default)]
pub struct TaskContext {
    pub files_modified: Vec<String>,
}

fn score(checks: &[CheckResult]) -> (f64, bool) {
    let total_weight: u32 = checks.iter().map(|c| c.weight).sum();
    let earned_weight: u32 = checks.iter().filter(|c| c.passed).map(|c| c.weight).sum();
    let score = if total_weight == 0 {
        0.0
    } else {
        earned_weight as f64 / total_weight as f64
    };
    let valid = !checks
        .iter()
        .any(|c| c.severity == Severity::Critical && !c.passed);
    (score, valid)
}

fn finalize(checks: Vec<CheckResult>) -> ValidationReport {
    let (score_value, valid) = score(&checks);
    let passed_checks = checks.iter().filter(|c| c.passed).count() as u32;
    let total_checks = checks.len() as u32;
    ValidationReport {
        valid,
        score: score_value,
        findings: checks,
        passed_checks,
        total_checks,
    }
}

fn check(
    name: &'static str,
    severity: Severity,
    weight: u32,
    passed: bool,
    message: impl Into<String>,
) -> CheckResult {
    CheckResult {
        name,
        severity,
        weight,
        passed,
        message: message.into(),
    }
}

/// Validates a PRD-flavored snapshot against the full check table.
pub fn validate_prd_snapshot(snapshot: &MemorySnapshot, ctx: &TaskContext) -> ValidationReport {
    let mut checks = Vec::new();

    checks.push(check(
        "required_fields",
        Severity::Critical,
        3,
        !snapshot.agent_id.is_empty() && snapshot.task_id.as_deref().is_some_and(|s| !s.is_empty()),
        "agent_id and task_id must be non-empty",
    ));

    let state_ok = snapshot.state.as_ref().is_some_and(|s| {
        !s.current_step.is_empty() && !s.progress_summary.is_empty() && !s.completion_estimate.is_empty()
    });
    checks.push(check(
        "state_present",
        Severity::Critical,
        3,
        state_ok,
        "state.current_step, progress_summary, and completion_estimate must all be non-empty",
    ));

    checks.push(check(
        "next_steps_non_empty",
        Severity::Critical,
        3,
        !snapshot.next_steps.is_empty(),
        "next_steps must contain at least one entry",
    ));

    if snapshot.handoff_number > 0 {
        checks.push(check(
            "decisions_carried_forward",
            Severity::Critical,
            2,
            !snapshot.decisions.is_empty(),
            "decisions must be non-empty when handoff_number > 0",
        ));
    }

    let missing_rationale: Vec<&str> = snapshot
        .decisions
        .iter()
        .filter(|d| d.rationale.is_empty())
        .map(|d| d.summary.as_str())
        .collect();
    checks.push(check(
        "decisions_have_rationale",
        Severity::Warning,
        1,
        missing_rationale.is_empty(),
        if missing_rationale.is_empty() {
            "every decision has a rationale".to_string()
        } else {
            format!("decisions missing rationale: {}", missing_rationale.join(", "))
        },
    ));

    let files_state_populated = snapshot.files_state.as_ref().is_some_and(|fs| !fs.is_empty());
    checks.push(check(
        "files_state_present",
        Severity::Warning,
        1,
        files_state_populated,
        "files_state should have at least one populated bucket",
    ));

    if !ctx.files_modified.is_empty() {
        let missing: Vec<&str> = ctx
            .files_modified
            .iter()
            .filter(|f| !snapshot.files_state.as_ref().is_some_and(|fs| fs.contains(f)))
            .map(|f| f.as_str())
            .collect();
        checks.push(check(
            "files_cross_reference",
            Severity::Warning,
            1,
            missing.is_empty(),
            if missing.is_empty() {
                "every modified file appears in files_state".to_string()
            } else {
                format!("files missing from files_state: {}", missing.join(", "))
            },
        ));
    }

    checks.push(check(
        "gotchas_present",
        Severity::Info,
        1,
        !snapshot.gotchas.is_empty(),
        "gotchas should be non-empty",
    ));

    finalize(checks)
}

/// Validates an orchestration-flavored snapshot against its (smaller)
/// check table.
pub fn validate_orchestration_snapshot(snapshot: &MemorySnapshot) -> ValidationReport {
    let mut checks = Vec::new();

    checks.push(check(
        "required_fields",
        Severity::Critical,
        3,
        !snapshot.agent_id.is_empty(),
        "agent_id must be non-empty",
    ));

    checks.push(check(
        "decision_log_non_empty",
        Severity::Warning,
        1,
        !snapshot.decision_log.is_empty(),
        "decision_log should be non-empty",
    ));

    let usage_present = snapshot.context_usage.input_tokens > 0 || snapshot.context_usage.output_tokens > 0;
    checks.push(check(
        "context_usage_present",
        Severity::Warning,
        1,
        usage_present,
        "context_usage should carry non-zero token counts",
    ));

    finalize(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cp_core::{ContextUsage, FilesState, PrdDecision, PrdState, SnapshotId};

    fn minimal_snapshot() -> MemorySnapshot {
        MemorySnapshot {
            snapshot_id: SnapshotId::new("snap-1"),
            agent_id: "worker-1".into(),
            task_id: Some("task-1".into()),
            timestamp: chrono::Utc::now(),
            context_usage: ContextUsage::default(),
            decision_log: vec![],
            task_status: None,
            handoff_signal: None,
            memory_state: None,
            state: Some(PrdState {
                current_step: "implement".into(),
                progress_summary: "halfway done".into(),
                completion_estimate: "50%".into(),
            }),
            decisions: vec![],
            gotchas: vec![],
            files_state: Some(FilesState {
                completed: vec!["a.rs".into()],
                in_progress: vec![],
                not_started: vec![],
            }),
            next_steps: vec!["finish b.rs".into()],
            dependencies_discovered: vec![],
            handoff_number: 0,
            forced: false,
        }
    }

    #[test]
    fn minimal_snapshot_is_valid_with_handoff_number_zero() {
        let report = validate_prd_snapshot(&minimal_snapshot(), &TaskContext::default());
        assert!(report.valid);
        assert!(report.score > 0.0);
    }

    #[test]
    fn missing_next_steps_fails_critical_check() {
        let mut snapshot = minimal_snapshot();
        snapshot.next_steps = vec![];
        let report = validate_prd_snapshot(&snapshot, &TaskContext::default());
        assert!(!report.valid);
        assert!(report
            .findings
            .iter()
            .any(|c| c.name == "next_steps_non_empty" && !c.passed));
    }

    #[test]
    fn decisions_carried_forward_check_is_omitted_at_handoff_zero() {
        let report = validate_prd_snapshot(&minimal_snapshot(), &TaskContext::default());
        assert!(!report.findings.iter().any(|c| c.name == "decisions_carried_forward"));
    }

    #[test]
    fn decisions_carried_forward_required_past_first_handoff() {
        let mut snapshot = minimal_snapshot();
        snapshot.handoff_number = 1;
        snapshot.decisions = vec![];
        let report = validate_prd_snapshot(&snapshot, &TaskContext::default());
        assert!(!report.valid);
        assert!(report
            .findings
            .iter()
            .any(|c| c.name == "decisions_carried_forward" && !c.passed));
    }

    #[test]
    fn decisions_without_rationale_only_warn() {
        let mut snapshot = minimal_snapshot();
        snapshot.handoff_number = 1;
        snapshot.decisions = vec![PrdDecision {
            summary: "chose postgres".into(),
            rationale: String::new(),
        }];
        let report = validate_prd_snapshot(&snapshot, &TaskContext::default());
        // decisions_carried_forward passes (non-empty); rationale check warns but doesn't invalidate.
        assert!(report.valid);
        assert!(report
            .findings
            .iter()
            .any(|c| c.name == "decisions_have_rationale" && !c.passed));
    }

    #[test]
    fn files_cross_reference_lists_missing_files() {
        let snapshot = minimal_snapshot();
        let ctx = TaskContext {
            files_modified: vec!["a.rs".into(), "missing.rs".into()],
        };
        let report = validate_prd_snapshot(&snapshot, &ctx);
        let finding = report
            .findings
            .iter()
            .find(|c| c.name == "files_cross_reference")
            .unwrap();
        assert!(!finding.passed);
        assert!(finding.message.contains("missing.rs"));
    }

    #[test]
    fn orchestration_snapshot_required_fields_only_critical() {
        let snapshot = MemorySnapshot {
            agent_id: String::new(),
            ..minimal_snapshot()
        };
        let report = validate_orchestration_snapshot(&snapshot);
        assert!(!report.valid);
    }

    #[test]
    fn orchestration_snapshot_passes_with_agent_id_only() {
        let snapshot = minimal_snapshot();
        let report = validate_orchestration_snapshot(&snapshot);
        assert!(report.valid);
    }
}
