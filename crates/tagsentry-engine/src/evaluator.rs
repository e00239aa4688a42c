//! # Compliance Evaluation
//!
//! The judging half of the engine. [`evaluate`] and [`suggested_tags`]
//! are pure functions — no store access, no side effects — so the verdict
//! for a `(resource, policies)` pair is reproducible anywhere, and the
//! result is the union of per-policy findings, insensitive to policy
//! ordering.
//!
//! [`ComplianceEvaluator`] is the batch service around them: it snapshots
//! the active policy set once per run, writes verdicts back to the
//! catalog, and proposes remediation workflows for resources that come
//! out non-compliant. Per-resource write-backs are independent, so an
//! interrupted batch leaves some resources refreshed and the rest stale —
//! the next run corrects them.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use tagsentry_core::{
    ComplianceIssue, ComplianceStatus, IssueSet, NotFoundError, Policy, Resource, ResourceId,
    TagSentryError, Tags, WorkflowDetails, WorkflowStatus, WorkflowType,
};
use tagsentry_store::{PolicyStore, ResourceCatalog, WorkflowStore};

use crate::EngineConfig;

/// The verdict for one resource against one policy set.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
    /// Whether every applicable policy is satisfied.
    pub is_compliant: bool,
    /// Every per-policy finding. Empty iff compliant.
    pub issues: IssueSet,
}

impl EvaluationOutcome {
    /// The compliance status this outcome maps to.
    pub fn status(&self) -> ComplianceStatus {
        if self.is_compliant {
            ComplianceStatus::Compliant
        } else {
            ComplianceStatus::NonCompliant
        }
    }
}

/// Evaluate a resource against a policy set.
///
/// For each policy that applies to the resource (scope filter: absent
/// scope means "applies to all"), each required-tag rule contributes a
/// [`ComplianceIssue::MissingTag`] if the tag is absent, or a
/// [`ComplianceIssue::InvalidTagValue`] if present with a value outside
/// the rule's allowed set. Findings from different policies about the
/// same tag are all retained — every violated policy must be visible to
/// the approver.
pub fn evaluate(resource: &Resource, policies: &[Policy]) -> EvaluationOutcome {
    let mut issues = IssueSet::new();

    for policy in policies {
        if !policy.applies_to(resource) {
            continue;
        }
        for rule in &policy.required_tags {
            match resource.tags.get(&rule.name) {
                None => issues.push(ComplianceIssue::MissingTag {
                    tag_name: rule.name.clone(),
                    policy_id: policy.id,
                    policy_name: policy.name.clone(),
                }),
                Some(value) if !rule.accepts(value) => {
                    issues.push(ComplianceIssue::InvalidTagValue {
                        tag_name: rule.name.clone(),
                        current_value: value.to_string(),
                        allowed_values: rule
                            .allowed_values
                            .clone()
                            .unwrap_or_default(),
                        policy_id: policy.id,
                        policy_name: policy.name.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }

    EvaluationOutcome {
        is_compliant: issues.is_empty(),
        issues,
    }
}

/// Suggest a remediation value for every flagged tag.
///
/// Per finding: the rule's default value, else the first allowed value,
/// else an empty placeholder the approver must fill in. Findings are
/// visited in canonical order so the suggestion map is deterministic
/// when several policies flag the same tag.
pub fn suggested_tags(issues: &IssueSet, policies: &[Policy]) -> Tags {
    let mut suggestions = Tags::new();
    for issue in issues.canonicalized().iter() {
        let suggestion = policies
            .iter()
            .find(|p| p.id == issue.policy_id())
            .and_then(|p| p.rule(issue.tag_name()))
            .map(|rule| rule.suggested_value())
            .unwrap_or_default();
        suggestions.insert(issue.tag_name(), suggestion);
    }
    suggestions
}

/// Aggregate counts from one batch evaluation run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationSummary {
    /// Resources in the catalog at the start of the run.
    pub total: usize,
    /// Resources evaluated compliant.
    pub compliant: usize,
    /// Resources evaluated non-compliant.
    pub non_compliant: usize,
    /// EXEMPT resources skipped without re-evaluation.
    pub exempt: usize,
    /// Remediation workflows proposed this run.
    pub workflows_proposed: usize,
    /// Stale open workflows cancelled in favor of fresh proposals.
    pub workflows_superseded: usize,
    /// Percentage of compliant resources over the whole catalog
    /// (0.0 when the catalog is empty).
    pub compliance_rate: f64,
}

/// Batch evaluation service: judge every resource, persist verdicts,
/// propose remediations.
#[derive(Debug, Clone)]
pub struct ComplianceEvaluator {
    catalog: Arc<ResourceCatalog>,
    policies: Arc<PolicyStore>,
    workflows: Arc<WorkflowStore>,
    config: EngineConfig,
}

impl ComplianceEvaluator {
    /// Create an evaluator over the given stores.
    pub fn new(
        catalog: Arc<ResourceCatalog>,
        policies: Arc<PolicyStore>,
        workflows: Arc<WorkflowStore>,
        config: EngineConfig,
    ) -> Self {
        Self {
            catalog,
            policies,
            workflows,
            config,
        }
    }

    /// Re-evaluate a single resource against the current active policy
    /// set and write the verdict back.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError::Resource`](tagsentry_core::NotFoundError)
    /// for an unknown identity.
    pub fn evaluate_resource(
        &self,
        resource_id: &ResourceId,
    ) -> Result<EvaluationOutcome, TagSentryError> {
        let resource = self
            .catalog
            .get(resource_id)
            .ok_or_else(|| NotFoundError::Resource(resource_id.to_string()))?;
        let policies = self.policies.list(true);
        let outcome = evaluate(&resource, &policies);
        self.catalog.record_evaluation(
            resource_id,
            outcome.status(),
            outcome.issues.clone(),
            Utc::now(),
        )?;
        Ok(outcome)
    }

    /// Evaluate every resource in the catalog against a snapshot of the
    /// active policy set.
    ///
    /// Safe to re-run at any time: verdict write-backs are idempotent
    /// given unchanged inputs, and workflow proposal deduplicates —
    /// a resource with an open workflow whose issue snapshot is unchanged
    /// gets no second proposal; if the issues changed, the stale workflow
    /// is cancelled with a supersession note and a fresh one proposed.
    /// EXEMPT resources are skipped entirely: an exemption is sticky
    /// until the status is administratively cleared.
    pub fn evaluate_all(&self) -> EvaluationSummary {
        // Snapshot both sets at batch start: concurrent policy edits do
        // not retroactively affect resources already evaluated this run.
        let policies = self.policies.list(true);
        let resources = self.catalog.all();

        let mut summary = EvaluationSummary {
            total: resources.len(),
            compliant: 0,
            non_compliant: 0,
            exempt: 0,
            workflows_proposed: 0,
            workflows_superseded: 0,
            compliance_rate: 0.0,
        };

        for resource in &resources {
            if resource.compliance_status == ComplianceStatus::Exempt {
                summary.exempt += 1;
                continue;
            }

            let outcome = evaluate(resource, &policies);
            if let Err(e) = self.catalog.record_evaluation(
                &resource.resource_id,
                outcome.status(),
                outcome.issues.clone(),
                Utc::now(),
            ) {
                // Resources are never deleted by the core; a miss here
                // means an external administrative removal raced this run.
                tracing::warn!(
                    resource_id = %resource.resource_id,
                    error = %e,
                    "resource vanished mid-evaluation; skipping write-back"
                );
                continue;
            }

            if outcome.is_compliant {
                summary.compliant += 1;
                continue;
            }
            summary.non_compliant += 1;

            if self.config.propose_workflows && !outcome.issues.is_empty() {
                self.propose_if_needed(resource, &outcome, &policies, &mut summary);
            }
        }

        if summary.total > 0 {
            summary.compliance_rate = (summary.compliant as f64 / summary.total as f64) * 100.0;
        }
        tracing::info!(
            total = summary.total,
            compliant = summary.compliant,
            non_compliant = summary.non_compliant,
            exempt = summary.exempt,
            proposed = summary.workflows_proposed,
            superseded = summary.workflows_superseded,
            "evaluation batch finished"
        );
        summary
    }

    /// Propose a remediation workflow unless an open one already covers
    /// the same findings.
    fn propose_if_needed(
        &self,
        resource: &Resource,
        outcome: &EvaluationOutcome,
        policies: &[Policy],
        summary: &mut EvaluationSummary,
    ) {
        if let Some(open) = self.workflows.open_for_resource(&resource.resource_id) {
            if open.details.issues == outcome.issues {
                return;
            }
            if !self.config.supersede_stale_workflows {
                return;
            }
            match self
                .workflows
                .transition(open.id, WorkflowStatus::Cancelled, |w| {
                    w.details.note = Some("superseded by re-evaluation".to_string());
                }) {
                Ok(_) => summary.workflows_superseded += 1,
                Err(e) => {
                    // Lost a race against a human decision; the fresh
                    // findings will be picked up on the next run.
                    tracing::warn!(
                        workflow_id = %open.id,
                        error = %e,
                        "could not supersede stale workflow"
                    );
                    return;
                }
            }
        }

        let suggested = suggested_tags(&outcome.issues, policies);
        let workflow = self.workflows.insert(
            resource.resource_id.clone(),
            WorkflowType::Remediation,
            WorkflowDetails::remediation(outcome.issues.clone(), suggested),
            Some(self.config.system_actor.clone()),
        );
        tracing::debug!(
            workflow_id = %workflow.id,
            resource_id = %resource.resource_id,
            issues = outcome.issues.len(),
            "remediation workflow proposed"
        );
        summary.workflows_proposed += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use tagsentry_core::{
        CloudProvider, PolicyDraft, PolicyId, RequiredTagRule, ResourceId, WorkflowStatus,
    };
    use tagsentry_store::WorkflowFilter;

    fn resource(id: &str, tags: Tags) -> Resource {
        Resource::new(
            ResourceId::new(id).unwrap(),
            id,
            "ec2",
            CloudProvider::Aws,
            "us-east-1",
        )
        .with_tags(tags)
    }

    fn policy(id: u64, name: &str, rules: Vec<RequiredTagRule>) -> Policy {
        Policy {
            id: PolicyId::new(id),
            name: name.to_string(),
            description: None,
            active: true,
            required_tags: rules,
            resource_types: None,
            cloud_providers: None,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    // Scenario A: required tag absent.
    #[test]
    fn missing_required_tag_is_non_compliant() {
        let p = policy(1, "owner-required", vec![RequiredTagRule::new("owner")]);
        let outcome = evaluate(&resource("i-1", Tags::new()), &[p]);
        assert!(!outcome.is_compliant);
        assert_eq!(outcome.issues.len(), 1);
        match outcome.issues.iter().next().unwrap() {
            ComplianceIssue::MissingTag {
                tag_name,
                policy_name,
                ..
            } => {
                assert_eq!(tag_name, "owner");
                assert_eq!(policy_name, "owner-required");
            }
            other => panic!("expected missing_tag, got {other:?}"),
        }
    }

    // Scenario B: required tag present.
    #[test]
    fn present_required_tag_is_compliant() {
        let p = policy(1, "owner-required", vec![RequiredTagRule::new("owner")]);
        let outcome = evaluate(
            &resource("i-1", [("owner", "alice")].into_iter().collect()),
            &[p],
        );
        assert!(outcome.is_compliant);
        assert!(outcome.issues.is_empty());
    }

    // Scenario C: value outside the allowed set.
    #[test]
    fn disallowed_value_is_flagged_with_current_value() {
        let p = policy(
            1,
            "env-values",
            vec![RequiredTagRule::new("env").with_allowed_values(["prod", "dev"])],
        );
        let outcome = evaluate(
            &resource("i-1", [("env", "staging")].into_iter().collect()),
            &[p],
        );
        assert!(!outcome.is_compliant);
        match outcome.issues.iter().next().unwrap() {
            ComplianceIssue::InvalidTagValue {
                current_value,
                allowed_values,
                ..
            } => {
                assert_eq!(current_value, "staging");
                assert_eq!(allowed_values, &["prod", "dev"]);
            }
            other => panic!("expected invalid_tag_value, got {other:?}"),
        }
    }

    #[test]
    fn out_of_scope_policy_contributes_nothing() {
        let mut p = policy(1, "ec2-only", vec![RequiredTagRule::new("owner")]);
        p.resource_types = Some(vec!["ec2".to_string()]);

        let mut s3 = resource("bucket-1", Tags::new());
        s3.resource_type = "s3".to_string();

        let outcome = evaluate(&s3, &[p]);
        assert!(outcome.is_compliant);
    }

    #[test]
    fn multiple_policies_flag_the_same_tag_independently() {
        let p1 = policy(1, "first", vec![RequiredTagRule::new("owner")]);
        let p2 = policy(2, "second", vec![RequiredTagRule::new("owner")]);
        let outcome = evaluate(&resource("i-1", Tags::new()), &[p1, p2]);
        assert_eq!(outcome.issues.len(), 2);
    }

    #[test]
    fn suggested_tags_prefer_default_then_first_allowed_then_empty() {
        let p = policy(
            1,
            "tags",
            vec![
                RequiredTagRule::new("env")
                    .with_allowed_values(["prod", "dev"])
                    .with_default_value("dev"),
                RequiredTagRule::new("team").with_allowed_values(["platform", "data"]),
                RequiredTagRule::new("owner"),
            ],
        );
        let outcome = evaluate(&resource("i-1", Tags::new()), std::slice::from_ref(&p));
        let suggestions = suggested_tags(&outcome.issues, &[p]);
        assert_eq!(suggestions.get("env"), Some("dev"));
        assert_eq!(suggestions.get("team"), Some("platform"));
        assert_eq!(suggestions.get("owner"), Some(""));
    }

    #[test]
    fn suggested_tags_survive_policy_deletion() {
        let p = policy(1, "owner", vec![RequiredTagRule::new("owner")]);
        let outcome = evaluate(&resource("i-1", Tags::new()), &[p]);
        // Policy slice no longer contains policy 1.
        let suggestions = suggested_tags(&outcome.issues, &[]);
        assert_eq!(suggestions.get("owner"), Some(""));
    }

    proptest! {
        // Evaluation is commutative over policy ordering: any permutation
        // of the policy set yields the same canonical issue set.
        #[test]
        fn evaluation_is_policy_order_insensitive(seed in 0u64..1000) {
            let policies = vec![
                policy(1, "owner", vec![RequiredTagRule::new("owner")]),
                policy(2, "env", vec![
                    RequiredTagRule::new("env").with_allowed_values(["prod", "dev"]),
                ]),
                policy(3, "cost", vec![RequiredTagRule::new("cost-center")]),
                policy(4, "owner-again", vec![RequiredTagRule::new("owner")]),
            ];
            let target = resource("i-1", [("env", "staging")].into_iter().collect());

            let baseline = evaluate(&target, &policies);

            // Deterministic shuffle driven by the seed.
            let mut shuffled = policies.clone();
            let mut state = seed.wrapping_add(1);
            for i in (1..shuffled.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (state >> 33) as usize % (i + 1);
                shuffled.swap(i, j);
            }

            let permuted = evaluate(&target, &shuffled);
            prop_assert_eq!(baseline.is_compliant, permuted.is_compliant);
            prop_assert_eq!(baseline.issues, permuted.issues);
        }

        // Pure evaluation is deterministic: same inputs, same verdict.
        #[test]
        fn evaluation_is_deterministic(value in "[a-z]{0,8}") {
            let policies = vec![policy(1, "env", vec![
                RequiredTagRule::new("env").with_allowed_values(["prod", "dev"]),
            ])];
            let target = resource("i-1", [("env", value.as_str())].into_iter().collect());
            let first = evaluate(&target, &policies);
            let second = evaluate(&target, &policies);
            prop_assert_eq!(first, second);
        }
    }

    // -- Batch service ------------------------------------------------------

    fn batch_fixture() -> (ComplianceEvaluator, Arc<ResourceCatalog>, Arc<WorkflowStore>) {
        let catalog = Arc::new(ResourceCatalog::new());
        let policies = Arc::new(PolicyStore::new());
        let workflows = Arc::new(WorkflowStore::new());
        policies
            .create(PolicyDraft::new(
                "owner-required",
                vec![RequiredTagRule::new("owner").with_default_value("platform-team")],
            ))
            .unwrap();
        let evaluator = ComplianceEvaluator::new(
            Arc::clone(&catalog),
            policies,
            Arc::clone(&workflows),
            EngineConfig::default(),
        );
        (evaluator, catalog, workflows)
    }

    #[test]
    fn evaluate_all_writes_back_and_proposes() {
        let (evaluator, catalog, workflows) = batch_fixture();
        catalog.upsert(resource("i-bad", Tags::new())).unwrap();
        catalog
            .upsert(resource("i-good", [("owner", "alice")].into_iter().collect()))
            .unwrap();

        let summary = evaluator.evaluate_all();
        assert_eq!(summary.total, 2);
        assert_eq!(summary.compliant, 1);
        assert_eq!(summary.non_compliant, 1);
        assert_eq!(summary.workflows_proposed, 1);
        assert!((summary.compliance_rate - 50.0).abs() < f64::EPSILON);

        let bad = catalog.get(&ResourceId::new("i-bad").unwrap()).unwrap();
        assert_eq!(bad.compliance_status, ComplianceStatus::NonCompliant);
        assert!(bad.last_checked.is_some());

        let proposed = &workflows.list(&WorkflowFilter::default())[0];
        assert_eq!(proposed.created_by.as_deref(), Some("system"));
        assert_eq!(
            proposed.details.suggested_tags.get("owner"),
            Some("platform-team")
        );
    }

    #[test]
    fn rerun_with_unchanged_issues_proposes_nothing_new() {
        let (evaluator, catalog, workflows) = batch_fixture();
        catalog.upsert(resource("i-bad", Tags::new())).unwrap();

        evaluator.evaluate_all();
        let second = evaluator.evaluate_all();
        assert_eq!(second.workflows_proposed, 0);
        assert_eq!(second.workflows_superseded, 0);
        assert_eq!(workflows.list(&WorkflowFilter::default()).len(), 1);
    }

    #[test]
    fn changed_issues_supersede_the_stale_workflow() {
        let (evaluator, catalog, workflows) = batch_fixture();
        catalog.upsert(resource("i-bad", Tags::new())).unwrap();

        // An open proposal from an earlier policy era whose snapshot no
        // longer matches what evaluation finds today.
        let stale_issues: IssueSet = [ComplianceIssue::MissingTag {
            tag_name: "retired-tag".to_string(),
            policy_id: PolicyId::new(99),
            policy_name: "retired-policy".to_string(),
        }]
        .into_iter()
        .collect();
        let stale = workflows.insert(
            ResourceId::new("i-bad").unwrap(),
            WorkflowType::Remediation,
            WorkflowDetails::remediation(stale_issues.clone(), Tags::new()),
            Some("system".to_string()),
        );

        let summary = evaluator.evaluate_all();
        assert_eq!(summary.workflows_superseded, 1);
        assert_eq!(summary.workflows_proposed, 1);

        let cancelled = workflows.get(stale.id).unwrap();
        assert_eq!(cancelled.status, WorkflowStatus::Cancelled);
        assert_eq!(
            cancelled.details.note.as_deref(),
            Some("superseded by re-evaluation")
        );

        let fresh = workflows
            .open_for_resource(&ResourceId::new("i-bad").unwrap())
            .unwrap();
        assert_ne!(fresh.details.issues, stale_issues);
        assert_eq!(fresh.details.issues.iter().next().unwrap().tag_name(), "owner");
    }

    #[test]
    fn exempt_resources_are_skipped() {
        let (evaluator, catalog, workflows) = batch_fixture();
        catalog.upsert(resource("i-exempt", Tags::new())).unwrap();
        catalog
            .record_evaluation(
                &ResourceId::new("i-exempt").unwrap(),
                ComplianceStatus::Exempt,
                IssueSet::new(),
                Utc::now(),
            )
            .unwrap();

        let summary = evaluator.evaluate_all();
        assert_eq!(summary.exempt, 1);
        assert_eq!(summary.non_compliant, 0);
        assert!(workflows.is_empty());

        let still_exempt = catalog.get(&ResourceId::new("i-exempt").unwrap()).unwrap();
        assert_eq!(still_exempt.compliance_status, ComplianceStatus::Exempt);
    }

    #[test]
    fn evaluate_resource_unknown_id_is_not_found() {
        let (evaluator, _, _) = batch_fixture();
        let err = evaluator
            .evaluate_resource(&ResourceId::new("ghost").unwrap())
            .unwrap_err();
        assert!(matches!(err, TagSentryError::NotFound(_)));
    }
}
