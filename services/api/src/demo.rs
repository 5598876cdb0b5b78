use crate::infra::{InMemoryStore, DEMO_APPROVER, DEMO_EDITOR, DEMO_FRAMEWORK, DEMO_ORG};
use chrono::{Local, NaiveDate, Utc};
use clap::Args;
use compliance_engine::error::AppError;
use compliance_engine::workflows::compliance::{
    ComplianceReadService, ComplianceSnapshot, FrameworkComplianceView, FrameworkInstanceId,
};
use compliance_engine::workflows::policies::{
    Department, Policy, PolicyApprovalService, PolicyId, PolicyServiceError, PolicyStatus,
    SaveOutcome, SavePolicyRequest,
};
use compliance_engine::workflows::{MemberId, OrganizationContext};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Reporting date for review schedules (YYYY-MM-DD). Defaults to today.
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) today: Option<NaiveDate>,
    /// Print each control row under the framework summaries.
    #[arg(long)]
    pub(crate) list_controls: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReportArgs {
    /// JSON snapshot export to score
    #[arg(long)]
    pub(crate) snapshot: PathBuf,
    /// Framework instance id to roll up
    #[arg(long)]
    pub(crate) framework: String,
    /// Organization the export belongs to
    #[arg(long)]
    pub(crate) organization: String,
    /// Emit the rollup as JSON instead of a table
    #[arg(long)]
    pub(crate) json: bool,
}

pub(crate) fn run_framework_report(args: ReportArgs) -> Result<(), AppError> {
    let ReportArgs {
        snapshot,
        framework,
        organization,
        json,
    } = args;

    let records = ComplianceSnapshot::load(&snapshot)?;
    let service = ComplianceReadService::new(Arc::new(records));
    let ctx = OrganizationContext::new(organization, "cli");
    let view = service.framework_compliance(&ctx, &FrameworkInstanceId(framework))?;

    if json {
        match serde_json::to_string_pretty(&view) {
            Ok(body) => println!("{body}"),
            Err(err) => println!("Unable to encode report: {err}"),
        }
    } else {
        render_framework_report(&view, true);
    }

    Ok(())
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        today,
        list_controls,
    } = args;
    let today = today.unwrap_or_else(|| Local::now().date_naive());

    let store = Arc::new(InMemoryStore::seeded());
    let policies = PolicyApprovalService::new(store.clone());
    let compliance = ComplianceReadService::new(store);

    let editor = OrganizationContext::new(DEMO_ORG, DEMO_EDITOR);
    let approver_ctx = OrganizationContext::new(DEMO_ORG, DEMO_APPROVER);
    let approver = MemberId(DEMO_APPROVER.to_string());
    let framework = FrameworkInstanceId(DEMO_FRAMEWORK.to_string());
    let policy_id = PolicyId("pol-access".to_string());

    println!("Compliance engine demo ({DEMO_ORG}, reporting date {today})");
    println!("\nFramework compliance before policy work");
    render_framework_report(
        &compliance.framework_compliance(&editor, &framework)?,
        list_controls,
    );

    println!("\nPolicy lifecycle for {policy_id}");
    if let Err(err) = walk_policy_lifecycle(&policies, &editor, &approver_ctx, &approver, today) {
        println!("  Lifecycle walk stopped: {err}");
    }

    println!("\nFramework compliance after policy work");
    render_framework_report(
        &compliance.framework_compliance(&editor, &framework)?,
        list_controls,
    );

    Ok(())
}

fn walk_policy_lifecycle(
    policies: &PolicyApprovalService<InMemoryStore>,
    editor: &OrganizationContext,
    approver_ctx: &OrganizationContext,
    approver: &MemberId,
    today: NaiveDate,
) -> Result<(), PolicyServiceError> {
    let policy_id = PolicyId("pol-access".to_string());
    let record = policies.get(editor, &policy_id)?;
    print_state(record.view(today).state_label, &record.policy);

    let mut publish = record.policy.form();
    publish.status = PolicyStatus::Published;
    let unassigned = SavePolicyRequest {
        form: publish.clone(),
        expected_version: Some(record.policy.version),
        approver_id: None,
    };
    match policies.save(editor, &policy_id, unassigned, Utc::now()) {
        Ok(outcome) => println!("- publish without an approver: {}", outcome_label(&outcome)),
        Err(err) => println!("- publish without an approver rejected: {err}"),
    }

    let submitted = policies.save(
        editor,
        &policy_id,
        SavePolicyRequest {
            form: publish,
            expected_version: Some(record.policy.version),
            approver_id: Some(approver.clone()),
        },
        Utc::now(),
    )?;
    println!("- submitted for approval: {}", outcome_label(&submitted));
    print_state(
        policies.get(editor, &policy_id)?.view(today).state_label,
        submitted.policy(),
    );

    let published =
        policies.confirm_approval(approver_ctx, &policy_id, Some(approver), Utc::now())?;
    println!("- approver confirmed");
    print_state(policies.get(editor, &policy_id)?.view(today).state_label, &published);

    let mut copy_edit = published.form();
    copy_edit.description =
        "Who may reach production systems and how that access is reviewed.".to_string();
    let edited = policies.save(
        editor,
        &policy_id,
        SavePolicyRequest {
            form: copy_edit,
            expected_version: Some(published.version),
            approver_id: None,
        },
        Utc::now(),
    )?;
    println!("- description edit: {}", outcome_label(&edited));
    let edited = edited.policy().clone();

    let mut material = edited.form();
    material.department = Department::Gov;
    let plan = policies.plan(editor, &policy_id, &material)?;
    println!("- department change planned as {:?}", plan.kind());

    let proposed = policies.save(
        editor,
        &policy_id,
        SavePolicyRequest {
            form: material,
            expected_version: Some(edited.version),
            approver_id: Some(approver.clone()),
        },
        Utc::now(),
    )?;
    println!("- department change: {}", outcome_label(&proposed));
    let restored = policies.cancel_approval(editor, &policy_id, Utc::now())?;
    println!(
        "- department change cancelled, status back to {} ({:?})",
        restored.status, restored.department
    );

    let archived = policies.archive(editor, &policy_id, Utc::now())?;
    println!(
        "- archived (status kept as {}, archived: {})",
        archived.status, archived.is_archived
    );
    let restored = policies.restore(editor, &policy_id)?;
    print_state(policies.get(editor, &policy_id)?.view(today).state_label, &restored);

    Ok(())
}

fn print_state(label: &str, policy: &Policy) {
    println!(
        "  {} | state {} | version {} | next review {}",
        policy.name,
        label,
        policy.version,
        policy
            .next_review_due()
            .map(|date| date.to_string())
            .unwrap_or_else(|| "not scheduled".to_string())
    );
}

fn outcome_label(outcome: &SaveOutcome) -> String {
    match outcome {
        SaveOutcome::Unchanged { .. } => "nothing to save".to_string(),
        SaveOutcome::Updated { policy } => format!("saved directly as version {}", policy.version),
        SaveOutcome::ApprovalRequested { request, .. } => format!(
            "approval request {} sent to {}",
            request.id, request.approver_id
        ),
    }
}

fn render_framework_report(view: &FrameworkComplianceView, list_controls: bool) {
    println!(
        "{} ({}): {}% {:?} | {}/{} controls compliant",
        view.framework_name,
        view.framework_instance_id,
        view.compliance_pct,
        view.status,
        view.compliant_controls,
        view.total_controls
    );

    if list_controls {
        for row in &view.controls {
            println!(
                "  - {:<16} {:>3}% {:?}  {}",
                row.control_id.to_string(),
                row.progress,
                row.status,
                row.control_name
            );
        }
    }
}
