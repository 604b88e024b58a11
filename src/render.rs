//! Terminal rendering of progress events and workflow reports.

use procpilot_core_types::{StepStatus, WorkflowStatus};
use procpilot_orchestrator::{ProgressEvent, WorkflowReport};

fn step_icon(step: StepStatus) -> &'static str {
    match step {
        StepStatus::Running => "…",
        StepStatus::Completed => "✓",
        StepStatus::Failed => "✗",
        StepStatus::Warning => "!",
    }
}

pub fn print_event(event: &ProgressEvent) {
    println!(
        "[{}] {} {}",
        event.stage.as_str(),
        step_icon(event.step),
        event.detail
    );
}

pub fn print_report(report: &WorkflowReport) {
    println!();
    println!("workflow {}", report.workflow_id);
    println!("status: {}", report.status);
    if let Some(error) = &report.error {
        println!("error: {error}");
    }
    if !report.recommendations.is_empty() {
        println!();
        for rec in &report.recommendations {
            println!(
                "  #{} [{}] {} | ¥{} landed (unit ¥{} + freight ¥{}), score {:.1}",
                rec.rank,
                rec.platform,
                rec.product_name,
                rec.landed_cost,
                rec.unit_price,
                rec.freight,
                rec.total_score
            );
            println!("      {}", rec.reason);
        }
        if report.status == WorkflowStatus::PendingConfirmation {
            println!();
            println!(
                "awaiting approval: procpilot approve --workflow {} --rank <N>",
                report.workflow_id
            );
        }
    }
    if let Some(order) = &report.order {
        println!(
            "order {} placed on {} for ¥{}",
            order.order_id, order.platform, order.payment_amount
        );
    }
}
