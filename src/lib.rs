//! procpilot: cross-platform procurement automation.
//!
//! The binary drives the workflow orchestrator from the command line: submit
//! a demand, watch it park at the confirmation gate, then approve or reject
//! the ranked recommendations in a later invocation.

pub mod demo;
pub mod render;
pub mod settings;

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;

use procpilot_core_types::{Platform, PurchaseDemand, WorkflowId};
use procpilot_orchestrator::{
    ChannelObserver, JsonFileJobStore, WorkflowOrchestrator,
};

use crate::settings::Settings;

#[derive(Parser, Debug)]
#[command(name = "procpilot", version, about = "Automated procurement across 1688, JD and Tmall")]
pub struct Cli {
    /// Emit the final report as JSON instead of the human-readable view.
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Submit a purchase demand and run it to the confirmation gate.
    Run {
        /// Product name to search for.
        #[arg(long)]
        product: String,
        /// Units to buy.
        #[arg(long)]
        quantity: u32,
        /// Optional specification, e.g. "80g 500 sheets".
        #[arg(long)]
        spec: Option<String>,
        /// Optional total budget in yuan; offers landing above it are
        /// excluded.
        #[arg(long)]
        budget: Option<Decimal>,
        /// Platforms to search, comma separated (1688, jd, tmall).
        /// Defaults to all three.
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
    },
    /// Approve a parked recommendation and place the order.
    Approve {
        #[arg(long)]
        workflow: String,
        /// Rank shown at the confirmation gate, 1 is best.
        #[arg(long, default_value_t = 1)]
        rank: u32,
    },
    /// Reject a parked workflow's recommendations.
    Reject {
        #[arg(long)]
        workflow: String,
    },
    /// Show the current state of a workflow.
    Status {
        #[arg(long)]
        workflow: String,
    },
    /// Fail every parked workflow whose approval window has lapsed.
    Sweep,
}

fn build(settings: &Settings) -> Result<(WorkflowOrchestrator, Arc<ChannelPrinter>)> {
    let store = Arc::new(
        JsonFileJobStore::new(&settings.state_dir)
            .with_context(|| format!("open state dir {}", settings.state_dir.display()))?,
    );
    let (observer, events) = ChannelObserver::new();
    let printer = Arc::new(ChannelPrinter::spawn(events));
    let orchestrator =
        WorkflowOrchestrator::with_config(demo::demo_factory(), store, settings.config.clone())
            .with_scorer(settings.scorer())
            .with_observer(Arc::new(observer));
    Ok((orchestrator, printer))
}

/// Prints progress events as they arrive, off the workflow's hot path.
struct ChannelPrinter {
    handle: tokio::task::JoinHandle<()>,
}

impl ChannelPrinter {
    fn spawn(
        mut events: tokio::sync::mpsc::UnboundedReceiver<procpilot_orchestrator::ProgressEvent>,
    ) -> Self {
        let handle = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                render::print_event(&event);
            }
        });
        Self { handle }
    }

    async fn finish(&self) {
        // The sender side is gone once the orchestrator drops its observer
        // reference; give the printer a beat to drain.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        self.handle.abort();
    }
}

fn print_report(report: &procpilot_orchestrator::WorkflowReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        render::print_report(report);
    }
    Ok(())
}

pub async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::from_env();

    match cli.command {
        Command::Run {
            product,
            quantity,
            spec,
            budget,
            platforms,
        } => {
            let platforms = parse_platforms(&platforms)?;
            let mut demand = PurchaseDemand::new(product, quantity, platforms)?;
            if let Some(spec) = spec {
                demand = demand.with_specification(spec);
            }
            if let Some(budget) = budget {
                demand = demand.with_budget(budget);
            }

            let (orchestrator, printer) = build(&settings)?;
            let report = orchestrator.run_workflow(demand).await?;
            printer.finish().await;
            print_report(&report, cli.json)?;
        }
        Command::Approve { workflow, rank } => {
            let (orchestrator, printer) = build(&settings)?;
            let report = orchestrator.approve(&WorkflowId(workflow), rank).await?;
            printer.finish().await;
            print_report(&report, cli.json)?;
        }
        Command::Reject { workflow } => {
            let (orchestrator, printer) = build(&settings)?;
            let report = orchestrator.reject(&WorkflowId(workflow)).await?;
            printer.finish().await;
            print_report(&report, cli.json)?;
        }
        Command::Status { workflow } => {
            let (orchestrator, _printer) = build(&settings)?;
            let report = orchestrator.resume(&WorkflowId(workflow)).await?;
            print_report(&report, cli.json)?;
        }
        Command::Sweep => {
            let (orchestrator, _printer) = build(&settings)?;
            let expired = orchestrator.expire_overdue().await?;
            if expired.is_empty() {
                println!("nothing to expire");
            } else {
                for id in expired {
                    println!("expired workflow {id}");
                }
            }
        }
    }
    Ok(())
}

fn parse_platforms(raw: &[String]) -> Result<Vec<Platform>> {
    if raw.is_empty() {
        return Ok(Platform::ALL.to_vec());
    }
    raw.iter()
        .map(|token| Platform::from_str(token).map_err(Into::into))
        .collect()
}
