//! Command line front end for the Altitrace API
//!
//! Reads requests from JSON files, runs them through the SDK and prints
//! either the raw JSON results or colored summary tables.

use std::{fs, path::Path, str::FromStr};

use alloy::primitives::B256;
use altitrace::{
    bundle::{BundleResult, BundleStatus, StepStatus},
    client::{AccessListReport, ComprehensiveResult},
    types::{AccessListResponse, BlockTag, SimulationRequest, SimulationResult, TracerResponse, TransactionCall},
    utils::access_list_utils::Recommendation,
    AccessListRequestBuilder, AltitraceClient, BundleRequest, ClientConfig, TraceRequestBuilder,
};
use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use prettytable::{format, Cell, Row, Table};
use serde::{de::DeserializeOwned, Serialize};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Simulate and trace EVM transactions through the Altitrace API")]
struct Cli {
    /// API base URL (defaults to ALTITRACE_API_URL or http://localhost:8080/v1)
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// API key sent as a bearer token
    #[arg(long, env = "ALTITRACE_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// Log level or full filter directive (e.g. `debug` or `altitrace=trace,info`)
    #[arg(long, default_value = "warn", global = true)]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, default_value_t = false, global = true)]
    json_logs: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = Output::Table, global = true)]
    output: Output,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Output {
    Json,
    Table,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Simulate a request read from a JSON file
    Simulate { request: String },
    /// Trace a mined transaction
    TraceTx {
        hash: String,
        /// Also run the diff-mode prestate tracer
        #[arg(long, default_value_t = false)]
        prestate: bool,
    },
    /// Trace a call read from a JSON file
    TraceCall {
        call: String,
        #[arg(long, default_value = "latest")]
        block: String,
    },
    /// Generate an access list for a call
    AccessList {
        call: String,
        #[arg(long, default_value = "latest")]
        block: String,
    },
    /// Compare gas usage with and without a generated access list
    Compare {
        call: String,
        #[arg(long, default_value = "latest")]
        block: String,
    },
    /// Simulate, trace and generate an access list in one go
    Inspect {
        call: String,
        #[arg(long, default_value = "latest")]
        block: String,
    },
    /// Execute a bundle read from a JSON file
    Bundle { bundle: String },
}

fn setup_logging(log_level: &str, json_format: bool) {
    // Bare levels get quieter defaults for the HTTP stack
    let normalized = log_level.trim();
    let filter_spec = if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        format!("{normalized},h2=info,hyper=info,hyper_util=info,reqwest=info")
    };
    let filter = EnvFilter::from_str(&filter_spec).unwrap_or_else(|_| EnvFilter::new("warn"));
    let subscriber = tracing_subscriber::registry().with(filter);

    if json_format {
        subscriber.with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr)).init();
    } else {
        subscriber.with(fmt::layer().with_target(true).compact().with_writer(std::io::stderr)).init();
    }
    tracing::debug!(filter = %filter_spec, json = json_format, "Logging initialized");
}

fn read_json<T: DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    let raw = fs::read_to_string(Path::new(path)).with_context(|| format!("failed to read {path}"))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {path}"))
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BOX_CHARS);
    table.add_row(Row::new(headers.iter().map(|header| Cell::new(header).style_spec("Fb")).collect()));
    table
}

fn status_label(success: bool) -> ColoredString {
    if success {
        "success".green()
    } else {
        "failed".red()
    }
}

fn print_simulation(result: &SimulationResult) {
    println!(
        "{} {} at block {} ({} gas)",
        "Simulation".bold(),
        result.simulation_id,
        result.block_number,
        result.total_gas_used()
    );

    let mut calls = new_table(&["#", "Status", "Gas", "Logs", "Revert reason"]);
    for call in &result.calls {
        calls.add_row(Row::new(vec![
            Cell::new(&call.call_index.to_string()),
            Cell::new(&status_label(call.is_success()).to_string()),
            Cell::new(&call.gas_used().to_string()),
            Cell::new(&call.logs.len().to_string()),
            Cell::new(&call.revert_reason().unwrap_or_default()),
        ]));
    }
    calls.printstd();

    if let Some(changes) = result.asset_changes.as_ref().filter(|changes| !changes.is_empty()) {
        let mut assets = new_table(&["Token", "Symbol", "Before", "After", "Change"]);
        for change in changes {
            let delta = change.value.signed_diff();
            let delta = if delta.is_negative() { delta.to_string().red() } else { delta.to_string().green() };
            assets.add_row(Row::new(vec![
                Cell::new(&change.token.address.to_string()),
                Cell::new(change.token.symbol.as_deref().unwrap_or("?")),
                Cell::new(&change.value.pre.to_string()),
                Cell::new(&change.value.post.to_string()),
                Cell::new(&delta.to_string()),
            ]));
        }
        println!("\nAsset changes:");
        assets.printstd();
    }
}

fn print_trace(response: &TracerResponse) {
    let failed = response.has_errors();
    println!("{} {}", "Trace".bold(), status_label(!failed));

    if let Some(summary) = response.call_summary() {
        println!(
            "Calls: {}  Max depth: {}  Gas: {}  Logs: {}",
            summary.total_calls,
            summary.max_depth,
            summary.gas.total,
            summary.logs.len()
        );
        if let Some(origin) = &summary.error_origin {
            println!("{} {:?} ({}): {}", "Error origin".red().bold(), origin.trace_address, origin.call_type, origin.message());
        }
        if !summary.value_transfers.is_empty() {
            let mut transfers = new_table(&["From", "To", "Value"]);
            for transfer in &summary.value_transfers {
                transfers.add_row(Row::new(vec![
                    Cell::new(&transfer.from.to_string()),
                    Cell::new(&transfer.to.to_string()),
                    Cell::new(&transfer.value.to_string()),
                ]));
            }
            transfers.printstd();
        }
    }

    if let Ok(diff) = response.state_diff_summary() {
        let mut accounts = new_table(&["Account", "Balance change", "Nonce", "Slots", "Code"]);
        for account in &diff.accounts {
            accounts.add_row(Row::new(vec![
                Cell::new(&account.address.to_string()),
                Cell::new(&account.balance_delta.to_string()),
                Cell::new(&format!("{:?} -> {:?}", account.nonce_before, account.nonce_after)),
                Cell::new(&account.storage.len().to_string()),
                Cell::new(if account.code_changed { "changed" } else { "" }),
            ]));
        }
        println!("\nState changes ({} accounts, {} slots):", diff.accounts_touched(), diff.slots_changed());
        accounts.printstd();
    }
}

fn print_access_list(response: &AccessListResponse) {
    if let Some(error) = &response.error {
        println!("{} {}", "Access list error:".red().bold(), error);
    }
    let mut table = new_table(&["Address", "Storage keys"]);
    for item in &response.access_list.0 {
        table.add_row(Row::new(vec![
            Cell::new(&item.address.to_string()),
            Cell::new(&item.storage_keys.len().to_string()),
        ]));
    }
    table.printstd();
    println!("Gas used: {}", response.gas_used);
}

fn print_comparison(report: &AccessListReport) {
    let Some(comparison) = &report.comparison else {
        println!(
            "{} {}",
            "Comparison skipped:".yellow().bold(),
            report.error.as_deref().unwrap_or("no access list")
        );
        return;
    };
    let recommendation = match comparison.recommendation {
        Recommendation::Recommended => comparison.recommendation.to_string().green(),
        Recommendation::NotRecommended => comparison.recommendation.to_string().red(),
        Recommendation::Neutral => comparison.recommendation.to_string().normal(),
    };

    let mut table = new_table(&["Without list", "With list", "Difference", "Savings", "Recommendation"]);
    table.add_row(Row::new(vec![
        Cell::new(&comparison.gas_without.to_string()),
        Cell::new(&comparison.gas_with.to_string()),
        Cell::new(&comparison.gas_difference.to_string()),
        Cell::new(&format!(
            "{:.2}%{}",
            comparison.savings_percentage,
            if comparison.significant { " (significant)" } else { "" }
        )),
        Cell::new(&recommendation.to_string()),
    ]));
    table.printstd();
}

fn print_comprehensive(result: &ComprehensiveResult) {
    print_simulation(&result.simulation);
    match (&result.trace, &result.trace_error) {
        (Some(trace), _) => print_trace(trace),
        (None, Some(error)) => println!("{} {}", "Trace failed:".red(), error),
        (None, None) => {}
    }
    match (&result.access_list, &result.access_list_error) {
        (Some(list), _) => print_access_list(list),
        (None, Some(error)) => println!("{} {}", "Access list failed:".red(), error),
        (None, None) => {}
    }
}

fn print_bundle(result: &BundleResult) {
    let status = match &result.status {
        BundleStatus::Success => "success".green(),
        BundleStatus::PartialSuccess => "partial success".yellow(),
        BundleStatus::Failed { step, .. } => format!("failed at step {step}").red(),
    };
    println!(
        "{} {}  ({} ok, {} failed, {} skipped, {} gas)",
        "Bundle".bold(),
        status,
        result.success_count,
        result.failed_count,
        result.skipped_count,
        result.total_gas_used
    );

    let mut steps = new_table(&["#", "Label", "Status", "Gas", "Error"]);
    for step in &result.steps {
        let status = match step.status {
            StepStatus::Success => "success".green(),
            StepStatus::Failed if step.allow_failure => "failed (allowed)".yellow(),
            StepStatus::Failed => "failed".red(),
            StepStatus::Skipped => "skipped".dimmed(),
        };
        steps.add_row(Row::new(vec![
            Cell::new(&step.index.to_string()),
            Cell::new(step.label.as_deref().unwrap_or("")),
            Cell::new(&status.to_string()),
            Cell::new(&step.gas_used().to_string()),
            Cell::new(step.error.as_deref().or(step.trace_error.as_deref()).unwrap_or("")),
        ]));
    }
    steps.printstd();

    if !result.asset_changes.is_empty() {
        let mut assets = new_table(&["Account", "Token", "Net change"]);
        for (account, tokens) in &result.asset_changes {
            for (token, delta) in tokens {
                assets.add_row(Row::new(vec![
                    Cell::new(&account.to_string()),
                    Cell::new(&token.to_string()),
                    Cell::new(&delta.to_string()),
                ]));
            }
        }
        println!("\nNet asset changes:");
        assets.printstd();
    }
}

fn build_client(cli: &Cli) -> anyhow::Result<AltitraceClient> {
    let mut config = match &cli.api_url {
        Some(url) => ClientConfig::new(url)?,
        None => ClientConfig::from_env()?,
    };
    if let Some(key) = &cli.api_key {
        config = config.with_api_key(key.clone());
    }
    Ok(AltitraceClient::new(config)?)
}

fn emit<T: Serialize>(output: Output, value: &T, table: impl FnOnce(&T)) -> anyhow::Result<()> {
    match output {
        Output::Json => print_json(value),
        Output::Table => {
            table(value);
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level, cli.json_logs);
    let client = build_client(&cli)?;

    match &cli.command {
        Command::Simulate { request } => {
            let request: SimulationRequest = read_json(request)?;
            let result = client.simulation().simulate(&request).await?;
            emit(cli.output, &result, print_simulation)
        }
        Command::TraceTx { hash, prestate } => {
            let hash = B256::from_str(hash).with_context(|| format!("invalid transaction hash {hash}"))?;
            let mut builder = TraceRequestBuilder::transaction(hash);
            if *prestate {
                builder = builder.with_prestate_tracer(true);
            }
            let responses = client.trace().send(&builder.build()?).await?;
            emit(cli.output, &responses, |responses| responses.iter().for_each(print_trace))
        }
        Command::TraceCall { call, block } => {
            let call: TransactionCall = read_json(call)?;
            let request = TraceRequestBuilder::call(call).with_prestate_tracer(true).block(block.as_str()).build()?;
            let responses = client.trace().send(&request).await?;
            emit(cli.output, &responses, |responses| responses.iter().for_each(print_trace))
        }
        Command::AccessList { call, block } => {
            let call: TransactionCall = read_json(call)?;
            let request = AccessListRequestBuilder::new().call(call).block(block.as_str()).build()?;
            let response = client.access_list().create(&request).await?;
            emit(cli.output, &response, print_access_list)
        }
        Command::Compare { call, block } => {
            let call: TransactionCall = read_json(call)?;
            let report = client.compare_access_list(call, BlockTag::from_str(block)?).await?;
            emit(cli.output, &report, print_comparison)
        }
        Command::Inspect { call, block } => {
            let call: TransactionCall = read_json(call)?;
            let result = client.simulate_with_trace(call, BlockTag::from_str(block)?).await?;
            emit(cli.output, &result, print_comprehensive)
        }
        Command::Bundle { bundle } => {
            let request: BundleRequest = read_json(bundle)?;
            let result = client.simulate_bundle(&request).await?;
            emit(cli.output, &result, print_bundle)
        }
    }
}
