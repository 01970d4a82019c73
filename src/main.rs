//! Entry point for the Salyq Engine binary.
//!
//! Without a subcommand the binary starts the HTTP server.  The
//! `calculate` subcommand runs a single calculation and prints it,
//! which is handy for checking figures without a client.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use salyq_engine::api::{self, AppState};
use salyq_engine::config::AppConfig;
use salyq_engine::engine::compute;
use salyq_engine::models::{CalculationRequest, CalculationResult};
use salyq_engine::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "salyq",
    about = "Simplified-regime tax and social payment calculator",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Calculate taxes for one half-year and print the result
    Calculate(CalculateArgs),
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

#[derive(Args, Debug)]
struct CalculateArgs {
    /// Revenue for the half-year in tenge
    #[arg(long, allow_negative_numbers = true)]
    revenue: f64,
    /// Months of activity within the half-year (1-6)
    #[arg(long, allow_negative_numbers = true)]
    months: i64,
    /// Fiscal year of the rate table to apply
    #[arg(long)]
    year: Option<u16>,
    /// Print the result as JSON
    #[arg(long)]
    json: bool,
    /// Append a plain-language explanation
    #[arg(long)]
    explain: bool,
}

#[tokio::main]
async fn main() {
    if let Err(err) = run_cli().await {
        eprintln!("application error: {err:#}");
        std::process::exit(1);
    }
}

async fn run_cli() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::load().context("failed to load configuration")?;
    telemetry::init(&config.telemetry)?;

    match cli.command.unwrap_or_else(|| Command::Serve(ServeArgs::default())) {
        Command::Serve(args) => {
            if let Some(host) = args.host {
                config.server.host = host;
            }
            if let Some(port) = args.port {
                config.server.port = port;
            }
            let addr = config.server.socket_addr()?;
            let state = AppState::from_config(&config).context("failed to load rate tables")?;
            api::serve(addr, state).await
        }
        Command::Calculate(args) => run_calculation(&config, args),
    }
}

fn run_calculation(config: &AppConfig, args: CalculateArgs) -> anyhow::Result<()> {
    let state = AppState::from_config(config).context("failed to load rate tables")?;
    let request = CalculationRequest {
        revenue: args.revenue,
        months_worked: args.months,
        year: args.year,
    };
    let (input, rates) = request.validate(&state.rates, state.default_year)?;
    let result = compute(&input, rates)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_result(&result);
    }
    if args.explain {
        println!();
        println!("{}", state.explainer.explain(&result, rates));
    }
    Ok(())
}

fn print_result(result: &CalculationResult) {
    let rows = [
        ("Revenue", result.input.revenue()),
        ("IPN", result.taxes.ipn),
        ("SN", result.taxes.sn),
        ("Total tax", result.taxes.total_tax),
        ("OPV", result.obligations.opv),
        ("SO", result.obligations.so),
        ("VOSMS", result.obligations.vosms),
        ("Total social", result.total_social),
        ("Revenue limit", result.revenue_limit_value),
    ];

    println!("Fiscal year {}, {} month(s)", result.year, result.input.months_worked());
    for (label, amount) in rows {
        println!("{label:<16}{amount:>18.2}");
    }
    println!("{:<16}{:>17.2}%", "Limit used", result.limit_percentage);
    for warning in &result.warnings {
        println!("{warning}");
    }
}
