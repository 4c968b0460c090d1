// Payroll Ledger - admin command line
// Initialise the database and inspect or adjust the company balance without
// going through the HTTP server.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use payroll_ledger::logging::init_logger;
use payroll_ledger::{Config, LedgerEntry, PayrollService};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Payroll ledger administration", long_about = None)]
struct Cli {
    /// TOML config file (defaults to $PAYROLL_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema (safe to run repeatedly)
    Init,
    /// Print the company balance
    Balance,
    /// Top up the company balance
    Topup { amount: f64 },
    /// Deduct from the company balance
    Deduct { amount: f64 },
    /// List ledger entries, newest first
    Ledger,
    /// Check the balance against the ledger
    Reconcile,
    /// Write the ledger as CSV to stdout
    Export,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    init_logger(&config.logging);

    let database = config.database();
    database
        .initialize()
        .with_context(|| format!("Failed to initialize database at {}", database.path().display()))?;
    let service = PayrollService::new(database);

    match cli.command {
        Command::Init => {
            println!("✓ Database ready: {}", service.database().path().display());
        }
        Command::Balance => {
            println!("{:.2}", service.balance()?);
        }
        Command::Topup { amount } => {
            let record = service.top_up(amount)?;
            println!("✓ Topped up {:.2} (record #{})", record.amount, record.id);
            println!("  Balance: {:.2}", service.balance()?);
        }
        Command::Deduct { amount } => {
            let record = service.deduct(amount)?;
            println!("✓ Deducted {:.2} (record #{})", record.amount, record.id);
            println!("  Balance: {:.2}", service.balance()?);
        }
        Command::Ledger => {
            let entries = service.ledger()?;
            for entry in &entries {
                print_entry(entry);
            }
            println!("{} entries", entries.len());
        }
        Command::Reconcile => {
            let result = service.reconcile()?;
            println!("{}", result.summary());
            if !result.is_balanced() {
                std::process::exit(2);
            }
        }
        Command::Export => {
            let stdout = io::stdout();
            export_csv(&service.ledger()?, stdout.lock())?;
        }
    }

    Ok(())
}

fn print_entry(entry: &LedgerEntry) {
    let employee = entry
        .employee_id
        .map(|id| format!(" employee #{}", id))
        .unwrap_or_default();

    println!(
        "{}  {:<10} #{:<5} {:>12.2}{}",
        entry.transaction.format("%Y-%m-%d %H:%M:%S"),
        entry.kind.as_str(),
        entry.id,
        entry.signed_amount(),
        employee
    );
}

fn export_csv<W: Write>(entries: &[LedgerEntry], out: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(["kind", "id", "amount", "transaction", "employee_id"])?;

    for entry in entries {
        writer.write_record([
            entry.kind.as_str().to_string(),
            entry.id.to_string(),
            format!("{:.2}", entry.amount),
            entry.transaction.to_rfc3339(),
            entry.employee_id.map(|id| id.to_string()).unwrap_or_default(),
        ])?;
    }

    writer.flush().context("Failed to write CSV")?;
    Ok(())
}
