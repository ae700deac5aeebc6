mod commands;
mod config;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;

use crate::commands::{
    cmd_clear, cmd_day, cmd_delete, cmd_entry, cmd_export, cmd_import, cmd_list, cmd_month,
    cmd_remove, cmd_report, cmd_set, cmd_update,
};
use crate::config::{Config, init_logging};
use tiffin_core::db::Database;

#[derive(Parser)]
#[command(
    name = "tiffin",
    version,
    about = "A simple meal expense tracker CLI",
    long_about = "\n\n  ████████╗██╗███████╗███████╗██╗███╗   ██╗
  ╚══██╔══╝██║██╔════╝██╔════╝██║████╗  ██║
     ██║   ██║█████╗  █████╗  ██║██╔██╗ ██║
     ██║   ██║██╔══╝  ██╔══╝  ██║██║╚██╗██║
     ██║   ██║██║     ██║     ██║██║ ╚████║
     ╚═╝   ╚═╝╚═╝     ╚═╝     ╚═╝╚═╝  ╚═══╝
        know what your meals cost.
"
)]
struct Cli {
    /// Path to the expense database (default: per-user data directory)
    #[arg(long, global = true, env = "TIFFIN_DB", value_name = "PATH")]
    db: Option<PathBuf>,
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Record what a meal cost (replaces any existing amount; 0 clears it)
    Set {
        /// Meal: breakfast, lunch, dinner, other
        meal: String,
        /// Amount spent (e.g. "120", "₹85.50")
        amount: String,
        /// Description, kept for the "other" meal (e.g. "chai")
        #[arg(short, long)]
        note: Option<String>,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove the entry for one meal
    Remove {
        /// Meal: breakfast, lunch, dinner, other
        meal: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the four meals for a day (defaults to today)
    Day {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Fill in a day interactively, one meal at a time
    Entry {
        /// Date to edit (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output the changes as JSON
        #[arg(long)]
        json: bool,
    },
    /// Monthly summary with daily breakdown and meal chart
    Month {
        /// Month to show (YYYY-MM, any YYYY-MM-DD inside it, or today)
        month: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Summary for an arbitrary date range
    Report {
        /// First day (inclusive)
        #[arg(long)]
        from: String,
        /// Last day (inclusive, default: today)
        #[arg(long)]
        to: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List every stored entry, newest first
    List {
        /// Only show one month (YYYY-MM)
        #[arg(short, long)]
        month: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Update an entry by ID (amount, meal, date, or note)
    Update {
        /// Entry ID to update
        id: i64,
        /// New amount
        #[arg(short, long)]
        amount: Option<String>,
        /// New meal: breakfast, lunch, dinner, other
        #[arg(long)]
        meal: Option<String>,
        /// New date (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// New note (empty string clears it)
        #[arg(long)]
        note: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an entry by ID
    Delete {
        /// Entry ID to delete
        id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every entry, or every entry of one day with --date
    Clear {
        /// Only clear this day (YYYY-MM-DD or today/yesterday/tomorrow)
        #[arg(long)]
        date: Option<String>,
        /// Confirm that all data should be removed
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Export all entries as CSV
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Import entries from a CSV file (Date,Meal,Amount)
    Import {
        /// Path to the CSV file
        file: PathBuf,
        /// Preview import without making changes
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.db)?;
    tracing::debug!(path = %config.db_path.display(), "opening database");
    let db = Database::open(&config.db_path)?;

    match cli.command {
        Commands::Set {
            meal,
            amount,
            note,
            date,
            json,
        } => cmd_set(&db, &meal, &amount, note, date, json),
        Commands::Remove { meal, date, json } => cmd_remove(&db, &meal, date, json),
        Commands::Day { date, json } => cmd_day(&db, date, json),
        Commands::Entry { date, json } => cmd_entry(&db, date, json),
        Commands::Month { month, json } => cmd_month(&db, month, json),
        Commands::Report { from, to, json } => cmd_report(&db, &from, to, json),
        Commands::List { month, json } => cmd_list(&db, month.as_deref(), json),
        Commands::Update {
            id,
            amount,
            meal,
            date,
            note,
            json,
        } => cmd_update(&db, id, amount.as_deref(), meal.as_deref(), date, note, json),
        Commands::Delete { id, json } => cmd_delete(&db, id, json),
        Commands::Clear { date, yes, json } => cmd_clear(&db, date, yes, json),
        Commands::Export { output } => cmd_export(&db, output.as_deref()),
        Commands::Import {
            file,
            dry_run,
            json,
        } => cmd_import(&db, &file, dry_run, json),
        Commands::Serve { port, bind } => server::start_server(db, port, &bind).await,
    }
}
