//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI
//! arguments. The actual command implementations are in the `commands`
//! module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Cardsense - Credit-card statement insight engine
#[derive(Parser)]
#[command(name = "cardsense")]
#[command(about = "Subscription detection, anomaly flagging, and payoff planning for card statements", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "cardsense.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Import transactions from a statement CSV
    Import {
        /// CSV file to import (columns: date, description, amount, merchant)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Detect recurring charges and sync them to the subscriptions table
    Detect {
        /// Known-services catalog TOML (built-in list if omitted)
        #[arg(long)]
        services: Option<PathBuf>,

        /// Print detected candidates as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage detected subscriptions
    Subscriptions {
        #[command(subcommand)]
        action: Option<SubscriptionsAction>,
    },

    /// Flag statistically unusual charges
    Anomalies {
        /// Ignore flagged charges below this amount
        #[arg(long, default_value = "0")]
        min_amount: f64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run behavioral trigger detection for a month
    Triggers {
        /// Month to analyze as YYYY-MM (current month if omitted)
        #[arg(short, long)]
        month: Option<String>,

        /// Trailing months used as the spending baseline
        #[arg(long, default_value = "3")]
        lookback: u32,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Simulate paying off a revolving balance
    Payoff {
        /// Outstanding balance
        #[arg(long)]
        balance: f64,

        /// Fixed monthly payment
        #[arg(long)]
        payment: f64,

        /// Annual percentage rate, e.g. 36 for 36%
        #[arg(long)]
        apr: f64,

        /// Print the full schedule as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show upcoming bills from active subscriptions
    Bills {
        /// Look-ahead window in days
        #[arg(long, default_value = "30")]
        days: i64,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarize fees, taxes, and markups
    Fees {
        /// Fee keyword catalog TOML (built-in list if omitted)
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
pub enum SubscriptionsAction {
    /// List subscriptions (active by default)
    List {
        /// Include deactivated subscriptions
        #[arg(long)]
        all: bool,
    },

    /// Confirm a subscription so reconciliation never deactivates it
    Confirm {
        /// Subscription id
        id: i64,
    },
}
