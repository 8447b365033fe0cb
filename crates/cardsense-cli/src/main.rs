//! Cardsense CLI - Credit-card statement insight engine
//!
//! Usage:
//!   cardsense init                      Initialize database
//!   cardsense import --file CSV         Import statement transactions
//!   cardsense detect                    Detect and sync recurring charges
//!   cardsense anomalies                 Flag unusual spending
//!   cardsense triggers --month 2026-02  Behavioral spending triggers
//!   cardsense payoff --balance 50000 --payment 5000 --apr 36
//!   cardsense bills --days 30           Upcoming subscription charges
//!   cardsense fees                      Fees, taxes, and markups

mod cli;
mod commands;


use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db),
        Commands::Import { file } => commands::cmd_import(&cli.db, &file),
        Commands::Detect { services, json } => {
            commands::cmd_detect(&cli.db, services.as_deref(), json)
        }
        Commands::Subscriptions { action } => match action {
            None | Some(SubscriptionsAction::List { all: false }) => {
                commands::cmd_subscriptions_list(&cli.db, false)
            }
            Some(SubscriptionsAction::List { all: true }) => {
                commands::cmd_subscriptions_list(&cli.db, true)
            }
            Some(SubscriptionsAction::Confirm { id }) => {
                commands::cmd_subscriptions_confirm(&cli.db, id)
            }
        },
        Commands::Anomalies { min_amount, json } => {
            commands::cmd_anomalies(&cli.db, min_amount, json)
        }
        Commands::Triggers {
            month,
            lookback,
            json,
        } => commands::cmd_triggers(&cli.db, month.as_deref(), lookback, json),
        Commands::Payoff {
            balance,
            payment,
            apr,
            json,
        } => commands::cmd_payoff(balance, payment, apr, json),
        Commands::Bills { days, json } => commands::cmd_bills(&cli.db, days, json),
        Commands::Fees { catalog, json } => commands::cmd_fees(&cli.db, catalog.as_deref(), json),
    }
}
