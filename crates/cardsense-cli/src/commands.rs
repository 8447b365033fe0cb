//! CLI command implementations
//!
//! Each `cmd_*` function maps to one subcommand in `cli.rs`. They open the
//! database, call into cardsense-core, and render results for a terminal
//! (or as JSON with --json).

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Local, NaiveDate};
use serde::Deserialize;
use tracing::debug;

use cardsense_core::{
    analyze_fees, build_payoff_plan, db::Database, detect_anomalies, detect_subscriptions,
    detect_triggers, models::NewTransaction, plan_sync, upcoming_bills, FeeCatalog, PayoffStatus,
    ServiceCatalog,
};

/// Open the database, creating it (and running migrations) if missing
pub fn open_db(db_path: &Path) -> Result<Database> {
    let path_str = db_path
        .to_str()
        .context("Database path is not valid UTF-8")?;
    Database::new(path_str).context("Failed to open database")
}

pub fn cmd_init(db_path: &Path) -> Result<()> {
    println!("🔧 Initializing database at {}...", db_path.display());

    open_db(db_path)?;

    println!("✅ Database initialized successfully!");
    println!();
    println!("Next steps:");
    println!("  1. Import a statement: cardsense import --file statement.csv");
    println!("  2. Detect subscriptions: cardsense detect");

    Ok(())
}

/// One statement line as exported to CSV.
/// `merchant` is optional; detection works from the description without it.
#[derive(Debug, Deserialize)]
struct CsvRecord {
    date: String,
    description: String,
    amount: f64,
    #[serde(default)]
    merchant: Option<String>,
}

/// Statement dates appear as ISO or as the DD/MM/YYYY most Indian banks use
fn parse_statement_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .with_context(|| format!("Unrecognized date: {raw}"))
}

pub fn cmd_import(db_path: &Path, file: &Path) -> Result<()> {
    println!("📥 Importing {}...", file.display());

    let db = open_db(db_path)?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let mut batch = Vec::new();
    for record in reader.deserialize() {
        let record: CsvRecord = record.context("Malformed CSV row")?;
        let merchant = record
            .merchant
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        batch.push(NewTransaction {
            posted_date: parse_statement_date(&record.date)?,
            description: record.description.clone(),
            amount: record.amount,
            merchant_raw: Some(record.description),
            merchant_normalized: merchant,
            category_id: None,
        });
    }

    debug!(rows = batch.len(), file = %file.display(), "parsed statement csv");
    let result = db.insert_transactions(&batch)?;
    println!(
        "✅ Imported {} transactions ({} duplicates skipped)",
        result.inserted, result.duplicates
    );
    Ok(())
}

fn load_service_catalog(path: Option<&Path>) -> Result<ServiceCatalog> {
    match path {
        Some(p) => ServiceCatalog::load(p)
            .with_context(|| format!("Failed to load service catalog {}", p.display())),
        None => Ok(ServiceCatalog::default()),
    }
}

pub fn cmd_detect(db_path: &Path, services: Option<&Path>, json: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let catalog = load_service_catalog(services)?;

    let transactions = db.list_transactions()?;
    let candidates = detect_subscriptions(&transactions, &catalog);

    let plan = plan_sync(&candidates, &db.list_subscriptions(false)?);
    let new_count = db.sync_subscriptions(&plan)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&candidates)?);
        return Ok(());
    }

    println!("🔍 Detected {} recurring charges ({} new)", candidates.len(), new_count);
    for cand in &candidates {
        println!(
            "   {}: ₹{:.2} {} [{}] ({} txns, {} confidence)",
            cand.merchant,
            cand.amount,
            cand.cadence,
            cand.kind,
            cand.transaction_count,
            cand.confidence,
        );
    }
    Ok(())
}

pub fn cmd_subscriptions_list(db_path: &Path, all: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let subs = db.list_subscriptions(!all)?;

    if subs.is_empty() {
        println!("No subscriptions found. Run `cardsense detect` first.");
        return Ok(());
    }

    println!("📋 Subscriptions ({}):", subs.len());
    for sub in &subs {
        let status = match (sub.active, sub.user_confirmed) {
            (true, true) => "✓ confirmed",
            (true, false) => "active",
            (false, _) => "inactive",
        };
        let last_seen = sub
            .last_seen
            .map(|d| d.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "   [{}] {}: ₹{:.2} {} ({}, last seen {})",
            sub.id, sub.merchant, sub.amount, sub.cadence, status, last_seen
        );
    }
    Ok(())
}

pub fn cmd_subscriptions_confirm(db_path: &Path, id: i64) -> Result<()> {
    let db = open_db(db_path)?;
    db.confirm_subscription(id)?;
    println!("✅ Subscription {id} confirmed");
    Ok(())
}

pub fn cmd_anomalies(db_path: &Path, min_amount: f64, json: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let anomalies = detect_anomalies(&db.list_transactions()?, &db.list_categories()?, min_amount);

    if json {
        println!("{}", serde_json::to_string_pretty(&anomalies)?);
        return Ok(());
    }

    if anomalies.is_empty() {
        println!("No anomalies found.");
        return Ok(());
    }

    println!("🚩 {} anomalous charges:", anomalies.len());
    for a in &anomalies {
        println!(
            "   {} {}: ₹{:.2} in {} ({})",
            a.date, a.merchant, a.amount, a.category, a.severity
        );
    }
    Ok(())
}

/// Parse a YYYY-MM month argument to the first of that month
fn parse_month(raw: &str) -> Result<NaiveDate> {
    let (year, month) = raw
        .split_once('-')
        .with_context(|| format!("Expected YYYY-MM, got {raw}"))?;
    let year: i32 = year.parse().with_context(|| format!("Bad year in {raw}"))?;
    let month: u32 = month
        .parse()
        .with_context(|| format!("Bad month in {raw}"))?;
    NaiveDate::from_ymd_opt(year, month, 1).with_context(|| format!("Invalid month: {raw}"))
}

pub fn cmd_triggers(
    db_path: &Path,
    month: Option<&str>,
    lookback: u32,
    json: bool,
) -> Result<()> {
    let db = open_db(db_path)?;
    let current_month = match month {
        Some(raw) => parse_month(raw)?,
        None => {
            let today = Local::now().date_naive();
            NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
                .context("Invalid current date")?
        }
    };

    let triggers = detect_triggers(
        &db.list_transactions()?,
        &db.list_categories()?,
        current_month,
        lookback,
    );

    if json {
        println!("{}", serde_json::to_string_pretty(&triggers)?);
        return Ok(());
    }

    if triggers.is_empty() {
        println!(
            "No spending triggers for {}.",
            current_month.format("%Y-%m")
        );
        return Ok(());
    }

    println!(
        "⚡ {} triggers for {}:",
        triggers.len(),
        current_month.format("%Y-%m")
    );
    for t in &triggers {
        let icon = match t.severity {
            cardsense_core::Severity::Alert => "🔴",
            cardsense_core::Severity::Warning => "🟡",
            cardsense_core::Severity::Info => "🔵",
        };
        println!("   {icon} {}: {}", t.title, t.reason);
    }
    Ok(())
}

pub fn cmd_payoff(balance: f64, payment: f64, apr: f64, json: bool) -> Result<()> {
    let today = Local::now().date_naive();
    let plan = build_payoff_plan(balance, payment, apr, today);

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    match plan.status {
        PayoffStatus::Paid => println!("✅ Nothing to pay off."),
        PayoffStatus::InvalidPayment => bail!("Monthly payment must be positive"),
        PayoffStatus::PaymentTooLow => bail!(
            "₹{payment:.2}/mo does not cover the first month's interest at {apr}% APR; the balance would grow forever"
        ),
        PayoffStatus::MaxMonthsExceeded => {
            bail!("Payoff takes longer than 50 years; increase the payment")
        }
        PayoffStatus::Ok => {
            let months = plan.months_to_payoff.unwrap_or(0);
            println!("💳 Payoff plan for ₹{balance:.2} at {apr}% APR:");
            println!("   Monthly payment: ₹{payment:.2}");
            println!("   Months to payoff: {months} ({} years)", months / 12);
            if let Some(interest) = plan.total_interest {
                println!("   Total interest: ₹{interest:.2}");
            }
            if let Some(date) = plan.payoff_date {
                println!("   Debt-free on: {date}");
            }
        }
    }
    Ok(())
}

pub fn cmd_bills(db_path: &Path, days: i64, json: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let today = Local::now().date_naive();
    let bills = upcoming_bills(&db.list_subscriptions(true)?, today, days);

    if json {
        println!("{}", serde_json::to_string_pretty(&bills)?);
        return Ok(());
    }

    if bills.is_empty() {
        println!("No bills due in the next {days} days.");
        return Ok(());
    }

    let total: f64 = bills.iter().map(|b| b.amount).sum();
    println!("📅 {} bills due in the next {days} days (₹{total:.2} total):", bills.len());
    for bill in &bills {
        let icon = match bill.reminder_level {
            cardsense_core::ReminderLevel::Urgent => "🔴",
            cardsense_core::ReminderLevel::Upcoming => "🟡",
            cardsense_core::ReminderLevel::Soon => "🟢",
        };
        println!(
            "   {icon} {}: ₹{:.2} due {} (in {} days)",
            bill.merchant, bill.amount, bill.next_due_date, bill.days_until_due
        );
    }
    Ok(())
}

pub fn cmd_fees(db_path: &Path, catalog: Option<&Path>, json: bool) -> Result<()> {
    let db = open_db(db_path)?;
    let catalog = match catalog {
        Some(p) => FeeCatalog::load(p)
            .with_context(|| format!("Failed to load fee catalog {}", p.display()))?,
        None => FeeCatalog::default(),
    };

    let report = analyze_fees(&db.list_transactions()?, &catalog);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.count == 0 {
        println!("No fees or taxes found. 🎉");
        return Ok(());
    }

    println!("💸 ₹{:.2} in fees across {} charges:", report.total, report.count);
    println!("   Forex/Markup:  ₹{:.2}", report.breakdown.forex_markup);
    println!("   GST/Taxes:     ₹{:.2}", report.breakdown.gst_taxes);
    println!("   Late/Interest: ₹{:.2}", report.breakdown.late_interest);
    println!("   Other:         ₹{:.2}", report.breakdown.other);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statement_dates_parse_both_formats() {
        assert_eq!(
            parse_statement_date("2026-02-15").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()
        );
        assert_eq!(
            parse_statement_date("15/02/2026").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 15).unwrap()
        );
        assert!(parse_statement_date("Feb 15").is_err());
    }

    #[test]
    fn month_argument_parses() {
        assert_eq!(
            parse_month("2026-02").unwrap(),
            NaiveDate::from_ymd_opt(2026, 2, 1).unwrap()
        );
        assert!(parse_month("2026").is_err());
        assert!(parse_month("2026-13").is_err());
    }
}
