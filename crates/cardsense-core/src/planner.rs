//! Planning helpers: payoff simulation, due dates, upcoming bills

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::models::{Cadence, Subscription, SubscriptionKind};

/// Hard cap on the amortization loop
pub const MAX_PAYOFF_MONTHS: u32 = 600;

/// Round to 2 decimal places; applied at every simulation step so rounding
/// error compounds identically across runs
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Terminal state of a payoff simulation. Invalid inputs map to explicit
/// statuses instead of errors so the caller can render user-facing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoffStatus {
    Ok,
    Paid,
    InvalidPayment,
    PaymentTooLow,
    MaxMonthsExceeded,
}

impl PayoffStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Paid => "paid",
            Self::InvalidPayment => "invalid_payment",
            Self::PaymentTooLow => "payment_too_low",
            Self::MaxMonthsExceeded => "max_months_exceeded",
        }
    }
}

impl std::fmt::Display for PayoffStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One month of the amortization schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleRow {
    pub month: u32,
    pub date: NaiveDate,
    pub starting_balance: f64,
    pub interest: f64,
    pub payment: f64,
    pub principal: f64,
    /// Floored at zero for reporting
    pub ending_balance: f64,
}

/// Result of a payoff simulation; pure computation, no persistence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayoffPlan {
    pub status: PayoffStatus,
    pub months_to_payoff: Option<u32>,
    pub total_interest: Option<f64>,
    pub total_paid: Option<f64>,
    pub payoff_date: Option<NaiveDate>,
    pub schedule: Vec<ScheduleRow>,
}

impl PayoffPlan {
    fn terminal(status: PayoffStatus, schedule: Vec<ScheduleRow>) -> Self {
        Self {
            status,
            months_to_payoff: None,
            total_interest: None,
            total_paid: None,
            payoff_date: None,
            schedule,
        }
    }
}

/// Add months to a date, clamping invalid day numbers (Jan 31 + 1 → Feb 28)
pub fn add_months(base: NaiveDate, months: i32) -> NaiveDate {
    let month_index = base.month0() as i32 + months;
    let year = base.year() + month_index.div_euclid(12);
    let month = month_index.rem_euclid(12) as u32 + 1;
    let day = base.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("clamped day is valid")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        _ => {
            if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
                29
            } else {
                28
            }
        }
    }
}

/// Next due date for a recurring charge, rolled forward past `today`
pub fn next_due_date(
    last_seen: Option<NaiveDate>,
    cadence: Option<Cadence>,
    today: NaiveDate,
) -> Option<NaiveDate> {
    let last = last_seen?;
    let months = cadence?.months() as i32;

    let mut candidate = add_months(last, months);
    while candidate < today {
        candidate = add_months(candidate, months);
    }
    Some(candidate)
}

/// Simulate month-by-month payoff of a revolving balance.
///
/// Interest compounds monthly at `apr_percent / 100 / 12`. Every monetary
/// value is rounded to cents at each step, in the same order every time, so
/// results are reproducible. The simulation never raises: a non-positive
/// payment yields `invalid_payment`, a payment that cannot outrun first-month
/// interest yields `payment_too_low`, and a balance still standing after 600
/// months yields `max_months_exceeded`.
pub fn build_payoff_plan(
    balance: f64,
    monthly_payment: f64,
    apr_percent: f64,
    start_date: NaiveDate,
) -> PayoffPlan {
    if balance <= 0.0 {
        return PayoffPlan {
            status: PayoffStatus::Paid,
            months_to_payoff: Some(0),
            total_interest: Some(0.0),
            total_paid: Some(0.0),
            payoff_date: Some(start_date),
            schedule: Vec::new(),
        };
    }

    if monthly_payment <= 0.0 {
        return PayoffPlan::terminal(PayoffStatus::InvalidPayment, Vec::new());
    }

    let monthly_rate = apr_percent / 100.0 / 12.0;
    if monthly_rate > 0.0 {
        // Payment can never reduce principal: the loop would run forever
        let first_month_interest = round2(balance * monthly_rate);
        if monthly_payment <= first_month_interest {
            return PayoffPlan::terminal(PayoffStatus::PaymentTooLow, Vec::new());
        }
    }

    let mut balance = balance;
    let mut total_interest = 0.0;
    let mut total_paid = 0.0;
    let mut schedule = Vec::new();
    let mut current_date = start_date;

    for month in 1..=MAX_PAYOFF_MONTHS {
        let interest = round2(balance * monthly_rate);
        let balance_after_interest = balance + interest;
        let payment = round2(monthly_payment.min(balance_after_interest));
        let principal = round2(payment - interest);
        let ending_balance = round2(balance_after_interest - payment);

        total_interest += interest;
        total_paid += payment;

        schedule.push(ScheduleRow {
            month,
            date: current_date,
            starting_balance: balance,
            interest,
            payment,
            principal,
            ending_balance: ending_balance.max(0.0),
        });

        balance = ending_balance;
        if balance <= 0.0 {
            return PayoffPlan {
                status: PayoffStatus::Ok,
                months_to_payoff: Some(month),
                total_interest: Some(round2(total_interest)),
                total_paid: Some(round2(total_paid)),
                payoff_date: Some(current_date),
                schedule,
            };
        }

        current_date = add_months(current_date, 1);
    }

    PayoffPlan::terminal(PayoffStatus::MaxMonthsExceeded, schedule)
}

/// Reminder urgency for an upcoming bill
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderLevel {
    Urgent,
    Upcoming,
    Soon,
}

impl ReminderLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::Upcoming => "upcoming",
            Self::Soon => "soon",
        }
    }
}

/// A recurring charge expected within the bills window
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpcomingBill {
    pub subscription_id: i64,
    pub merchant: String,
    pub kind: SubscriptionKind,
    pub cadence: Cadence,
    pub amount: f64,
    pub next_due_date: NaiveDate,
    pub days_until_due: i64,
    pub reminder_level: ReminderLevel,
}

/// Project active subscriptions onto the next `window_days` days,
/// soonest and cheapest first
pub fn upcoming_bills(
    subscriptions: &[Subscription],
    today: NaiveDate,
    window_days: i64,
) -> Vec<UpcomingBill> {
    let window_end = today + chrono::Duration::days(window_days);
    let mut bills: Vec<UpcomingBill> = Vec::new();

    for sub in subscriptions.iter().filter(|s| s.active) {
        let Some(due) = next_due_date(sub.last_seen, Some(sub.cadence), today) else {
            continue;
        };
        if due > window_end {
            continue;
        }

        let days_left = (due - today).num_days();
        let reminder_level = if days_left <= 3 {
            ReminderLevel::Urgent
        } else if days_left <= 7 {
            ReminderLevel::Upcoming
        } else {
            ReminderLevel::Soon
        };

        bills.push(UpcomingBill {
            subscription_id: sub.id,
            merchant: sub.merchant.clone(),
            kind: sub.kind,
            cadence: sub.cadence,
            amount: sub.amount,
            next_due_date: due,
            days_until_due: days_left,
            reminder_level,
        });
    }

    bills.sort_by(|a, b| {
        a.days_until_due
            .cmp(&b.days_until_due)
            .then(a.amount.partial_cmp(&b.amount).expect("amounts are finite"))
    });
    bills
}
