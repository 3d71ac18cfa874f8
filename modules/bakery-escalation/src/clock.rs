//! Time source and per-category deadline math.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, Utc};

use bakery_common::{
    BakingStatus, EscalationCategory, EscalationPolicy, Order, OrderStatus,
};
use bakery_store::OverdueQuery;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// An order found past its stage deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overdue {
    pub deadline: DateTime<Utc>,
    /// Dedupe bucket: one notification per order and category per day.
    pub bucket: NaiveDate,
}

/// Applies the escalation policy's windows and business calendar to orders.
#[derive(Clone)]
pub struct StageClock {
    clock: Arc<dyn Clock>,
    policy: EscalationPolicy,
}

impl StageClock {
    pub fn new(clock: Arc<dyn Clock>, policy: EscalationPolicy) -> Self {
        Self { clock, policy }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    fn window(&self, category: EscalationCategory) -> Duration {
        match category {
            EscalationCategory::Pickup => self.policy.pickup_window(),
            EscalationCategory::Delivery => self.policy.delivery_window(),
            EscalationCategory::Baking => self.policy.baking_sla(),
        }
    }

    /// When `order` stops being on time in `category`, or `None` if the
    /// category does not apply to the order's current stage.
    pub fn deadline(&self, category: EscalationCategory, order: &Order) -> Option<DateTime<Utc>> {
        match category {
            EscalationCategory::Pickup => {
                if order.status != OrderStatus::ReadyForPickup {
                    return None;
                }
                match order.expected_pickup_date {
                    Some(date) => end_of_day(date),
                    None => order.ready_for_pickup_at.map(|t| t + self.window(category)),
                }
            }
            EscalationCategory::Delivery => {
                if order.status != OrderStatus::OutForDelivery {
                    return None;
                }
                order.out_for_delivery_at.map(|t| t + self.window(category))
            }
            EscalationCategory::Baking => {
                if order.status != OrderStatus::Baking
                    || order.baking_status == Some(BakingStatus::Done)
                {
                    return None;
                }
                order.baking_started_at.map(|t| t + self.window(category))
            }
        }
    }

    /// `None` also for an order already escalated in today's bucket.
    pub fn overdue(&self, category: EscalationCategory, order: &Order) -> Option<Overdue> {
        let now = self.now();
        let bucket = now.date_naive();
        if order.last_overdue_bucket == Some(bucket) {
            return None;
        }
        let deadline = self.deadline(category, order)?;
        (now > deadline).then_some(Overdue { deadline, bucket })
    }

    /// Store pre-filter equivalent to `deadline(..) < now`.
    pub fn candidates_query(&self, category: EscalationCategory, limit: usize) -> OverdueQuery {
        let now = self.now();
        OverdueQuery {
            category,
            entered_before: now - self.window(category),
            pickup_date_before: now.date_naive(),
            bucket: now.date_naive(),
            limit,
        }
    }

    /// The first open day after `date`.
    pub fn next_business_day(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date.succ_opt().unwrap_or(date);
        // A full week of closed days is rejected by policy validation; the
        // bound keeps a hand-built policy from looping forever.
        for _ in 0..7 {
            if !self.policy.closed_weekdays.contains(&next.weekday()) {
                break;
            }
            next = next.succ_opt().unwrap_or(next);
        }
        next
    }

    /// New expected pickup date for an uncollected order: the business day
    /// after its current effective date, and never before today.
    pub fn reschedule_date(&self, order: &Order) -> Option<NaiveDate> {
        let effective = order.effective_pickup_date()?;
        let today = self.today();
        let yesterday = today.pred_opt().unwrap_or(today);
        Some(self.next_business_day(effective.max(yesterday)))
    }
}

fn end_of_day(date: NaiveDate) -> Option<DateTime<Utc>> {
    Some(date.succ_opt()?.and_time(NaiveTime::MIN).and_utc())
}
