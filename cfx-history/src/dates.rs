//! Date-sequence generators: which timestamps an aggregation run samples
//!
//! Computed generators start at the first day of the start date's month and always
//! end with "now" and "now + 1 day" so the most recent boundary is sampled.
//! "Now" is the local wall clock unless pinned with `with_now`.

use crate::types::{HistoryError, Result, Timestamp};
use chrono::{Datelike, Duration, Months, NaiveTime};

/// Policy producing the ordered sample timestamps of a query
pub trait DatesGenerator: Send + Sync {
    /// Compute the sample timestamps for a run whose earliest entity starts at `start`
    fn dates_since(&self, start: Timestamp) -> Vec<Timestamp>;
}

/// Calendar step: months first, then days
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub months: u32,
    pub days: u32,
}

impl Step {
    pub fn new(months: u32, days: u32) -> Self {
        Self { months, days }
    }

    pub fn months(months: u32) -> Self {
        Self::new(months, 0)
    }

    pub fn weeks(weeks: u32) -> Self {
        Self::new(0, weeks * 7)
    }

    pub fn days(days: u32) -> Self {
        Self::new(0, days)
    }

    pub fn is_zero(&self) -> bool {
        self.months == 0 && self.days == 0
    }

    /// Advance `date` by this step; `None` past the representable range
    pub fn apply(&self, date: Timestamp) -> Option<Timestamp> {
        date.checked_add_months(Months::new(self.months))?
            .checked_add_signed(Duration::days(i64::from(self.days)))
    }
}

/// First day of the month of `date`, at midnight
pub fn first_of_month(date: Timestamp) -> Timestamp {
    let day = date.date();
    day.with_day(1).unwrap_or(day).and_time(NaiveTime::MIN)
}

fn local_now() -> Timestamp {
    chrono::Local::now().naive_local()
}

/// Append `now` and `now + 1 day` unless they are already sampled
fn with_now_and_tomorrow(mut dates: Vec<Timestamp>, now: Timestamp) -> Vec<Timestamp> {
    if !dates.contains(&now) {
        dates.push(now);
    }
    let tomorrow = now + Duration::days(1);
    if !dates.contains(&tomorrow) {
        dates.push(tomorrow);
    }
    dates
}

/// Returns a literal list, ignoring the start date (deterministic runs and tests)
#[derive(Debug, Clone)]
pub struct FixedListGenerator {
    dates: Vec<Timestamp>,
}

impl FixedListGenerator {
    pub fn new(dates: Vec<Timestamp>) -> Self {
        Self { dates }
    }
}

impl DatesGenerator for FixedListGenerator {
    fn dates_since(&self, _start: Timestamp) -> Vec<Timestamp> {
        self.dates.clone()
    }
}

/// One sample every `step`, from the start month up to now
#[derive(Debug, Clone)]
pub struct ConstantIntervalGenerator {
    step: Step,
    now: Option<Timestamp>,
}

impl ConstantIntervalGenerator {
    /// Fails with [`HistoryError::InvalidDateStep`] for a zero-length step
    pub fn new(step: Step) -> Result<Self> {
        if step.is_zero() {
            return Err(HistoryError::InvalidDateStep);
        }
        Ok(Self { step, now: None })
    }

    /// Builder method: pin "now" instead of reading the clock
    pub fn with_now(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }
}

impl DatesGenerator for ConstantIntervalGenerator {
    fn dates_since(&self, start: Timestamp) -> Vec<Timestamp> {
        let now = self.now.unwrap_or_else(local_now);
        let mut dates = Vec::new();

        let mut current = first_of_month(start);
        while current <= now {
            dates.push(current);
            match self.step.apply(current) {
                Some(next) if next > current => current = next,
                _ => break,
            }
        }

        let dates = with_now_and_tomorrow(dates, now);
        log::info!("Number of dates since {}: {}", start, dates.len());
        dates
    }
}

/// Coarse samples far in the past, daily samples near now
#[derive(Debug, Clone, Default)]
pub struct DecreasingIntervalGenerator {
    now: Option<Timestamp>,
}

impl DecreasingIntervalGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: pin "now" instead of reading the clock
    pub fn with_now(mut self, now: Timestamp) -> Self {
        self.now = Some(now);
        self
    }

    /// Step to use for a sample `days_before_now` days in the past
    fn step_for(days_before_now: i64) -> Step {
        match days_before_now {
            d if d > 365 * 3 => Step::months(3),
            d if d > 365 * 2 => Step::months(2),
            d if d > 365 => Step::months(1),
            d if d > 180 => Step::weeks(2),
            d if d > 30 => Step::weeks(1),
            d if d > 15 => Step::days(3),
            d if d > 7 => Step::days(2),
            _ => Step::days(1),
        }
    }
}

impl DatesGenerator for DecreasingIntervalGenerator {
    fn dates_since(&self, start: Timestamp) -> Vec<Timestamp> {
        let now = self.now.unwrap_or_else(local_now);
        let mut dates = Vec::new();

        let mut current = first_of_month(start);
        while current <= now {
            dates.push(current);
            let step = Self::step_for((now - current).num_days());
            match step.apply(current) {
                Some(next) => current = next,
                None => break,
            }
        }

        let dates = with_now_and_tomorrow(dates, now);
        log::info!("Number of dates since {}: {}", start, dates.len());
        dates
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> Timestamp {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_first_of_month() {
        let date = NaiveDate::from_ymd_opt(2021, 7, 19)
            .unwrap()
            .and_hms_opt(16, 30, 5)
            .unwrap();
        assert_eq!(first_of_month(date), at(2021, 7, 1));
    }

    #[test]
    fn test_fixed_list_is_verbatim() {
        let dates = vec![at(2022, 1, 1), at(2021, 1, 1)];
        let generator = FixedListGenerator::new(dates.clone());
        assert_eq!(generator.dates_since(at(1990, 1, 1)), dates);
    }

    #[test]
    fn test_zero_step_is_rejected() {
        let result = ConstantIntervalGenerator::new(Step::new(0, 0));
        assert!(matches!(result, Err(HistoryError::InvalidDateStep)));
    }

    #[test]
    fn test_constant_interval() {
        let now = NaiveDate::from_ymd_opt(2020, 6, 10)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let generator = ConstantIntervalGenerator::new(Step::months(1))
            .unwrap()
            .with_now(now);

        let start = NaiveDate::from_ymd_opt(2020, 3, 15)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        assert_eq!(
            generator.dates_since(start),
            vec![
                at(2020, 3, 1),
                at(2020, 4, 1),
                at(2020, 5, 1),
                at(2020, 6, 1),
                now,
                now + Duration::days(1),
            ]
        );
    }

    #[test]
    fn test_month_step_keeps_end_of_month_sane() {
        let step = Step::months(1);
        let jan_31 = NaiveDate::from_ymd_opt(2021, 1, 31)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap();
        assert_eq!(step.apply(jan_31), Some(at(2021, 2, 28)));
    }

    #[test]
    fn test_decreasing_bands_near_now() {
        let now = at(2024, 1, 1);
        let generator = DecreasingIntervalGenerator::new().with_now(now);
        let dates = generator.dates_since(at(2023, 12, 20));

        assert_eq!(
            &dates[..9],
            &[
                at(2023, 12, 1),
                at(2023, 12, 8),
                at(2023, 12, 11),
                at(2023, 12, 14),
                at(2023, 12, 17),
                at(2023, 12, 19),
                at(2023, 12, 21),
                at(2023, 12, 23),
                at(2023, 12, 25),
            ]
        );
        // Daily to the end, now already sampled, tomorrow appended
        assert_eq!(dates.len(), 17);
        assert_eq!(dates[15], now);
        assert_eq!(dates[16], at(2024, 1, 2));
    }

    #[test]
    fn test_decreasing_since_now_and_long_ago() {
        let generator = DecreasingIntervalGenerator::new();
        let now = local_now();
        assert!(generator.dates_since(now).len() > 1);
        assert!(generator.dates_since(at(2000, 1, 4)).len() > 100);
    }

    #[test]
    fn test_dates_are_increasing() {
        let generator = DecreasingIntervalGenerator::new().with_now(at(2024, 5, 17));
        let dates = generator.dates_since(at(2015, 2, 3));
        assert!(dates.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
