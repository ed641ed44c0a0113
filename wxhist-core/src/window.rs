use std::str::FromStr;

use chrono::{Days, Months, NaiveDate};

/// One offset's `[start, end]` date range, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    offset: u32,
    start: NaiveDate,
    end: NaiveDate,
}

impl DateWindow {
    /// Offset-0 window. `None` when `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Option<Self> {
        (start <= end).then_some(Self {
            offset: 0,
            start,
            end,
        })
    }

    /// Moves both ends back by `years` calendar years, subtracting from the
    /// year field. Feb 29 lands on Feb 28 when the target year is not a leap year.
    pub fn shifted_back(&self, years: u32) -> Option<Self> {
        let months = Months::new(years.checked_mul(12)?);
        Some(Self {
            offset: self.offset.checked_add(years)?,
            start: self.start.checked_sub_months(months)?,
            end: self.end.checked_sub_months(months)?,
        })
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    /// Every calendar day in the window, in order.
    pub fn days(&self) -> impl Iterator<Item = NaiveDate> + use<> {
        let end = self.end;
        self.start.iter_days().take_while(move |day| *day <= end)
    }
}

impl std::fmt::Display for DateWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Windows for offsets `0..=years_back`, newest first.
///
/// Returns `None` when `start > end` or any shifted date falls outside the
/// representable calendar.
pub fn year_windows(start: NaiveDate, end: NaiveDate, years_back: u32) -> Option<Vec<DateWindow>> {
    let base = DateWindow::new(start, end)?;
    (0..=years_back)
        .map(|offset| base.shifted_back(offset))
        .collect()
}

/// A window ending today: the last `N` days (`7d`) or months (`3m`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePreset {
    Days(u32),
    Months(u32),
}

impl RangePreset {
    /// `[today - N, today]`. Month presets clamp to the end of a shorter month.
    pub fn window_ending(&self, today: NaiveDate) -> Option<DateWindow> {
        let start = match *self {
            RangePreset::Days(n) => today.checked_sub_days(Days::new(u64::from(n)))?,
            RangePreset::Months(n) => today.checked_sub_months(Months::new(n))?,
        };
        DateWindow::new(start, today)
    }
}

impl FromStr for RangePreset {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim().to_lowercase();
        let invalid = || {
            anyhow::anyhow!(
                "Invalid range '{value}'. Expected days or months, e.g. 7d, 30d, 3m, 12m."
            )
        };

        let (split, _) = trimmed.char_indices().last().ok_or_else(invalid)?;
        let (count, unit) = trimmed.split_at(split);
        let count: u32 = count.parse().map_err(|_| invalid())?;
        if count == 0 {
            return Err(invalid());
        }

        match unit {
            "d" => Ok(RangePreset::Days(count)),
            "m" => Ok(RangePreset::Months(count)),
            _ => Err(invalid()),
        }
    }
}

impl std::fmt::Display for RangePreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RangePreset::Days(n) => write!(f, "{n}d"),
            RangePreset::Months(n) => write!(f, "{n}m"),
        }
    }
}
