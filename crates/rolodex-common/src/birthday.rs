//! Upcoming-birthday window.
//!
//! A window covers seven consecutive calendar days starting at a reference
//! date, compared on (month, day) only. When the seven days run past the end
//! of the reference month the window is split into two day ranges, one per
//! month, so no invalid date (e.g. "January 35") is ever built.

use crate::models::contact::Contact;
use chrono::{Datelike, Duration, NaiveDate};
use uuid::Uuid;

/// Number of days covered by a window, the reference day included.
pub const WINDOW_DAYS: i64 = 7;

/// Inclusive range of days within one month
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub month: u32,
    pub first_day: u32,
    pub last_day: u32,
}

impl DayRange {
    pub fn contains(&self, month: u32, day: u32) -> bool {
        month == self.month && (self.first_day..=self.last_day).contains(&day)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BirthdayWindow {
    start: NaiveDate,
    ranges: Vec<DayRange>,
}

impl BirthdayWindow {
    /// Window of [`WINDOW_DAYS`] days beginning at `today`.
    pub fn starting(today: NaiveDate) -> Self {
        let last_day = last_day_of_month(today);
        let days_until_end_of_month = (last_day - today).num_days();

        let mut ranges = Vec::with_capacity(2);
        if days_until_end_of_month >= WINDOW_DAYS {
            ranges.push(DayRange {
                month: today.month(),
                first_day: today.day(),
                last_day: today.day() + (WINDOW_DAYS - 1) as u32,
            });
        } else {
            ranges.push(DayRange {
                month: today.month(),
                first_day: today.day(),
                last_day: last_day.day(),
            });
            // Days of the window left over once this month is exhausted.
            let spill = WINDOW_DAYS - 1 - days_until_end_of_month;
            if spill >= 1 {
                ranges.push(DayRange {
                    month: next_month(today.month()),
                    first_day: 1,
                    last_day: spill as u32,
                });
            }
        }

        Self {
            start: today,
            ranges,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    /// Last day covered by the window
    pub fn end(&self) -> NaiveDate {
        self.start
            .checked_add_signed(Duration::days(WINDOW_DAYS - 1))
            .unwrap_or(NaiveDate::MAX)
    }

    /// One range, or two when the window crosses into the next month
    pub fn ranges(&self) -> &[DayRange] {
        &self.ranges
    }

    pub fn crosses_month(&self) -> bool {
        self.ranges.len() > 1
    }

    pub fn contains(&self, month: u32, day: u32) -> bool {
        self.ranges.iter().any(|r| r.contains(month, day))
    }

    /// Whether a birth date falls in the window. Missing dates never match.
    pub fn matches(&self, dob: Option<NaiveDate>) -> bool {
        dob.is_some_and(|d| self.contains(d.month(), d.day()))
    }
}

/// Contacts owned by `owner_id` whose birthday falls in the week starting at `today`.
pub fn upcoming_birthdays(contacts: &[Contact], owner_id: Uuid, today: NaiveDate) -> Vec<Contact> {
    let window = BirthdayWindow::starting(today);
    contacts
        .iter()
        .filter(|c| c.user_id == owner_id && window.matches(c.dob))
        .cloned()
        .collect()
}

fn next_month(month: u32) -> u32 {
    if month == 12 {
        1
    } else {
        month + 1
    }
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeSet;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn contact(owner: Uuid, dob: Option<NaiveDate>) -> Contact {
        Contact {
            id: Uuid::new_v4(),
            user_id: owner,
            first_name: "First".to_string(),
            last_name: "Last".to_string(),
            email: format!("{}@example.com", Uuid::new_v4()),
            phone: "0123456789".to_string(),
            dob,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_mid_month_single_range() {
        let window = BirthdayWindow::starting(date(2024, 6, 10));
        assert!(!window.crosses_month());
        assert_eq!(
            window.ranges(),
            &[DayRange {
                month: 6,
                first_day: 10,
                last_day: 16
            }]
        );
        assert!(window.contains(6, 10));
        assert!(window.contains(6, 16));
        assert!(!window.contains(6, 17));
        assert!(!window.contains(6, 9));
        assert!(!window.contains(7, 12));
    }

    #[test]
    fn test_december_28_crosses_into_january() {
        let window = BirthdayWindow::starting(date(2024, 12, 28));
        assert!(window.crosses_month());
        assert!(window.matches(Some(date(1990, 12, 29))));
        assert!(window.matches(Some(date(1985, 1, 2))));
        assert!(!window.matches(Some(date(1985, 1, 10))));
    }

    #[test]
    fn test_december_30_covers_new_year() {
        let window = BirthdayWindow::starting(date(2023, 12, 30));
        assert!(window.contains(12, 30));
        assert!(window.contains(12, 31));
        for day in 1..=5 {
            assert!(window.contains(1, day), "Jan {} should be in window", day);
        }
        assert!(!window.contains(1, 6));
        assert_eq!(window.end(), date(2024, 1, 5));
    }

    #[test]
    fn test_leap_year_includes_feb_29() {
        let window = BirthdayWindow::starting(date(2024, 2, 23));
        assert!(window.matches(Some(date(2000, 2, 29))));
        assert!(!window.contains(3, 1));
    }

    #[test]
    fn test_non_leap_february_spills_into_march() {
        let window = BirthdayWindow::starting(date(2023, 2, 23));
        assert!(!window.contains(2, 29));
        assert!(window.contains(2, 28));
        assert!(window.contains(3, 1));
        assert!(!window.contains(3, 2));
    }

    #[test]
    fn test_six_days_before_month_end_stays_in_month() {
        // Jun 24 + 6 days = Jun 30
        let window = BirthdayWindow::starting(date(2024, 6, 24));
        assert_eq!(window.ranges().len(), 1);
        assert_eq!(window.ranges()[0].last_day, 30);
    }

    #[test]
    fn test_last_day_of_month_spills_six_days() {
        let window = BirthdayWindow::starting(date(2024, 4, 30));
        assert_eq!(
            window.ranges(),
            &[
                DayRange {
                    month: 4,
                    first_day: 30,
                    last_day: 30
                },
                DayRange {
                    month: 5,
                    first_day: 1,
                    last_day: 6
                }
            ]
        );
    }

    #[test]
    fn test_ranges_match_seven_consecutive_days_for_every_reference_date() {
        for year in [2023, 2024] {
            let mut today = date(year, 1, 1);
            while today.year() == year {
                let window = BirthdayWindow::starting(today);

                let expected: BTreeSet<(u32, u32)> = (0..WINDOW_DAYS)
                    .map(|offset| today + Duration::days(offset))
                    .map(|d| (d.month(), d.day()))
                    .collect();
                let actual: BTreeSet<(u32, u32)> = window
                    .ranges()
                    .iter()
                    .flat_map(|r| (r.first_day..=r.last_day).map(move |d| (r.month, d)))
                    .collect();

                assert_eq!(actual, expected, "window mismatch for {}", today);
                today = today.succ_opt().unwrap();
            }
        }
    }

    #[test]
    fn test_missing_birth_date_never_matches() {
        let owner = Uuid::new_v4();
        let contacts = vec![contact(owner, None)];
        let mut today = date(2024, 1, 1);
        while today.year() == 2024 {
            assert!(upcoming_birthdays(&contacts, owner, today).is_empty());
            today = today.succ_opt().unwrap();
        }
    }

    #[test]
    fn test_upcoming_birthdays_filters_by_owner() {
        let owner = Uuid::new_v4();
        let stranger = Uuid::new_v4();
        let mine = contact(owner, Some(date(1990, 12, 29)));
        let theirs = contact(stranger, Some(date(1990, 12, 29)));
        let later = contact(owner, Some(date(1990, 1, 10)));
        let next_year = contact(owner, Some(date(1975, 1, 2)));

        let found = upcoming_birthdays(
            &[mine.clone(), theirs, later, next_year.clone()],
            owner,
            date(2024, 12, 28),
        );
        assert_eq!(found, vec![mine, next_year]);
    }
}
