//! Schedule expressions for the time-trigger service.
//!
//! Shape: `cron(minutes hours day-of-month month day-of-week year)`, e.g.
//! `cron(00 7 ? * MON-FRI *)`. Exactly one of day-of-month / day-of-week must be
//! `?`. Day-of-week numbering is 1=SUN .. 7=SAT.

use crate::Result;
use crate::error::BuildError;

use chrono_tz::Tz;
use regex::Regex;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

pub const DAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(into = "String")]
pub struct CronExpr {
    minutes: String,
    hours: String,
    day_of_month: String,
    month: String,
    day_of_week: String,
    year: String,
}

impl CronExpr {
    pub fn parse(s: &str) -> Result<Self> {
        const CRON_RE: &str = r"^cron\(\s*(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s+(\S+)\s*\)$";
        let re = Regex::new(CRON_RE)?;

        let invalid = |reason: String| BuildError::InvalidCron {
            value: s.to_string(),
            reason,
        };

        let caps = re
            .captures(s.trim())
            .ok_or_else(|| invalid("expected cron(<min> <hour> <dom> <month> <dow> <year>)".into()))?;
        let field = |i: usize| caps.get(i).map_or_else(String::new, |m| m.as_str().to_string());

        let expr = CronExpr {
            minutes: field(1),
            hours: field(2),
            day_of_month: field(3),
            month: field(4),
            day_of_week: field(5),
            year: field(6),
        };

        let dom_any = expr.day_of_month == "?";
        let dow_any = expr.day_of_week == "?";
        if dom_any == dow_any {
            return Err(invalid(
                "exactly one of day-of-month and day-of-week must be '?'".into(),
            )
            .into());
        }

        for (rule, value) in expr.fields() {
            if value == "?" && rule.allows_any {
                continue;
            }
            rule.check(value).map_err(invalid)?;
        }

        Ok(expr)
    }

    fn fields(&self) -> [(&'static FieldRule, &str); 6] {
        [
            (&MINUTES, &self.minutes),
            (&HOURS, &self.hours),
            (&DAY_OF_MONTH, &self.day_of_month),
            (&MONTH, &self.month),
            (&DAY_OF_WEEK, &self.day_of_week),
            (&YEAR, &self.year),
        ]
    }

    /// Days of the week (1=SUN .. 7=SAT) on which this expression fires, if
    /// that can be known without a calendar. `None` for month- or date-dependent
    /// expressions (`L`, `#`, steps, specific days of month, specific months).
    pub fn days_of_week(&self) -> Option<BTreeSet<u8>> {
        if self.month != "*" {
            return None;
        }
        if self.day_of_week == "?" {
            return (self.day_of_month == "*").then(|| (1..=7).collect());
        }
        if self.day_of_week == "*" {
            return Some((1..=7).collect());
        }

        let mut days = BTreeSet::new();
        for item in self.day_of_week.split(',') {
            match item.split_once('-') {
                Some((a, b)) => {
                    let (a, b) = (day_number(a)?, day_number(b)?);
                    if a <= b {
                        days.extend(a..=b);
                    } else {
                        days.extend(a..=7);
                        days.extend(1..=b);
                    }
                }
                None => {
                    days.insert(day_number(item)?);
                }
            }
        }
        Some(days)
    }
}

pub const MONTH_NAMES: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// Value range and accepted tokens of one cron field.
///
/// Every comma-separated item is either a field-specific token (`L`, `15W`,
/// `6#3`, ...) or `<base>[/<step>]` where base is `*`, a value, or `a-b`.
struct FieldRule {
    name: &'static str,
    min: u32,
    max: u32,
    /// Symbolic values; `names[0]` stands for `min`.
    names: &'static [&'static str],
    /// Whether the whole field may be `?`.
    allows_any: bool,
    special: fn(&FieldRule, &str) -> bool,
}

static MINUTES: FieldRule = FieldRule {
    name: "minutes",
    min: 0,
    max: 59,
    names: &[],
    allows_any: false,
    special: no_special,
};

static HOURS: FieldRule = FieldRule {
    name: "hours",
    min: 0,
    max: 23,
    names: &[],
    allows_any: false,
    special: no_special,
};

static DAY_OF_MONTH: FieldRule = FieldRule {
    name: "day-of-month",
    min: 1,
    max: 31,
    names: &[],
    allows_any: true,
    special: day_of_month_special,
};

static MONTH: FieldRule = FieldRule {
    name: "month",
    min: 1,
    max: 12,
    names: &MONTH_NAMES,
    allows_any: false,
    special: no_special,
};

static DAY_OF_WEEK: FieldRule = FieldRule {
    name: "day-of-week",
    min: 1,
    max: 7,
    names: &DAY_NAMES,
    allows_any: true,
    special: day_of_week_special,
};

static YEAR: FieldRule = FieldRule {
    name: "year",
    min: 1970,
    max: 2199,
    names: &[],
    allows_any: false,
    special: no_special,
};

impl FieldRule {
    fn value(&self, token: &str) -> Option<u32> {
        if let Ok(n) = token.parse::<u32>() {
            return (self.min..=self.max).contains(&n).then_some(n);
        }
        let upper = token.to_ascii_uppercase();
        self.names
            .iter()
            .position(|n| *n == upper)
            .and_then(|i| u32::try_from(i).ok())
            .map(|i| self.min + i)
    }

    fn check(&self, field: &str) -> std::result::Result<(), String> {
        for item in field.split(',') {
            if (self.special)(self, item) {
                continue;
            }

            let (base, step) = match item.split_once('/') {
                Some((base, step)) => (base, Some(step)),
                None => (item, None),
            };
            if let Some(step) = step {
                if !step.parse::<u32>().is_ok_and(|n| (1..=self.max).contains(&n)) {
                    return Err(format!(
                        "{} step '{}' must be a number between 1 and {}",
                        self.name, step, self.max
                    ));
                }
            }

            let base_ok = base == "*"
                || match base.split_once('-') {
                    Some((a, b)) => self.value(a).is_some() && self.value(b).is_some(),
                    None => self.value(base).is_some(),
                };
            if !base_ok {
                return Err(format!(
                    "{} item '{}' is outside {}-{}{}",
                    self.name,
                    item,
                    self.min,
                    self.max,
                    match (self.names.first(), self.names.last()) {
                        (Some(first), Some(last)) => format!(" or {}-{}", first, last),
                        _ => String::new(),
                    }
                ));
            }
        }
        Ok(())
    }
}

fn no_special(_: &FieldRule, _: &str) -> bool {
    false
}

/// `L` (last day), `LW` (last weekday), `<n>W` (weekday nearest n).
fn day_of_month_special(rule: &FieldRule, item: &str) -> bool {
    item == "L"
        || item == "LW"
        || item
            .strip_suffix('W')
            .is_some_and(|n| n.parse::<u32>().is_ok() && rule.value(n).is_some())
}

/// `L` (last day of week), `<d>L` (last such day of the month), `<d>#<n>`.
fn day_of_week_special(rule: &FieldRule, item: &str) -> bool {
    if item == "L" {
        return true;
    }
    if let Some(day) = item.strip_suffix('L') {
        return rule.value(day).is_some();
    }
    if let Some((day, nth)) = item.split_once('#') {
        return rule.value(day).is_some()
            && nth.parse::<u32>().is_ok_and(|n| (1..=5).contains(&n));
    }
    false
}

fn day_number(token: &str) -> Option<u8> {
    DAY_OF_WEEK.value(token).and_then(|n| u8::try_from(n).ok())
}

pub fn day_name(day: u8) -> &'static str {
    DAY_NAMES
        .get(usize::from(day.saturating_sub(1)))
        .copied()
        .unwrap_or("?")
}

impl fmt::Display for CronExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cron({} {} {} {} {} {})",
            self.minutes, self.hours, self.day_of_month, self.month, self.day_of_week, self.year
        )
    }
}

impl From<CronExpr> for String {
    fn from(c: CronExpr) -> Self {
        c.to_string()
    }
}

/// IANA zone name as accepted by the time-trigger service; must exist in the
/// tz database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Timezone(String);

impl Timezone {
    pub fn parse(s: &str) -> Result<Self> {
        s.parse::<Tz>()
            .map_err(|_| BuildError::InvalidTimezone(s.to_string()))?;
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Timezone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
