use std::{fmt, str::FromStr};

use crate::{CommunityId, Error, Time, UserId};

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum TimeWindow {
    Today,
    Week,
    Month,
    All,
}

impl FromStr for TimeWindow {
    type Err = Error;

    fn from_str(s: &str) -> Result<TimeWindow, Error> {
        match s {
            "today" => Ok(TimeWindow::Today),
            "week" => Ok(TimeWindow::Week),
            "month" => Ok(TimeWindow::Month),
            "all" => Ok(TimeWindow::All),
            _ => Err(Error::InvalidFilterSpec(String::from(s))),
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::Today => write!(f, "today"),
            TimeWindow::Week => write!(f, "week"),
            TimeWindow::Month => write!(f, "month"),
            TimeWindow::All => write!(f, "all"),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub enum SortMode {
    Hot,
    New,
    Top,
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<SortMode, Error> {
        match s {
            "hot" => Ok(SortMode::Hot),
            "new" => Ok(SortMode::New),
            "top" => Ok(SortMode::Top),
            _ => Err(Error::InvalidFilterSpec(String::from(s))),
        }
    }
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SortMode::Hot => write!(f, "hot"),
            SortMode::New => write!(f, "new"),
            SortMode::Top => write!(f, "top"),
        }
    }
}

/// Per-request listing configuration; never persisted.
///
/// Unrecognized window or sort tokens are rejected in `from_params` rather
/// than silently falling back to the defaults, so a typo'd request fails
/// loudly instead of returning a surprising ordering.
#[derive(Clone, Debug, Eq, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct FilterSpec {
    pub window: TimeWindow,
    pub sort: SortMode,
    pub community: Option<CommunityId>,
    pub author: Option<UserId>,

    /// Timezone in which "today" starts; collaborators that do not care
    /// about their users' wall clocks leave the UTC default
    pub timezone: chrono_tz::Tz,
}

impl Default for FilterSpec {
    fn default() -> FilterSpec {
        FilterSpec {
            window: TimeWindow::All,
            sort: SortMode::Hot,
            community: None,
            author: None,
            timezone: chrono_tz::Tz::UTC,
        }
    }
}

impl FilterSpec {
    /// Builds a spec from raw request parameters; absent parameters take
    /// the defaults, present-but-unknown ones are errors
    pub fn from_params(
        window: Option<&str>,
        sort: Option<&str>,
        community: Option<CommunityId>,
        author: Option<UserId>,
    ) -> Result<FilterSpec, Error> {
        Ok(FilterSpec {
            window: window
                .map(|w| w.parse::<TimeWindow>())
                .transpose()?
                .unwrap_or(TimeWindow::All),
            sort: sort
                .map(|s| s.parse::<SortMode>())
                .transpose()?
                .unwrap_or(SortMode::Hot),
            community,
            author,
            ..FilterSpec::default()
        })
    }

    /// Lower bound of the window ending at `now`, or None for an unbounded
    /// listing; a post created exactly at the bound is in the window
    pub fn window_start(&self, now: Time) -> Option<Time> {
        match self.window {
            TimeWindow::All => None,
            TimeWindow::Today => {
                let day = now.with_timezone(&self.timezone).date_naive();
                Some(crate::midnight_on(day, &self.timezone).with_timezone(&chrono::Utc))
            }
            TimeWindow::Week => Some(now - chrono::Duration::days(7)),
            // calendar-month subtraction, clamped at short month ends
            // (Mar 31 - 1 month = Feb 28/29)
            TimeWindow::Month => Some(
                now.checked_sub_months(chrono::Months::new(1))
                    .unwrap_or(chrono::DateTime::<chrono::Utc>::MIN_UTC),
            ),
        }
    }
}
