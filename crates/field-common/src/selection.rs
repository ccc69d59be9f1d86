//! State and year selection parsing.
//!
//! Expands the `--states` and `--years` command line values into concrete,
//! de-duplicated, sorted collections.
//!
//! Both accept comma and/or whitespace separated tokens and may be repeated.
//! Years may be given as inclusive ranges (`2015-2020,2022`).

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{FieldError, FieldResult};

/// Calendar year.
pub type Year = i32;

/// States processed when `ALL` is requested.
///
/// AL is not included since there is no Alabama field boundary dataset.
pub const ALL_STATES: [&str; 47] = [
    "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "ID", "IL", "IN", "IA", "KS", "KY", "LA",
    "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NC", "ND", "NE", "NH", "NJ", "NM", "NV",
    "NY", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VA", "VT", "WA", "WI",
    "WV", "WY",
];

const ALL_SENTINEL: &str = "ALL";

/// Inclusive year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub min: Year,
    pub max: Year,
}

impl YearRange {
    pub fn new(min: Year, max: Year) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, year: Year) -> bool {
        year >= self.min && year <= self.max
    }

    /// Clamp a year into the range.
    #[inline]
    pub fn clamp(&self, year: Year) -> Year {
        year.max(self.min).min(self.max)
    }

    /// All years in the range, ascending.
    pub fn years(&self) -> Vec<Year> {
        (self.min..=self.max).collect()
    }
}

impl fmt::Display for YearRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.min, self.max)
    }
}

fn split_tokens(raw: &[String]) -> impl Iterator<Item = &str> {
    raw.iter()
        .flat_map(|s| s.split(|c: char| c == ',' || c.is_whitespace()))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Parse a state selection.
///
/// `ALL` (any case) expands to [`ALL_STATES`]. Other tokens must be two
/// letter postal codes. Output is upper-cased, de-duplicated and sorted.
pub fn parse_states(raw: &[String]) -> FieldResult<Vec<String>> {
    let mut states = BTreeSet::new();

    for token in split_tokens(raw) {
        let token = token.to_ascii_uppercase();
        if token == ALL_SENTINEL {
            states.extend(ALL_STATES.iter().map(|s| s.to_string()));
            continue;
        }
        if token.len() != 2 || !token.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(FieldError::InvalidStates(format!(
                "'{}' is not a two letter state code",
                token
            )));
        }
        states.insert(token);
    }

    if states.is_empty() {
        return Err(FieldError::InvalidStates("no states given".to_string()));
    }

    Ok(states.into_iter().collect())
}

fn parse_year(token: &str, full: &str) -> FieldResult<Year> {
    token
        .trim()
        .parse::<Year>()
        .map_err(|_| FieldError::InvalidYears(format!("cannot parse '{}'", full)))
}

/// Parse a year selection, keeping only years inside `range`.
///
/// An empty selection means every year in `range`. Years outside `range`
/// are dropped from the result and reported with a warning. Ranges are
/// clipped to `range` before they are expanded. Output is ascending.
pub fn parse_years(raw: &[String], range: YearRange) -> FieldResult<Vec<Year>> {
    let mut years = BTreeSet::new();
    let mut dropped = Vec::new();
    let mut any = false;

    for token in split_tokens(raw) {
        any = true;
        match token.split_once('-') {
            Some((start, end)) => {
                let start = parse_year(start, token)?;
                let end = parse_year(end, token)?;
                if start > end {
                    return Err(FieldError::InvalidYears(format!(
                        "range '{}' is reversed",
                        token
                    )));
                }
                if start < range.min {
                    dropped.push(span(start, end.min(range.min.saturating_sub(1))));
                }
                if end > range.max {
                    dropped.push(span(start.max(range.max.saturating_add(1)), end));
                }
                let (first, last) = (start.max(range.min), end.min(range.max));
                if first <= last {
                    years.extend(first..=last);
                }
            }
            None => {
                let year = parse_year(token, token)?;
                if range.contains(year) {
                    years.insert(year);
                } else {
                    dropped.push(span(year, year));
                }
            }
        }
    }

    if !any {
        return Ok(range.years());
    }

    if !dropped.is_empty() {
        warn!(
            dropped = %dropped.join(","),
            range = %range,
            "Ignoring years outside the configured range"
        );
    }

    Ok(years.into_iter().collect())
}

fn span(first: Year, last: Year) -> String {
    if first == last {
        first.to_string()
    } else {
        format!("{}-{}", first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_all_expands_to_full_list() {
        let states = parse_states(&strings(&["ALL"])).unwrap();
        assert_eq!(states.len(), 47);
        assert!(!states.contains(&"AL".to_string()));
        assert!(states.windows(2).all(|w| w[0] < w[1]));

        let lower = parse_states(&strings(&["all"])).unwrap();
        assert_eq!(lower, states);
    }

    #[test]
    fn test_states_split_dedup_and_sort() {
        let states = parse_states(&strings(&["or, ca", "ND ca"])).unwrap();
        assert_eq!(states, vec!["CA", "ND", "OR"]);
    }

    #[test]
    fn test_bad_state_token() {
        assert!(parse_states(&strings(&["CAL"])).is_err());
        assert!(parse_states(&strings(&[" , "])).is_err());
    }

    #[test]
    fn test_years_ranges_and_lists() {
        let range = YearRange::new(1997, 2024);
        let years = parse_years(&strings(&["2015-2017,2022", "2016"]), range).unwrap();
        assert_eq!(years, vec![2015, 2016, 2017, 2022]);
    }

    #[test]
    fn test_years_empty_is_full_range() {
        let range = YearRange::new(2020, 2022);
        assert_eq!(parse_years(&[], range).unwrap(), vec![2020, 2021, 2022]);
        assert_eq!(
            parse_years(&strings(&[""]), range).unwrap(),
            vec![2020, 2021, 2022]
        );
    }

    #[test]
    fn test_years_out_of_range_dropped() {
        let range = YearRange::new(1997, 2024);
        let years = parse_years(&strings(&["1990", "2023-2026"]), range).unwrap();
        assert_eq!(years, vec![2023, 2024]);
    }

    #[test]
    fn test_huge_range_is_clipped_before_expanding() {
        let range = YearRange::new(1997, 2024);
        let years = parse_years(&strings(&["1997-2147483647"]), range).unwrap();
        assert_eq!(years, range.years());
        assert_eq!(years.len(), 28);

        let years = parse_years(&strings(&["-5-1990"]), range);
        assert!(years.is_err());

        let years = parse_years(&strings(&["1000-1990"]), range).unwrap();
        assert!(years.is_empty());
    }

    #[test]
    fn test_span_format() {
        assert_eq!(span(2025, 2025), "2025");
        assert_eq!(span(2025, 2030), "2025-2030");
    }

    #[test]
    fn test_years_malformed() {
        let range = YearRange::new(1997, 2024);
        assert!(parse_years(&strings(&["20x4"]), range).is_err());
        assert!(parse_years(&strings(&["2010-"]), range).is_err());
        assert!(parse_years(&strings(&["2020-2010"]), range).is_err());
    }

    #[test]
    fn test_year_range_clamp() {
        let range = YearRange::new(1985, 2023);
        assert_eq!(range.clamp(1980), 1985);
        assert_eq!(range.clamp(2000), 2000);
        assert_eq!(range.clamp(2030), 2023);
    }
}
