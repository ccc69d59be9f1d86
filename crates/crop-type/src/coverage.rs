//! CDL coverage table.
//!
//! From the full-coverage threshold on, every configured state is covered.
//! Before it, a state is covered only if it is listed for that exact year.
//! Any year not listed is uncovered.

use std::collections::{BTreeMap, BTreeSet};

use field_common::Year;

use crate::config::CropTypeConfig;

#[derive(Debug, Clone)]
pub struct CoverageTable {
    full_coverage_from: Year,
    states: BTreeSet<String>,
    partial: BTreeMap<Year, BTreeSet<String>>,
}

impl CoverageTable {
    pub fn from_config(config: &CropTypeConfig) -> Self {
        Self {
            full_coverage_from: config.full_coverage_from(),
            states: config.states.iter().cloned().collect(),
            partial: config
                .cdl
                .partial_coverage
                .iter()
                .map(|(year, states)| (*year, states.iter().cloned().collect()))
                .collect(),
        }
    }

    pub fn full_coverage_from(&self) -> Year {
        self.full_coverage_from
    }

    pub fn is_covered(&self, state: &str, year: Year) -> bool {
        if year >= self.full_coverage_from {
            return self.states.contains(state);
        }
        self.partial
            .get(&year)
            .map_or(false, |states| states.contains(state))
    }

    /// The subset of `years` covered for `state`, in input order.
    pub fn years_for(&self, state: &str, years: &[Year]) -> Vec<Year> {
        years
            .iter()
            .copied()
            .filter(|&year| self.is_covered(state, year))
            .collect()
    }

    /// States covered in `year`.
    pub fn states_for(&self, year: Year) -> Vec<String> {
        if year >= self.full_coverage_from {
            return self.states.iter().cloned().collect();
        }
        self.partial
            .get(&year)
            .map(|states| states.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_utils::SAMPLE_CONFIG;

    fn table() -> CoverageTable {
        CoverageTable::from_config(&CropTypeConfig::from_yaml(SAMPLE_CONFIG).unwrap())
    }

    #[test]
    fn test_full_coverage_from_threshold() {
        let table = table();
        for year in 2008..=2030 {
            for state in field_common::ALL_STATES {
                assert!(table.is_covered(state, year), "{} {}", state, year);
            }
        }
    }

    #[test]
    fn test_partial_years_only_listed_states() {
        let table = table();
        assert!(table.is_covered("ND", 1997));
        assert!(!table.is_covered("IA", 1997));
        assert_eq!(table.states_for(1998), vec!["ND"]);

        assert!(table.is_covered("FL", 2004));
        assert!(!table.is_covered("FL", 2003));
        assert!(!table.is_covered("ID", 2005));
        assert!(table.is_covered("ID", 2007));
        assert!(!table.is_covered("CA", 2007));
    }

    #[test]
    fn test_unlisted_years_uncovered() {
        let table = table();
        assert!(!table.is_covered("ND", 1996));
        assert!(table.states_for(1990).is_empty());
    }

    #[test]
    fn test_unconfigured_state_uncovered() {
        let table = table();
        assert!(!table.is_covered("AL", 2020));
    }

    #[test]
    fn test_years_for_state() {
        let table = table();
        let years: Vec<Year> = (1997..=2009).rev().collect();
        assert_eq!(
            table.years_for("IL", &years),
            vec![2009, 2008, 2007, 2006, 2005, 2004, 2003, 2002, 2001, 2000, 1999]
        );
        assert_eq!(table.years_for("ND", &[1997, 1998]), vec![1997, 1998]);
    }
}
