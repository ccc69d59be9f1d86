//! Crop-type export planning.
//!
//! Walks (state, year) newest first and submits one export per covered
//! pair. Every id is claimed against the submitter's snapshots before its
//! source is resolved, so ids that will be skipped never touch the selector.

use tracing::{debug, info};

use compute::{Claim, ExportJob, JobSubmitter};
use field_common::Year;

use crate::error::Result;
use crate::jobs::cdl_export_id;
use crate::Tables;

/// Counters for one state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateExport {
    pub submitted: usize,
    pub skipped: usize,
    pub uncovered: usize,
}

pub struct CropTypeExporter<'a> {
    tables: &'a Tables,
}

impl<'a> CropTypeExporter<'a> {
    pub fn new(tables: &'a Tables) -> Self {
        Self { tables }
    }

    /// Submit the exports of one state. `years` is processed in the given
    /// order.
    pub async fn export_state(
        &self,
        submitter: &mut JobSubmitter,
        state: &str,
        years: &[Year],
    ) -> Result<StateExport> {
        if state == self.tables.config.regional.state {
            self.export_regional_state(submitter, years).await
        } else {
            self.export_cdl_state(submitter, state, years).await
        }
    }

    async fn export_cdl_state(
        &self,
        submitter: &mut JobSubmitter,
        state: &str,
        years: &[Year],
    ) -> Result<StateExport> {
        let selector = self.tables.selector();
        let jobs = self.tables.jobs();
        let covered = self.tables.coverage.years_for(state, years);
        let mut export = StateExport {
            uncovered: years.len() - covered.len(),
            ..Default::default()
        };
        if covered.is_empty() {
            info!(state = %state, "No CDL coverage for the selected years");
        }

        for year in covered {
            let id = cdl_export_id(state, year);
            if !Self::claim(submitter, &id, &mut export).await? {
                continue;
            }
            let selection = selector.cdl(state, year)?;
            debug!(id = %id, image = %selection.image_id, "Selected CDL image");
            Self::submit(submitter, &jobs.cdl(state, year, &selection), &mut export).await?;
        }
        Ok(export)
    }

    /// Regional map exports first, then the composite.
    async fn export_regional_state(
        &self,
        submitter: &mut JobSubmitter,
        years: &[Year],
    ) -> Result<StateExport> {
        let selector = self.tables.selector();
        let jobs = self.tables.jobs();
        let mut export = StateExport::default();

        for &year in years {
            if year < self.tables.config.regional.first_year {
                continue;
            }
            let id = jobs.regional_export_id(year);
            if !Self::claim(submitter, &id, &mut export).await? {
                continue;
            }
            let Some(selection) = selector.regional(year)? else {
                continue;
            };
            debug!(id = %id, image = %selection.image_id, "Selected regional image");
            Self::submit(submitter, &jobs.regional(year, &selection), &mut export).await?;
        }

        for &year in years {
            if year < self.tables.coverage.full_coverage_from() {
                export.uncovered += 1;
                continue;
            }
            let id = jobs.composite_export_id(year);
            if !Self::claim(submitter, &id, &mut export).await? {
                continue;
            }
            let Some(selection) = selector.composite(year)? else {
                continue;
            };
            debug!(id = %id, provenance = %selection.provenance, "Selected composite");
            Self::submit(submitter, &jobs.composite(year, &selection), &mut export).await?;
        }
        Ok(export)
    }

    async fn claim(
        submitter: &mut JobSubmitter,
        id: &str,
        export: &mut StateExport,
    ) -> Result<bool> {
        info!(id = %id, "Export");
        match submitter.claim(id).await? {
            Claim::Skip(_) => {
                export.skipped += 1;
                Ok(false)
            }
            Claim::Ready { .. } => Ok(true),
        }
    }

    async fn submit(
        submitter: &mut JobSubmitter,
        job: &ExportJob,
        export: &mut StateExport,
    ) -> Result<()> {
        submitter.submit(job).await?;
        export.submitted += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use compute::testing::FakeComputeService;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::Arc;

    fn submitter(fake: &Arc<FakeComputeService>, overwrite: bool) -> JobSubmitter {
        JobSubmitter::from_parts(fake.clone(), HashMap::new(), BTreeSet::new(), overwrite)
    }

    #[tokio::test]
    async fn test_cdl_state_skips_uncovered_years() {
        let tables = test_utils_tables();
        let fake = Arc::new(FakeComputeService::new());
        let mut submitter = submitter(&fake, false);

        let export = CropTypeExporter::new(&tables)
            .export_state(&mut submitter, "CO", &[2009, 2008, 2007])
            .await
            .unwrap();

        assert_eq!(export.submitted, 2);
        assert_eq!(export.uncovered, 1);
        assert_eq!(fake.submitted_ids(), vec!["co_cdl_2009", "co_cdl_2008"]);
    }

    #[tokio::test]
    async fn test_regional_state_exports_map_then_composite() {
        let tables = test_utils_tables();
        let fake = Arc::new(FakeComputeService::new());
        let mut submitter = submitter(&fake, false);

        CropTypeExporter::new(&tables)
            .export_state(&mut submitter, "CA", &[2010, 2008, 2007])
            .await
            .unwrap();

        assert_eq!(
            fake.submitted_ids(),
            vec!["ca_landiq_2010", "ca_composite_2010", "ca_composite_2008"]
        );
    }

    fn test_utils_tables() -> Tables {
        Tables::from_yaml(test_utils::SAMPLE_CONFIG, test_utils::SAMPLE_REMAP_CSV).unwrap()
    }
}
