//! Per-state field dataset persistence using SQLite with sqlx.
//!
//! One database per state holds a `fields` table keyed by `OPENET_ID`, with
//! `MGRS_TILE`, `PIXELCOUNT` and a `CROP_<year>` / `CSRC_<year>` column pair
//! for every year that has been written. Year columns are added on demand.
//!
//! Updates are applied one feature at a time without a wrapping
//! transaction; an interrupted run leaves every completed write in place.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use tokio::sync::Mutex;
use tracing::{debug, info};

use field_common::{FieldError, FieldResult, Year};

/// Crop-type value for one feature and year.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CropValue {
    /// Crop code, 0 when unset
    pub crop: i64,
    /// Provenance text, empty when unset
    pub source: String,
}

impl CropValue {
    pub fn new(crop: i64, source: impl Into<String>) -> Self {
        Self {
            crop,
            source: source.into(),
        }
    }

    pub fn is_set(&self) -> bool {
        self.crop > 0
    }
}

/// A field feature as stored in the dataset (year columns excluded).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldFeature {
    pub openet_id: String,
    pub mgrs_tile: Option<String>,
    pub pixel_count: i64,
}

fn db_error(context: &str, err: sqlx::Error) -> FieldError {
    FieldError::DatasetError(format!("{}: {}", context, err))
}

fn crop_column(year: Year) -> String {
    format!("CROP_{}", year)
}

fn source_column(year: Year) -> String {
    format!("CSRC_{}", year)
}

/// A state's field dataset.
pub struct FieldDataset {
    pool: SqlitePool,
    name: String,
    year_columns: Mutex<HashSet<Year>>,
}

impl FieldDataset {
    /// Dataset location for a state inside a workspace.
    /// Format: {workspace}/fields/{STATE}/{STATE}.sqlite
    pub fn path_for(workspace: &Path, state: &str) -> PathBuf {
        workspace
            .join("fields")
            .join(state)
            .join(format!("{}.sqlite", state))
    }

    /// Open an existing dataset.
    ///
    /// A missing file is [`FieldError::NotFound`]; datasets are created by
    /// the field boundary ingestion, not by these tools.
    pub async fn open(path: &Path) -> FieldResult<Self> {
        if !path.is_file() {
            return Err(FieldError::NotFound(path.display().to_string()));
        }
        Self::connect(path, false).await
    }

    /// Open or create the dataset at the given path.
    pub async fn create(path: &Path) -> FieldResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::connect(path, true).await
    }

    async fn connect(path: &Path, create: bool) -> FieldResult<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(create);

        // Single writer
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(|e| db_error("Failed to open SQLite database", e))?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let dataset = Self::init(pool, name).await?;
        info!(path = ?path, "Opened field dataset");
        Ok(dataset)
    }

    /// Open an in-memory dataset (for testing).
    pub async fn open_memory() -> FieldResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| db_error("Failed to open in-memory database", e))?;

        Self::init(pool, "memory".to_string()).await
    }

    async fn init(pool: SqlitePool, name: String) -> FieldResult<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS fields (
                OPENET_ID TEXT PRIMARY KEY,
                MGRS_TILE TEXT,
                PIXELCOUNT INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(|e| db_error("Failed to create fields table", e))?;

        let rows = sqlx::query("SELECT name FROM pragma_table_info('fields')")
            .fetch_all(&pool)
            .await
            .map_err(|e| db_error("Failed to read table columns", e))?;

        let mut years = HashSet::new();
        for row in rows {
            let column: String = row
                .try_get(0)
                .map_err(|e| db_error("Failed to read column name", e))?;
            if let Some(year) = column
                .strip_prefix("CROP_")
                .and_then(|y| y.parse::<Year>().ok())
            {
                years.insert(year);
            }
        }

        Ok(Self {
            pool,
            name,
            year_columns: Mutex::new(years),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Add the `CROP_<year>` / `CSRC_<year>` columns if they are missing.
    pub async fn ensure_year(&self, year: Year) -> FieldResult<()> {
        let mut known = self.year_columns.lock().await;
        if known.contains(&year) {
            return Ok(());
        }

        let statements = [
            format!(
                "ALTER TABLE fields ADD COLUMN {} INTEGER NOT NULL DEFAULT 0",
                crop_column(year)
            ),
            format!(
                "ALTER TABLE fields ADD COLUMN {} TEXT NOT NULL DEFAULT ''",
                source_column(year)
            ),
        ];
        for sql in &statements {
            sqlx::query(sql)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to add year column", e))?;
        }

        debug!(dataset = %self.name, year, "Added year columns");
        known.insert(year);
        Ok(())
    }

    /// Years that currently have columns in the dataset.
    pub async fn years(&self) -> BTreeSet<Year> {
        self.year_columns.lock().await.iter().copied().collect()
    }

    /// Insert or replace a feature (year columns keep their defaults).
    pub async fn insert_feature(&self, openet_id: &str, mgrs_tile: Option<&str>) -> FieldResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fields (OPENET_ID, MGRS_TILE) VALUES (?, ?)
            ON CONFLICT(OPENET_ID) DO UPDATE SET MGRS_TILE = excluded.MGRS_TILE
            "#,
        )
        .bind(openet_id)
        .bind(mgrs_tile)
        .execute(&self.pool)
        .await
        .map_err(|e| db_error("Failed to insert feature", e))?;

        Ok(())
    }

    pub async fn feature_count(&self) -> FieldResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) FROM fields")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| db_error("Failed to count features", e))?;
        row.try_get(0)
            .map_err(|e| db_error("Failed to count features", e))
    }

    /// All features, ordered by id.
    pub async fn features(&self) -> FieldResult<Vec<FieldFeature>> {
        let rows =
            sqlx::query("SELECT OPENET_ID, MGRS_TILE, PIXELCOUNT FROM fields ORDER BY OPENET_ID")
                .fetch_all(&self.pool)
                .await
                .map_err(|e| db_error("Failed to read features", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(FieldFeature {
                    openet_id: row.try_get(0).map_err(|e| db_error("OPENET_ID", e))?,
                    mgrs_tile: row.try_get(1).map_err(|e| db_error("MGRS_TILE", e))?,
                    pixel_count: row.try_get(2).map_err(|e| db_error("PIXELCOUNT", e))?,
                })
            })
            .collect()
    }

    /// Distinct non-empty MGRS tile ids.
    pub async fn mgrs_tiles(&self) -> FieldResult<BTreeSet<String>> {
        let rows = sqlx::query(
            "SELECT DISTINCT MGRS_TILE FROM fields WHERE MGRS_TILE IS NOT NULL AND MGRS_TILE != ''",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| db_error("Failed to read MGRS tiles", e))?;

        rows.into_iter()
            .map(|row| row.try_get::<String, _>(0).map_err(|e| db_error("MGRS_TILE", e)))
            .collect()
    }

    /// Crop value of a single feature, `None` if the feature does not exist.
    pub async fn crop(&self, openet_id: &str, year: Year) -> FieldResult<Option<CropValue>> {
        self.ensure_year(year).await?;
        let sql = format!(
            "SELECT {}, {} FROM fields WHERE OPENET_ID = ?",
            crop_column(year),
            source_column(year)
        );
        let row = sqlx::query(&sql)
            .bind(openet_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| db_error("Failed to read crop value", e))?;

        row.map(|row| {
            Ok(CropValue {
                crop: row.try_get(0).map_err(|e| db_error("CROP", e))?,
                source: row.try_get(1).map_err(|e| db_error("CSRC", e))?,
            })
        })
        .transpose()
    }

    /// Crop values of every feature for a year, ordered by id.
    pub async fn crop_values(&self, year: Year) -> FieldResult<Vec<(String, CropValue)>> {
        self.ensure_year(year).await?;
        let sql = format!(
            "SELECT OPENET_ID, {}, {} FROM fields ORDER BY OPENET_ID",
            crop_column(year),
            source_column(year)
        );
        let rows = sqlx::query(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| db_error("Failed to read crop values", e))?;

        rows.into_iter()
            .map(|row| {
                let id: String = row.try_get(0).map_err(|e| db_error("OPENET_ID", e))?;
                let value = CropValue {
                    crop: row.try_get(1).map_err(|e| db_error("CROP", e))?,
                    source: row.try_get(2).map_err(|e| db_error("CSRC", e))?,
                };
                Ok((id, value))
            })
            .collect()
    }

    /// Write the crop value of one feature. Returns false if the id is unknown.
    pub async fn set_crop(&self, openet_id: &str, year: Year, value: &CropValue) -> FieldResult<bool> {
        self.ensure_year(year).await?;
        let sql = format!(
            "UPDATE fields SET {} = ?, {} = ? WHERE OPENET_ID = ?",
            crop_column(year),
            source_column(year)
        );
        let result = sqlx::query(&sql)
            .bind(value.crop)
            .bind(&value.source)
            .bind(openet_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to write crop value", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Reset crop code and provenance of every feature for the given years.
    pub async fn clear_years(&self, years: &[Year]) -> FieldResult<u64> {
        let mut cleared = 0;
        for &year in years {
            self.ensure_year(year).await?;
            let sql = format!(
                "UPDATE fields SET {} = 0, {} = ''",
                crop_column(year),
                source_column(year)
            );
            let result = sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| db_error("Failed to clear crop values", e))?;
            cleared = cleared.max(result.rows_affected());
        }
        debug!(dataset = %self.name, years = years.len(), "Cleared crop values");
        Ok(cleared)
    }

    /// Write the pixel count of one feature. Returns false if the id is unknown.
    pub async fn set_pixel_count(&self, openet_id: &str, count: i64) -> FieldResult<bool> {
        let result = sqlx::query("UPDATE fields SET PIXELCOUNT = ? WHERE OPENET_ID = ?")
            .bind(count)
            .bind(openet_id)
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to write pixel count", e))?;

        Ok(result.rows_affected() > 0)
    }

    /// Reset every pixel count to 0.
    pub async fn clear_pixel_counts(&self) -> FieldResult<u64> {
        let result = sqlx::query("UPDATE fields SET PIXELCOUNT = 0")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error("Failed to clear pixel counts", e))?;
        Ok(result.rows_affected())
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
