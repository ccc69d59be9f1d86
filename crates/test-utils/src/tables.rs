//! Builders for exported result tables.
//!
//! Tables are written the way the export service writes them, including the
//! `system:index` and `.geo` platform columns.

/// Builds a crop-type result CSV for one year.
///
/// # Example
///
/// ```
/// use test_utils::ResultTable;
///
/// let csv = ResultTable::new(2020).row("CA_1", "47", "USDA/NASS/CDL/2020").build();
/// assert!(csv.starts_with("system:index,CROP_2020,CSRC_2020,OPENET_ID"));
/// ```
#[derive(Debug, Clone)]
pub struct ResultTable {
    year: i32,
    coverage: bool,
    rows: Vec<ResultRow>,
}

#[derive(Debug, Clone)]
struct ResultRow {
    openet_id: String,
    crop: String,
    source: String,
    /// `(PIXEL_COUNT, PIXEL_TOTAL)`; `None` leaves both cells empty.
    coverage: Option<(f64, f64)>,
}

impl ResultTable {
    pub fn new(year: i32) -> Self {
        Self {
            year,
            coverage: false,
            rows: Vec::new(),
        }
    }

    /// Regional map table with `PIXEL_COUNT` / `PIXEL_TOTAL` columns.
    pub fn with_coverage(year: i32) -> Self {
        Self {
            coverage: true,
            ..Self::new(year)
        }
    }

    /// Add a row. `crop` is raw text so malformed values can be tested.
    ///
    /// In a coverage table the count cells are left empty.
    pub fn row(mut self, openet_id: &str, crop: &str, source: &str) -> Self {
        self.rows.push(ResultRow {
            openet_id: openet_id.to_string(),
            crop: crop.to_string(),
            source: source.to_string(),
            coverage: None,
        });
        self
    }

    /// Add a regional map row with coverage counts.
    ///
    /// # Panics
    ///
    /// If the table was not created with [`ResultTable::with_coverage`].
    pub fn covered_row(
        mut self,
        openet_id: &str,
        crop: i64,
        source: &str,
        count: f64,
        total: f64,
    ) -> Self {
        assert!(
            self.coverage,
            "covered_row needs a table created with ResultTable::with_coverage"
        );
        self.rows.push(ResultRow {
            openet_id: openet_id.to_string(),
            crop: crop.to_string(),
            source: source.to_string(),
            coverage: Some((count, total)),
        });
        self
    }

    pub fn build(&self) -> String {
        let mut header = vec![
            "system:index".to_string(),
            format!("CROP_{}", self.year),
            format!("CSRC_{}", self.year),
            "OPENET_ID".to_string(),
        ];
        if self.coverage {
            header.push("PIXEL_COUNT".to_string());
            header.push("PIXEL_TOTAL".to_string());
        }
        header.push(".geo".to_string());

        let mut out = header.join(",");
        out.push('\n');
        for (index, row) in self.rows.iter().enumerate() {
            let mut cells = vec![
                format!("{:04}", index),
                quote(&row.crop),
                quote(&row.source),
                quote(&row.openet_id),
            ];
            if self.coverage {
                match row.coverage {
                    Some((count, total)) => cells.extend([count.to_string(), total.to_string()]),
                    None => cells.extend([String::new(), String::new()]),
                }
            }
            cells.push(String::new());
            out.push_str(&cells.join(","));
            out.push('\n');
        }
        out
    }
}

/// Builds a pixel count CSV for one UTM zone.
#[derive(Debug, Clone)]
pub struct PixelCountTable {
    zone: u8,
    rows: Vec<(String, String)>,
}

impl PixelCountTable {
    pub fn new(zone: u8) -> Self {
        Self {
            zone,
            rows: Vec::new(),
        }
    }

    pub fn row(mut self, openet_id: &str, count: &str) -> Self {
        self.rows.push((openet_id.to_string(), count.to_string()));
        self
    }

    pub fn build(&self) -> String {
        let mut out = String::from("system:index,OPENET_ID,PIXELCOUNT,UTM_ZONE,.geo\n");
        for (index, (id, count)) in self.rows.iter().enumerate() {
            out.push_str(&format!("{:04},{},{},{:02},\n", index, id, count, self.zone));
        }
        out
    }
}

fn quote(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}
