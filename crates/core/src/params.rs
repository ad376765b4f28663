//! Table detection parameters.
//!
//! Contains TableParams, the empirically tuned thresholds used by the three
//! detectors. Pixel thresholds are expressed against a reference raster of
//! `reference_width` x `reference_height` and scaled to the page at hand.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TableError};

/// Parameters for table detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableParams {
    /// Minimum dark pixels (summed over `line_thickness` columns) for a
    /// vertical ruling line, on the reference raster.
    pub vline_threshold: f64,

    /// Minimum dark pixels (summed over `line_thickness` rows) for a
    /// horizontal ruling line, on the reference raster.
    pub hline_threshold: f64,

    /// Ruling line thickness in pixels.
    pub line_thickness: usize,

    /// Lines closer than this (reference pixels) collapse into one.
    pub min_line_dist: f64,

    pub reference_width: f64,
    pub reference_height: f64,

    /// A pixel is ink when its normalised luma is below this value.
    pub ink_luma_threshold: f64,

    /// More dark pixels than this in one column of a vertical border band
    /// keeps two horizontally adjacent cells apart.
    pub row_merge_ink: usize,

    /// More dark pixels than this in one row of a horizontal border band
    /// keeps two vertically adjacent cells apart.
    pub col_merge_ink: usize,

    /// Half width of the band sampled around an interior border.
    pub merge_band: i64,

    /// Minimum spans inside a candidate region.
    pub min_spans: usize,

    /// DBSCAN minimum points (the point itself included).
    pub dbscan_min_pts: usize,

    /// Vertical slack when collecting clusters into one cluster line.
    pub cluster_line_tolerance: f64,

    /// Largest vertical gap between cluster lines of one boundaryless table.
    pub cluster_line_gap: f64,

    /// A cluster-boundary result replaces a ruled one over the same box when
    /// both its row and column counts reach this multiple.
    pub richer_structure_ratio: f64,

    /// Tables narrower than this fraction of the page use half the unscaled
    /// horizontal line threshold.
    pub small_table_width_ratio: f64,

    /// Tables shorter than this fraction of the page use half the unscaled
    /// vertical line threshold.
    pub small_table_height_ratio: f64,
}

impl Default for TableParams {
    fn default() -> Self {
        Self {
            vline_threshold: 210.0,
            hline_threshold: 240.0,
            line_thickness: 1,
            min_line_dist: 25.0,
            reference_width: 3508.0,
            reference_height: 2480.0,
            ink_luma_threshold: 0.4,
            row_merge_ink: 30,
            col_merge_ink: 35,
            merge_band: 3,
            min_spans: 4,
            dbscan_min_pts: 2,
            cluster_line_tolerance: 5.0,
            cluster_line_gap: 100.0,
            richer_structure_ratio: 1.5,
            small_table_width_ratio: 0.3,
            small_table_height_ratio: 0.2,
        }
    }
}

impl TableParams {
    /// Loads parameters from JSON; absent fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn validate(&self) -> Result<()> {
        fn positive(name: &'static str, v: f64) -> Result<()> {
            if v > 0.0 && v.is_finite() {
                Ok(())
            } else {
                Err(TableError::InvalidParams {
                    name,
                    msg: format!("must be a positive finite number, got {v}"),
                })
            }
        }
        if self.line_thickness == 0 {
            return Err(TableError::InvalidParams {
                name: "line_thickness",
                msg: "must be at least 1".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.ink_luma_threshold) {
            return Err(TableError::InvalidParams {
                name: "ink_luma_threshold",
                msg: format!("must lie in [0, 1], got {}", self.ink_luma_threshold),
            });
        }
        if self.dbscan_min_pts == 0 {
            return Err(TableError::InvalidParams {
                name: "dbscan_min_pts",
                msg: "must be at least 1".to_string(),
            });
        }
        if self.merge_band < 0 {
            return Err(TableError::InvalidParams {
                name: "merge_band",
                msg: format!("must not be negative, got {}", self.merge_band),
            });
        }
        positive("reference_width", self.reference_width)?;
        positive("reference_height", self.reference_height)?;
        positive("min_line_dist", self.min_line_dist)?;
        positive("richer_structure_ratio", self.richer_structure_ratio)?;
        positive("small_table_width_ratio", self.small_table_width_ratio)?;
        positive("small_table_height_ratio", self.small_table_height_ratio)?;
        positive("cluster_line_gap", self.cluster_line_gap)?;
        positive("cluster_line_tolerance", self.cluster_line_tolerance)?;
        Ok(())
    }

    /// `min_line_dist` scaled to the page, per axis, rounded to whole pixels.
    ///
    /// Returns `(along_x, along_y)`.
    pub fn scaled_line_dist(&self, page_width: f64, page_height: f64) -> (f64, f64) {
        (
            (self.min_line_dist * page_width / self.reference_width).round(),
            (self.min_line_dist * page_height / self.reference_height).round(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let params = TableParams::from_json(r#"{"min_spans": 6}"#).unwrap();
        assert_eq!(params.min_spans, 6);
        assert_eq!(params.hline_threshold, 240.0);
    }

    #[test]
    fn rejects_zero_thickness() {
        let err = TableParams::from_json(r#"{"line_thickness": 0}"#).unwrap_err();
        assert!(matches!(
            err,
            TableError::InvalidParams {
                name: "line_thickness",
                ..
            }
        ));
    }

    #[test]
    fn rejects_out_of_range_fields() {
        for (json, field) in [
            (r#"{"merge_band": -1}"#, "merge_band"),
            (r#"{"small_table_width_ratio": 0.0}"#, "small_table_width_ratio"),
            (r#"{"small_table_height_ratio": -0.2}"#, "small_table_height_ratio"),
            (r#"{"cluster_line_gap": 0.0}"#, "cluster_line_gap"),
            (r#"{"cluster_line_tolerance": -5.0}"#, "cluster_line_tolerance"),
        ] {
            match TableParams::from_json(json) {
                Err(TableError::InvalidParams { name, .. }) => assert_eq!(name, field),
                other => panic!("{json}: expected InvalidParams, got {other:?}"),
            }
        }
        assert!(TableParams::from_json(r#"{"merge_band": 0}"#).is_ok());
    }

    #[test]
    fn scaled_line_dist_follows_page() {
        let params = TableParams::default();
        assert_eq!(params.scaled_line_dist(3508.0, 2480.0), (25.0, 25.0));
        assert_eq!(params.scaled_line_dist(500.0, 400.0), (4.0, 4.0));
    }
}
