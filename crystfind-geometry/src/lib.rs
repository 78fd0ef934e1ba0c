//! crystfind-geometry: Panel layouts for tiled area detectors.
//!
//! A [`PanelLayout`] places every panel of a raw `(panels, rows, cols)`
//! frame into one assembled detector-plane image with an integer affine
//! transform. It implements [`DetectorGeometry`], so it can drive the
//! streak mask generator directly.
//!
//! # JSON schema
//!
//! ```json
//! {
//!   "detector": {
//!     "panel_layout": { "panels": 2, "rows": 185, "cols": 388 },
//!     "assembled_shape": [370, 388],
//!     "center": [185, 194],
//!     "panel_transformations": [
//!       { "panel_id": 0, "matrix": [[1, 0, 0], [0, 1, 0]] },
//!       { "panel_id": 1, "matrix": [[-1, 0, 369], [0, -1, 387]] }
//!     ]
//!   }
//! }
//! ```
//!
//! Every field of `detector` is optional. Missing transformations stack the
//! panels vertically; a missing assembled shape is the bounding box of the
//! transformed panels.

mod error;

pub use error::{Error, Result};

use crystfind_core::geometry::{ensure_raw_shape, DetectorGeometry, RawShape};
use ndarray::{Array2, ArrayView3};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Affine placement of one panel.
///
/// Formula:
/// assembled_row = a * row + b * col + tx
/// assembled_col = c * row + d * col + ty
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PanelTransform {
    pub a: i64,
    pub b: i64,
    pub c: i64,
    pub d: i64,
    pub tx: i64,
    pub ty: i64,
}

impl Default for PanelTransform {
    fn default() -> Self {
        Self::identity()
    }
}

impl PanelTransform {
    /// Create an identity transform.
    #[must_use]
    pub fn identity() -> Self {
        Self::translation(0, 0)
    }

    /// Create a pure translation.
    #[must_use]
    pub fn translation(tx: i64, ty: i64) -> Self {
        Self {
            a: 1,
            b: 0,
            c: 0,
            d: 1,
            tx,
            ty,
        }
    }

    /// Create a 180 degree rotation of a `rows x cols` panel whose
    /// bounding box starts at `(tx, ty)`.
    #[must_use]
    pub fn rotated_180(rows: usize, cols: usize, tx: i64, ty: i64) -> Self {
        Self {
            a: -1,
            b: 0,
            c: 0,
            d: -1,
            tx: tx + extent(rows),
            ty: ty + extent(cols),
        }
    }

    /// Apply the transform to panel-local `(row, col)`.
    #[inline]
    #[must_use]
    pub fn apply_signed(&self, row: i64, col: i64) -> (i64, i64) {
        (
            self.a * row + self.b * col + self.tx,
            self.c * row + self.d * col + self.ty,
        )
    }

    /// Apply the transform to panel-local `(row, col)`.
    ///
    /// The transform must have passed [`Self::validate_bounds`] for the
    /// panel size, otherwise the result is meaningless.
    #[inline]
    #[must_use]
    #[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
    pub fn apply(&self, row: usize, col: usize) -> (usize, usize) {
        let (r, c) = self.apply_signed(row as i64, col as i64);
        (r as usize, c as usize)
    }

    /// Validate that every pixel of a `rows x cols` panel lands inside an
    /// assembled image of `assembled` shape.
    ///
    /// Checking the 4 corners is sufficient because the map is affine.
    ///
    /// # Errors
    /// Returns a description of the first out-of-bounds corner.
    pub fn validate_bounds(
        &self,
        rows: usize,
        cols: usize,
        assembled: (usize, usize),
    ) -> std::result::Result<(), String> {
        let (max_row, max_col) = (extent(rows), extent(cols));
        let corners = [(0, 0), (max_row, 0), (0, max_col), (max_row, max_col)];
        let limit_row = to_i64(assembled.0);
        let limit_col = to_i64(assembled.1);

        for (row, col) in corners {
            let (ar, ac) = self.apply_signed(row, col);
            if ar < 0 || ar >= limit_row {
                return Err(format!(
                    "out-of-bounds row {ar} for input ({row}, {col}); valid range is [0, {limit_row})"
                ));
            }
            if ac < 0 || ac >= limit_col {
                return Err(format!(
                    "out-of-bounds col {ac} for input ({row}, {col}); valid range is [0, {limit_col})"
                ));
            }
        }
        Ok(())
    }
}

/// Configuration-driven detector geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct PanelLayout {
    raw_shape: RawShape,
    assembled_shape: (usize, usize),
    transforms: Vec<PanelTransform>,
    center: Option<(usize, usize)>,
}

// Intermediate structs for the JSON schema
#[derive(Deserialize)]
struct JsonConfig {
    detector: JsonDetector,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct JsonDetector {
    panel_layout: JsonPanelLayout,
    assembled_shape: Option<[usize; 2]>,
    center: Option<[usize; 2]>,
    panel_transformations: Option<Vec<JsonPanelTransform>>,
}

#[derive(Deserialize)]
#[serde(default)]
struct JsonPanelLayout {
    panels: usize,
    rows: usize,
    cols: usize,
}

impl Default for JsonPanelLayout {
    fn default() -> Self {
        Self {
            panels: 1,
            rows: 512,
            cols: 512,
        }
    }
}

#[derive(Deserialize)]
struct JsonPanelTransform {
    panel_id: usize,
    matrix: [[i64; 3]; 2],
}

impl PanelLayout {
    /// Build a validated layout.
    ///
    /// # Errors
    /// Returns [`Error::InvalidLayout`] when the transform count differs from
    /// the panel count or the center lies outside the assembled image, and
    /// [`Error::InvalidTransform`] when a panel does not fit.
    pub fn new(
        raw_shape: RawShape,
        assembled_shape: (usize, usize),
        transforms: Vec<PanelTransform>,
        center: Option<(usize, usize)>,
    ) -> Result<Self> {
        let layout = Self {
            raw_shape,
            assembled_shape,
            transforms,
            center,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Panels stacked vertically: panel `p` starts at row `p * rows`.
    ///
    /// The assembled image then equals the flattened raw frame.
    #[must_use]
    pub fn stacked(raw_shape: RawShape) -> Self {
        Self {
            raw_shape,
            assembled_shape: raw_shape.flat_dim(),
            transforms: stacked_transforms(raw_shape),
            center: None,
        }
    }

    /// Set the assembled-space center.
    ///
    /// # Errors
    /// Returns [`Error::InvalidLayout`] when the center is outside the
    /// assembled image.
    pub fn with_center(mut self, center: Option<(usize, usize)>) -> Result<Self> {
        self.center = center;
        self.validate_center()?;
        Ok(self)
    }

    /// Load a layout from a JSON file.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed, or the
    /// layout does not validate.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let json_config: JsonConfig = serde_json::from_reader(reader)?;
        Self::from_json_config(json_config)
    }

    /// Load a layout from a JSON string.
    ///
    /// # Errors
    /// See [`Self::from_file`].
    pub fn from_json(json: &str) -> Result<Self> {
        let json_config: JsonConfig = serde_json::from_str(json)?;
        Self::from_json_config(json_config)
    }

    fn from_json_config(config: JsonConfig) -> Result<Self> {
        let detector = config.detector;
        let layout = detector.panel_layout;
        let raw_shape = RawShape::new(layout.panels, layout.rows, layout.cols);

        let transforms = match detector.panel_transformations {
            Some(entries) if !entries.is_empty() => {
                let mut transforms = vec![PanelTransform::identity(); raw_shape.panels];
                for entry in entries {
                    let slot = transforms.get_mut(entry.panel_id).ok_or_else(|| {
                        Error::InvalidLayout(format!(
                            "panel_id {} out of range for {} panels",
                            entry.panel_id, raw_shape.panels
                        ))
                    })?;
                    // matrix: [[a, b, tx], [c, d, ty]]
                    let m = entry.matrix;
                    *slot = PanelTransform {
                        a: m[0][0],
                        b: m[0][1],
                        tx: m[0][2],
                        c: m[1][0],
                        d: m[1][1],
                        ty: m[1][2],
                    };
                }
                transforms
            }
            _ => {
                log::debug!("no panel transformations given; stacking panels vertically");
                stacked_transforms(raw_shape)
            }
        };

        let assembled_shape = match detector.assembled_shape {
            Some([rows, cols]) => (rows, cols),
            None => bounding_shape(raw_shape, &transforms),
        };

        Self::new(
            raw_shape,
            assembled_shape,
            transforms,
            detector.center.map(|[row, col]| (row, col)),
        )
    }

    /// Validate the transforms and center.
    ///
    /// Called automatically by every constructor except [`Self::stacked`],
    /// which is valid by construction.
    ///
    /// # Errors
    /// See [`Self::new`].
    pub fn validate(&self) -> Result<()> {
        if self.transforms.len() != self.raw_shape.panels {
            return Err(Error::InvalidLayout(format!(
                "{} transforms for {} panels",
                self.transforms.len(),
                self.raw_shape.panels
            )));
        }
        for (panel, transform) in self.transforms.iter().enumerate() {
            transform
                .validate_bounds(
                    self.raw_shape.rows,
                    self.raw_shape.cols,
                    self.assembled_shape,
                )
                .map_err(|message| Error::InvalidTransform { panel, message })?;
        }
        self.validate_center()
    }

    fn validate_center(&self) -> Result<()> {
        if let Some((row, col)) = self.center {
            if row >= self.assembled_shape.0 || col >= self.assembled_shape.1 {
                return Err(Error::InvalidLayout(format!(
                    "center ({row}, {col}) outside assembled shape {:?}",
                    self.assembled_shape
                )));
            }
        }
        Ok(())
    }

    /// Per-panel transforms.
    #[must_use]
    pub fn transforms(&self) -> &[PanelTransform] {
        &self.transforms
    }

    /// Map a raw pixel to its assembled location.
    ///
    /// Returns `None` for a panel index without a transform.
    #[must_use]
    pub fn map_pixel(&self, panel: usize, row: usize, col: usize) -> Option<(usize, usize)> {
        self.transforms.get(panel).map(|t| t.apply(row, col))
    }
}

impl DetectorGeometry for PanelLayout {
    fn raw_shape(&self) -> RawShape {
        self.raw_shape
    }

    fn assembled_shape(&self) -> (usize, usize) {
        self.assembled_shape
    }

    fn project(&self, raw: ArrayView3<'_, f64>) -> crystfind_core::Result<Array2<f64>> {
        ensure_raw_shape(self, &raw)?;
        let mut assembled = Array2::zeros(self.assembled_shape);
        for (panel, transform) in raw.outer_iter().zip(&self.transforms) {
            for ((row, col), &value) in panel.indexed_iter() {
                assembled[transform.apply(row, col)] = value;
            }
        }
        Ok(assembled)
    }

    fn center(&self) -> Option<(usize, usize)> {
        self.center
    }
}

fn stacked_transforms(raw_shape: RawShape) -> Vec<PanelTransform> {
    (0..raw_shape.panels)
        .map(|p| PanelTransform::translation(to_i64(p * raw_shape.rows), 0))
        .collect()
}

#[allow(clippy::cast_sign_loss)]
fn bounding_shape(raw_shape: RawShape, transforms: &[PanelTransform]) -> (usize, usize) {
    if raw_shape.rows == 0 || raw_shape.cols == 0 {
        return (0, 0);
    }
    let (max_row, max_col) = (extent(raw_shape.rows), extent(raw_shape.cols));
    let mut shape = (0_i64, 0_i64);
    for t in transforms {
        for (row, col) in [(0, 0), (max_row, 0), (0, max_col), (max_row, max_col)] {
            let (ar, ac) = t.apply_signed(row, col);
            shape.0 = shape.0.max(ar + 1);
            shape.1 = shape.1.max(ac + 1);
        }
    }
    (shape.0.max(0) as usize, shape.1.max(0) as usize)
}

/// Largest pixel index along an axis of `len` pixels.
fn extent(len: usize) -> i64 {
    to_i64(len.saturating_sub(1))
}

fn to_i64(value: usize) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_transform_apply() {
        let t = PanelTransform::translation(10, 20);
        assert_eq!(t.apply(1, 2), (11, 22));

        let r = PanelTransform::rotated_180(4, 5, 0, 0);
        assert_eq!(r.apply(0, 0), (3, 4));
        assert_eq!(r.apply(3, 4), (0, 0));
    }

    #[test]
    fn test_transform_validate_bounds() {
        assert!(PanelTransform::identity().validate_bounds(4, 5, (4, 5)).is_ok());
        assert!(PanelTransform::identity().validate_bounds(4, 5, (3, 5)).is_err());

        // Mirror without offset goes negative.
        let mirror = PanelTransform {
            a: -1,
            ..PanelTransform::identity()
        };
        let err = mirror.validate_bounds(4, 5, (10, 10)).unwrap_err();
        assert!(err.contains("out-of-bounds"), "{err}");
    }

    #[test]
    fn test_stacked_layout_projects_flat() {
        let shape = RawShape::new(3, 2, 4);
        let layout = PanelLayout::stacked(shape);
        assert!(layout.validate().is_ok());
        assert_eq!(layout.assembled_shape(), (6, 4));

        let raw = Array3::from_shape_fn(shape.dim(), |(p, r, c)| (p * 100 + r * 10 + c) as f64);
        let assembled = layout.project(raw.view()).unwrap();
        let flat = raw.into_shape_with_order(shape.flat_dim()).unwrap();
        assert_eq!(assembled, flat);
    }

    #[test]
    fn test_projection_leaves_gaps_zero() {
        let shape = RawShape::new(2, 2, 2);
        let layout = PanelLayout::new(
            shape,
            (2, 5),
            vec![
                PanelTransform::identity(),
                PanelTransform::rotated_180(2, 2, 0, 3),
            ],
            Some((1, 2)),
        )
        .unwrap();

        let raw = Array3::from_elem(shape.dim(), 7.0);
        let assembled = layout.project(raw.view()).unwrap();
        assert!(assembled.column(2).iter().all(|&v| v == 0.0));
        assert!((assembled.sum() - 56.0).abs() < f64::EPSILON);
        assert_eq!(layout.center(), Some((1, 2)));
    }

    #[test]
    fn test_project_rejects_wrong_shape() {
        let layout = PanelLayout::stacked(RawShape::new(2, 3, 3));
        let raw = Array3::<f64>::zeros((1, 3, 3));
        assert!(matches!(
            layout.project(raw.view()),
            Err(crystfind_core::Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_new_rejects_bad_layouts() {
        let shape = RawShape::new(2, 2, 2);
        let one = vec![PanelTransform::identity()];
        assert!(matches!(
            PanelLayout::new(shape, (4, 2), one, None),
            Err(Error::InvalidLayout(_))
        ));

        let overflow = vec![PanelTransform::identity(), PanelTransform::translation(3, 0)];
        assert!(matches!(
            PanelLayout::new(shape, (4, 2), overflow, None),
            Err(Error::InvalidTransform { panel: 1, .. })
        ));

        assert!(PanelLayout::stacked(shape).with_center(Some((4, 0))).is_err());
    }

    #[test]
    fn test_json_loading() {
        let json = r#"{
            "detector": {
                "panel_layout": { "panels": 2, "rows": 3, "cols": 4 },
                "center": [2, 3],
                "panel_transformations": [
                    { "panel_id": 0, "matrix": [[1, 0, 0], [0, 1, 0]] },
                    { "panel_id": 1, "matrix": [[1, 0, 0], [0, 1, 5]] }
                ]
            }
        }"#;

        let layout = PanelLayout::from_json(json).expect("Failed to parse JSON");
        assert_eq!(layout.raw_shape(), RawShape::new(2, 3, 4));
        // Bounding box of the transformed panels.
        assert_eq!(layout.assembled_shape(), (3, 9));
        assert_eq!(layout.center(), Some((2, 3)));
        assert_eq!(layout.map_pixel(1, 2, 3), Some((2, 8)));
        assert_eq!(layout.map_pixel(2, 0, 0), None);
    }

    #[test]
    fn test_json_defaults_stack_panels() {
        let json = r#"{ "detector": { "panel_layout": { "panels": 4, "rows": 8, "cols": 16 } } }"#;
        let layout = PanelLayout::from_json(json).expect("Should parse");
        assert_eq!(layout.assembled_shape(), (32, 16));
        assert_eq!(layout.transforms()[3], PanelTransform::translation(24, 0));
        assert_eq!(layout.center(), None);
    }

    #[test]
    fn test_json_invalid_transform() {
        let json = r#"{
            "detector": {
                "panel_layout": { "panels": 1, "rows": 4, "cols": 4 },
                "assembled_shape": [4, 4],
                "panel_transformations": [
                    { "panel_id": 0, "matrix": [[-1, 0, 2], [0, 1, 0]] }
                ]
            }
        }"#;
        let err = PanelLayout::from_json(json).unwrap_err().to_string();
        assert!(err.contains("out-of-bounds"), "{err}");
    }

    #[test]
    fn test_json_panel_id_out_of_range() {
        let json = r#"{
            "detector": {
                "panel_layout": { "panels": 1, "rows": 4, "cols": 4 },
                "panel_transformations": [
                    { "panel_id": 3, "matrix": [[1, 0, 0], [0, 1, 0]] }
                ]
            }
        }"#;
        assert!(matches!(
            PanelLayout::from_json(json),
            Err(Error::InvalidLayout(_))
        ));
    }

    #[test]
    fn test_error_converts_to_core() {
        let err: crystfind_core::Error = Error::InvalidLayout("bad".into()).into();
        assert!(matches!(err, crystfind_core::Error::Geometry(_)));
    }
}
