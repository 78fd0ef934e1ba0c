//! Streak mask generator.
//!
//! Bright streaks from jet or beamstop scatter enter the detector across
//! panel borders. Around the beam center the frame is assembled, slightly
//! blurred and thresholded; hot regions connected to a panel edge are
//! masked and the result is mapped back onto the raw pixels.
//!
//! [`StreakMaskContext`] caches everything that only depends on the
//! geometry and configuration; [`streak_mask_once`] builds a throwaway
//! context. Both run the same per-frame computation.

use crate::label::{label, Connectivity};
use crate::morphology::box_sum_2x2;
use crystfind_core::error::{Error, Result};
use crystfind_core::geometry::{
    edge_indicator, ensure_raw_shape, pixel_enumeration, DetectorGeometry, FrameSource,
};
use crystfind_core::streak::StreakMaskConfig;
use ndarray::{s, Array2, Array3, ArrayView2, ArrayView3};

/// Half-open crop bounds in assembled coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropWindow {
    /// First row.
    pub row_start: usize,
    /// One past the last row.
    pub row_end: usize,
    /// First column.
    pub col_start: usize,
    /// One past the last column.
    pub col_end: usize,
}

impl CropWindow {
    /// Square window of half width `half_width` around `center`, clipped to
    /// an image of shape `dim`.
    #[must_use]
    pub fn around(center: (usize, usize), half_width: usize, dim: (usize, usize)) -> Self {
        let clip = |c: usize, n: usize| {
            let start = c.saturating_sub(half_width).min(n);
            let end = c.saturating_add(half_width).min(n).max(start);
            (start, end)
        };
        let (row_start, row_end) = clip(center.0, dim.0);
        let (col_start, col_end) = clip(center.1, dim.1);
        Self {
            row_start,
            row_end,
            col_start,
            col_end,
        }
    }

    /// `(rows, cols)` of the window.
    #[must_use]
    pub fn dim(&self) -> (usize, usize) {
        (
            self.row_end - self.row_start,
            self.col_end - self.col_start,
        )
    }
}

/// Geometry-derived state of a usable context.
#[derive(Debug, Clone)]
struct Prepared {
    crop: CropWindow,
    /// Crop-local true-edge pixels.
    edges: Array2<bool>,
    edge_coords: Vec<(usize, usize)>,
    /// Assembled-space raw-pixel index table (1-based, 0 in gaps).
    index_table: Array2<usize>,
}

#[derive(Debug, Clone)]
enum ContextState {
    Ready(Prepared),
    Unusable,
}

/// Reusable streak mask generator for one geometry and configuration.
///
/// Immutable after construction; `Sync` whenever the geometry is.
#[derive(Debug, Clone)]
pub struct StreakMaskContext<G> {
    geometry: G,
    config: StreakMaskConfig,
    state: ContextState,
}

impl<G: DetectorGeometry> StreakMaskContext<G> {
    /// Builds the context.
    ///
    /// A geometry without a center yields an unusable context whose
    /// requests all return `Ok(None)`.
    ///
    /// # Errors
    /// Returns a configuration error or a geometry projection failure.
    pub fn create(geometry: G, config: StreakMaskConfig) -> Result<Self> {
        config.validate()?;
        let state = match geometry.center() {
            Some(center) => ContextState::Ready(prepare(&geometry, &config, center)?),
            None => {
                log::warn!("detector geometry has no center; streak masking disabled");
                ContextState::Unusable
            }
        };
        Ok(Self {
            geometry,
            config,
            state,
        })
    }

    /// Returns true when masks can be produced.
    #[must_use]
    pub fn is_usable(&self) -> bool {
        matches!(self.state, ContextState::Ready(_))
    }

    /// Crop window in assembled coordinates, if usable.
    #[must_use]
    pub fn crop_window(&self) -> Option<CropWindow> {
        match &self.state {
            ContextState::Ready(prepared) => Some(prepared.crop),
            ContextState::Unusable => None,
        }
    }

    /// Configuration used to build the context.
    #[must_use]
    pub fn config(&self) -> &StreakMaskConfig {
        &self.config
    }

    /// Geometry the context was built for.
    #[must_use]
    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    /// Streak mask for one raw frame; `true` marks usable pixels.
    ///
    /// An unusable context returns `Ok(None)` for any frame.
    ///
    /// # Errors
    /// Returns a shape mismatch or a geometry projection failure.
    pub fn streak_mask(&self, frame: ArrayView3<'_, f64>) -> Result<Option<Array3<bool>>> {
        match &self.state {
            ContextState::Ready(prepared) => {
                ensure_raw_shape(&self.geometry, &frame)?;
                compute(&self.geometry, prepared, self.config.sigma, frame).map(Some)
            }
            ContextState::Unusable => Ok(None),
        }
    }

    /// Streak mask for the frame currently held by `source`.
    ///
    /// The source is not queried when the context is unusable.
    ///
    /// # Errors
    /// Propagates frame source errors and those of [`Self::streak_mask`].
    pub fn streak_mask_from_source<S: FrameSource + ?Sized>(
        &self,
        source: &S,
    ) -> Result<Option<Array3<bool>>> {
        if !self.is_usable() {
            return Ok(None);
        }
        let frame = source.raw_frame()?;
        self.streak_mask(frame.view())
    }
}

/// One-shot streak mask; identical to building a context and asking it.
///
/// # Errors
/// See [`StreakMaskContext::create`] and [`StreakMaskContext::streak_mask`].
pub fn streak_mask_once<G: DetectorGeometry>(
    geometry: G,
    frame: ArrayView3<'_, f64>,
    config: &StreakMaskConfig,
) -> Result<Option<Array3<bool>>> {
    StreakMaskContext::create(geometry, config.clone())?.streak_mask(frame)
}

#[allow(clippy::float_cmp)]
fn prepare<G: DetectorGeometry>(
    geometry: &G,
    config: &StreakMaskConfig,
    center: (usize, usize),
) -> Result<Prepared> {
    let raw_shape = geometry.raw_shape();
    let assembled = geometry.assembled_shape();

    let edge_image = geometry.project(edge_indicator(raw_shape).view())?;
    check_assembled(&edge_image, assembled)?;
    let crop = CropWindow::around(center, config.half_width(), assembled);
    let edges = crop_of(edge_image.view(), crop).mapv(|v| v == 1.0);
    let edge_coords = edges
        .indexed_iter()
        .filter_map(|(pos, &edge)| edge.then_some(pos))
        .collect();

    let enumeration = geometry.project(pixel_enumeration(raw_shape).view())?;
    check_assembled(&enumeration, assembled)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let index_table = enumeration.mapv(|v| if v > 0.0 { v as usize } else { 0 });

    log::debug!("streak context ready: center {center:?}, crop {:?}", crop.dim());
    Ok(Prepared {
        crop,
        edges,
        edge_coords,
        index_table,
    })
}

fn check_assembled(image: &Array2<f64>, expected: (usize, usize)) -> Result<()> {
    if image.dim() == expected {
        Ok(())
    } else {
        Err(Error::Geometry(format!(
            "projection produced {:?}, expected assembled shape {expected:?}",
            image.dim()
        )))
    }
}

fn crop_of(image: ArrayView2<'_, f64>, crop: CropWindow) -> ArrayView2<'_, f64> {
    image.slice_move(s![crop.row_start..crop.row_end, crop.col_start..crop.col_end])
}

fn compute<G: DetectorGeometry>(
    geometry: &G,
    prepared: &Prepared,
    sigma: f64,
    frame: ArrayView3<'_, f64>,
) -> Result<Array3<bool>> {
    let image = geometry.project(frame)?;
    check_assembled(&image, prepared.index_table.dim())?;
    let blurred = box_sum_2x2(crop_of(image.view(), prepared.crop));

    let threshold = hot_threshold(blurred.view(), sigma);
    let hot = blurred.mapv(|v| v > threshold);
    let keep = edge_filtered_keep(&hot, prepared);

    let mut assembled_keep = Array2::from_elem(image.raw_dim(), true);
    let crop = prepared.crop;
    assembled_keep
        .slice_mut(s![crop.row_start..crop.row_end, crop.col_start..crop.col_end])
        .assign(&keep);

    let raw_shape = geometry.raw_shape();
    let mut raw_keep = vec![true; raw_shape.size()];
    for (&index, &usable) in prepared.index_table.iter().zip(&assembled_keep) {
        if index > 0 && !usable {
            if let Some(slot) = raw_keep.get_mut(index - 1) {
                *slot = false;
            }
        }
    }
    Array3::from_shape_vec(raw_shape.dim(), raw_keep)
        .map_err(|e| Error::Geometry(e.to_string()))
}

/// `mean + sigma * std` over strictly positive values; `+inf` if none.
#[allow(clippy::cast_precision_loss)]
fn hot_threshold(blurred: ArrayView2<'_, f64>, sigma: f64) -> f64 {
    let positive: Vec<f64> = blurred.iter().copied().filter(|&v| v > 0.0).collect();
    if positive.is_empty() {
        return f64::INFINITY;
    }
    let n = positive.len() as f64;
    let mean = positive.iter().sum::<f64>() / n;
    let std = (positive.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
    mean + sigma * std
}

/// Keep-map over the crop: hot regions touching a true edge are masked,
/// then edges are restored and hot edge pixels masked again.
fn edge_filtered_keep(hot: &Array2<bool>, prepared: &Prepared) -> Array2<bool> {
    let indicator = hot | &prepared.edges;
    let labels = label(indicator.view(), Connectivity::Four);

    let mut touches_edge = vec![false; labels.count() + 1];
    for &pos in &prepared.edge_coords {
        touches_edge[labels.as_array()[pos]] = true;
    }

    let mut keep = labels.as_array().mapv(|l| !touches_edge[l]);

    // Order matters: restore every edge, then mask the hot ones.
    for &pos in &prepared.edge_coords {
        keep[pos] = true;
    }
    for &pos in &prepared.edge_coords {
        if hot[pos] {
            keep[pos] = false;
        }
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crystfind_core::geometry::RawShape;
    use ndarray::Array2;

    fn prepared_for(edges: Array2<bool>) -> Prepared {
        let dim = edges.dim();
        let edge_coords = edges
            .indexed_iter()
            .filter_map(|(pos, &e)| e.then_some(pos))
            .collect();
        Prepared {
            crop: CropWindow {
                row_start: 0,
                row_end: dim.0,
                col_start: 0,
                col_end: dim.1,
            },
            edges,
            edge_coords,
            index_table: Array2::zeros(dim),
        }
    }

    #[test]
    fn test_crop_window_clipping() {
        let crop = CropWindow::around((2, 50), 5, (20, 53));
        assert_eq!(crop.row_start, 0);
        assert_eq!(crop.row_end, 7);
        assert_eq!(crop.col_start, 45);
        assert_eq!(crop.col_end, 53);
        assert_eq!(crop.dim(), (7, 8));

        // Center outside the image gives an empty window.
        let crop = CropWindow::around((100, 100), 5, (20, 20));
        assert_eq!(crop.dim(), (0, 0));
    }

    #[test]
    fn test_hot_threshold() {
        let blurred = ndarray::array![[0.0, -3.0], [2.0, 4.0]];
        // Positive values 2 and 4: mean 3, std 1.
        assert!((hot_threshold(blurred.view(), 1.0) - 4.0).abs() < 1e-12);
        assert!((hot_threshold(blurred.view(), 0.0) - 3.0).abs() < 1e-12);
        let empty = Array2::<f64>::zeros((2, 2));
        assert!(hot_threshold(empty.view(), 1.0).is_infinite());
    }

    #[test]
    fn test_edge_correction_order() {
        // Left column is a panel edge. A hot run touches it; a second hot
        // blob sits in the interior.
        let mut edges = Array2::from_elem((5, 6), false);
        edges.column_mut(0).fill(true);
        let mut hot = Array2::from_elem((5, 6), false);
        hot[[1, 0]] = true;
        hot[[1, 1]] = true;
        hot[[1, 2]] = true;
        hot[[3, 4]] = true;

        let keep = edge_filtered_keep(&hot, &prepared_for(edges));

        // Hot pixel on the edge ends masked.
        assert!(!keep[[1, 0]]);
        // Non-hot edge pixels end kept.
        assert!(keep[[0, 0]] && keep[[4, 0]]);
        // Hot run connected to the edge is masked.
        assert!(!keep[[1, 1]] && !keep[[1, 2]]);
        // Interior blob and quiet pixels are kept.
        assert!(keep[[3, 4]]);
        assert!(keep[[2, 3]]);
    }

    #[test]
    fn test_diagonal_contact_does_not_count() {
        let mut edges = Array2::from_elem((3, 3), false);
        edges[[0, 0]] = true;
        let mut hot = Array2::from_elem((3, 3), false);
        hot[[1, 1]] = true;

        let keep = edge_filtered_keep(&hot, &prepared_for(edges));
        assert!(keep[[1, 1]]);
        assert!(keep[[0, 0]]);
    }

    struct Centerless;

    impl DetectorGeometry for Centerless {
        fn raw_shape(&self) -> RawShape {
            RawShape::new(1, 4, 4)
        }

        fn assembled_shape(&self) -> (usize, usize) {
            (4, 4)
        }

        fn project(&self, raw: ArrayView3<'_, f64>) -> Result<Array2<f64>> {
            Ok(raw.index_axis(ndarray::Axis(0), 0).to_owned())
        }

        fn center(&self) -> Option<(usize, usize)> {
            None
        }
    }

    #[test]
    fn test_unusable_context() {
        let context = StreakMaskContext::create(Centerless, StreakMaskConfig::default()).unwrap();
        assert!(!context.is_usable());
        assert!(context.crop_window().is_none());

        let frame = Array3::from_elem((1, 4, 4), 1.0);
        assert!(context.streak_mask(frame.view()).unwrap().is_none());
        assert!(context.streak_mask(frame.view()).unwrap().is_none());

        // No mask is available, whatever the frame shape.
        let wrong = Array3::from_elem((2, 4, 4), 1.0);
        assert!(context.streak_mask(wrong.view()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_config() {
        let config = StreakMaskConfig::default().with_width(1);
        assert!(StreakMaskContext::create(Centerless, config).is_err());
    }
}
