//! crystfind-python: PyO3 Python bindings for crystfind.
#![allow(
    clippy::doc_markdown,
    clippy::needless_pass_by_value,
    clippy::too_many_arguments,
    clippy::elidable_lifetime_names
)]
//!
//! Frames and masks are exchanged as numpy arrays; `True` in a mask marks a
//! usable pixel.

use crystfind_algorithms::{find_peaks_with_streak_mask, StreakMaskContext};
use crystfind_core::geometry::{DetectorGeometry, RawShape};
use crystfind_core::peak::{Peak, PeakFinderConfig};
use crystfind_core::streak::StreakMaskConfig;
use crystfind_geometry::PanelLayout;
use ndarray::{Array2, Ix3};
use numpy::{IntoPyArray, PyArray2, PyArray3, PyReadonlyArray2, PyReadonlyArray3};
use pyo3::prelude::*;

fn io_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyIOError::new_err(format!("{context}: {err}"))
}

fn value_error(context: &str, err: impl std::fmt::Display) -> PyErr {
    pyo3::exceptions::PyValueError::new_err(format!("{context}: {err}"))
}

fn peaks_to_array(peaks: &[Peak]) -> Array2<f64> {
    let mut out = Array2::zeros((peaks.len(), 5));
    for (mut row, peak) in out.outer_iter_mut().zip(peaks) {
        for (slot, value) in row.iter_mut().zip(peak.to_row()) {
            *slot = value;
        }
    }
    out
}

fn peak_config(
    npix_min: usize,
    npix_max: usize,
    atot_thr: f64,
    son_min: f64,
    hvalue: f64,
    r1: f64,
    r2: f64,
) -> PeakFinderConfig {
    PeakFinderConfig::new()
        .with_npix(npix_min, npix_max)
        .with_atot_thr(atot_thr)
        .with_son_min(son_min)
        .with_hvalue(hvalue)
        .with_radii(r1, r2)
}

/// Find peaks in a 2D frame.
///
/// Returns an `(n, 5)` array with columns `row, col, npix, atot, son`.
#[pyfunction]
#[pyo3(signature = (frame, mask=None, npix_min=2, npix_max=30, atot_thr=600.0, son_min=10.0, hvalue=35.0, r1=3.0, r2=6.0))]
fn find_peaks<'py>(
    py: Python<'py>,
    frame: PyReadonlyArray2<'py, f64>,
    mask: Option<PyReadonlyArray2<'py, bool>>,
    npix_min: usize,
    npix_max: usize,
    atot_thr: f64,
    son_min: f64,
    hvalue: f64,
    r1: f64,
    r2: f64,
) -> PyResult<Bound<'py, PyArray2<f64>>> {
    let config = peak_config(npix_min, npix_max, atot_thr, son_min, hvalue, r1, r2);
    let frame = frame.as_array();
    let mask = mask.as_ref().map(|m| m.as_array());
    let peaks = py
        .allow_threads(|| crystfind_algorithms::find_peaks(frame, &config, mask))
        .map_err(|e| value_error("find_peaks", e))?;
    Ok(peaks_to_array(&peaks).into_pyarray(py))
}

/// Build a donut mask.
///
/// Returns `(ring, row_offset, col_offset)`.
#[pyfunction]
#[pyo3(signature = (height, width, outer_radius, inner_radius, center=None))]
fn donut_mask<'py>(
    py: Python<'py>,
    height: usize,
    width: usize,
    outer_radius: f64,
    inner_radius: f64,
    center: Option<(f64, f64)>,
) -> (
    Bound<'py, PyArray2<bool>>,
    Bound<'py, PyArray2<f64>>,
    Bound<'py, PyArray2<f64>>,
) {
    let donut = crystfind_core::donut_mask(height, width, outer_radius, inner_radius, center);
    (
        donut.ring.into_pyarray(py),
        donut.row_offset.into_pyarray(py),
        donut.col_offset.into_pyarray(py),
    )
}

/// Logical AND of raw-shaped masks; `None` entries are skipped.
#[pyfunction]
fn combine_masks<'py>(
    py: Python<'py>,
    shape: (usize, usize, usize),
    masks: Vec<Option<PyReadonlyArray3<'py, bool>>>,
) -> PyResult<Bound<'py, PyArray3<bool>>> {
    let views = masks.iter().map(|m| m.as_ref().map(|m| m.as_array()));
    crystfind_core::combine_masks(Ix3(shape.0, shape.1, shape.2), views)
        .map(|combined| combined.into_pyarray(py))
        .map_err(|e| value_error("combine_masks", e))
}

/// Python wrapper for PanelLayout.
#[pyclass(name = "PanelLayout")]
#[derive(Clone)]
pub struct PyPanelLayout {
    inner: PanelLayout,
}

#[pymethods]
impl PyPanelLayout {
    /// Panels stacked vertically in assembled space.
    #[staticmethod]
    #[pyo3(signature = (panels, rows, cols, center=None))]
    fn stacked(
        panels: usize,
        rows: usize,
        cols: usize,
        center: Option<(usize, usize)>,
    ) -> PyResult<Self> {
        PanelLayout::stacked(RawShape::new(panels, rows, cols))
            .with_center(center)
            .map(|inner| Self { inner })
            .map_err(|e| value_error("PanelLayout.stacked", e))
    }

    #[staticmethod]
    fn from_file(path: &str) -> PyResult<Self> {
        PanelLayout::from_file(path)
            .map(|inner| Self { inner })
            .map_err(|e| io_error(&format!("PanelLayout.from_file({path})"), e))
    }

    #[staticmethod]
    fn from_json(json: &str) -> PyResult<Self> {
        PanelLayout::from_json(json)
            .map(|inner| Self { inner })
            .map_err(|e| value_error("PanelLayout.from_json", e))
    }

    #[getter]
    fn raw_shape(&self) -> (usize, usize, usize) {
        self.inner.raw_shape().dim()
    }

    #[getter]
    fn assembled_shape(&self) -> (usize, usize) {
        self.inner.assembled_shape()
    }

    #[getter]
    fn center(&self) -> Option<(usize, usize)> {
        self.inner.center()
    }

    /// Assemble a raw `(panels, rows, cols)` array into a 2D image.
    fn project<'py>(
        &self,
        py: Python<'py>,
        raw: PyReadonlyArray3<'py, f64>,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        self.inner
            .project(raw.as_array())
            .map(|image| image.into_pyarray(py))
            .map_err(|e| value_error("PanelLayout.project", e))
    }

    fn __repr__(&self) -> String {
        let raw = self.inner.raw_shape();
        let (rows, cols) = self.inner.assembled_shape();
        format!(
            "PanelLayout(panels={}, panel_shape=({}, {}), assembled=({rows}, {cols}), center={:?})",
            raw.panels,
            raw.rows,
            raw.cols,
            self.inner.center()
        )
    }
}

/// Reusable streak mask generator bound to one panel layout.
#[pyclass(name = "StreakMask")]
pub struct PyStreakMask {
    inner: StreakMaskContext<PanelLayout>,
}

#[pymethods]
impl PyStreakMask {
    #[new]
    #[pyo3(signature = (layout, width=300, sigma=1.0))]
    fn new(layout: PyPanelLayout, width: usize, sigma: f64) -> PyResult<Self> {
        let config = StreakMaskConfig::new().with_width(width).with_sigma(sigma);
        StreakMaskContext::create(layout.inner, config)
            .map(|inner| Self { inner })
            .map_err(|e| value_error("StreakMask", e))
    }

    /// False when the layout has no center; `mask` then returns None.
    #[getter]
    fn usable(&self) -> bool {
        self.inner.is_usable()
    }

    /// Crop bounds `(row_start, row_end, col_start, col_end)` in assembled space.
    #[getter]
    fn crop(&self) -> Option<(usize, usize, usize, usize)> {
        self.inner
            .crop_window()
            .map(|w| (w.row_start, w.row_end, w.col_start, w.col_end))
    }

    /// Streak mask for a raw frame, or None when unusable.
    fn mask<'py>(
        &self,
        py: Python<'py>,
        frame: PyReadonlyArray3<'py, f64>,
    ) -> PyResult<Option<Bound<'py, PyArray3<bool>>>> {
        let frame = frame.as_array();
        let mask = py
            .allow_threads(|| self.inner.streak_mask(frame))
            .map_err(|e| value_error("StreakMask.mask", e))?;
        Ok(mask.map(|m| m.into_pyarray(py)))
    }

    /// Streak-mask a raw frame and find peaks on its stacked panels.
    #[pyo3(signature = (frame, static_mask=None, npix_min=2, npix_max=30, atot_thr=600.0, son_min=10.0, hvalue=35.0, r1=3.0, r2=6.0))]
    fn find_peaks<'py>(
        &self,
        py: Python<'py>,
        frame: PyReadonlyArray3<'py, f64>,
        static_mask: Option<PyReadonlyArray3<'py, bool>>,
        npix_min: usize,
        npix_max: usize,
        atot_thr: f64,
        son_min: f64,
        hvalue: f64,
        r1: f64,
        r2: f64,
    ) -> PyResult<Bound<'py, PyArray2<f64>>> {
        let config = peak_config(npix_min, npix_max, atot_thr, son_min, hvalue, r1, r2);
        let frame = frame.as_array();
        let static_mask = static_mask.as_ref().map(|m| m.as_array());
        let peaks = py
            .allow_threads(|| {
                find_peaks_with_streak_mask(frame, &self.inner, static_mask, &config)
            })
            .map_err(|e| value_error("StreakMask.find_peaks", e))?;
        Ok(peaks_to_array(&peaks).into_pyarray(py))
    }
}

/// Python module for crystfind.
#[pymodule]
fn crystfind(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyPanelLayout>()?;
    m.add_class::<PyStreakMask>()?;
    m.add_function(wrap_pyfunction!(find_peaks, m)?)?;
    m.add_function(wrap_pyfunction!(donut_mask, m)?)?;
    m.add_function(wrap_pyfunction!(combine_masks, m)?)?;
    Ok(())
}
