//! Pixel masks: combination, threshold editing and file tags.
//!
//! Masks are boolean arrays where `true` marks a usable pixel and `false`
//! a pixel to exclude.

use crate::error::{ensure_shape, Result};
use ndarray::{Array, ArrayView, Dimension, Zip};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Logical AND of every present mask.
///
/// Absent entries are skipped; with no masks at all the result is all-true.
///
/// # Errors
/// Returns [`crate::Error::ShapeMismatch`] if a mask's shape differs from `dim`.
pub fn combine_masks<'a, D, I>(dim: D, masks: I) -> Result<Array<bool, D>>
where
    D: Dimension,
    I: IntoIterator<Item = Option<ArrayView<'a, bool, D>>>,
{
    let mut combined = Array::from_elem(dim, true);
    for mask in masks.into_iter().flatten() {
        ensure_shape("mask", combined.shape(), mask.shape())?;
        Zip::from(&mut combined)
            .and(&mask)
            .for_each(|out, &keep| *out &= keep);
    }
    Ok(combined)
}

/// Masks every pixel outside `[low, high]`.
///
/// NaN pixels compare false against both bounds and stay usable.
#[must_use]
pub fn threshold_mask<D: Dimension>(
    image: ArrayView<'_, f64, D>,
    low: f64,
    high: f64,
) -> Array<bool, D> {
    image.mapv(|v| !(v < low || v > high))
}

/// How an edit is merged into an existing user mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MaskingMode {
    /// Pixels the edit excludes become excluded.
    #[default]
    Mask,
    /// Pixels the edit excludes become usable again.
    Unmask,
    /// Pixels the edit excludes flip state.
    Toggle,
}

/// Merges `edit` into `user` according to `mode`.
///
/// # Errors
/// Returns [`crate::Error::ShapeMismatch`] if the shapes differ.
pub fn apply_edit<D: Dimension>(
    user: &mut Array<bool, D>,
    edit: ArrayView<'_, bool, D>,
    mode: MaskingMode,
) -> Result<()> {
    ensure_shape("mask edit", user.shape(), edit.shape())?;
    Zip::from(user).and(&edit).for_each(|out, &keep| match mode {
        MaskingMode::Mask => *out &= keep,
        MaskingMode::Unmask => *out |= !keep,
        MaskingMode::Toggle => {
            if !keep {
                *out = !*out;
            }
        }
    });
    Ok(())
}

/// The set of masks a frame may be filtered with.
#[derive(Debug, Clone, Default)]
pub struct MaskSet<D: Dimension> {
    /// User-drawn mask.
    pub user: Option<Array<bool, D>>,
    /// Detector status mask (bad, unbonded or edge pixels).
    pub detector: Option<Array<bool, D>>,
    /// Per-frame streak mask.
    pub streak: Option<Array<bool, D>>,
}

impl<D: Dimension> MaskSet<D> {
    /// Creates an empty mask set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            user: None,
            detector: None,
            streak: None,
        }
    }

    /// Combination of the masks that do not change per frame.
    ///
    /// # Errors
    /// Returns [`crate::Error::ShapeMismatch`] on inconsistent shapes.
    pub fn static_mask(&self, dim: D) -> Result<Array<bool, D>> {
        combine_masks(
            dim,
            [
                self.user.as_ref().map(|m| m.view()),
                self.detector.as_ref().map(|m| m.view()),
            ],
        )
    }

    /// Combination of every mask, streak mask included.
    ///
    /// # Errors
    /// Returns [`crate::Error::ShapeMismatch`] on inconsistent shapes.
    pub fn combined(&self, dim: D) -> Result<Array<bool, D>> {
        combine_masks(
            dim,
            [
                self.user.as_ref().map(|m| m.view()),
                self.detector.as_ref().map(|m| m.view()),
                self.streak.as_ref().map(|m| m.view()),
            ],
        )
    }
}

/// Optional tag appended to persisted mask file names.
///
/// `$n` in the tag expands to the event number.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MaskTag(Option<String>);

impl MaskTag {
    /// Creates a tag; an empty string means no tag.
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        let tag = tag.into();
        if tag.is_empty() {
            Self(None)
        } else {
            Self(Some(tag))
        }
    }

    /// No tag.
    #[must_use]
    pub fn none() -> Self {
        Self(None)
    }

    /// File-name suffix for `event`: empty, or `_` followed by the expanded tag.
    #[must_use]
    pub fn suffix(&self, event: u64) -> String {
        match &self.0 {
            Some(tag) => format!("_{}", tag.replace("$n", &event.to_string())),
            None => String::new(),
        }
    }

    /// Builds `{stem}{suffix}.{extension}`.
    #[must_use]
    pub fn file_name(&self, stem: &str, event: u64, extension: &str) -> String {
        format!("{stem}{}.{extension}", self.suffix(event))
    }
}
