//! Cheetah-compatible static mask files.
//!
//! The mask is stored as a 2D `i32` dataset (1 usable, 0 excluded) at
//! `/entry_1/data_1/mask`, with a soft link at `/data/data` for readers that
//! expect the plain layout.

use crate::{Error, Result};
use hdf5::types::VarLenUnicode;
use hdf5::{File, Group};
use ndarray::{Array2, ArrayView2};
use std::path::Path;
use std::str::FromStr;

/// Dataset path of the mask.
pub const MASK_DATASET: &str = "/entry_1/data_1/mask";

/// Writes a Cheetah static mask file.
///
/// # Errors
/// Returns an error if the file or any of its objects cannot be created.
pub fn write_cheetah_mask<P: AsRef<Path>>(path: P, mask: ArrayView2<'_, bool>) -> Result<()> {
    let file = File::create(path)?;
    set_attr_str(&file, "creator", concat!("crystfind ", env!("CARGO_PKG_VERSION")))?;

    let data_1 = file.create_group("entry_1")?.create_group("data_1")?;
    let values = mask.mapv(i32::from);
    let dataset = data_1
        .new_dataset::<i32>()
        .shape(values.dim())
        .create("mask")?;
    dataset.write(values.view())?;

    let data = file.create_group("data")?;
    data.link_soft(MASK_DATASET, "data")?;
    Ok(())
}

/// Reads the mask written by [`write_cheetah_mask`]; non-zero values are
/// usable pixels.
///
/// # Errors
/// Returns an error if the file or the dataset cannot be read, or the
/// dataset is not two-dimensional.
pub fn read_cheetah_mask<P: AsRef<Path>>(path: P) -> Result<Array2<bool>> {
    let file = File::open(path)?;
    let dataset = file.dataset(MASK_DATASET)?;
    if dataset.ndim() != 2 {
        return Err(Error::InvalidFormat(format!(
            "{MASK_DATASET}: expected 2 dimensions, found {}",
            dataset.ndim()
        )));
    }
    let values = dataset.read_2d::<i32>()?;
    Ok(values.mapv(|v| v != 0))
}

fn set_attr_str(group: &Group, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| Error::InvalidFormat(format!("invalid utf-8 attribute: {e}")))?;
    group
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}
