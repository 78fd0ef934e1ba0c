//! crystfind-io: file I/O for crystfind.
//!
//! Reads frames and masks from text, writes peak lists as CSV and deploys
//! static masks. Cheetah HDF5 mask files are available behind the `hdf5`
//! feature.
//!

mod error;
#[cfg(feature = "hdf5")]
pub mod hdf5;
mod reader;
mod writer;

pub use error::{Error, Result};
#[cfg(feature = "hdf5")]
pub use hdf5::{read_cheetah_mask, write_cheetah_mask};
pub use reader::{
    parse_frame_text, read_frame_text, read_mask_text, unstack_panels, TextFrameSource,
};
pub use writer::{deploy_static_mask, format_scientific, write_mask_text, PeakFileWriter};
