//! File writers for peak lists and masks.

use crate::Result;
use crystfind_core::mask::MaskTag;
use crystfind_core::peak::Peak;
use ndarray::{ArrayView, Dimension};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Writer for peak lists.
pub struct PeakFileWriter {
    writer: BufWriter<File>,
    header_written: bool,
}

impl PeakFileWriter {
    /// Creates a new peak writer.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        Ok(Self {
            writer,
            header_written: false,
        })
    }

    /// Writes peaks as CSV with columns `row,col,npix,atot,son`.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn write_peaks_csv(&mut self, peaks: &[Peak]) -> Result<()> {
        self.write_header("row,col,npix,atot,son")?;
        for p in peaks {
            writeln!(
                self.writer,
                "{},{},{},{},{}",
                p.row, p.col, p.pixel_count, p.integrated_intensity, p.signal_to_noise
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    /// Writes the peaks of one event, prefixing every row with the event
    /// number (`event,row,col,npix,atot,son`).
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn write_event_peaks_csv(&mut self, event: u64, peaks: &[Peak]) -> Result<()> {
        self.write_header("event,row,col,npix,atot,son")?;
        for p in peaks {
            writeln!(
                self.writer,
                "{event},{},{},{},{},{}",
                p.row, p.col, p.pixel_count, p.integrated_intensity, p.signal_to_noise
            )?;
        }

        self.writer.flush()?;
        Ok(())
    }

    fn write_header(&mut self, header: &str) -> Result<()> {
        if !self.header_written {
            writeln!(self.writer, "{header}")?;
            self.header_written = true;
        }
        Ok(())
    }

    /// Flushes the writer.
    ///
    /// # Errors
    /// Returns an error on write failure.
    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Formats a value like C's `%.18e`: 18 fractional digits and a signed,
/// at least two-digit exponent.
#[must_use]
pub fn format_scientific(value: f64) -> String {
    let formatted = format!("{value:.18e}");
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        // inf and NaN carry no exponent
        None => formatted,
    }
}

/// Writes a mask as text, one row per line, values `1` (usable) or `0`
/// in `%.18e` notation.
///
/// Arrays of any rank are written as `(-1, last_axis_len)`.
///
/// # Errors
/// Returns an error on write failure.
pub fn write_mask_text<P, D>(path: P, mask: ArrayView<'_, bool, D>) -> Result<()>
where
    P: AsRef<Path>,
    D: Dimension,
{
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    let cols = mask.shape().last().copied().unwrap_or(0).max(1);
    let one = format_scientific(1.0);
    let zero = format_scientific(0.0);

    for (i, &usable) in mask.iter().enumerate() {
        if i % cols != 0 {
            writer.write_all(b" ")?;
        }
        writer.write_all(if usable { one.as_bytes() } else { zero.as_bytes() })?;
        if i % cols == cols - 1 {
            writer.write_all(b"\n")?;
        }
    }

    writer.flush()?;
    Ok(())
}

/// Writes the deployable static mask into `dir`: `mask{tag}.txt`, plus
/// the Cheetah file `staticMask{tag}.h5` when HDF5 support is enabled.
///
/// Returns the paths written.
///
/// # Errors
/// Returns an error on write failure.
pub fn deploy_static_mask<P: AsRef<Path>>(
    dir: P,
    mask: ArrayView<'_, bool, ndarray::Ix3>,
    tag: &MaskTag,
    event: u64,
) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    let text_path = dir.join(tag.file_name("mask", event, "txt"));
    write_mask_text(&text_path, mask)?;
    log::info!("deployed static mask to {}", text_path.display());

    #[allow(unused_mut)]
    let mut written = vec![text_path];

    #[cfg(feature = "hdf5")]
    {
        let (panels, rows, cols) = mask.dim();
        let stacked = mask
            .to_shape((panels * rows, cols))
            .map_err(|e| crate::Error::InvalidFormat(format!("mask shape: {e}")))?;
        let h5_path = dir.join(tag.file_name("staticMask", event, "h5"));
        crate::hdf5::write_cheetah_mask(&h5_path, stacked.view())?;
        log::info!("deployed Cheetah mask to {}", h5_path.display());
        written.push(h5_path);
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::read_mask_text;
    use ndarray::{array, Array3};
    use tempfile::{tempdir, NamedTempFile};

    fn peak(row: f64, col: f64, npix: usize, atot: f64, son: f64) -> Peak {
        Peak {
            row,
            col,
            pixel_count: npix,
            integrated_intensity: atot,
            signal_to_noise: son,
        }
    }

    #[test]
    fn test_write_peaks_csv() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = PeakFileWriter::create(file.path()).unwrap();

        let peaks = vec![
            peak(1.5, 2.5, 5, 1000.0, 12.5),
            peak(10.25, 20.75, 8, 2000.5, -1.0),
        ];

        writer.write_peaks_csv(&peaks).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("row,col,npix,atot,son\n"));
        assert!(content.contains("1.5,2.5,5,1000,12.5"));
        assert!(content.contains("10.25,20.75,8,2000.5,-1"));
    }

    #[test]
    fn test_write_event_peaks_single_header() {
        let file = NamedTempFile::new().unwrap();
        let mut writer = PeakFileWriter::create(file.path()).unwrap();

        writer
            .write_event_peaks_csv(3, &[peak(1.0, 2.0, 3, 4.0, 5.0)])
            .unwrap();
        writer.write_event_peaks_csv(4, &[]).unwrap();
        writer
            .write_event_peaks_csv(5, &[peak(6.0, 7.0, 8, 9.0, 10.0)])
            .unwrap();

        // Every call reaches the file without an explicit flush.
        let content = std::fs::read_to_string(file.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(
            lines,
            vec!["event,row,col,npix,atot,son", "3,1,2,3,4,5", "5,6,7,8,9,10"]
        );
    }

    #[test]
    fn test_format_scientific() {
        assert_eq!(format_scientific(1.0), "1.000000000000000000e+00");
        assert_eq!(format_scientific(0.0), "0.000000000000000000e+00");
        assert_eq!(format_scientific(-0.25), "-2.500000000000000000e-01");
        // 2.5e-7 has no exact binary form; all 18 digits are printed.
        assert_eq!(format_scientific(-2.5e-7), "-2.499999999999999887e-07");
        assert_eq!(format_scientific(1024.0), "1.024000000000000000e+03");
        assert_eq!(format_scientific(2.0_f64.powi(400)), "2.582249878086908590e+120");
    }

    #[test]
    fn test_mask_text_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mask = Array3::from_shape_fn((2, 2, 3), |(p, r, c)| (p + r + c) % 2 == 0);
        write_mask_text(file.path(), mask.view()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(content.lines().count(), 4);
        assert!(content.starts_with("1.000000000000000000e+00 0.000000000000000000e+00"));

        let read = read_mask_text(file.path()).unwrap();
        assert_eq!(read.dim(), (4, 3));
        let expected = mask.into_shape_with_order((4, 3)).unwrap();
        assert_eq!(read, expected);
    }

    #[test]
    fn test_deploy_static_mask() {
        let dir = tempdir().unwrap();
        let mask = array![[[true, false], [true, true]]];
        let written =
            deploy_static_mask(dir.path(), mask.view(), &MaskTag::new("run$n"), 12).unwrap();

        assert_eq!(written[0], dir.path().join("mask_run12.txt"));
        let read = read_mask_text(&written[0]).unwrap();
        assert_eq!(read, array![[true, false], [true, true]]);
    }
}
