//! Writing of single-file NIfTI images.
use crate::error::{CreateFileSnafu, Result, WriteDataSnafu, WriteHeaderSnafu};
use crate::header::{DataType, NiftiHeader, NiftiVersion};
use byteordered::ByteOrdered;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::ArrayViewD;
use snafu::ResultExt;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use tracing::debug;

/// A sample type which can be stored in a NIfTI image.
pub trait NiftiElement: Copy {
    /// The NIfTI data type of the sample.
    const DATATYPE: DataType;

    /// Write the sample in little endian.
    fn write_le<W: Write>(self, to: W) -> io::Result<()>;
}

impl NiftiElement for u8 {
    const DATATYPE: DataType = DataType::Uint8;

    fn write_le<W: Write>(self, to: W) -> io::Result<()> {
        ByteOrdered::le(to).write_u8(self)
    }
}

impl NiftiElement for i16 {
    const DATATYPE: DataType = DataType::Int16;

    fn write_le<W: Write>(self, to: W) -> io::Result<()> {
        ByteOrdered::le(to).write_i16(self)
    }
}

impl NiftiElement for i32 {
    const DATATYPE: DataType = DataType::Int32;

    fn write_le<W: Write>(self, to: W) -> io::Result<()> {
        ByteOrdered::le(to).write_i32(self)
    }
}

impl NiftiElement for f32 {
    const DATATYPE: DataType = DataType::Float32;

    fn write_le<W: Write>(self, to: W) -> io::Result<()> {
        ByteOrdered::le(to).write_f32(self)
    }
}

impl NiftiElement for f64 {
    const DATATYPE: DataType = DataType::Float64;

    fn write_le<W: Write>(self, to: W) -> io::Result<()> {
        ByteOrdered::le(to).write_f64(self)
    }
}

/// A builder type for options when writing NIfTI images.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    version: NiftiVersion,
    compression: Compression,
}

impl Default for WriteOptions {
    fn default() -> Self {
        WriteOptions {
            version: NiftiVersion::Nifti1,
            compression: Compression::default(),
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the version of the header to write.
    pub fn version(mut self, version: NiftiVersion) -> Self {
        self.version = version;
        self
    }

    /// Set the compression level,
    /// used when writing to a `.gz` path.
    pub fn compression(mut self, compression: Compression) -> Self {
        self.compression = compression;
        self
    }

    /// Write an image to the given path.
    ///
    /// The image dimensions and data type
    /// are taken from `data` rather than from `header`.
    /// The data is written with the first axis varying fastest.
    /// Paths ending in `.gz` are gzip-compressed.
    pub fn write<T, P>(&self, path: P, header: &NiftiHeader, data: ArrayViewD<'_, T>) -> Result<()>
    where
        T: NiftiElement,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let header = NiftiHeader {
            dim: data.shape().to_vec(),
            datatype: T::DATATYPE,
            ..header.clone()
        };
        header.validate(self.version)?;

        let file = File::create(path).context(CreateFileSnafu { path })?;
        let mut file = BufWriter::new(file);
        if is_gzip(path) {
            // samples are written one at a time
            let mut encoder = BufWriter::new(GzEncoder::new(file, self.compression));
            write_contents(&header, data, self.version, &mut encoder)?;
            let encoder = encoder
                .into_inner()
                .map_err(|e| e.into_error())
                .context(WriteDataSnafu)?;
            file = encoder.finish().context(WriteDataSnafu)?;
        } else {
            write_contents(&header, data, self.version, &mut file)?;
        }
        file.flush().context(WriteDataSnafu)?;

        debug!(
            "Wrote {:?} image of shape {:?} to {}",
            header.datatype,
            header.dim,
            path.display()
        );
        Ok(())
    }
}

/// Write an image to the given path with default options
/// apart from the header version.
///
/// See [`WriteOptions::write`].
pub fn write_image<T, P>(
    path: P,
    header: &NiftiHeader,
    data: ArrayViewD<'_, T>,
    version: NiftiVersion,
) -> Result<()>
where
    T: NiftiElement,
    P: AsRef<Path>,
{
    WriteOptions::new().version(version).write(path, header, data)
}

fn is_gzip(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == "gz")
}

fn write_contents<T, W>(
    header: &NiftiHeader,
    data: ArrayViewD<'_, T>,
    version: NiftiVersion,
    mut to: W,
) -> Result<()>
where
    T: NiftiElement,
    W: Write,
{
    header.write_to(version, &mut to)?;
    // extension flag: no extensions
    to.write_all(&[0; 4]).context(WriteHeaderSnafu)?;
    // the reversed axes view iterates with the first axis varying fastest
    for &sample in data.t().iter() {
        sample.write_le(&mut to).context(WriteDataSnafu)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteordered::byteorder::{ByteOrder, LittleEndian};
    use flate2::read::GzDecoder;
    use ndarray::{ArrayD, IxDyn, ShapeBuilder};
    use std::io::Read;

    fn sample_image() -> ArrayD<i16> {
        // shape (x = 3, y = 2), value = 10 * y + x
        ArrayD::from_shape_fn(IxDyn(&[3, 2]), |idx| (10 * idx[1] + idx[0]) as i16)
    }

    #[test]
    fn writes_first_axis_fastest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.nii");

        write_image(
            &path,
            &NiftiHeader::default(),
            sample_image().view(),
            NiftiVersion::Nifti1,
        )
        .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(bytes.len(), 352 + 6 * 2);
        assert_eq!(&bytes[348..352], &[0; 4]);
        assert_eq!(LittleEndian::read_i16(&bytes[40..]), 2);
        assert_eq!(LittleEndian::read_i16(&bytes[70..]), 4);

        let mut samples = [0; 6];
        LittleEndian::read_i16_into(&bytes[352..], &mut samples);
        assert_eq!(samples, [0, 1, 2, 10, 11, 12]);
    }

    #[test]
    fn fortran_layout_gives_same_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let c_path = dir.path().join("c.nii");
        let f_path = dir.path().join("f.nii");

        let image = sample_image();
        let mut fortran = ArrayD::zeros(IxDyn(&[3, 2]).f());
        fortran.assign(&image);

        let header = NiftiHeader::default();
        write_image(&c_path, &header, image.view(), NiftiVersion::Nifti2).unwrap();
        write_image(&f_path, &header, fortran.view(), NiftiVersion::Nifti2).unwrap();

        let c_bytes = std::fs::read(&c_path).unwrap();
        assert_eq!(c_bytes.len(), 544 + 12);
        assert_eq!(c_bytes, std::fs::read(&f_path).unwrap());
    }

    #[test]
    fn gz_path_is_compressed() {
        let dir = tempfile::tempdir().unwrap();
        let plain = dir.path().join("image.nii");
        let packed = dir.path().join("image.nii.gz");

        let image = ArrayD::from_elem(IxDyn(&[16, 16, 4]), 1.5_f64);
        let header = NiftiHeader::default();
        write_image(&plain, &header, image.view(), NiftiVersion::Nifti1).unwrap();
        WriteOptions::new()
            .compression(Compression::best())
            .write(&packed, &header, image.view())
            .unwrap();

        let packed_bytes = std::fs::read(&packed).unwrap();
        assert_eq!(&packed_bytes[..2], &[0x1f, 0x8b]);

        let mut unpacked = Vec::new();
        GzDecoder::new(&packed_bytes[..])
            .read_to_end(&mut unpacked)
            .unwrap();
        assert_eq!(unpacked, std::fs::read(&plain).unwrap());
        assert_eq!(LittleEndian::read_i16(&unpacked[70..]), 64);
    }

    #[test]
    fn large_gz_image_holds_every_sample() {
        let dir = tempfile::tempdir().unwrap();
        let packed = dir.path().join("large.nii.gz");

        // several times the size of the write buffer
        let image = ArrayD::from_shape_fn(IxDyn(&[64, 64, 8]), |idx| {
            (idx[0] as i32 * 7 - idx[1] as i32 * 13 + idx[2] as i32 * 1000) as i16
        });
        write_image(&packed, &NiftiHeader::default(), image.view(), NiftiVersion::Nifti1)
            .unwrap();

        let mut unpacked = Vec::new();
        GzDecoder::new(std::fs::File::open(&packed).unwrap())
            .read_to_end(&mut unpacked)
            .unwrap();
        assert_eq!(unpacked.len(), 352 + 64 * 64 * 8 * 2);

        let mut samples = vec![0; 64 * 64 * 8];
        LittleEndian::read_i16_into(&unpacked[352..], &mut samples);
        let expected: Vec<i16> = image.t().iter().copied().collect();
        assert_eq!(samples, expected);
    }

    #[test]
    fn invalid_shape_creates_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("image.nii");
        let image = ArrayD::<u8>::zeros(IxDyn(&[40_000, 1]));

        let err = write_image(&path, &NiftiHeader::default(), image.view(), NiftiVersion::Nifti1)
            .unwrap_err();
        assert!(matches!(err, crate::Error::DimensionTooLarge { .. }));
        assert!(!path.exists());
    }
}
