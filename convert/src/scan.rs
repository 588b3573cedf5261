//! Conversion of a single scan.
use crate::diffusion::DiffusionTable;
use crate::error::{
    AssembleVolumeSnafu, BuildTransformSnafu, CreateOutputFolderSnafu, ExtractMetadataSnafu,
    InvalidOptionsSnafu, MissingInputFolderSnafu, ReadParametersSnafu, Result, WriteFileSnafu,
    WriteImageSnafu,
};
use crate::metadata::{ScanMetadata, ScanParameters};
use crate::options::ConvertOptions;
use crate::transform::SpatialTransform;
use crate::volume::{read_volume, Rescale, VolumeData};
use bruker2nifti_nifti::{NiftiHeader, UNITS_MM, UNITS_SEC};
use snafu::{ensure, ResultExt};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Name of the raw data file of a reconstruction.
const RAW_DATA_FILE: &str = "2dseq";

/// Everything produced by the conversion of one scan,
/// before it is written out.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversionResult {
    pub volume: VolumeData,
    pub transform: SpatialTransform,
    pub metadata: ScanMetadata,
    /// The diffusion table to write,
    /// normalised into the image frame if requested.
    pub diffusion: Option<DiffusionTable>,
    pub parameters: ScanParameters,
}

/// Convert the scan in the folder `input` in memory.
pub fn convert(input: impl AsRef<Path>, options: &ConvertOptions) -> Result<ConversionResult> {
    let input = input.as_ref();
    options.validate().context(InvalidOptionsSnafu)?;
    ensure!(input.is_dir(), MissingInputFolderSnafu { path: input });
    assemble(input, options)
}

fn assemble(input: &Path, options: &ConvertOptions) -> Result<ConversionResult> {
    let parameters = ScanParameters::read(input, options.reco_number)
        .context(ReadParametersSnafu { path: input })?;
    let metadata =
        ScanMetadata::extract(&parameters).context(ExtractMetadataSnafu { path: input })?;
    let transform = SpatialTransform::build(
        &metadata,
        options.axis_direction,
        options.qform,
        options.sform,
    )
    .context(BuildTransformSnafu { path: input })?;

    let raw_data = input
        .join("pdata")
        .join(options.reco_number.to_string())
        .join(RAW_DATA_FILE);
    let mut volume = read_volume(
        &raw_data,
        &metadata.shape,
        metadata.sample_type,
        metadata.endianness,
    )
    .context(AssembleVolumeSnafu { path: input })?;

    if options.correct_slope {
        let rescale = Rescale::new(
            metadata.slope.unwrap_or(1.),
            metadata.offset.unwrap_or(0.),
        );
        if options.verbose >= 2 {
            debug!("Applying {:?}", rescale);
        }
        volume = volume.rescale(rescale);
    }

    let diffusion = metadata.diffusion.as_ref().map(|table| {
        if options.normalise_b_vectors_if_dwi {
            table.normalised(&transform.rotation())
        } else {
            table.clone()
        }
    });

    Ok(ConversionResult {
        volume,
        transform,
        metadata,
        diffusion,
        parameters,
    })
}

impl ConversionResult {
    /// The NIfTI header describing the converted image.
    ///
    /// The intensity correction, if any, is already in the samples,
    /// so the header slope and intercept are the identity.
    pub fn nifti_header(&self) -> NiftiHeader {
        let mut header = NiftiHeader {
            descrip: self.metadata.method.clone().unwrap_or_default(),
            qform_code: self.transform.qform_code().into(),
            sform_code: self.transform.sform_code().into(),
            xyzt_units: UNITS_MM | UNITS_SEC,
            scl_slope: 1.,
            scl_inter: 0.,
            ..Default::default()
        };
        header.set_affine(self.transform.affine());
        if self.metadata.volumes > 1 {
            if let Some(repetition_time) = self.metadata.repetition_time {
                header.pixdim[self.metadata.shape.len()] = repetition_time / 1000.;
            }
        }
        header
    }

    /// Write the image and its side files into the folder `output`,
    /// which must exist.
    ///
    /// Returns the paths of all files written.
    pub fn save(&self, output: &Path, stem: &str, options: &ConvertOptions) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();

        let image = output.join(format!("{}.{}", stem, options.image_extension()));
        self.volume
            .write_nifti(&image, &self.nifti_header(), options.nifti_version)
            .context(WriteImageSnafu { path: &image })?;
        written.push(image);

        if let Some(table) = &self.diffusion {
            written.push(write_file(output.join(format!("{}_bvals.txt", stem)), |to| {
                table.write_bvals(to)
            })?);
            written.push(write_file(output.join(format!("{}_bvecs.txt", stem)), |to| {
                table.write_bvecs(to)
            })?);
        }

        if options.save_human_readable {
            for (name, set) in self.parameters.iter() {
                let path = output.join(format!("{}_{}.txt", stem, name));
                written.push(write_file(path, |to| set.write_dump(to))?);
            }
        }

        if options.verbose >= 2 {
            for path in &written {
                debug!("Wrote {}", path.display());
            }
        }
        Ok(written)
    }
}

fn write_file<F>(path: PathBuf, write: F) -> Result<PathBuf>
where
    F: FnOnce(&mut BufWriter<File>) -> io::Result<()>,
{
    let outcome = File::create(&path).and_then(|file| {
        let mut to = BufWriter::new(file);
        write(&mut to)?;
        to.flush()
    });
    outcome.context(WriteFileSnafu { path: &path })?;
    Ok(path)
}

/// Convert the scan in the folder `input`,
/// writing the results into the folder `output`.
///
/// The output folder is created along with its parents if necessary.
/// Output files are named after `stem`,
/// or after the input folder when no stem is given.
/// Nothing is written if the scan cannot be read.
///
/// Returns the paths of all files written.
pub fn convert_scan(
    input: impl AsRef<Path>,
    output: impl AsRef<Path>,
    stem: Option<&str>,
    options: &ConvertOptions,
) -> Result<Vec<PathBuf>> {
    let input = input.as_ref();
    let output = output.as_ref();

    options.validate().context(InvalidOptionsSnafu)?;
    ensure!(input.is_dir(), MissingInputFolderSnafu { path: input });
    std::fs::create_dir_all(output).context(CreateOutputFolderSnafu { path: output })?;

    let stem = match stem {
        Some(stem) => stem.to_string(),
        None => input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "scan".to_string()),
    };

    if options.verbose >= 1 {
        info!("Converting scan {} into {}", input.display(), output.display());
    }
    let result = assemble(input, options)?;
    let written = result.save(output, &stem, options)?;
    if options.verbose >= 1 {
        info!(
            "Scan {} converted, image shape {:?}",
            input.display(),
            result.volume.shape()
        );
    }
    Ok(written)
}
