//! Extraction of the image geometry and acquisition details
//! from the parameter sets of a scan.
use crate::diffusion::DiffusionTable;
use crate::volume::SampleType;
use bruker2nifti_parser::{read_parameter_file, ParameterSet, ParameterValue};
use byteordered::Endianness;
use smallvec::SmallVec;
use snafu::{ensure, Backtrace, OptionExt, Snafu};
use std::borrow::Cow;
use std::path::Path;
use tracing::{debug, warn};

/// Orientation vectors of a magnitude below this value are degenerate.
const ORIENTATION_THRESHOLD: f64 = 1e-6;
/// Counts of voxels, frames or slices may not exceed this value.
const MAX_COUNT: f64 = i32::MAX as f64;

#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Missing required field `{}` in {}", field, set))]
    MissingField {
        field: &'static str,
        set: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid value `{}` for field `{}` in {}", value, field, set))]
    InvalidValue {
        field: &'static str,
        set: &'static str,
        value: String,
        backtrace: Backtrace,
    },

    /// An orientation vector has (nearly) zero length.
    #[snafu(display("Degenerate orientation vector {:?}", vector))]
    DegenerateOrientation {
        vector: [f64; 3],
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The parameter sets of a single scan and reconstruction.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanParameters {
    pub acqp: ParameterSet,
    pub method: ParameterSet,
    pub reco: ParameterSet,
    pub visu_pars: ParameterSet,
    /// The subject of the study holding the scan, when available.
    pub subject: Option<ParameterSet>,
}

impl ScanParameters {
    /// Read the parameter sets of the scan in `scan`
    /// for the reconstruction `pdata/<reco_number>`.
    ///
    /// The `subject` set is looked up in the parent (study) folder.
    pub fn read(scan: &Path, reco_number: u32) -> bruker2nifti_parser::Result<Self> {
        let pdata = scan.join("pdata").join(reco_number.to_string());
        let subject = match scan.parent() {
            Some(study) if study.join("subject").is_file() => {
                Some(read_parameter_file("subject", study)?)
            }
            _ => None,
        };

        Ok(ScanParameters {
            acqp: read_parameter_file("acqp", scan)?,
            method: read_parameter_file("method", scan)?,
            reco: read_parameter_file("reco", &pdata)?,
            visu_pars: read_parameter_file("visu_pars", &pdata)?,
            subject,
        })
    }

    /// Iterate over the parameter sets along with their names,
    /// in the order `acqp`, `method`, `reco`, `visu_pars`, `subject`.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &ParameterSet)> {
        [
            ("acqp", Some(&self.acqp)),
            ("method", Some(&self.method)),
            ("reco", Some(&self.reco)),
            ("visu_pars", Some(&self.visu_pars)),
            ("subject", self.subject.as_ref()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.map(|set| (name, set)))
    }
}

/// The description of a scan's image,
/// as needed to assemble and place it in space.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanMetadata {
    /// Image dimensions: two or three spatial axes,
    /// then the volume axis if there is more than one volume.
    pub shape: SmallVec<[usize; 4]>,
    /// Voxel spacing along the three spatial axes, in millimeters.
    pub spacing: [f64; 3],
    /// Unit vectors of the first two image axes in world space.
    pub orientation: [[f64; 3]; 2],
    /// World position of the first voxel, in millimeters.
    pub position: [f64; 3],
    pub sample_type: SampleType,
    pub endianness: Endianness,
    /// Number of volumes (repetitions or diffusion experiments).
    pub volumes: usize,
    pub diffusion: Option<DiffusionTable>,
    /// Data slope; absent means 1.
    pub slope: Option<f64>,
    /// Data offset; absent means 0.
    pub offset: Option<f64>,
    /// Repetition time in milliseconds.
    pub repetition_time: Option<f64>,
    /// The acquisition method, such as `Bruker:FLASH`.
    pub method: Option<String>,
}

/// A named parameter set from which fields are fetched.
#[derive(Debug, Copy, Clone)]
struct Source<'a> {
    name: &'static str,
    set: &'a ParameterSet,
}

impl<'a> Source<'a> {
    fn new(name: &'static str, set: &'a ParameterSet) -> Self {
        Source { name, set }
    }

    fn invalid(&self, field: &'static str, value: impl ToString) -> Error {
        InvalidValueSnafu {
            field,
            set: self.name,
            value: value.to_string(),
        }
        .build()
    }

    fn required(&self, field: &'static str) -> Result<&'a ParameterValue> {
        self.set.get(field).context(MissingFieldSnafu {
            field,
            set: self.name,
        })
    }

    fn numbers(&self, field: &'static str) -> Result<Cow<'a, [f64]>> {
        let value = self.required(field)?;
        value.to_multi_f64().ok_or_else(|| self.invalid(field, value))
    }

    fn optional_numbers(&self, field: &'static str) -> Result<Option<Cow<'a, [f64]>>> {
        match self.set.get(field) {
            None => Ok(None),
            Some(value) => value
                .to_multi_f64()
                .map(Some)
                .ok_or_else(|| self.invalid(field, value)),
        }
    }

    /// The first number of a field holding one or more numbers.
    fn number(&self, field: &'static str) -> Result<f64> {
        let numbers = self.numbers(field)?;
        numbers
            .first()
            .copied()
            .ok_or_else(|| self.invalid(field, "( 0 )"))
    }

    fn optional_number(&self, field: &'static str) -> Result<Option<f64>> {
        Ok(self
            .optional_numbers(field)?
            .and_then(|numbers| numbers.first().copied()))
    }

    fn text(&self, field: &'static str) -> Result<&'a str> {
        let value = self.required(field)?;
        value.as_text().ok_or_else(|| self.invalid(field, value))
    }

    fn optional_text(&self, field: &'static str) -> Result<Option<&'a str>> {
        match self.set.get(field) {
            None => Ok(None),
            Some(value) => value
                .as_text()
                .map(Some)
                .ok_or_else(|| self.invalid(field, value)),
        }
    }

    /// Fetch exactly `n` leading numbers of a field.
    fn leading(&self, field: &'static str, n: usize) -> Result<Cow<'a, [f64]>> {
        let numbers = self.numbers(field)?;
        if numbers.len() < n {
            return Err(self.invalid(field, format!("{:?}", numbers)));
        }
        Ok(match numbers {
            Cow::Borrowed(values) => Cow::Borrowed(&values[..n]),
            Cow::Owned(mut values) => {
                values.truncate(n);
                Cow::Owned(values)
            }
        })
    }

    /// Interpret a number as a count of things.
    fn count(&self, field: &'static str, value: f64) -> Result<usize> {
        ensure!(
            (0. ..=MAX_COUNT).contains(&value) && value.fract() == 0.,
            InvalidValueSnafu {
                field,
                set: self.name,
                value: value.to_string(),
            }
        );
        Ok(value as usize)
    }

    /// Interpret a number as a positive count.
    fn positive_count(&self, field: &'static str, value: f64) -> Result<usize> {
        match self.count(field, value)? {
            0 => Err(self.invalid(field, value)),
            n => Ok(n),
        }
    }
}

fn unit_vector(v: [f64; 3]) -> Result<[f64; 3]> {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    ensure!(
        norm >= ORIENTATION_THRESHOLD,
        DegenerateOrientationSnafu { vector: v }
    );
    Ok(v.map(|x| x / norm))
}

/// Report per-frame values which are not all the same.
fn check_uniform(field: &str, values: &[f64]) {
    if let Some(first) = values.first() {
        if values.iter().any(|v| v != first) {
            warn!(
                "Field `{}` varies across frames, only the first value ({}) is used",
                field, first
            );
        }
    }
}

impl ScanMetadata {
    /// Extract the metadata of a scan from its parameter sets.
    pub fn extract(parameters: &ScanParameters) -> Result<Self> {
        let visu = Source::new("visu_pars", &parameters.visu_pars);
        let method = Source::new("method", &parameters.method);
        let acqp = Source::new("acqp", &parameters.acqp);

        let rank = match visu.number("VisuCoreDim")? {
            d if d == 2. => 2,
            d if d == 3. => 3,
            d => return Err(visu.invalid("VisuCoreDim", d)),
        };

        let size = visu
            .leading("VisuCoreSize", rank)?
            .iter()
            .map(|&v| visu.positive_count("VisuCoreSize", v))
            .collect::<Result<Vec<_>>>()?;
        let extent = visu.leading("VisuCoreExtent", rank)?;
        if extent.iter().any(|&e| e <= 0.) {
            return Err(visu.invalid("VisuCoreExtent", format!("{:?}", extent)));
        }

        let frames = match visu.optional_number("VisuCoreFrameCount")? {
            Some(frames) => visu.positive_count("VisuCoreFrameCount", frames)?,
            None => 1,
        };

        let (slices, slice_spacing, volumes) = if rank == 3 {
            (size[2], extent[2] / size[2] as f64, frames)
        } else {
            let slices = match method.optional_numbers("PVM_SPackArrNSlices")? {
                Some(packs) => packs
                    .iter()
                    .map(|&n| method.count("PVM_SPackArrNSlices", n))
                    .sum::<Result<usize>>()?,
                None => frames,
            };
            ensure!(
                slices > 0 && frames % slices == 0,
                InvalidValueSnafu {
                    field: "VisuCoreFrameCount",
                    set: "visu_pars",
                    value: format!("{} (for {} slices)", frames, slices),
                }
            );
            let distance = method
                .optional_number("PVM_SPackArrSliceDistance")?
                .filter(|&d| d > 0.);
            let spacing = match distance {
                Some(distance) => distance,
                None => {
                    let thickness = visu.number("VisuCoreFrameThickness")?;
                    if thickness.is_nan() || thickness <= 0. {
                        return Err(visu.invalid("VisuCoreFrameThickness", thickness));
                    }
                    thickness
                }
            };
            (slices, spacing, frames / slices)
        };

        let spacing = [
            extent[0] / size[0] as f64,
            extent[1] / size[1] as f64,
            slice_spacing,
        ];

        let orientation = visu.leading("VisuCoreOrientation", 9)?;
        let orientation = [
            unit_vector([orientation[0], orientation[1], orientation[2]])?,
            unit_vector([orientation[3], orientation[4], orientation[5]])?,
        ];
        let position = visu.leading("VisuCorePosition", 3)?;
        let position = [position[0], position[1], position[2]];

        let word_type = visu.text("VisuCoreWordType")?;
        let sample_type = SampleType::from_word_type(word_type)
            .ok_or_else(|| visu.invalid("VisuCoreWordType", word_type))?;
        let endianness = match visu.optional_text("VisuCoreByteOrder")? {
            None | Some("littleEndian") => Endianness::Little,
            Some("bigEndian") => Endianness::Big,
            Some(other) => return Err(visu.invalid("VisuCoreByteOrder", other)),
        };

        let slope = visu.optional_numbers("VisuCoreDataSlope")?;
        let offset = visu.optional_numbers("VisuCoreDataOffs")?;
        if let Some(slope) = &slope {
            check_uniform("VisuCoreDataSlope", slope);
        }
        if let Some(offset) = &offset {
            check_uniform("VisuCoreDataOffs", offset);
        }

        let diffusion = diffusion_table(&method)?;
        if let Some(table) = &diffusion {
            if table.len() != volumes {
                warn!(
                    "Diffusion table has {} entries for {} volumes",
                    table.len(),
                    volumes
                );
            }
        }

        let mut shape: SmallVec<[usize; 4]> = SmallVec::from_slice(&size[..2]);
        if slices > 1 || volumes > 1 {
            shape.push(slices);
        }
        if volumes > 1 {
            shape.push(volumes);
        }

        let metadata = ScanMetadata {
            shape,
            spacing,
            orientation,
            position,
            sample_type,
            endianness,
            volumes,
            diffusion,
            slope: slope.and_then(|s| s.first().copied()),
            offset: offset.and_then(|o| o.first().copied()),
            repetition_time: method.optional_number("PVM_RepetitionTime")?,
            method: acqp.optional_text("ACQ_method")?.map(str::to_string),
        };
        debug!("Scan metadata: {:?}", metadata);
        Ok(metadata)
    }

    /// The number of spatial axes in the image shape.
    pub fn spatial_rank(&self) -> usize {
        if self.volumes > 1 {
            self.shape.len() - 1
        } else {
            self.shape.len()
        }
    }
}

/// Build the diffusion table from the method parameters,
/// if both b-values and gradient vectors are present.
fn diffusion_table(method: &Source<'_>) -> Result<Option<DiffusionTable>> {
    let Some(bvals) = method.optional_numbers("PVM_DwEffBval")? else {
        return Ok(None);
    };
    let Some(gradients) = method.optional_numbers("PVM_DwGradVec")? else {
        return Ok(None);
    };

    ensure!(
        gradients.len() == 3 * bvals.len(),
        InvalidValueSnafu {
            field: "PVM_DwGradVec",
            set: method.name,
            value: format!("{} components for {} b-values", gradients.len(), bvals.len()),
        }
    );
    let bvecs = gradients
        .chunks_exact(3)
        .map(|g| [g[0], g[1], g[2]])
        .collect();
    Ok(DiffusionTable::new(bvals.into_owned(), bvecs))
}
