//! Synthetic ParaVision scans and NIfTI readback for the integration tests.
#![allow(dead_code)]

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::GzDecoder;
use std::fs;
use std::io::{Cursor, Read};
use std::path::Path;

/// A 2D multi-slice scan with 16-bit little endian samples.
#[derive(Debug, Clone)]
pub struct ScanFixture {
    pub size: [usize; 2],
    pub extent: [f64; 2],
    pub slices: usize,
    pub volumes: usize,
    pub slice_distance: f64,
    /// The first two image axes, one after the other.
    pub orientation: [f64; 6],
    pub position: [f64; 3],
    pub slope: f64,
    pub offset: f64,
    pub repetition_time: f64,
    pub diffusion: Option<(Vec<f64>, Vec<[f64; 3]>)>,
    /// Number of samples left out at the end of `2dseq`.
    pub missing_samples: usize,
}

impl Default for ScanFixture {
    fn default() -> Self {
        ScanFixture {
            size: [64, 64],
            extent: [12.8, 12.8],
            slices: 32,
            volumes: 1,
            slice_distance: 0.5,
            orientation: [1., 0., 0., 0., 1., 0.],
            position: [-6.4, -6.4, -8.],
            slope: 2.,
            offset: 100.,
            repetition_time: 1500.,
            diffusion: None,
            missing_samples: 0,
        }
    }
}

impl ScanFixture {
    pub fn frames(&self) -> usize {
        self.slices * self.volumes
    }

    pub fn voxel_count(&self) -> usize {
        self.size[0] * self.size[1] * self.frames()
    }

    /// The raw sample stored at position `i` of `2dseq`.
    pub fn sample(i: usize) -> i16 {
        (i % 2000) as i16 - 1000
    }

    pub fn visu_pars(&self) -> String {
        let frames = self.frames();
        let [v1x, v1y, v1z, v2x, v2y, v2z] = self.orientation;
        let normal = [
            v1y * v2z - v1z * v2y,
            v1z * v2x - v1x * v2z,
            v1x * v2y - v1y * v2x,
        ];
        let orientation = format!(
            "{} {} {} {} {} {} {} {} {}",
            v1x, v1y, v1z, v2x, v2y, v2z, normal[0], normal[1], normal[2]
        );
        let positions = (0..frames)
            .map(|f| {
                let slice = (f % self.slices) as f64 * self.slice_distance;
                format!(
                    "{} {} {}",
                    self.position[0] + slice * normal[0],
                    self.position[1] + slice * normal[1],
                    self.position[2] + slice * normal[2]
                )
            })
            .collect::<Vec<_>>()
            .join(" ");

        format!(
            "\
##TITLE=Parameter List, ParaVision 6.0.1
##JCAMPDX=4.24
$$ @vis= synthetic
##$VisuVersion=3
##$VisuCoreFrameCount={frames}
##$VisuCoreDim=2
##$VisuCoreSize=( 2 )
{sx} {sy}
##$VisuCoreDimDesc=( 2 )
spatial spatial
##$VisuCoreExtent=( 2 )
{ex} {ey}
##$VisuCoreFrameThickness=( 1 )
{thickness}
##$VisuCoreUnits=( 2, 65 )
<mm> <mm>
##$VisuCoreOrientation=( {frames}, 9 )
{orientations}
##$VisuCorePosition=( {frames}, 3 )
{positions}
##$VisuCoreDataSlope=( {frames} )
@{frames}*({slope})
##$VisuCoreDataOffs=( {frames} )
@{frames}*({offset})
##$VisuCoreWordType=_16BIT_SGN_INT
##$VisuCoreByteOrder=littleEndian
##$VisuAcqSequenceName=( 64 )
<FLASH (pvm)>
##END=
",
            frames = frames,
            sx = self.size[0],
            sy = self.size[1],
            ex = self.extent[0],
            ey = self.extent[1],
            thickness = self.slice_distance,
            orientations = vec![orientation; frames].join(" "),
            positions = positions,
            slope = self.slope,
            offset = self.offset,
        )
    }

    pub fn method(&self) -> String {
        let mut method = format!(
            "\
##TITLE=Parameter List, ParaVision 6.0.1
##$Method=<Bruker:FLASH>
##$PVM_RepetitionTime={tr}
##$PVM_NRepetitions={volumes}
##$PVM_SPackArrNSlices=( 1 )
{slices}
##$PVM_SPackArrSliceDistance=( 1 )
{distance}
",
            tr = self.repetition_time,
            volumes = self.volumes,
            slices = self.slices,
            distance = self.slice_distance,
        );
        if let Some((bvals, bvecs)) = &self.diffusion {
            let bvals_text = bvals
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            let bvecs_text = bvecs
                .iter()
                .flatten()
                .map(|g| g.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            method.push_str(&format!(
                "##$PVM_DwEffBval=( {} )\n{}\n##$PVM_DwGradVec=( {}, 3 )\n{}\n",
                bvals.len(),
                bvals_text,
                bvecs.len(),
                bvecs_text
            ));
        }
        method.push_str("##END=\n");
        method
    }

    pub fn acqp(&self) -> String {
        "\
##TITLE=Parameter List, ParaVision 6.0.1
##$ACQ_sw_version=( 65 )
<PV 6.0.1>
##$ACQ_method=( 20 )
<Bruker:FLASH>
##$ACQ_scan_name=( 64 )
<1_Localizer>
##$NR=1
##END=
"
        .to_string()
    }

    pub fn reco(&self) -> String {
        format!(
            "\
##TITLE=Parameter List, ParaVision 6.0.1
##$RECO_size=( 2 )
{} {}
##$RECO_wordtype=_16BIT_SGN_INT
##$RECO_byte_order=littleEndian
##END=
",
            self.size[0], self.size[1]
        )
    }

    pub fn raw_data(&self) -> Vec<u8> {
        let count = self.voxel_count() - self.missing_samples;
        let mut data = Vec::with_capacity(count * 2);
        for i in 0..count {
            data.write_i16::<LittleEndian>(Self::sample(i))
                .expect("writing to a vector never fails");
        }
        data
    }

    /// Write the scan into the folder `scan`, with reconstruction 1.
    pub fn write(&self, scan: &Path) {
        let pdata = scan.join("pdata").join("1");
        fs::create_dir_all(&pdata).unwrap();
        fs::write(scan.join("acqp"), self.acqp()).unwrap();
        fs::write(scan.join("method"), self.method()).unwrap();
        fs::write(pdata.join("reco"), self.reco()).unwrap();
        fs::write(pdata.join("visu_pars"), self.visu_pars()).unwrap();
        fs::write(pdata.join("2dseq"), self.raw_data()).unwrap();
    }
}

/// Write the `subject` file of a study.
pub fn write_subject(study: &Path, id: &str, name: Option<&str>) {
    fs::create_dir_all(study).unwrap();
    let mut subject = format!(
        "##TITLE=Parameter List, ParaVision 6.0.1\n##$SUBJECT_id=( 64 )\n<{}>\n",
        id
    );
    if let Some(name) = name {
        subject.push_str(&format!("##$SUBJECT_name_string=( 64 )\n<{}>\n", name));
    }
    subject.push_str("##$SUBJECT_position=SUBJ_POS_Supine\n##END=\n");
    fs::write(study.join("subject"), subject).unwrap();
}

/// The fields of a NIfTI-1 image needed by the tests.
#[derive(Debug)]
pub struct NiftiImage {
    pub dim: [i16; 8],
    pub datatype: i16,
    pub bitpix: i16,
    pub pixdim: [f32; 8],
    pub vox_offset: f32,
    pub scl_slope: f32,
    pub scl_inter: f32,
    pub qform_code: i16,
    pub sform_code: i16,
    pub srow: [[f32; 4]; 3],
    pub magic: [u8; 4],
    /// Everything after the header and extension flag.
    pub data: Vec<u8>,
}

impl NiftiImage {
    pub fn read(path: &Path) -> Self {
        let mut bytes = fs::read(path).unwrap();
        if path.extension().map_or(false, |ext| ext == "gz") {
            let mut decoded = Vec::new();
            GzDecoder::new(&bytes[..]).read_to_end(&mut decoded).unwrap();
            bytes = decoded;
        }
        assert_eq!(&bytes[..4], &348_i32.to_le_bytes());

        let i16_at = |offset: usize| {
            Cursor::new(&bytes[offset..])
                .read_i16::<LittleEndian>()
                .unwrap()
        };
        let f32_at = |offset: usize| {
            Cursor::new(&bytes[offset..])
                .read_f32::<LittleEndian>()
                .unwrap()
        };

        let mut dim = [0; 8];
        for (i, d) in dim.iter_mut().enumerate() {
            *d = i16_at(40 + 2 * i);
        }
        let mut pixdim = [0.; 8];
        for (i, p) in pixdim.iter_mut().enumerate() {
            *p = f32_at(76 + 4 * i);
        }
        let mut srow = [[0.; 4]; 3];
        for (r, row) in srow.iter_mut().enumerate() {
            for (c, s) in row.iter_mut().enumerate() {
                *s = f32_at(280 + 16 * r + 4 * c);
            }
        }
        let mut magic = [0; 4];
        magic.copy_from_slice(&bytes[344..348]);

        NiftiImage {
            dim,
            datatype: i16_at(70),
            bitpix: i16_at(72),
            pixdim,
            vox_offset: f32_at(108),
            scl_slope: f32_at(112),
            scl_inter: f32_at(116),
            qform_code: i16_at(252),
            sform_code: i16_at(254),
            srow,
            magic,
            data: bytes[352..].to_vec(),
        }
    }

    pub fn shape(&self) -> Vec<usize> {
        self.dim[1..=self.dim[0] as usize]
            .iter()
            .map(|&d| d as usize)
            .collect()
    }

    pub fn samples_i16(&self) -> Vec<i16> {
        let mut samples = vec![0; self.data.len() / 2];
        Cursor::new(&self.data)
            .read_i16_into::<LittleEndian>(&mut samples)
            .unwrap();
        samples
    }

    pub fn samples_f64(&self) -> Vec<f64> {
        let mut samples = vec![0.; self.data.len() / 8];
        Cursor::new(&self.data)
            .read_f64_into::<LittleEndian>(&mut samples)
            .unwrap();
        samples
    }
}
