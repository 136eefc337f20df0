//! Decoder for VMD motion files: bone keyframes, morph weights, camera,
//! light, self-shadow and visibility/IK toggles.

use super::*;
use crate::reader::{read_records, DataCursor, Error, Result};
use crate::text::LegacyTextDecoder;

pub const MAGIC: &str = "Vocaloid Motion Data 0002";

const MAGIC_LEN: usize = 30;
const MODEL_NAME_LEN: usize = 20;
const FRAME_NAME_LEN: usize = 15;
const IK_NAME_LEN: usize = 20;

#[derive(Clone, Debug)]
pub struct MotionFrame {
    pub bone_name: String,
    pub frame: u32,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    /// Bezier control points for x, y, z and rotation, interleaved as
    /// stored.
    pub interpolation: [u8; 64],
}

#[derive(Clone, Debug)]
pub struct MorphFrame {
    pub name: String,
    pub frame: u32,
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub struct CameraFrame {
    pub frame: u32,
    pub distance: f32,
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub interpolation: [u8; 24],
    pub fov: u32,
    /// 0 when perspective projection is on.
    pub perspective: u8,
}

#[derive(Clone, Debug)]
pub struct LightFrame {
    pub frame: u32,
    pub color: [f32; 3],
    pub direction: [f32; 3],
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShadowMode {
    Off,
    Mode1,
    Mode2,
}

impl ShadowMode {
    fn read(data: &mut DataCursor) -> Result<Self> {
        let offset = data.position();
        match data.read_i8()? {
            0 => Ok(ShadowMode::Off),
            1 => Ok(ShadowMode::Mode1),
            2 => Ok(ShadowMode::Mode2),
            v => Err(Error::unsupported("shadow mode", v, offset)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ShadowFrame {
    pub frame: u32,
    pub mode: ShadowMode,
    pub distance: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct IkState {
    pub name: String,
    pub enabled: bool,
}

#[derive(Clone, Debug)]
pub struct PropertyFrame {
    pub frame: u32,
    pub visible: bool,
    pub ik_states: Vec<IkState>,
}

#[derive(Clone, Debug)]
pub struct VmdMetadata {
    pub format: Format,
    pub coordinate_system: CoordinateSystem,
    pub magic: String,
    pub name: String,
    pub motion_count: usize,
    pub morph_count: usize,
    pub camera_count: usize,
    pub light_count: usize,
    pub shadow_count: usize,
    pub property_count: usize,
}

#[derive(Clone, Debug)]
pub struct Vmd {
    pub metadata: VmdMetadata,
    pub motions: Vec<MotionFrame>,
    pub morphs: Vec<MorphFrame>,
    pub cameras: Vec<CameraFrame>,
    pub lights: Vec<LightFrame>,
    pub shadows: Vec<ShadowFrame>,
    pub properties: Vec<PropertyFrame>,
}

/// Reads one counted section that later revisions of the format appended.
/// Motions saved by older tools end before it.
fn read_optional_section<'a, T>(
    data: &mut DataCursor<'a>,
    section: &str,
    f: impl FnMut(&mut DataCursor<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    if data.is_at_end() {
        log::warn!("vmd: no {section} section");
        return Ok(Vec::new());
    }
    let len = data.read_len()?;
    let records = read_records(data, len, f)?;
    log::debug!("vmd: {} {section} frames", records.len());
    Ok(records)
}

impl Vmd {
    pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<Self> {
        let text = options.legacy_text;
        let mut data = DataCursor::new(data);

        let magic = data.read_chars(MAGIC_LEN)?;
        if magic != MAGIC {
            return Err(Error::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }
        let name = data.read_legacy_text(MODEL_NAME_LEN, text)?;
        log::trace!("vmd: model {name:?}");

        let len = data.read_len()?;
        let motions = read_records(&mut data, len, |data| read_motion(data, text))?;
        log::debug!("vmd: {} motion frames", motions.len());

        let len = data.read_len()?;
        let morphs = read_records(&mut data, len, |data| {
            Ok(MorphFrame {
                name: data.read_legacy_text(FRAME_NAME_LEN, text)?,
                frame: data.read_u32()?,
                weight: data.read_f32()?,
            })
        })?;
        log::debug!("vmd: {} morph frames", morphs.len());

        let cameras = read_optional_section(&mut data, "camera", read_camera)?;
        let lights = read_optional_section(&mut data, "light", |data| {
            Ok(LightFrame {
                frame: data.read_u32()?,
                color: data.read_vec3()?,
                direction: data.read_vec3()?,
            })
        })?;
        let shadows = read_optional_section(&mut data, "shadow", |data| {
            Ok(ShadowFrame {
                frame: data.read_u32()?,
                mode: ShadowMode::read(data)?,
                distance: data.read_f32()?,
            })
        })?;
        let properties =
            read_optional_section(&mut data, "property", |data| read_property(data, text))?;

        let mut vmd = Vmd {
            metadata: VmdMetadata {
                format: Format::Vmd,
                coordinate_system: CoordinateSystem::Left,
                magic,
                name,
                motion_count: motions.len(),
                morph_count: morphs.len(),
                camera_count: cameras.len(),
                light_count: lights.len(),
                shadow_count: shadows.len(),
                property_count: properties.len(),
            },
            motions,
            morphs,
            cameras,
            lights,
            shadows,
            properties,
        };
        if options.convert_coordinates {
            vmd.convert_coordinates();
        }
        Ok(vmd)
    }
}

fn read_motion(data: &mut DataCursor, text: &dyn LegacyTextDecoder) -> Result<MotionFrame> {
    Ok(MotionFrame {
        bone_name: data.read_legacy_text(FRAME_NAME_LEN, text)?,
        frame: data.read_u32()?,
        position: data.read_vec3()?,
        rotation: data.read_vec4()?,
        interpolation: data.read_bin()?,
    })
}

fn read_camera(data: &mut DataCursor) -> Result<CameraFrame> {
    Ok(CameraFrame {
        frame: data.read_u32()?,
        distance: data.read_f32()?,
        position: data.read_vec3()?,
        rotation: data.read_vec3()?,
        interpolation: data.read_bin()?,
        fov: data.read_u32()?,
        perspective: data.read_u8()?,
    })
}

fn read_property(data: &mut DataCursor, text: &dyn LegacyTextDecoder) -> Result<PropertyFrame> {
    let frame = data.read_u32()?;
    let visible = data.read_i8()? == 1;
    let len = data.read_len()?;
    let ik_states = read_records(data, len, |data| {
        Ok(IkState {
            name: data.read_legacy_text(IK_NAME_LEN, text)?,
            enabled: data.read_i8()? == 1,
        })
    })?;
    Ok(PropertyFrame {
        frame,
        visible,
        ik_states,
    })
}

/// Concatenates motions in order, summing their counts. Name, magic and
/// coordinate system come from the first motion. Returns `None` for an
/// empty slice.
pub fn merge_vmds(vmds: &[Vmd]) -> Option<Vmd> {
    let (first, rest) = vmds.split_first()?;
    let mut merged = first.clone();
    for vmd in rest {
        if vmd.metadata.coordinate_system != merged.metadata.coordinate_system {
            log::warn!(
                "vmd: merging {:?} motion {:?} into {:?} motion {:?}",
                vmd.metadata.coordinate_system,
                vmd.metadata.name,
                merged.metadata.coordinate_system,
                merged.metadata.name
            );
        }
        merged.motions.extend_from_slice(&vmd.motions);
        merged.morphs.extend_from_slice(&vmd.morphs);
        merged.cameras.extend_from_slice(&vmd.cameras);
        merged.lights.extend_from_slice(&vmd.lights);
        merged.shadows.extend_from_slice(&vmd.shadows);
        merged.properties.extend_from_slice(&vmd.properties);

        let m = &mut merged.metadata;
        m.motion_count += vmd.metadata.motion_count;
        m.morph_count += vmd.metadata.morph_count;
        m.camera_count += vmd.metadata.camera_count;
        m.light_count += vmd.metadata.light_count;
        m.shadow_count += vmd.metadata.shadow_count;
        m.property_count += vmd.metadata.property_count;
    }
    log::debug!(
        "vmd: merged {} motions into {} motion frames",
        vmds.len(),
        merged.motions.len()
    );
    Some(merged)
}
