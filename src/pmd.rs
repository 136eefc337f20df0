//! Decoder for the legacy PMD model format.
//!
//! Text fields are fixed-size and zero-terminated in a legacy 8-bit encoding
//! (Shift_JIS by default, see [`DecodeOptions::legacy_text`]). The English
//! name block, the toon texture table and the physics sections are later
//! additions to the format; a file that ends where one of them would begin
//! decodes with that section and the following ones absent.

use super::*;
use crate::reader::{read_records, signed_index, triangles, DataCursor, Error, Result};
use crate::text::LegacyTextDecoder;

pub const MAGIC: &str = "Pmd";

const NAME_LEN: usize = 20;
const COMMENT_LEN: usize = 256;
const BONE_DISPLAY_NAME_LEN: usize = 50;
const TOON_TEXTURE_LEN: usize = 100;
const TOON_TEXTURE_COUNT: usize = 10;

#[derive(Clone, Debug)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub bones: [u16; 2],
    /// The first weight is stored as a percentage, the second is its
    /// complement.
    pub weights: [f32; 2],
    pub edge_flag: u8,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub diffuse: [f32; 4],
    pub specular_power: f32,
    pub specular: [f32; 3],
    pub ambient: [f32; 3],
    pub toon: i8,
    pub edge_flag: u8,
    pub face_count: u32,
    pub file_name: String,
}

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub parent: Option<usize>,
    pub tail: Option<usize>,
    pub kind: u8,
    pub ik: i16,
    pub position: [f32; 3],
}

#[derive(Clone, Debug)]
pub struct Ik {
    pub target: u16,
    pub effector: u16,
    pub iteration: u16,
    pub max_angle: f32,
    pub links: Vec<u16>,
}

#[derive(Clone, Debug)]
pub struct MorphVertex {
    pub index: u32,
    pub position: [f32; 3],
}

/// A vertex morph. The [`Panel::Reserved`] morph is the base morph and holds
/// absolute positions; every other morph holds offsets into it.
#[derive(Clone, Debug)]
pub struct Morph {
    pub name: String,
    pub panel: Panel,
    pub elements: Vec<MorphVertex>,
}

#[derive(Clone, Debug)]
pub struct BoneDisplay {
    pub bone: Option<usize>,
    pub frame: u8,
}

#[derive(Clone, Debug, Default)]
pub struct English {
    pub name: String,
    pub comment: String,
    pub bone_names: Vec<String>,
    pub morph_names: Vec<String>,
    pub bone_display_names: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct Rigid {
    pub name: String,
    pub bone: Option<usize>,
    pub group: u8,
    pub non_collision_groups: u16,
    pub shape: rigid::Shape,
    pub size: [f32; 3],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub mass: f32,
    pub damping_translation: f32,
    pub damping_rotation: f32,
    pub repulsive: f32,
    pub friction: f32,
    pub method: rigid::Method,
}

#[derive(Clone, Debug)]
pub struct Joint {
    pub name: String,
    pub rigids: [u32; 2],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub limit_translation: Limit,
    pub limit_rotation: Limit,
    pub spring_translation: [f32; 3],
    pub spring_rotation: [f32; 3],
}

#[derive(Clone, Debug)]
pub struct PmdMetadata {
    pub format: Format,
    pub coordinate_system: CoordinateSystem,
    pub magic: String,
    pub version: f32,
    pub name: String,
    pub comment: String,
    pub vertex_count: usize,
    pub face_count: usize,
    pub material_count: usize,
    pub bone_count: usize,
    pub ik_count: usize,
    pub morph_count: usize,
    pub morph_display_count: usize,
    pub bone_display_name_count: usize,
    pub bone_display_count: usize,
    pub english_compatibility: u8,
    pub rigid_count: usize,
    pub joint_count: usize,
}

#[derive(Clone, Debug)]
pub struct Pmd {
    pub metadata: PmdMetadata,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<[u16; 3]>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub iks: Vec<Ik>,
    pub morphs: Vec<Morph>,
    /// Morph indices shown in the expression panel.
    pub morph_displays: Vec<u16>,
    pub bone_display_names: Vec<String>,
    pub bone_displays: Vec<BoneDisplay>,
    /// Present when the English-compatibility byte is non-zero.
    pub english: Option<English>,
    pub toon_textures: Vec<String>,
    pub rigids: Vec<Rigid>,
    pub joints: Vec<Joint>,
}

/// Reads a trailing-section count, or `None` when the buffer ends exactly
/// where the section would begin.
fn read_trailer_len(data: &mut DataCursor, section: &str) -> Result<Option<usize>> {
    if data.is_at_end() {
        log::warn!("pmd: no {section} section");
        return Ok(None);
    }
    data.read_len().map(Some)
}

impl Pmd {
    pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<Self> {
        let text = options.legacy_text;
        let mut data = DataCursor::new(data);

        let magic = data.read_chars(MAGIC.len())?;
        if magic != MAGIC {
            return Err(Error::BadMagic {
                expected: MAGIC,
                found: magic,
            });
        }
        let version = data.read_f32()?;
        let name = data.read_legacy_text(NAME_LEN, text)?;
        let comment = data.read_legacy_text(COMMENT_LEN, text)?;
        log::trace!("pmd: version {version}, name {name:?}");

        let len = data.read_len()?;
        let vertices = read_records(&mut data, len, read_vertex)?;
        log::debug!("pmd: {} vertices", vertices.len());

        let len = data.read_len()?;
        let indices = read_records(&mut data, len, |data| data.read_u16())?;
        let faces = triangles(&indices);
        log::debug!("pmd: {} faces", faces.len());

        let len = data.read_len()?;
        let materials = read_records(&mut data, len, |data| read_material(data, text))?;
        log::debug!("pmd: {} materials", materials.len());

        let len = data.read_u16()? as usize;
        let bones = read_records(&mut data, len, |data| read_bone(data, text))?;
        log::debug!("pmd: {} bones", bones.len());

        let len = data.read_u16()? as usize;
        let iks = read_records(&mut data, len, read_ik)?;
        log::debug!("pmd: {} iks", iks.len());

        let len = data.read_u16()? as usize;
        let morphs = read_records(&mut data, len, |data| read_morph(data, text))?;
        log::debug!("pmd: {} morphs", morphs.len());

        let len = data.read_u8()? as usize;
        let morph_displays = read_records(&mut data, len, |data| data.read_u16())?;

        let len = data.read_u8()? as usize;
        let bone_display_names = read_records(&mut data, len, |data| {
            data.read_legacy_text(BONE_DISPLAY_NAME_LEN, text)
        })?;

        let len = data.read_len()?;
        let bone_displays = read_records(&mut data, len, |data| {
            Ok(BoneDisplay {
                bone: signed_index(data.read_i16()? as i32),
                frame: data.read_u8()?,
            })
        })?;
        log::debug!(
            "pmd: {} morph displays, {} bone display frames, {} bone displays",
            morph_displays.len(),
            bone_display_names.len(),
            bone_displays.len()
        );

        let english_compatibility = if data.is_at_end() {
            log::warn!("pmd: no english section");
            0
        } else {
            data.read_u8()?
        };
        let english = if english_compatibility != 0 {
            Some(read_english(
                &mut data,
                text,
                bones.len(),
                morphs.len(),
                bone_display_names.len(),
            )?)
        } else {
            None
        };

        let toon_textures = if data.is_at_end() {
            log::warn!("pmd: no toon texture section");
            Vec::new()
        } else {
            read_records(&mut data, TOON_TEXTURE_COUNT, |data| {
                data.read_legacy_text(TOON_TEXTURE_LEN, text)
            })?
        };

        let rigids = match read_trailer_len(&mut data, "rigid body")? {
            Some(len) => read_records(&mut data, len, |data| read_rigid(data, text))?,
            None => Vec::new(),
        };
        log::debug!("pmd: {} rigid bodies", rigids.len());

        let joints = match read_trailer_len(&mut data, "joint")? {
            Some(len) => read_records(&mut data, len, |data| read_joint(data, text))?,
            None => Vec::new(),
        };
        log::debug!("pmd: {} joints", joints.len());

        let mut pmd = Pmd {
            metadata: PmdMetadata {
                format: Format::Pmd,
                coordinate_system: CoordinateSystem::Left,
                magic,
                version,
                name,
                comment,
                vertex_count: vertices.len(),
                face_count: faces.len(),
                material_count: materials.len(),
                bone_count: bones.len(),
                ik_count: iks.len(),
                morph_count: morphs.len(),
                morph_display_count: morph_displays.len(),
                bone_display_name_count: bone_display_names.len(),
                bone_display_count: bone_displays.len(),
                english_compatibility,
                rigid_count: rigids.len(),
                joint_count: joints.len(),
            },
            vertices,
            faces,
            materials,
            bones,
            iks,
            morphs,
            morph_displays,
            bone_display_names,
            bone_displays,
            english,
            toon_textures,
            rigids,
            joints,
        };
        if options.convert_coordinates {
            pmd.convert_coordinates();
        }
        Ok(pmd)
    }
}

fn read_vertex(data: &mut DataCursor) -> Result<Vertex> {
    let position = data.read_vec3()?;
    let normal = data.read_vec3()?;
    let uv = data.read_vec2()?;
    let bones = data.read_u16s::<2>()?;
    let weight = data.read_u8()? as f32 / 100.0;
    let edge_flag = data.read_u8()?;
    Ok(Vertex {
        position,
        normal,
        uv,
        bones,
        weights: [weight, 1.0 - weight],
        edge_flag,
    })
}

fn read_material(data: &mut DataCursor, text: &dyn LegacyTextDecoder) -> Result<Material> {
    let diffuse = data.read_vec4()?;
    let specular_power = data.read_f32()?;
    let specular = data.read_vec3()?;
    let ambient = data.read_vec3()?;
    let toon = data.read_i8()?;
    let edge_flag = data.read_u8()?;
    let index_count = data.read_u32()?;
    let file_name = data.read_legacy_text(NAME_LEN, text)?;
    if index_count % 3 != 0 {
        log::warn!("pmd: material {file_name:?} index count {index_count} is not a multiple of 3");
    }
    Ok(Material {
        diffuse,
        specular_power,
        specular,
        ambient,
        toon,
        edge_flag,
        face_count: index_count / 3,
        file_name,
    })
}

fn read_bone(data: &mut DataCursor, text: &dyn LegacyTextDecoder) -> Result<Bone> {
    Ok(Bone {
        name: data.read_legacy_text(NAME_LEN, text)?,
        parent: signed_index(data.read_i16()? as i32),
        tail: signed_index(data.read_i16()? as i32),
        kind: data.read_u8()?,
        ik: data.read_i16()?,
        position: data.read_vec3()?,
    })
}

fn read_ik(data: &mut DataCursor) -> Result<Ik> {
    let target = data.read_u16()?;
    let effector = data.read_u16()?;
    let len = data.read_u8()? as usize;
    let iteration = data.read_u16()?;
    let max_angle = data.read_f32()?;
    let links = read_records(data, len, |data| data.read_u16())?;
    Ok(Ik {
        target,
        effector,
        iteration,
        max_angle,
        links,
    })
}

fn read_morph(data: &mut DataCursor, text: &dyn LegacyTextDecoder) -> Result<Morph> {
    let name = data.read_legacy_text(NAME_LEN, text)?;
    let len = data.read_len()?;
    let panel = Panel::read(data)?;
    let elements = read_records(data, len, |data| {
        Ok(MorphVertex {
            index: data.read_u32()?,
            position: data.read_vec3()?,
        })
    })?;
    Ok(Morph {
        name,
        panel,
        elements,
    })
}

fn read_english(
    data: &mut DataCursor,
    text: &dyn LegacyTextDecoder,
    bone_count: usize,
    morph_count: usize,
    bone_display_name_count: usize,
) -> Result<English> {
    let name = data.read_legacy_text(NAME_LEN, text)?;
    let comment = data.read_legacy_text(COMMENT_LEN, text)?;
    let bone_names = read_records(data, bone_count, |data| {
        data.read_legacy_text(NAME_LEN, text)
    })?;
    // The base morph has no English name.
    let morph_names = read_records(data, morph_count.saturating_sub(1), |data| {
        data.read_legacy_text(NAME_LEN, text)
    })?;
    let bone_display_names = read_records(data, bone_display_name_count, |data| {
        data.read_legacy_text(BONE_DISPLAY_NAME_LEN, text)
    })?;
    Ok(English {
        name,
        comment,
        bone_names,
        morph_names,
        bone_display_names,
    })
}

fn read_rigid(data: &mut DataCursor, text: &dyn LegacyTextDecoder) -> Result<Rigid> {
    Ok(Rigid {
        name: data.read_legacy_text(NAME_LEN, text)?,
        bone: signed_index(data.read_i16()? as i32),
        group: data.read_u8()?,
        non_collision_groups: data.read_u16()?,
        shape: rigid::Shape::read(data)?,
        size: data.read_vec3()?,
        position: data.read_vec3()?,
        rotation: data.read_vec3()?,
        mass: data.read_f32()?,
        damping_translation: data.read_f32()?,
        damping_rotation: data.read_f32()?,
        repulsive: data.read_f32()?,
        friction: data.read_f32()?,
        method: rigid::Method::read(data)?,
    })
}

fn read_joint(data: &mut DataCursor, text: &dyn LegacyTextDecoder) -> Result<Joint> {
    Ok(Joint {
        name: data.read_legacy_text(NAME_LEN, text)?,
        rigids: data.read_u32s::<2>()?,
        position: data.read_vec3()?,
        rotation: data.read_vec3()?,
        limit_translation: Limit {
            lower: data.read_vec3()?,
            upper: data.read_vec3()?,
        },
        limit_rotation: Limit {
            lower: data.read_vec3()?,
            upper: data.read_vec3()?,
        },
        spring_translation: data.read_vec3()?,
        spring_rotation: data.read_vec3()?,
    })
}
