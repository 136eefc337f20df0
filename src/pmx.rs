//! Decoder for the PMX model format (versions 2.0 and 2.1).

use super::*;
use crate::header::Header;
use crate::reader::{read_records, triangles, DataCursor, Error, Result};

#[derive(Clone, Debug)]
pub struct Bdef1 {
    pub bone: Option<usize>,
}

#[derive(Clone, Debug)]
pub struct Bdef2 {
    pub bones: [Option<usize>; 2],
    pub weight: f32,
}

#[derive(Clone, Debug)]
pub struct Bdef4 {
    pub bones: [Option<usize>; 4],
    pub weights: [f32; 4],
}

/// Spherical deformation parameters. Vertices carrying them are skinned as
/// [`Weight::Bdef2`].
#[derive(Clone, Debug)]
pub struct Sdef {
    pub c: [f32; 3],
    pub r0: [f32; 3],
    pub r1: [f32; 3],
}

#[derive(Clone, Debug)]
pub enum Weight {
    Bdef1(Bdef1),
    Bdef2(Bdef2),
    Bdef4(Bdef4),
}

impl Weight {
    /// Bone/weight pairs in storage order. The second BDEF2 weight is the
    /// complement of the stored one.
    pub fn influences(&self) -> Vec<(Option<usize>, f32)> {
        match self {
            Weight::Bdef1(w) => vec![(w.bone, 1.0)],
            Weight::Bdef2(w) => vec![(w.bones[0], w.weight), (w.bones[1], 1.0 - w.weight)],
            Weight::Bdef4(w) => w.bones.iter().copied().zip(w.weights).collect(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
    pub extended_uv: Vec<[f32; 4]>,
    pub weight: Weight,
    pub sdef: Option<Sdef>,
    pub edge_ratio: f32,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SphereMode {
    None,
    Mul,
    Add,
    SubTexture,
}

#[derive(Clone, Debug)]
pub enum Toon {
    Texture(Option<usize>),
    Shared(i8),
}

#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub name_en: String,
    pub diffuse: [f32; 4],
    pub specular: [f32; 3],
    pub specular_power: f32,
    pub ambient: [f32; 3],
    pub both: bool,
    pub ground_shadow: bool,
    pub self_shadow_map: bool,
    pub self_shadow: bool,
    pub edge: bool,
    pub edge_color: [f32; 4],
    pub edge_size: f32,
    pub texture: Option<usize>,
    pub sphere: Option<usize>,
    pub sphere_mode: SphereMode,
    pub toon: Toon,
    pub memo: String,
    pub face_count: u32,
}

bitflags::bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub struct BoneFlags: u16 {
        const CONNECT_TO_BONE = 0x0001;
        const ROTATABLE = 0x0002;
        const TRANSLATABLE = 0x0004;
        const VISIBLE = 0x0008;
        const OPERABLE = 0x0010;
        const IK = 0x0020;
        const ADDITION_LOCAL = 0x0080;
        const ADDITION_ROTATION = 0x0100;
        const ADDITION_TRANSLATION = 0x0200;
        const FIXED_POLE = 0x0400;
        const LOCAL_POLE = 0x0800;
        const AFTER_PHYSICS = 0x1000;
        const EXTERNAL_PARENT = 0x2000;
    }
}

#[derive(Clone, Debug)]
pub enum ConnectTo {
    Offset([f32; 3]),
    Bone(Option<usize>),
}

#[derive(Clone, Debug)]
pub struct IkLink {
    pub bone: Option<usize>,
    pub limit: Option<Limit>,
}

#[derive(Clone, Debug)]
pub struct Ik {
    pub target_bone: Option<usize>,
    pub loop_count: u32,
    pub angle: f32,
    pub links: Vec<IkLink>,
}

#[derive(Clone, Debug)]
pub struct Addition {
    pub rotation: bool,
    pub translation: bool,
    pub local: bool,
    pub bone: Option<usize>,
    pub ratio: f32,
}

#[derive(Clone, Debug)]
pub struct LocalPole {
    pub x: [f32; 3],
    pub z: [f32; 3],
}

#[derive(Clone, Debug)]
pub struct Bone {
    pub name: String,
    pub name_en: String,
    pub position: [f32; 3],
    pub parent: Option<usize>,
    pub deform_hierarchy: i32,
    pub flags: BoneFlags,
    pub connected_to: ConnectTo,
    pub addition: Option<Addition>,
    pub fixed_pole: Option<[f32; 3]>,
    pub local_pole: Option<LocalPole>,
    pub external_parent: Option<i32>,
    pub ik: Option<Ik>,
}

impl Bone {
    pub fn rotatable(&self) -> bool {
        self.flags.contains(BoneFlags::ROTATABLE)
    }

    pub fn translatable(&self) -> bool {
        self.flags.contains(BoneFlags::TRANSLATABLE)
    }

    pub fn visible(&self) -> bool {
        self.flags.contains(BoneFlags::VISIBLE)
    }

    pub fn operable(&self) -> bool {
        self.flags.contains(BoneFlags::OPERABLE)
    }

    pub fn after_physics(&self) -> bool {
        self.flags.contains(BoneFlags::AFTER_PHYSICS)
    }
}

pub mod morph {
    #[derive(Clone, Debug)]
    pub struct Vertex {
        pub vertex: usize,
        pub offset: [f32; 3],
    }

    #[derive(Clone, Debug)]
    pub struct Uv {
        pub vertex: usize,
        pub offset: [f32; 4],
    }

    #[derive(Clone, Debug)]
    pub struct Bone {
        pub bone: Option<usize>,
        pub offset: [f32; 3],
        pub rotation: [f32; 4],
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum MaterialOp {
        Mul,
        Add,
    }

    #[derive(Clone, Debug)]
    pub struct Material {
        pub material: Option<usize>,
        pub op: MaterialOp,
        pub diffuse: [f32; 4],
        pub specular: [f32; 3],
        pub specular_power: f32,
        pub ambient: [f32; 3],
        pub edge_color: [f32; 4],
        pub edge_size: f32,
        pub texture: [f32; 4],
        pub sphere: [f32; 4],
        pub toon: [f32; 4],
    }

    #[derive(Clone, Debug)]
    pub struct Group {
        pub morph: Option<usize>,
        pub ratio: f32,
    }

    #[derive(Clone, Debug)]
    pub struct Impulse {
        pub rigid: Option<usize>,
        pub local: bool,
        pub velocity: [f32; 3],
        pub torque: [f32; 3],
    }

    /// One element list per morph, all of the kind named by its type tag.
    #[derive(Clone, Debug)]
    pub enum Kind {
        Group(Vec<Group>),
        Vertex(Vec<Vertex>),
        Bone(Vec<Bone>),
        Uv(Vec<Uv>),
        /// Additional UV channel 0..=3.
        ExtendedUv(usize, Vec<Uv>),
        Material(Vec<Material>),
        Flip(Vec<Group>),
        Impulse(Vec<Impulse>),
    }

    impl Kind {
        pub fn len(&self) -> usize {
            match self {
                Kind::Group(v) | Kind::Flip(v) => v.len(),
                Kind::Vertex(v) => v.len(),
                Kind::Bone(v) => v.len(),
                Kind::Uv(v) | Kind::ExtendedUv(_, v) => v.len(),
                Kind::Material(v) => v.len(),
                Kind::Impulse(v) => v.len(),
            }
        }

        pub fn is_empty(&self) -> bool {
            self.len() == 0
        }
    }
}

#[derive(Clone, Debug)]
pub struct Morph {
    pub name: String,
    pub name_en: String,
    pub panel: Panel,
    pub kind: morph::Kind,
}

#[derive(Clone, Debug)]
pub enum DisplayElement {
    Bone(Option<usize>),
    Morph(Option<usize>),
}

#[derive(Clone, Debug)]
pub struct DisplayGroup {
    pub name: String,
    pub name_en: String,
    pub special: bool,
    pub elements: Vec<DisplayElement>,
}

#[derive(Clone, Debug)]
pub struct Rigid {
    pub name: String,
    pub name_en: String,
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
    pub name_en: String,
    pub kind: u8,
    pub rigids: [Option<usize>; 2],
    pub position: [f32; 3],
    pub rotation: [f32; 3],
    pub limit_translation: Limit,
    pub limit_rotation: Limit,
    pub spring_translation: [f32; 3],
    pub spring_rotation: [f32; 3],
}

#[derive(Clone, Debug)]
pub struct PmxMetadata {
    pub format: Format,
    pub coordinate_system: CoordinateSystem,
    pub header: Header,
    pub name: String,
    pub name_en: String,
    pub comment: String,
    pub comment_en: String,
    pub vertex_count: usize,
    pub face_count: usize,
    pub texture_count: usize,
    pub material_count: usize,
    pub bone_count: usize,
    pub morph_count: usize,
    pub display_group_count: usize,
    pub rigid_count: usize,
    pub joint_count: usize,
}

#[derive(Clone, Debug)]
pub struct Pmx {
    pub metadata: PmxMetadata,
    pub vertices: Vec<Vertex>,
    pub faces: Vec<[usize; 3]>,
    pub textures: Vec<String>,
    pub materials: Vec<Material>,
    pub bones: Vec<Bone>,
    pub morphs: Vec<Morph>,
    pub display_groups: Vec<DisplayGroup>,
    pub rigids: Vec<Rigid>,
    pub joints: Vec<Joint>,
}

impl Pmx {
    pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<Self> {
        let mut data = DataCursor::new(data);
        let header = Header::read(&mut data)?;
        let name = header.read_text(&mut data)?;
        let name_en = header.read_text(&mut data)?;
        let comment = header.read_text(&mut data)?;
        let comment_en = header.read_text(&mut data)?;

        let len = data.read_len()?;
        let vertices = read_records(&mut data, len, |data| read_vertex(data, &header))?;
        log::debug!("pmx: {} vertices", vertices.len());

        let len = data.read_len()?;
        let indices = read_records(&mut data, len, |data| header.read_vertex_index(data))?;
        let faces = triangles(&indices);
        log::debug!("pmx: {} faces", faces.len());

        let len = data.read_len()?;
        let textures = read_records(&mut data, len, |data| header.read_text(data))?;
        log::debug!("pmx: {} textures", textures.len());

        let len = data.read_len()?;
        let materials = read_records(&mut data, len, |data| read_material(data, &header))?;
        log::debug!("pmx: {} materials", materials.len());

        let len = data.read_len()?;
        let bones = read_records(&mut data, len, |data| read_bone(data, &header))?;
        log::debug!("pmx: {} bones", bones.len());

        let len = data.read_len()?;
        let morphs = read_records(&mut data, len, |data| read_morph(data, &header))?;
        log::debug!("pmx: {} morphs", morphs.len());

        let len = data.read_len()?;
        let display_groups =
            read_records(&mut data, len, |data| read_display_group(data, &header))?;
        log::debug!("pmx: {} display groups", display_groups.len());

        let len = data.read_len()?;
        let rigids = read_records(&mut data, len, |data| read_rigid(data, &header))?;
        log::debug!("pmx: {} rigid bodies", rigids.len());

        let len = data.read_len()?;
        let joints = read_records(&mut data, len, |data| read_joint(data, &header))?;
        log::debug!("pmx: {} joints", joints.len());

        if !data.is_at_end() {
            log::debug!("pmx: {} trailing bytes ignored", data.remaining());
        }

        let mut pmx = Pmx {
            metadata: PmxMetadata {
                format: Format::Pmx,
                coordinate_system: CoordinateSystem::Left,
                header,
                name,
                name_en,
                comment,
                comment_en,
                vertex_count: vertices.len(),
                face_count: faces.len(),
                texture_count: textures.len(),
                material_count: materials.len(),
                bone_count: bones.len(),
                morph_count: morphs.len(),
                display_group_count: display_groups.len(),
                rigid_count: rigids.len(),
                joint_count: joints.len(),
            },
            vertices,
            faces,
            textures,
            materials,
            bones,
            morphs,
            display_groups,
            rigids,
            joints,
        };
        if options.convert_coordinates {
            pmx.convert_coordinates();
        }
        Ok(pmx)
    }
}

fn read_vertex(data: &mut DataCursor, header: &Header) -> Result<Vertex> {
    let position = data.read_vec3()?;
    let normal = data.read_vec3()?;
    let uv = data.read_vec2()?;
    let extended_uv = (0..header.additional_uv)
        .map(|_| data.read_vec4())
        .collect::<Result<Vec<_>>>()?;
    let offset = data.position();
    let mut sdef = None;
    let weight = match data.read_u8()? {
        0 => Weight::Bdef1(Bdef1 {
            bone: header.read_bone_index(data)?,
        }),
        1 => Weight::Bdef2(Bdef2 {
            bones: [header.read_bone_index(data)?, header.read_bone_index(data)?],
            weight: data.read_f32()?,
        }),
        2 => Weight::Bdef4(Bdef4 {
            bones: [
                header.read_bone_index(data)?,
                header.read_bone_index(data)?,
                header.read_bone_index(data)?,
                header.read_bone_index(data)?,
            ],
            weights: data.read_vec4()?,
        }),
        3 => {
            let weight = Bdef2 {
                bones: [header.read_bone_index(data)?, header.read_bone_index(data)?],
                weight: data.read_f32()?,
            };
            sdef = Some(Sdef {
                c: data.read_vec3()?,
                r0: data.read_vec3()?,
                r1: data.read_vec3()?,
            });
            Weight::Bdef2(weight)
        }
        v => return Err(Error::unsupported("vertex weight type", v, offset)),
    };
    let edge_ratio = data.read_f32()?;
    Ok(Vertex {
        position,
        normal,
        uv,
        extended_uv,
        weight,
        sdef,
        edge_ratio,
    })
}

fn read_material(data: &mut DataCursor, header: &Header) -> Result<Material> {
    let name = header.read_text(data)?;
    let name_en = header.read_text(data)?;
    let diffuse = data.read_vec4()?;
    let specular = data.read_vec3()?;
    let specular_power = data.read_f32()?;
    let ambient = data.read_vec3()?;
    let flags = data.read_u8()?;
    let edge_color = data.read_vec4()?;
    let edge_size = data.read_f32()?;
    let texture = header.read_texture_index(data)?;
    let sphere = header.read_texture_index(data)?;
    let offset = data.position();
    let sphere_mode = match data.read_u8()? {
        0 => SphereMode::None,
        1 => SphereMode::Mul,
        2 => SphereMode::Add,
        3 => SphereMode::SubTexture,
        v => return Err(Error::unsupported("material sphere mode", v, offset)),
    };
    let offset = data.position();
    let toon = match data.read_u8()? {
        0 => Toon::Texture(header.read_texture_index(data)?),
        1 => Toon::Shared(data.read_i8()?),
        v => return Err(Error::unsupported("material toon flag", v, offset)),
    };
    let memo = header.read_text(data)?;
    let index_count = data.read_u32()?;
    if index_count % 3 != 0 {
        log::warn!("pmx: material {name:?} index count {index_count} is not a multiple of 3");
    }
    Ok(Material {
        name,
        name_en,
        diffuse,
        specular,
        specular_power,
        ambient,
        both: flags & 0x01 != 0,
        ground_shadow: flags & 0x02 != 0,
        self_shadow_map: flags & 0x04 != 0,
        self_shadow: flags & 0x08 != 0,
        edge: flags & 0x10 != 0,
        edge_color,
        edge_size,
        texture,
        sphere,
        sphere_mode,
        toon,
        memo,
        face_count: index_count / 3,
    })
}

fn read_bone(data: &mut DataCursor, header: &Header) -> Result<Bone> {
    let name = header.read_text(data)?;
    let name_en = header.read_text(data)?;
    let position = data.read_vec3()?;
    let parent = header.read_bone_index(data)?;
    let deform_hierarchy = data.read_i32()?;
    let flags = BoneFlags::from_bits_retain(data.read_u16()?);

    // Optional blocks follow in flag-bit order; only their presence varies.
    let connected_to = if flags.contains(BoneFlags::CONNECT_TO_BONE) {
        ConnectTo::Bone(header.read_bone_index(data)?)
    } else {
        ConnectTo::Offset(data.read_vec3()?)
    };
    let addition = if flags
        .intersects(BoneFlags::ADDITION_ROTATION | BoneFlags::ADDITION_TRANSLATION)
    {
        Some(Addition {
            rotation: flags.contains(BoneFlags::ADDITION_ROTATION),
            translation: flags.contains(BoneFlags::ADDITION_TRANSLATION),
            local: flags.contains(BoneFlags::ADDITION_LOCAL),
            bone: header.read_bone_index(data)?,
            ratio: data.read_f32()?,
        })
    } else {
        None
    };
    let fixed_pole = if flags.contains(BoneFlags::FIXED_POLE) {
        Some(data.read_vec3()?)
    } else {
        None
    };
    let local_pole = if flags.contains(BoneFlags::LOCAL_POLE) {
        Some(LocalPole {
            x: data.read_vec3()?,
            z: data.read_vec3()?,
        })
    } else {
        None
    };
    let external_parent = if flags.contains(BoneFlags::EXTERNAL_PARENT) {
        Some(data.read_i32()?)
    } else {
        None
    };
    let ik = if flags.contains(BoneFlags::IK) {
        Some(read_ik(data, header)?)
    } else {
        None
    };
    Ok(Bone {
        name,
        name_en,
        position,
        parent,
        deform_hierarchy,
        flags,
        connected_to,
        addition,
        fixed_pole,
        local_pole,
        external_parent,
        ik,
    })
}

fn read_ik(data: &mut DataCursor, header: &Header) -> Result<Ik> {
    let target_bone = header.read_bone_index(data)?;
    let loop_count = data.read_u32()?;
    let angle = data.read_f32()?;
    let len = data.read_len()?;
    let links = read_records(data, len, |data| {
        let bone = header.read_bone_index(data)?;
        let limit = if data.read_u8()? == 1 {
            Some(Limit {
                lower: data.read_vec3()?,
                upper: data.read_vec3()?,
            })
        } else {
            None
        };
        Ok(IkLink { bone, limit })
    })?;
    Ok(Ik {
        target_bone,
        loop_count,
        angle,
        links,
    })
}

fn read_uv_morph(data: &mut DataCursor, header: &Header) -> Result<morph::Uv> {
    Ok(morph::Uv {
        vertex: header.read_vertex_index(data)?,
        offset: data.read_vec4()?,
    })
}

fn read_group_morph(data: &mut DataCursor, header: &Header) -> Result<morph::Group> {
    Ok(morph::Group {
        morph: header.read_morph_index(data)?,
        ratio: data.read_f32()?,
    })
}

fn read_material_morph(data: &mut DataCursor, header: &Header) -> Result<morph::Material> {
    let material = header.read_material_index(data)?;
    let offset = data.position();
    let op = match data.read_u8()? {
        0 => morph::MaterialOp::Mul,
        1 => morph::MaterialOp::Add,
        v => return Err(Error::unsupported("material morph operation", v, offset)),
    };
    Ok(morph::Material {
        material,
        op,
        diffuse: data.read_vec4()?,
        specular: data.read_vec3()?,
        specular_power: data.read_f32()?,
        ambient: data.read_vec3()?,
        edge_color: data.read_vec4()?,
        edge_size: data.read_f32()?,
        texture: data.read_vec4()?,
        sphere: data.read_vec4()?,
        toon: data.read_vec4()?,
    })
}

fn read_morph(data: &mut DataCursor, header: &Header) -> Result<Morph> {
    let name = header.read_text(data)?;
    let name_en = header.read_text(data)?;
    let panel = Panel::read(data)?;
    let offset = data.position();
    let kind = data.read_u8()?;
    let len = data.read_len()?;
    let kind = match kind {
        0 => morph::Kind::Group(read_records(data, len, |data| read_group_morph(data, header))?),
        1 => morph::Kind::Vertex(read_records(data, len, |data| {
            Ok(morph::Vertex {
                vertex: header.read_vertex_index(data)?,
                offset: data.read_vec3()?,
            })
        })?),
        2 => morph::Kind::Bone(read_records(data, len, |data| {
            Ok(morph::Bone {
                bone: header.read_bone_index(data)?,
                offset: data.read_vec3()?,
                rotation: data.read_vec4()?,
            })
        })?),
        3 => morph::Kind::Uv(read_records(data, len, |data| read_uv_morph(data, header))?),
        v @ 4..=7 => morph::Kind::ExtendedUv(
            v as usize - 4,
            read_records(data, len, |data| read_uv_morph(data, header))?,
        ),
        8 => morph::Kind::Material(read_records(data, len, |data| {
            read_material_morph(data, header)
        })?),
        9 => morph::Kind::Flip(read_records(data, len, |data| read_group_morph(data, header))?),
        10 => morph::Kind::Impulse(read_records(data, len, |data| {
            Ok(morph::Impulse {
                rigid: header.read_rigid_index(data)?,
                local: data.read_u8()? != 0,
                velocity: data.read_vec3()?,
                torque: data.read_vec3()?,
            })
        })?),
        v => return Err(Error::unsupported("morph type", v, offset)),
    };
    Ok(Morph {
        name,
        name_en,
        panel,
        kind,
    })
}

fn read_display_group(data: &mut DataCursor, header: &Header) -> Result<DisplayGroup> {
    let name = header.read_text(data)?;
    let name_en = header.read_text(data)?;
    let special = data.read_u8()? != 0;
    let len = data.read_len()?;
    let elements = read_records(data, len, |data| {
        let offset = data.position();
        match data.read_u8()? {
            0 => Ok(DisplayElement::Bone(header.read_bone_index(data)?)),
            1 => Ok(DisplayElement::Morph(header.read_morph_index(data)?)),
            v => Err(Error::unsupported("display group element", v, offset)),
        }
    })?;
    Ok(DisplayGroup {
        name,
        name_en,
        special,
        elements,
    })
}

fn read_rigid(data: &mut DataCursor, header: &Header) -> Result<Rigid> {
    let name = header.read_text(data)?;
    let name_en = header.read_text(data)?;
    let bone = header.read_bone_index(data)?;
    let group = data.read_u8()?;
    let non_collision_groups = data.read_u16()?;
    let shape = rigid::Shape::read(data)?;
    let size = data.read_vec3()?;
    let position = data.read_vec3()?;
    let rotation = data.read_vec3()?;
    let mass = data.read_f32()?;
    let damping_translation = data.read_f32()?;
    let damping_rotation = data.read_f32()?;
    let repulsive = data.read_f32()?;
    let friction = data.read_f32()?;
    let method = rigid::Method::read(data)?;
    Ok(Rigid {
        name,
        name_en,
        bone,
        group,
        non_collision_groups,
        shape,
        size,
        position,
        rotation,
        mass,
        damping_translation,
        damping_rotation,
        repulsive,
        friction,
        method,
    })
}

fn read_joint(data: &mut DataCursor, header: &Header) -> Result<Joint> {
    let name = header.read_text(data)?;
    let name_en = header.read_text(data)?;
    let kind = data.read_u8()?;
    let rigids = [header.read_rigid_index(data)?, header.read_rigid_index(data)?];
    let position = data.read_vec3()?;
    let rotation = data.read_vec3()?;
    let limit_translation = Limit {
        lower: data.read_vec3()?,
        upper: data.read_vec3()?,
    };
    let limit_rotation = Limit {
        lower: data.read_vec3()?,
        upper: data.read_vec3()?,
    };
    let spring_translation = data.read_vec3()?;
    let spring_rotation = data.read_vec3()?;
    Ok(Joint {
        name,
        name_en,
        kind,
        rigids,
        position,
        rotation,
        limit_translation,
        limit_rotation,
        spring_translation,
        spring_rotation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Bytes;

    /// PMX 2.0 header with UTF-16 text and 1-byte indices except the bone
    /// width, which is 2.
    fn header(bytes: &mut Bytes, additional_uv: u8) {
        bytes
            .raw(b"PMX ")
            .f32(2.0)
            .u8(8)
            .raw(&[0, additional_uv, 1, 1, 1, 2, 1, 1])
            .utf16("モデル")
            .utf16("model")
            .utf16("")
            .utf16("");
    }

    fn empty_sections(bytes: &mut Bytes, n: usize) {
        for _ in 0..n {
            bytes.u32(0);
        }
    }

    fn decode(bytes: &Bytes) -> Result<Pmx> {
        Pmx::decode(bytes.as_slice(), &DecodeOptions::default())
    }

    #[test]
    fn bad_magic() {
        let mut bytes = Bytes::new();
        bytes.raw(b"PMD ").f32(2.0);
        assert!(matches!(decode(&bytes), Err(Error::BadMagic { .. })));
    }

    #[test]
    fn unsupported_version() {
        let mut bytes = Bytes::new();
        bytes.raw(b"PMX ").f32(1.9).u8(8);
        match decode(&bytes) {
            Err(Error::UnsupportedVersion(v)) => assert_eq!(v, 1.9),
            r => panic!("unexpected {r:?}"),
        }
    }

    #[test]
    fn bad_index_width() {
        let mut bytes = Bytes::new();
        bytes.raw(b"PMX ").f32(2.1).u8(8).raw(&[0, 0, 3, 1, 1, 1, 1, 1]);
        assert!(matches!(
            decode(&bytes),
            Err(Error::UnsupportedVariant {
                what: "index width",
                value: 3,
                ..
            })
        ));
    }

    #[test]
    fn empty_model() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        empty_sections(&mut bytes, 9);
        let pmx = decode(&bytes).unwrap();
        assert_eq!(pmx.metadata.name, "モデル");
        assert_eq!(pmx.metadata.name_en, "model");
        assert_eq!(pmx.metadata.format, Format::Pmx);
        assert_eq!(pmx.metadata.coordinate_system, CoordinateSystem::Left);
        assert!(pmx.vertices.is_empty());
        assert!(pmx.joints.is_empty());
    }

    #[test]
    fn utf8_text() {
        let mut bytes = Bytes::new();
        bytes
            .raw(b"PMX ")
            .f32(2.0)
            .u8(8)
            .raw(&[1, 0, 1, 1, 1, 1, 1, 1])
            .utf8("名前")
            .utf8("name")
            .utf8("")
            .utf8("");
        empty_sections(&mut bytes, 9);
        let pmx = decode(&bytes).unwrap();
        assert_eq!(pmx.metadata.name, "名前");
        assert_eq!(pmx.metadata.header.encoding, crate::Encoding::Utf8);
    }

    #[test]
    fn vertices_with_every_weight_type() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 1);
        bytes.u32(4);
        let common = |bytes: &mut Bytes| {
            bytes
                .vec(&[1.0, 2.0, 3.0])
                .vec(&[0.0, 1.0, 0.0])
                .vec(&[0.5, 0.5])
                .vec(&[9.0, 9.0, 9.0, 9.0]);
        };
        common(&mut bytes);
        bytes.u8(0).i16(-1).f32(1.0);
        common(&mut bytes);
        bytes.u8(1).i16(1).i16(2).f32(0.25).f32(1.0);
        common(&mut bytes);
        bytes
            .u8(2)
            .i16(1)
            .i16(2)
            .i16(3)
            .i16(4)
            .vec(&[0.1, 0.2, 0.3, 0.4])
            .f32(1.0);
        common(&mut bytes);
        bytes
            .u8(3)
            .i16(5)
            .i16(6)
            .f32(0.75)
            .vec(&[1.0, 1.0, 1.0])
            .vec(&[2.0, 2.0, 2.0])
            .vec(&[3.0, 3.0, 3.0])
            .f32(0.5);
        empty_sections(&mut bytes, 8);

        let pmx = decode(&bytes).unwrap();
        assert_eq!(pmx.metadata.vertex_count, 4);
        assert_eq!(pmx.vertices[0].extended_uv, vec![[9.0; 4]]);
        assert!(matches!(pmx.vertices[0].weight, Weight::Bdef1(Bdef1 { bone: None })));
        assert!(matches!(
            pmx.vertices[3].weight,
            Weight::Bdef2(Bdef2 {
                bones: [Some(5), Some(6)],
                ..
            })
        ));
        let sdef = pmx.vertices[3].sdef.as_ref().unwrap();
        assert_eq!(sdef.r1, [3.0; 3]);
        assert_eq!(pmx.vertices[3].edge_ratio, 0.5);
        for vertex in &pmx.vertices {
            let sum: f32 = vertex.weight.influences().iter().map(|(_, w)| w).sum();
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn unknown_weight_type() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        bytes.u32(1).vec(&[0.0; 8]).u8(4);
        assert!(matches!(
            decode(&bytes),
            Err(Error::UnsupportedVariant {
                what: "vertex weight type",
                value: 4,
                ..
            })
        ));
    }

    #[test]
    fn faces_are_unsigned_triples() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        bytes.u32(0).u32(6).raw(&[0, 1, 2, 200, 254, 255]);
        empty_sections(&mut bytes, 7);
        let pmx = decode(&bytes).unwrap();
        assert_eq!(pmx.faces, vec![[0, 1, 2], [200, 254, 255]]);
        assert_eq!(pmx.metadata.face_count, 2);
    }

    #[test]
    fn partial_face_is_dropped() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        bytes.u32(0).u32(4).raw(&[0, 1, 2, 3]);
        empty_sections(&mut bytes, 7);
        let pmx = decode(&bytes).unwrap();
        assert_eq!(pmx.faces, vec![[0, 1, 2]]);
        assert_eq!(pmx.metadata.face_count, 1);
        assert!(pmx.textures.is_empty());
    }

    #[test]
    fn materials() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        bytes.u32(0).u32(0).u32(1).utf16("hair.png");
        bytes
            .u32(2)
            .utf16("髪")
            .utf16("hair")
            .vec(&[1.0, 1.0, 1.0, 1.0])
            .vec(&[0.0, 0.0, 0.0])
            .f32(5.0)
            .vec(&[0.5, 0.5, 0.5])
            .u8(0x1f)
            .vec(&[0.0, 0.0, 0.0, 1.0])
            .f32(1.0)
            .i8(0)
            .i8(-1)
            .u8(2)
            .u8(1)
            .i8(3)
            .utf16("")
            .u32(888);
        bytes
            .utf16("肌")
            .utf16("skin")
            .vec(&[1.0, 1.0, 1.0, 1.0])
            .vec(&[0.0, 0.0, 0.0])
            .f32(5.0)
            .vec(&[0.5, 0.5, 0.5])
            .u8(0)
            .vec(&[0.0, 0.0, 0.0, 1.0])
            .f32(1.0)
            .i8(-1)
            .i8(-1)
            .u8(0)
            .u8(0)
            .i8(0)
            .utf16("memo")
            .u32(3);
        empty_sections(&mut bytes, 5);

        let pmx = decode(&bytes).unwrap();
        assert_eq!(pmx.textures, vec!["hair.png".to_string()]);
        let hair = &pmx.materials[0];
        assert_eq!(hair.name, "髪");
        assert!(hair.both && hair.ground_shadow && hair.self_shadow_map && hair.self_shadow && hair.edge);
        assert_eq!(hair.texture, Some(0));
        assert_eq!(hair.sphere, None);
        assert_eq!(hair.sphere_mode, SphereMode::Add);
        assert!(matches!(hair.toon, Toon::Shared(3)));
        assert_eq!(hair.face_count, 296);
        let skin = &pmx.materials[1];
        assert!(matches!(skin.toon, Toon::Texture(Some(0))));
        assert_eq!(skin.memo, "memo");
        assert_eq!(skin.face_count, 1);
    }

    #[test]
    fn unknown_toon_flag() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        bytes
            .u32(0)
            .u32(0)
            .u32(0)
            .u32(1)
            .utf16("")
            .utf16("")
            .vec(&[0.0; 11])
            .u8(0)
            .vec(&[0.0; 5])
            .i8(-1)
            .i8(-1)
            .u8(0)
            .u8(2);
        assert!(matches!(
            decode(&bytes),
            Err(Error::UnsupportedVariant {
                what: "material toon flag",
                value: 2,
                ..
            })
        ));
    }

    #[test]
    fn bone_optional_blocks_follow_flag_order() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        empty_sections(&mut bytes, 4);
        bytes.u32(2);
        // Every optional block present.
        bytes
            .utf16("左足ＩＫ")
            .utf16("leg IK L")
            .vec(&[1.0, 2.0, 3.0])
            .i16(-1)
            .i32(0)
            .u16(0x0001 | 0x0020 | 0x0080 | 0x0100 | 0x0400 | 0x0800 | 0x2000)
            .i16(1)
            .i16(1)
            .f32(0.5)
            .vec(&[0.0, 1.0, 0.0])
            .vec(&[1.0, 0.0, 0.0])
            .vec(&[0.0, 0.0, 1.0])
            .i32(7)
            .i16(1)
            .u32(40)
            .f32(2.0)
            .u32(2)
            .i16(1)
            .u8(1)
            .vec(&[-3.14, 0.0, 0.0])
            .vec(&[-0.01, 0.0, 0.0])
            .i16(0)
            .u8(0);
        // No optional blocks but the tail offset.
        bytes
            .utf16("センター")
            .utf16("center")
            .vec(&[0.0, 8.0, 0.0])
            .i16(0)
            .i32(0)
            .u16(0x001e)
            .vec(&[0.0, -1.0, 0.0]);
        empty_sections(&mut bytes, 4);

        let pmx = decode(&bytes).unwrap();
        let ik_bone = &pmx.bones[0];
        assert_eq!(ik_bone.parent, None);
        assert!(matches!(ik_bone.connected_to, ConnectTo::Bone(Some(1))));
        let addition = ik_bone.addition.as_ref().unwrap();
        assert!(addition.rotation && !addition.translation && addition.local);
        assert_eq!(addition.bone, Some(1));
        assert_eq!(addition.ratio, 0.5);
        assert_eq!(ik_bone.fixed_pole, Some([0.0, 1.0, 0.0]));
        assert_eq!(ik_bone.local_pole.as_ref().unwrap().z, [0.0, 0.0, 1.0]);
        assert_eq!(ik_bone.external_parent, Some(7));
        let ik = ik_bone.ik.as_ref().unwrap();
        assert_eq!(ik.target_bone, Some(1));
        assert_eq!(ik.loop_count, 40);
        assert_eq!(ik.links.len(), 2);
        assert_eq!(ik.links[0].limit.as_ref().unwrap().upper, [-0.01, 0.0, 0.0]);
        assert!(ik.links[1].limit.is_none());

        let center = &pmx.bones[1];
        assert_eq!(center.name, "センター");
        assert!(center.rotatable() && center.translatable() && center.visible() && center.operable());
        match center.connected_to {
            ConnectTo::Offset(offset) => assert_eq!(offset, [0.0, -1.0, 0.0]),
            ref c => panic!("unexpected {c:?}"),
        }
        assert!(center.addition.is_none() && center.ik.is_none());
    }

    #[test]
    fn morph_kinds() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        empty_sections(&mut bytes, 5);
        bytes.u32(5);
        bytes
            .utf16("あ")
            .utf16("a")
            .u8(3)
            .u8(1)
            .u32(2)
            .u8(0)
            .vec(&[0.0, 0.0, 1.0])
            .u8(255)
            .vec(&[0.0, 0.0, 2.0]);
        bytes
            .utf16("uv1")
            .utf16("")
            .u8(4)
            .u8(5)
            .u32(1)
            .u8(3)
            .vec(&[0.1, 0.2, 0.3, 0.4]);
        bytes
            .utf16("bone")
            .utf16("")
            .u8(4)
            .u8(2)
            .u32(1)
            .i16(3)
            .vec(&[1.0, 2.0, 3.0])
            .vec(&[0.0, 0.0, 0.0, 1.0]);
        bytes
            .utf16("mat")
            .utf16("")
            .u8(4)
            .u8(8)
            .u32(1)
            .i8(-1)
            .u8(1)
            .vec(&[0.0; 28]);
        bytes
            .utf16("group")
            .utf16("")
            .u8(4)
            .u8(0)
            .u32(2)
            .i8(0)
            .f32(1.0)
            .i8(1)
            .f32(0.5);
        empty_sections(&mut bytes, 3);

        let pmx = decode(&bytes).unwrap();
        assert_eq!(pmx.morphs.len(), 5);
        assert_eq!(pmx.morphs[0].panel, Panel::Mouth);
        match &pmx.morphs[0].kind {
            morph::Kind::Vertex(v) => {
                assert_eq!(v[1].vertex, 255);
                assert_eq!(v[1].offset, [0.0, 0.0, 2.0]);
            }
            k => panic!("unexpected {k:?}"),
        }
        match &pmx.morphs[1].kind {
            morph::Kind::ExtendedUv(channel, v) => {
                assert_eq!(*channel, 1);
                assert_eq!(v[0].vertex, 3);
            }
            k => panic!("unexpected {k:?}"),
        }
        assert!(matches!(&pmx.morphs[2].kind, morph::Kind::Bone(v) if v[0].bone == Some(3)));
        match &pmx.morphs[3].kind {
            morph::Kind::Material(v) => {
                assert_eq!(v[0].material, None);
                assert_eq!(v[0].op, morph::MaterialOp::Add);
            }
            k => panic!("unexpected {k:?}"),
        }
        assert_eq!(pmx.morphs[4].kind.len(), 2);
    }

    #[test]
    fn unknown_morph_type() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        empty_sections(&mut bytes, 5);
        bytes.u32(1).utf16("x").utf16("").u8(4).u8(11).u32(0);
        assert!(matches!(
            decode(&bytes),
            Err(Error::UnsupportedVariant {
                what: "morph type",
                value: 11,
                ..
            })
        ));
    }

    #[test]
    fn display_groups_rigids_and_joints() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        empty_sections(&mut bytes, 6);
        bytes
            .u32(1)
            .utf16("Root")
            .utf16("Root")
            .u8(1)
            .u32(2)
            .u8(0)
            .i16(0)
            .u8(1)
            .i8(2);
        bytes
            .u32(1)
            .utf16("頭")
            .utf16("head")
            .i16(5)
            .u8(3)
            .u16(0xfffe)
            .u8(2)
            .vec(&[1.0, 2.0, 0.0])
            .vec(&[0.0, 15.0, 0.0])
            .vec(&[0.0, 0.0, 0.0])
            .vec(&[1.0, 0.5, 0.5, 0.0, 0.5])
            .u8(0);
        bytes
            .u32(1)
            .utf16("j")
            .utf16("")
            .u8(0)
            .i8(0)
            .i8(-1)
            .vec(&[0.0; 6])
            .vec(&[1.0, 2.0, 3.0])
            .vec(&[4.0, 5.0, 6.0])
            .vec(&[-0.1, -0.2, -0.3])
            .vec(&[0.1, 0.2, 0.3])
            .vec(&[0.0; 6]);

        let pmx = decode(&bytes).unwrap();
        let group = &pmx.display_groups[0];
        assert!(group.special);
        assert!(matches!(group.elements[0], DisplayElement::Bone(Some(0))));
        assert!(matches!(group.elements[1], DisplayElement::Morph(Some(2))));
        let rigid = &pmx.rigids[0];
        assert_eq!(rigid.bone, Some(5));
        assert_eq!(rigid.shape, rigid::Shape::Capsule);
        assert_eq!(rigid.method, rigid::Method::Static);
        assert_eq!(rigid.friction, 0.5);
        let joint = &pmx.joints[0];
        assert_eq!(joint.rigids, [Some(0), None]);
        assert_eq!(joint.limit_translation.upper, [4.0, 5.0, 6.0]);
        assert_eq!(joint.limit_rotation.lower, [-0.1, -0.2, -0.3]);
        assert_eq!(pmx.metadata.joint_count, 1);
    }

    #[test]
    fn convert_on_decode() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        bytes
            .u32(1)
            .vec(&[1.0, 2.0, 3.0])
            .vec(&[0.0, 0.0, 1.0])
            .vec(&[0.0, 0.0])
            .u8(0)
            .i16(0)
            .f32(1.0)
            .u32(3)
            .raw(&[0, 1, 2]);
        empty_sections(&mut bytes, 7);
        let options = DecodeOptions::default().with_convert_coordinates(true);
        let pmx = Pmx::decode(bytes.as_slice(), &options).unwrap();
        assert_eq!(pmx.metadata.coordinate_system, CoordinateSystem::Right);
        assert_eq!(pmx.vertices[0].position, [1.0, 2.0, -3.0]);
        assert_eq!(pmx.faces[0], [2, 1, 0]);
    }

    #[test]
    fn second_conversion_keeps_values() {
        let mut bytes = Bytes::new();
        header(&mut bytes, 0);
        bytes
            .u32(1)
            .vec(&[1.0, 2.0, 3.0])
            .vec(&[0.0, 0.0, 1.0])
            .vec(&[0.0, 0.0])
            .u8(0)
            .i16(0)
            .f32(1.0)
            .u32(3)
            .raw(&[0, 0, 0]);
        empty_sections(&mut bytes, 3);
        bytes
            .u32(2)
            .utf16("あ")
            .utf16("a")
            .u8(3)
            .u8(1)
            .u32(1)
            .u8(0)
            .vec(&[0.0, 0.5, 1.0])
            .utf16("bone")
            .utf16("")
            .u8(4)
            .u8(2)
            .u32(1)
            .i16(0)
            .vec(&[1.0, 2.0, 3.0])
            .vec(&[0.1, 0.2, 0.3, 0.9]);
        empty_sections(&mut bytes, 2);
        bytes
            .u32(1)
            .utf16("j")
            .utf16("")
            .u8(0)
            .i8(0)
            .i8(-1)
            .vec(&[1.0, 2.0, 3.0, 0.1, 0.2, 0.3])
            .vec(&[1.0, 2.0, 3.0])
            .vec(&[4.0, 5.0, 6.0])
            .vec(&[1.0, 2.0, 3.0])
            .vec(&[4.0, 5.0, 6.0])
            .vec(&[0.0; 6]);

        let options = DecodeOptions::default().with_convert_coordinates(true);
        let once = Pmx::decode(bytes.as_slice(), &options).unwrap();
        match &once.morphs[0].kind {
            morph::Kind::Vertex(v) => assert_eq!(v[0].offset, [0.0, 0.5, -1.0]),
            k => panic!("unexpected {k:?}"),
        }
        // Bone morphs are not converted.
        match &once.morphs[1].kind {
            morph::Kind::Bone(v) => assert_eq!(v[0].offset, [1.0, 2.0, 3.0]),
            k => panic!("unexpected {k:?}"),
        }
        let joint = &once.joints[0];
        assert_eq!(joint.position, [1.0, 2.0, -3.0]);
        assert_eq!(joint.rotation, [-0.1, -0.2, 0.3]);
        assert_eq!(joint.limit_translation.lower, [1.0, 2.0, -6.0]);
        assert_eq!(joint.limit_translation.upper, [4.0, 5.0, -3.0]);
        assert_eq!(joint.limit_rotation.lower, [-4.0, -5.0, 3.0]);
        assert_eq!(joint.limit_rotation.upper, [-1.0, -2.0, 6.0]);

        let mut twice = once.clone();
        twice.convert_coordinates();
        assert_eq!(twice.metadata.coordinate_system, CoordinateSystem::Right);
        assert_eq!(twice.vertices[0].position, once.vertices[0].position);
        assert_eq!(twice.vertices[0].normal, once.vertices[0].normal);
        assert_eq!(twice.faces, once.faces);
        match (&once.morphs[0].kind, &twice.morphs[0].kind) {
            (morph::Kind::Vertex(a), morph::Kind::Vertex(b)) => {
                assert_eq!(a[0].offset, b[0].offset)
            }
            k => panic!("unexpected {k:?}"),
        }
        let (a, b) = (&once.joints[0], &twice.joints[0]);
        assert_eq!(a.position, b.position);
        assert_eq!(a.rotation, b.rotation);
        assert_eq!(a.limit_translation, b.limit_translation);
        assert_eq!(a.limit_rotation, b.limit_rotation);
    }
}
