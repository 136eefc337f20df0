//! Decoders for the MikuMikuDance file family: PMD and PMX models, VMD
//! motions and VPD poses, with optional conversion from the native
//! left-handed coordinates to right-handed ones.

mod convert;
mod header;
mod options;
mod reader;
mod text;

pub mod pmd;
pub mod pmx;
pub mod vmd;
pub mod vpd;

#[cfg(test)]
mod testing;

pub use convert::ConvertCoordinates;
pub use header::{Encoding, Header};
pub use options::DecodeOptions;
pub use pmd::Pmd;
pub use pmx::Pmx;
pub use reader::{DataCursor, Error, IndexWidth, Result};
pub use text::{LegacyTextDecoder, ShiftJis};
pub use vmd::{merge_vmds, Vmd};
pub use vpd::Vpd;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Format {
    Pmd,
    Pmx,
    Vmd,
    Vpd,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CoordinateSystem {
    Left,
    Right,
}

/// A lower/upper pair of translation or rotation limits.
#[derive(Clone, Debug, PartialEq)]
pub struct Limit {
    pub lower: [f32; 3],
    pub upper: [f32; 3],
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Panel {
    Reserved,
    Eyebrow,
    Eye,
    Mouth,
    Other,
}

impl Panel {
    fn read(data: &mut DataCursor) -> Result<Self> {
        let offset = data.position();
        match data.read_u8()? {
            0 => Ok(Panel::Reserved),
            1 => Ok(Panel::Eyebrow),
            2 => Ok(Panel::Eye),
            3 => Ok(Panel::Mouth),
            4 => Ok(Panel::Other),
            v => Err(Error::unsupported("morph panel", v, offset)),
        }
    }
}

pub mod rigid {
    use crate::reader::{DataCursor, Error, Result};

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum Shape {
        Sphere,
        Box,
        Capsule,
    }

    impl Shape {
        pub(crate) fn read(data: &mut DataCursor) -> Result<Self> {
            let offset = data.position();
            match data.read_u8()? {
                0 => Ok(Shape::Sphere),
                1 => Ok(Shape::Box),
                2 => Ok(Shape::Capsule),
                v => Err(Error::unsupported("rigid shape", v, offset)),
            }
        }
    }

    #[derive(Clone, Copy, PartialEq, Eq, Debug)]
    pub enum Method {
        Static,
        Dynamic,
        DynamicWithBone,
    }

    impl Method {
        pub(crate) fn read(data: &mut DataCursor) -> Result<Self> {
            let offset = data.position();
            match data.read_u8()? {
                0 => Ok(Method::Static),
                1 => Ok(Method::Dynamic),
                2 => Ok(Method::DynamicWithBone),
                v => Err(Error::unsupported("rigid method", v, offset)),
            }
        }
    }
}

/// A decoded model of either format.
#[derive(Clone, Debug)]
pub enum Model {
    Pmd(Pmd),
    Pmx(Pmx),
}

impl Model {
    /// Picks the decoder from the leading magic bytes.
    pub fn decode(data: &[u8], options: &DecodeOptions) -> Result<Self> {
        if data.starts_with(Header::MAGIC.as_bytes()) {
            Pmx::decode(data, options).map(Model::Pmx)
        } else if data.starts_with(pmd::MAGIC.as_bytes()) {
            Pmd::decode(data, options).map(Model::Pmd)
        } else {
            let mut cursor = DataCursor::new(data);
            let found = cursor.read_chars(data.len().min(4)).unwrap_or_default();
            Err(Error::BadMagic {
                expected: "Pmd or PMX ",
                found,
            })
        }
    }

    pub fn format(&self) -> Format {
        match self {
            Model::Pmd(_) => Format::Pmd,
            Model::Pmx(_) => Format::Pmx,
        }
    }
}

impl ConvertCoordinates for Model {
    fn convert_coordinates(&mut self) {
        match self {
            Model::Pmd(pmd) => pmd.convert_coordinates(),
            Model::Pmx(pmx) => pmx.convert_coordinates(),
        }
    }
}

fn options(convert_coordinates: bool) -> DecodeOptions<'static> {
    DecodeOptions::default().with_convert_coordinates(convert_coordinates)
}

/// Decodes a PMD model, Shift_JIS text.
pub fn decode_pmd(data: &[u8], convert_coordinates: bool) -> Result<Pmd> {
    Pmd::decode(data, &options(convert_coordinates))
}

pub fn decode_pmx(data: &[u8], convert_coordinates: bool) -> Result<Pmx> {
    Pmx::decode(data, &options(convert_coordinates))
}

/// Decodes a VMD motion, Shift_JIS text.
pub fn decode_vmd(data: &[u8], convert_coordinates: bool) -> Result<Vmd> {
    Vmd::decode(data, &options(convert_coordinates))
}

pub fn decode_vpd(text: &str, convert_coordinates: bool) -> Result<Vpd> {
    Vpd::decode(text, &options(convert_coordinates))
}
