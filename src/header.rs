use crate::reader::{signed_index, DataCursor, Error, IndexWidth, Result};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum Encoding {
    Utf16 = 0,
    Utf8 = 1,
}

/// Per-document decode context taken from the PMX globals block. Every
/// section parser receives it by reference.
#[derive(Clone, Debug)]
pub struct Header {
    pub version: f32,
    pub header_size: u8,
    pub encoding: Encoding,
    pub additional_uv: u8,
    pub vertex_index_size: IndexWidth,
    pub texture_index_size: IndexWidth,
    pub material_index_size: IndexWidth,
    pub bone_index_size: IndexWidth,
    pub morph_index_size: IndexWidth,
    pub rigid_index_size: IndexWidth,
}

impl Header {
    pub const MAGIC: &'static str = "PMX ";
    const GLOBALS: usize = 8;

    pub(crate) fn read(data: &mut DataCursor) -> Result<Self> {
        let magic = data.read_chars(4)?;
        if magic != Self::MAGIC {
            return Err(Error::BadMagic {
                expected: Self::MAGIC,
                found: magic,
            });
        }
        let version = data.read_f32()?;
        if version != 2.0 && version != 2.1 {
            return Err(Error::UnsupportedVersion(version));
        }
        let header_size = data.read_u8()?;
        if (header_size as usize) < Self::GLOBALS {
            return Err(Error::invalid_header(format!(
                "globals length {header_size}, expected at least {}",
                Self::GLOBALS
            )));
        }
        let offset = data.position();
        let encoding = match data.read_u8()? {
            0 => Encoding::Utf16,
            1 => Encoding::Utf8,
            v => return Err(Error::unsupported("text encoding", v, offset)),
        };
        let additional_uv = data.read_u8()?;
        if additional_uv > 4 {
            return Err(Error::unsupported("additional uv count", additional_uv, offset + 1));
        }
        let mut index_size = || {
            let offset = data.position();
            IndexWidth::from_u8(data.read_u8()?, offset)
        };
        let header = Self {
            version,
            header_size,
            encoding,
            additional_uv,
            vertex_index_size: index_size()?,
            texture_index_size: index_size()?,
            material_index_size: index_size()?,
            bone_index_size: index_size()?,
            morph_index_size: index_size()?,
            rigid_index_size: index_size()?,
        };
        data.skip(header_size as usize - Self::GLOBALS)?;
        log::trace!("pmx header: {header:?}");
        Ok(header)
    }

    pub(crate) fn read_text(&self, data: &mut DataCursor) -> Result<String> {
        let len = data.read_len()?;
        match self.encoding {
            Encoding::Utf16 => data.read_utf16(len),
            Encoding::Utf8 => data.read_utf8(len),
        }
    }

    pub(crate) fn read_vertex_index(&self, data: &mut DataCursor) -> Result<usize> {
        Ok(data.read_index(self.vertex_index_size, true)? as u32 as usize)
    }

    pub(crate) fn read_texture_index(&self, data: &mut DataCursor) -> Result<Option<usize>> {
        Ok(signed_index(data.read_index(self.texture_index_size, false)?))
    }

    pub(crate) fn read_material_index(&self, data: &mut DataCursor) -> Result<Option<usize>> {
        Ok(signed_index(data.read_index(self.material_index_size, false)?))
    }

    pub(crate) fn read_bone_index(&self, data: &mut DataCursor) -> Result<Option<usize>> {
        Ok(signed_index(data.read_index(self.bone_index_size, false)?))
    }

    pub(crate) fn read_morph_index(&self, data: &mut DataCursor) -> Result<Option<usize>> {
        Ok(signed_index(data.read_index(self.morph_index_size, false)?))
    }

    pub(crate) fn read_rigid_index(&self, data: &mut DataCursor) -> Result<Option<usize>> {
        Ok(signed_index(data.read_index(self.rigid_index_size, false)?))
    }
}
