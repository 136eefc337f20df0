use crate::text::LegacyTextDecoder;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("bad magic: expected {expected:?}, found {found:?}")]
    BadMagic {
        expected: &'static str,
        found: String,
    },
    #[error("unsupported version {0}")]
    UnsupportedVersion(f32),
    #[error("unsupported {what} {value} at offset {offset:#x}")]
    UnsupportedVariant {
        what: &'static str,
        value: i64,
        offset: usize,
    },
    #[error("reading {len} bytes at offset {offset:#x} overruns the buffer ({available} bytes)")]
    OutOfRange {
        offset: usize,
        len: usize,
        available: usize,
    },
    #[error("malformed pose at line {line}: {reason}")]
    MalformedPose { line: usize, reason: &'static str },
    #[error("invalid header: {0}")]
    InvalidHeader(String),
}

impl Error {
    pub(crate) fn invalid_header(msg: impl Into<String>) -> Self {
        Self::InvalidHeader(msg.into())
    }

    pub(crate) fn unsupported(what: &'static str, value: impl Into<i64>, offset: usize) -> Self {
        Self::UnsupportedVariant {
            what,
            value: value.into(),
            offset,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Byte width of a cross-reference field, declared once per document.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum IndexWidth {
    One,
    Two,
    Four,
}

impl IndexWidth {
    pub fn from_u8(value: u8, offset: usize) -> Result<Self> {
        match value {
            1 => Ok(Self::One),
            2 => Ok(Self::Two),
            4 => Ok(Self::Four),
            v => Err(Error::unsupported("index width", v, offset)),
        }
    }
}

/// Forward-only little-endian reader over a borrowed buffer.
///
/// Every read consumes exactly its declared width. Reads that would run past
/// the end of the buffer fail with [`Error::OutOfRange`] and leave the
/// position untouched.
#[derive(Clone, Debug)]
pub struct DataCursor<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> DataCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn position(&self) -> usize {
        self.offset
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn is_at_end(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .ok_or(Error::OutOfRange {
                offset: self.offset,
                len,
                available: self.data.len(),
            })?;
        let bytes = &self.data[self.offset..end];
        self.offset = end;
        Ok(bytes)
    }

    pub fn skip(&mut self, len: usize) -> Result<()> {
        self.take(len).map(|_| ())
    }

    pub fn read_bin<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buffer = [0u8; N];
        buffer.copy_from_slice(self.take(N)?);
        Ok(buffer)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_bin::<1>()?[0])
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_bin()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_bin()?))
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(i8::from_le_bytes(self.read_bin()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_bin()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_bin()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_le_bytes(self.read_bin()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_le_bytes(self.read_bin()?))
    }

    pub fn read_vec<const N: usize>(&mut self) -> Result<[f32; N]> {
        let mut buffer = [0.0f32; N];
        for v in buffer.iter_mut() {
            *v = self.read_f32()?;
        }
        Ok(buffer)
    }

    pub fn read_vec2(&mut self) -> Result<[f32; 2]> {
        self.read_vec::<2>()
    }

    pub fn read_vec3(&mut self) -> Result<[f32; 3]> {
        self.read_vec::<3>()
    }

    pub fn read_vec4(&mut self) -> Result<[f32; 4]> {
        self.read_vec::<4>()
    }

    pub fn read_u16s<const N: usize>(&mut self) -> Result<[u16; N]> {
        let mut buffer = [0u16; N];
        for v in buffer.iter_mut() {
            *v = self.read_u16()?;
        }
        Ok(buffer)
    }

    pub fn read_u32s<const N: usize>(&mut self) -> Result<[u32; N]> {
        let mut buffer = [0u32; N];
        for v in buffer.iter_mut() {
            *v = self.read_u32()?;
        }
        Ok(buffer)
    }

    pub fn read_i8s<const N: usize>(&mut self) -> Result<[i8; N]> {
        Ok(self.read_bin::<N>()?.map(|b| b as i8))
    }

    pub fn read_i16s<const N: usize>(&mut self) -> Result<[i16; N]> {
        let mut buffer = [0i16; N];
        for v in buffer.iter_mut() {
            *v = self.read_i16()?;
        }
        Ok(buffer)
    }

    pub fn read_i32s<const N: usize>(&mut self) -> Result<[i32; N]> {
        let mut buffer = [0i32; N];
        for v in buffer.iter_mut() {
            *v = self.read_i32()?;
        }
        Ok(buffer)
    }

    /// Reads an index of the given width. Widths 1 and 2 honour `unsigned`;
    /// width 4 is always a signed 32-bit value.
    pub fn read_index(&mut self, width: IndexWidth, unsigned: bool) -> Result<i32> {
        Ok(match (width, unsigned) {
            (IndexWidth::One, true) => self.read_u8()? as i32,
            (IndexWidth::One, false) => self.read_i8()? as i32,
            (IndexWidth::Two, true) => self.read_u16()? as i32,
            (IndexWidth::Two, false) => self.read_i16()? as i32,
            (IndexWidth::Four, _) => self.read_i32()?,
        })
    }

    /// Fixed-size field holding text up to the first zero byte. The whole
    /// field is consumed.
    fn read_terminated(&mut self, size: usize) -> Result<&'a [u8]> {
        let field = self.take(size)?;
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        Ok(&field[..end])
    }

    /// Fixed-size field decoded one byte per character.
    pub fn read_chars(&mut self, size: usize) -> Result<String> {
        Ok(self
            .read_terminated(size)?
            .iter()
            .map(|&b| b as char)
            .collect())
    }

    /// Fixed-size field in a legacy 8-bit encoding.
    pub fn read_legacy_text(
        &mut self,
        size: usize,
        decoder: &dyn LegacyTextDecoder,
    ) -> Result<String> {
        let bytes = self.read_terminated(size)?;
        Ok(decoder.decode(bytes))
    }

    /// Fixed-size field of UTF-16LE code units, stopping at a zero unit.
    pub fn read_utf16(&mut self, size: usize) -> Result<String> {
        let field = self.take(size)?;
        let units = field
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .take_while(|&u| u != 0)
            .collect::<Vec<_>>();
        Ok(String::from_utf16_lossy(&units))
    }

    /// Fixed-size field of UTF-8, stopping at a zero byte.
    pub fn read_utf8(&mut self, size: usize) -> Result<String> {
        let bytes = self.read_terminated(size)?;
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn read_len(&mut self) -> Result<usize> {
        Ok(self.read_u32()? as usize)
    }
}

/// Reads `len` records with `f`, failing on the first record that fails.
pub(crate) fn read_records<'a, T>(
    data: &mut DataCursor<'a>,
    len: usize,
    mut f: impl FnMut(&mut DataCursor<'a>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut records = Vec::with_capacity(len.min(data.remaining()));
    for _ in 0..len {
        records.push(f(data)?);
    }
    Ok(records)
}

/// Groups a flat index list into triangles. Indices left over after the
/// last complete triangle are dropped.
pub(crate) fn triangles<T: Copy>(indices: &[T]) -> Vec<[T; 3]> {
    if indices.len() % 3 != 0 {
        log::warn!(
            "index count {} is not a multiple of 3, dropping {} trailing",
            indices.len(),
            indices.len() % 3
        );
    }
    indices
        .chunks_exact(3)
        .map(|c| [c[0], c[1], c[2]])
        .collect()
}

/// Maps a signed index to `None` when it is the negative "no target" sentinel.
pub(crate) fn signed_index(v: i32) -> Option<usize> {
    (v >= 0).then_some(v as usize)
}
