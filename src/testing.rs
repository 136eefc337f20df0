//! Little-endian buffer builder for decoder tests.

#[derive(Default)]
pub struct Bytes(Vec<u8>);

impl Bytes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.0.extend_from_slice(bytes);
        self
    }

    pub fn u8(&mut self, v: u8) -> &mut Self {
        self.raw(&[v])
    }

    pub fn i8(&mut self, v: i8) -> &mut Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn u16(&mut self, v: u16) -> &mut Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn i16(&mut self, v: i16) -> &mut Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn u32(&mut self, v: u32) -> &mut Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn i32(&mut self, v: i32) -> &mut Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn f32(&mut self, v: f32) -> &mut Self {
        self.raw(&v.to_le_bytes())
    }

    pub fn vec(&mut self, v: &[f32]) -> &mut Self {
        for x in v {
            self.f32(*x);
        }
        self
    }

    /// Zero-padded fixed-size field.
    pub fn fixed(&mut self, size: usize, bytes: &[u8]) -> &mut Self {
        assert!(bytes.len() <= size);
        self.raw(bytes);
        self.raw(&vec![0; size - bytes.len()])
    }

    /// Zero-padded fixed-size Shift_JIS field.
    pub fn sjis(&mut self, size: usize, text: &str) -> &mut Self {
        let (bytes, _, _) = encoding_rs::SHIFT_JIS.encode(text);
        self.fixed(size, &bytes)
    }

    /// Length-prefixed UTF-16LE text.
    pub fn utf16(&mut self, text: &str) -> &mut Self {
        let units = text.encode_utf16().collect::<Vec<_>>();
        self.u32(units.len() as u32 * 2);
        for u in units {
            self.u16(u);
        }
        self
    }

    /// Length-prefixed UTF-8 text.
    pub fn utf8(&mut self, text: &str) -> &mut Self {
        self.u32(text.len() as u32);
        self.raw(text.as_bytes())
    }
}

/// PMD header plus empty vertex/face/material/bone/IK/morph/display sections,
/// ending right after the English-compatibility byte (0).
pub fn minimal_pmd() -> Bytes {
    let mut bytes = Bytes::new();
    bytes
        .raw(b"Pmd")
        .f32(1.0)
        .sjis(20, "初音ミク")
        .sjis(256, "comment")
        .u32(0)
        .u32(0)
        .u32(0)
        .u16(0)
        .u16(0)
        .u16(0)
        .u8(0)
        .u8(0)
        .u32(0)
        .u8(0);
    bytes
}
