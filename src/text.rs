/// Maps raw bytes of a legacy 8-bit text encoding to a string. Decoding is
/// total: unmappable bytes become replacement characters.
pub trait LegacyTextDecoder {
    fn decode(&self, bytes: &[u8]) -> String;
}

/// Shift_JIS, the encoding of every fixed-length text field in PMD and VMD.
#[derive(Clone, Copy, Default, Debug)]
pub struct ShiftJis;

impl LegacyTextDecoder for ShiftJis {
    fn decode(&self, bytes: &[u8]) -> String {
        encoding_rs::SHIFT_JIS
            .decode_without_bom_handling(bytes)
            .0
            .into_owned()
    }
}

impl LegacyTextDecoder for &'static encoding_rs::Encoding {
    fn decode(&self, bytes: &[u8]) -> String {
        (*self).decode_without_bom_handling(bytes).0.into_owned()
    }
}
