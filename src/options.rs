use crate::text::{LegacyTextDecoder, ShiftJis};

/// Settings shared by every decoder.
#[derive(Clone, Copy)]
pub struct DecodeOptions<'a> {
    /// Convert the decoded document to right-handed coordinates before
    /// returning it.
    pub convert_coordinates: bool,
    /// Decoder for fixed-length PMD/VMD text fields.
    pub legacy_text: &'a dyn LegacyTextDecoder,
}

impl Default for DecodeOptions<'static> {
    fn default() -> Self {
        Self {
            convert_coordinates: false,
            legacy_text: &ShiftJis,
        }
    }
}

impl<'a> DecodeOptions<'a> {
    pub fn with_convert_coordinates(mut self, convert_coordinates: bool) -> Self {
        self.convert_coordinates = convert_coordinates;
        self
    }

    pub fn with_legacy_text<'b>(self, legacy_text: &'b dyn LegacyTextDecoder) -> DecodeOptions<'b> {
        DecodeOptions {
            convert_coordinates: self.convert_coordinates,
            legacy_text,
        }
    }
}

impl std::fmt::Debug for DecodeOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodeOptions")
            .field("convert_coordinates", &self.convert_coordinates)
            .finish_non_exhaustive()
    }
}
