//! Parser for VPD pose text.
//!
//! ```text
//! Vocaloid Pose Data file
//!
//! miku.osm;      // parent file
//! 2;             // bone count
//!
//! Bone0{センター
//!   0.000000,1.000000,0.000000;
//!   0.000000,0.000000,0.000000,1.000000;
//! }
//! ```
//!
//! A bone record is committed on its closing brace. Each of the name,
//! translation and rotation slots may be filled once per record.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

use super::*;
use crate::reader::{Error, Result};

pub const MAGIC: &str = "Vocaloid Pose Data file";

const NUMBER: &str = r"(-?[0-9]+(?:\.[0-9]+)?)";

lazy_static! {
    static ref LINE_BREAK: Regex = Regex::new(r"\r\n|\r|\n").expect("line break pattern");
    static ref HEADER: Regex =
        Regex::new(r"^\s*(Bone[0-9]+)\s*\{\s*(.*)$").expect("bone header pattern");
    static ref VECTOR: Regex = Regex::new(&format!(r"^\s*{NUMBER}\s*,\s*{NUMBER}\s*,\s*{NUMBER}\s*;"))
        .expect("vector pattern");
    static ref QUATERNION: Regex = Regex::new(&format!(
        r"^\s*{NUMBER}\s*,\s*{NUMBER}\s*,\s*{NUMBER}\s*,\s*{NUMBER}\s*;"
    ))
    .expect("quaternion pattern");
    static ref FOOTER: Regex = Regex::new(r"^\s*\}").expect("bone footer pattern");
}

#[derive(Clone, Debug)]
pub struct VpdMetadata {
    pub format: Format,
    pub coordinate_system: CoordinateSystem,
    pub parent_file: String,
    pub bone_count: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VpdBone {
    pub name: String,
    pub translation: [f32; 3],
    pub rotation: [f32; 4],
}

#[derive(Clone, Debug)]
pub struct Vpd {
    pub metadata: VpdMetadata,
    pub bones: Vec<VpdBone>,
}

fn malformed(line: usize, reason: &'static str) -> Error {
    Error::MalformedPose { line, reason }
}

fn strip_comment(line: &str) -> &str {
    line.find("//").map_or(line, |i| &line[..i])
}

fn numbers<const N: usize>(captures: &Captures, line: usize) -> Result<[f32; N]> {
    let mut values = [0.0f32; N];
    for (i, v) in values.iter_mut().enumerate() {
        *v = captures[i + 1]
            .parse()
            .map_err(|_| malformed(line, "invalid number"))?;
    }
    Ok(values)
}

fn fill<T>(slot: &mut Option<T>, value: T, line: usize, reason: &'static str) -> Result<()> {
    if slot.is_some() {
        return Err(malformed(line, reason));
    }
    *slot = Some(value);
    Ok(())
}

/// The record being assembled between a header and its closing brace.
#[derive(Default)]
struct Pending {
    name: Option<String>,
    translation: Option<[f32; 3]>,
    rotation: Option<[f32; 4]>,
}

impl Pending {
    fn is_empty(&self) -> bool {
        self.name.is_none() && self.translation.is_none() && self.rotation.is_none()
    }

    fn take(&mut self, line: usize) -> Result<VpdBone> {
        match std::mem::take(self) {
            Pending {
                name: Some(name),
                translation: Some(translation),
                rotation: Some(rotation),
            } => Ok(VpdBone {
                name,
                translation,
                rotation,
            }),
            _ => Err(malformed(line, "incomplete bone record")),
        }
    }
}

impl Vpd {
    pub fn decode(text: &str, options: &DecodeOptions) -> Result<Self> {
        let lines = LINE_BREAK
            .split(text)
            .map(strip_comment)
            .collect::<Vec<_>>();

        if lines[0] != MAGIC {
            return Err(Error::BadMagic {
                expected: MAGIC,
                found: lines[0].to_string(),
            });
        }
        if lines.len() < 4 {
            return Err(malformed(lines.len(), "missing pose header"));
        }
        let parent_file = lines[2].trim().to_string();
        let declared = lines[3].trim_start();
        let digits = declared
            .find(|c: char| !c.is_ascii_digit())
            .map_or(declared, |i| &declared[..i]);
        let declared = digits
            .parse::<usize>()
            .map_err(|_| malformed(4, "invalid bone count"))?;
        log::trace!("vpd: parent {parent_file:?}, {declared} bones declared");

        let mut bones = Vec::with_capacity(declared.min(lines.len()));
        let mut pending = Pending::default();
        for (i, line) in lines.iter().enumerate().skip(4) {
            let number = i + 1;
            if let Some(captures) = HEADER.captures(line) {
                fill(
                    &mut pending.name,
                    captures[2].trim_end().to_string(),
                    number,
                    "duplicate bone header",
                )?;
            }
            if let Some(captures) = VECTOR.captures(line) {
                let translation = numbers::<3>(&captures, number)?;
                fill(
                    &mut pending.translation,
                    translation,
                    number,
                    "duplicate translation",
                )?;
            }
            if let Some(captures) = QUATERNION.captures(line) {
                let rotation = numbers::<4>(&captures, number)?;
                fill(&mut pending.rotation, rotation, number, "duplicate rotation")?;
            }
            if FOOTER.is_match(line) {
                bones.push(pending.take(number)?);
            }
        }
        if !pending.is_empty() {
            return Err(malformed(lines.len(), "unterminated bone record"));
        }
        if bones.len() != declared {
            log::warn!(
                "vpd: header declares {declared} bones, found {}",
                bones.len()
            );
        }
        log::debug!("vpd: {} bones", bones.len());

        let mut vpd = Vpd {
            metadata: VpdMetadata {
                format: Format::Vpd,
                coordinate_system: CoordinateSystem::Left,
                parent_file,
                bone_count: bones.len(),
            },
            bones,
        };
        if options.convert_coordinates {
            vpd.convert_coordinates();
        }
        Ok(vpd)
    }
}
