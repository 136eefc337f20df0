//! Left-handed to right-handed conversion of decoded documents.
//!
//! Positions negate z, quaternions negate x and y, Euler angles negate x and
//! y, and triangles reverse their winding. Limit pairs are negated and
//! swapped because flipping an axis exchanges which bound is the lower one.

use crate::{pmd::Pmd, pmx, pmx::Pmx, vmd::Vmd, vpd::Vpd, CoordinateSystem, Limit};

/// In-place coordinate conversion. Only a left-handed document is touched;
/// calling it again on the result does nothing.
pub trait ConvertCoordinates {
    fn convert_coordinates(&mut self);
}

fn vector(v: &mut [f32; 3]) {
    v[2] = -v[2];
}

fn quaternion(q: &mut [f32; 4]) {
    q[0] = -q[0];
    q[1] = -q[1];
}

fn euler(r: &mut [f32; 3]) {
    r[0] = -r[0];
    r[1] = -r[1];
}

fn winding<T>(face: &mut [T; 3]) {
    face.swap(0, 2);
}

fn vector_range(limit: &mut Limit) {
    let lower = -limit.upper[2];
    limit.upper[2] = -limit.lower[2];
    limit.lower[2] = lower;
}

fn euler_range(limit: &mut Limit) {
    let (x, y) = (-limit.upper[0], -limit.upper[1]);
    limit.upper[0] = -limit.lower[0];
    limit.upper[1] = -limit.lower[1];
    limit.lower[0] = x;
    limit.lower[1] = y;
}

/// Flips `system` to right-handed, returning whether it was left-handed.
fn take_left(system: &mut CoordinateSystem) -> bool {
    if *system == CoordinateSystem::Left {
        *system = CoordinateSystem::Right;
        true
    } else {
        false
    }
}

impl ConvertCoordinates for Pmd {
    fn convert_coordinates(&mut self) {
        if !take_left(&mut self.metadata.coordinate_system) {
            return;
        }
        for v in &mut self.vertices {
            vector(&mut v.position);
            vector(&mut v.normal);
        }
        self.faces.iter_mut().for_each(winding);
        for bone in &mut self.bones {
            vector(&mut bone.position);
        }
        for element in self.morphs.iter_mut().flat_map(|m| &mut m.elements) {
            vector(&mut element.position);
        }
        for rigid in &mut self.rigids {
            vector(&mut rigid.position);
            euler(&mut rigid.rotation);
        }
        for joint in &mut self.joints {
            vector(&mut joint.position);
            euler(&mut joint.rotation);
            vector_range(&mut joint.limit_translation);
            euler_range(&mut joint.limit_rotation);
        }
    }
}

impl ConvertCoordinates for Pmx {
    fn convert_coordinates(&mut self) {
        if !take_left(&mut self.metadata.coordinate_system) {
            return;
        }
        for v in &mut self.vertices {
            vector(&mut v.position);
            vector(&mut v.normal);
        }
        self.faces.iter_mut().for_each(winding);
        for bone in &mut self.bones {
            vector(&mut bone.position);
        }
        // Other morph kinds keep their stored values.
        for morph in &mut self.morphs {
            if let pmx::morph::Kind::Vertex(elements) = &mut morph.kind {
                for element in elements {
                    vector(&mut element.offset);
                }
            }
        }
        for rigid in &mut self.rigids {
            vector(&mut rigid.position);
            euler(&mut rigid.rotation);
        }
        for joint in &mut self.joints {
            vector(&mut joint.position);
            euler(&mut joint.rotation);
            vector_range(&mut joint.limit_translation);
            euler_range(&mut joint.limit_rotation);
        }
    }
}

impl ConvertCoordinates for Vmd {
    fn convert_coordinates(&mut self) {
        if !take_left(&mut self.metadata.coordinate_system) {
            return;
        }
        for motion in &mut self.motions {
            vector(&mut motion.position);
            quaternion(&mut motion.rotation);
        }
        for camera in &mut self.cameras {
            vector(&mut camera.position);
            euler(&mut camera.rotation);
        }
        for light in &mut self.lights {
            vector(&mut light.direction);
        }
    }
}

impl ConvertCoordinates for Vpd {
    fn convert_coordinates(&mut self) {
        if !take_left(&mut self.metadata.coordinate_system) {
            return;
        }
        for bone in &mut self.bones {
            vector(&mut bone.translation);
            quaternion(&mut bone.rotation);
        }
    }
}
