use std::path::Path;

use mmd_parser::{merge_vmds, Model};

fn dump_model(model: &Model) {
    match model {
        Model::Pmd(pmd) => {
            let m = &pmd.metadata;
            println!("[name] {}", m.name);
            println!("[comment]\n{}", m.comment);
            println!("[vertices : {}]", m.vertex_count);
            println!("[faces : {}]", m.face_count);
            println!("[materials : {}]", m.material_count);
            for material in &pmd.materials {
                println!("{}", material.file_name);
            }
            println!("[bones : {}]", m.bone_count);
            println!("[morphs : {}]", m.morph_count);
            println!("[rigids : {}]", m.rigid_count);
            println!("[joints : {}]", m.joint_count);
        }
        Model::Pmx(pmx) => {
            let m = &pmx.metadata;
            println!("[name] {}", m.name);
            println!("[name EN] {}", m.name_en);
            println!("[comment]\n{}", m.comment);
            println!("[vertices : {}]", m.vertex_count);
            println!("[faces : {}]", m.face_count);
            println!("[textures : {}]", m.texture_count);
            for texture in &pmx.textures {
                println!("{texture}");
            }
            println!("[materials : {}]", m.material_count);
            for material in &pmx.materials {
                println!("{}", material.name);
            }
            println!("[bones : {}]", m.bone_count);
            println!("[morphs : {}]", m.morph_count);
            println!("[rigids : {}]", m.rigid_count);
            println!("[joints : {}]", m.joint_count);
        }
    }
}

/// Usage: dump [--right] FILE...
///
/// Several .vmd files are merged before printing.
fn main() -> anyhow::Result<()> {
    let mut convert = false;
    let mut paths = Vec::new();
    for arg in std::env::args().skip(1) {
        if arg == "--right" {
            convert = true;
        } else {
            paths.push(arg);
        }
    }
    anyhow::ensure!(!paths.is_empty(), "usage: dump [--right] FILE...");
    let options = mmd_parser::DecodeOptions::default().with_convert_coordinates(convert);

    let mut motions = Vec::new();
    for path in &paths {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match extension.as_deref() {
            Some("vmd") => motions.push(mmd_parser::Vmd::decode(&std::fs::read(path)?, &options)?),
            Some("vpd") => {
                let bytes = std::fs::read(path)?;
                let (text, _, _) = encoding_rs::SHIFT_JIS.decode(&bytes);
                let vpd = mmd_parser::Vpd::decode(&text, &options)?;
                println!("[parent] {}", vpd.metadata.parent_file);
                println!("[bones : {}]", vpd.metadata.bone_count);
                for bone in &vpd.bones {
                    println!("{} {:?} {:?}", bone.name, bone.translation, bone.rotation);
                }
            }
            _ => dump_model(&Model::decode(&std::fs::read(path)?, &options)?),
        }
    }

    if let Some(vmd) = merge_vmds(&motions) {
        let m = &vmd.metadata;
        println!("[model] {}", m.name);
        println!("[motions : {}]", m.motion_count);
        println!("[morphs : {}]", m.morph_count);
        println!("[cameras : {}]", m.camera_count);
        println!("[lights : {}]", m.light_count);
        println!("[shadows : {}]", m.shadow_count);
        println!("[properties : {}]", m.property_count);
    }
    Ok(())
}
