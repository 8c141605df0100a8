//! Compiles `lantern-shaders` into one SPIR-V module per entry point.
//!
//! Usage: `cargo run --release -- <output-dir>`; the output directory ends up
//! with a `*.spv` file per shader plus a `manifest.txt` the renderer loads
//! them through.

use std::error::Error;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::{env, fs};

use spirv_builder::{Capability, MetadataPrintout, SpirvBuilder};

fn main() -> Result<(), Box<dyn Error>> {
    let output_dir = env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("target/lantern-shaders"));

    let crate_path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .ok_or("couldn't find workspace's directory")?
        .join("lantern-shaders");

    let result = SpirvBuilder::new(crate_path, "spirv-unknown-vulkan1.1")
        .multimodule(true)
        .print_metadata(MetadataPrintout::None)
        .capability(Capability::Int8)
        .extra_arg("--spirt-passes=reduce,fuse_selects")
        .build()?;

    fs::create_dir_all(&output_dir)?;

    let mut manifest = String::new();

    for (entry_point, shader_path) in result.module.unwrap_multi() {
        let shader_id = entry_point.replace("::", "_");
        let shader_id = shader_id.strip_suffix("_main").unwrap_or(&shader_id);
        let file_name = format!("{shader_id}.spv");

        fs::copy(shader_path, output_dir.join(&file_name))?;
        writeln!(manifest, "{shader_id} {entry_point} {file_name}")?;

        println!("compiled `{shader_id}`");
    }

    fs::write(output_dir.join("manifest.txt"), manifest)?;

    Ok(())
}
