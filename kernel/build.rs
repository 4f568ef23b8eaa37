use std::{env, error::Error};

fn main() -> Result<(), Box<dyn Error>> {
    if env::var("CARGO_CFG_TARGET_OS")? != "none" {
        return Ok(());
    }

    let manifest_dir = env::var("CARGO_MANIFEST_DIR")?;

    println!("cargo:rustc-link-arg=-T{manifest_dir}/kernel.ld");
    println!("cargo:rerun-if-changed={manifest_dir}/kernel.ld");

    Ok(())
}
