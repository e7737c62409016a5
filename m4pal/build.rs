use std::env;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

fn main() {
    let os_target = env::var("CARGO_CFG_TARGET_OS").unwrap();
    if os_target == "none" {
        linker_script_plumbing();
    }
}

fn linker_script_plumbing() {
    // cortex-m-rt's link.x pulls in memory.x from the search path.
    let out = &PathBuf::from(env::var_os("OUT_DIR").unwrap());
    File::create(out.join("memory.x"))
        .unwrap()
        .write_all(include_bytes!("memory.x"))
        .unwrap();
    println!("cargo:rustc-link-search={}", out.display());

    println!("cargo:rerun-if-changed=memory.x");
    println!("cargo:rerun-if-changed=build.rs");
}
