//! Locates libprojfs via pkg-config, falling back to a bare `-lprojfs` link line
//! for systems that ship the driver's companion library without a .pc file.

fn main() {
    println!("cargo:rerun-if-env-changed=PROJFS_LIB_DIR");

    if let Ok(dir) = std::env::var("PROJFS_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", dir);
        println!("cargo:rustc-link-lib=dylib=projfs");
        return;
    }

    match pkg_config::Config::new().probe("projfs") {
        Ok(_) => {}
        Err(_) => {
            println!("cargo:rustc-link-lib=dylib=projfs");
        }
    }
}
