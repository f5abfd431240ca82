//! Build script: link the native radio libraries when the hardware backend is enabled

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_FMCOMMS5");

    if std::env::var_os("CARGO_FEATURE_FMCOMMS5").is_some() {
        println!("cargo:rustc-link-lib=iio");
        println!("cargo:rustc-link-lib=ad9361");
    }
}
