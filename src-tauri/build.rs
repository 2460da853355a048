fn main() {
    // tauri-build declares this cfg itself, headless builds still name it in lib.rs
    println!("cargo:rustc-check-cfg=cfg(mobile)");

    #[cfg(feature = "desktop")]
    tauri_build::build();
}
