// build.rs

fn main() {
    println!("cargo:rerun-if-changed=csrc/log_trampoline.c");

    // The trampoline has no system dependency, so it is built even for the
    // mock-only configuration and its formatting can be tested there.
    compile_log_trampoline();

    if std::env::var_os("CARGO_FEATURE_EVDI").is_some() {
        link_evdi();
    }
}

fn link_evdi() {
    // --- Link against libevdi ---
    // Try pkg-config first; distributions that ship libevdi without a .pc file
    // (the upstream Makefile does not install one) fall back to plain -levdi.
    match pkg_config::probe_library("evdi") {
        Ok(_) => {
            eprintln!("pkg-config found libevdi. Linking configured automatically.");
        }
        Err(err) => {
            eprintln!(
                "pkg-config failed for library 'evdi' ({}). Falling back to manual linking.",
                err
            );
            println!("cargo:rustc-link-lib=evdi");
            println!("cargo:rustc-link-search=/usr/lib");
            println!("cargo:rustc-link-search=/usr/local/lib");
            eprintln!("Manual linking flags applied. Ensure the libevdi development files are installed.");
        }
    }
}

// libevdi hands its logger a printf-style format plus varargs. Stable Rust
// cannot define a variadic function, so a few lines of C do the formatting
// and pass the finished string to `remdisp_log_dispatch`.
fn compile_log_trampoline() {
    cc::Build::new()
        .file("csrc/log_trampoline.c")
        .warnings(true)
        .compile("remdisp_log_trampoline");
}
