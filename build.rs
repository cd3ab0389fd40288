fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/index");

    let pkg = std::env::var("CARGO_PKG_VERSION").unwrap_or_default();
    let output = std::process::Command::new("git")
        .args(["describe", "--always", "--dirty", "--tags"])
        .output();

    // Outside a checkout only the crate version is known
    let version = match output {
        Ok(o) if o.status.success() => {
            format!("{} {}", pkg, String::from_utf8_lossy(&o.stdout).trim())
        }
        _ => pkg,
    };

    println!("cargo:rustc-env=GIT_VERSION={}", version);
}
