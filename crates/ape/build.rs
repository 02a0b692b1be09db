use std::{env, ffi::OsString, fs, path::Path, process::Command};

/// the short hash of the current commit, if this is built from a git checkout
fn make_id() -> String {
    Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| String::from_utf8(out.stdout).ok())
        .map(|s| s.trim().to_owned())
        .unwrap_or_else(|| "deadbeef".to_owned())
}

fn version(out_dir: &OsString) {
    let dest_path = Path::new(&out_dir).join("version.rs");
    let id = make_id();
    fs::write(
        dest_path,
        format!(
            "pub fn version() -> &'static str {{
	    \"{id}\"
	}}
	"
        ),
    )
    .unwrap();
}

fn main() {
    println!("cargo:rerun-if-changed=.git/index");
    let out_dir = env::var_os("OUT_DIR").unwrap();
    version(&out_dir);
}
