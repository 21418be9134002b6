//! Shared test fixtures: fake release trees and control scripts.

use std::fs;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;

/// Write an executable `bin/<release>` shell script under `dir`.
#[cfg(unix)]
pub fn write_control_script(dir: &Path, release_name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let bin = dir.join("bin");
    fs::create_dir_all(&bin).unwrap();
    let path = bin.join(release_name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
}

/// Build a gzipped release tarball at `<source_dir>/<tarball>` containing
/// a `bin/<release>` control script with the given body.
pub fn make_release_tarball(source_dir: &Path, tarball: &str, release_name: &str, body: &str) {
    let file = fs::File::create(source_dir.join(tarball)).unwrap();
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);

    let script = format!("#!/bin/sh\n{body}\n");
    let mut header = tar::Header::new_gnu();
    header.set_size(script.len() as u64);
    header.set_mode(0o755);
    header.set_cksum();
    builder
        .append_data(
            &mut header,
            format!("bin/{release_name}"),
            script.as_bytes(),
        )
        .unwrap();

    builder.into_inner().unwrap().finish().unwrap();
}
