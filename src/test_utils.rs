use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::datastructures::{Config, Context};

pub fn default_config() -> Config {
    Config {
        data_root: PathBuf::from("data/test/db"),
        templates: PathBuf::from("data/test/templates"),
        num_slots: 2,
        seed: Some(0),
        ..Config::default()
    }
}

pub fn fixture_context() -> Context {
    Context::new(&default_config())
}

/// Writes a shell script standing in for the solver to `<root>/bin/gls.exe`.
#[cfg(unix)]
pub fn fake_solver(root: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = root.join("bin").join("gls.exe");
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Copies the fixture database into `root` so tests can write experiment output.
pub fn scratch_context(root: &Path) -> Context {
    copy_dir(Path::new("data/test/db"), &root.join("db"));
    Context::new(&Config {
        data_root: root.join("db"),
        ..default_config()
    })
}

fn copy_dir(from: &Path, to: &Path) {
    fs::create_dir_all(to).unwrap();
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            copy_dir(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}
