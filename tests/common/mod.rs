#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
};

use gls_experiments::datastructures::{Config, Context};

/// Copies the fixture database below `root` and points a config at it.
pub fn scratch_config(root: &Path) -> Config {
    copy_dir(Path::new("data/test/db"), &root.join("db"));
    Config {
        data_root: root.join("db"),
        templates: PathBuf::from("data/test/templates"),
        num_slots: 3,
        seed: Some(11),
        ..Config::default()
    }
}

pub fn scratch_context(root: &Path) -> Context {
    Context::new(&scratch_config(root))
}

#[cfg(unix)]
pub fn fake_solver(ctx: &Context, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(ctx.solver.parent().unwrap()).unwrap();
    fs::write(&ctx.solver, format!("#!/bin/sh\n{body}")).unwrap();
    fs::set_permissions(&ctx.solver, fs::Permissions::from_mode(0o755)).unwrap();
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
