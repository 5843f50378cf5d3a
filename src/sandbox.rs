use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
    thread,
    time::Duration,
};

use log::debug;

use crate::{
    error::{ExperimentError, Result},
    scheduler::WorkerSlot,
};


/// The solver reads this file from its working directory.
pub const CONFIG_FILE: &str = "gls.ini";
pub const SECTION: &str = "gls";

const ETXTBSY: i32 = 26;
const SPAWN_RETRIES: u64 = 5;

/// An ini file that keeps sections and keys in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IniDocument {
    sections: Vec<(String, Vec<(String, String)>)>,
}

impl IniDocument {
    pub fn parse(text: &str, origin: &Path) -> Result<Self> {
        let mut doc = IniDocument::default();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
                doc.sections.push((name.trim().to_string(), Vec::new()));
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                return Err(ExperimentError::config(
                    origin,
                    format!("line {}: expected `key = value`, got {line:?}", idx + 1),
                ));
            };
            match doc.sections.last_mut() {
                Some((_, entries)) => {
                    entries.push((key.trim().to_string(), value.trim().to_string()))
                }
                None => {
                    return Err(ExperimentError::config(
                        origin,
                        format!("line {}: key {:?} outside of a section", idx + 1, key.trim()),
                    ))
                }
            }
        }
        Ok(doc)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| ExperimentError::config(path, e.to_string()))?;
        IniDocument::parse(&text, path)
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|(name, _)| name == section)
            .and_then(|(_, entries)| entries.iter().find(|(k, _)| k == key))
            .map(|(_, v)| v.as_str())
    }

    /// Sets `key` in an existing section; the section has to be present in the template.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) -> Result<()> {
        let Some((_, entries)) = self.sections.iter_mut().find(|(name, _)| name == section)
        else {
            return Err(ExperimentError::config(
                PathBuf::from(CONFIG_FILE),
                format!("template has no [{section}] section"),
            ));
        };
        let value = value.into();
        match entries.iter_mut().find(|(k, _)| k == key) {
            Some((_, v)) => *v = value,
            None => entries.push((key.to_string(), value)),
        }
        Ok(())
    }

    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for (name, entries) in &self.sections {
            out.push_str(&format!("[{name}]\n"));
            for (key, value) in entries {
                out.push_str(&format!("{key} = {value}\n"));
            }
            out.push('\n');
        }
        out
    }
}

/// A slot's private working directory with its own copy of the solver.
#[derive(Debug)]
pub struct Sandbox {
    dir: PathBuf,
    solver: PathBuf,
}

impl Sandbox {
    /// Creates the slot directory and copies the solver into it unless an earlier item on
    /// the same slot already did.
    pub fn prepare(slot: &WorkerSlot, solver: &Path) -> Result<Self> {
        fs::create_dir_all(slot.dir())?;
        // The solver path must not depend on current_dir.
        let dir = fs::canonicalize(slot.dir())?;
        let file_name = solver.file_name().ok_or_else(|| {
            ExperimentError::config(solver, "solver path has no file name")
        })?;
        let local = dir.join(file_name);
        if !local.exists() {
            debug!("slot {}: copying {:?} into {:?}", slot.id(), solver, dir);
            // An interrupted copy must never be mistaken for the solver.
            let mut partial = file_name.to_os_string();
            partial.push(".partial");
            let partial = dir.join(partial);
            fs::copy(solver, &partial)
                .and_then(|_| fs::rename(&partial, &local))
                .map_err(|e| {
                    ExperimentError::config(solver, format!("cannot copy solver: {e}"))
                })?;
        }
        Ok(Self { dir, solver: local })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    /// Writes the template with `overrides` applied to the `gls` section.
    pub fn materialize<K: AsRef<str>, V: AsRef<str>>(
        &self,
        template: &IniDocument,
        overrides: &[(K, V)],
    ) -> Result<PathBuf> {
        let mut config = template.clone();
        for (key, value) in overrides {
            config.set(SECTION, key.as_ref(), value.as_ref())?;
        }
        let path = self.config_path();
        fs::write(&path, config.to_text())?;
        Ok(path)
    }

    /// Runs the solver on `graph` inside the sandbox and returns its stdout.
    pub fn invoke(&self, graph: &Path) -> Result<String> {
        let failure = |reason: String| ExperimentError::SolverInvocation {
            graph: graph.to_path_buf(),
            reason,
        };
        let graph = fs::canonicalize(graph)
            .map_err(|e| failure(format!("graph is not readable: {e}")))?;
        let mut attempt = 0;
        let output = loop {
            match Command::new(&self.solver)
                .arg(&graph)
                .current_dir(&self.dir)
                .output()
            {
                // Another slot may still hold the freshly copied binary open for writing.
                Err(e) if e.raw_os_error() == Some(ETXTBSY) && attempt < SPAWN_RETRIES => {
                    attempt += 1;
                    thread::sleep(Duration::from_millis(20 * attempt));
                }
                result => {
                    break result
                        .map_err(|e| failure(format!("cannot spawn {:?}: {e}", self.solver)))?
                }
            }
        };
        if !output.status.success() {
            return Err(failure(format!(
                "solver exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        String::from_utf8(output.stdout)
            .map_err(|_| failure("solver output is not valid UTF-8".into()))
    }
}
