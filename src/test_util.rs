// (C) Copyright 2019 Hewlett Packard Enterprise Development LP

use std::fs;

use tempfile::TempDir;

/// Creates a temporary repository containing the given `(path, content)`
/// files. Parent directories are created as needed.
pub fn fixture(files: &[(&str, &str)]) -> TempDir {
  let dir = tempfile::tempdir().expect("could not create temporary directory");

  for (path, content) in files {
    let path = dir.path().join(path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent).expect("could not create fixture directory");
    }

    fs::write(&path, content).expect("could not write fixture file");
  }

  dir
}
