// (C) Copyright 2019 Hewlett Packard Enterprise Development LP

#![allow(dead_code)]

use std::fs;

use dockerfile_east::*;
use tempfile::TempDir;

pub fn strings(strs: &[&str]) -> Vec<String> {
  strs.iter().map(|s| String::from(*s)).collect()
}

/// Creates a temporary repository containing the given `(path, content)`
/// files.
pub fn repo(files: &[(&str, &str)]) -> TempDir {
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

/// A parser rooted at `repo` with no build arguments, so tests never depend
/// on the environment.
pub fn parser(repo: &TempDir) -> EastParser {
  EastParser::new(EastOptions::new(repo.path()).build_args(Vec::<(String, String)>::new()))
}

/// Returns the values of every leaf tagged `tag`, in tree order.
pub fn leaves<'a>(node: &'a Node, tag: &str) -> Vec<&'a str> {
  node.find_all(tag).into_iter().filter_map(Node::value).collect()
}
