// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use tracing::trace;

use crate::util::{resolve_path, strip_quotes};

/// Mutable state threaded through a single forward pass over a Dockerfile.
///
/// A fresh `BuildState` is created for every parse, so independent parses
/// never share path mappings or build arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildState {
  /// The current stage number: 0 before the first `FROM`, then 1, 2, ...
  pub stage: usize,

  /// The current working directory inside the container.
  pub workdir: String,

  /// Stage aliases (lower-cased) mapped to their stage number.
  pub aliases: BTreeMap<String, usize>,

  /// Container paths mapped to the repository files copied there. Later
  /// copies to the same path overwrite earlier ones.
  pub path_map: BTreeMap<String, PathBuf>,

  /// Paths made executable by `chmod +x` within the current command.
  pub chmod_exec: BTreeSet<String>,

  /// Build arguments supplied by the caller.
  pub build_args: BTreeMap<String, String>,

  /// Values of `ARG`s declared before the first `FROM`, used to resolve
  /// variables in image references.
  pub global_args: BTreeMap<String, String>
}

impl Default for BuildState {
  fn default() -> Self {
    BuildState::new(BTreeMap::new())
  }
}

impl BuildState {
  pub fn new(build_args: BTreeMap<String, String>) -> BuildState {
    BuildState {
      stage: 0,
      workdir: "/".to_string(),
      aliases: BTreeMap::new(),
      path_map: BTreeMap::new(),
      chmod_exec: BTreeSet::new(),
      build_args,
      global_args: BTreeMap::new()
    }
  }

  /// Begins a new build stage, returning its number.
  pub fn enter_stage(&mut self) -> usize {
    self.stage += 1;
    trace!(stage = self.stage, "entered stage");

    self.stage
  }

  /// Records an alias for the current stage.
  pub fn record_alias(&mut self, alias: &str) {
    trace!(alias, stage = self.stage, "recorded stage alias");
    self.aliases.insert(alias.to_ascii_lowercase(), self.stage);
  }

  /// Looks up a stage by alias, case-insensitively.
  pub fn stage_for(&self, alias: &str) -> Option<usize> {
    self.aliases.get(&alias.to_ascii_lowercase()).copied()
  }

  /// Returns true while no `FROM` has been seen yet.
  pub fn is_global(&self) -> bool {
    self.stage == 0
  }

  /// Updates the working directory as `WORKDIR` would: relative paths resolve
  /// against the current directory and an empty value resets to `/`.
  pub fn set_workdir(&mut self, value: &str) {
    let value = strip_quotes(value.trim());

    self.workdir = if value.is_empty() {
      "/".to_string()
    } else {
      resolve_path(&self.workdir, value)
    };

    trace!(workdir = %self.workdir, "changed working directory");
  }

  /// Records that a repository file was copied to a container path.
  pub fn map_path<S: Into<String>>(&mut self, container_path: S, repository_path: PathBuf) {
    let container_path = container_path.into();
    trace!(
      container = %container_path,
      repository = %repository_path.display(),
      "mapped path"
    );

    self.path_map.insert(container_path, repository_path);
  }

  /// Discards the executable set of the previous command.
  pub fn begin_command(&mut self) {
    self.chmod_exec.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn workdir() {
    let mut state = BuildState::default();
    assert_eq!(state.workdir, "/");

    state.set_workdir("/app");
    state.set_workdir("src");
    assert_eq!(state.workdir, "/app/src");

    state.set_workdir("\"../lib\"");
    assert_eq!(state.workdir, "/app/lib");

    state.set_workdir("");
    assert_eq!(state.workdir, "/");
  }

  #[test]
  fn stages() {
    let mut state = BuildState::default();
    assert!(state.is_global());

    assert_eq!(state.enter_stage(), 1);
    state.record_alias("Builder");
    assert_eq!(state.enter_stage(), 2);

    assert_eq!(state.stage_for("builder"), Some(1));
    assert_eq!(state.stage_for("BUILDER"), Some(1));
    assert_eq!(state.stage_for("runtime"), None);
    assert!(!state.is_global());
  }

  #[test]
  fn path_map_last_write_wins() {
    let mut state = BuildState::default();
    state.map_path("/app/a", PathBuf::from("/repo/one/a"));
    state.map_path("/app/a", PathBuf::from("/repo/two/a"));

    assert_eq!(state.path_map.get("/app/a"), Some(&PathBuf::from("/repo/two/a")));
    assert_eq!(state.path_map.len(), 1);
  }
}
