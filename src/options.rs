// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use tracing::warn;

/// Environment variable holding a JSON object of build arguments, used when no
/// build arguments are passed explicitly.
pub const BUILD_ARGS_ENV: &str = "DOCKER_BUILD_ARGS_JSON";

/// Default cap for script content and JSON sniffing: 1 MiB.
pub const DEFAULT_MAX_BYTES: u64 = 1024 * 1024;

/// Options controlling how a Dockerfile is analyzed.
///
/// ```
/// use dockerfile_east::EastOptions;
///
/// let options = EastOptions::new("/src/project")
///   .dockerfile_path("/src/project/docker/Dockerfile")
///   .build_arg("VERSION", "1.2.3");
///
/// assert_eq!(options.dockerfile_dir().to_str(), Some("/src/project/docker"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EastOptions {
  /// The build context; COPY/ADD sources resolve against it.
  pub repo_root: PathBuf,

  /// The Dockerfile's own path; its parent directory resolves `.` sources.
  pub dockerfile_path: PathBuf,

  /// Build arguments. If None, [`BUILD_ARGS_ENV`] is consulted instead.
  pub build_args: Option<BTreeMap<String, String>>,

  /// Maximum number of bytes of script content included in the tree.
  pub max_script_bytes: u64,

  /// Files larger than this are never parsed as JSON when classifying copied
  /// content.
  pub max_content_bytes: u64
}

impl Default for EastOptions {
  fn default() -> Self {
    EastOptions::new(".")
  }
}

impl EastOptions {
  pub fn new<P: Into<PathBuf>>(repo_root: P) -> EastOptions {
    let repo_root = repo_root.into();

    EastOptions {
      dockerfile_path: repo_root.join("Dockerfile"),
      repo_root,
      build_args: None,
      max_script_bytes: DEFAULT_MAX_BYTES,
      max_content_bytes: DEFAULT_MAX_BYTES
    }
  }

  pub fn dockerfile_path<P: Into<PathBuf>>(mut self, path: P) -> EastOptions {
    self.dockerfile_path = path.into();
    self
  }

  /// Replaces all build arguments.
  pub fn build_args<I, K, V>(mut self, args: I) -> EastOptions
  where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>
  {
    self.build_args = Some(args.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
    self
  }

  /// Adds a single build argument.
  pub fn build_arg<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> EastOptions {
    self.build_args
      .get_or_insert_with(BTreeMap::new)
      .insert(key.into(), value.into());

    self
  }

  pub fn max_script_bytes(mut self, max: u64) -> EastOptions {
    self.max_script_bytes = max;
    self
  }

  pub fn max_content_bytes(mut self, max: u64) -> EastOptions {
    self.max_content_bytes = max;
    self
  }

  /// The directory containing the Dockerfile.
  pub fn dockerfile_dir(&self) -> &Path {
    self.dockerfile_path.parent()
      .filter(|p| !p.as_os_str().is_empty())
      .unwrap_or_else(|| self.repo_root.as_path())
  }

  /// The effective build arguments: the explicit map if given, otherwise the
  /// contents of [`BUILD_ARGS_ENV`].
  pub fn resolve_build_args(&self) -> BTreeMap<String, String> {
    match &self.build_args {
      Some(args) => args.clone(),
      None => match env::var(BUILD_ARGS_ENV) {
        Ok(json) => parse_build_args_json(&json),
        Err(_) => BTreeMap::new()
      }
    }
  }
}

/// Parses a JSON object of build arguments. Non-string values are converted
/// to their JSON representation; anything but an object yields an empty map.
pub fn parse_build_args_json(json: &str) -> BTreeMap<String, String> {
  let value: serde_json::Value = match serde_json::from_str(json) {
    Ok(value) => value,
    Err(e) => {
      warn!(error = %e, "ignoring malformed build arguments in {}", BUILD_ARGS_ENV);
      return BTreeMap::new();
    }
  };

  match value {
    serde_json::Value::Object(map) => map.into_iter()
      .map(|(k, v)| match v {
        serde_json::Value::String(s) => (k, s),
        other => (k, other.to_string())
      })
      .collect(),
    _ => {
      warn!("ignoring build arguments in {}: not a JSON object", BUILD_ARGS_ENV);
      BTreeMap::new()
    }
  }
}
