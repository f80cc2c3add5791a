// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

//! Resolution of `COPY`/`ADD` sources to repository files.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use glob::Pattern;
use ignore::WalkBuilder;
use serde::Serialize;
use tracing::{debug, warn};

use crate::node::Node;
use crate::options::{EastOptions, DEFAULT_MAX_BYTES};
use crate::util::resolve_path;

/// Number of leading bytes checked for NUL bytes when classifying content.
const BINARY_PROBE_BYTES: u64 = 4096;

/// A coarse classification of a copied file's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
  Binary,
  Json,
  Env,
  Text,

  /// The file could not be read (or does not exist).
  Unknown
}

impl ContentKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      ContentKind::Binary => "binary",
      ContentKind::Json => "json",
      ContentKind::Env => "env",
      ContentKind::Text => "text",
      ContentKind::Unknown => "unknown"
    }
  }
}

/// A single file copied into the image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileCopyRecord {
  pub container_path: String,
  pub repository_path: PathBuf,
  pub content_kind: ContentKind,
  pub size_bytes: u64
}

impl FileCopyRecord {
  pub fn to_node(&self) -> Node {
    Node::new("file")
      .with_child(Node::leaf("container_path", self.container_path.as_str()))
      .with_child(Node::leaf("repo_path", self.repository_path.to_string_lossy()))
      .with_child(Node::leaf("type", self.content_kind.as_str()))
      .with_child(Node::leaf("size", self.size_bytes.to_string()))
  }
}

/// Expands a single level of `{a,b,...}` alternatives.
///
/// ```
/// use dockerfile_east::brace_expand;
///
/// assert_eq!(brace_expand("src/{a,b}.txt"), vec!["src/a.txt", "src/b.txt"]);
/// assert_eq!(brace_expand("plain.txt"), vec!["plain.txt"]);
/// ```
pub fn brace_expand(pattern: &str) -> Vec<String> {
  let open = match pattern.find('{') {
    Some(open) => open,
    None => return vec![pattern.to_string()]
  };

  let close = match pattern[open..].find('}') {
    Some(close) => open + close,
    None => return vec![pattern.to_string()]
  };

  let (head, tail) = (&pattern[..open], &pattern[close + 1..]);
  pattern[open + 1..close]
    .split(',')
    .map(|alternative| format!("{}{}{}", head, alternative, tail))
    .collect()
}

fn is_json(path: &Path) -> bool {
  match fs::read(path) {
    Ok(bytes) => matches!(
      serde_json::from_slice::<serde_json::Value>(&bytes),
      Ok(serde_json::Value::Object(_)) | Ok(serde_json::Value::Array(_))
    ),
    Err(_) => false
  }
}

fn is_env_file(path: &Path) -> bool {
  path.file_name()
    .and_then(|n| n.to_str())
    .map_or(false, |n| n.ends_with(".env"))
}

/// Classifies a file's content, returning its kind and size.
///
/// JSON detection only considers files no larger than `max_json_bytes`, and
/// only documents whose top-level value is an object or array.
pub fn classify(path: &Path, max_json_bytes: u64) -> (ContentKind, u64) {
  let size = match fs::metadata(path) {
    Ok(meta) if meta.is_file() => meta.len(),
    Ok(_) => return (ContentKind::Unknown, 0),
    Err(e) => {
      debug!(path = %path.display(), error = %e, "could not stat copied file");
      return (ContentKind::Unknown, 0);
    }
  };

  let mut head = Vec::new();
  let read = File::open(path).and_then(|f| f.take(BINARY_PROBE_BYTES).read_to_end(&mut head));
  if let Err(e) = read {
    debug!(path = %path.display(), error = %e, "could not read copied file");
    return (ContentKind::Unknown, size);
  }

  let kind = if head.contains(&0) {
    ContentKind::Binary
  } else if size <= max_json_bytes && is_json(path) {
    ContentKind::Json
  } else if is_env_file(path) {
    ContentKind::Env
  } else {
    ContentKind::Text
  };

  (kind, size)
}

/// Resolves `COPY`/`ADD` sources against a repository.
#[derive(Debug, Clone)]
pub struct FileResolver {
  repo_root: PathBuf,
  dockerfile_dir: PathBuf,
  max_content_bytes: u64
}

impl FileResolver {
  pub fn new<P1, P2>(repo_root: P1, dockerfile_dir: P2, max_content_bytes: u64) -> FileResolver
  where
    P1: Into<PathBuf>,
    P2: Into<PathBuf>
  {
    FileResolver {
      repo_root: repo_root.into(),
      dockerfile_dir: dockerfile_dir.into(),
      max_content_bytes
    }
  }

  pub fn from_options(options: &EastOptions) -> FileResolver {
    FileResolver::new(
      options.repo_root.clone(),
      options.dockerfile_dir().to_path_buf(),
      options.max_content_bytes
    )
  }

  /// Lists all files beneath a directory, sorted by name at each level.
  /// Ignore files are not honored: docker copies everything not excluded by
  /// `.dockerignore`.
  fn walk(dir: &Path) -> Vec<PathBuf> {
    WalkBuilder::new(dir)
      .standard_filters(false)
      .sort_by_file_name(|a, b| a.cmp(b))
      .build()
      .filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(e) => {
          debug!(dir = %dir.display(), error = %e, "skipping unreadable entry");
          None
        }
      })
      .filter(|entry| entry.file_type().map_or(false, |t| t.is_file()))
      .map(|entry| entry.into_path())
      .collect()
  }

  fn expand_match(path: PathBuf, files: &mut Vec<PathBuf>) {
    if path.is_dir() {
      files.extend(FileResolver::walk(&path));
    } else {
      files.push(path);
    }
  }

  fn expand_source(&self, source: &str, files: &mut Vec<PathBuf>) {
    for pattern in brace_expand(source) {
      if pattern == "." || pattern == "./" {
        FileResolver::expand_match(self.dockerfile_dir.clone(), files);
        continue;
      }

      let relative = pattern.trim_matches('/');
      if relative.is_empty() {
        FileResolver::expand_match(self.repo_root.clone(), files);
        continue;
      }

      let root = Pattern::escape(&self.repo_root.to_string_lossy());
      let full = format!("{}/{}", root.trim_end_matches('/'), relative);

      let matches: Vec<PathBuf> = match glob::glob(&full) {
        Ok(paths) => paths
          .filter_map(|p| match p {
            Ok(p) => Some(p),
            Err(e) => {
              debug!(error = %e, "skipping unreadable glob match");
              None
            }
          })
          .collect(),
        Err(e) => {
          warn!(pattern = %pattern, error = %e, "invalid COPY source pattern");
          Vec::new()
        }
      };

      if matches.is_empty() {
        files.push(self.repo_root.join(relative));
      } else {
        for path in matches {
          FileResolver::expand_match(path, files);
        }
      }
    }
  }

  /// Resolves source patterns copied to an (absolute) container destination.
  ///
  /// Sources are brace-expanded, then glob-expanded against the repository
  /// root; a source without matches is kept literally. Directories expand to
  /// every file beneath them. Each file lands at `destination/<basename>`.
  pub fn resolve(&self, sources: &[String], destination: &str) -> Vec<FileCopyRecord> {
    let mut files = Vec::new();
    for source in sources {
      self.expand_source(source, &mut files);
    }

    files.into_iter()
      .map(|path| {
        let name = path.file_name()
          .map(|n| n.to_string_lossy().into_owned())
          .unwrap_or_default();

        let (content_kind, size_bytes) = classify(&path, self.max_content_bytes);

        FileCopyRecord {
          container_path: resolve_path(destination, &name),
          repository_path: path,
          content_kind,
          size_bytes
        }
      })
      .collect()
  }
}

/// Resolves `COPY` sources against a repository with the default content cap.
/// See [`FileResolver::resolve`].
pub fn resolve_copy_sources<P1, P2>(
  sources: &[String],
  destination: &str,
  repo_root: P1,
  dockerfile_dir: P2
) -> Vec<FileCopyRecord>
where
  P1: Into<PathBuf>,
  P2: Into<PathBuf>
{
  FileResolver::new(repo_root, dockerfile_dir, DEFAULT_MAX_BYTES).resolve(sources, destination)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::test_util::fixture;
  use pretty_assertions::assert_eq;

  fn containers(records: &[FileCopyRecord]) -> Vec<&str> {
    records.iter().map(|r| r.container_path.as_str()).collect()
  }

  #[test]
  fn brace_expansion() {
    assert_eq!(brace_expand("{a,b,c}"), vec!["a", "b", "c"]);
    assert_eq!(brace_expand("x{1,2}y{3,4}"), vec!["x1y{3,4}", "x2y{3,4}"]);
    assert_eq!(brace_expand("unclosed{a,b"), vec!["unclosed{a,b"]);
  }

  #[test]
  fn resolve_brace_pattern() {
    let repo = fixture(&[("src/a.txt", "a"), ("src/b.txt", "b"), ("src/c.txt", "c")]);
    let resolver = FileResolver::new(repo.path(), repo.path(), 1024);

    let records = resolver.resolve(&["src/{a,b}.txt".to_string()], "/data/");
    assert_eq!(containers(&records), vec!["/data/a.txt", "/data/b.txt"]);
    assert_eq!(records[0].repository_path, repo.path().join("src/a.txt"));
    assert_eq!(records[0].size_bytes, 1);
    assert_eq!(records[0].content_kind, ContentKind::Text);
  }

  #[test]
  fn resolve_glob_and_directory() {
    let repo = fixture(&[
      ("conf/app.json", r#"{"a": 1}"#),
      ("conf/nested/.env", "A=1"),
      ("conf/blob.bin", "\0\x01\x02"),
      ("main.py", "print(1)")
    ]);
    let resolver = FileResolver::new(repo.path(), repo.path(), 1024);

    let records = resolver.resolve(&["conf".to_string()], "/etc/app/");
    assert_eq!(
      containers(&records),
      vec!["/etc/app/app.json", "/etc/app/blob.bin", "/etc/app/.env"]
    );
    assert_eq!(records[2].repository_path, repo.path().join("conf/nested/.env"));
    assert_eq!(
      records.iter().map(|r| r.content_kind).collect::<Vec<_>>(),
      vec![ContentKind::Json, ContentKind::Binary, ContentKind::Env]
    );

    let records = resolver.resolve(&["*.py".to_string()], "/app/");
    assert_eq!(containers(&records), vec!["/app/main.py"]);
  }

  #[test]
  fn resolve_single_file_keeps_basename() {
    let repo = fixture(&[("config.yml", "a: 1")]);
    let resolver = FileResolver::new(repo.path(), repo.path(), 1024);

    let records = resolver.resolve(&["config.yml".to_string()], "/etc/app");
    assert_eq!(containers(&records), vec!["/etc/app/config.yml"]);

    let records = resolver.resolve(&["/config.yml".to_string()], "/etc/app/");
    assert_eq!(containers(&records), vec!["/etc/app/config.yml"]);
  }

  #[test]
  fn resolve_missing_is_literal() {
    let repo = fixture(&[]);
    let resolver = FileResolver::new(repo.path(), repo.path(), 1024);

    let records = resolver.resolve(&["missing.txt".to_string()], "/app/");
    assert_eq!(records, vec![FileCopyRecord {
      container_path: "/app/missing.txt".into(),
      repository_path: repo.path().join("missing.txt"),
      content_kind: ContentKind::Unknown,
      size_bytes: 0
    }]);
  }

  #[test]
  fn resolve_dot_uses_dockerfile_dir() {
    let repo = fixture(&[("docker/Dockerfile", "FROM x"), ("docker/entry.sh", "echo")]);
    let resolver = FileResolver::new(repo.path(), repo.path().join("docker"), 1024);

    let records = resolver.resolve(&[".".to_string()], "/app");
    assert_eq!(containers(&records), vec!["/app/Dockerfile", "/app/entry.sh"]);
  }

  #[test]
  fn json_size_cap() {
    let repo = fixture(&[("data.json", "[1, 2, 3]"), ("num.json", "42")]);

    assert_eq!(classify(&repo.path().join("data.json"), 1024), (ContentKind::Json, 9));
    assert_eq!(classify(&repo.path().join("data.json"), 4), (ContentKind::Text, 9));
    assert_eq!(classify(&repo.path().join("num.json"), 1024), (ContentKind::Text, 2));
  }
}
