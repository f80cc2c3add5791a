// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::node::Node;
use crate::state::BuildState;
use crate::util::{resolve_path, strip_quotes};
use crate::variables::ValueExpression;

/// Interpreters whose first non-flag argument is treated as a script path.
pub const INTERPRETERS: &[&str] = &[
  "bash", "sh", "zsh", "ksh", "dash", "python", "python3", "node", "ruby"
];

const SHELLS: &[&str] = &["bash", "sh", "zsh", "ksh", "dash"];

const SCRIPT_EXTENSIONS: &[&str] = &["sh", "bash", "zsh", "fish", "csh", "ksh", "tcsh"];

/// Number of bytes read when probing a file for a shebang line.
const SHEBANG_PROBE_BYTES: u64 = 256;

/// An invocation of a script file, e.g. `./run.sh --flag` or
/// `python3 tools/build.py`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScriptInvocation {
  /// Absolute path of the script inside the container.
  pub container_path: String,

  /// Everything after the script path, joined by single spaces.
  pub arguments: Option<String>,

  /// The repository file copied to `container_path`, if known.
  pub repository_path: Option<PathBuf>,

  /// The script's content, with full-line comments removed.
  pub content: Option<String>
}

impl ScriptInvocation {
  pub fn to_node(&self) -> Node {
    Node::wrap("script", Node::leaf("path", self.container_path.as_str()))
      .with_optional(self.arguments.as_ref().map(|a| {
        Node::wrap("args", ValueExpression::parse(a).to_node())
      }))
      .with_optional(self.repository_path.as_ref().map(|p| {
        Node::leaf("repo_path", p.to_string_lossy())
      }))
      .with_optional(self.content.as_ref().map(|c| Node::leaf("content", c.as_str())))
  }
}

/// Returns true if `path` has a well-known shell script extension.
pub fn has_script_extension(path: &str) -> bool {
  Path::new(path)
    .extension()
    .and_then(|e| e.to_str())
    .map_or(false, |e| SCRIPT_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
}

fn has_shebang(path: &Path) -> bool {
  let mut head = Vec::new();
  match File::open(path).and_then(|f| f.take(SHEBANG_PROBE_BYTES).read_to_end(&mut head)) {
    Ok(_) => head.starts_with(b"#!"),
    Err(_) => false
  }
}

/// Reads at most `max_bytes` of a script and strips full-line comments
/// (including the shebang).
fn read_script(path: &Path, max_bytes: u64) -> Option<String> {
  let mut bytes = Vec::new();
  let read = File::open(path).and_then(|f| f.take(max_bytes).read_to_end(&mut bytes));

  if let Err(e) = read {
    debug!(path = %path.display(), error = %e, "could not read script");
    return None;
  }

  let text = String::from_utf8_lossy(&bytes);

  Some(text.split_inclusive('\n')
    .filter(|line| !line.trim_start().starts_with('#'))
    .collect())
}

/// Finds the index of the script argument among an interpreter's arguments,
/// skipping flags. Returns None if the interpreter is given inline code
/// (`sh -c`, `python -m`, `node -e`, ...) or no script at all.
fn script_argument(interpreter: &str, args: &[String]) -> Option<usize> {
  for (i, arg) in args.iter().enumerate() {
    let flag = match arg.strip_prefix('-') {
      Some(flag) if !flag.is_empty() => flag,
      _ => return Some(i)
    };

    let inline = if SHELLS.contains(&interpreter) {
      !flag.starts_with('-') && flag.contains('c')
    } else {
      matches!(flag, "c" | "m" | "e" | "p" | "-eval" | "-print")
    };

    if inline {
      return None;
    }
  }

  None
}

/// Collects the container paths made executable by a `chmod +x` command.
///
/// Flags such as `-R` are skipped; paths resolve against `workdir`.
pub fn chmod_targets(tokens: &[String], workdir: &str) -> Vec<String> {
  if tokens.first().map(String::as_str) != Some("chmod") {
    return Vec::new();
  }

  let mut args = tokens[1..].iter()
    .map(|t| strip_quotes(t))
    .filter(|t| !t.starts_with('-'));

  match args.next() {
    Some(mode) if mode.contains("+x") => args.map(|t| resolve_path(workdir, t)).collect(),
    _ => Vec::new()
  }
}

/// Detects a script invocation in a single tokenized command.
///
/// A command invokes a script if it:
///  - starts with a known interpreter followed by a script path
///  - starts with a path (`/x`, `./x` or `../x`)
///  - starts with a bare file name that has a script extension or was made
///    executable earlier in the same command
///
/// The container path is mapped back to a repository file through the
/// build state's COPY mappings. Content is only read for files known to be
/// scripts: a script extension, a `#!` line, or a preceding `chmod +x`.
pub fn detect(tokens: &[String], state: &BuildState, max_bytes: u64) -> Option<ScriptInvocation> {
  let first = tokens.first()?;

  let (path, rest) = if INTERPRETERS.contains(&first.as_str()) {
    let args = &tokens[1..];
    let index = script_argument(first, args)?;
    (&args[index], &args[index + 1..])
  } else {
    let bare = strip_quotes(first);
    let direct = bare.starts_with('/') || bare.starts_with("./") || bare.starts_with("../");
    let named = !bare.contains('/') && (
      has_script_extension(bare)
        || state.chmod_exec.contains(&resolve_path(&state.workdir, bare))
    );

    if !direct && !named {
      return None;
    }

    (first, &tokens[1..])
  };

  let path = strip_quotes(path);
  let container_path = resolve_path(&state.workdir, path);
  let repository_path = state.path_map.get(&container_path).cloned();

  let known = has_script_extension(path)
    || state.chmod_exec.contains(&container_path)
    || repository_path.as_deref().map_or(false, has_shebang);

  let content = match &repository_path {
    Some(repo_path) if known => read_script(repo_path, max_bytes),
    _ => None
  };

  Some(ScriptInvocation {
    container_path,
    arguments: if rest.is_empty() { None } else { Some(rest.join(" ")) },
    repository_path,
    content
  })
}
