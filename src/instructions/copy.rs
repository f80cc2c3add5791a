// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use serde::Serialize;
use tracing::debug;

use crate::files::{FileCopyRecord, FileResolver};
use crate::instructions::ErrorMarker;
use crate::node::Node;
use crate::shell::tokenize;
use crate::state::BuildState;
use crate::util::{clean_escaped_breaks, parse_string_array, resolve_path, strip_quotes};
use crate::variables::ValueExpression;

const REMOTE_PREFIXES: &[&str] = &["http://", "https://", "git@"];

/// A flag passed to a `COPY` or `ADD` instruction.
///
/// Examples include: `COPY --from=foo /to /from`, `ADD --link src dst`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyFlag {
  pub name: String,
  pub value: Option<String>
}

impl CopyFlag {
  fn parse(token: &str) -> CopyFlag {
    let flag = token.trim_start_matches('-');

    match flag.find('=') {
      Some(eq) => CopyFlag {
        name: flag[..eq].to_string(),
        value: Some(strip_quotes(&flag[eq + 1..]).to_string())
      },
      None => CopyFlag { name: flag.to_string(), value: None }
    }
  }

  pub fn to_node(&self) -> Node {
    Node::wrap("flag", Node::leaf("name", self.name.as_str()))
      .with_optional(self.value.as_ref().map(|v| {
        Node::wrap("value", ValueExpression::parse(v).to_node())
      }))
  }
}

/// The stage referenced by `--from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum StageRef {
  /// A stage of this Dockerfile, numbered from 1.
  Stage(usize),

  /// Anything else, usually an external image.
  External(String)
}

fn is_remote(source: &str) -> bool {
  REMOTE_PREFIXES.iter().any(|p| source.starts_with(p))
}

/// A Dockerfile [`COPY`][copy] or [`ADD`][add] instruction.
///
/// Sources copied from the repository are resolved to the files they match,
/// and every file is recorded in the build state's path map so later
/// commands can find the scripts they run.
///
/// [copy]: https://docs.docker.com/engine/reference/builder/#copy
/// [add]: https://docs.docker.com/engine/reference/builder/#add
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyInstruction {
  pub keyword: String,
  pub flags: Vec<CopyFlag>,
  pub sources: Vec<String>,
  pub destination: String,

  /// The stage given by `--from`, if any. Sources then refer to that stage's
  /// filesystem and are not resolved.
  pub from_stage: Option<StageRef>,

  /// Sources fetched over the network.
  pub remote: Vec<String>,

  pub files: Vec<FileCopyRecord>
}

impl CopyInstruction {
  pub(crate) fn from_value(
    keyword: &str,
    value: &str,
    state: &mut BuildState,
    resolver: &FileResolver
  ) -> Result<CopyInstruction, ErrorMarker> {
    let tokens = tokenize(&clean_escaped_breaks(value));
    let flag_count = tokens.iter().take_while(|t| t.starts_with("--")).count();
    let flags: Vec<CopyFlag> = tokens[..flag_count].iter().map(|t| CopyFlag::parse(t)).collect();

    let rest = &tokens[flag_count..];
    let mut paths = parse_string_array(&rest.join(" "))
      .unwrap_or_else(|| rest.iter().map(|t| strip_quotes(t).to_string()).collect());

    if paths.len() < 2 {
      return Err(ErrorMarker::IncompleteCopyAdd);
    }

    let destination = paths.pop().unwrap_or_default();
    let sources = paths;

    let from_stage = flags.iter()
      .find(|f| f.name == "from")
      .and_then(|f| f.value.as_deref())
      .map(|from| match state.stage_for(from) {
        Some(stage) => StageRef::Stage(stage),
        None => match from.parse::<usize>() {
          Ok(index) => StageRef::Stage(index + 1),
          Err(_) => StageRef::External(from.to_string())
        }
      });

    let (remote, local): (Vec<String>, Vec<String>) = sources.iter()
      .cloned()
      .partition(|s| is_remote(s));

    let files = if from_stage.is_none() && !local.is_empty() {
      let target = resolve_path(&state.workdir, &destination);
      let files = resolver.resolve(&local, &target);
      for file in &files {
        state.map_path(file.container_path.as_str(), file.repository_path.clone());
      }

      debug!(keyword, destination = %target, files = files.len(), "resolved copy sources");
      files
    } else {
      Vec::new()
    };

    Ok(CopyInstruction {
      keyword: keyword.to_string(),
      flags,
      sources,
      destination,
      from_stage,
      remote,
      files
    })
  }

  pub fn to_node(&self) -> Node {
    let mut node = Node::new(self.keyword.as_str());

    for flag in &self.flags {
      node.push(flag.to_node());
    }

    match &self.from_stage {
      Some(StageRef::Stage(stage)) => node.push(Node::leaf("from_stage", stage.to_string())),
      Some(StageRef::External(image)) => node.push(Node::leaf("from_stage", image.as_str())),
      None => ()
    }

    for source in &self.sources {
      node.push(Node::wrap("source", ValueExpression::parse(source).to_node()));
    }

    node.push(Node::wrap("destination", ValueExpression::parse(&self.destination).to_node()));

    for url in &self.remote {
      node.push(Node::leaf("remote", url.as_str()));
    }

    if !self.files.is_empty() {
      let mut files = Node::new("files");
      for file in &self.files {
        files.push(file.to_node());
      }

      node.push(files);
    }

    node
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  use crate::files::ContentKind;
  use crate::test_util::fixture;

  fn containers(copy: &CopyInstruction) -> Vec<&str> {
    copy.files.iter().map(|f| f.container_path.as_str()).collect()
  }

  #[test]
  fn copy_brace_sources() {
    let repo = fixture(&[("src/a.txt", "a"), ("src/b.txt", "b")]);
    let resolver = FileResolver::new(repo.path(), repo.path(), 1024);
    let mut state = BuildState::default();

    let copy = CopyInstruction::from_value("COPY", "src/{a,b}.txt /data/", &mut state, &resolver)
      .expect("COPY should analyze");

    assert_eq!(copy.sources, vec!["src/{a,b}.txt"]);
    assert_eq!(copy.destination, "/data/");
    assert_eq!(containers(&copy), vec!["/data/a.txt", "/data/b.txt"]);
    assert_eq!(state.path_map.get("/data/b.txt"), Some(&repo.path().join("src/b.txt")));
  }

  #[test]
  fn copy_relative_destination() {
    let repo = fixture(&[("run.sh", "echo"), ("config.json", "{}")]);
    let resolver = FileResolver::new(repo.path(), repo.path(), 1024);
    let mut state = BuildState::default();
    state.set_workdir("/app");

    let copy = CopyInstruction::from_value("COPY", "run.sh .", &mut state, &resolver)
      .expect("COPY should analyze");
    assert_eq!(containers(&copy), vec!["/app/run.sh"]);

    let copy = CopyInstruction::from_value("ADD", "config.json conf", &mut state, &resolver)
      .expect("ADD should analyze");
    assert_eq!(containers(&copy), vec!["/app/conf/config.json"]);
    assert_eq!(copy.files[0].content_kind, ContentKind::Json);
  }

  #[test]
  fn copy_flags_and_exec_form() {
    let repo = fixture(&[("a b.txt", "x")]);
    let resolver = FileResolver::new(repo.path(), repo.path(), 1024);
    let mut state = BuildState::default();

    let copy = CopyInstruction::from_value(
      "COPY",
      r#"--chown=app:app --link ["a b.txt", "/dst/"]"#,
      &mut state,
      &resolver
    ).expect("COPY should analyze");

    assert_eq!(copy.flags, vec![
      CopyFlag { name: "chown".into(), value: Some("app:app".into()) },
      CopyFlag { name: "link".into(), value: None }
    ]);
    assert_eq!(copy.sources, vec!["a b.txt"]);
    assert_eq!(containers(&copy), vec!["/dst/a b.txt"]);
  }

  #[test]
  fn copy_from_stage() {
    let resolver = FileResolver::new("/nonexistent", "/nonexistent", 1024);
    let mut state = BuildState::default();
    state.enter_stage();
    state.record_alias("builder");
    state.enter_stage();

    let copy = CopyInstruction::from_value("COPY", "--from=Builder /out/app /app", &mut state, &resolver)
      .expect("COPY should analyze");
    assert_eq!(copy.from_stage, Some(StageRef::Stage(1)));
    assert!(copy.files.is_empty());
    assert!(state.path_map.is_empty());

    let copy = CopyInstruction::from_value("COPY", "--from=0 /out/app /app", &mut state, &resolver)
      .expect("COPY should analyze");
    assert_eq!(copy.from_stage, Some(StageRef::Stage(1)));

    let copy = CopyInstruction::from_value("COPY", "--from=nginx:latest /etc/nginx /etc/nginx", &mut state, &resolver)
      .expect("COPY should analyze");
    assert_eq!(copy.from_stage, Some(StageRef::External("nginx:latest".into())));
  }

  #[test]
  fn add_remote() {
    let resolver = FileResolver::new("/nonexistent", "/nonexistent", 1024);
    let mut state = BuildState::default();

    let add = CopyInstruction::from_value("ADD", "https://example.com/a.tar.gz /tmp/", &mut state, &resolver)
      .expect("ADD should analyze");

    assert_eq!(add.remote, vec!["https://example.com/a.tar.gz"]);
    assert!(add.files.is_empty());
    assert_eq!(
      add.to_node(),
      Node::new("ADD")
        .with_child(Node::wrap("source", Node::leaf("text", "https://example.com/a.tar.gz")))
        .with_child(Node::wrap("destination", Node::leaf("text", "/tmp/")))
        .with_child(Node::leaf("remote", "https://example.com/a.tar.gz"))
    );
  }

  #[test]
  fn copy_incomplete() {
    let resolver = FileResolver::new("/nonexistent", "/nonexistent", 1024);
    let mut state = BuildState::default();

    assert_eq!(
      CopyInstruction::from_value("COPY", "onlyone", &mut state, &resolver),
      Err(ErrorMarker::IncompleteCopyAdd)
    );
    assert_eq!(
      CopyInstruction::from_value("COPY", "--chown=1:1 file", &mut state, &resolver),
      Err(ErrorMarker::IncompleteCopyAdd)
    );
  }
}
