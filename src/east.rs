// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

use std::fs::File;

use snafu::ResultExt;
use tracing::debug;

use crate::dockerfile_parser::Dockerfile;
use crate::error::*;
use crate::files::FileResolver;
use crate::instructions::*;
use crate::node::Node;
use crate::options::EastOptions;
use crate::state::BuildState;

/// Turns instructions into their analyzed form, one at a time and in order.
///
/// The assembler owns the [`BuildState`] of a single pass over a Dockerfile:
/// each instruction sees the stages, working directory, path mappings and
/// arguments established by the instructions before it.
#[derive(Debug, Clone)]
pub struct Assembler {
  options: EastOptions,
  resolver: FileResolver,
  state: BuildState
}

impl Assembler {
  /// Creates an assembler with a fresh state, using the options' build
  /// arguments (or the environment fallback).
  pub fn new(options: &EastOptions) -> Assembler {
    Assembler::with_state(options, BuildState::new(options.resolve_build_args()))
  }

  /// Creates an assembler continuing from an existing state.
  pub fn with_state(options: &EastOptions, state: BuildState) -> Assembler {
    Assembler {
      options: options.clone(),
      resolver: FileResolver::from_options(options),
      state
    }
  }

  pub fn state(&self) -> &BuildState {
    &self.state
  }

  pub fn into_state(self) -> BuildState {
    self.state
  }

  /// Analyzes a single instruction. Never fails: an instruction that cannot
  /// be analyzed becomes an [`InvalidInstruction`].
  pub fn instruction(&mut self, keyword: &str, value: &str) -> Instruction {
    let keyword = keyword.to_ascii_uppercase();
    debug!(keyword = %keyword, stage = self.state.stage, "assembling instruction");

    let state = &mut self.state;
    let result: Result<Instruction, ErrorMarker> = match keyword.as_str() {
      "FROM" => FromInstruction::from_value(value, state).map(Instruction::from),
      "ARG" => Ok(ArgInstruction::from_value(value, state).into()),
      "ENV" => EnvInstruction::from_value(value).map(Instruction::from),
      "EXPOSE" => Ok(ExposeInstruction::from_value(value).into()),
      "USER" => Ok(UserInstruction::from_value(value).into()),
      "RUN" | "CMD" | "ENTRYPOINT" => {
        CommandInstruction::from_value(&keyword, value, state, self.options.max_script_bytes)
          .map(Instruction::from)
      },
      "COPY" | "ADD" => {
        CopyInstruction::from_value(&keyword, value, state, &self.resolver)
          .map(Instruction::from)
      },
      _ => Ok(MiscInstruction::from_value(&keyword, value).into())
    };

    // the WORKDIR node shows the value as written; the change applies to
    // what follows
    if keyword == "WORKDIR" {
      self.state.set_workdir(value);
    }

    result.unwrap_or_else(|marker| {
      debug!(keyword = %keyword, marker = marker.as_str(), "instruction could not be analyzed");
      InvalidInstruction::new(keyword.as_str(), marker).into()
    })
  }
}

/// Builds the EAST of a Dockerfile.
///
/// Every parse starts from a fresh [`BuildState`], so one `EastParser` may be
/// reused for any number of Dockerfiles.
///
/// # Example
///
/// ```
/// use dockerfile_east::{EastOptions, EastParser};
///
/// let parser = EastParser::new(EastOptions::new("/nonexistent"));
/// let east = parser.parse_str("FROM alpine:3.12 AS base\nRUN make && make install\n").unwrap();
///
/// assert_eq!(east.tag, "dockerfile");
/// assert_eq!(east.children().len(), 2);
/// assert_eq!(east.find_all("command_segment").len(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct EastParser {
  options: EastOptions
}

impl EastParser {
  pub fn new(options: EastOptions) -> EastParser {
    EastParser { options }
  }

  pub fn options(&self) -> &EastOptions {
    &self.options
  }

  /// Analyzes a sequence of `(keyword, value)` pairs into typed instructions.
  pub fn instructions<I, K, V>(&self, pairs: I) -> Vec<Instruction>
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>
  {
    let mut assembler = Assembler::new(&self.options);

    pairs.into_iter()
      .map(|(keyword, value)| assembler.instruction(keyword.as_ref(), value.as_ref()))
      .collect()
  }

  /// Assembles a tree from a sequence of `(keyword, value)` pairs, as produced
  /// by any instruction splitter.
  pub fn assemble<I, K, V>(&self, pairs: I) -> Node
  where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>
  {
    let mut root = Node::new("dockerfile");
    for instruction in self.instructions(pairs) {
      root.push(instruction.to_node());
    }

    root
  }

  /// Assembles the tree of an already split Dockerfile.
  pub fn parse_dockerfile(&self, dockerfile: &Dockerfile) -> Node {
    self.assemble(dockerfile.pairs())
  }

  /// Splits and assembles a Dockerfile. Fails only if the input cannot be
  /// split into instructions.
  pub fn parse_str(&self, input: &str) -> Result<Node> {
    let dockerfile = Dockerfile::parse(input)?;
    Ok(self.parse_dockerfile(&dockerfile))
  }

  /// Reads, splits and assembles the Dockerfile at the configured
  /// `dockerfile_path`.
  pub fn parse_path(&self) -> Result<Node> {
    let file = File::open(&self.options.dockerfile_path).context(ReadError)?;
    let dockerfile = Dockerfile::from_reader(file)?;

    Ok(self.parse_dockerfile(&dockerfile))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::path::Path;
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  use crate::test_util::fixture;

  fn options(root: &Path) -> EastOptions {
    EastOptions::new(root).build_args(Vec::<(String, String)>::new())
  }

  #[test]
  fn assembler_markers() {
    let mut assembler = Assembler::new(&options(Path::new("/nonexistent")));

    let markers: Vec<Node> = vec![
      ("FROM", ""),
      ("ENV", ""),
      ("RUN", ""),
      ("copy", "single")
    ].into_iter()
      .map(|(k, v)| assembler.instruction(k, v).to_node())
      .collect();

    assert_eq!(markers, vec![
      Node::wrap("FROM", Node::leaf("error", "missing_image")),
      Node::wrap("ENV", Node::leaf("error", "empty_env")),
      Node::wrap("RUN", Node::leaf("error", "empty_command")),
      Node::wrap("COPY", Node::leaf("error", "incomplete_copy_add"))
    ]);
  }

  #[test]
  fn assembler_workdir() {
    let mut assembler = Assembler::new(&options(Path::new("/nonexistent")));

    let node = assembler.instruction("WORKDIR", "/app").to_node();
    assert_eq!(node, Node::wrap("WORKDIR", Node::wrap("path", Node::leaf("text", "/app"))));

    assembler.instruction("workdir", "src");
    assert_eq!(assembler.state().workdir, "/app/src");
  }

  #[test]
  fn assembler_idempotent() {
    let repo = fixture(&[("scripts/run.sh", "echo hi\n")]);
    let options = options(repo.path());

    let mut state = BuildState::default();
    state.set_workdir("/app");
    state.map_path("/app/run.sh", repo.path().join("scripts/run.sh"));

    let value = "chmod +x run.sh && ./run.sh x y";
    let first = Assembler::with_state(&options, state.clone()).instruction("RUN", value);
    let second = Assembler::with_state(&options, state).instruction("RUN", value);

    assert_eq!(first.to_node(), second.to_node());
  }

  #[test]
  fn parse_multi_stage() -> Result<()> {
    let repo = fixture(&[
      ("scripts/run.sh", "#!/bin/sh\n# start\nexec app\n"),
      ("app/main.go", "package main\n")
    ]);

    let parser = EastParser::new(options(repo.path()));
    let east = parser.parse_str(indoc!(r#"
      ARG GO_VERSION=1.15
      FROM golang:${GO_VERSION} AS build
      WORKDIR /src
      COPY app/ .
      RUN go build -o /out/app .

      FROM alpine:3.12
      WORKDIR /app
      COPY --from=build /out/app /usr/bin/app
      COPY scripts/run.sh .
      RUN chmod +x run.sh && ./run.sh x y
      EXPOSE 8080/tcp
      CMD ["./run.sh"]
    "#))?;

    assert_eq!(east.children().len(), 12);

    let from = &east.children()[1];
    assert_eq!(from.child("resolved_image").and_then(Node::value), Some("golang:1.15"));
    assert_eq!(from.child("alias").and_then(Node::value), Some("build"));

    let files = east.find_all("container_path");
    let paths: Vec<_> = files.iter().filter_map(|n| n.value()).collect();
    assert_eq!(paths, vec!["/src/main.go", "/app/run.sh"]);

    let copy_from = &east.children()[7];
    assert_eq!(copy_from.child("from_stage").and_then(Node::value), Some("1"));
    assert!(copy_from.child("files").is_none());

    let scripts = east.find_all("script");
    assert_eq!(scripts.len(), 2);
    assert_eq!(scripts[0].child("path").and_then(Node::value), Some("/app/run.sh"));
    assert_eq!(scripts[0].child("content").and_then(Node::value), Some("exec app\n"));

    // the chmod set is gone by the time CMD runs, the extension is enough
    assert_eq!(scripts[1].child("content").and_then(Node::value), Some("exec app\n"));

    Ok(())
  }

  #[test]
  fn parse_deterministic() -> Result<()> {
    let repo = fixture(&[("a.txt", "a"), ("b.txt", "b"), ("c/d.env", "D=1")]);
    let parser = EastParser::new(options(repo.path()));
    let input = "FROM scratch\nCOPY *.txt c /data/\n";

    let first = parser.parse_str(input)?;
    let second = parser.parse_str(input)?;

    assert_eq!(first, second);
    assert_eq!(first.to_string(), second.to_string());
    assert_eq!(first.find_all("file").len(), 3);

    Ok(())
  }

  #[test]
  fn parse_path() -> Result<()> {
    let repo = fixture(&[("docker/Dockerfile", "FROM alpine\nUSER -1\n")]);
    let options = options(repo.path()).dockerfile_path(repo.path().join("docker/Dockerfile"));

    let east = EastParser::new(options).parse_path()?;
    assert_eq!(east.find_all("issue").len(), 1);

    let missing = EastParser::new(EastOptions::new("/nonexistent")).parse_path();
    assert!(matches!(missing, Err(Error::ReadError { .. })));

    Ok(())
  }
}
