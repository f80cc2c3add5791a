// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use serde::Serialize;
use tracing::trace;

use crate::node::Node;
use crate::state::BuildState;
use crate::util::unquote_lenient;
use crate::variables::ValueExpression;

/// Where an `ARG`'s value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ArgSource {
  /// The value assigned in the Dockerfile.
  Default,

  /// A build argument supplied by the caller.
  BuildArg
}

impl ArgSource {
  pub fn as_str(&self) -> &'static str {
    match self {
      ArgSource::Default => "default",
      ArgSource::BuildArg => "build_arg"
    }
  }
}

/// A Dockerfile [`ARG` instruction][arg].
///
/// [arg]: https://docs.docker.com/engine/reference/builder/#arg
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArgInstruction {
  /// The argument name.
  pub name: String,

  /// The argument's default value, if any.
  pub value: Option<String>,

  /// The build argument value for an unassigned `ARG`.
  pub resolved: Option<String>,

  pub source: Option<ArgSource>
}

impl ArgInstruction {
  pub(crate) fn from_value(value: &str, state: &mut BuildState) -> ArgInstruction {
    let value = value.trim();

    let (name, default) = match value.find('=') {
      Some(eq) => (value[..eq].trim(), Some(unquote_lenient(value[eq + 1..].trim()))),
      None => (value, None)
    };

    let build_arg = state.build_args.get(name).cloned();

    let (resolved, source) = match (&default, &build_arg) {
      (Some(_), _) => (None, Some(ArgSource::Default)),
      (None, Some(v)) => (Some(v.clone()), Some(ArgSource::BuildArg)),
      (None, None) => (None, None)
    };

    // only args declared before the first FROM are visible in FROM lines
    if state.is_global() {
      if let Some(v) = build_arg.or_else(|| default.clone()) {
        trace!(name, value = %v, "recorded global arg");
        state.global_args.insert(name.to_string(), v);
      }
    }

    ArgInstruction {
      name: name.to_string(),
      value: default,
      resolved,
      source
    }
  }

  pub fn to_node(&self) -> Node {
    Node::wrap("ARG", Node::leaf("name", self.name.as_str()))
      .with_optional(self.value.as_ref().map(|v| {
        Node::wrap("value", ValueExpression::parse(v).to_node())
      }))
      .with_optional(self.resolved.as_ref().map(|r| {
        Node::wrap("resolved", Node::leaf("text", r.as_str()))
      }))
      .with_optional(self.source.map(|s| Node::leaf("source", s.as_str())))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::BTreeMap;
  use pretty_assertions::assert_eq;

  fn state_with_args(args: &[(&str, &str)]) -> BuildState {
    BuildState::new(args.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect::<BTreeMap<_, _>>())
  }

  #[test]
  fn arg_default() {
    let mut state = state_with_args(&[("VERSION", "2.0")]);
    let arg = ArgInstruction::from_value("VERSION=\"1.0\"", &mut state);

    assert_eq!(arg, ArgInstruction {
      name: "VERSION".into(),
      value: Some("1.0".into()),
      resolved: None,
      source: Some(ArgSource::Default)
    });

    // the build argument still wins for image resolution
    assert_eq!(state.global_args.get("VERSION").map(String::as_str), Some("2.0"));
  }

  #[test]
  fn arg_build_arg() {
    let mut state = state_with_args(&[("TOKEN", "abc")]);

    let arg = ArgInstruction::from_value("TOKEN", &mut state);
    assert_eq!(arg.resolved.as_deref(), Some("abc"));
    assert_eq!(arg.source, Some(ArgSource::BuildArg));

    let arg = ArgInstruction::from_value("OTHER", &mut state);
    assert_eq!(arg.resolved, None);
    assert_eq!(arg.source, None);
  }

  #[test]
  fn arg_stage_local() {
    let mut state = state_with_args(&[]);
    state.enter_stage();

    ArgInstruction::from_value("LOCAL=1", &mut state);
    assert!(state.global_args.is_empty());
  }

  #[test]
  fn arg_node() {
    let mut state = state_with_args(&[("B", "x")]);

    assert_eq!(
      ArgInstruction::from_value("B", &mut state).to_node(),
      Node::wrap("ARG", Node::leaf("name", "B"))
        .with_child(Node::wrap("resolved", Node::leaf("text", "x")))
        .with_child(Node::leaf("source", "build_arg"))
    );

    assert_eq!(
      ArgInstruction::from_value("A=${B}/bin", &mut state).to_node().to_string(),
      indoc::indoc!(r#"
        ARG
        ├── name: "A"
        ├── value
        │   └── value_with_variables
        │       ├── variable
        │       │   ├── name: "B"
        │       │   └── form: "braced"
        │       └── text: "/bin"
        └── source: "default"
      "#)
    );
  }
}
