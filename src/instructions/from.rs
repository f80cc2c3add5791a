// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::collections::BTreeSet;

use serde::Serialize;

use crate::image::ImageRef;
use crate::instructions::ErrorMarker;
use crate::node::Node;
use crate::state::BuildState;
use crate::variables::{substitute, ValueExpression};

/// Maximum nesting of variables referring to other variables when resolving
/// image references.
const MAX_SUBSTITUTION_DEPTH: u8 = 16;

/// The parent image of a Docker build stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum StageParent {
  /// An externally-built image, potentially from a remote registry
  Image,

  /// The number of a previous stage within the current Dockerfile
  Stage(usize),

  /// The empty (scratch) parent image
  Scratch
}

/// A Dockerfile [`FROM` instruction][from].
///
/// [from]: https://docs.docker.com/engine/reference/builder/#from
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FromInstruction {
  /// The stage this instruction begins, starting at 1.
  pub stage: usize,

  pub platform: Option<String>,
  pub image: String,
  pub image_parsed: ImageRef,
  pub alias: Option<String>,
  pub parent: StageParent,

  /// The image reference with all variables substituted, if it contained any
  /// and all of them could be resolved from global `ARG`s.
  pub resolved_image: Option<String>
}

impl FromInstruction {
  pub(crate) fn from_value(value: &str, state: &mut BuildState) -> Result<FromInstruction, ErrorMarker> {
    let stage = state.enter_stage();

    let tokens: Vec<&str> = value.split_whitespace().collect();
    let flag_count = tokens.iter().take_while(|t| t.starts_with("--")).count();
    let platform = tokens[..flag_count]
      .iter()
      .find_map(|flag| flag.strip_prefix("--platform="))
      .map(String::from);

    let (image, alias) = match &tokens[flag_count..] {
      [] => return Err(ErrorMarker::MissingImage),
      [image, keyword, alias, ..] if keyword.eq_ignore_ascii_case("as") => (*image, Some(*alias)),
      [image, ..] => (*image, None)
    };

    let parent = if image.eq_ignore_ascii_case("scratch") {
      StageParent::Scratch
    } else if let Some(stage) = state.stage_for(image) {
      StageParent::Stage(stage)
    } else {
      StageParent::Image
    };

    let resolved_image = if ValueExpression::parse(image).has_variables() {
      let mut used_vars = BTreeSet::new();
      substitute(image, &state.global_args, &mut used_vars, MAX_SUBSTITUTION_DEPTH)
    } else {
      None
    };

    if let Some(alias) = alias {
      state.record_alias(alias);
    }

    Ok(FromInstruction {
      stage,
      platform,
      image: image.to_string(),
      image_parsed: ImageRef::parse(image),
      alias: alias.map(String::from),
      parent,
      resolved_image
    })
  }

  pub fn to_node(&self) -> Node {
    let image = &self.image_parsed;

    let parent = match self.parent {
      StageParent::Stage(stage) => Some(Node::leaf("parent_stage", stage.to_string())),
      StageParent::Scratch => Some(Node::leaf("scratch", "true")),
      StageParent::Image => None
    };

    Node::new("FROM")
      .with_child(Node::leaf("stage", self.stage.to_string()))
      .with_optional(self.platform.as_ref().map(|p| {
        Node::wrap("platform", ValueExpression::parse(p).to_node())
      }))
      .with_child(Node::wrap("image_name", ValueExpression::parse(&image.name()).to_node()))
      .with_optional(image.registry.as_ref().map(|r| Node::leaf("registry", r.as_str())))
      .with_optional(image.tag.as_ref().map(|t| {
        Node::wrap("image_tag", ValueExpression::parse(t).to_node())
      }))
      .with_optional(image.hash.as_ref().map(|h| Node::leaf("digest", h.as_str())))
      .with_optional(self.alias.as_ref().map(|a| Node::leaf("alias", a.as_str())))
      .with_optional(parent)
      .with_optional(self.resolved_image.as_ref().map(|r| Node::leaf("resolved_image", r.as_str())))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  #[test]
  fn from_no_alias() {
    let mut state = BuildState::default();
    let from = FromInstruction::from_value("alpine:3.10", &mut state);

    assert_eq!(from, Ok(FromInstruction {
      stage: 1,
      platform: None,
      image: "alpine:3.10".into(),
      image_parsed: ImageRef::parse("alpine:3.10"),
      alias: None,
      parent: StageParent::Image,
      resolved_image: None
    }));
    assert!(state.aliases.is_empty());
  }

  #[test]
  fn from_alias_and_parent() {
    let mut state = BuildState::default();

    let builder = FromInstruction::from_value("golang:1.15 AS Builder", &mut state);
    assert_eq!(builder.map(|f| f.alias), Ok(Some("Builder".to_string())));

    let runtime = FromInstruction::from_value("builder as runtime", &mut state);
    assert_eq!(runtime.as_ref().map(|f| f.parent), Ok(StageParent::Stage(1)));
    assert_eq!(runtime.map(|f| f.stage), Ok(2));

    let empty = FromInstruction::from_value("scratch", &mut state);
    assert_eq!(empty.map(|f| f.parent), Ok(StageParent::Scratch));
    assert_eq!(state.stage, 3);
  }

  #[test]
  fn from_platform() {
    let mut state = BuildState::default();
    let from = FromInstruction::from_value("--platform=$BUILDPLATFORM node:14 AS deps", &mut state);

    let from = from.expect("FROM should parse");
    assert_eq!(from.platform.as_deref(), Some("$BUILDPLATFORM"));
    assert_eq!(from.image, "node:14");
    assert_eq!(from.alias.as_deref(), Some("deps"));
  }

  #[test]
  fn from_missing_image() {
    let mut state = BuildState::default();

    assert_eq!(FromInstruction::from_value("", &mut state), Err(ErrorMarker::MissingImage));
    assert_eq!(
      FromInstruction::from_value("--platform=linux/amd64", &mut state),
      Err(ErrorMarker::MissingImage)
    );

    // a FROM always begins a stage, even a broken one
    assert_eq!(state.stage, 2);
  }

  #[test]
  fn from_resolved_image() {
    let mut state = BuildState::default();
    state.global_args.insert("VERSION".into(), "3.12".into());

    let from = FromInstruction::from_value("alpine:${VERSION}", &mut state);
    assert_eq!(
      from.map(|f| f.resolved_image),
      Ok(Some("alpine:3.12".to_string()))
    );

    let from = FromInstruction::from_value("${REGISTRY:-docker.io}/alpine:$VERSION", &mut state);
    assert_eq!(
      from.map(|f| f.resolved_image),
      Ok(Some("docker.io/alpine:3.12".to_string()))
    );

    let from = FromInstruction::from_value("alpine:$UNKNOWN", &mut state);
    assert_eq!(from.map(|f| f.resolved_image), Ok(None));
  }

  #[test]
  fn from_node() {
    let mut state = BuildState::default();
    state.global_args.insert("TAG".into(), "1.0".into());

    let node = FromInstruction::from_value("quay.io/org/app:$TAG AS base", &mut state)
      .map(|f| f.to_node().to_string());

    assert_eq!(node.as_deref(), Ok(indoc!(r#"
      FROM
      ├── stage: "1"
      ├── image_name
      │   └── text: "quay.io/org/app"
      ├── registry: "quay.io"
      ├── image_tag
      │   └── value_with_variables
      │       └── variable
      │           ├── name: "TAG"
      │           └── form: "simple"
      ├── alias: "base"
      └── resolved_image: "quay.io/org/app:1.0"
    "#)));
  }
}
