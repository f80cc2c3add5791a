// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use serde::Serialize;

use crate::node::Node;
use crate::util::clean_escaped_breaks;
use crate::variables::ValueExpression;

/// Any instruction without a dedicated analysis, e.g. `WORKDIR`, `LABEL`,
/// `HEALTHCHECK` or an unknown keyword.
///
/// The value is kept as a single value expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MiscInstruction {
  pub keyword: String,
  pub value: String
}

impl MiscInstruction {
  pub(crate) fn from_value(keyword: &str, value: &str) -> MiscInstruction {
    MiscInstruction {
      keyword: keyword.to_string(),
      value: clean_escaped_breaks(value).trim().to_string()
    }
  }

  /// The tag of the node wrapping the value.
  fn value_tag(&self) -> &'static str {
    match self.keyword.as_str() {
      "WORKDIR" | "VOLUME" => "path",
      "LABEL" => "label",
      "STOPSIGNAL" => "signal",
      "SHELL" => "shell",
      "HEALTHCHECK" => "healthcheck",
      _ => "value"
    }
  }

  pub fn to_node(&self) -> Node {
    Node::wrap(
      self.keyword.as_str(),
      Node::wrap(self.value_tag(), ValueExpression::parse(&self.value).to_node())
    )
  }
}
