// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use serde::Serialize;

use crate::instructions::ErrorMarker;
use crate::node::Node;
use crate::shell::{analyze, CommandSegment, ScriptInvocation, SegmentKind, SegmentPayload};
use crate::state::BuildState;
use crate::variables::ValueExpression;

/// A Dockerfile [`RUN`][run], [`CMD`][cmd] or [`ENTRYPOINT`][entrypoint]
/// instruction.
///
/// All three accept either a shell string or an exec-form JSON array and are
/// analyzed identically: the command is split into segments, each of which is
/// plain text, a recognized shell construct, or a script invocation.
///
/// [run]: https://docs.docker.com/engine/reference/builder/#run
/// [cmd]: https://docs.docker.com/engine/reference/builder/#cmd
/// [entrypoint]: https://docs.docker.com/engine/reference/builder/#entrypoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandInstruction {
  pub keyword: String,
  pub segments: Vec<CommandSegment>
}

impl CommandInstruction {
  pub(crate) fn from_value(
    keyword: &str,
    value: &str,
    state: &mut BuildState,
    max_script_bytes: u64
  ) -> Result<CommandInstruction, ErrorMarker> {
    let value = value.trim();
    if value.is_empty() {
      return Err(ErrorMarker::EmptyCommand);
    }

    let mut segments = analyze(value, state, max_script_bytes);
    if segments.is_empty() {
      // e.g. an empty exec-form array
      segments.push(CommandSegment {
        payload: SegmentPayload::PlainText(ValueExpression::parse(value)),
        separator: None,
        kind: SegmentKind::Final
      });
    }

    Ok(CommandInstruction {
      keyword: keyword.to_string(),
      segments
    })
  }

  /// Returns the script invocations found in this command.
  pub fn scripts(&self) -> impl Iterator<Item = &ScriptInvocation> {
    self.segments.iter().filter_map(|s| match &s.payload {
      SegmentPayload::Script(script) => Some(script),
      _ => None
    })
  }

  pub fn to_node(&self) -> Node {
    let mut node = Node::new(self.keyword.as_str());
    for segment in &self.segments {
      node.push(segment.to_node());
    }

    node
  }
}
