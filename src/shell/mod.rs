// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

//! Analysis of shell command strings as found in `RUN`, `CMD` and
//! `ENTRYPOINT`.

mod construct;
mod script;
mod segment;

pub use construct::*;
pub use script::*;
pub use segment::*;

use serde::Serialize;
use tracing::trace;

use crate::node::Node;
use crate::state::BuildState;
use crate::variables::ValueExpression;

/// What a single command segment turned out to be.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum SegmentPayload {
  PlainText(ValueExpression),
  Script(ScriptInvocation),
  Construct(ShellConstruct)
}

/// One analyzed piece of a command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandSegment {
  pub payload: SegmentPayload,
  pub separator: Option<Separator>,
  pub kind: SegmentKind
}

impl CommandSegment {
  pub fn to_node(&self) -> Node {
    let payload = match &self.payload {
      SegmentPayload::PlainText(expr) => Node::wrap("command", expr.to_node()),
      SegmentPayload::Script(script) => script.to_node(),
      SegmentPayload::Construct(construct) => construct.to_node()
    };

    Node::wrap("command_segment", payload)
      .with_optional(self.separator.map(|s| Node::leaf("separator", s.as_str())))
      .with_child(Node::leaf("type", self.kind.as_str()))
  }
}

fn simple_payload(text: &str, state: &BuildState, max_script_bytes: u64) -> SegmentPayload {
  match detect(&tokenize(text), state, max_script_bytes) {
    Some(script) => SegmentPayload::Script(script),
    None => SegmentPayload::PlainText(ValueExpression::parse(text))
  }
}

/// Analyzes a full command string.
///
/// The command is split into logical segments (see [`segment`]). Segments
/// forming a complete shell construct are kept whole; all others are split
/// further at every top-level separator and checked for script invocations.
/// The logical segment's separator is carried by its last sub-segment.
///
/// Any `chmod +x` targets anywhere in the command are recorded in
/// `state.chmod_exec` first, replacing the previous command's set, so that
/// `chmod +x run.sh && ./run.sh` includes the script's content.
pub fn analyze(command: &str, state: &mut BuildState, max_script_bytes: u64) -> Vec<CommandSegment> {
  let logical = segment(command);

  state.begin_command();
  if logical.iter().any(|s| s.kind == SegmentKind::JsonArray) {
    let elements: Vec<String> = logical.iter().map(|s| s.command.clone()).collect();
    state.chmod_exec.extend(chmod_targets(&elements, &state.workdir));
  } else {
    for seg in &logical {
      for sub in segment_all(&seg.command) {
        let targets = chmod_targets(&tokenize(&sub.command), &state.workdir);
        state.chmod_exec.extend(targets);
      }
    }
  }

  if !state.chmod_exec.is_empty() {
    trace!(targets = ?state.chmod_exec, "recorded executable paths");
  }

  let mut segments = Vec::new();
  for seg in logical {
    if seg.kind == SegmentKind::JsonArray {
      segments.push(CommandSegment {
        payload: simple_payload(&seg.command, state, max_script_bytes),
        separator: None,
        kind: SegmentKind::JsonArray
      });
      continue;
    }

    if let Some(construct) = recognize(&seg.command) {
      segments.push(CommandSegment {
        payload: SegmentPayload::Construct(construct),
        separator: seg.separator,
        kind: seg.kind
      });
      continue;
    }

    let subs = segment_all(&seg.command);
    let last = subs.len().saturating_sub(1);

    for (i, sub) in subs.into_iter().enumerate() {
      let separator = if i == last { seg.separator } else { sub.separator };

      segments.push(CommandSegment {
        payload: simple_payload(&sub.command, state, max_script_bytes),
        separator,
        kind: SegmentKind::from_separator(separator)
      });
    }
  }

  segments
}
