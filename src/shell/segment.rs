// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::fmt;

use serde::Serialize;

use crate::util::parse_string_array;

/// An operator separating one command segment from the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Separator {
  And,
  Or,
  Semicolon,
  Pipe,
  Background
}

impl Separator {
  /// The shell token for this separator.
  pub fn as_str(&self) -> &'static str {
    match self {
      Separator::And => "&&",
      Separator::Or => "||",
      Separator::Semicolon => ";",
      Separator::Pipe => "|",
      Separator::Background => "&"
    }
  }
}

impl fmt::Display for Separator {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// How a segment came to be delimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentKind {
  /// An element of an exec-form (JSON array) command.
  JsonArray,
  AndOperator,
  OrOperator,
  Semicolon,
  Pipe,
  Background,

  /// The last segment of a command, with no separator after it.
  Final
}

impl SegmentKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      SegmentKind::JsonArray => "json_array",
      SegmentKind::AndOperator => "and_operator",
      SegmentKind::OrOperator => "or_operator",
      SegmentKind::Semicolon => "semicolon",
      SegmentKind::Pipe => "pipe",
      SegmentKind::Background => "background",
      SegmentKind::Final => "final"
    }
  }

  pub fn from_separator(separator: Option<Separator>) -> SegmentKind {
    match separator {
      Some(Separator::And) => SegmentKind::AndOperator,
      Some(Separator::Or) => SegmentKind::OrOperator,
      Some(Separator::Semicolon) => SegmentKind::Semicolon,
      Some(Separator::Pipe) => SegmentKind::Pipe,
      Some(Separator::Background) => SegmentKind::Background,
      None => SegmentKind::Final
    }
  }
}

/// A piece of command text along with the separator that ended it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSegment {
  pub command: String,
  pub separator: Option<Separator>,
  pub kind: SegmentKind
}

impl RawSegment {
  fn new(command: &str, separator: Option<Separator>) -> RawSegment {
    RawSegment {
      command: command.to_string(),
      separator,
      kind: SegmentKind::from_separator(separator)
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SplitMode {
  /// `&&` and `||` only
  Logical,

  /// `&&`, `||`, `;`, `|` and a lone `&`
  All
}

/// Computes, for each byte of `text`, whether it sits at the top level: outside
/// of quotes, not escaped, and not nested inside parentheses (subshells or
/// command substitutions).
///
/// Backslash escapes apply everywhere except within single quotes. Unbalanced
/// closing parentheses never drive the depth negative.
pub(crate) fn top_level(text: &str) -> Vec<bool> {
  let mut mask = Vec::with_capacity(text.len());
  let mut quote: Option<char> = None;
  let mut escaped = false;
  let mut depth = 0usize;

  for c in text.chars() {
    let top = if escaped {
      escaped = false;
      false
    } else if c == '\\' && quote != Some('\'') {
      escaped = true;
      false
    } else if let Some(q) = quote {
      if c == q {
        quote = None;
      }

      false
    } else {
      match c {
        '"' | '\'' => {
          quote = Some(c);
          false
        },
        '(' => {
          depth += 1;
          false
        },
        ')' => {
          depth = depth.saturating_sub(1);
          false
        },
        _ => depth == 0
      }
    };

    for _ in 0..c.len_utf8() {
      mask.push(top);
    }
  }

  mask
}

fn push_segment(segments: &mut Vec<RawSegment>, text: &str, separator: Option<Separator>) {
  let text = text.trim();
  if !text.is_empty() {
    segments.push(RawSegment::new(text, separator));
  }
}

fn split(command: &str, mode: SplitMode) -> Vec<RawSegment> {
  let mask = top_level(command);
  let bytes = command.as_bytes();
  let all = mode == SplitMode::All;

  let mut segments = Vec::new();
  let mut start = 0;
  let mut i = 0;

  while i < bytes.len() {
    if !mask[i] {
      i += 1;
      continue;
    }

    let next = bytes.get(i + 1).copied();
    let prev = if i > 0 { Some(bytes[i - 1]) } else { None };

    let found = match bytes[i] {
      b'&' if next == Some(b'&') => Some((Separator::And, 2)),
      b'|' if next == Some(b'|') => Some((Separator::Or, 2)),
      b';' if all => Some((Separator::Semicolon, 1)),
      b'|' if all => Some((Separator::Pipe, 1)),

      // `2>&1`, `&>file` and `<&3` are redirections
      b'&' if all && prev != Some(b'>') && prev != Some(b'<') && next != Some(b'>') => {
        Some((Separator::Background, 1))
      },
      _ => None
    };

    match found {
      Some((separator, len)) => {
        push_segment(&mut segments, &command[start..i], Some(separator));
        i += len;
        start = i;
      },
      None => i += 1
    }
  }

  push_segment(&mut segments, &command[start..], None);

  segments
}

/// Splits a command into logical segments at top-level `&&` and `||`.
///
/// An exec-form command (a JSON string array) is not split on operators;
/// instead each array element becomes its own `JsonArray` segment.
///
/// # Example
/// ```
/// use dockerfile_east::shell::{segment, Separator};
///
/// let segments = segment("apt-get update && (cd /tmp; make) || echo failed");
/// assert_eq!(segments.len(), 3);
/// assert_eq!(segments[1].command, "(cd /tmp; make)");
/// assert_eq!(segments[1].separator, Some(Separator::Or));
/// assert_eq!(segments[2].separator, None);
/// ```
pub fn segment(command: &str) -> Vec<RawSegment> {
  if let Some(elements) = parse_string_array(command) {
    return elements.into_iter()
      .map(|e| RawSegment {
        command: e,
        separator: None,
        kind: SegmentKind::JsonArray
      })
      .collect();
  }

  split(command, SplitMode::Logical)
}

/// Splits a command at every top-level separator: `&&`, `||`, `;`, `|` and a
/// lone `&`.
pub fn segment_all(command: &str) -> Vec<RawSegment> {
  split(command, SplitMode::All)
}

/// Splits a command into whitespace-separated words. Quoted strings are kept
/// together, quotes included.
pub fn tokenize(command: &str) -> Vec<String> {
  let mask = top_level(command);
  let mut tokens = Vec::new();
  let mut current = String::new();
  let mut quote: Option<char> = None;

  for (i, c) in command.char_indices() {
    match quote {
      Some(q) => {
        if c == q && mask.get(i) == Some(&false) && !is_escaped(command, i, q) {
          quote = None;
        }
        current.push(c);
      },
      None if c.is_whitespace() && mask.get(i) == Some(&true) => {
        if !current.is_empty() {
          tokens.push(std::mem::take(&mut current));
        }
      },
      None => {
        if (c == '"' || c == '\'') && !is_escaped(command, i, '\0') {
          quote = Some(c);
        }
        current.push(c);
      }
    }
  }

  if !current.is_empty() {
    tokens.push(current);
  }

  tokens
}

/// Returns true if the character at `i` is preceded by an odd number of
/// backslashes. Nothing is escaped inside single quotes.
fn is_escaped(text: &str, i: usize, quote: char) -> bool {
  if quote == '\'' {
    return false;
  }

  text[..i].chars().rev().take_while(|c| *c == '\\').count() % 2 == 1
}
