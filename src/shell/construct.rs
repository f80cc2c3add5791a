// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::node::Node;
use crate::shell::segment::top_level;
use crate::variables::ValueExpression;

/// The body of a construct branch: either another construct or plain text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Body {
  Construct(Box<ShellConstruct>),
  Text(ValueExpression)
}

impl Body {
  /// Parses a branch body, recursing into nested constructs.
  pub fn parse(text: &str) -> Body {
    match recognize(text) {
      Some(construct) => Body::Construct(Box::new(construct)),
      None => Body::Text(ValueExpression::parse(text))
    }
  }

  pub fn to_node(&self) -> Node {
    match self {
      Body::Construct(construct) => construct.to_node(),
      Body::Text(expr) => expr.to_node()
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ElifBranch {
  pub condition: Body,
  pub body: Body
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseClause {
  pub pattern: ValueExpression,
  pub body: ValueExpression
}

/// A recognized shell control-flow construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ShellConstruct {
  Conditional {
    condition: Body,
    then: Body,
    elifs: Vec<ElifBranch>,
    otherwise: Option<Body>
  },

  ForLoop {
    variable: String,
    iterable: ValueExpression,
    body: Body
  },

  WhileLoop {
    condition: ValueExpression,
    body: Body
  },

  CaseSwitch {
    subject: ValueExpression,
    clauses: Vec<CaseClause>
  }
}

impl ShellConstruct {
  pub fn to_node(&self) -> Node {
    match self {
      ShellConstruct::Conditional { condition, then, elifs, otherwise } => {
        let mut node = Node::new("shell_if")
          .with_child(Node::wrap("condition", condition.to_node()))
          .with_child(Node::wrap("then", then.to_node()));

        for elif in elifs {
          node.push(Node::new("elif")
            .with_child(Node::wrap("condition", elif.condition.to_node()))
            .with_child(Node::wrap("body", elif.body.to_node())));
        }

        node.with_optional(otherwise.as_ref().map(|o| Node::wrap("else", o.to_node())))
      },

      ShellConstruct::ForLoop { variable, iterable, body } => Node::new("shell_for")
        .with_child(Node::leaf("variable", variable.as_str()))
        .with_child(Node::wrap("in", iterable.to_node()))
        .with_child(Node::wrap("body", body.to_node())),

      ShellConstruct::WhileLoop { condition, body } => Node::new("shell_while")
        .with_child(Node::wrap("condition", condition.to_node()))
        .with_child(Node::wrap("body", body.to_node())),

      ShellConstruct::CaseSwitch { subject, clauses } => {
        let mut node = Node::wrap("shell_case", Node::wrap("value", subject.to_node()));

        for clause in clauses {
          node.push(Node::new("case_when")
            .with_child(Node::wrap("pattern", clause.pattern.to_node()))
            .with_child(Node::wrap("body", clause.body.to_node())));
        }

        node
      }
    }
  }
}

/// Attempts to recognize a shell construct spanning all of `text`.
///
/// Conditionals are tried first, then `for`, `while` and `case`. Returns None
/// if the text is not (entirely) one of these; callers then treat it as plain
/// text.
///
/// # Example
/// ```
/// use dockerfile_east::shell::{recognize, ShellConstruct};
///
/// match recognize("for f in *.conf; do cp $f /etc; done") {
///   Some(ShellConstruct::ForLoop { variable, .. }) => assert_eq!(variable, "f"),
///   other => panic!("unexpected: {:?}", other)
/// }
///
/// assert!(recognize("echo done").is_none());
/// ```
pub fn recognize(text: &str) -> Option<ShellConstruct> {
  conditional(text)
    .or_else(|| for_loop(text))
    .or_else(|| while_loop(text))
    .or_else(|| case_switch(text))
}

fn is_word_boundary(c: char) -> bool {
  c.is_whitespace() || c == ';'
}

/// Returns true if `word` appears at byte `i` of `text` as a whole word.
fn word_at(text: &str, i: usize, word: &str) -> bool {
  text[i..].starts_with(word)
    && text[..i].chars().next_back().map_or(true, is_word_boundary)
    && text[i + word.len()..].chars().next().map_or(true, is_word_boundary)
}

/// Returns true if the word at `i` directly follows a command terminator
/// (`;` or a newline), as `elif`, `else` and `fi` must.
fn after_terminator(text: &str, i: usize) -> bool {
  let before = text[..i].trim_end_matches(|c: char| c == ' ' || c == '\t');
  before.ends_with(';') || before.ends_with('\n')
}

/// Returns true if the word at `i` is in command position, i.e. could start a
/// nested `if`.
fn starts_command(text: &str, i: usize) -> bool {
  let before = text[..i].trim_end();

  before.is_empty()
    || before.ends_with(|c: char| matches!(c, ';' | '&' | '|' | '(' | '{'))
    || ["then", "else", "do"].iter().any(|kw| {
      before.ends_with(kw)
        && before[..before.len() - kw.len()].chars().next_back().map_or(true, is_word_boundary)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Marker {
  Then,
  Elif,
  Else,
  Fi
}

impl Marker {
  fn len(self) -> usize {
    match self {
      Marker::Then => 4,
      Marker::Elif => 4,
      Marker::Else => 4,
      Marker::Fi => 2
    }
  }
}

fn clean(text: &str) -> &str {
  text.trim_matches(|c: char| c.is_whitespace() || c == ';')
}

/// Finds the top-level `then`, `elif`, `else` and closing `fi` keywords of an
/// `if` statement, skipping over nested `if ... fi` blocks.
fn conditional_markers(text: &str) -> Option<Vec<(Marker, usize)>> {
  let mask = top_level(text);
  let mut markers = Vec::new();
  let mut depth = 0usize;

  for (i, _) in text.char_indices().skip(2) {
    if !mask[i] {
      continue;
    }

    if word_at(text, i, "if") && starts_command(text, i) {
      depth += 1;
    } else if word_at(text, i, "fi") && after_terminator(text, i) {
      if depth == 0 {
        markers.push((Marker::Fi, i));
        return Some(markers);
      }

      depth -= 1;
    } else if depth > 0 {
      continue;
    } else if word_at(text, i, "then") {
      markers.push((Marker::Then, i));
    } else if word_at(text, i, "elif") && after_terminator(text, i) {
      markers.push((Marker::Elif, i));
    } else if word_at(text, i, "else") && after_terminator(text, i) {
      markers.push((Marker::Else, i));
    }
  }

  None
}

/// The text between the marker at `index` and the one following it.
fn between<'a>(text: &'a str, markers: &[(Marker, usize)], index: usize) -> &'a str {
  let (marker, start) = markers[index];
  clean(&text[start + marker.len()..markers[index + 1].1])
}

fn conditional(text: &str) -> Option<ShellConstruct> {
  let text = text.trim();
  if !text.starts_with("if") || !text[2..].starts_with(char::is_whitespace) {
    return None;
  }

  let markers = conditional_markers(text)?;

  // the closing `fi` must end the text
  let (_, fi) = *markers.last()?;
  if !text[fi + Marker::Fi.len()..].trim().is_empty() {
    return None;
  }

  // expected shape: then (elif then)* else? fi
  if markers.first().map(|m| m.0) != Some(Marker::Then) {
    return None;
  }

  let condition = Body::parse(clean(&text[2..markers[0].1]));
  let then = Body::parse(between(text, &markers, 0));
  let mut elifs = Vec::new();
  let mut otherwise = None;

  let mut index = 1;
  while markers[index].0 == Marker::Elif {
    if markers.get(index + 1).map(|m| m.0) != Some(Marker::Then) {
      return None;
    }

    elifs.push(ElifBranch {
      condition: Body::parse(between(text, &markers, index)),
      body: Body::parse(between(text, &markers, index + 1))
    });

    index += 2;
  }

  if markers[index].0 == Marker::Else {
    otherwise = Some(Body::parse(between(text, &markers, index)));
    index += 1;
  }

  if markers[index].0 != Marker::Fi {
    return None;
  }

  Some(ShellConstruct::Conditional { condition, then, elifs, otherwise })
}

fn for_loop(text: &str) -> Option<ShellConstruct> {
  lazy_static! {
    static ref FOR: Regex = Regex::new(
      r"(?s)^\s*for\s+([A-Za-z_][A-Za-z0-9_]*)\s+in\s+(.*?)\s*;\s*do\s+(.*?)\s*;\s*done\s*$"
    ).unwrap();
  }

  let captures = FOR.captures(text)?;

  Some(ShellConstruct::ForLoop {
    variable: captures[1].to_string(),
    iterable: ValueExpression::parse(captures[2].trim()),
    body: Body::parse(captures[3].trim())
  })
}

fn while_loop(text: &str) -> Option<ShellConstruct> {
  lazy_static! {
    static ref WHILE: Regex = Regex::new(
      r"(?s)^\s*while\s+(.*?)\s*;\s*do\s+(.*?)\s*;\s*done\s*$"
    ).unwrap();
  }

  let captures = WHILE.captures(text)?;

  Some(ShellConstruct::WhileLoop {
    condition: ValueExpression::parse(captures[1].trim()),
    body: Body::parse(captures[2].trim())
  })
}

fn case_switch(text: &str) -> Option<ShellConstruct> {
  lazy_static! {
    static ref CASE: Regex = Regex::new(r"(?s)^\s*case\s+(.*?)\s+in\s+(.*)\s+esac\s*$").unwrap();
    static ref CLAUSE_SEP: Regex = Regex::new(r";;\s*").unwrap();
    static ref CLAUSE: Regex = Regex::new(r"(?s)^(.*?)\)\s*(.*)$").unwrap();
  }

  let captures = CASE.captures(text)?;

  let clauses = CLAUSE_SEP.split(&captures[2])
    .map(str::trim)
    .filter(|clause| !clause.is_empty())
    .filter_map(|clause| CLAUSE.captures(clause))
    .map(|c| CaseClause {
      pattern: ValueExpression::parse(c[1].trim()),
      body: ValueExpression::parse(c[2].trim())
    })
    .collect();

  Some(ShellConstruct::CaseSwitch {
    subject: ValueExpression::parse(captures[1].trim()),
    clauses
  })
}
