// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::node::Node;
use crate::span::Span;

/// The syntactic form of a parameter expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum VariableForm {
  /// `$NAME`
  Simple,

  /// `${NAME}`
  Braced,

  /// `${NAME:-VALUE}`
  Default,

  /// `${NAME:+VALUE}`
  Substitute,

  /// `${NAME#PATTERN}`
  RemovePrefix,

  /// `${NAME%PATTERN}`
  RemoveSuffix
}

impl VariableForm {
  pub fn as_str(&self) -> &'static str {
    match self {
      VariableForm::Simple => "simple",
      VariableForm::Braced => "braced",
      VariableForm::Default => "default",
      VariableForm::Substitute => "substitute",
      VariableForm::RemovePrefix => "remove_prefix",
      VariableForm::RemoveSuffix => "remove_suffix"
    }
  }

  fn operator(&self) -> &'static str {
    match self {
      VariableForm::Default => ":-",
      VariableForm::Substitute => ":+",
      VariableForm::RemovePrefix => "#",
      VariableForm::RemoveSuffix => "%",
      VariableForm::Simple | VariableForm::Braced => ""
    }
  }
}

/// A single variable reference found in a string.
///
/// `operand` holds the default/substitute value or the prefix/suffix pattern
/// verbatim; nested references inside it are not expanded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VariableReference {
  pub name: String,
  pub form: VariableForm,
  pub operand: Option<String>,

  /// The byte range of the full reference (including `$` and braces) within
  /// the searched string.
  pub span: Span
}

impl VariableReference {
  pub fn to_node(&self) -> Node {
    Node::new("variable")
      .with_child(Node::leaf("name", self.name.as_str()))
      .with_child(Node::leaf("form", self.form.as_str()))
      .with_optional(self.operand.as_ref().map(|o| Node::leaf("operand", o.as_str())))
  }
}

impl fmt::Display for VariableReference {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.form {
      VariableForm::Simple => write!(f, "${}", self.name),
      _ => write!(
        f,
        "${{{}{}{}}}",
        self.name,
        self.form.operator(),
        self.operand.as_deref().unwrap_or("")
      )
    }
  }
}

/// One part of a [`ValueExpression`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Part {
  Text(String),
  Variable(VariableReference)
}

/// A string split into literal text and variable references.
///
/// Parsing never fails: input without (valid) variable syntax becomes a single
/// `Text` part. Formatting an expression with `Display` reproduces the parsed
/// input exactly.
///
/// # Example
/// ```
/// use dockerfile_east::{ValueExpression, Part, VariableForm};
///
/// let expr = ValueExpression::parse("${PREFIX:-/usr}/bin:$PATH");
/// let forms: Vec<_> = expr.variables().map(|v| v.form).collect();
///
/// assert_eq!(forms, vec![VariableForm::Default, VariableForm::Simple]);
/// assert_eq!(expr.to_string(), "${PREFIX:-/usr}/bin:$PATH");
/// assert_eq!(expr.parts[1], Part::Text("/bin:".into()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueExpression {
  pub parts: Vec<Part>
}

fn is_name_start(c: u8) -> bool {
  c.is_ascii_alphabetic() || c == b'_'
}

fn is_name_char(c: u8) -> bool {
  c.is_ascii_alphanumeric() || c == b'_'
}

/// Given the index of an opening brace, returns the index of its matching
/// closing brace, counting nested braces along the way.
fn matching_brace(bytes: &[u8], open: usize) -> Option<usize> {
  let mut depth = 0usize;

  for (i, c) in bytes.iter().enumerate().skip(open) {
    match c {
      b'{' => depth += 1,
      b'}' => {
        depth -= 1;
        if depth == 0 {
          return Some(i);
        }
      },
      _ => ()
    }
  }

  None
}

/// Classifies the interior of a `${...}` reference.
fn braced_reference(interior: &str, span: Span) -> VariableReference {
  lazy_static! {
    static ref OPERATION: Regex = Regex::new(
      r"(?s)^([A-Za-z_][A-Za-z0-9_]*)(:-|:\+|#|%)(.*)$"
    ).unwrap();
  }

  if let Some(caps) = OPERATION.captures(interior) {
    let form = match &caps[2] {
      ":-" => VariableForm::Default,
      ":+" => VariableForm::Substitute,
      "#" => VariableForm::RemovePrefix,
      _ => VariableForm::RemoveSuffix
    };

    VariableReference {
      name: caps[1].to_string(),
      form,
      operand: Some(caps[3].to_string()),
      span
    }
  } else {
    VariableReference {
      name: interior.to_string(),
      form: VariableForm::Braced,
      operand: None,
      span
    }
  }
}

/// Finds every variable reference in `text`, ordered by position.
///
/// The string is scanned once from left to right; a braced reference is
/// matched with nested-brace counting and consumed whole, so references inside
/// a default value are part of the operand rather than separate matches. An
/// unbalanced `${` is skipped.
pub fn find_all(text: &str) -> Vec<VariableReference> {
  let bytes = text.as_bytes();
  let mut found = Vec::new();
  let mut i = 0;

  while i < bytes.len() {
    if bytes[i] != b'$' {
      i += 1;
      continue;
    }

    match bytes.get(i + 1) {
      Some(b'{') => {
        if let Some(close) = matching_brace(bytes, i + 1) {
          found.push(braced_reference(&text[i + 2..close], Span::new(i, close + 1)));
          i = close + 1;
          continue;
        }
      },
      Some(c) if is_name_start(*c) => {
        let mut end = i + 2;
        while end < bytes.len() && is_name_char(bytes[end]) {
          end += 1;
        }

        found.push(VariableReference {
          name: text[i + 1..end].to_string(),
          form: VariableForm::Simple,
          operand: None,
          span: Span::new(i, end)
        });
        i = end;
        continue;
      },
      _ => ()
    }

    i += 1;
  }

  found
}

impl ValueExpression {
  /// Splits `text` into literal and variable parts.
  pub fn parse(text: &str) -> ValueExpression {
    let mut parts = Vec::new();
    let mut last = 0;

    for var in find_all(text) {
      if var.span.start > last {
        parts.push(Part::Text(text[last..var.span.start].to_string()));
      }

      last = var.span.end;
      parts.push(Part::Variable(var));
    }

    if last < text.len() || parts.is_empty() {
      parts.push(Part::Text(text[last..].to_string()));
    }

    ValueExpression { parts }
  }

  /// Returns an iterator over the variable references in this expression.
  pub fn variables(&self) -> impl Iterator<Item = &VariableReference> {
    self.parts.iter().filter_map(|p| match p {
      Part::Variable(v) => Some(v),
      Part::Text(_) => None
    })
  }

  pub fn has_variables(&self) -> bool {
    self.variables().next().is_some()
  }

  pub fn to_node(&self) -> Node {
    if !self.has_variables() {
      return Node::leaf("text", self.to_string());
    }

    let mut node = Node::new("value_with_variables");
    for part in &self.parts {
      node.push(match part {
        Part::Text(text) => Node::leaf("text", text.as_str()),
        Part::Variable(var) => var.to_node()
      });
    }

    node
  }
}

impl fmt::Display for ValueExpression {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    for part in &self.parts {
      match part {
        Part::Text(text) => f.write_str(text)?,
        Part::Variable(var) => write!(f, "{}", var)?
      }
    }

    Ok(())
  }
}

/// Given a map of key/value pairs, perform variable substitution on a given
/// input string. `max_recursion_depth` controls the maximum allowed recursion
/// depth if variables refer to other strings themselves containing variable
/// references. A small number but reasonable is recommended by default, e.g.
/// 16.
///
/// Defaults (`:-`) and alternates (`:+`) are honored; prefix and suffix removal
/// only supports literal patterns.
///
/// If None is returned, substitution was impossible, either because a
/// referenced variable did not exist, a removal pattern contained wildcards,
/// or recursion depth was exceeded.
pub fn substitute(
  s: &str,
  vars: &BTreeMap<String, String>,
  used_vars: &mut BTreeSet<String>,
  max_recursion_depth: u8
) -> Option<String> {
  let expr = ValueExpression::parse(s);
  let mut out = String::new();

  for part in &expr.parts {
    let var = match part {
      Part::Text(text) => {
        out.push_str(text);
        continue;
      },
      Part::Variable(var) => var
    };

    if max_recursion_depth == 0 {
      // can't substitute, so give up
      return None;
    }

    let depth = max_recursion_depth.saturating_sub(1);
    let value = match vars.get(&var.name) {
      Some(v) => Some(substitute(v, vars, used_vars, depth)?),
      None => None
    };
    let operand = var.operand.as_deref().unwrap_or("");

    let substituted = match (var.form, value) {
      (VariableForm::Simple, Some(v)) | (VariableForm::Braced, Some(v)) => v,
      (VariableForm::Default, Some(v)) if !v.is_empty() => v,
      (VariableForm::Default, _) => substitute(operand, vars, used_vars, depth)?,
      (VariableForm::Substitute, Some(v)) if !v.is_empty() => {
        substitute(operand, vars, used_vars, depth)?
      },
      (VariableForm::Substitute, _) => String::new(),
      (VariableForm::RemovePrefix, Some(v)) if !is_pattern(operand) => {
        v.strip_prefix(operand).unwrap_or(v.as_str()).to_string()
      },
      (VariableForm::RemoveSuffix, Some(v)) if !is_pattern(operand) => {
        v.strip_suffix(operand).unwrap_or(v.as_str()).to_string()
      },
      _ => return None
    };

    if vars.contains_key(&var.name) {
      used_vars.insert(var.name.clone());
    }

    out.push_str(&substituted);
  }

  Some(out)
}

fn is_pattern(s: &str) -> bool {
  s.contains(|c: char| c == '*' || c == '?' || c == '[')
}
