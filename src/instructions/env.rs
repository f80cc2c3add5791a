// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;

use crate::instructions::{validate_port, ErrorMarker, PortIssue};
use crate::node::Node;
use crate::shell::tokenize;
use crate::util::{clean_escaped_breaks, unquote_lenient};
use crate::variables::ValueExpression;

const SECRET_MARKERS: &[&str] = &["SECRET", "KEY", "TOKEN", "PASSWORD", "PASS", "AWS_"];

/// Minimum length of a value that looks like an encoded secret.
const SECRET_MIN_LEN: usize = 16;

/// Metadata attached to an environment variable by value/name heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvCheck {
  /// A boolean-like value, with its normalized meaning.
  Boolean { normalized: bool },

  /// A port variable, with an issue if the value is not a valid port.
  Port { issue: Option<PortIssue> },

  /// A path list, with the number of `:`-separated segments.
  Path { segments: usize },

  PotentialSecret
}

impl EnvCheck {
  pub fn to_node(&self) -> Node {
    match self {
      EnvCheck::Boolean { normalized } => {
        Node::wrap("boolean", Node::leaf("normalized", normalized.to_string()))
      },
      EnvCheck::Port { issue } => {
        Node::new("port").with_optional(issue.map(|i| Node::leaf("issue", i.as_str())))
      },
      EnvCheck::Path { segments } => {
        Node::wrap("path", Node::leaf("segments", segments.to_string()))
      },
      EnvCheck::PotentialSecret => Node::leaf("potential_secret", "true")
    }
  }
}

fn checks(key: &str, value: &str) -> Vec<EnvCheck> {
  lazy_static! {
    static ref ENCODED: Regex = Regex::new(r"^[A-Za-z0-9+/=_-]+$").unwrap();
  }

  let key = key.to_ascii_uppercase();
  let mut checks = Vec::new();

  match value.to_ascii_lowercase().as_str() {
    "true" | "1" | "yes" => checks.push(EnvCheck::Boolean { normalized: true }),
    "false" | "0" | "no" => checks.push(EnvCheck::Boolean { normalized: false }),
    _ => ()
  }

  if key == "PORT" || key.ends_with("_PORT") {
    checks.push(EnvCheck::Port { issue: validate_port(value) });
  }

  if key == "PATH" || key.ends_with("_PATH") || value.contains(':') {
    let segments = value.split(':').filter(|s| !s.is_empty()).count();
    checks.push(EnvCheck::Path { segments });
  }

  if SECRET_MARKERS.iter().any(|m| key.contains(m))
    || (value.len() >= SECRET_MIN_LEN && ENCODED.is_match(value))
  {
    checks.push(EnvCheck::PotentialSecret);
  }

  checks
}

/// An environment variable key/value pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvVar {
  pub key: String,
  pub value: String,
  pub checks: Vec<EnvCheck>
}

impl EnvVar {
  /// Creates a new variable, computing its checks.
  pub fn new<S1, S2>(key: S1, value: S2) -> EnvVar
  where
    S1: Into<String>,
    S2: Into<String>,
  {
    let key = key.into();
    let value = value.into();

    EnvVar {
      checks: checks(&key, &value),
      key,
      value
    }
  }

  pub fn to_node(&self) -> Node {
    let mut node = Node::new("pair")
      .with_child(Node::leaf("key", self.key.as_str()))
      .with_child(Node::wrap("value", ValueExpression::parse(&self.value).to_node()));

    if !self.checks.is_empty() {
      let mut validation = Node::new("validation");
      for check in &self.checks {
        validation.push(check.to_node());
      }

      node.push(validation);
    }

    node
  }
}

/// A Dockerfile [`ENV` instruction][env].
///
/// Both the `KEY=value ...` form and the legacy `KEY value` form (where the
/// value is everything after the key) are supported.
///
/// [env]: https://docs.docker.com/engine/reference/builder/#env
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvInstruction(pub Vec<EnvVar>);

impl EnvInstruction {
  pub(crate) fn from_value(value: &str) -> Result<EnvInstruction, ErrorMarker> {
    let content = clean_escaped_breaks(value);
    let content = content.trim();
    let tokens = tokenize(content);

    let vars = match tokens.first() {
      None => Vec::new(),
      Some(first) if !first.contains('=') => {
        let rest = content[first.len()..].trim();
        vec![EnvVar::new(first.as_str(), unquote_lenient(rest))]
      },
      Some(_) => tokens.iter()
        .filter_map(|token| {
          let eq = token.find('=')?;
          Some(EnvVar::new(&token[..eq], unquote_lenient(&token[eq + 1..])))
        })
        .collect()
    };

    if vars.is_empty() {
      return Err(ErrorMarker::EmptyEnv);
    }

    Ok(EnvInstruction(vars))
  }

  pub fn to_node(&self) -> Node {
    let mut node = Node::new("ENV");
    for var in &self.0 {
      node.push(var.to_node());
    }

    node
  }
}
