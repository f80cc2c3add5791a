// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

use serde::Serialize;

use crate::node::Node;
use crate::variables::ValueExpression;

const PROTOCOLS: &[&str] = &["tcp", "udp", "sctp"];

/// A problem with a port number or protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortIssue {
  NotInteger,
  OutOfRange,
  InvalidProtocol
}

impl PortIssue {
  pub fn as_str(&self) -> &'static str {
    match self {
      PortIssue::NotInteger => "port_not_integer",
      PortIssue::OutOfRange => "port_out_of_range",
      PortIssue::InvalidProtocol => "invalid_protocol"
    }
  }
}

/// Checks that a string is a port number between 1 and 65535.
pub fn validate_port(port: &str) -> Option<PortIssue> {
  let port = port.trim();

  match port.parse::<i64>() {
    Ok(n) if (1..=65535).contains(&n) => None,
    Ok(_) => Some(PortIssue::OutOfRange),

    // digits only, but too large for an i64
    Err(_) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => {
      Some(PortIssue::OutOfRange)
    },
    Err(_) => Some(PortIssue::NotInteger)
  }
}

/// A single `port[/protocol]` entry. Port ranges (`8000-8010`) are validated
/// at both ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposedPort {
  pub port: String,
  pub protocol: Option<String>,
  pub issues: Vec<PortIssue>
}

impl ExposedPort {
  pub fn parse(entry: &str) -> ExposedPort {
    let (port, protocol) = match entry.find('/') {
      Some(slash) => (&entry[..slash], Some(&entry[slash + 1..])),
      None => (entry, None)
    };

    let mut issues = Vec::new();

    // ports set through variables can't be checked statically
    if !ValueExpression::parse(port).has_variables() {
      let ends = match port.find('-') {
        Some(dash) if dash > 0 => vec![&port[..dash], &port[dash + 1..]],
        _ => vec![port]
      };

      for issue in ends.into_iter().filter_map(validate_port) {
        if !issues.contains(&issue) {
          issues.push(issue);
        }
      }
    }

    if let Some(protocol) = protocol {
      if !PROTOCOLS.contains(&protocol.to_ascii_lowercase().as_str()) {
        issues.push(PortIssue::InvalidProtocol);
      }
    }

    ExposedPort {
      port: port.to_string(),
      protocol: protocol.map(String::from),
      issues
    }
  }

  pub fn to_node(&self) -> Node {
    let mut node = Node::wrap("port", Node::wrap("value", ValueExpression::parse(&self.port).to_node()))
      .with_optional(self.protocol.as_ref().map(|p| Node::leaf("protocol", p.as_str())));

    for issue in &self.issues {
      node.push(Node::leaf("issue", issue.as_str()));
    }

    node
  }
}

/// A Dockerfile [`EXPOSE` instruction][expose].
///
/// [expose]: https://docs.docker.com/engine/reference/builder/#expose
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExposeInstruction(pub Vec<ExposedPort>);

impl ExposeInstruction {
  pub(crate) fn from_value(value: &str) -> ExposeInstruction {
    ExposeInstruction(value.split_whitespace().map(ExposedPort::parse).collect())
  }

  pub fn to_node(&self) -> Node {
    let mut node = Node::new("EXPOSE");
    for port in &self.0 {
      node.push(port.to_node());
    }

    node
  }
}
