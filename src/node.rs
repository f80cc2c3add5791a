// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::fmt;

use serde::Serialize;

/// The content of a [`Node`]: either an ordered list of children or a single
/// leaf value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeContent {
  Children(Vec<Node>),
  Leaf(String)
}

/// A single node of the enriched syntax tree.
///
/// Every part of the tree is built from this one shape: a tag plus either
/// ordered children or a leaf value. Child order always follows source order,
/// so two trees built from identical input compare (and serialize) equal.
///
/// # Example
/// ```
/// use dockerfile_east::Node;
///
/// let node = Node::new("FROM")
///   .with_child(Node::leaf("stage", "1"))
///   .with_child(Node::leaf("image_name", "alpine"));
///
/// assert_eq!(node.child("stage").and_then(Node::value), Some("1"));
/// assert_eq!(node.children().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Node {
  pub tag: String,
  pub content: NodeContent
}

impl Node {
  /// Creates a node with no children.
  pub fn new<S: Into<String>>(tag: S) -> Node {
    Node {
      tag: tag.into(),
      content: NodeContent::Children(Vec::new())
    }
  }

  /// Creates a leaf node holding a single value.
  pub fn leaf<S1, S2>(tag: S1, value: S2) -> Node
  where
    S1: Into<String>,
    S2: Into<String>
  {
    Node {
      tag: tag.into(),
      content: NodeContent::Leaf(value.into())
    }
  }

  /// Creates a node wrapping a single child.
  pub fn wrap<S: Into<String>>(tag: S, child: Node) -> Node {
    Node::new(tag).with_child(child)
  }

  /// Appends a child, returning the node for chaining.
  pub fn with_child(mut self, child: Node) -> Node {
    self.push(child);
    self
  }

  /// Appends a child if one is given.
  pub fn with_optional(self, child: Option<Node>) -> Node {
    match child {
      Some(child) => self.with_child(child),
      None => self
    }
  }

  /// Appends a child.
  ///
  /// Pushing onto a leaf turns it into a node whose first child is a `value`
  /// leaf holding the previous value, so no content is ever lost.
  pub fn push(&mut self, child: Node) {
    match &mut self.content {
      NodeContent::Children(children) => children.push(child),
      NodeContent::Leaf(value) => {
        let previous = Node::leaf("value", std::mem::take(value));
        self.content = NodeContent::Children(vec![previous, child]);
      }
    }
  }

  /// Returns this node's children, or an empty slice for leaves.
  pub fn children(&self) -> &[Node] {
    match &self.content {
      NodeContent::Children(children) => children,
      NodeContent::Leaf(_) => &[]
    }
  }

  /// Returns the leaf value, if this is a leaf.
  pub fn value(&self) -> Option<&str> {
    match &self.content {
      NodeContent::Leaf(value) => Some(value),
      NodeContent::Children(_) => None
    }
  }

  /// Finds the first direct child with the given tag.
  pub fn child(&self, tag: &str) -> Option<&Node> {
    self.children().iter().find(|c| c.tag == tag)
  }

  /// Returns all direct children with the given tag.
  pub fn children_tagged<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
    self.children().iter().filter(move |c| c.tag == tag)
  }

  /// Depth-first, pre-order search for every node with the given tag,
  /// including this one.
  pub fn find_all<'a>(&'a self, tag: &str) -> Vec<&'a Node> {
    let mut found = Vec::new();
    self.collect(tag, &mut found);
    found
  }

  fn collect<'a>(&'a self, tag: &str, found: &mut Vec<&'a Node>) {
    if self.tag == tag {
      found.push(self);
    }

    for child in self.children() {
      child.collect(tag, found);
    }
  }

  fn render(&self, f: &mut fmt::Formatter<'_>, prefix: &str, last: bool, root: bool) -> fmt::Result {
    let (branch, extension) = match (root, last) {
      (true, _) => ("", ""),
      (false, true) => ("└── ", "    "),
      (false, false) => ("├── ", "│   ")
    };

    match &self.content {
      NodeContent::Leaf(value) => writeln!(f, "{}{}{}: {:?}", prefix, branch, self.tag, value),
      NodeContent::Children(children) => {
        writeln!(f, "{}{}{}", prefix, branch, self.tag)?;

        let prefix = format!("{}{}", prefix, extension);
        for (i, child) in children.iter().enumerate() {
          child.render(f, &prefix, i + 1 == children.len(), false)?;
        }

        Ok(())
      }
    }
  }
}

impl fmt::Display for Node {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.render(f, "", true, true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  #[test]
  fn node_render() {
    let node = Node::new("dockerfile")
      .with_child(Node::new("FROM")
        .with_child(Node::leaf("stage", "1"))
        .with_child(Node::leaf("image_name", "alpine")))
      .with_child(Node::wrap("WORKDIR", Node::leaf("text", "/app")));

    assert_eq!(node.to_string(), indoc!(r#"
      dockerfile
      ├── FROM
      │   ├── stage: "1"
      │   └── image_name: "alpine"
      └── WORKDIR
          └── text: "/app"
    "#));
  }

  #[test]
  fn node_push_onto_leaf() {
    let mut node = Node::leaf("resolved", "3.12");
    node.push(Node::leaf("source", "build_arg"));

    assert_eq!(node, Node::new("resolved")
      .with_child(Node::leaf("value", "3.12"))
      .with_child(Node::leaf("source", "build_arg")));
  }

  #[test]
  fn node_find_all() {
    let node = Node::new("a")
      .with_child(Node::new("b").with_child(Node::leaf("c", "1")))
      .with_child(Node::leaf("c", "2"));

    let values: Vec<_> = node.find_all("c").iter().filter_map(|n| n.value()).collect();
    assert_eq!(values, vec!["1", "2"]);
    assert!(node.child("b").is_some());
    assert!(node.child("z").is_none());
  }

  #[test]
  fn node_serialize() {
    let node = Node::wrap("EXPOSE", Node::leaf("value", "80"));

    assert_eq!(
      serde_json::to_string(&node).unwrap(),
      r#"{"tag":"EXPOSE","content":{"children":[{"tag":"value","content":{"leaf":"80"}}]}}"#
    );
  }
}
