// (C) Copyright 2020 Hewlett Packard Enterprise Development LP

use serde::Serialize;

use crate::node::Node;
use crate::variables::{find_all, ValueExpression};

/// A problem with a `USER` instruction's ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UserIssue {
  NegativeUid,
  NegativeGid,
  UidNotInteger,
  GidNotInteger
}

impl UserIssue {
  pub fn as_str(&self) -> &'static str {
    match self {
      UserIssue::NegativeUid => "negative_uid",
      UserIssue::NegativeGid => "negative_gid",
      UserIssue::UidNotInteger => "uid_not_integer",
      UserIssue::GidNotInteger => "gid_not_integer"
    }
  }
}

/// Splits on `:` outside of variable references, so `${USER:-app}:staff` has
/// two fields.
fn split_fields(value: &str) -> Vec<&str> {
  let vars = find_all(value);
  let mut fields = Vec::new();
  let mut start = 0;

  for (i, c) in value.char_indices() {
    if c == ':' && !vars.iter().any(|v| v.span.contains(i)) {
      fields.push(&value[start..i]);
      start = i + 1;
    }
  }

  fields.push(&value[start..]);
  fields
}

fn is_negative(id: &str) -> bool {
  id.parse::<i64>().map_or(false, |n| n < 0)
}

/// Checks a field that must hold a numeric id.
fn check_id(id: &str, negative: UserIssue, not_integer: UserIssue) -> Option<UserIssue> {
  if ValueExpression::parse(id).has_variables() {
    return None;
  }

  match id.parse::<i64>() {
    Ok(n) if n < 0 => Some(negative),
    Ok(_) => None,
    Err(_) => Some(not_integer)
  }
}

/// A Dockerfile [`USER` instruction][user].
///
/// Accepts `user`, `user:group` and the four-field `user:group:uid:gid` form.
/// Anything else is kept whole as the user.
///
/// [user]: https://docs.docker.com/engine/reference/builder/#user
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserInstruction {
  pub user: String,
  pub group: Option<String>,
  pub uid: Option<String>,
  pub gid: Option<String>,
  pub issues: Vec<UserIssue>
}

impl UserInstruction {
  pub(crate) fn from_value(value: &str) -> UserInstruction {
    let value = value.trim();
    let parts = split_fields(value);

    let mut ins = UserInstruction {
      user: value.to_string(),
      group: None,
      uid: None,
      gid: None,
      issues: Vec::new()
    };

    match parts.as_slice() {
      [user] => {
        if is_negative(user) {
          ins.issues.push(UserIssue::NegativeUid);
        }
      },
      [user, group] => {
        ins.user = user.to_string();
        ins.group = Some(group.to_string());

        if is_negative(user) {
          ins.issues.push(UserIssue::NegativeUid);
        }

        if is_negative(group) {
          ins.issues.push(UserIssue::NegativeGid);
        }
      },
      [user, group, uid, gid] => {
        ins.user = user.to_string();
        ins.group = Some(group.to_string());
        ins.uid = Some(uid.to_string());
        ins.gid = Some(gid.to_string());

        ins.issues.extend(check_id(uid, UserIssue::NegativeUid, UserIssue::UidNotInteger));
        ins.issues.extend(check_id(gid, UserIssue::NegativeGid, UserIssue::GidNotInteger));
      },
      _ => ()
    }

    ins
  }

  pub fn to_node(&self) -> Node {
    let mut node = Node::wrap("USER", Node::wrap("user", ValueExpression::parse(&self.user).to_node()))
      .with_optional(self.group.as_ref().map(|g| {
        Node::wrap("group", ValueExpression::parse(g).to_node())
      }))
      .with_optional(self.uid.as_ref().map(|u| Node::leaf("uid", u.as_str())))
      .with_optional(self.gid.as_ref().map(|g| Node::leaf("gid", g.as_str())));

    for issue in &self.issues {
      node.push(Node::leaf("issue", issue.as_str()));
    }

    node
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use pretty_assertions::assert_eq;

  #[test]
  fn user_forms() {
    assert_eq!(UserInstruction::from_value("app"), UserInstruction {
      user: "app".into(),
      group: None,
      uid: None,
      gid: None,
      issues: vec![]
    });

    let ins = UserInstruction::from_value("app:staff");
    assert_eq!(ins.user, "app");
    assert_eq!(ins.group.as_deref(), Some("staff"));

    let ins = UserInstruction::from_value("${APP_USER:-app}:staff");
    assert_eq!(ins.user, "${APP_USER:-app}");
    assert_eq!(ins.group.as_deref(), Some("staff"));

    let ins = UserInstruction::from_value("a:b:c");
    assert_eq!(ins.user, "a:b:c");
    assert_eq!(ins.group, None);
  }

  #[test]
  fn user_issues() {
    assert_eq!(UserInstruction::from_value("-1").issues, vec![UserIssue::NegativeUid]);
    assert_eq!(
      UserInstruction::from_value("-1:-5").issues,
      vec![UserIssue::NegativeUid, UserIssue::NegativeGid]
    );
    assert_eq!(UserInstruction::from_value("1000:1000").issues, vec![]);
    assert_eq!(
      UserInstruction::from_value("app:app:abc:-2").issues,
      vec![UserIssue::UidNotInteger, UserIssue::NegativeGid]
    );
    assert_eq!(UserInstruction::from_value("app:app:$UID:1000").issues, vec![]);
  }

  #[test]
  fn user_node() {
    assert_eq!(
      UserInstruction::from_value("${USER}:-3").to_node(),
      Node::new("USER")
        .with_child(Node::wrap("user", ValueExpression::parse("${USER}").to_node()))
        .with_child(Node::wrap("group", Node::leaf("text", "-3")))
        .with_child(Node::leaf("issue", "negative_gid"))
    );
  }
}
