// (C) Copyright 2019 Hewlett Packard Enterprise Development LP

use enquote::unquote;
use lazy_static::lazy_static;
use regex::Regex;

/// Given text ostensibly containing a JSON string array (exec form), returns
/// its elements. Non-string elements are kept in their JSON representation.
///
/// Returns None if the text is not bracketed or fails to parse, in which case
/// callers fall back to treating it as a plain shell string.
pub fn parse_string_array(text: &str) -> Option<Vec<String>> {
  let text = text.trim();
  if !text.starts_with('[') || !text.ends_with(']') {
    return None;
  }

  let values: Vec<serde_json::Value> = serde_json::from_str(text).ok()?;

  Some(values.into_iter().map(|v| match v {
    serde_json::Value::String(s) => s,
    other => other.to_string()
  }).collect())
}

/// Joins escaped line breaks (a backslash, optional whitespace, a newline and
/// any indentation) into a single space.
pub fn clean_escaped_breaks(s: &str) -> String {
  lazy_static! {
    static ref BREAK: Regex = Regex::new(r"\\[ \t]*\r?\n[ \t]*").unwrap();
  }

  BREAK.replace_all(s, " ").into_owned()
}

/// Returns `s` without a matching pair of surrounding quotes.
pub fn strip_quotes(s: &str) -> &str {
  let bytes = s.as_bytes();
  if bytes.len() >= 2
    && (bytes[0] == b'"' || bytes[0] == b'\'')
    && bytes[bytes.len() - 1] == bytes[0]
  {
    &s[1..s.len() - 1]
  } else {
    s
  }
}

/// Unescapes a quoted string, falling back to simply removing the quotes if
/// the content contains escapes `enquote` does not understand. Unquoted input
/// is returned unchanged.
pub fn unquote_lenient(s: &str) -> String {
  if strip_quotes(s).len() == s.len() {
    return s.to_string();
  }

  unquote(s).unwrap_or_else(|_| strip_quotes(s).to_string())
}

/// Resolves a container path against a working directory, normalizing `.` and
/// `..` components lexically. The result is always absolute and never has a
/// trailing slash (except for `/` itself).
pub fn resolve_path(workdir: &str, path: &str) -> String {
  let joined = if path.starts_with('/') {
    path.to_string()
  } else {
    format!("{}/{}", workdir, path)
  };

  let mut components: Vec<&str> = Vec::new();
  for component in joined.split('/') {
    match component {
      "" | "." => (),
      ".." => {
        components.pop();
      },
      c => components.push(c)
    }
  }

  format!("/{}", components.join("/"))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn string_array() {
    assert_eq!(
      parse_string_array(r#"["echo", "hello world"]"#),
      Some(vec!["echo".to_string(), "hello world".to_string()])
    );
    assert_eq!(
      parse_string_array(r#" ["sleep", 10] "#),
      Some(vec!["sleep".to_string(), "10".to_string()])
    );
    assert_eq!(parse_string_array(r#"["unterminated]"#), None);
    assert_eq!(parse_string_array("[ -f a ] && echo a"), None);
    assert_eq!(parse_string_array("echo hi"), None);
  }

  #[test]
  fn escaped_breaks() {
    assert_eq!(
      clean_escaped_breaks("A=1 \\\n    B=2 \\\r\n\tC=3"),
      "A=1  B=2  C=3"
    );
  }

  #[test]
  fn quotes() {
    assert_eq!(strip_quotes(r#""bar""#), "bar");
    assert_eq!(strip_quotes("'bar'"), "bar");
    assert_eq!(strip_quotes(r#""bar'"#), r#""bar'"#);
    assert_eq!(strip_quotes(r#"""#), r#"""#);

    assert_eq!(unquote_lenient(r#""bar\"baz""#), "bar\"baz");
    assert_eq!(unquote_lenient("bar"), "bar");
  }

  #[test]
  fn paths() {
    assert_eq!(resolve_path("/app", "run.sh"), "/app/run.sh");
    assert_eq!(resolve_path("/app", "./run.sh"), "/app/run.sh");
    assert_eq!(resolve_path("/app/bin", "../run.sh"), "/app/run.sh");
    assert_eq!(resolve_path("/app", "/usr/bin/"), "/usr/bin");
    assert_eq!(resolve_path("/", "."), "/");
    assert_eq!(resolve_path("/", "../../etc"), "/etc");
  }
}
