// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::io::{Read, BufReader};
use std::str::FromStr;

use pest::Parser;
use serde::Serialize;
use snafu::ResultExt;

use crate::error::*;
use crate::parser::*;
use crate::span::Span;

/// A single, unanalyzed Dockerfile instruction: a keyword and its raw value.
///
/// Escaped line breaks have been joined and comment lines inside the
/// instruction dropped; nothing else about the value has been interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RawInstruction {
  /// The span from the start of the keyword to the end of the value.
  pub span: Span,

  /// The upper-cased instruction keyword.
  pub keyword: String,

  /// The trimmed value.
  pub value: String
}

impl RawInstruction {
  pub(crate) fn from_record(record: Pair) -> Result<RawInstruction> {
    let mut keyword = None;
    let mut span = Span::from_pair(&record);
    let mut value = String::new();

    for field in record.into_inner() {
      match field.as_rule() {
        Rule::keyword => {
          span = Span::from_pair(&field);
          keyword = Some(field.as_str().to_ascii_uppercase());
        },
        Rule::value => {
          span.end = Span::from_pair(&field).end;

          for chunk in field.into_inner() {
            match chunk.as_rule() {
              Rule::value_chunk => value.push_str(chunk.as_str()),
              _ => return Err(unexpected_token(chunk))
            }
          }
        },
        _ => return Err(unexpected_token(field))
      }
    }

    let keyword = keyword.ok_or_else(|| Error::GenericParseError {
      message: "instructions require a keyword".into()
    })?;

    Ok(RawInstruction {
      span,
      keyword,
      value: value.trim().to_string()
    })
  }
}

/// A Dockerfile split into its instructions.
///
/// # Example
/// ```
/// use dockerfile_east::Dockerfile;
///
/// let s = r#"
///   FROM alpine:3.11
///   RUN apk add \
///     curl
/// "#;
///
/// let dockerfile = Dockerfile::parse(&s).unwrap();
/// assert_eq!(dockerfile.instructions.len(), 2);
/// assert_eq!(dockerfile.instructions[1].value, "apk add     curl");
///
/// assert_eq!(dockerfile, s.parse::<Dockerfile>().unwrap());
/// assert_eq!(dockerfile, Dockerfile::from_reader(s.as_bytes()).unwrap());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dockerfile {
  /// The raw content of the Dockerfile
  pub content: String,

  /// An ordered list of all instructions
  pub instructions: Vec<RawInstruction>
}

fn parse_dockerfile(input: &str) -> Result<Dockerfile> {
  let dockerfile = DockerfileParser::parse(Rule::dockerfile, input)
    .context(ParseError)?
    .next()
    .ok_or(Error::UnknownParseError)?;

  let mut instructions = Vec::new();
  for record in dockerfile.into_inner() {
    match record.as_rule() {
      Rule::EOI => continue,
      Rule::instruction => instructions.push(RawInstruction::from_record(record)?),
      _ => return Err(unexpected_token(record))
    }
  }

  Ok(Dockerfile {
    content: input.into(),
    instructions
  })
}

impl Dockerfile {
  /// Parses a Dockerfile from a string.
  pub fn parse(input: &str) -> Result<Dockerfile> {
    parse_dockerfile(input)
  }

  /// Parses a Dockerfile from a reader.
  pub fn from_reader<R>(reader: R) -> Result<Dockerfile>
  where
    R: Read
  {
    let mut buf = String::new();
    let mut buf_reader = BufReader::new(reader);
    buf_reader.read_to_string(&mut buf).context(ReadError)?;

    Dockerfile::parse(&buf)
  }

  /// Iterates over `(keyword, value)` pairs, the input the EAST assembler
  /// consumes.
  pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
    self.instructions.iter().map(|i| (i.keyword.as_str(), i.value.as_str()))
  }
}

impl FromStr for Dockerfile {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Dockerfile::parse(s)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use indoc::indoc;
  use pretty_assertions::assert_eq;

  fn pairs(dockerfile: &Dockerfile) -> Vec<(&str, &str)> {
    dockerfile.pairs().collect()
  }

  #[test]
  fn parse_basic() -> Result<()> {
    let dockerfile = Dockerfile::parse("FROM alpine:3.10\n\nrun apk add --no-cache curl\n")?;

    assert_eq!(dockerfile.instructions, vec![
      RawInstruction {
        span: Span::new(0, 16),
        keyword: "FROM".into(),
        value: "alpine:3.10".into()
      },
      RawInstruction {
        span: Span::new(18, 45),
        keyword: "RUN".into(),
        value: "apk add --no-cache curl".into()
      }
    ]);

    Ok(())
  }

  #[test]
  fn parse_comments() -> Result<()> {
    let dockerfile = Dockerfile::parse(indoc!(r#"
      # syntax=docker/dockerfile:1
      FROM alpine
        # indented comment
      RUN echo "a # not a comment"
    "#))?;

    assert_eq!(pairs(&dockerfile), vec![
      ("FROM", "alpine"),
      ("RUN", r#"echo "a # not a comment""#)
    ]);

    Ok(())
  }

  #[test]
  fn parse_continuations() -> Result<()> {
    let dockerfile = Dockerfile::parse(indoc!(r#"
      RUN apk add \
          curl \
        # a comment inside the instruction

          git
      ENV A=1 \
          B=2
      CMD\
        ["run"]
    "#))?;

    assert_eq!(pairs(&dockerfile), vec![
      ("RUN", "apk add     curl     git"),
      ("ENV", "A=1     B=2"),
      ("CMD", r#"["run"]"#)
    ]);

    Ok(())
  }

  #[test]
  fn parse_crlf_and_empty() -> Result<()> {
    let dockerfile = Dockerfile::parse("FROM alpine\r\nWORKDIR\r\nRUN a \\\r\n  b\r\n")?;

    assert_eq!(pairs(&dockerfile), vec![
      ("FROM", "alpine"),
      ("WORKDIR", ""),
      ("RUN", "a   b")
    ]);

    assert!(Dockerfile::parse("")?.instructions.is_empty());
    assert!(Dockerfile::parse("  \n# only a comment")?.instructions.is_empty());

    Ok(())
  }

  #[test]
  fn parse_error() {
    assert!(matches!(
      Dockerfile::parse("FROM alpine\n\\\nRUN true\n"),
      Err(Error::ParseError { .. })
    ));
  }
}
