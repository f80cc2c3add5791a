// (C) Copyright 2019 Hewlett Packard Enterprise Development LP

use std::convert::TryFrom;

use serde::Serialize;

use crate::error::*;
use crate::node::Node;

mod from;
pub use from::*;

mod copy;
pub use copy::*;

mod arg;
pub use arg::*;

mod env;
pub use env::*;

mod expose;
pub use expose::*;

mod user;
pub use user::*;

mod run;
pub use run::*;

mod misc;
pub use misc::*;

/// Why an instruction could not be analyzed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMarker {
  MissingImage,
  EmptyEnv,
  EmptyCommand,
  IncompleteCopyAdd
}

impl ErrorMarker {
  pub fn as_str(&self) -> &'static str {
    match self {
      ErrorMarker::MissingImage => "missing_image",
      ErrorMarker::EmptyEnv => "empty_env",
      ErrorMarker::EmptyCommand => "empty_command",
      ErrorMarker::IncompleteCopyAdd => "incomplete_copy_add"
    }
  }
}

/// An instruction that was recognized but could not be analyzed, e.g. a
/// `COPY` with a single argument.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvalidInstruction {
  pub keyword: String,
  pub marker: ErrorMarker
}

impl InvalidInstruction {
  pub fn new<S: Into<String>>(keyword: S, marker: ErrorMarker) -> InvalidInstruction {
    InvalidInstruction { keyword: keyword.into(), marker }
  }

  pub fn to_node(&self) -> Node {
    Node::wrap(self.keyword.as_str(), Node::leaf("error", self.marker.as_str()))
  }
}

/// A single analyzed Dockerfile instruction.
///
/// Individual instructions structures may be unpacked with pattern matching or
/// via the `TryFrom` impls on each instruction type.
///
/// # Example
///
/// ```
/// use std::convert::TryInto;
/// use dockerfile_east::*;
///
/// let mut assembler = Assembler::new(&EastOptions::default());
/// let instruction = assembler.instruction("FROM", "alpine:3.11 AS base");
/// let from: &FromInstruction = (&instruction).try_into().unwrap();
///
/// assert_eq!(from.image_parsed.tag, Some("3.11".to_string()));
/// assert_eq!(from.alias.as_deref(), Some("base"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Instruction {
  From(FromInstruction),
  Arg(ArgInstruction),
  Env(EnvInstruction),
  Expose(ExposeInstruction),
  User(UserInstruction),
  Command(CommandInstruction),
  Copy(CopyInstruction),
  Misc(MiscInstruction),
  Invalid(InvalidInstruction)
}

impl Instruction {
  /// The (upper-cased) instruction keyword.
  pub fn keyword(&self) -> &str {
    match self {
      Instruction::From(_) => "FROM",
      Instruction::Arg(_) => "ARG",
      Instruction::Env(_) => "ENV",
      Instruction::Expose(_) => "EXPOSE",
      Instruction::User(_) => "USER",
      Instruction::Command(c) => &c.keyword,
      Instruction::Copy(c) => &c.keyword,
      Instruction::Misc(m) => &m.keyword,
      Instruction::Invalid(i) => &i.keyword
    }
  }

  pub fn to_node(&self) -> Node {
    match self {
      Instruction::From(i) => i.to_node(),
      Instruction::Arg(i) => i.to_node(),
      Instruction::Env(i) => i.to_node(),
      Instruction::Expose(i) => i.to_node(),
      Instruction::User(i) => i.to_node(),
      Instruction::Command(i) => i.to_node(),
      Instruction::Copy(i) => i.to_node(),
      Instruction::Misc(i) => i.to_node(),
      Instruction::Invalid(i) => i.to_node()
    }
  }
}

/// Maps an instruction struct to its enum variant, implementing From<T> on
/// Instruction for it, and TryFrom<&Instruction> on a reference to it.
macro_rules! impl_from_instruction {
  ($struct:ident, $variant:ident) => {
    impl From<$struct> for Instruction {
      fn from(ins: $struct) -> Self {
        Instruction::$variant(ins)
      }
    }

    impl<'a> TryFrom<&'a Instruction> for &'a $struct {
      type Error = Error;

      fn try_from(instruction: &'a Instruction) -> std::result::Result<Self, Self::Error> {
        if let Instruction::$variant(ins) = instruction {
          Ok(ins)
        } else {
          Err(Error::ConversionError {
            from: format!("{:?}", instruction),
            to: stringify!($struct).into()
          })
        }
      }
    }
  };
}

impl_from_instruction!(FromInstruction, From);
impl_from_instruction!(ArgInstruction, Arg);
impl_from_instruction!(EnvInstruction, Env);
impl_from_instruction!(ExposeInstruction, Expose);
impl_from_instruction!(UserInstruction, User);
impl_from_instruction!(CommandInstruction, Command);
impl_from_instruction!(CopyInstruction, Copy);
impl_from_instruction!(MiscInstruction, Misc);
impl_from_instruction!(InvalidInstruction, Invalid);
