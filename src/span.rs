// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use serde::Serialize;

use crate::parser::Pair;

/// A byte-index tuple representing a span of characters in a string
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct Span {
  pub start: usize,
  pub end: usize
}

impl Span {
  pub fn new(start: usize, end: usize) -> Span {
    Span { start, end }
  }

  pub(crate) fn from_pair(record: &Pair) -> Span {
    let pest_span = record.as_span();

    Span {
      start: pest_span.start(),
      end: pest_span.end()
    }
  }

  /// Returns true if `index` falls within this span.
  pub fn contains(&self, index: usize) -> bool {
    self.start <= index && index < self.end
  }
}
