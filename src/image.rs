// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::fmt;

use serde::Serialize;

use crate::variables::{find_all, VariableReference};

/// A parsed docker image reference
///
/// Unlike a plain split on `/`, `:` and `@`, separators inside variable
/// references (e.g. `${TAG:-3.12}`) are ignored, so image names containing
/// variables split the way docker would split them after substitution.
///
/// The `Display` impl may be used to convert a parsed image back to a plain
/// string:
/// ```
/// use dockerfile_east::ImageRef;
///
/// let image = ImageRef::parse("alpine:${ALPINE_VERSION:-3.12}");
/// assert_eq!(image.registry, None);
/// assert_eq!(image.image, "alpine");
/// assert_eq!(image.tag, Some("${ALPINE_VERSION:-3.12}".to_string()));
/// assert_eq!(format!("{}", image), "alpine:${ALPINE_VERSION:-3.12}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageRef {
  /// an optional registry, generally Docker Hub if unset
  pub registry: Option<String>,

  /// an image string, possibly including a user or organization name
  pub image: String,

  /// An optional image tag (after the colon, e.g. `:1.2.3`), generally inferred
  /// to mean `:latest` if unset
  pub tag: Option<String>,

  /// An optional embedded image hash, e.g. `sha256:...`.
  pub hash: Option<String>
}

/// Determines if an ImageRef token refers to a registry hostname or not
///
/// Based on rules from https://stackoverflow.com/a/42116190
fn is_registry(token: &str) -> bool {
  token == "localhost" || token.contains('.') || token.contains(':')
}

/// Byte offsets of `needle` in `s` that lie outside every variable reference.
fn top_level_positions(s: &str, vars: &[VariableReference], needle: char) -> Vec<usize> {
  s.char_indices()
    .filter(|(i, c)| *c == needle && !vars.iter().any(|v| v.span.contains(*i)))
    .map(|(i, _)| i)
    .collect()
}

impl ImageRef {
  /// Parses an `ImageRef` from a string.
  ///
  /// This is not fallible, however malformed image strings may return
  /// unexpected results.
  pub fn parse(s: &str) -> ImageRef {
    // tags may be one of:
    // foo (implies registry.hub.docker.com/library/foo:latest)
    // foo:bar (implies registry.hub.docker.com/library/foo:bar)
    // org/foo:bar (implies registry.hub.docker.com/org/foo:bar)
    // host:443/foo:bar (':' or '.' make the registry unambiguous)
    let vars = find_all(s);

    let (name_full, hash) = match top_level_positions(s, &vars, '@').first() {
      Some(&at) => (&s[..at], Some(s[at + 1..].to_string())),
      None => (s, None)
    };

    // a tag is only ever after the last slash; earlier colons belong to a
    // registry port
    let last_slash = top_level_positions(name_full, &vars, '/').last().copied();
    let colon = top_level_positions(name_full, &vars, ':')
      .into_iter()
      .filter(|i| last_slash.map_or(true, |slash| *i > slash))
      .last();

    let (name, tag) = match colon {
      Some(colon) => (&name_full[..colon], Some(name_full[colon + 1..].to_string())),
      None => (name_full, None)
    };

    let first_slash = top_level_positions(name, &vars, '/').first().copied();
    let (registry, image) = match first_slash {
      Some(slash) if is_registry(&name[..slash]) => {
        (Some(name[..slash].to_string()), name[slash + 1..].to_string())
      },
      _ => (None, name.to_string())
    };

    ImageRef { registry, image, tag, hash }
  }

  /// The full image name, including the registry if any, but without tag or
  /// hash.
  pub fn name(&self) -> String {
    match &self.registry {
      Some(registry) => format!("{}/{}", registry, self.image),
      None => self.image.clone()
    }
  }
}

impl fmt::Display for ImageRef {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.name())?;

    if let Some(tag) = &self.tag {
      write!(f, ":{}", tag)?;
    }

    if let Some(hash) = &self.hash {
      write!(f, "@{}", hash)?;
    }

    Ok(())
  }
}
