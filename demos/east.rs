// (C) Copyright 2019-2020 Hewlett Packard Enterprise Development LP

use std::fs;
use std::path::PathBuf;

use snafu::ErrorCompat;
use tracing_subscriber::EnvFilter;

use dockerfile_east::{EastOptions, EastParser, Result};

const DEMO_DOCKERFILE: &str = r#"# syntax=docker/dockerfile:1
ARG GO_VERSION=1.15
FROM golang:${GO_VERSION} AS build
WORKDIR /src
COPY app/ .
RUN go build -o /out/app . && \
    if [ -f /out/app ]; then echo built; else exit 1; fi

FROM alpine:3.12
ENV APP_PORT=8080 \
    PATH=/app:$PATH
WORKDIR /app
COPY --from=build /out/app /usr/bin/app
COPY scripts/entrypoint.sh config/*.json ./
RUN chmod +x entrypoint.sh && ./entrypoint.sh --check
EXPOSE 8080/tcp
USER 1000:1000
ENTRYPOINT ["./entrypoint.sh"]
"#;

const DEMO_FILES: &[(&str, &str)] = &[
  ("app/main.go", "package main\n\nfunc main() {}\n"),
  ("scripts/entrypoint.sh", "#!/bin/sh\n# start the app\nexec /usr/bin/app \"$@\"\n"),
  ("config/app.json", "{\"debug\": false}\n")
];

/// Writes a small repository to analyze when no Dockerfile is given.
fn demo_repo() -> std::io::Result<tempfile::TempDir> {
  let dir = tempfile::tempdir()?;

  for (path, content) in DEMO_FILES {
    let path = dir.path().join(path);
    if let Some(parent) = path.parent() {
      fs::create_dir_all(parent)?;
    }

    fs::write(path, content)?;
  }

  fs::write(dir.path().join("Dockerfile"), DEMO_DOCKERFILE)?;
  Ok(dir)
}

fn wrap() -> Result<()> {
  let args: Vec<String> = std::env::args().collect();

  // usage: east [DOCKERFILE [REPO_ROOT]]
  let demo;
  let (dockerfile, repo_root) = match args.get(1) {
    Some(path) => {
      let path = PathBuf::from(path);
      let root = match args.get(2) {
        Some(root) => PathBuf::from(root),
        None => path.parent().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("."))
      };

      (path, root)
    },
    None => {
      demo = demo_repo().expect("could not create the demo repository");
      (demo.path().join("Dockerfile"), demo.path().to_path_buf())
    }
  };

  let options = EastOptions::new(repo_root).dockerfile_path(dockerfile);
  let east = EastParser::new(options).parse_path()?;

  println!("{}", east);
  println!("{}", serde_json::to_string_pretty(&east).expect("tree must serialize"));

  Ok(())
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
    .with_writer(std::io::stderr)
    .init();

  match wrap() {
    Ok(()) => std::process::exit(0),
    Err(e) => {
      eprintln!("An error occurred: {}", e);
      if let Some(backtrace) = ErrorCompat::backtrace(&e) {
          eprintln!("{}", backtrace);
      }

      std::process::exit(1);
    }
  }
}
