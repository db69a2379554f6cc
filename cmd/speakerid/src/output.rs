//! Output and input helpers.

use std::io::Read;

use anyhow::Context as _;
use serde::{Deserialize, Serialize};

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// YAML format (default).
    #[default]
    Yaml,
    /// JSON format.
    Json,
}

pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(json: bool) -> Self {
        let format = if json {
            OutputFormat::Json
        } else {
            OutputFormat::Yaml
        };
        Self { format }
    }

    pub fn write<T: Serialize>(&self, value: &T) -> anyhow::Result<()> {
        println!("{}", self.render(value)?);
        Ok(())
    }

    fn render<T: Serialize>(&self, value: &T) -> anyhow::Result<String> {
        Ok(match self.format {
            OutputFormat::Yaml => serde_yaml::to_string(value)?,
            OutputFormat::Json => serde_json::to_string_pretty(value)?,
        })
    }
}

/// Accepted embedding file shapes: a bare array or `{"vector": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum VectorFile {
    Bare(Vec<f32>),
    Wrapped { vector: Vec<f32> },
}

/// Reads an embedding from a JSON file, or stdin when `path` is "-".
pub fn read_vector(path: &str) -> anyhow::Result<Vec<f32>> {
    let content = if path == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path).with_context(|| format!("read {path}"))?
    };
    parse_vector(&content).with_context(|| format!("parse embedding from {path}"))
}

pub fn parse_vector(content: &str) -> anyhow::Result<Vec<f32>> {
    let file: VectorFile = serde_json::from_str(content.trim())?;
    Ok(match file {
        VectorFile::Bare(v) | VectorFile::Wrapped { vector: v } => v,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_bare_and_wrapped() {
        assert_eq!(parse_vector("[1.0, 0.5, -2]").unwrap(), vec![1.0, 0.5, -2.0]);
        assert_eq!(
            parse_vector("{\"vector\": [0.25, 0.75]}\n").unwrap(),
            vec![0.25, 0.75]
        );
        assert!(parse_vector("{\"embedding\": [1.0]}").is_err());
        assert!(parse_vector("not json").is_err());
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("v.json");
        std::fs::write(&path, "[0.1, 0.2, 0.3]").unwrap();
        let v = read_vector(path.to_str().unwrap()).unwrap();
        assert_eq!(v.len(), 3);
    }

    #[test]
    fn render_json() {
        let out = Output::new(true);
        let s = out.render(&serde_json::json!({"identity": "alice", "score": 1.0})).unwrap();
        assert!(s.contains("\"identity\": \"alice\""));
    }
}
