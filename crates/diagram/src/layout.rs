//! Runs the external Graphviz layout engine.
//!
//! The call blocks until the engine exits. Deadlines are up to the caller.

use crate::error::RenderError;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::process::{Command, Stdio};
use std::thread;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Svg,
    Png,
    Pdf,
}

impl ImageFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Svg => "svg",
            Self::Png => "png",
            Self::Pdf => "pdf",
        }
    }
}

/// Pipes a DOT document through a layout program and captures the image.
#[derive(Debug, Clone)]
pub struct GraphvizLayout {
    program: String,
    args: Vec<String>,
}

impl GraphvizLayout {
    /// `dot -Tsvg`
    pub fn new() -> Self {
        Self {
            program: "dot".to_string(),
            args: vec![format!("-T{}", ImageFormat::Svg.as_str())],
        }
    }

    /// Another Graphviz engine (`neato`, `fdp`, ...) or a full path to `dot`.
    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    pub fn with_format(mut self, format: ImageFormat) -> Self {
        self.args = vec![format!("-T{}", format.as_str())];
        self
    }

    /// Replaces program and arguments entirely.
    pub fn with_command(mut self, program: &str, args: &[&str]) -> Self {
        self.program = program.to_string();
        self.args = args.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Writes the whole document to the engine and returns its full output.
    pub fn render(&self, document: &str) -> Result<Vec<u8>, RenderError> {
        info!(program = %self.program, args = ?self.args, bytes = document.len(), "running layout engine");

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| RenderError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| io::Error::other("layout engine stdin unavailable"))?;

        // feed stdin from another thread so a full stdout pipe cannot stall us
        let input = document.as_bytes().to_vec();
        let writer = thread::spawn(move || stdin.write_all(&input));

        let output = child.wait_with_output()?;

        match writer.join() {
            Ok(Err(e)) if e.kind() != io::ErrorKind::BrokenPipe => return Err(e.into()),
            Ok(Err(e)) => debug!("layout engine closed stdin early: {}", e),
            Err(_) => return Err(io::Error::other("stdin writer panicked").into()),
            Ok(Ok(())) => {}
        }

        if !output.status.success() {
            return Err(RenderError::LayoutFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        if output.stdout.is_empty() {
            return Err(RenderError::EmptyOutput);
        }

        Ok(output.stdout)
    }

    /// [`render`](Self::render) for text formats such as SVG.
    pub fn render_text(&self, document: &str) -> Result<String, RenderError> {
        let bytes = self.render(document)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Default for GraphvizLayout {
    fn default() -> Self {
        Self::new()
    }
}
