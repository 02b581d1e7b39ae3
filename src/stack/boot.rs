//! Boot-time configuration payload.
//!
//! The script file belongs to the operator; we take it verbatim as the single
//! part of a MIME multipart container:
//!
//! ```text
//! Content-Type: multipart/mixed; boundary="+AWS+CDK+User+Data+Separator=="
//! MIME-Version: 1.0
//!
//! --+AWS+CDK+User+Data+Separator==
//! Content-Type: text/cloud-config; charset="utf8"
//! Content-Transfer-Encoding: base64
//!
//! <base64 body>
//! --+AWS+CDK+User+Data+Separator==--
//! ```

use crate::error::BuildError;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::path::Path;

pub const BOUNDARY: &str = "+AWS+CDK+User+Data+Separator==";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootPart {
    pub content_type: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootPayload {
    parts: Vec<BootPart>,
}

impl BootPayload {
    /// Read `path` as the sole part. Any read failure is fatal to the build.
    pub fn load(path: &Path, content_type: &str) -> Result<Self, BuildError> {
        let body = std::fs::read_to_string(path).map_err(|source| {
            BuildError::BootPayloadUnreadable {
                path: path.to_path_buf(),
                source,
            }
        })?;
        tracing::info!(path = %path.display(), bytes = body.len(), "boot configuration loaded");
        Ok(Self::from_script(body, content_type))
    }

    pub fn from_script(body: impl Into<String>, content_type: &str) -> Self {
        Self {
            parts: vec![BootPart {
                content_type: content_type.to_string(),
                body: body.into(),
            }],
        }
    }

    pub fn parts(&self) -> &[BootPart] {
        &self.parts
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "Content-Type: multipart/mixed; boundary=\"{}\"\nMIME-Version: 1.0\n\n",
            BOUNDARY
        );
        for part in &self.parts {
            out.push_str(&format!("--{}\n", BOUNDARY));
            out.push_str(&format!("Content-Type: {}\n", part.content_type));
            out.push_str("Content-Transfer-Encoding: base64\n\n");
            out.push_str(&STANDARD.encode(part.body.as_bytes()));
            out.push('\n');
        }
        out.push_str(&format!("--{}--\n", BOUNDARY));
        out
    }
}
