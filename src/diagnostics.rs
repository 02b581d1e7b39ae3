//! User-facing message helpers shared by every layer.

const PREFIX: &str = "ec2-lifecycle-stack";

/// Format an error message with the tool prefix so every failure reads the same.
pub fn error_message(msg: impl AsRef<str>) -> String {
    format!("{}: {}", PREFIX, msg.as_ref())
}

/// Advisory finding: the build continues but the operator should know.
pub fn warn(msg: impl AsRef<str>) {
    tracing::warn!("{}", msg.as_ref());
}
