//! GitHub Actions workflow commands (`::warning::`, `::error::`).
//!
//! The runner parses these from stdout and turns them into annotations on the
//! workflow run.

/// Escape a message so it survives as a single workflow command.
fn escape_data(message: &str) -> String {
    message
        .replace('%', "%25")
        .replace('\r', "%0D")
        .replace('\n', "%0A")
}

/// `::<command>::<message>`, printed on stdout by the caller.
pub fn format_command(command: &str, message: &str) -> String {
    format!("::{}::{}", command, escape_data(message))
}
