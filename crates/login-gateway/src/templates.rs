//! HTML page loading and placeholder substitution.

use std::path::{Path, PathBuf};

use crate::error::{GatewayError, GatewayResult};

pub const INDEX: &str = "index.html";
pub const ERROR: &str = "error.html";
pub const PROFILE: &str = "profile.html";
pub const NO_SUBSCRIPTION: &str = "no-subscription.html";

/// Reads templates from the views directory. Files are read on every call.
#[derive(Debug, Clone)]
pub struct Templates {
    dir: PathBuf,
}

impl Templates {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub async fn load(&self, file_name: &str) -> GatewayResult<String> {
        if Path::new(file_name).file_name().and_then(|n| n.to_str()) != Some(file_name) {
            return Err(GatewayError::template(
                file_name,
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "template name must be a plain file name",
                ),
            ));
        }

        tokio::fs::read_to_string(self.dir.join(file_name))
            .await
            .map_err(|e| GatewayError::template(file_name, e))
    }
}

/// Replace every `{{key}}` in `template` with the escaped value, in a single
/// pass. Substituted values are never scanned again and unknown placeholders
/// are left as they are.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut html = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        html.push_str(&rest[..start]);
        let after = &rest[start + 2..];

        let substitution = after.find("}}").and_then(|end| {
            let key = &after[..end];
            values
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, value)| (end, *value))
        });

        match substitution {
            Some((end, value)) => {
                html.push_str(&escape_html(value));
                rest = &after[end + 2..];
            }
            None => {
                // keep one brace and rescan from the next
                html.push('{');
                rest = &rest[start + 1..];
            }
        }
    }

    html.push_str(rest);
    html
}

pub fn escape_html(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
