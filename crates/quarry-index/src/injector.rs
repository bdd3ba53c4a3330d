//! Failure boundary between retrieval and the conversation loop.
//!
//! Whatever goes wrong underneath (backend down, root never indexed,
//! store error) the injector returns an empty string and the
//! conversation proceeds without code context.

use quarry_embed::Embedder;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::retriever::{Retriever, SearchHit};

/// Author of a conversation message. Only [`Role::User`] messages
/// trigger retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Enriches user messages with retrieved code context.
pub struct ContextInjector<E: Embedder> {
    retriever: Retriever<E>,
    max_results: u64,
}

impl<E: Embedder> ContextInjector<E> {
    #[must_use]
    pub fn new(retriever: Retriever<E>, max_results: u64) -> Self {
        Self {
            retriever,
            max_results,
        }
    }

    /// Retrieve context for `message` and format it for injection.
    ///
    /// Returns an empty string for non-user messages, blank messages,
    /// an unindexed root, no hits, or any retrieval failure.
    pub async fn inject(&self, author: Role, message: &str) -> String {
        if author != Role::User || message.trim().is_empty() {
            return String::new();
        }

        match self.retriever.is_indexed().await {
            Ok(true) => {}
            Ok(false) => return String::new(),
            Err(e) => {
                debug!(error = %e, "skipping context injection");
                return String::new();
            }
        }

        let hits = match self.retriever.search(message, self.max_results).await {
            Ok(hits) => hits,
            Err(e) => {
                debug!(error = %e, "skipping context injection");
                return String::new();
            }
        };
        if hits.is_empty() {
            return String::new();
        }

        format_context(&hits)
    }
}

/// Render hits as a `<code_context>` block for the model prompt.
fn format_context(hits: &[SearchHit]) -> String {
    let mut out = String::from("<code_context>\n");
    for hit in hits {
        let file = attr_escape(&hit.file_path);
        let score = hit.score;
        out.push_str(&format!("  <chunk file=\"{file}\" score=\"{score:.3}\">\n"));
        out.push_str(&hit.content);
        if !hit.content.ends_with('\n') {
            out.push('\n');
        }
        out.push_str("  </chunk>\n");
    }
    out.push_str("</code_context>");
    out
}

fn attr_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(path: &str, content: &str, score: f32) -> SearchHit {
        SearchHit {
            file_path: path.into(),
            content: content.into(),
            score,
        }
    }

    #[test]
    fn format_wraps_hits_in_code_context() {
        let rendered = format_context(&[
            hit("src/config.py", "safe_mode = 'off'", 0.91),
            hit("src/cli.py", "parser.add_argument('--safe')", 0.72),
        ]);

        assert!(rendered.starts_with("<code_context>\n"));
        assert!(rendered.ends_with("</code_context>"));
        assert!(rendered.contains("<chunk file=\"src/config.py\" score=\"0.910\">"));
        assert!(rendered.contains("safe_mode = 'off'"));
        assert!(rendered.contains("<chunk file=\"src/cli.py\" score=\"0.720\">"));
    }

    #[test]
    fn format_escapes_attribute_values() {
        let rendered = format_context(&[hit("a\"b<c&d.rs", "text", 0.5)]);
        assert!(rendered.contains("file=\"a&quot;b&lt;c&amp;d.rs\""));
    }

    #[test]
    fn format_keeps_one_trailing_newline_per_chunk() {
        let rendered = format_context(&[hit("a.rs", "line\n", 0.5)]);
        assert!(rendered.contains("line\n  </chunk>"));
        assert!(!rendered.contains("line\n\n"));
    }

    #[test]
    fn role_serde_is_lowercase() {
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
        let role: Role = serde_json::from_str("\"assistant\"").unwrap();
        assert_eq!(role, Role::Assistant);
    }
}
