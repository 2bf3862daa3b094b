use std::future::ready;

use ratchet_core::tool::{Tool, ToolResult};
use schemars::{JsonSchema, schema_for};
use serde::Deserialize;
use serde_json::Value;

/// The built-in corpus searched by [`SearchTool`]. Each entry pairs the
/// keywords it matches on with the snippet it returns.
const CORPUS: &[(&[&str], &str)] = &[
    (
        &["rust", "language"],
        "Rust is a systems programming language focused on safety, \
speed, and concurrency, first released in 2015.",
    ),
    (
        &["tokio", "async", "runtime"],
        "Tokio is an asynchronous runtime for Rust providing I/O, \
timers, and a multi-threaded scheduler.",
    ),
    (
        &["paris", "france", "capital"],
        "Paris is the capital of France, with a population of about \
2.1 million in the city proper.",
    ),
    (
        &["everest", "mountain", "tallest"],
        "Mount Everest is Earth's highest mountain above sea level, at \
8,849 meters.",
    ),
    (
        &["light", "speed"],
        "The speed of light in vacuum is exactly 299,792,458 meters \
per second.",
    ),
];

#[derive(Deserialize, JsonSchema)]
pub struct SearchParameters {
    #[schemars(description = "Keywords to search for.")]
    query: String,
}

/// A tool that searches a small built-in knowledge corpus.
///
/// This is an offline stand-in for a real search integration: it keeps
/// demos self-contained and deterministic.
pub struct SearchTool {
    parameter_schema: Value,
}

impl SearchTool {
    /// Creates a new search tool.
    #[inline]
    pub fn new() -> Self {
        SearchTool {
            parameter_schema: schema_for!(SearchParameters).to_value(),
        }
    }
}

impl Default for SearchTool {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Tool for SearchTool {
    type Input = SearchParameters;

    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Searches a small knowledge base and returns the best-matching \
snippet."
    }

    fn parameter_schema(&self) -> &Value {
        &self.parameter_schema
    }

    fn side_effect_free(&self) -> bool {
        true
    }

    fn execute(
        &self,
        input: SearchParameters,
    ) -> impl Future<Output = ToolResult> + Send + 'static {
        ready(Ok(search(&input.query)))
    }
}

fn search(query: &str) -> String {
    let query = query.to_lowercase();
    let terms: Vec<&str> = query.split_whitespace().collect();

    let best = CORPUS
        .iter()
        .map(|(keywords, snippet)| {
            let score = terms
                .iter()
                .filter(|term| keywords.contains(term))
                .count();
            (score, *snippet)
        })
        .max_by_key(|(score, _)| *score);

    match best {
        Some((score, snippet)) if score > 0 => snippet.to_owned(),
        _ => format!("No results found for `{query}`."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_keywords() {
        assert!(search("capital of France").contains("Paris"));
        assert!(search("SPEED of light").contains("299,792,458"));
        assert!(search("tokio runtime").contains("asynchronous"));
    }

    #[test]
    fn test_no_match() {
        assert!(search("quantum chromodynamics").starts_with("No results"));
    }
}
