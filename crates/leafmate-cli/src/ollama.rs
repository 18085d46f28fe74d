//! Ollama auto-discovery helpers.
//!
//! Pings the configured Ollama URL and, if responsive, fetches the list of
//! locally downloaded models from the `/api/tags` endpoint.

use serde::Deserialize;

/// A single model entry returned by Ollama's `/api/tags` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct OllamaModel {
    pub name: String,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<OllamaModel>,
}

/// Return the models available on the Ollama server at `base_url`.
///
/// `Err(reason)` when the server is offline or answers unexpectedly.
pub fn fetch_models(base_url: &str) -> Result<Vec<OllamaModel>, String> {
    let url = format!("{}/api/tags", base_url.trim_end_matches('/'));
    let response = reqwest::blocking::get(&url)
        .map_err(|e| format!("Ollama unreachable at {}: {}", url, e))?;

    if !response.status().is_success() {
        return Err(format!("Ollama returned HTTP {}", response.status()));
    }

    let tags: TagsResponse = response
        .json()
        .map_err(|e| format!("Failed to parse Ollama response: {}", e))?;

    Ok(tags.models)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_response_keeps_model_names() {
        let raw = r#"{"models":[{"name":"qwen2.5:7b","size":4683087332},{"name":"llama3:latest"}]}"#;
        let tags: TagsResponse = serde_json::from_str(raw).unwrap();
        let names: Vec<_> = tags.models.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["qwen2.5:7b", "llama3:latest"]);
    }

    #[test]
    fn unreachable_server_is_error() {
        assert!(fetch_models("http://127.0.0.1:9").is_err());
    }
}
