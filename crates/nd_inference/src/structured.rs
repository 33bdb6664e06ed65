use nd_core::{Error, Result};
use serde::de::DeserializeOwned;
use serde_json::Value;

/// A response the model must return as a JSON object.
pub trait StructuredOutput: DeserializeOwned {
    const NAME: &'static str;

    /// JSON schema sent to the model alongside the prompt.
    fn schema() -> Value;

    /// Semantic checks run after parsing.
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // drop the info string (```json)
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

fn outer_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    (end > start).then(|| &raw[start..=end])
}

/// Parses a structured completion, repairing code fences and surrounding
/// prose before giving up.
pub fn parse_structured<T: StructuredOutput>(raw: &str) -> Result<T> {
    let candidates = [Some(raw.trim()), Some(strip_fences(raw)), outer_object(raw)];
    let mut last_error = None;
    for candidate in candidates.into_iter().flatten() {
        match serde_json::from_str::<T>(candidate) {
            Ok(parsed) => {
                parsed.check()?;
                return Ok(parsed);
            }
            Err(e) => last_error = Some(e),
        }
    }
    Err(Error::Inference(format!(
        "{} response is not valid JSON: {}",
        T::NAME,
        last_error.map(|e| e.to_string()).unwrap_or_default()
    )))
}
