// JSON extraction from free-form generator text

use serde::de::DeserializeOwned;

/// Result of looking for a JSON object inside generator text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonExtraction<'a> {
    /// Substring from the first `{` to the last `}`, inclusive
    Found(&'a str),
    NotFound,
}

/// Locate the candidate object between the first `{` and the last `}`.
pub fn extract_json_object(text: &str) -> JsonExtraction<'_> {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => JsonExtraction::Found(&text[start..=end]),
        _ => JsonExtraction::NotFound,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no JSON object found in response")]
    NotFound,

    #[error("invalid JSON: {0}")]
    Invalid(#[from] serde_json::Error),
}

/// Parse `text` strictly, then retry once on the extracted object.
pub fn parse_json_object<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let trimmed = text.trim();
    let direct = match serde_json::from_str(trimmed) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };

    match extract_json_object(trimmed) {
        JsonExtraction::NotFound => Err(ExtractError::NotFound),
        JsonExtraction::Found(candidate) if candidate == trimmed => Err(ExtractError::Invalid(direct)),
        JsonExtraction::Found(candidate) => {
            tracing::debug!("retrying parse on extracted JSON substring");
            serde_json::from_str(candidate).map_err(ExtractError::Invalid)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Flag {
        ok: bool,
    }

    #[test]
    fn test_extracts_between_first_and_last_brace() {
        let text = r#"noise{"a": {"b": 1}}more noise"#;
        assert_eq!(
            extract_json_object(text),
            JsonExtraction::Found(r#"{"a": {"b": 1}}"#)
        );
    }

    #[test]
    fn test_no_brace_is_not_found() {
        assert_eq!(extract_json_object("no json here"), JsonExtraction::NotFound);
        assert_eq!(extract_json_object("} backwards {"), JsonExtraction::NotFound);
        assert_eq!(extract_json_object(""), JsonExtraction::NotFound);
    }

    #[test]
    fn test_parse_plain_json() {
        let flag: Flag = parse_json_object(r#" {"ok": true} "#).unwrap();
        assert_eq!(flag, Flag { ok: true });
    }

    #[test]
    fn test_parse_fenced_json() {
        let text = "Here is the analysis:\n```json\n{\"ok\": true}\n```\nLet me know!";
        let flag: Flag = parse_json_object(text).unwrap();
        assert!(flag.ok);
    }

    #[test]
    fn test_parse_distinguishes_missing_from_invalid() {
        assert!(matches!(
            parse_json_object::<Flag>("I could not do that."),
            Err(ExtractError::NotFound)
        ));
        assert!(matches!(
            parse_json_object::<Flag>("result: {\"ok\": tru}"),
            Err(ExtractError::Invalid(_))
        ));
        assert!(matches!(
            parse_json_object::<Flag>("{\"other\": 1}"),
            Err(ExtractError::Invalid(_))
        ));
    }
}
