//! Request validation. Runs before the job store is touched.

use conductor_core::{Error, Result};

use crate::registry::IntentDescriptor;

const MAX_INTENT_LEN: usize = 128;

/// Intent names are lowercase dotted identifiers.
pub fn validate_intent_name(intent: &str) -> Result<()> {
    if intent.is_empty() {
        return Err(Error::Validation("intent must not be empty".into()));
    }
    if intent.len() > MAX_INTENT_LEN {
        return Err(Error::Validation(format!(
            "intent longer than {} characters",
            MAX_INTENT_LEN
        )));
    }
    let valid = intent
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(Error::Validation(format!(
            "intent '{}' may only contain [a-z0-9._-]",
            intent
        )));
    }
    Ok(())
}

/// Inputs must be an object carrying every key the descriptor requires.
pub fn validate_inputs(inputs: &serde_json::Value, descriptor: &IntentDescriptor) -> Result<()> {
    let map = inputs
        .as_object()
        .ok_or_else(|| Error::Validation("inputs must be a JSON object".into()))?;
    let missing: Vec<&str> = descriptor
        .required_inputs
        .iter()
        .filter(|k| map.get(k.as_str()).map_or(true, |v| v.is_null()))
        .map(String::as_str)
        .collect();
    if !missing.is_empty() {
        return Err(Error::Validation(format!(
            "missing required inputs: {}",
            missing.join(", ")
        )));
    }
    Ok(())
}

pub fn validate_callback_url(url: &str) -> Result<()> {
    let parsed = reqwest::Url::parse(url)
        .map_err(|e| Error::Validation(format!("callback_url '{}': {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Validation(format!(
            "callback_url scheme '{}' is not http(s)",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_intent_names() {
        assert!(validate_intent_name("memory.write").is_ok());
        assert!(validate_intent_name("ssh.exec.peek").is_ok());
        assert!(validate_intent_name("workflow.q3-report_v2").is_ok());
        assert!(validate_intent_name("").is_err());
        assert!(validate_intent_name("Memory.Write").is_err());
        assert!(validate_intent_name("memory write").is_err());
        assert!(validate_intent_name(&"a".repeat(200)).is_err());
    }

    #[test]
    fn test_inputs_shape() {
        let descriptor = IntentDescriptor::exact("memory.write").requires(&["text"]);
        assert!(validate_inputs(&json!({"text": "X"}), &descriptor).is_ok());
        assert!(matches!(
            validate_inputs(&json!(["X"]), &descriptor),
            Err(Error::Validation(_))
        ));
        let err = validate_inputs(&json!({"text": null}), &descriptor).unwrap_err();
        assert!(err.to_string().contains("text"));
        assert!(validate_inputs(&json!({}), &IntentDescriptor::exact("digest.daily")).is_ok());
    }

    #[test]
    fn test_callback_url() {
        assert!(validate_callback_url("https://hooks.example.com/done").is_ok());
        assert!(validate_callback_url("http://127.0.0.1:9000/cb").is_ok());
        assert!(validate_callback_url("ftp://example.com/x").is_err());
        assert!(validate_callback_url("not a url").is_err());
    }
}
