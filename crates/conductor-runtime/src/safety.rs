//! Safety gate for intents classed as dangerous.

use serde_json::json;
use tracing::warn;

use conductor_core::SafetyClass;

use crate::registry::IntentDescriptor;

/// Input key that must be `true` for a dangerous intent to execute.
pub const CONFIRM_FLAG: &str = "confirm_dangerous";

#[derive(Debug, Clone, PartialEq)]
pub enum GateDecision {
    Proceed,
    /// Do not execute; answer with this dry-run payload instead.
    Preview(serde_json::Value),
}

pub struct SafetyGate;

impl SafetyGate {
    pub fn check(
        intent: &str,
        descriptor: &IntentDescriptor,
        inputs: &serde_json::Value,
    ) -> GateDecision {
        if descriptor.safety != SafetyClass::Dangerous || Self::is_confirmed(inputs) {
            return GateDecision::Proceed;
        }
        warn!("Blocking dangerous operation intent={} (no {})", intent, CONFIRM_FLAG);

        let mut preview = json!({
            "dry_run": true,
            "intent": intent,
            "would_execute": inputs,
            "note": format!("Set {}=true to execute", CONFIRM_FLAG),
        });
        if let Some(hint) = &descriptor.preview_hint {
            preview["hint"] = json!(hint);
        }
        GateDecision::Preview(preview)
    }

    /// Only a literal boolean `true` confirms.
    pub fn is_confirmed(inputs: &serde_json::Value) -> bool {
        inputs.get(CONFIRM_FLAG).and_then(|v| v.as_bool()) == Some(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ssh_exec() -> IntentDescriptor {
        IntentDescriptor::exact("ssh.exec")
            .dangerous()
            .hint("Use ssh.exec.peek for read-only operations")
    }

    #[test]
    fn test_dangerous_without_flag_previews() {
        let inputs = json!({"command": "rm -rf /"});
        match SafetyGate::check("ssh.exec", &ssh_exec(), &inputs) {
            GateDecision::Preview(preview) => {
                assert_eq!(preview["dry_run"], true);
                assert_eq!(preview["would_execute"]["command"], "rm -rf /");
                assert_eq!(preview["intent"], "ssh.exec");
                assert!(preview["hint"].as_str().unwrap().contains("peek"));
            }
            GateDecision::Proceed => panic!("expected preview"),
        }
    }

    #[test]
    fn test_flag_must_be_true() {
        let descriptor = ssh_exec();
        for inputs in [
            json!({"command": "ls", "confirm_dangerous": false}),
            json!({"command": "ls", "confirm_dangerous": "true"}),
            json!({"command": "ls", "confirm_dangerous": 1}),
        ] {
            assert!(matches!(
                SafetyGate::check("ssh.exec", &descriptor, &inputs),
                GateDecision::Preview(_)
            ));
        }
        let confirmed = json!({"command": "ls", "confirm_dangerous": true});
        assert_eq!(
            SafetyGate::check("ssh.exec", &descriptor, &confirmed),
            GateDecision::Proceed
        );
    }

    #[test]
    fn test_safe_intent_proceeds() {
        let descriptor = IntentDescriptor::exact("memory.write");
        assert_eq!(
            SafetyGate::check("memory.write", &descriptor, &json!({"text": "X"})),
            GateDecision::Proceed
        );
    }
}
