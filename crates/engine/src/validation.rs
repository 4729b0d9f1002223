//! Workflow validation, run once per `start`, before any node executes.
//!
//! Two layers:
//! - structural rules over the whole node list (one `End` node, at least
//!   one trigger);
//! - per-node configuration rules, dispatched on [`NodeType`]. Labels that
//!   are not built-in types can register their own validator in a
//!   [`ValidatorRegistry`].

use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;

use nodes::{DelayUnit, NodeType};

use crate::models::Node;

/// Longest accepted `Delay` duration, in seconds.
pub const MAX_DELAY_SECONDS: f64 = 86_400.0;

const HTTP_METHODS: [&str; 5] = ["GET", "POST", "PUT", "DELETE", "PATCH"];

/// Outcome of validating a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// A pluggable per-label validator.
pub type NodeValidator = Arc<dyn Fn(&Node) -> Vec<String> + Send + Sync>;

/// Per-node validators: built-in rules for every [`NodeType`], plus a
/// registration table keyed by label. A registered label takes precedence
/// over the built-in rule for the same label.
#[derive(Clone)]
pub struct ValidatorRegistry {
    custom: HashMap<String, NodeValidator>,
    structural: bool,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self {
            custom: HashMap::new(),
            structural: true,
        }
    }
}

impl std::fmt::Debug for ValidatorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValidatorRegistry")
            .field("custom", &self.custom.keys().collect::<Vec<_>>())
            .field("structural", &self.structural)
            .finish()
    }
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Skip the structural rules; only node configurations are checked.
    /// For embedders that enforce workflow shape elsewhere.
    pub fn without_structural_rules(mut self) -> Self {
        self.structural = false;
        self
    }

    /// Register (or replace) the validator for `label`.
    pub fn register<F>(&mut self, label: impl Into<String>, validator: F)
    where
        F: Fn(&Node) -> Vec<String> + Send + Sync + 'static,
    {
        self.custom.insert(label.into(), Arc::new(validator));
    }

    /// Validate a single node's configuration.
    pub fn validate_node(&self, node: &Node) -> Vec<String> {
        if let Some(validator) = self.custom.get(&node.label) {
            return validator(node);
        }
        match node.node_type() {
            Some(node_type) => validate_builtin(node_type, node),
            None => Vec::new(),
        }
    }

    /// Structural errors first, then per-node errors in node order.
    pub fn validate_workflow(&self, nodes: &[Node]) -> ValidationReport {
        let mut errors = if self.structural {
            validate_structure(nodes)
        } else {
            Vec::new()
        };
        for node in nodes {
            errors.extend(self.validate_node(node));
        }
        ValidationReport::from_errors(errors)
    }
}

/// Validate with the built-in rules only.
pub fn validate_workflow(nodes: &[Node]) -> ValidationReport {
    ValidatorRegistry::default().validate_workflow(nodes)
}

/// Workflow-shape rules: exactly one `End` node, at least one trigger.
pub fn validate_structure(nodes: &[Node]) -> Vec<String> {
    let mut errors = Vec::new();

    let end_count = nodes
        .iter()
        .filter(|n| n.node_type() == Some(NodeType::End))
        .count();
    match end_count {
        0 => errors.push("Workflow must have an End node".to_owned()),
        1 => {}
        n => errors.push(format!("Workflow must have exactly one End node (found {n})")),
    }

    if !nodes.iter().any(Node::is_trigger) {
        errors.push("Workflow must have at least one trigger node (Manual or Webhook)".to_owned());
    }

    errors
}

// ---------------------------------------------------------------------------
// Field checks
// ---------------------------------------------------------------------------

static EMAIL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex")
});

static PHONE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("valid phone regex"));

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_REGEX.is_match(email)
}

/// `+1234567890`, `+1-234-567-8900`, `(234) 567 8900`… with at least ten digits.
pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    PHONE_REGEX.is_match(phone) && digits >= 10
}

/// Absolute URL with a scheme.
pub fn is_valid_url(raw: &str) -> bool {
    url::Url::parse(raw).is_ok()
}

/// Non-blank string field.
fn text<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.config
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

fn number(node: &Node, key: &str) -> Option<f64> {
    match node.config.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn issue(node: &Node, message: &str) -> String {
    format!("{} ({}): {}", node.label, node.id, message)
}

// ---------------------------------------------------------------------------
// Built-in node validators
// ---------------------------------------------------------------------------

fn validate_builtin(node_type: NodeType, node: &Node) -> Vec<String> {
    match node_type {
        NodeType::Email => validate_email_node(node),
        NodeType::Sms => validate_sms_node(node),
        NodeType::Http => validate_http_node(node),
        NodeType::Webhook => validate_webhook_node(node),
        NodeType::Condition => validate_condition_node(node),
        NodeType::Transform => validate_transform_node(node),
        NodeType::Delay => validate_delay_node(node),
        NodeType::Manual | NodeType::End => Vec::new(),
    }
}

fn validate_email_node(node: &Node) -> Vec<String> {
    let mut errors = Vec::new();
    if !text(node, "to").is_some_and(is_valid_email) {
        errors.push(issue(node, "Invalid or missing email address"));
    }
    if text(node, "subject").is_none() {
        errors.push(issue(node, "Subject is required"));
    }
    if text(node, "body").is_none() {
        errors.push(issue(node, "Email body is required"));
    }
    errors
}

fn validate_sms_node(node: &Node) -> Vec<String> {
    let mut errors = Vec::new();
    if !text(node, "to").is_some_and(is_valid_phone) {
        errors.push(issue(node, "Invalid or missing phone number"));
    }
    if text(node, "message").is_none() {
        errors.push(issue(node, "Message is required"));
    }
    errors
}

fn validate_http_node(node: &Node) -> Vec<String> {
    let mut errors = Vec::new();
    match text(node, "url") {
        None => errors.push(issue(node, "URL is required")),
        Some(url) if !is_valid_url(url) => errors.push(issue(node, "Invalid URL format")),
        Some(_) => {}
    }
    if let Some(method) = text(node, "method") {
        if !HTTP_METHODS.contains(&method) {
            errors.push(issue(
                node,
                &format!("Method must be one of: {}", HTTP_METHODS.join(", ")),
            ));
        }
    }
    errors
}

fn validate_webhook_node(node: &Node) -> Vec<String> {
    match text(node, "url") {
        None => vec![issue(node, "Webhook URL is required")],
        Some(url) if !is_valid_url(url) => vec![issue(node, "Invalid webhook URL format")],
        Some(_) => Vec::new(),
    }
}

fn validate_condition_node(node: &Node) -> Vec<String> {
    match text(node, "expression") {
        None => vec![issue(node, "Expression is required")],
        Some(_) => Vec::new(),
    }
}

fn validate_transform_node(node: &Node) -> Vec<String> {
    match text(node, "script") {
        None => vec![issue(node, "Script is required")],
        Some(_) => Vec::new(),
    }
}

fn validate_delay_node(node: &Node) -> Vec<String> {
    let mut errors = Vec::new();

    match number(node, "duration") {
        Some(d) if d > MAX_DELAY_SECONDS => errors.push(issue(
            node,
            "Duration cannot exceed 24 hours (86400 seconds)",
        )),
        Some(d) if d > 0.0 => {}
        _ => errors.push(issue(node, "Duration must be a positive number")),
    }

    if !text(node, "unit").is_some_and(|u| u.parse::<DelayUnit>().is_ok()) {
        errors.push(issue(
            node,
            "Time unit must be one of: seconds, minutes, hours, days",
        ));
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use nodes::NodeKind;
    use serde_json::json;

    fn valid_workflow() -> Vec<Node> {
        vec![
            Node::of_type("t", NodeType::Manual),
            Node::of_type("h", NodeType::Http).with_config(json!({ "url": "https://example.com" })),
            Node::of_type("e", NodeType::End),
        ]
    }

    #[test]
    fn valid_workflow_has_no_errors() {
        let report = validate_workflow(&valid_workflow());
        assert!(report.valid, "{:?}", report.errors);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn missing_end_and_trigger_are_structural_errors() {
        let report = validate_workflow(&[]);
        assert!(!report.valid);
        assert_eq!(
            report.errors,
            vec![
                "Workflow must have an End node".to_owned(),
                "Workflow must have at least one trigger node (Manual or Webhook)".to_owned(),
            ]
        );
    }

    #[test]
    fn two_end_nodes_are_rejected() {
        let mut nodes = valid_workflow();
        nodes.push(Node::of_type("e2", NodeType::End));
        let report = validate_workflow(&nodes);
        assert_eq!(report.errors, vec!["Workflow must have exactly one End node (found 2)"]);
    }

    #[test]
    fn email_without_recipient_is_reported_with_node_identity() {
        let email = Node::of_type("mail", NodeType::Email)
            .with_config(json!({ "subject": "Hi", "body": "Hello" }));
        assert_eq!(
            ValidatorRegistry::new().validate_node(&email),
            vec!["Email (mail): Invalid or missing email address"]
        );
    }

    #[test]
    fn sms_requires_ten_digits() {
        assert!(is_valid_phone("+1-234-567-8900"));
        assert!(is_valid_phone("(234) 567 8900"));
        assert!(!is_valid_phone("12345"));
        assert!(!is_valid_phone("call me"));
    }

    #[test]
    fn http_url_and_method_are_checked() {
        let registry = ValidatorRegistry::new();
        let bad_url = Node::of_type("h", NodeType::Http).with_config(json!({ "url": "not a url" }));
        assert_eq!(registry.validate_node(&bad_url), vec!["HTTP (h): Invalid URL format"]);

        let bad_method = Node::of_type("h", NodeType::Http)
            .with_config(json!({ "url": "https://x.io", "method": "FETCH" }));
        assert_eq!(registry.validate_node(&bad_method).len(), 1);
    }

    #[test]
    fn delay_bounds_and_units() {
        let registry = ValidatorRegistry::new();
        let ok = Node::of_type("d", NodeType::Delay);
        assert!(registry.validate_node(&ok).is_empty());

        let too_long = Node::of_type("d", NodeType::Delay)
            .with_config(json!({ "duration": 90_000, "unit": "weeks" }));
        let errors = registry.validate_node(&too_long);
        assert_eq!(errors.len(), 2);
        assert!(errors[0].contains("cannot exceed 24 hours"));
        assert!(errors[1].contains("Time unit"));

        let zero = Node::of_type("d", NodeType::Delay).with_config(json!({ "duration": 0 }));
        assert!(registry.validate_node(&zero)[0].contains("positive"));
    }

    #[test]
    fn long_labels_dispatch_to_builtin_rules() {
        let mut node = Node::new("s", NodeKind::Action, "Send SMS");
        node.config.insert("to".into(), json!("+12345678901"));
        assert_eq!(
            ValidatorRegistry::new().validate_node(&node),
            vec!["Send SMS (s): Message is required"]
        );
    }

    #[test]
    fn unknown_labels_have_no_rules_until_registered() {
        let slack = Node::new("s", NodeKind::Action, "Slack");
        let mut registry = ValidatorRegistry::new();
        assert!(registry.validate_node(&slack).is_empty());

        registry.register("Slack", |node: &Node| {
            if node.config.contains_key("channel") {
                Vec::new()
            } else {
                vec![format!("{}: channel is required", node.id)]
            }
        });
        assert_eq!(registry.validate_node(&slack), vec!["s: channel is required"]);
    }

    #[test]
    fn registered_validator_overrides_builtin() {
        let mut registry = ValidatorRegistry::new();
        registry.register("Email", |_: &Node| Vec::new());
        let email = Node::of_type("mail", NodeType::Email);
        assert!(registry.validate_node(&email).is_empty());
    }

    #[test]
    fn structural_rules_can_be_disabled() {
        let registry = ValidatorRegistry::new().without_structural_rules();
        assert!(registry.validate_workflow(&[]).valid);
    }
}
