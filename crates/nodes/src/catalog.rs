//! The node palette: every step type the editor knows about.
//!
//! A node stores its type only as a display label. [`NodeType::from_label`]
//! resolves that label into the closed set below; labels outside the set
//! belong to pluggable node types and resolve to `None`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// Broad category of a step.
///
/// Defined here (in the nodes crate) so both the engine's graph model and
/// the catalogue below can use it without a circular dependency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Entry point of a workflow.
    Trigger,
    /// A step with an (external) effect.
    Action,
    /// Branching or data-shaping step.
    Logic,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Trigger => write!(f, "trigger"),
            Self::Action => write!(f, "action"),
            Self::Logic => write!(f, "logic"),
        }
    }
}

// ---------------------------------------------------------------------------
// NodeType
// ---------------------------------------------------------------------------

/// Every built-in step type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Manual,
    Webhook,
    Http,
    Email,
    Sms,
    End,
    Condition,
    Transform,
    Delay,
}

impl NodeType {
    /// All built-in types in palette order.
    pub const ALL: [NodeType; 9] = [
        NodeType::Manual,
        NodeType::Webhook,
        NodeType::Http,
        NodeType::Email,
        NodeType::Sms,
        NodeType::End,
        NodeType::Condition,
        NodeType::Transform,
        NodeType::Delay,
    ];

    /// Resolve a node label. Both the short palette label and the long
    /// form ("Send Email", "HTTP Request") are accepted.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.trim() {
            "Manual" => Some(Self::Manual),
            "Webhook" => Some(Self::Webhook),
            "HTTP" | "HTTP Request" => Some(Self::Http),
            "Email" | "Send Email" => Some(Self::Email),
            "SMS" | "Send SMS" => Some(Self::Sms),
            "End" => Some(Self::End),
            "Condition" => Some(Self::Condition),
            "Transform" => Some(Self::Transform),
            "Delay" => Some(Self::Delay),
            _ => None,
        }
    }

    /// The label a freshly created node of this type carries.
    pub fn label(self) -> &'static str {
        match self {
            Self::Manual => "Manual",
            Self::Webhook => "Webhook",
            Self::Http => "HTTP",
            Self::Email => "Email",
            Self::Sms => "SMS",
            Self::End => "End",
            Self::Condition => "Condition",
            Self::Transform => "Transform",
            Self::Delay => "Delay",
        }
    }

    pub fn kind(self) -> NodeKind {
        match self {
            Self::Manual | Self::Webhook => NodeKind::Trigger,
            Self::Http | Self::Email | Self::Sms | Self::End => NodeKind::Action,
            Self::Condition | Self::Transform | Self::Delay => NodeKind::Logic,
        }
    }

    pub fn icon(self) -> &'static str {
        match self {
            Self::Manual => "⚡",
            Self::Webhook => "🔗",
            Self::Http => "🌐",
            Self::Email => "✉️",
            Self::Sms => "💬",
            Self::End => "🏁",
            Self::Condition => "🔀",
            Self::Transform => "⚙️",
            Self::Delay => "⏰",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Manual => "Manually trigger the workflow",
            Self::Webhook => "Trigger workflow via HTTP webhook",
            Self::Http => "HTTP Request",
            Self::Email => "Send an email",
            Self::Sms => "Send an SMS",
            Self::End => "Terminate the workflow",
            Self::Condition => "Conditional branching logic",
            Self::Transform => "Transform data with a script",
            Self::Delay => "Wait for a specified amount of time",
        }
    }

    /// Configuration a new node of this type starts with.
    pub fn default_config(self) -> Map<String, Value> {
        let value = match self {
            Self::Manual | Self::End => json!({}),
            Self::Webhook => json!({ "url": "", "method": "POST" }),
            Self::Http => json!({ "url": "", "method": "GET", "headers": "{}", "body": "" }),
            Self::Email => json!({ "to": "", "subject": "", "body": "" }),
            Self::Sms => json!({ "to": "", "message": "" }),
            Self::Condition => {
                json!({ "expression": "", "trueLabel": "True", "falseLabel": "False" })
            }
            Self::Transform => json!({ "script": "" }),
            Self::Delay => json!({ "duration": 1, "unit": "seconds" }),
        };
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// ---------------------------------------------------------------------------
// DelayUnit
// ---------------------------------------------------------------------------

/// Time unit accepted by the `Delay` node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DelayUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
}

impl DelayUnit {
    pub fn seconds(self) -> u64 {
        match self {
            Self::Seconds => 1,
            Self::Minutes => 60,
            Self::Hours => 3_600,
            Self::Days => 86_400,
        }
    }

    /// Convert `duration` of this unit into seconds.
    pub fn to_seconds(self, duration: f64) -> f64 {
        duration * self.seconds() as f64
    }

    /// Human form, singular for a duration of exactly one ("1 minute").
    pub fn format(self, duration: f64) -> String {
        let unit = self.to_string();
        if duration == 1.0 {
            format!("1 {}", unit.trim_end_matches('s'))
        } else {
            format!("{duration} {unit}")
        }
    }
}

impl fmt::Display for DelayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds => write!(f, "seconds"),
            Self::Minutes => write!(f, "minutes"),
            Self::Hours => write!(f, "hours"),
            Self::Days => write!(f, "days"),
        }
    }
}

impl FromStr for DelayUnit {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seconds" => Ok(Self::Seconds),
            "minutes" => Ok(Self::Minutes),
            "hours" => Ok(Self::Hours),
            "days" => Ok(Self::Days),
            other => Err(format!("unknown delay unit: {other}")),
        }
    }
}
