//! Module content-type classification.

use serde::{Deserialize, Serialize};

/// What a course module links to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    ExternalTool,
    Assignment,
    Wiki,
    Attachment,
    ExternalUrl,
    Quiz,
    /// No known marker; carries the markers that were seen.
    Unrecognized(Vec<String>),
}

/// Marker → type, in precedence order. First match wins.
const PRECEDENCE: [(&str, ContentType); 6] = [
    ("context_external_tool", ContentType::ExternalTool),
    ("assignment", ContentType::Assignment),
    ("wiki_page", ContentType::Wiki),
    ("attachment", ContentType::Attachment),
    ("external_url", ContentType::ExternalUrl),
    ("quiz", ContentType::Quiz),
];

/// Classify a module by its marker set (the item's class list).
pub fn classify<S: AsRef<str>>(markers: &[S]) -> ContentType {
    PRECEDENCE
        .iter()
        .find(|(marker, _)| markers.iter().any(|m| m.as_ref() == *marker))
        .map(|(_, kind)| kind.clone())
        .unwrap_or_else(|| {
            ContentType::Unrecognized(markers.iter().map(|m| m.as_ref().to_string()).collect())
        })
}

/// Split a `class` attribute into markers.
pub fn markers_from_class(class_attr: &str) -> Vec<String> {
    class_attr.split_whitespace().map(str::to_string).collect()
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ExternalTool => write!(f, "external_tool"),
            Self::Assignment => write!(f, "assignment"),
            Self::Wiki => write!(f, "wiki"),
            Self::Attachment => write!(f, "attachment"),
            Self::ExternalUrl => write!(f, "external_url"),
            Self::Quiz => write!(f, "quiz"),
            Self::Unrecognized(_) => write!(f, "unrecognized"),
        }
    }
}
