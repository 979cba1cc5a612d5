/// Errors produced by the schema registry, the graph converter, and the
/// workflow builder.
///
/// The `Display` output is a short reason meant for direct display.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CoreError {
    #[error("{reason}")]
    NotFound {
        reason: String,
        node_id: Option<String>,
    },

    #[error("{reason}")]
    MalformedInput {
        reason: String,
        node_id: Option<String>,
    },

    #[error("{0}")]
    AmbiguousFormat(String),
}

impl CoreError {
    /// Something (a file, a document, a class) could not be found.
    pub fn not_found(reason: impl Into<String>) -> Self {
        Self::NotFound {
            reason: reason.into(),
            node_id: None,
        }
    }

    /// A node references a class the registry does not know.
    pub fn unknown_class(node_id: impl Into<String>, class_type: &str) -> Self {
        Self::NotFound {
            reason: format!("Unknown node type: {class_type}"),
            node_id: Some(node_id.into()),
        }
    }

    /// Malformed input not attributable to a single node.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
            node_id: None,
        }
    }

    /// Malformed input caused by a specific node.
    pub fn malformed_node(node_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedInput {
            reason: reason.into(),
            node_id: Some(node_id.into()),
        }
    }

    /// The offending node id, when the error is tied to one.
    pub fn node_id(&self) -> Option<&str> {
        match self {
            Self::NotFound { node_id, .. } | Self::MalformedInput { node_id, .. } => {
                node_id.as_deref()
            }
            Self::AmbiguousFormat(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_node_carries_id() {
        let err = CoreError::malformed_node("7", "Node 7 missing 'inputs'");
        assert_eq!(err.node_id(), Some("7"));
        assert_eq!(err.to_string(), "Node 7 missing 'inputs'");
    }

    #[test]
    fn unknown_class_names_the_class() {
        let err = CoreError::unknown_class("3", "DoesNotExist");
        assert_eq!(err.node_id(), Some("3"));
        assert_eq!(err.to_string(), "Unknown node type: DoesNotExist");
    }

    #[test]
    fn plain_not_found_has_no_node_id() {
        let err = CoreError::not_found("Registry cache file not found");
        assert!(err.node_id().is_none());
    }
}
