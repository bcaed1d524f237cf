// ABOUTME: Defines the ToolResult type - the outcome of a local capability
// ABOUTME: execution, carrying content and an error flag.

/// Result of a tool execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolResult {
    /// The output content.
    pub content: String,

    /// Whether this result represents an error the tool reported itself.
    pub is_error: bool,
}

impl ToolResult {
    /// Create a successful text result.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            is_error: false,
        }
    }

    /// Create an error result.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            content: message.into(),
            is_error: true,
        }
    }
}

impl Default for ToolResult {
    fn default() -> Self {
        Self::text("")
    }
}

/// Text handed back to the model. Tool-reported errors read `Error: ...`,
/// the same as remote ones.
impl From<ToolResult> for String {
    fn from(result: ToolResult) -> Self {
        if result.is_error && !result.content.starts_with("Error:") {
            format!("Error: {}", result.content)
        } else {
            result.content
        }
    }
}
