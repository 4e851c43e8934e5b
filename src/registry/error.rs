//! Registry error types
//!
//! Error types for topic declarations.

/// Error type for registry operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// Topic was already declared as a subscription on this node
    DuplicateSubscription(String),
    /// Topic was already declared as a publication on this node
    DuplicatePublication(String),
}

impl RegistryError {
    /// Topic the failed declaration named
    pub fn topic(&self) -> &str {
        match self {
            RegistryError::DuplicateSubscription(topic)
            | RegistryError::DuplicatePublication(topic) => topic,
        }
    }
}

impl std::fmt::Display for RegistryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegistryError::DuplicateSubscription(topic) => {
                write!(f, "Already subscribed to topic: {}", topic)
            }
            RegistryError::DuplicatePublication(topic) => {
                write!(f, "Already advertised topic: {}", topic)
            }
        }
    }
}

impl std::error::Error for RegistryError {}
