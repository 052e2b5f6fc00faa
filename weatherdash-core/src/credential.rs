use std::fmt;

/// Provider API key.
///
/// Passed explicitly into every fetch. `Debug` never prints the value, so a
/// credential can sit inside structs that get logged.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The raw key, for building the outbound request only.
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

impl From<String> for Credential {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for Credential {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let cred = Credential::new("s3cr3t-key");
        let printed = format!("{cred:?}");
        assert!(!printed.contains("s3cr3t-key"));
        assert_eq!(printed, "Credential(***)");
    }

    #[test]
    fn blank_credential_is_empty() {
        assert!(Credential::new("   ").is_empty());
        assert!(!Credential::new("abc").is_empty());
    }
}
