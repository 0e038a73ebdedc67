//! Name-based probing policy.

/// Fleet tags probed when no policy is configured.
pub const DEFAULT_PREFIXES: [&str; 2] = ["DP", "CDN77"];

/// Decides from a server's name whether it may be probed.
///
/// Servers whose name starts with one of the configured prefixes are
/// eligible. An empty prefix list admits every server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Eligibility {
    prefixes: Vec<String>,
}

impl Eligibility {
    pub fn new<I, S>(prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(Into::into)
                .filter(|p: &String| !p.is_empty())
                .collect(),
        }
    }

    /// Policy that admits every server.
    pub fn allow_all() -> Self {
        Self {
            prefixes: Vec::new(),
        }
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    pub fn is_eligible(&self, name: &str) -> bool {
        self.prefixes.is_empty() || self.prefixes.iter().any(|p| name.starts_with(p.as_str()))
    }
}

impl Default for Eligibility {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIXES)
    }
}
