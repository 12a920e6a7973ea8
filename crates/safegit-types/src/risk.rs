use serde::{Deserialize, Serialize};

/// Risk level for a destructive operation.
///
/// Ordered so that `Risk::Low < Risk::Critical`; a handler may only move a
/// category's risk upward from its [`super::Category::default_risk`] floor,
/// never downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Risk {
    Low,
    Medium,
    High,
    Critical,
}

impl Risk {
    /// Escalate to at least `floor`, never below it.
    pub fn at_least(self, floor: Risk) -> Risk {
        self.max(floor)
    }
}

impl std::fmt::Display for Risk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Risk::Low => "low",
            Risk::Medium => "medium",
            Risk::High => "high",
            Risk::Critical => "critical",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_monotonic() {
        assert!(Risk::Low < Risk::Medium);
        assert!(Risk::Medium < Risk::High);
        assert!(Risk::High < Risk::Critical);
    }

    #[test]
    fn at_least_never_downgrades() {
        assert_eq!(Risk::Low.at_least(Risk::High), Risk::High);
        assert_eq!(Risk::Critical.at_least(Risk::Low), Risk::Critical);
    }
}
