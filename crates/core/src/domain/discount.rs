use serde::{Deserialize, Serialize};

use crate::cpq::pricing::DiscountRate;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiscountId(pub String);

impl std::fmt::Display for DiscountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A discount tier, loaded once per session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Discount {
    pub id: DiscountId,
    pub name: String,
    pub value: DiscountRate,
}

impl Discount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, value: DiscountRate) -> Self {
        Self { id: DiscountId(id.into()), name: name.into(), value }
    }

    /// Selector label, e.g. `25% (x0.7500)`.
    pub fn label(&self) -> String {
        format!("{} (x{:.4})", self.name, self.value.multiplier())
    }

    /// Case-insensitive match on id or display name.
    pub fn matches(&self, needle: &str) -> bool {
        let needle = needle.trim();
        self.id.0.eq_ignore_ascii_case(needle) || self.name.eq_ignore_ascii_case(needle)
    }
}
