use anyhow::{bail, ensure};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// The categories a fresh installation starts with.
pub const DEFAULT_CATEGORIES: &[&str] = &[
    "🍔 Food & Dining",
    "🚗 Transportation",
    "🛒 Shopping",
    "🏠 Bills & Utilities",
    "🎬 Entertainment",
    "🏥 Healthcare",
    "📚 Education",
    "💼 Business",
    "👕 Clothing",
    "🎁 Gifts",
    "🏖️ Travel",
    "💳 Banking",
    "🔧 Maintenance",
    "📱 Technology",
    "🏃 Fitness",
    "🎨 Hobbies",
    "📰 Subscriptions",
    "🔄 Other",
];

/// An ordered set of category names. Insertion order is preserved and names are unique by exact
/// string comparison, emoji prefix included.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Categories(Vec<String>);

impl Default for Categories {
    fn default() -> Self {
        Self(DEFAULT_CATEGORIES.iter().map(|s| s.to_string()).collect())
    }
}

impl Categories {
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Builds a set from `names`, dropping duplicates and blank entries while keeping the first
    /// occurrence's position. Names that could not be written back are dropped with a warning.
    pub fn from_names<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut categories = Self::empty();
        for name in names {
            let name = name.into();
            if name.trim().is_empty() {
                continue;
            }
            if let Err(e) = categories.insert(&name) {
                warn!("Dropping category: {e}");
            }
        }
        categories
    }

    /// Like `from_names` but fails on the first name that cannot be stored.
    pub fn try_from_names<S: Into<String>>(
        names: impl IntoIterator<Item = S>,
    ) -> anyhow::Result<Self> {
        let mut categories = Self::empty();
        for name in names {
            let name = name.into();
            if name.trim().is_empty() {
                continue;
            }
            categories.insert(&name)?;
        }
        Ok(categories)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|c| c == name)
    }

    /// Appends `name` if it is not already present. Returns `false` when it was present.
    pub fn insert(&mut self, name: &str) -> anyhow::Result<bool> {
        let name = validate_name(name)?;
        if self.contains(name) {
            return Ok(false);
        }
        self.0.push(name.to_string());
        Ok(true)
    }

    /// Removes `name`. Returns `false` when it was not present.
    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.0.len();
        self.0.retain(|c| c != name);
        self.0.len() != before
    }

    /// Appends every name from `other` that is not already present.
    pub fn merge(&mut self, other: &Categories) -> usize {
        let mut added = 0;
        for name in other.iter() {
            if !self.contains(name) {
                self.0.push(name.clone());
                added += 1;
            }
        }
        added
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }
}

impl<S: Into<String>> FromIterator<S> for Categories {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self::from_names(iter)
    }
}

/// Category names are stored in a `;`-separated CSV metadata line, so they cannot contain `;` or
/// line breaks.
fn validate_name(name: &str) -> anyhow::Result<&str> {
    let name = name.trim();
    ensure!(!name.is_empty(), "A category name cannot be empty");
    if name.contains(';') || name.contains('\n') || name.contains('\r') {
        bail!("The category name '{name}' cannot contain ';' or line breaks");
    }
    Ok(name)
}
