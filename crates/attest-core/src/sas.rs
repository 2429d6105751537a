//! Short-authentication-string comparison data.
//!
//! These types carry material the engine derives from the key agreement.
//! Both sides display it and the users compare out of band; the engine is
//! the authority on its contents.

use serde::{Deserialize, Serialize};

/// One emoji of the short-authentication-string comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SasEmoji {
    /// The emoji symbol itself.
    pub symbol: String,
    /// Language-neutral name of the symbol; localized downstream.
    pub description: String,
}

/// Comparison material carried by a SAS challenge.
///
/// At least one form is present; which ones depends on what the two
/// engines negotiated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SasComparison {
    /// Seven-emoji form.
    pub emojis: Option<Vec<SasEmoji>>,
    /// Three-number decimal form.
    pub decimals: Option<[u16; 3]>,
}

impl SasComparison {
    /// Comparison with only the emoji form.
    pub fn from_emojis(emojis: Vec<SasEmoji>) -> Self {
        Self { emojis: Some(emojis), decimals: None }
    }

    /// Comparison with only the decimal form.
    pub fn from_decimals(decimals: [u16; 3]) -> Self {
        Self { emojis: None, decimals: Some(decimals) }
    }
}
