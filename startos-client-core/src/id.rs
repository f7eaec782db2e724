use std::{borrow::Borrow, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid id {id:?}: must be lowercase alphanumeric words separated by single dashes")]
pub struct InvalidId {
    pub id: String,
}

/// Identifier of a package, e.g. `bitcoind` or `lnd-neutrino`.
///
/// Always non-empty; made of `[a-z0-9]` runs joined by single `-`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageId(String);

impl PackageId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_valid_id(s: &str) -> bool {
    !s.is_empty()
        && s.split('-').all(|word| {
            !word.is_empty()
                && word
                    .bytes()
                    .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
        })
}

impl TryFrom<String> for PackageId {
    type Error = InvalidId;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        if is_valid_id(&s) {
            Ok(PackageId(s))
        } else {
            Err(InvalidId { id: s })
        }
    }
}
impl FromStr for PackageId {
    type Err = InvalidId;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PackageId::try_from(s.to_owned())
    }
}
impl From<PackageId> for String {
    fn from(id: PackageId) -> Self {
        id.0
    }
}
impl Display for PackageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
impl AsRef<str> for PackageId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
impl Borrow<str> for PackageId {
    fn borrow(&self) -> &str {
        &self.0
    }
}
impl PartialEq<str> for PackageId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
