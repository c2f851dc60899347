//! Scatter/Gather boundary naming
//!
//! Content-hash names are derived from the flattened child names of a
//! parallel block, so the same composition always compiles to the same
//! graph. Random names reproduce the UUID-suffixed behaviour.

use serde::{Deserialize, Serialize};

/// Number of hex characters kept from the content digest
const DIGEST_LEN: usize = 16;

/// How a parallel block names its Scatter and Gather nodes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryNaming {
    /// blake3 digest of the block's flattened child names
    #[default]
    ContentHash,
    /// Fresh UUID v4 per block
    Random,
}

/// Names for one parallel block's boundary nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryNames {
    pub scatter: String,
    pub gather: String,
}

impl BoundaryNaming {
    /// Derive boundary names for a block over `child_names`
    ///
    /// Names are the in-order flattened leaf names of every child.
    pub fn boundary_names<'a, I>(&self, child_names: I) -> BoundaryNames
    where
        I: IntoIterator<Item = &'a str>,
    {
        let suffix = match self {
            BoundaryNaming::ContentHash => content_digest(child_names),
            BoundaryNaming::Random => uuid::Uuid::new_v4().to_string(),
        };
        BoundaryNames {
            scatter: format!("Scatter:{}", suffix),
            gather: format!("Gather:{}", suffix),
        }
    }
}

fn content_digest<'a, I>(child_names: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"parallel");
    for name in child_names {
        // Length prefix keeps ["ab", "c"] distinct from ["a", "bc"]
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
    }
    let hex = hasher.finalize().to_hex();
    hex.as_str()[..DIGEST_LEN].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_deterministic() {
        let a = BoundaryNaming::ContentHash.boundary_names(["A", "B"]);
        let b = BoundaryNaming::ContentHash.boundary_names(["A", "B"]);
        assert_eq!(a, b);
        assert!(a.scatter.starts_with("Scatter:"));
        assert!(a.gather.starts_with("Gather:"));
        assert_eq!(a.scatter["Scatter:".len()..], a.gather["Gather:".len()..]);
    }

    #[test]
    fn test_content_hash_depends_on_children() {
        let ab = BoundaryNaming::ContentHash.boundary_names(["A", "B"]);
        let ba = BoundaryNaming::ContentHash.boundary_names(["B", "A"]);
        let split = BoundaryNaming::ContentHash.boundary_names(["AB"]);
        assert_ne!(ab, ba);
        assert_ne!(ab, split);
    }

    #[test]
    fn test_random_names_differ() {
        let a = BoundaryNaming::Random.boundary_names(["A"]);
        let b = BoundaryNaming::Random.boundary_names(["A"]);
        assert_ne!(a.scatter, b.scatter);
    }

    #[test]
    fn test_naming_serde() {
        let naming: BoundaryNaming = serde_json::from_str("\"random\"").unwrap();
        assert_eq!(naming, BoundaryNaming::Random);
    }
}
