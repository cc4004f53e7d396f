use std::fmt;

use serde::{Deserialize, Serialize};

/// A family/genus/species triple identifying a class of agents.
///
/// Zero components act as wildcards, so every classifier has a chain of
/// ancestors ending at `0 0 0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Classifier {
    pub family: u8,
    pub genus: u8,
    pub species: u16,
}

impl Classifier {
    pub const ROOT: Classifier = Classifier::new(0, 0, 0);

    pub const fn new(family: u8, genus: u8, species: u16) -> Self {
        Self {
            family,
            genus,
            species,
        }
    }

    /// The next classifier up the wildcard chain, or `None` for `0 0 0`.
    pub fn parent(&self) -> Option<Classifier> {
        if self.species != 0 {
            Some(Classifier::new(self.family, self.genus, 0))
        } else if self.genus != 0 {
            Some(Classifier::new(self.family, 0, 0))
        } else if self.family != 0 {
            Some(Classifier::ROOT)
        } else {
            None
        }
    }

    /// Walks from this classifier up to `0 0 0`, starting with `self`.
    pub fn ancestors(&self) -> impl Iterator<Item = Classifier> {
        std::iter::successors(Some(*self), Classifier::parent)
    }

    /// Renders the classifier as CAOS arguments (`"f g s"`).
    pub fn to_caos(&self) -> String {
        format!("{} {} {}", self.family, self.genus, self.species)
    }
}

impl fmt::Display for Classifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{} {} {}]", self.family, self.genus, self.species)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_chain() {
        let chain: Vec<_> = Classifier::new(2, 15, 1000).ancestors().collect();
        assert_eq!(
            chain,
            vec![
                Classifier::new(2, 15, 1000),
                Classifier::new(2, 15, 0),
                Classifier::new(2, 0, 0),
                Classifier::ROOT,
            ]
        );
    }

    #[test]
    fn test_partial_wildcards() {
        assert_eq!(
            Classifier::new(0, 4, 0).parent(),
            Some(Classifier::ROOT)
        );
        assert_eq!(Classifier::ROOT.parent(), None);
    }

    #[test]
    fn test_rendering() {
        let c = Classifier::new(3, 8, 42);
        assert_eq!(c.to_string(), "[3 8 42]");
        assert_eq!(c.to_caos(), "3 8 42");
    }
}
