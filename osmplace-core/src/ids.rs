//! OSM object identifiers and kinds.

/// Signed 64-bit OSM identifier. Negative values never occur in
/// well-formed data and are reserved as sentinels by callers.
pub type OsmId = i64;

/// The three kinds of OSM object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    Node,
    Way,
    Relation,
}

impl ObjectType {
    /// Single-character code used in output rows.
    pub fn as_char(self) -> char {
        match self {
            ObjectType::Node => 'N',
            ObjectType::Way => 'W',
            ObjectType::Relation => 'R',
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_chars_match_output_convention() {
        assert_eq!(ObjectType::Node.as_char(), 'N');
        assert_eq!(ObjectType::Way.as_char(), 'W');
        assert_eq!(ObjectType::Relation.as_char(), 'R');
    }
}
