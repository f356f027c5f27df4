/// Cypher templates for the data-source operations.
pub mod templates {
    /// One hop around a single node, every relationship direction.
    pub const NEIGHBORS: &str = "MATCH (n)-[r]-(m) WHERE id(n) = $nodeId RETURN n, r, m LIMIT $limit";

    /// One hop around a set of frontier nodes.
    pub const FRONTIER: &str = "MATCH (n)-[r]-(m) WHERE id(n) IN $nodeIds RETURN n, r, m LIMIT $limit";

    pub const LIST_INDEXES: &str = "CALL db.indexes()";

    /// Identifiers cannot be parameterised; callers must pass validated names.
    pub fn create_index(label: &str, property: &str) -> String {
        format!("CREATE INDEX FOR (n:{label}) ON (n.{property})")
    }
}

/// Cypher identifiers the index helpers accept without quoting.
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_index_text() {
        assert_eq!(
            templates::create_index("Person", "name"),
            "CREATE INDEX FOR (n:Person) ON (n.name)"
        );
    }

    #[test]
    fn test_identifier_check() {
        assert!(is_identifier("Person"));
        assert!(is_identifier("_tag2"));
        assert!(!is_identifier("2x"));
        assert!(!is_identifier("a) DETACH DELETE (n"));
        assert!(!is_identifier(""));
    }
}
