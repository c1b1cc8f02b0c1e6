use uuid::Uuid;

/// Mint a client-side identifier for a connection, statement, or cursor.
///
/// The leading underscore keeps the id usable where the driver expects an
/// identifier-shaped token (cursor and statement names in ESQL).
pub(crate) fn mint() -> String {
    format!("_{}", Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::mint;

    #[test]
    fn minted_ids_are_unique_and_identifier_shaped() {
        let a = mint();
        let b = mint();
        assert_ne!(a, b);
        assert!(a.starts_with('_'));
        assert!(!a.contains('-'));
    }
}
