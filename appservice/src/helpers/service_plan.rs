//! Service plan SKU classification

const FREE_SKUS: &[&str] = &["F1", "FREE"];
const SHARED_SKUS: &[&str] = &["D1", "SHARED"];

/// Free and Shared plans cannot keep an app always on
pub fn is_free_or_shared(sku: &str) -> bool {
    FREE_SKUS
        .iter()
        .chain(SHARED_SKUS)
        .any(|s| s.eq_ignore_ascii_case(sku))
}

/// Elastic Premium: `EP1`, `EP2`, `EP3`
pub fn is_elastic(sku: &str) -> bool {
    sku.get(..2).is_some_and(|p| p.eq_ignore_ascii_case("EP"))
}

/// Consumption plans report `Y1` or the `Dynamic` tier
pub fn is_consumption(sku: &str) -> bool {
    sku.eq_ignore_ascii_case("Y1") || sku.eq_ignore_ascii_case("Dynamic")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_skus() {
        assert!(is_free_or_shared("F1"));
        assert!(is_free_or_shared("shared"));
        assert!(!is_free_or_shared("B1"));

        assert!(is_elastic("EP1"));
        assert!(is_elastic("ep3"));
        assert!(!is_elastic("P1v3"));
        assert!(!is_elastic("E"));

        assert!(is_consumption("Y1"));
        assert!(is_consumption("Dynamic"));
        assert!(!is_consumption("EP1"));
    }
}
