use std::collections::BTreeSet;

/// Deduplicated, lexicographically sorted suggestion values for one column.
/// Empty display values are not offered.
pub fn unique_values<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    values
        .into_iter()
        .filter(|v| !v.is_empty())
        .collect::<BTreeSet<&str>>()
        .into_iter()
        .map(str::to_string)
        .collect()
}

/// Case-insensitive containment, the match rule shared by filtering and
/// suggestion checks.
pub fn matches(display: &str, filter: &str) -> bool {
    display.to_lowercase().contains(&filter.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedups_and_sorts() {
        let values = ["Dave", "Anna", "Dave", "", "Bob", "Anna"];
        assert_eq!(unique_values(values), vec!["Anna", "Bob", "Dave"]);
    }

    #[test]
    fn matching_ignores_case() {
        assert!(matches("Dave", "dav"));
        assert!(matches("COMPLETED", "comp"));
        assert!(!matches("Anna", "dave"));
        assert!(matches("anything", ""));
    }
}
