// Black/White List Filtering
// Ordered prefix pattern matching over resource names, last match wins

/// Apply an ordered black/white pattern list to `items`.
///
/// Patterns match by prefix; a leading `-` marks a black pattern. For
/// each item the LAST matching pattern decides. When the filter
/// contains at least one white pattern, items matching no pattern are
/// dropped; a black-only filter passes unmatched items through. Input
/// order is preserved.
pub fn filter_black_white(patterns: &[String], items: &[String]) -> Vec<String> {
    if patterns.is_empty() {
        return items.to_vec();
    }
    let has_white = patterns.iter().any(|p| !p.starts_with('-'));
    items
        .iter()
        .filter(|item| {
            let mut verdict = !has_white;
            for pattern in patterns {
                match pattern.strip_prefix('-') {
                    Some(black) => {
                        if item.starts_with(black) {
                            verdict = false;
                        }
                    }
                    None => {
                        if item.starts_with(pattern.as_str()) {
                            verdict = true;
                        }
                    }
                }
            }
            verdict
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_last_match_wins() {
        let items = strings(&["T2_US_MIT", "T1_DE_KIT_MSS", "T1_US_FNAL"]);
        let filter = strings(&["T1", "-T1_DE_KIT"]);
        assert_eq!(filter_black_white(&filter, &items), strings(&["T1_US_FNAL"]));
    }

    #[test]
    fn test_empty_filter_passes_everything() {
        let items = strings(&["a", "b", "c"]);
        assert_eq!(filter_black_white(&[], &items), items);
    }

    #[test]
    fn test_black_only_keeps_unmatched() {
        let items = strings(&["T1_DE_KIT", "T2_US_MIT"]);
        let filter = strings(&["-T1"]);
        assert_eq!(filter_black_white(&filter, &items), strings(&["T2_US_MIT"]));
    }

    #[test]
    fn test_white_reinstates_after_black() {
        let items = strings(&["T1_DE_KIT", "T1_DE_AAA"]);
        let filter = strings(&["-T1_DE", "T1_DE_KIT"]);
        assert_eq!(filter_black_white(&filter, &items), strings(&["T1_DE_KIT"]));
    }
}
