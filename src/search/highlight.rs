use regex::{Regex, RegexBuilder};

/// Wrap every case-insensitive occurrence of a query term longer than two
/// characters in `<mark>` tags, keeping the original casing of the match.
pub fn highlight<'a>(content: &str, terms: impl IntoIterator<Item = &'a str>) -> String {
    match term_pattern(terms) {
        Some(re) => re.replace_all(content, "<mark>$0</mark>").into_owned(),
        None => content.to_string(),
    }
}

/// One alternation over the distinct terms, longest first so a longer term
/// wins over its own prefix.
fn term_pattern<'a>(terms: impl IntoIterator<Item = &'a str>) -> Option<Regex> {
    let mut terms: Vec<&str> = terms.into_iter().filter(|t| t.chars().count() > 2).collect();
    if terms.is_empty() {
        return None;
    }
    terms.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
    terms.dedup();

    let alternation = terms
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
    RegexBuilder::new(&alternation)
        .case_insensitive(true)
        .build()
        .map_err(|e| tracing::warn!("highlight pattern rejected: {e}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marks_terms_case_insensitively() {
        let out = highlight("def Bubble_Sort(items):", ["sort", "items"]);
        assert_eq!(out, "def Bubble_<mark>Sort</mark>(<mark>items</mark>):");
    }

    #[test]
    fn test_short_terms_ignored() {
        assert_eq!(highlight("a in b", ["in", "a"]), "a in b");
    }

    #[test]
    fn test_longest_term_first() {
        let out = highlight("sorted sort", ["sort", "sorted"]);
        assert_eq!(out, "<mark>sorted</mark> <mark>sort</mark>");
    }

    #[test]
    fn test_regex_characters_are_literal() {
        let out = highlight("a.b(c) a+b", ["a+b"]);
        assert_eq!(out, "a.b(c) <mark>a+b</mark>");
    }
}
