use std::collections::HashSet;

/// Delimiters used when no configuration is supplied: newline, carriage
/// return, tab, space, comma and semicolon.
pub const DEFAULT_DELIMITERS: &str = "\n\r\t ,;";

/// Turn pasted text into a deduplicated list of lowercase candidate addresses,
/// splitting on the default delimiters.
pub fn normalize(raw_text: &str) -> Vec<String> {
    normalize_with(raw_text, DEFAULT_DELIMITERS)
}

/// Same as `normalize`, but splitting on any character in `delimiters`.
/// Newline and comma always split, whatever the set contains.
///
/// Candidates are trimmed and lowercased; empty candidates and candidates
/// without an `@` are dropped. The first occurrence of an address decides its
/// position in the output.
pub fn normalize_with(raw_text: &str, delimiters: &str) -> Vec<String> {
    let is_delimiter = |c: char| c == '\n' || c == ',' || delimiters.contains(c);

    let mut seen: HashSet<String> = HashSet::new();
    let mut addresses: Vec<String> = Vec::new();

    for candidate in raw_text.split(is_delimiter) {
        let candidate = candidate.trim().to_lowercase();
        if candidate.is_empty() || !candidate.contains('@') {
            continue;
        }
        if seen.insert(candidate.clone()) {
            addresses.push(candidate);
        }
    }

    addresses
}

/// Render a normalized list back into pasteable text, one address per line.
pub fn as_text(addresses: &[String]) -> String {
    addresses.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserves_first_occurrence() {
        assert_eq!(
            normalize("A@x.com, b@y.com\nA@x.com"),
            vec!["a@x.com".to_owned(), "b@y.com".to_owned()]
        );
    }

    #[test]
    fn test_drops_junk() {
        let out = normalize("  ;; not-an-address,\n\n  C@Z.org ; d@z.org\t e@z.org  ");
        assert_eq!(out, vec!["c@z.org", "d@z.org", "e@z.org"]);
    }

    #[test]
    fn test_empty_and_whitespace() {
        assert!(normalize("").is_empty());
        assert!(normalize("   \n\t  , ;").is_empty());
    }

    #[test]
    fn test_custom_delimiters_keep_newline_and_comma() {
        // Only '|' configured, but newline and comma still split
        let out = normalize_with("a@x.com|b@x.com\nc@x.com,d@x.com e@x.com", "|");
        assert_eq!(out, vec!["a@x.com", "b@x.com", "c@x.com", "d@x.com e@x.com"]);
    }

    #[test]
    fn test_output_properties() {
        let inputs = [
            "Alice@Example.com;bob@example.com;ALICE@example.com",
            "\r\n x@y \r\n X@Y \r\n @ \r\n",
            "one@a.b,two@a.b,,three,four@a.b;one@a.b",
        ];
        for input in inputs.iter() {
            let out = normalize(input);
            let mut seen = HashSet::new();
            for addr in &out {
                assert_eq!(addr, &addr.to_lowercase());
                assert_eq!(addr, addr.trim());
                assert!(addr.contains('@'));
                assert!(seen.insert(addr.clone()));
            }
        }
    }

    #[test]
    fn test_idempotent() {
        let text = "Z@q.io, y@q.io\n\nz@Q.io;  x@q.io";
        let once = normalize(text);
        let twice = normalize(&as_text(&once));
        assert_eq!(once, twice);
    }
}
