// ✨ Pretty-Name Generator - Short display names for canonical payers
//
// "Delta Dental of Arizona (DDAZ)"     → "Delta Dental"
// "Acme Services"                      → "Acme"
// "United Concordia Companies, Inc."   → "United Concordia"
//
// Steps:
// 1. Drop parentheticals
// 2. Strip trailing corporate suffix words (repeatedly)
// 3. Keep the first two significant words, first letter upper-cased,
//    joined with a single space
//
// Only used when a payer has no operator-assigned pretty name.

/// Trailing words that carry no identity
const CORPORATE_SUFFIXES: [&str; 16] = [
    "inc",
    "incorporated",
    "corp",
    "corporation",
    "co",
    "company",
    "companies",
    "llc",
    "ltd",
    "administrators",
    "administration",
    "services",
    "service",
    "plans",
    "plan",
    "group",
];

/// Words skipped when picking the two significant words
const CONNECTORS: [&str; 6] = ["of", "the", "and", "&", "for", "-"];

/// Derive a display name from a raw payer name
///
/// Never returns an empty string for non-empty input: if the transform
/// would erase everything, the trimmed input comes back unchanged.
pub fn prettify(payer_name: &str) -> String {
    let trimmed = payer_name.trim();
    let without_parens = strip_parentheticals(trimmed);

    let mut words: Vec<&str> = without_parens.split_whitespace().collect();
    while let Some(last) = words.last() {
        if is_suffix(last) {
            words.pop();
        } else {
            break;
        }
    }

    let kept: Vec<String> = words
        .iter()
        .map(|w| w.trim_end_matches([',', '.', ';', ':']))
        .filter(|w| !w.is_empty() && !CONNECTORS.contains(&w.to_lowercase().as_str()))
        .take(2)
        .map(capitalize_first)
        .collect();

    if kept.is_empty() {
        return trimmed.to_string();
    }

    kept.join(" ")
}

/// Remove every "( ... )" segment; an unclosed "(" drops the rest
fn strip_parentheticals(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut depth = 0usize;

    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }

    out
}

fn is_suffix(word: &str) -> bool {
    let bare = word
        .trim_end_matches([',', '.', ';', ':'])
        .to_lowercase();
    CORPORATE_SUFFIXES.contains(&bare.as_str())
}

/// Upper-case the first letter, keep the rest as given ("DDAZ" stays "DDAZ")
fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================
