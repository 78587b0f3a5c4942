//! Normalization helpers used at the ingest boundary and by the fuzzy
//! matcher: text folding and patent-number canonicalization.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static NUMBER_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-/\.,]+").expect("static pattern"));

/// Canonicalize a publication/priority/application number: uppercase,
/// separators stripped. "BR 11-2017/027822" and "br112017027822" compare
/// equal after this.
pub fn normalize_number(raw: &str) -> String {
    NUMBER_SEPARATORS.replace_all(raw, "").to_uppercase()
}

/// Case/diacritic/whitespace-insensitive fold for titles and names.
/// Lowercases, strips common Latin diacritics, collapses runs of
/// whitespace to a single space, trims.
pub fn fold_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last_was_space = true;
    for ch in raw.chars() {
        if ch.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
            continue;
        }
        last_was_space = false;
        for folded in fold_char(ch) {
            out.extend(folded.to_lowercase());
        }
    }
    if out.ends_with(' ') {
        out.pop();
    }
    out
}

/// Map an accented Latin character to its base letters.
fn fold_char(ch: char) -> impl Iterator<Item = char> {
    let folded: &[char] = match ch {
        'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'À' | 'Á' | 'Â' | 'Ã' | 'Ä' | 'Å' => &['a'],
        'è' | 'é' | 'ê' | 'ë' | 'È' | 'É' | 'Ê' | 'Ë' => &['e'],
        'ì' | 'í' | 'î' | 'ï' | 'Ì' | 'Í' | 'Î' | 'Ï' => &['i'],
        'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'Ò' | 'Ó' | 'Ô' | 'Õ' | 'Ö' => &['o'],
        'ù' | 'ú' | 'û' | 'ü' | 'Ù' | 'Ú' | 'Û' | 'Ü' => &['u'],
        'ç' | 'Ç' => &['c'],
        'ñ' | 'Ñ' => &['n'],
        'ý' | 'ÿ' | 'Ý' => &['y'],
        'ß' => &['s', 's'],
        'æ' | 'Æ' => &['a', 'e'],
        'œ' | 'Œ' => &['o', 'e'],
        _ => return FoldChars::Plain(Some(ch)),
    };
    FoldChars::Mapped(folded.iter().copied())
}

enum FoldChars<'a> {
    Plain(Option<char>),
    Mapped(std::iter::Copied<std::slice::Iter<'a, char>>),
}

impl Iterator for FoldChars<'_> {
    type Item = char;

    fn next(&mut self) -> Option<char> {
        match self {
            FoldChars::Plain(ch) => ch.take(),
            FoldChars::Mapped(iter) => iter.next(),
        }
    }
}

/// Jaccard similarity of two folded string sets. Empty-vs-empty is 1.0
/// (identical sets); empty-vs-nonempty is 0.0.
pub fn jaccard(a: &BTreeSet<String>, b: &BTreeSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        return 1.0;
    }
    intersection as f64 / union as f64
}

/// Fold a list of names into a comparable set.
pub fn folded_set(items: &[String]) -> BTreeSet<String> {
    items
        .iter()
        .map(|i| fold_text(i))
        .filter(|i| !i.is_empty())
        .collect()
}
