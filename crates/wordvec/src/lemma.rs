//! Rule-based inflection folding.
//!
//! Produces candidate base forms for an English surface word, ordered from
//! most to least likely. The caller keeps the first candidate it has a vector
//! for; a word with no usable candidate is its own family.

/// Irregular forms the suffix rules cannot reach.
const IRREGULAR: &[(&str, &str)] = &[
    ("been", "be"),
    ("best", "good"),
    ("better", "good"),
    ("children", "child"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("gone", "go"),
    ("men", "man"),
    ("mice", "mouse"),
    ("people", "person"),
    ("ran", "run"),
    ("teeth", "tooth"),
    ("was", "be"),
    ("went", "go"),
    ("were", "be"),
    ("women", "woman"),
    ("worse", "bad"),
    ("worst", "bad"),
];

fn is_vowel(c: u8) -> bool {
    matches!(c, b'a' | b'e' | b'i' | b'o' | b'u')
}

/// Candidate base forms for `word`, best first. The input is expected to be
/// lowercase ASCII; anything else folds to itself.
pub fn candidates(word: &str) -> Vec<String> {
    let mut out = Vec::new();

    if let Some((_, base)) = IRREGULAR.iter().find(|(w, _)| *w == word) {
        out.push((*base).to_string());
        return out;
    }

    let b = word.as_bytes();
    let n = b.len();

    // Plurals.
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            out.push(format!("{stem}y"));
        }
    }
    if let Some(stem) = word.strip_suffix("es") {
        if stem.len() >= 2 {
            out.push(stem.to_string());
        }
    }
    if n >= 3 && b[n - 1] == b's' && b[n - 2] != b's' && b[n - 2] != b'u' && b[n - 2] != b'i' {
        out.push(word[..n - 1].to_string());
    }

    // Progressive: running -> run, making -> make, walking -> walk.
    if let Some(stem) = word.strip_suffix("ing") {
        if stem.len() >= 2 {
            let sb = stem.as_bytes();
            if sb.len() >= 3 && sb[sb.len() - 1] == sb[sb.len() - 2] && !is_vowel(sb[sb.len() - 1])
            {
                out.push(stem[..stem.len() - 1].to_string());
            }
            out.push(stem.to_string());
            out.push(format!("{stem}e"));
        }
    }

    // Past: tried -> try, stopped -> stop, loved -> love, walked -> walk.
    if let Some(stem) = word.strip_suffix("ied") {
        if !stem.is_empty() {
            out.push(format!("{stem}y"));
        }
    }
    if let Some(stem) = word.strip_suffix("ed") {
        if stem.len() >= 2 {
            let sb = stem.as_bytes();
            if sb.len() >= 3 && sb[sb.len() - 1] == sb[sb.len() - 2] && !is_vowel(sb[sb.len() - 1])
            {
                out.push(stem[..stem.len() - 1].to_string());
            }
            out.push(stem.to_string());
            out.push(format!("{stem}e"));
        }
    }

    out.retain(|c| c.len() >= 2 && c != word);
    out.dedup();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folds_regular_plurals() {
        assert!(candidates("cats").contains(&"cat".to_string()));
        assert!(candidates("boxes").contains(&"box".to_string()));
        assert!(candidates("stories").contains(&"story".to_string()));
    }

    #[test]
    fn folds_verbal_inflections() {
        assert!(candidates("running").contains(&"run".to_string()));
        assert!(candidates("making").contains(&"make".to_string()));
        assert!(candidates("walked").contains(&"walk".to_string()));
        assert!(candidates("stopped").contains(&"stop".to_string()));
        assert!(candidates("loved").contains(&"love".to_string()));
        assert!(candidates("tried").contains(&"try".to_string()));
    }

    #[test]
    fn folds_irregulars_first() {
        assert_eq!(candidates("mice"), vec!["mouse".to_string()]);
        assert_eq!(candidates("went"), vec!["go".to_string()]);
    }

    #[test]
    fn leaves_short_and_base_forms_alone() {
        assert!(candidates("cat").is_empty());
        assert!(candidates("is").is_empty());
        // "ss" endings are not plurals.
        assert!(!candidates("glass").contains(&"glas".to_string()));
    }
}
