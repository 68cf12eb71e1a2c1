//! Text normalization for matching names across sources
//!
//! Unit and officer names arrive with inconsistent accents, casing and
//! punctuation ("C.A.I. Lourdes", "CAI LOURDES", "Cai Lourdés").

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Normalize a free-text name for comparison
///
/// - Unicode NFD with combining marks dropped (accent folding)
/// - Upper-case
/// - Punctuation replaced by spaces
/// - Whitespace collapsed
pub fn normalize_name(s: &str) -> String {
    let folded: String = s
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| {
            if c.is_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                ' '
            }
        })
        .collect();

    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize a unit name and drop a leading "CAI" token
///
/// "C.A.I. Lourdes" and "cai lourdes" both become "LOURDES". Dotted
/// abbreviations collapse to single letters first, so "C A I" is handled too.
pub fn normalize_unit_name(s: &str) -> String {
    let normalized = normalize_name(s);
    let tokens: Vec<&str> = normalized.split(' ').filter(|t| !t.is_empty()).collect();

    let skip = if tokens.first() == Some(&"CAI") {
        1
    } else if tokens.len() >= 3 && tokens[..3] == ["C", "A", "I"] {
        3
    } else {
        0
    };

    tokens[skip..].join(" ")
}

/// Upper-case and collapse whitespace, keeping punctuation and accents
pub fn collapse_upper(s: &str) -> String {
    s.split_whitespace()
        .map(|t| t.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accents_folded() {
        assert_eq!(normalize_name("Estación Usaquén"), "ESTACION USAQUEN");
    }

    #[test]
    fn test_punctuation_and_spaces() {
        assert_eq!(normalize_name("  c.a.i.   La-Gaitana "), "C A I LA GAITANA");
    }

    #[test]
    fn test_unit_name_drops_cai_prefix() {
        assert_eq!(normalize_unit_name("CAI Lourdes"), "LOURDES");
        assert_eq!(normalize_unit_name("C.A.I. Lourdes"), "LOURDES");
        assert_eq!(normalize_unit_name("Estación Chapinero"), "ESTACION CHAPINERO");
    }

    #[test]
    fn test_collapse_upper() {
        assert_eq!(collapse_upper("  pt.  juan   pérez "), "PT. JUAN PÉREZ");
    }
}
