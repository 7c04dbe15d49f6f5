use regex::Regex;
use std::sync::LazyLock;

use crate::resource::ResourceType;

// Indexed by discriminant; `ResourceType::ALL` is declared in variant order.
static PATTERNS: LazyLock<[Regex; 6]> = LazyLock::new(|| {
    ResourceType::ALL
        .map(|t| Regex::new(&format!(r"^{}/[A-Za-z0-9]{{24}}$", t.as_str())).unwrap())
});

/// Returns true iff `candidate` is present, non-empty and fully matches `pattern`.
///
/// `pattern` need not be anchored; it is wrapped in `^(?:...)$` so that
/// alternations and lazy quantifiers are judged on the whole candidate.
pub fn validate(candidate: Option<&str>, pattern: &Regex) -> bool {
    match candidate {
        Some(id) if !id.is_empty() => {
            Regex::new(&format!("^(?:{})$", pattern.as_str())).is_ok_and(|full| full.is_match(id))
        }
        _ => false,
    }
}

impl ResourceType {
    /// Id pattern for this type: `<type>/<24 alphanumeric chars>`.
    pub fn pattern(self) -> &'static Regex {
        &PATTERNS[self as usize]
    }

    pub fn is_valid_id(self, candidate: &str) -> bool {
        validate(Some(candidate), self.pattern())
    }
}
