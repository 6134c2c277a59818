//! Atom extraction
//!
//! Two independent passes over a molecule's text: a trigger-pattern rule
//! table that classifies spans into high-level categories, and a
//! capitalized-entity scan that yields concept-type atoms.

use crate::model::{Atom, AtomType};

/// `(trigger_pattern, category_label, weight)`. Patterns are matched
/// case-insensitively as whole-word substrings. This is deliberately a
/// small, auditable table rather than a learned classifier.
const TRIGGER_TABLE: &[(&str, &str, f32)] = &[
    ("married", "#relationship", 0.7),
    ("friend", "#relationship", 0.5),
    ("partner", "#relationship", 0.6),
    ("once upon", "#narrative", 0.4),
    ("remember when", "#narrative", 0.5),
    ("function", "#technical", 0.6),
    ("database", "#technical", 0.6),
    ("algorithm", "#technical", 0.6),
    ("server", "#technical", 0.5),
    ("startup", "#industry", 0.5),
    ("market", "#industry", 0.5),
    ("revenue", "#industry", 0.5),
    ("downtown", "#location", 0.4),
    ("moved to", "#location", 0.5),
    ("happy", "#emotional", 0.4),
    ("anxious", "#emotional", 0.5),
    ("grateful", "#emotional", 0.4),
    ("yesterday", "#temporal", 0.3),
    ("next week", "#temporal", 0.3),
    ("deadline", "#temporal", 0.5),
    ("because", "#causal", 0.3),
    ("therefore", "#causal", 0.4),
    ("manager", "#professional", 0.5),
    ("colleague", "#professional", 0.4),
    ("my cat", "#personal", 0.4),
    ("my family", "#personal", 0.5),
    ("learned that", "#knowledge", 0.4),
    ("discovered", "#knowledge", 0.4),
];

/// Common capitalized words that are not entities on their own (sentence
/// leaders, mostly) - excluded from the entity-extraction pass.
const COMMON_WORDS: &[&str] = &[
    "The", "And", "For", "But", "With", "From", "This", "That", "These",
    "Those", "When", "Where", "While", "After", "Before", "Because", "If",
    "Then", "Also", "However", "Although", "Since", "Until", "Once",
    "During", "Here", "There", "Today", "Yesterday", "Tomorrow",
];

/// Run both passes over `text` and return the combined, deduplicated
/// atom set. Order is stable: category atoms first (table order), then
/// entities in first-occurrence order.
pub fn extract_atoms(text: &str) -> Vec<Atom> {
    let mut atoms = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for (trigger, label, weight) in TRIGGER_TABLE {
        if contains_word_ci(text, trigger) {
            let atom = Atom::new(*label, AtomType::Concept, *weight);
            if seen.insert(atom.id.clone()) {
                atoms.push(atom);
            }
        }
    }

    for entity in capitalized_entities(text) {
        let atom = Atom::new(entity, AtomType::Concept, 0.5);
        if seen.insert(atom.id.clone()) {
            atoms.push(atom);
        }
    }

    atoms
}

fn contains_word_ci(text: &str, pattern: &str) -> bool {
    let text_lower = text.to_lowercase();
    let pattern_lower = pattern.to_lowercase();
    text_lower.contains(&pattern_lower)
}

/// Runs of capitalized words (possibly multi-word, e.g. `ECE Core`), not
/// starting a sentence-leader common word and not a single letter.
fn capitalized_entities(text: &str) -> Vec<String> {
    let mut entities = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        let cleaned = word.trim_matches(|c: char| !c.is_alphanumeric());
        let is_capitalized = cleaned
            .chars()
            .next()
            .map(|c| c.is_uppercase())
            .unwrap_or(false)
            && cleaned.len() > 1;

        if is_capitalized && !COMMON_WORDS.contains(&cleaned) {
            current.push(cleaned);
        } else if !current.is_empty() {
            entities.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        entities.push(current.join(" "));
    }

    entities
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_technical_trigger() {
        let atoms = extract_atoms("We added a new function to the database layer.");
        assert!(atoms.iter().any(|a| a.label == "#technical"));
    }

    #[test]
    fn extracts_multi_word_entity() {
        let atoms = extract_atoms("The ECE Core stores memory in a graph.");
        assert!(atoms.iter().any(|a| a.label == "ECE Core"));
    }

    #[test]
    fn excludes_common_sentence_leaders() {
        let atoms = extract_atoms("The quick brown fox. And then it ran.");
        assert!(!atoms.iter().any(|a| a.label == "The"));
        assert!(!atoms.iter().any(|a| a.label == "And"));
    }

    #[test]
    fn dedups_repeated_entities() {
        let atoms = extract_atoms("Rust is great. Rust is fast too.");
        let rust_atoms: Vec<_> = atoms.iter().filter(|a| a.label == "Rust").collect();
        assert_eq!(rust_atoms.len(), 1);
    }
}
