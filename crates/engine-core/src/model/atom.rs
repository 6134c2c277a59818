use serde::{Deserialize, Serialize};

/// Classification of an Atom label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomType {
    System,
    Concept,
    Person,
    Place,
    Date,
    Technical,
}

impl std::fmt::Display for AtomType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AtomType::System => "system",
            AtomType::Concept => "concept",
            AtomType::Person => "person",
            AtomType::Place => "place",
            AtomType::Date => "date",
            AtomType::Technical => "technical",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for AtomType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(AtomType::System),
            "concept" => Ok(AtomType::Concept),
            "person" => Ok(AtomType::Person),
            "place" => Ok(AtomType::Place),
            "date" => Ok(AtomType::Date),
            "technical" => Ok(AtomType::Technical),
            other => Err(format!("unknown atom type: {other}")),
        }
    }
}

/// A semantic unit: entity, category, or keyword.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Atom {
    /// Hash of the normalized label.
    pub id: String,
    /// Canonical string, e.g. `#project:ECE_Core`, `#code`.
    pub label: String,
    #[serde(rename = "type")]
    pub atom_type: AtomType,
    /// Importance hint in `[0, 1]`.
    pub weight: f32,
}

impl Atom {
    pub fn derive_id(normalized_label: &str) -> String {
        format!("{:x}", md5::compute(normalized_label.as_bytes()))
    }

    /// `label` keeps its original casing (it is the canonical display
    /// string); only the id digest is computed over the lower-cased form
    /// so that `"Rust"` and `"rust"` collapse to the same atom.
    pub fn new(label: impl Into<String>, atom_type: AtomType, weight: f32) -> Self {
        let label = label.into();
        let normalized = label.to_lowercase();
        Self {
            id: Self::derive_id(&normalized),
            label,
            atom_type,
            weight: weight.clamp(0.0, 1.0),
        }
    }
}

/// A directed weighted relation between atoms (co-occurrence or explicit).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomEdge {
    pub from_id: String,
    pub to_id: String,
    pub weight: f64,
    pub relation: String,
}
