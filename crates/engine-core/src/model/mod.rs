//! Atomic data model
//!
//! The three-level taxonomy (Compound -> Molecule -> Atom) plus the
//! supporting AtomEdge, Engram, and SessionState records.

mod atom;
mod compound;
mod engram;
mod molecule;
mod session;

pub use atom::{Atom, AtomEdge, AtomType};
pub use compound::{Compound, Provenance};
pub use engram::Engram;
pub use molecule::{Molecule, MoleculeType};
pub use session::{SessionState, SESSION_STATE_ID, SESSION_SUMMARY_HARD_CAP};
