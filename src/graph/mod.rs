pub mod knowledge;
pub mod structure;

pub use knowledge::{DerivedRelationship, RelationshipKnowledge};
pub use structure::{
    GraphNode, GraphRelationship, GraphRow, GraphStructure, GraphValue, NodeRecord, PathRecord,
    PathValue, RelationshipSummary,
};
