//! Static geographic knowledge used to enrich graph display output with
//! relationships the backend query did not traverse.

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// State adjacency. States without land borders map to an empty list.
static STATE_BORDERS: Lazy<HashMap<&'static str, Vec<&'static str>>> = Lazy::new(|| {
    let mut borders = HashMap::new();
    borders.insert("Iowa", vec!["Minnesota", "Wisconsin", "Illinois", "Missouri", "Nebraska", "South Dakota"]);
    borders.insert("California", vec!["Oregon", "Nevada", "Arizona"]);
    borders.insert("Texas", vec!["New Mexico", "Oklahoma", "Arkansas", "Louisiana"]);
    borders.insert("Illinois", vec!["Wisconsin", "Indiana", "Kentucky", "Missouri", "Iowa"]);
    borders.insert("Nebraska", vec!["South Dakota", "Iowa", "Missouri", "Kansas", "Colorado", "Wyoming"]);
    borders.insert("Minnesota", vec!["Wisconsin", "Iowa", "South Dakota", "North Dakota"]);
    borders.insert("Wisconsin", vec!["Michigan", "Minnesota", "Iowa", "Illinois"]);
    borders.insert("Michigan", vec!["Ohio", "Indiana", "Wisconsin"]);
    borders.insert("Ohio", vec!["Michigan", "Indiana", "Kentucky", "West Virginia", "Pennsylvania"]);
    borders.insert("Indiana", vec!["Michigan", "Ohio", "Kentucky", "Illinois"]);
    borders.insert("Missouri", vec!["Iowa", "Illinois", "Kentucky", "Tennessee", "Arkansas", "Oklahoma", "Kansas", "Nebraska"]);
    borders.insert("Kansas", vec!["Nebraska", "Missouri", "Oklahoma", "Colorado"]);
    borders.insert("North Dakota", vec!["Minnesota", "South Dakota", "Montana"]);
    borders.insert("South Dakota", vec!["North Dakota", "Minnesota", "Iowa", "Nebraska", "Wyoming", "Montana"]);
    borders.insert("Florida", vec!["Georgia", "Alabama"]);
    borders.insert("Georgia", vec!["Florida", "Alabama", "Tennessee", "North Carolina", "South Carolina"]);
    borders.insert("New York", vec!["Vermont", "Massachusetts", "Connecticut", "New Jersey", "Pennsylvania"]);
    borders.insert("Pennsylvania", vec!["New York", "New Jersey", "Delaware", "Maryland", "West Virginia", "Ohio"]);
    borders.insert("Colorado", vec!["Wyoming", "Nebraska", "Kansas", "Oklahoma", "New Mexico", "Arizona", "Utah"]);
    borders.insert("Arizona", vec!["California", "Nevada", "Utah", "Colorado", "New Mexico"]);
    borders.insert("Washington", vec!["Idaho", "Oregon"]);
    borders.insert("Oregon", vec!["Washington", "Idaho", "Nevada", "California"]);
    // No land borders with other states.
    borders.insert("Alaska", vec![]);
    borders.insert("Hawaii", vec![]);
    borders
});

static REGIONS: Lazy<Vec<(&'static str, Vec<&'static str>)>> = Lazy::new(|| {
    vec![
        ("Midwest", vec!["Iowa", "Illinois", "Indiana", "Michigan", "Minnesota", "Missouri", "Ohio", "Wisconsin"]),
        ("South", vec!["Texas", "Florida", "Georgia", "Virginia", "North Carolina", "South Carolina", "Alabama", "Mississippi", "Louisiana", "Arkansas", "Tennessee", "Kentucky"]),
        ("West", vec!["California", "Oregon", "Washington", "Nevada", "Arizona", "Utah", "Colorado", "New Mexico"]),
        ("Northeast", vec!["New York", "Pennsylvania", "New Jersey", "Massachusetts", "Connecticut", "Rhode Island", "Vermont", "New Hampshire", "Maine"]),
    ]
});

const CORN_BELT: &[&str] = &["Iowa", "Illinois", "Indiana", "Ohio", "Nebraska", "Minnesota", "Wisconsin"];
const WHEAT_BELT: &[&str] = &["Kansas", "Oklahoma", "Texas", "Nebraska", "Colorado"];
const COTTON_BELT: &[&str] = &["Texas", "Georgia", "Mississippi", "Arkansas", "Louisiana", "Alabama"];

/// A relationship derived from static knowledge rather than backend data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedRelationship {
    pub rel_type: String,
    pub target: String,
}

impl DerivedRelationship {
    fn new(rel_type: &str, target: &str) -> Self {
        Self { rel_type: rel_type.to_string(), target: target.to_string() }
    }
}

/// Lookup source for geographic relationships of a state. Backed entirely by
/// static tables; no backend access.
#[derive(Debug, Default, Clone)]
pub struct RelationshipKnowledge;

impl RelationshipKnowledge {
    pub fn new() -> Self {
        Self
    }

    /// All geographic relationships for a state: BORDERS per neighbor,
    /// IN_REGION plus SHARES_REGION_WITH per co-member, and one belt
    /// membership per belt the state is in. Unknown states yield nothing.
    pub fn geographic_relationships(&self, state_name: &str) -> Vec<DerivedRelationship> {
        let mut relationships = Vec::new();

        if let Some(neighbors) = STATE_BORDERS.get(state_name) {
            for neighbor in neighbors {
                relationships.push(DerivedRelationship::new("BORDERS", neighbor));
            }
        }

        for (region, states) in REGIONS.iter() {
            if states.contains(&state_name) {
                relationships.push(DerivedRelationship::new("IN_REGION", region));
                for other in states {
                    if *other != state_name {
                        relationships.push(DerivedRelationship::new("SHARES_REGION_WITH", other));
                    }
                }
            }
        }

        if CORN_BELT.contains(&state_name) {
            relationships.push(DerivedRelationship::new("IN_CORN_BELT", "Corn Belt"));
        }
        if WHEAT_BELT.contains(&state_name) {
            relationships.push(DerivedRelationship::new("IN_WHEAT_BELT", "Wheat Belt"));
        }
        if COTTON_BELT.contains(&state_name) {
            relationships.push(DerivedRelationship::new("IN_COTTON_BELT", "Cotton Belt"));
        }

        relationships
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iowa_has_borders_region_and_corn_belt() {
        let knowledge = RelationshipKnowledge::new();
        let rels = knowledge.geographic_relationships("Iowa");

        let borders: Vec<&DerivedRelationship> =
            rels.iter().filter(|r| r.rel_type == "BORDERS").collect();
        assert_eq!(borders.len(), 6);
        assert!(rels.iter().any(|r| r.rel_type == "IN_REGION" && r.target == "Midwest"));
        assert!(rels.iter().any(|r| r.rel_type == "IN_CORN_BELT"));
        assert!(!rels.iter().any(|r| r.rel_type == "IN_WHEAT_BELT"));
    }

    #[test]
    fn test_texas_is_in_two_belts() {
        let knowledge = RelationshipKnowledge::new();
        let rels = knowledge.geographic_relationships("Texas");
        assert!(rels.iter().any(|r| r.rel_type == "IN_WHEAT_BELT"));
        assert!(rels.iter().any(|r| r.rel_type == "IN_COTTON_BELT"));
    }

    #[test]
    fn test_island_and_unknown_states() {
        let knowledge = RelationshipKnowledge::new();
        // Hawaii is known but has no land borders and no region membership.
        assert!(knowledge
            .geographic_relationships("Hawaii")
            .iter()
            .all(|r| r.rel_type != "BORDERS"));
        assert!(knowledge.geographic_relationships("Atlantis").is_empty());
    }

    #[test]
    fn test_shares_region_excludes_self() {
        let knowledge = RelationshipKnowledge::new();
        let rels = knowledge.geographic_relationships("Ohio");
        assert!(rels
            .iter()
            .filter(|r| r.rel_type == "SHARES_REGION_WITH")
            .all(|r| r.target != "Ohio"));
    }
}
