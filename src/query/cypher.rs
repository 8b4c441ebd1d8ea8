use std::collections::BTreeMap;

use chrono::Datelike;
use tracing::debug;

use super::sanitize::sanitize_cypher;
use super::{Intent, QueryLanguage, QuerySpec};

/// Census years present in the graph store. Year filters are mapped onto
/// these rather than passed through verbatim.
const AVAILABLE_YEARS: &[i32] = &[1997, 2002, 2007, 2012, 2017, 2022];

/// Node labels and their properties, mirroring the graph store schema.
pub const NODE_TYPES: &[(&str, &[&str])] = &[
    ("State", &["name", "abbreviation", "fips_code", "population", "area_sq_miles", "capital", "largest_city"]),
    ("Measurement", &["metric_type", "year", "value", "unit", "source", "confidence_level"]),
    ("Region", &["name", "type", "states_count"]),
    ("Climate", &["name", "type", "avg_temperature", "avg_rainfall"]),
    ("AgriculturalBelt", &["name", "primary_crops", "states_included"]),
    ("Year", &["year", "is_census_year", "major_events"]),
];

/// Relationship types and what they mean.
pub const RELATIONSHIP_TYPES: &[(&str, &str)] = &[
    ("HAS_MEASUREMENT", "State has agricultural measurement"),
    ("IN_REGION", "State is in geographic region"),
    ("HAS_CLIMATE", "State has climate type"),
    ("IN_BELT", "State is in agricultural belt"),
    ("BORDERS", "State borders another state"),
    ("IN_YEAR", "Measurement recorded in year"),
    ("COMPARED_TO", "Measurement compared to another"),
    ("INFLUENCES", "Climate influences measurements"),
    ("CORRELATES_WITH", "Measurements correlate with each other"),
];

/// Region names to the states they contain, used to expand regional keywords
/// into concrete state filters.
const REGION_STATES: &[(&str, &[&str])] = &[
    ("midwest", &["Iowa", "Illinois", "Indiana", "Michigan", "Minnesota", "Missouri", "Ohio", "Wisconsin", "Kansas", "Nebraska", "North Dakota", "South Dakota"]),
    ("northeast", &["Connecticut", "Maine", "Massachusetts", "New Hampshire", "New Jersey", "New York", "Pennsylvania", "Rhode Island", "Vermont"]),
    ("south", &["Alabama", "Arkansas", "Delaware", "Florida", "Georgia", "Kentucky", "Louisiana", "Maryland", "Mississippi", "North Carolina", "Oklahoma", "South Carolina", "Tennessee", "Texas", "Virginia", "West Virginia"]),
    ("west", &["Alaska", "Arizona", "California", "Colorado", "Hawaii", "Idaho", "Montana", "Nevada", "New Mexico", "Oregon", "Utah", "Washington", "Wyoming"]),
];

/// State names recognized as comparison or location targets.
const KNOWN_STATES: &[&str] = &[
    "alabama", "arizona", "arkansas", "california", "colorado", "florida", "georgia", "idaho",
    "illinois", "indiana", "iowa", "kansas", "kentucky", "louisiana", "michigan", "minnesota",
    "mississippi", "missouri", "montana", "nebraska", "nevada", "ohio", "oklahoma", "oregon",
    "pennsylvania", "tennessee", "texas", "utah", "washington", "wisconsin", "wyoming",
];

/// Case expression classifying a state into its agricultural belt.
const AG_BELT_CASE: &str = "CASE \
     WHEN s.name IN ['Iowa', 'Illinois', 'Indiana', 'Ohio', 'Nebraska', 'Minnesota', 'Wisconsin'] THEN 'CORN_BELT' \
     WHEN s.name IN ['Kansas', 'Oklahoma', 'Texas', 'Nebraska', 'Colorado'] THEN 'WHEAT_BELT' \
     WHEN s.name IN ['Texas', 'Georgia', 'Mississippi', 'Arkansas', 'Louisiana', 'Alabama'] THEN 'COTTON_BELT' \
     ELSE 'OTHER' END";

/// Tokens that never become CONTAINS filters.
const FILTER_SKIP: &[&str] = &[
    "impact", "trend", "comparison", "location", "quantity", "quality", "prediction",
    "relationship", "list", "all", "past", "last", "years", "year", "recent", "previous",
    "decade", "farms", "farm", "performances", "performance",
];

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// Year constraints extracted from a keyword sequence.
#[derive(Debug, Default)]
struct YearFilter {
    clause: String,
    selected_years: Vec<i32>,
}

/// Generates Cypher queries for the graph store from an intent and keyword
/// set. One strategy per intent; pure and stateless.
#[derive(Debug, Default, Clone)]
pub struct CypherSynthesizer;

impl CypherSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Build a graph `QuerySpec` for the given intent. Falls back to the
    /// general strategy when no specific template applies.
    pub fn synthesize(&self, intent: Intent, keywords: &[String], limit: usize) -> QuerySpec {
        debug!(?intent, ?keywords, "generating Cypher");

        let mut spec = match intent {
            Intent::ImpactAnalysis => self.impact_query(keywords, limit),
            Intent::TrendAnalysis => self.trend_query(keywords, limit),
            Intent::Comparison => self.comparison_query(keywords, limit),
            Intent::LocationBased => self.location_query(keywords, limit),
            Intent::Aggregation => self.aggregation_query(limit),
            // No dedicated graph template; use the general strategy.
            Intent::Prediction | Intent::Ranking | Intent::General => {
                self.general_query(keywords, limit)
            }
        };
        spec.involved_entities = self.identify_nodes(keywords);
        spec
    }

    /// Identify which node labels a keyword set touches. State and
    /// Measurement are always primary.
    fn identify_nodes(&self, keywords: &[String]) -> Vec<String> {
        let lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let has = |terms: &[&str]| lower.iter().any(|k| terms.contains(&k.as_str()));

        let mut nodes = vec!["State".to_string(), "Measurement".to_string()];
        if has(&["region", "regional", "midwest", "south", "west", "northeast"]) {
            nodes.push("Region".to_string());
        }
        if has(&["climate", "weather", "temperature", "rainfall"]) {
            nodes.push("Climate".to_string());
        }
        if has(&["belt", "corn belt", "wheat belt", "cotton belt"]) {
            nodes.push("AgriculturalBelt".to_string());
        }
        if has(&["year", "annual", "yearly", "trends", "time"]) {
            nodes.push("Year".to_string());
        }
        nodes
    }

    fn impact_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let hop_count: u32 = keywords
            .iter()
            .find(|k| is_numeric(k))
            .and_then(|k| k.parse().ok())
            .unwrap_or(3);

        if keywords
            .iter()
            .any(|k| ["chain", "hops", "path"].contains(&k.to_lowercase().as_str()))
        {
            let text = format!(
                "MATCH path = (s1:State)-[:BORDERS*1..{hop_count}]->(s2:State) \
                 WHERE s1 <> s2 \
                 WITH s1, s2, path, length(path) AS hops \
                 RETURN s1.name AS origin_state, s2.name AS connected_state, \
                 hops AS connection_distance, \
                 [node IN nodes(path) | node.name] AS path_states \
                 ORDER BY hops ASC \
                 LIMIT {limit}"
            );
            return QuerySpec::new(QueryLanguage::Graph, text, limit);
        }

        let text = format!(
            "MATCH (s1:State)-[b:BORDERS]->(s2:State) \
             MATCH (s1)-[r1:HAS_MEASUREMENT]->(m1:Measurement) \
             MATCH (s2)-[r2:HAS_MEASUREMENT]->(m2:Measurement) \
             WHERE m1.metric_type = m2.metric_type AND m1.year = m2.year \
             AND m1.year >= date().year - 5 \
             WITH s1, s2, b, r1, r2, m1, m2, m1.metric_type AS metric, m1.year AS year, \
             m1.value AS origin_value, m2.value AS neighbor_value, \
             abs(m1.value - m2.value) / (m1.value + 0.01) * 100 AS pct_difference \
             RETURN s1 AS origin_state_node, b AS border_relationship, s2 AS neighbor_state_node, \
             m1 AS measurement1_node, m2 AS measurement2_node, \
             s1.name AS origin_state, s2.name AS neighboring_state, metric, year, \
             round(origin_value) AS origin_value, round(neighbor_value) AS neighbor_value, \
             round(pct_difference, 2) AS percent_difference \
             ORDER BY year DESC, pct_difference DESC \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Graph, text, limit)
    }

    fn trend_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let year_filter = self.year_filter(keywords);

        let mut params = BTreeMap::new();
        let mut conditions = Vec::new();
        for (i, keyword) in keywords
            .iter()
            .filter(|k| !FILTER_SKIP.contains(&k.to_lowercase().as_str()) && !is_numeric(k))
            .enumerate()
        {
            let name = format!("kw{i}");
            conditions.push(format!("toLower(s.name) CONTAINS ${name}"));
            params.insert(name, keyword.to_lowercase());
        }
        let base = if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" OR ") };
        let where_clause = format!("({base}){}", year_filter.clause);

        let text = format!(
            "MATCH (s:State)-[rel:HAS_MEASUREMENT]->(m:Measurement) \
             WHERE {where_clause} \
             WITH s, rel, m, s.name AS state, m.year AS year, \
             avg(m.value) AS avg_value, collect(DISTINCT m.metric_type) AS metrics \
             RETURN s AS state_node, rel AS relationship, m AS measurement_node, \
             state, year, round(avg_value) AS average_value, metrics[0..3] AS sample_metrics \
             ORDER BY year DESC \
             LIMIT {limit}"
        );
        let mut spec = QuerySpec::new(QueryLanguage::Graph, text, limit);
        spec.params = params;
        spec
    }

    fn comparison_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let states: Vec<String> = keywords
            .iter()
            .filter(|k| KNOWN_STATES.contains(&k.to_lowercase().as_str()))
            .map(|k| title_case(&k.to_lowercase()))
            .collect();

        if !states.is_empty() {
            let mut params = BTreeMap::new();
            let placeholders: Vec<String> = states
                .iter()
                .enumerate()
                .map(|(i, state)| {
                    let name = format!("st{i}");
                    params.insert(name.clone(), state.clone());
                    format!("${name}")
                })
                .collect();
            let text = format!(
                "MATCH (s:State)-[:HAS_MEASUREMENT]->(m:Measurement) \
                 WHERE s.name IN [{}] AND m.year >= date().year - 3 \
                 WITH s.name AS state, m.metric_type AS metric, avg(m.value) AS avg_value, \
                 count(m) AS measurement_count \
                 RETURN state, metric, round(avg_value, 2) AS average_value, measurement_count \
                 ORDER BY metric, avg_value DESC \
                 LIMIT {limit}",
                placeholders.join(", ")
            );
            let mut spec = QuerySpec::new(QueryLanguage::Graph, text, limit);
            spec.params = params;
            return spec;
        }

        let text = format!(
            "MATCH (s:State)-[:HAS_MEASUREMENT]->(m:Measurement) \
             WHERE m.year >= date().year - 3 \
             WITH s.name AS state, count(DISTINCT m.metric_type) AS metric_count, \
             avg(m.value) AS avg_value \
             RETURN state, metric_count, round(avg_value, 2) AS average_value \
             ORDER BY avg_value DESC \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Graph, text, limit)
    }

    fn location_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let location = keywords
            .iter()
            .find(|k| KNOWN_STATES.contains(&k.to_lowercase().as_str()))
            .map(|k| k.to_lowercase());

        if let Some(location) = location {
            let text = format!(
                "MATCH (s:State)-[rel:HAS_MEASUREMENT]->(m:Measurement) \
                 WHERE toLower(s.name) = $loc \
                 OPTIONAL MATCH (s)-[:BORDERS]->(neighbor:State) \
                 WITH s, rel, m, count(DISTINCT neighbor) AS neighbor_count \
                 RETURN s AS state_node, rel AS measurement_rel, m AS measurement_node, \
                 s.name AS state, m.metric_type AS metric, m.year AS year, m.value AS value, \
                 neighbor_count \
                 ORDER BY m.year DESC, m.value DESC \
                 LIMIT {limit}"
            );
            let mut spec = QuerySpec::new(QueryLanguage::Graph, text, limit);
            spec.params.insert("loc".to_string(), sanitize_cypher(&location));
            return spec;
        }

        // No concrete place named: cluster states by region instead.
        let text = format!(
            "MATCH (s:State) \
             OPTIONAL MATCH (s)-[:IN_REGION]->(region:Region) \
             WITH region, collect(s) AS states_in_region \
             WHERE size(states_in_region) > 1 \
             RETURN region.name AS region_name, size(states_in_region) AS state_count, \
             [s IN states_in_region | s.name][0..5] AS sample_states \
             ORDER BY state_count DESC \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Graph, text, limit)
    }

    fn aggregation_query(&self, limit: usize) -> QuerySpec {
        let text = format!(
            "MATCH (s:State) \
             OPTIONAL MATCH (s)-[:HAS_MEASUREMENT]->(m:Measurement) \
             OPTIONAL MATCH (s)-[:IN_REGION]->(region:Region) \
             OPTIONAL MATCH (s)-[:BORDERS]->(neighbor:State) \
             WITH s.name AS state, count(DISTINCT m) AS measurement_count, \
             count(DISTINCT m.metric_type) AS metric_diversity, \
             collect(DISTINCT region.name) AS regions, \
             count(DISTINCT neighbor) AS neighbor_count \
             RETURN state, measurement_count, metric_diversity, regions, neighbor_count \
             ORDER BY measurement_count DESC \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Graph, text, limit)
    }

    fn general_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let has_list_keywords = keywords
            .iter()
            .any(|k| ["list", "all", "each", "collect"].contains(&k.to_lowercase().as_str()));
        let year_filter = self.year_filter(keywords);

        let mut params = BTreeMap::new();
        let mut conditions = Vec::new();
        let mut state_list: Vec<&str> = Vec::new();
        let mut bound = 0usize;

        for keyword in keywords.iter().take(5) {
            let keyword_lower = keyword.to_lowercase();

            if let Some((_, states)) =
                REGION_STATES.iter().find(|(region, _)| *region == keyword_lower)
            {
                state_list.extend(states.iter().copied());
                continue;
            }
            if FILTER_SKIP.contains(&keyword_lower.as_str()) || is_numeric(&keyword_lower) {
                continue;
            }

            let name = format!("kw{bound}");
            bound += 1;
            conditions.push(format!(
                "(toLower(s.name) CONTAINS ${name} OR toLower(m.metric_type) CONTAINS ${name})"
            ));
            params.insert(name, keyword_lower);
        }

        if !state_list.is_empty() {
            // Region expansion uses our own static state names, not user input.
            let names: Vec<String> = state_list.iter().map(|s| format!("'{s}'")).collect();
            conditions.push(format!("s.name IN [{}]", names.join(", ")));
        }

        let base = if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" OR ") };
        let where_clause = format!("({base}){}", year_filter.clause);

        if has_list_keywords {
            let text = format!(
                "MATCH (s:State)-[:HAS_MEASUREMENT]->(m:Measurement) \
                 WHERE {where_clause} \
                 WITH s.name AS state, collect(DISTINCT m.metric_type) AS metrics, \
                 collect(DISTINCT m.year) AS years, count(m) AS measurement_count \
                 RETURN state, metrics, years, measurement_count \
                 ORDER BY measurement_count DESC \
                 LIMIT {limit}"
            );
            let mut spec = QuerySpec::new(QueryLanguage::Graph, text, limit);
            spec.params = params;
            return spec;
        }

        let text = if year_filter.selected_years.len() > 1 {
            let years_str = year_filter
                .selected_years
                .iter()
                .map(i32::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            format!(
                "MATCH (s:State)-[rel:HAS_MEASUREMENT]->(m:Measurement) \
                 WHERE {where_clause} \
                 WITH s, m, rel \
                 OPTIONAL MATCH (s)-[:HAS_MEASUREMENT]->(hist:Measurement) \
                 WHERE hist.metric_type = m.metric_type AND hist.year < m.year \
                 AND hist.year IN [{years_str}] \
                 WITH s, m, rel, collect(hist) AS history \
                 WITH s, m, rel, history, \
                 CASE WHEN size(history) > 0 AND history[0].value > 0 \
                 THEN round((m.value - history[0].value) / history[0].value * 100, 2) \
                 ELSE null END AS growth_rate, \
                 CASE WHEN size(history) > 0 AND m.value > history[0].value * 1.1 THEN 'GROWING' \
                 WHEN size(history) > 0 AND m.value < history[0].value * 0.9 THEN 'DECLINING' \
                 ELSE 'STABLE' END AS trend \
                 OPTIONAL MATCH (s)-[:BORDERS]->(border:State) \
                 WITH s, m, rel, growth_rate, trend, history, \
                 collect(DISTINCT border.name) AS borders, {AG_BELT_CASE} AS ag_belt \
                 RETURN s AS state_node, rel AS measurement_rel, m AS measurement_node, \
                 s.name AS state, m.metric_type AS metric, m.year AS year, m.value AS value, \
                 growth_rate AS year_over_year_growth, trend AS performance_trend, \
                 size(history) AS historical_data_points, \
                 [h IN history | {{year: h.year, value: h.value}}][0..3] AS previous_values, \
                 borders AS border_states, ag_belt AS agricultural_belt \
                 ORDER BY m.year DESC, m.value DESC \
                 LIMIT {limit}"
            )
        } else {
            format!(
                "MATCH (s:State)-[rel:HAS_MEASUREMENT]->(m:Measurement) \
                 WHERE {where_clause} \
                 OPTIONAL MATCH (s)-[:BORDERS]->(border:State) \
                 WITH s, m, rel, collect(DISTINCT border.name) AS borders, \
                 {AG_BELT_CASE} AS ag_belt \
                 RETURN s AS state_node, rel AS measurement_rel, m AS measurement_node, \
                 s.name AS state, m.metric_type AS metric, m.year AS year, m.value AS value, \
                 borders AS border_states, ag_belt AS agricultural_belt \
                 ORDER BY m.year DESC, m.value DESC \
                 LIMIT {limit}"
            )
        };

        let mut spec = QuerySpec::new(QueryLanguage::Graph, text, limit);
        spec.params = params;
        spec
    }

    /// Derive a year constraint from temporal keywords, mapping requested
    /// years onto the census years actually present in the store.
    fn year_filter(&self, keywords: &[String]) -> YearFilter {
        let now = current_year();
        let mut filter = YearFilter::default();

        for (i, keyword) in keywords.iter().enumerate() {
            let keyword_lower = keyword.to_lowercase();

            if ["past", "last", "previous", "recent"].contains(&keyword_lower.as_str()) {
                // Look ahead for "past N ..." style ranges.
                if let Some(years_back) = keywords
                    .iter()
                    .skip(i + 1)
                    .take(2)
                    .find_map(|k| k.parse::<i32>().ok())
                {
                    let cutoff = now - years_back;
                    let mut selected: Vec<i32> =
                        AVAILABLE_YEARS.iter().copied().filter(|y| *y >= cutoff).collect();
                    if selected.is_empty() {
                        let count = if years_back <= 5 {
                            2
                        } else if years_back <= 10 {
                            3
                        } else {
                            4
                        };
                        selected = AVAILABLE_YEARS[AVAILABLE_YEARS.len() - count..].to_vec();
                    }
                    filter.clause = format!(
                        " AND m.year IN [{}]",
                        selected.iter().map(i32::to_string).collect::<Vec<_>>().join(", ")
                    );
                    filter.selected_years = selected;
                    break;
                }
            } else if keyword.len() == 4 && is_numeric(keyword) {
                if let Ok(year) = keyword.parse::<i32>() {
                    if (1900..=2100).contains(&year) {
                        // Map onto the nearest census year.
                        let nearest = AVAILABLE_YEARS
                            .iter()
                            .copied()
                            .min_by_key(|y| (y - year).abs())
                            .unwrap_or(year);
                        filter.clause = format!(" AND m.year = {nearest}");
                        break;
                    }
                }
            } else if keyword_lower.contains("decade") {
                let selected = AVAILABLE_YEARS[AVAILABLE_YEARS.len() - 3..].to_vec();
                filter.clause = format!(
                    " AND m.year IN [{}]",
                    selected.iter().map(i32::to_string).collect::<Vec<_>>().join(", ")
                );
                filter.selected_years = selected;
                break;
            }
        }

        filter
    }

    /// Produce a human-readable description of a generated query.
    pub fn explain(&self, spec: &QuerySpec) -> String {
        let cypher = &spec.text;
        let lower = cypher.to_lowercase();
        let mut explanation = String::from("This graph query ");

        if cypher.contains("MATCH") {
            if cypher.contains('*') {
                explanation.push_str("traverses multiple relationship paths ");
            } else {
                explanation.push_str("matches graph patterns ");
            }
        }
        if cypher.contains("OPTIONAL MATCH") {
            explanation.push_str("with optional relationships ");
        }
        if cypher.contains("[:BORDERS") {
            explanation.push_str("exploring state adjacency ");
        }
        if cypher.contains("[:IN_REGION") {
            explanation.push_str("including regional membership ");
        }
        if lower.contains("count(") || lower.contains("sum(") || lower.contains("avg(") {
            explanation.push_str("with aggregations ");
        }
        if lower.contains("collect(") {
            explanation.push_str("collecting related entities ");
        }
        if cypher.contains("WHERE") {
            explanation.push_str("filtered by conditions ");
        }
        if cypher.contains("ORDER BY") {
            if cypher.contains("DESC") {
                explanation.push_str("sorted in descending order ");
            } else {
                explanation.push_str("sorted in ascending order ");
            }
        }

        explanation.trim_end().to_string()
    }
}
