use std::collections::BTreeMap;

use tracing::debug;

use super::sanitize::sanitize_sql;
use super::{Intent, QueryLanguage, QuerySpec};

/// Keyword tokens that never become filter conditions: intent tags and
/// temporal filler the extractor may have appended.
const FILTER_SKIP: &[&str] = &[
    "impact", "trend", "comparison", "location", "quantity", "quality", "prediction",
    "relationship", "past", "last", "years", "year", "recent", "previous", "decade",
];

/// Known state names used when a location strategy needs a concrete place.
const KNOWN_STATES: &[&str] = &[
    "iowa", "california", "texas", "nebraska", "kansas", "illinois", "ohio", "missouri",
];

fn is_numeric(token: &str) -> bool {
    !token.is_empty() && token.chars().all(|c| c.is_ascii_digit())
}

fn filterable<'a>(keywords: &'a [String]) -> impl Iterator<Item = &'a String> {
    keywords
        .iter()
        .filter(|k| !FILTER_SKIP.contains(&k.to_lowercase().as_str()) && !is_numeric(k))
}

/// Generates PostgreSQL queries for the relational store from an intent and
/// keyword set. One template-construction strategy per intent; pure and
/// stateless.
#[derive(Debug, Default, Clone)]
pub struct SqlSynthesizer;

impl SqlSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Build a relational `QuerySpec` for the given intent. Falls back to the
    /// general strategy when no specific template applies.
    pub fn synthesize(&self, intent: Intent, keywords: &[String], limit: usize) -> QuerySpec {
        debug!(?intent, ?keywords, "generating SQL");

        let mut spec = match intent {
            Intent::ImpactAnalysis => self.impact_query(keywords, limit),
            Intent::TrendAnalysis => self.trend_query(keywords, limit),
            Intent::Comparison => self.comparison_query(keywords, limit),
            Intent::Ranking => self.ranking_query(limit),
            Intent::LocationBased => self.location_query(keywords, limit),
            Intent::Aggregation => self.aggregation_query(limit),
            // No dedicated relational template; use the general strategy.
            Intent::Prediction | Intent::General => self.general_query(keywords, limit),
        };
        spec.involved_entities = self.identify_tables(keywords);
        spec
    }

    /// Identify which tables a keyword set touches. Defaults to `farms`.
    fn identify_tables(&self, keywords: &[String]) -> Vec<String> {
        let lower: Vec<String> = keywords.iter().map(|k| k.to_lowercase()).collect();
        let has = |terms: &[&str]| lower.iter().any(|k| terms.contains(&k.as_str()));

        let mut tables = Vec::new();
        if has(&["farm", "farms", "farmer", "owner", "location", "crop", "certification"]) {
            tables.push("farms".to_string());
        }
        if has(&["equipment", "tractor", "harvester", "machinery", "maintenance"]) {
            tables.push("equipment".to_string());
        }
        if has(&["supplier", "supply", "distributor", "vendor", "delivery"]) {
            tables.push("suppliers".to_string());
        }
        if has(&["production", "yield", "harvest", "revenue", "profit"]) {
            tables.push("production_records".to_string());
        }
        if has(&["weather", "drought", "flood", "storm", "climate"]) {
            tables.push("weather_events".to_string());
        }
        if tables.is_empty() {
            tables.push("farms".to_string());
        }
        tables
    }

    fn impact_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let weather_driven =
            keywords.iter().any(|k| k == "drought" || k == "weather");
        if !weather_driven {
            return self.general_query(keywords, limit);
        }

        let text = format!(
            "SELECT f.name AS farm_name, f.primary_crop, pr.year, pr.yield_per_acre, \
             pr.weather_impact, pr.revenue, we.type AS weather_event, we.severity, \
             we.estimated_damage \
             FROM farms f \
             JOIN production_records pr ON f.id = pr.farm_id \
             LEFT JOIN weather_events we ON pr.year = EXTRACT(YEAR FROM we.date) \
             AND f.county = we.affected_region \
             WHERE pr.weather_impact IS NOT NULL \
             ORDER BY we.severity DESC, pr.revenue DESC \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Relational, text, limit)
    }

    fn trend_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        if self.identify_tables(keywords).iter().any(|t| t == "production_records") {
            let text = format!(
                "SELECT pr.year, pr.crop_type, COUNT(DISTINCT pr.farm_id) AS farm_count, \
                 AVG(pr.yield_per_acre) AS avg_yield, SUM(pr.total_production) AS total_production, \
                 AVG(pr.revenue) AS avg_revenue \
                 FROM production_records pr \
                 JOIN farms f ON pr.farm_id = f.id \
                 GROUP BY pr.year, pr.crop_type \
                 ORDER BY pr.year DESC, total_production DESC \
                 LIMIT {limit}"
            );
            return QuerySpec::new(QueryLanguage::Relational, text, limit);
        }

        // Fall back to the state metrics table, filtered to any named state.
        let mut params = BTreeMap::new();
        let mut conditions = Vec::new();
        for (i, keyword) in keywords
            .iter()
            .filter(|k| KNOWN_STATES.contains(&k.to_lowercase().as_str()))
            .enumerate()
        {
            let name = format!("kw{i}");
            conditions.push(format!("LOWER(place_name) = LOWER(${name})"));
            params.insert(name, keyword.clone());
        }
        let where_clause =
            if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" OR ") };

        let text = format!(
            "SELECT place_name, year, metric_type, AVG(value) AS avg_value, \
             COUNT(*) AS data_points \
             FROM state_agricultural_metrics \
             WHERE ({where_clause}) AND year >= EXTRACT(YEAR FROM CURRENT_DATE) - 10 \
             GROUP BY place_name, year, metric_type \
             ORDER BY year DESC, avg_value DESC \
             LIMIT {limit}"
        );
        let mut spec = QuerySpec::new(QueryLanguage::Relational, text, limit);
        spec.params = params;
        spec
    }

    fn comparison_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let by_certification =
            keywords.iter().any(|k| k == "organic" || k == "conventional");
        if !by_certification {
            return self.general_query(keywords, limit);
        }

        let text = format!(
            "SELECT f.certification_type, COUNT(*) AS farm_count, AVG(f.size_acres) AS avg_size, \
             AVG(pr.yield_per_acre) AS avg_yield, AVG(pr.revenue) AS avg_revenue \
             FROM farms f \
             LEFT JOIN production_records pr ON f.id = pr.farm_id \
             WHERE f.certification_type IN ('organic', 'conventional') \
             GROUP BY f.certification_type \
             ORDER BY avg_revenue DESC \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Relational, text, limit)
    }

    fn ranking_query(&self, limit: usize) -> QuerySpec {
        let text = format!(
            "SELECT f.name AS farm_name, f.location, f.primary_crop, f.size_acres, \
             AVG(pr.yield_per_acre) AS avg_yield, SUM(pr.revenue) AS total_revenue, \
             COUNT(e.id) AS equipment_count \
             FROM farms f \
             LEFT JOIN production_records pr ON f.id = pr.farm_id \
             LEFT JOIN equipment e ON f.id = e.farm_id \
             GROUP BY f.id, f.name, f.location, f.primary_crop, f.size_acres \
             ORDER BY total_revenue DESC NULLS LAST \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Relational, text, limit)
    }

    fn location_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let has_distance = keywords
            .iter()
            .any(|k| ["miles", "km", "within", "near", "nearby"].contains(&k.to_lowercase().as_str()));
        let location = keywords
            .iter()
            .find(|k| KNOWN_STATES.contains(&k.to_lowercase().as_str()))
            .cloned();

        if has_distance && location.is_none() {
            // Pairwise proximity search; distance defaults to 50 miles.
            let distance: u32 = keywords
                .iter()
                .find(|k| is_numeric(k))
                .and_then(|k| k.parse().ok())
                .unwrap_or(50);
            let meters = f64::from(distance) * 1609.344;
            let text = format!(
                "SELECT f1.name AS farm_name, f1.location, f1.county, f1.state, \
                 f1.primary_crop, f1.size_acres, \
                 ST_Distance(ST_MakePoint(f1.longitude, f1.latitude)::geography, \
                 ST_MakePoint(f2.longitude, f2.latitude)::geography) / 1609.344 AS distance_miles \
                 FROM farms f1, farms f2 \
                 WHERE f1.id != f2.id AND ST_DWithin(\
                 ST_MakePoint(f1.longitude, f1.latitude)::geography, \
                 ST_MakePoint(f2.longitude, f2.latitude)::geography, {meters}) \
                 ORDER BY distance_miles ASC \
                 LIMIT {limit}"
            );
            return QuerySpec::new(QueryLanguage::Relational, text, limit);
        }

        match location {
            Some(location) => {
                let text = format!(
                    "SELECT f.name, f.location, f.county, f.state, f.primary_crop, f.size_acres \
                     FROM farms f \
                     WHERE LOWER(f.state) = LOWER($loc) \
                     OR LOWER(f.county) LIKE LOWER('%' || $loc || '%') \
                     OR LOWER(f.location) LIKE LOWER('%' || $loc || '%') \
                     ORDER BY f.size_acres DESC \
                     LIMIT {limit}"
                );
                let mut spec = QuerySpec::new(QueryLanguage::Relational, text, limit);
                spec.params.insert("loc".to_string(), sanitize_sql(&location));
                spec
            }
            None => self.general_query(keywords, limit),
        }
    }

    fn aggregation_query(&self, limit: usize) -> QuerySpec {
        let text = format!(
            "SELECT f.state, f.primary_crop, COUNT(DISTINCT f.id) AS farm_count, \
             SUM(f.size_acres) AS total_acres, AVG(f.size_acres) AS avg_farm_size, \
             COUNT(DISTINCT s.id) AS supplier_count, COUNT(DISTINCT e.id) AS equipment_count \
             FROM farms f \
             LEFT JOIN farm_suppliers fs ON f.id = fs.farm_id \
             LEFT JOIN suppliers s ON fs.supplier_id = s.id \
             LEFT JOIN equipment e ON f.id = e.farm_id \
             GROUP BY f.state, f.primary_crop \
             ORDER BY farm_count DESC \
             LIMIT {limit}"
        );
        QuerySpec::new(QueryLanguage::Relational, text, limit)
    }

    fn general_query(&self, keywords: &[String], limit: usize) -> QuerySpec {
        let tables = self.identify_tables(keywords);

        let mut params = BTreeMap::new();
        let mut bind = |i: usize, keyword: &str| {
            let name = format!("kw{i}");
            params.insert(name.clone(), keyword.to_string());
            name
        };

        if tables.len() > 1 && tables.iter().any(|t| t == "farms") {
            let mut select_fields = vec![
                "f.id".to_string(),
                "f.name".to_string(),
                "f.location".to_string(),
                "f.primary_crop".to_string(),
                "f.size_acres".to_string(),
            ];
            let mut from_clause = "farms f".to_string();

            if tables.iter().any(|t| t == "equipment") {
                from_clause.push_str(" LEFT JOIN equipment e ON f.id = e.farm_id");
                select_fields.push("COUNT(DISTINCT e.id) AS equipment_count".to_string());
            }
            if tables.iter().any(|t| t == "suppliers") {
                from_clause.push_str(" LEFT JOIN farm_suppliers fs ON f.id = fs.farm_id");
                from_clause.push_str(" LEFT JOIN suppliers s ON fs.supplier_id = s.id");
                select_fields.push("COUNT(DISTINCT s.id) AS supplier_count".to_string());
            }
            if tables.iter().any(|t| t == "production_records") {
                from_clause.push_str(" LEFT JOIN production_records pr ON f.id = pr.farm_id");
                select_fields.push("AVG(pr.yield_per_acre) AS avg_yield".to_string());
            }

            let conditions: Vec<String> = filterable(keywords)
                .take(5)
                .enumerate()
                .map(|(i, keyword)| {
                    let name = bind(i, keyword);
                    format!(
                        "(LOWER(f.name) LIKE LOWER('%' || ${name} || '%') OR \
                         LOWER(f.location) LIKE LOWER('%' || ${name} || '%'))"
                    )
                })
                .collect();
            let where_clause =
                if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" OR ") };

            let text = format!(
                "SELECT {} FROM {from_clause} WHERE {where_clause} \
                 GROUP BY f.id, f.name, f.location, f.primary_crop, f.size_acres \
                 ORDER BY f.size_acres DESC LIMIT {limit}",
                select_fields.join(", ")
            );
            let mut spec = QuerySpec::new(QueryLanguage::Relational, text, limit);
            spec.params = params;
            return spec;
        }

        if tables.iter().any(|t| t == "farms") {
            let conditions: Vec<String> = filterable(keywords)
                .take(5)
                .enumerate()
                .map(|(i, keyword)| {
                    let name = bind(i, keyword);
                    format!(
                        "(LOWER(f.name) LIKE LOWER('%' || ${name} || '%') OR \
                         LOWER(f.location) LIKE LOWER('%' || ${name} || '%') OR \
                         LOWER(f.primary_crop) LIKE LOWER('%' || ${name} || '%') OR \
                         LOWER(f.state) LIKE LOWER('%' || ${name} || '%'))"
                    )
                })
                .collect();
            let where_clause =
                if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" OR ") };

            let text = format!(
                "SELECT f.id, f.name, f.location, f.primary_crop, f.size_acres, f.state, f.county \
                 FROM farms f WHERE {where_clause} \
                 ORDER BY f.size_acres DESC LIMIT {limit}"
            );
            let mut spec = QuerySpec::new(QueryLanguage::Relational, text, limit);
            spec.params = params;
            return spec;
        }

        // Fallback: state metrics table for general data.
        let conditions: Vec<String> = filterable(keywords)
            .take(5)
            .enumerate()
            .map(|(i, keyword)| {
                let name = bind(i, keyword);
                format!(
                    "(LOWER(place_name) LIKE LOWER('%' || ${name} || '%') OR \
                     LOWER(metric_type) LIKE LOWER('%' || ${name} || '%'))"
                )
            })
            .collect();
        let where_clause =
            if conditions.is_empty() { "1=1".to_string() } else { conditions.join(" OR ") };

        let text = format!(
            "SELECT place_name, year, metric_type, value, source \
             FROM state_agricultural_metrics WHERE {where_clause} \
             ORDER BY year DESC, value DESC LIMIT {limit}"
        );
        let mut spec = QuerySpec::new(QueryLanguage::Relational, text, limit);
        spec.params = params;
        spec
    }

    /// Produce a human-readable description of a generated query.
    pub fn explain(&self, spec: &QuerySpec) -> String {
        let sql = &spec.text;
        let mut explanation = String::from("This query ");

        if sql.contains("AVG(") || sql.contains("SUM(") || sql.contains("COUNT(") {
            explanation.push_str("aggregates data ");
        }
        if sql.contains("JOIN") {
            if sql.contains("production_records") {
                explanation.push_str("including production history ");
            }
            if sql.contains("equipment") {
                explanation.push_str("including equipment information ");
            }
            if sql.contains("suppliers") {
                explanation.push_str("including supplier relationships ");
            }
            if sql.contains("weather_events") {
                explanation.push_str("including weather impact data ");
            }
        }
        if sql.contains("WHERE") && !sql.contains("WHERE 1=1") {
            explanation.push_str("with specific filtering conditions ");
        }
        if sql.contains("GROUP BY") {
            explanation.push_str("grouped by key attributes ");
        }
        if sql.contains("ORDER BY") {
            if sql.contains("DESC") {
                explanation.push_str("sorted in descending order ");
            } else {
                explanation.push_str("sorted in ascending order ");
            }
        }

        explanation.trim_end().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kws(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn test_impact_strategy_needs_weather_keyword() {
        let synth = SqlSynthesizer::new();

        let spec = synth.synthesize(Intent::ImpactAnalysis, &kws(&["drought", "corn"]), 50);
        assert!(spec.text.contains("weather_events"));
        assert!(spec.text.contains("LIMIT 50"));

        // Without a weather keyword the impact intent falls back to general.
        let spec = synth.synthesize(Intent::ImpactAnalysis, &kws(&["corn"]), 50);
        assert!(!spec.text.contains("weather_events"));
    }

    #[test]
    fn test_trend_strategy_prefers_production_records() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::TrendAnalysis, &kws(&["production", "corn"]), 25);
        assert!(spec.text.contains("production_records"));
        assert!(spec.text.contains("GROUP BY pr.year"));
        assert!(spec.text.contains("LIMIT 25"));
    }

    #[test]
    fn test_trend_fallback_binds_state_names() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::TrendAnalysis, &kws(&["iowa", "metrics"]), 50);
        assert!(spec.text.contains("state_agricultural_metrics"));
        assert!(spec.text.contains("$kw0"));
        assert_eq!(spec.params.get("kw0").map(String::as_str), Some("iowa"));
        assert!(!spec.text.to_lowercase().contains("'iowa'"));
    }

    #[test]
    fn test_general_strategy_binds_filter_tokens() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::General, &kws(&["farms", "sunrise"]), 50);
        assert!(spec.text.contains("$kw0"));
        assert_eq!(spec.params.get("kw0").map(String::as_str), Some("farms"));
        assert!(spec.involved_entities.contains(&"farms".to_string()));
    }

    #[test]
    fn test_general_strategy_skips_intent_and_numeric_tokens() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::General, &kws(&["impact", "2023", "corn"]), 50);
        assert_eq!(spec.params.len(), 1);
        assert_eq!(spec.params.get("kw0").map(String::as_str), Some("corn"));
    }

    #[test]
    fn test_empty_keywords_produce_unfiltered_general_query() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::General, &[], 10);
        assert!(spec.text.contains("WHERE 1=1"));
        assert!(spec.text.contains("LIMIT 10"));
        assert!(spec.params.is_empty());
    }

    #[test]
    fn test_prediction_uses_general_strategy() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::Prediction, &kws(&["corn"]), 50);
        let general = synth.synthesize(Intent::General, &kws(&["corn"]), 50);
        assert_eq!(spec.text, general.text);
    }

    #[test]
    fn test_location_strategy_binds_location() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::LocationBased, &kws(&["location", "iowa"]), 50);
        assert!(spec.text.contains("$loc"));
        assert_eq!(spec.params.get("loc").map(String::as_str), Some("iowa"));
    }

    #[test]
    fn test_explain_mentions_joins_and_ordering() {
        let synth = SqlSynthesizer::new();
        let spec = synth.synthesize(Intent::Ranking, &kws(&["best", "farms"]), 50);
        let explanation = synth.explain(&spec);
        assert!(explanation.contains("aggregates data"));
        assert!(explanation.contains("descending"));
    }
}
