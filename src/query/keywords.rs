use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::Intent;

/// Agricultural domain terms that are pulled to the front of the keyword
/// list when they appear in a query.
static DOMAIN_TERMS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        // Crops
        "corn", "wheat", "soybean", "rice", "cotton", "barley", "oats", "hay", "alfalfa",
        "sugarcane", "vegetables", "fruits", "grain",
        // Farm operations
        "farm", "farms", "farmer", "agriculture", "harvest", "planting", "irrigation",
        "cultivation", "crop", "yield", "production",
        // Equipment
        "tractor", "harvester", "planter", "sprayer", "equipment", "machinery", "implements",
        "maintenance", "repair",
        // Supply chain
        "supplier", "distributor", "elevator", "storage", "transport", "logistics", "supply",
        "chain", "market", "buyer", "seller",
        // Environmental
        "drought", "flood", "weather", "climate", "soil", "water", "rainfall", "temperature",
        "season", "environmental",
        // Economic
        "price", "cost", "revenue", "profit", "subsidy", "insurance", "loan", "credit",
        "investment", "economic", "financial",
        // Certifications
        "organic", "certified", "sustainable", "gmo", "conventional", "certification",
        "standard", "regulation", "compliance",
        // Locations
        "county", "state", "region", "area", "zone", "district", "iowa", "california", "texas",
        "nebraska", "kansas",
    ]
    .into_iter()
    .collect()
});

/// Common English stop words filtered out of the generic keyword pass.
static STOP_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and",
        "any", "are", "as", "at", "be", "because", "been", "before", "being", "below", "between",
        "both", "but", "by", "can", "could", "did", "do", "does", "doing", "down", "during",
        "each", "few", "for", "from", "further", "had", "has", "have", "having", "he", "her",
        "here", "hers", "him", "his", "how", "i", "if", "in", "into", "is", "it", "its", "just",
        "me", "more", "most", "my", "no", "nor", "not", "now", "of", "off", "on", "once", "only",
        "or", "other", "our", "out", "over", "own", "same", "she", "should", "show", "so", "some",
        "such", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
        "those", "through", "to", "too", "under", "until", "up", "very", "was", "we", "were",
        "what", "when", "where", "which", "while", "who", "whom", "why", "will", "with", "would",
        "you", "your",
    ]
    .into_iter()
    .collect()
});

/// Intent-indicator patterns appended as keyword tags, in declared order.
static INTENT_TAGS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    vec![
        ("impact", Regex::new(r"\b(affect|impact|influence|consequence)\b").unwrap()),
        ("trend", Regex::new(r"\b(trend|pattern|change|growth|decline)\b").unwrap()),
        ("comparison", Regex::new(r"\b(compare|versus|vs|difference|better|worse)\b").unwrap()),
        ("location", Regex::new(r"\b(where|location|region|area|near|nearby)\b").unwrap()),
        ("quantity", Regex::new(r"\b(how many|count|number|amount|total)\b").unwrap()),
        ("quality", Regex::new(r"\b(best|worst|top|bottom|reliable|quality)\b").unwrap()),
        ("prediction", Regex::new(r"\b(predict|forecast|future|will|expect)\b").unwrap()),
        ("relationship", Regex::new(r"\b(related|connected|linked|associated)\b").unwrap()),
    ]
});

/// Intent classification rules, tested in strict priority order. The first
/// matching rule wins; anything else is `General`.
static INTENT_RULES: Lazy<Vec<(Regex, Intent)>> = Lazy::new(|| {
    vec![
        (Regex::new(r"\b(predict|forecast|future)\b").unwrap(), Intent::Prediction),
        (Regex::new(r"\b(impact|affect|consequence)\b").unwrap(), Intent::ImpactAnalysis),
        (Regex::new(r"\b(trends?|patterns?|over time)\b").unwrap(), Intent::TrendAnalysis),
        (Regex::new(r"\b(compare|versus|vs)\b").unwrap(), Intent::Comparison),
        (Regex::new(r"\b(best|worst|top|most|least)\b").unwrap(), Intent::Ranking),
        (
            Regex::new(r"\b(where|location|near|within|miles|km|nearby)\b").unwrap(),
            Intent::LocationBased,
        ),
        (Regex::new(r"\b(how many|count|number)\b").unwrap(), Intent::Aggregation),
    ]
});

static NON_WORD: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s\-]").unwrap());
static NUMBERS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{4}\b|\b\d+\b").unwrap());

/// Extracts domain keywords from natural-language queries and classifies
/// their intent. Pure and deterministic given the input text.
#[derive(Debug, Default, Clone)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract up to `max_keywords` keywords from a query.
    ///
    /// Order of the result: domain terms in original order, then remaining
    /// non-stopword tokens of length > 2, then matched intent tags, then up
    /// to two numeric tokens. Duplicates are removed throughout.
    pub fn extract(&self, query: &str, max_keywords: usize) -> Vec<String> {
        let query_lower = query.to_lowercase();
        // Strip punctuation except hyphens before tokenizing.
        let cleaned = NON_WORD.replace_all(&query_lower, " ");
        let words: Vec<&str> = cleaned.split_whitespace().collect();

        let mut keywords: Vec<String> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();

        for word in &words {
            if DOMAIN_TERMS.contains(word) && seen.insert(word.to_string()) {
                keywords.push(word.to_string());
            }
        }

        for word in &words {
            if word.len() > 2 && !STOP_WORDS.contains(word) && seen.insert(word.to_string()) {
                keywords.push(word.to_string());
            }
        }

        for (tag, pattern) in INTENT_TAGS.iter() {
            if pattern.is_match(&query_lower) && seen.insert(tag.to_string()) {
                keywords.push(tag.to_string());
            }
        }

        for m in NUMBERS.find_iter(query).take(2) {
            let num = m.as_str().to_string();
            if seen.insert(num.clone()) {
                keywords.push(num);
            }
        }

        keywords.truncate(max_keywords);
        debug!(count = keywords.len(), ?keywords, "extracted keywords");
        keywords
    }

    /// Classify the intent of a query. Rules are checked in priority order;
    /// the first match wins.
    pub fn classify_intent(&self, query: &str) -> Intent {
        let query_lower = query.to_lowercase();
        for (pattern, intent) in INTENT_RULES.iter() {
            if pattern.is_match(&query_lower) {
                return *intent;
            }
        }
        Intent::General
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_keeps_domain_terms_first() {
        let extractor = KeywordExtractor::new();
        let keywords =
            extractor.extract("Show 2023 production data for farms with over 500 acres", 10);

        assert!(keywords.contains(&"2023".to_string()));
        assert!(keywords.contains(&"500".to_string()));

        let farms = keywords.iter().position(|k| k == "farms").unwrap();
        let production = keywords.iter().position(|k| k == "production").unwrap();
        let data = keywords.iter().position(|k| k == "data").unwrap();
        let acres = keywords.iter().position(|k| k == "acres").unwrap();
        assert!(farms < data && farms < acres);
        assert!(production < data && production < acres);
    }

    #[test]
    fn test_extract_respects_max_and_dedup() {
        let extractor = KeywordExtractor::new();
        let keywords = extractor
            .extract("corn corn wheat farms farms production yield weather drought price", 4);
        assert_eq!(keywords.len(), 4);

        let keywords =
            extractor.extract("corn corn wheat farms farms production yield weather", 20);
        let unique: HashSet<&String> = keywords.iter().collect();
        assert_eq!(unique.len(), keywords.len());
    }

    #[test]
    fn test_extract_appends_intent_tags() {
        let extractor = KeywordExtractor::new();
        let keywords = extractor.extract("How does drought impact corn yields?", 10);
        assert!(keywords.contains(&"impact".to_string()));
    }

    #[test]
    fn test_numeric_pass_appends_at_most_two() {
        let extractor = KeywordExtractor::new();

        // Year-length numbers survive the content-word pass, so none are lost.
        let keywords = extractor.extract("metrics for 1997 2002 2007 2012", 20);
        for year in ["1997", "2002", "2007", "2012"] {
            assert!(keywords.contains(&year.to_string()));
        }

        // Short numbers are skipped by the content-word pass and only the
        // numeric pass admits them, capped at two.
        let keywords = extractor.extract("rank fields 5 10 20 40", 20);
        let numbers: Vec<&String> =
            keywords.iter().filter(|k| k.chars().all(|c| c.is_ascii_digit())).collect();
        assert_eq!(numbers, ["5", "10"]);
    }

    #[test]
    fn test_classify_intent_priority_order() {
        let extractor = KeywordExtractor::new();

        // Impact beats trend when both markers are present.
        assert_eq!(
            extractor.classify_intent("What is the impact of drought on corn trends?"),
            Intent::ImpactAnalysis
        );
        // Prediction beats everything.
        assert_eq!(
            extractor.classify_intent("Forecast the impact of weather on yields"),
            Intent::Prediction
        );
        assert_eq!(
            extractor.classify_intent("Compare Iowa versus Texas"),
            Intent::Comparison
        );
        assert_eq!(
            extractor.classify_intent("Which states have the best yields?"),
            Intent::Ranking
        );
        assert_eq!(
            extractor.classify_intent("Where are the largest farms?"),
            Intent::LocationBased
        );
        assert_eq!(
            extractor.classify_intent("How many farms grow corn?"),
            Intent::Aggregation
        );
        assert_eq!(extractor.classify_intent("Tell me about Iowa"), Intent::General);
    }
}
