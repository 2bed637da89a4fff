use std::collections::BTreeMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::listing::ListingCandidate;

const DEFAULT_SYNONYMS: &[(&str, &[&str])] = &[
    ("teclado", &["keyboard", "clavier", "tastiera", "tastatur", "klavye"]),
    ("apex", &["apex"]),
    ("pro", &["pro", "professional"]),
    ("v3", &["v3", "version3", "3"]),
    ("rato", &["mouse", "souris", "maus"]),
    ("auscultadores", &["headphones", "headset", "casque", "kopfhörer", "cuffie"]),
    ("botas", &["boots", "bottes", "stiefel", "stivali"]),
    ("sapatilhas", &["sneakers", "trainers", "baskets", "zapatillas"]),
    ("casaco", &["jacket", "coat", "veste", "jacke", "chaqueta"]),
    ("telemovel", &["phone", "smartphone", "telefone", "handy"]),
    ("relogio", &["watch", "montre", "uhr", "reloj"]),
    ("mochila", &["backpack", "sac à dos", "rucksack", "zaino"]),
];

/// Query token -> equivalent words in other languages. A query token counts
/// as matched when it, or any of its equivalents, occurs in a title.
/// Keys and words are stored lowercased, however they were written in config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, Vec<String>>")]
pub struct SynonymTable(BTreeMap<String, Vec<String>>);

impl From<BTreeMap<String, Vec<String>>> for SynonymTable {
    fn from(raw: BTreeMap<String, Vec<String>>) -> Self {
        let mut table = SynonymTable(BTreeMap::new());
        for (token, words) in &raw {
            let words: Vec<&str> = words.iter().map(String::as_str).collect();
            table.extend(token, &words);
        }
        table
    }
}

impl Default for SynonymTable {
    fn default() -> Self {
        SynonymTable(
            DEFAULT_SYNONYMS
                .iter()
                .map(|(token, words)| (token.to_string(), words.iter().map(|w| w.to_string()).collect()))
                .collect(),
        )
    }
}

impl SynonymTable {
    pub fn equivalents(&self, token: &str) -> &[String] {
        self.0.get(token).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn extend(&mut self, token: &str, words: &[&str]) {
        self.0
            .entry(token.to_lowercase())
            .or_default()
            .extend(words.iter().map(|w| w.to_lowercase()));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelevanceConfig {
    /// Candidates scoring below this are dropped.
    pub admission_threshold: f64,
    /// Scores are logged once more than this many tokens match.
    pub report_min_matches: usize,
    pub max_results: usize,
    pub synonyms: SynonymTable,
}

impl Default for RelevanceConfig {
    fn default() -> Self {
        RelevanceConfig {
            admission_threshold: 0.20,
            report_min_matches: 0,
            max_results: 10,
            synonyms: SynonymTable::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevanceScore {
    pub matching_words: usize,
    pub token_count: usize,
    pub score: f64,
}

pub struct RelevanceFilter {
    config: RelevanceConfig,
}

impl RelevanceFilter {
    pub fn new(config: RelevanceConfig) -> Self {
        RelevanceFilter { config }
    }

    pub fn score(&self, query: &str, title: &str) -> RelevanceScore {
        let title_lower = title.to_lowercase();
        let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

        let matching_words = tokens
            .iter()
            .filter(|token| {
                title_lower.contains(token.as_str())
                    || self
                        .config
                        .synonyms
                        .equivalents(token)
                        .iter()
                        .any(|word| title_lower.contains(word.as_str()))
            })
            .count();

        let score = if tokens.is_empty() {
            0.0
        } else {
            matching_words as f64 / tokens.len() as f64
        };

        if matching_words > self.config.report_min_matches {
            debug!(
                "Relevance '{}': {}/{} (ratio {:.2})",
                title.chars().take(40).collect::<String>(),
                matching_words,
                tokens.len(),
                score
            );
        }

        RelevanceScore {
            matching_words,
            token_count: tokens.len(),
            score,
        }
    }

    /// Scores, drops candidates under the admission threshold, and returns the
    /// best `max_results` by descending score. Ties keep discovery order.
    pub fn filter(&self, query: &str, candidates: Vec<ListingCandidate>) -> Vec<ListingCandidate> {
        let total = candidates.len();
        let mut relevant: Vec<ListingCandidate> = candidates
            .into_iter()
            .filter_map(|mut candidate| {
                let relevance = self.score(query, candidate.title());
                if relevance.score < self.config.admission_threshold {
                    debug!("Rejected '{}' (score {:.2})", candidate.title(), relevance.score);
                    return None;
                }
                candidate.set_relevance(relevance.score);
                Some(candidate)
            })
            .collect();

        relevant.sort_by(|a, b| b.relevance_score().total_cmp(&a.relevance_score()));
        relevant.truncate(self.config.max_results);

        info!("Relevant listings: {} of {}", relevant.len(), total);
        for (i, item) in relevant.iter().take(3).enumerate() {
            debug!("  {}. '{}' - {:.2}", i + 1, item.title(), item.price());
        }
        relevant
    }
}
