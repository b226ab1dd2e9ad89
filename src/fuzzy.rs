use strsim::{jaro_winkler, normalized_levenshtein};

/// Weight of query-side coverage in the combined score; the remainder is
/// record-side precision, which only separates otherwise equal candidates.
const COVERAGE_WEIGHT: f64 = 0.9;

/// Settings for one fuzzy search pass
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchOptions {
    /// Highest score (0.0 = exact, 1.0 = nothing in common) a candidate may
    /// have and still be returned
    pub threshold: f64,
    /// Tokens shorter than this only count when they match exactly
    pub min_match_len: usize,
    /// Maximum number of candidates returned
    pub limit: usize,
    /// Token pairs less similar than this count as unrelated (0.0)
    pub min_token_similarity: f64,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            threshold: 0.4,
            min_match_len: 3,
            limit: 10,
            min_token_similarity: 0.75,
        }
    }
}

/// A scored search hit, pointing back into the searched collection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hit {
    pub position: usize,
    pub score: f64,
}

/// Token-order independent fuzzy scorer
///
/// Both strings are split on whitespace. Every query token is paired with its
/// most similar record token, so "gas natural" and "natural gas" score the
/// same. Scores follow the 0 = exact, 1 = no match convention.
#[derive(Debug, Clone, Copy, Default)]
pub struct FuzzyMatcher {
    pub options: SearchOptions,
}

impl FuzzyMatcher {
    pub fn new(options: SearchOptions) -> Self {
        Self { options }
    }

    /// Similarity of two single tokens in 0.0..=1.0 (higher = more similar).
    ///
    /// Jaro-Winkler rewards shared prefixes and tolerates transpositions;
    /// normalized Levenshtein keeps unrelated words with a few common letters
    /// from scoring well. The mean of the two is used, and anything below
    /// `min_token_similarity` is treated as no resemblance at all, so many
    /// weak partial matches cannot add up to a hit.
    pub fn token_similarity(&self, a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }
        let min_len = self.options.min_match_len;
        if a.chars().count() < min_len || b.chars().count() < min_len {
            return 0.0;
        }
        let similarity = (jaro_winkler(a, b) + normalized_levenshtein(a, b)) / 2.0;
        if similarity < self.options.min_token_similarity {
            0.0
        } else {
            similarity
        }
    }

    /// Length-weighted mean of the best similarity each `from` token finds
    /// among the `to` tokens.
    fn coverage(&self, from: &[&str], to: &[&str]) -> f64 {
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for token in from {
            let weight = token.chars().count() as f64;
            let best = to
                .iter()
                .map(|other| self.token_similarity(token, other))
                .fold(0.0, f64::max);
            weighted += weight * best;
            total_weight += weight;
        }

        if total_weight > 0.0 {
            weighted / total_weight
        } else {
            0.0
        }
    }

    /// Score a tokenized query against a tokenized record.
    pub fn score_tokens(&self, query: &[&str], record: &[&str]) -> f64 {
        if query.is_empty() || record.is_empty() {
            return 1.0;
        }
        let coverage = self.coverage(query, record);
        let precision = self.coverage(record, query);
        let similarity = COVERAGE_WEIGHT * coverage + (1.0 - COVERAGE_WEIGHT) * precision;
        (1.0 - similarity).clamp(0.0, 1.0)
    }

    pub fn score(&self, query: &str, record: &str) -> f64 {
        let query: Vec<&str> = query.split_whitespace().collect();
        let record: Vec<&str> = record.split_whitespace().collect();
        self.score_tokens(&query, &record)
    }

    pub fn is_match(&self, query: &str, record: &str) -> bool {
        self.score(query, record) <= self.options.threshold
    }

    /// Scores every record and returns those within the threshold, best
    /// first, capped at the configured limit. Equal scores keep collection
    /// order.
    pub fn search<'a, I>(&self, query: &str, records: I) -> Vec<Hit>
    where
        I: IntoIterator<Item = &'a [String]>,
    {
        let query_tokens: Vec<&str> = query.split_whitespace().collect();
        if query_tokens.is_empty() || self.options.limit == 0 {
            return Vec::new();
        }

        let mut hits: Vec<Hit> = records
            .into_iter()
            .enumerate()
            .filter_map(|(position, tokens)| {
                let record: Vec<&str> = tokens.iter().map(String::as_str).collect();
                let score = self.score_tokens(&query_tokens, &record);
                (score <= self.options.threshold).then_some(Hit { position, score })
            })
            .collect();

        hits.sort_by(|a, b| a.score.total_cmp(&b.score));
        hits.truncate(self.options.limit);
        hits
    }
}
