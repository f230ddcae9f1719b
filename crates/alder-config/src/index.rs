//! Value index (LSH) configuration.

use serde::{Deserialize, Serialize};

const fn default_num_perm() -> usize {
    128
}

const fn default_bands() -> usize {
    32
}

const fn default_ngram() -> usize {
    3
}

const fn default_top_k() -> usize {
    5
}

const fn default_min_similarity() -> f64 {
    0.3
}

const fn default_max_values_per_column() -> usize {
    50_000
}

fn default_index_dir() -> String {
    "data/value_index".to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IndexConfig {
    /// Directory holding one `<db_id>.json` index per database.
    #[serde(default = "default_index_dir")]
    pub index_dir: String,

    /// `MinHash` permutations per sketch. Must be divisible by `bands`.
    #[serde(default = "default_num_perm")]
    pub num_perm: usize,

    #[serde(default = "default_bands")]
    pub bands: usize,

    /// Character n-gram width used for shingling.
    #[serde(default = "default_ngram")]
    pub ngram: usize,

    /// Matches returned per grounded keyword.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Matches below this estimated Jaccard similarity are discarded.
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,

    /// Cap on distinct values read from one column at build time.
    #[serde(default = "default_max_values_per_column")]
    pub max_values_per_column: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            index_dir: default_index_dir(),
            num_perm: default_num_perm(),
            bands: default_bands(),
            ngram: default_ngram(),
            top_k: default_top_k(),
            min_similarity: default_min_similarity(),
            max_values_per_column: default_max_values_per_column(),
        }
    }
}
