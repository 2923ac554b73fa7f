/// Column the cleaner repairs and the transformer scales, after normalization.
pub const VALUE_COLUMN: &str = "value";

/// Multiplier applied to every entry of the value column.
pub const VALUE_SCALE_FACTOR: i64 = 2;

// Defaults used when neither the config file nor the environment says otherwise
pub const DEFAULT_INPUT_PATH: &str = "input.csv";
pub const DEFAULT_OUTPUT_PATH: &str = "output.csv";
pub const DEFAULT_STAGING_DB: &str = "staging.db";
pub const DEFAULT_STAGING_TABLE: &str = "staging_table";
pub const DEFAULT_LOG_DIR: &str = "logs";
pub const DEFAULT_CONFIG_FILE: &str = "etl.toml";

/// Source files must carry one of these extensions.
pub const ALLOWED_SOURCE_EXTENSIONS: &[&str] = &["csv"];

/// Cell contents read as a missing marker on ingest.
pub const NA_TOKENS: &[&str] = &[
    "",
    "#N/A",
    "#N/A N/A",
    "#NA",
    "-1.#IND",
    "-1.#QNAN",
    "-NaN",
    "-nan",
    "1.#IND",
    "1.#QNAN",
    "<NA>",
    "N/A",
    "NA",
    "NULL",
    "NaN",
    "None",
    "n/a",
    "nan",
    "null",
];

/// Check whether a cell should be read as missing
pub fn is_na_token(raw: &str) -> bool {
    NA_TOKENS.contains(&raw)
}
