use regex::Regex;
use std::sync::LazyLock;

static FENCE_MARKERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)```sql|```").expect("fence pattern is valid"));

/// Strips Markdown code fences (```sql / ```) from an LLM response and trims it.
///
/// The remainder is not checked for being valid SQL; the database and the
/// reviewing user are the judges of that.
pub fn extract_sql(response: &str) -> String {
    FENCE_MARKERS.replace_all(response, "").trim().to_string()
}
