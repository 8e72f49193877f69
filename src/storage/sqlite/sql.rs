//! SQL helper functions for the clip store.
//!
//! - LIKE wildcard escaping for the substring fallback
//! - FTS5 prefix query construction
//! - `IN (...)` placeholder lists

/// Escapes SQL LIKE wildcards in a string to make them literal.
///
/// Pair with `ESCAPE '\'` in the LIKE clause.
///
/// # Examples
///
/// ```
/// use stashd::storage::sqlite::escape_like_wildcards;
///
/// assert_eq!(escape_like_wildcards("100%"), "100\\%");
/// assert_eq!(escape_like_wildcards("user_name"), "user\\_name");
/// assert_eq!(escape_like_wildcards("path\\file"), "path\\\\file");
/// ```
#[must_use]
pub fn escape_like_wildcards(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '%' | '_' | '\\' => {
                result.push('\\');
                result.push(c);
            },
            _ => result.push(c),
        }
    }
    result
}

/// Builds a `%query%` pattern for a literal substring match.
#[must_use]
pub fn contains_pattern(query: &str) -> String {
    format!("%{}%", escape_like_wildcards(query))
}

/// Quotes a token as an FTS5 string, doubling embedded quotes.
fn quote_fts_token(token: &str) -> String {
    let mut quoted = String::with_capacity(token.len() + 2);
    quoted.push('"');
    for c in token.chars() {
        if c == '"' {
            quoted.push_str("\"\"");
        } else {
            quoted.push(c);
        }
    }
    quoted.push('"');
    quoted
}

/// Builds the FTS5 prefix query for a free-text search.
///
/// Each whitespace-separated token becomes
/// `("tok"* OR metadata:"tok"* OR url:"tok"*)` and the groups are joined
/// with `AND`. Returns `None` when the query has no tokens.
///
/// # Examples
///
/// ```
/// use stashd::storage::sqlite::build_fts_query;
///
/// assert_eq!(
///     build_fts_query("inv").as_deref(),
///     Some(r#"("inv"* OR metadata:"inv"* OR url:"inv"*)"#)
/// );
/// assert_eq!(build_fts_query("   "), None);
/// ```
#[must_use]
pub fn build_fts_query(query: &str) -> Option<String> {
    let groups: Vec<String> = query
        .split_whitespace()
        .map(|token| {
            let quoted = quote_fts_token(token);
            format!("({quoted}* OR metadata:{quoted}* OR url:{quoted}*)")
        })
        .collect();

    if groups.is_empty() {
        None
    } else {
        Some(groups.join(" AND "))
    }
}

/// Returns `?1, ?2, ..., ?n` for binding a list of values.
#[must_use]
pub fn placeholders(count: usize) -> String {
    (1..=count)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
