use shelf::query::{normalize_query, QueryError, MIN_QUERY_CHARS};

#[test]
fn trims_and_collapses_whitespace() {
    let q = normalize_query("  wizard \t  books\n").expect("valid");
    assert_eq!(q.as_str(), "wizard books");
    assert_eq!(q.term_count(), 2);
}

#[test]
fn rejects_empty_and_whitespace_only() {
    assert_eq!(normalize_query(""), Err(QueryError::Empty));
    assert_eq!(normalize_query(" \t\n "), Err(QueryError::Empty));
}

#[test]
fn enforces_minimum_length_after_trimming() {
    assert_eq!(
        normalize_query("  a  "),
        Err(QueryError::TooShort { min: MIN_QUERY_CHARS, actual: 1 })
    );
    assert!(normalize_query("ab").is_ok());
    assert!(normalize_query("a b").is_ok());
}

#[test]
fn counts_characters_not_bytes() {
    assert!(normalize_query("é").is_err());
    assert_eq!(normalize_query("日本").unwrap().as_str(), "日本");
}
