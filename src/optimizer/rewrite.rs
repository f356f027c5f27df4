//! String-level rewrites of the final RETURN clause.
//!
//! Only the last RETURN of a query is ever touched. Anything before it,
//! including WITH ... ORDER BY pipelines, is passed through verbatim.

use lazy_static::lazy_static;
use regex::Regex;

use super::Projection;
use crate::queries::is_identifier;

lazy_static! {
    static ref RETURN_KEYWORD: Regex = Regex::new(r"(?i)\bRETURN\b").unwrap();
    static ref RETURN_TAIL: Regex = Regex::new(
        r"(?is)^(?P<items>.*?)(?:\s+ORDER\s+BY\s+(?P<order>.*?))?(?:\s+SKIP\s+(?P<skip>[^\s;]+))?(?:\s+LIMIT\s+(?P<limit>[^\s;]+))?\s*;?\s*$"
    )
    .unwrap();
    static ref DISTINCT_PREFIX: Regex = Regex::new(r"(?i)^DISTINCT\b").unwrap();
    static ref WHITESPACE: Regex = Regex::new(r"\s+").unwrap();
}

/// The final RETURN clause split into its parts.
#[derive(Debug, PartialEq)]
struct FinalReturn<'a> {
    head: &'a str,
    items: &'a str,
    order_by: Option<&'a str>,
    skip: Option<&'a str>,
    limit: Option<&'a str>,
}

fn parse_final_return(query: &str) -> Option<FinalReturn<'_>> {
    let keyword = RETURN_KEYWORD.find_iter(query).last()?;
    let body = &query[keyword.end()..];
    let caps = RETURN_TAIL.captures(body)?;
    let items = caps.name("items")?.as_str().trim();
    if items.is_empty() {
        return None;
    }
    Some(FinalReturn {
        head: query[..keyword.start()].trim_end(),
        items,
        order_by: caps.name("order").map(|m| m.as_str().trim()),
        skip: caps.name("skip").map(|m| m.as_str()),
        limit: caps.name("limit").map(|m| m.as_str()),
    })
}

fn join_clauses(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Splits on commas that are not nested in brackets, braces or parentheses.
fn split_top_level(items: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut in_string: Option<char> = None;
    let mut start = 0;

    for (i, c) in items.char_indices() {
        match (in_string, c) {
            (Some(q), c) if c == q => in_string = None,
            (Some(_), _) => {}
            (None, '\'' | '"') => in_string = Some(c),
            (None, '(' | '[' | '{') => depth += 1,
            (None, ')' | ']' | '}') => depth -= 1,
            (None, ',') if depth == 0 => {
                parts.push(items[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(items[start..].trim());
    parts
}

/// Collapses runs of whitespace so formatting never changes a cache key.
pub fn normalize_whitespace(query: &str) -> String {
    WHITESPACE.replace_all(query.trim(), " ").into_owned()
}

/// Row-count variant of `query`: ORDER BY, SKIP and LIMIT are dropped and
/// the final projection becomes `count(*)`. `None` when there is no RETURN.
pub fn count_query(query: &str) -> Option<String> {
    let ret = parse_final_return(query)?;
    let counted = if DISTINCT_PREFIX.is_match(ret.items) {
        join_clauses(&[ret.head, "WITH", ret.items, "RETURN count(*) AS total"])
    } else {
        join_clauses(&[ret.head, "RETURN count(*) AS total"])
    };
    Some(counted)
}

/// Replaces any SKIP/LIMIT of the final RETURN with the given window,
/// keeping ORDER BY so pages are stable.
pub fn paginate(query: &str, skip: usize, limit: usize) -> String {
    let window = format!("SKIP {skip} LIMIT {limit}");
    match parse_final_return(query) {
        Some(ret) => {
            let order = ret.order_by.map(|o| format!("ORDER BY {o}")).unwrap_or_default();
            join_clauses(&[ret.head, "RETURN", ret.items, &order, &window])
        }
        None => join_clauses(&[query.trim().trim_end_matches(';'), &window]),
    }
}

pub fn has_limit(query: &str) -> bool {
    parse_final_return(query).is_some_and(|ret| ret.limit.is_some())
}

pub fn append_limit(query: &str, limit: usize) -> String {
    format!("{} LIMIT {limit}", query.trim().trim_end_matches(';').trim_end())
}

/// Rewrites bare variables of the final RETURN into map projections of the
/// requested properties (`n` becomes `n {.name, .title} AS n`).
pub fn apply_projection(query: &str, projection: &Projection) -> String {
    let Some(ret) = parse_final_return(query) else {
        return query.to_string();
    };

    let (distinct, items) = match DISTINCT_PREFIX.find(ret.items) {
        Some(m) => ("DISTINCT", ret.items[m.end()..].trim()),
        None => ("", ret.items),
    };

    let mut changed = false;
    let rewritten: Vec<String> = split_top_level(items)
        .into_iter()
        .map(|item| {
            let fields: Vec<String> = projection
                .get(item)
                .filter(|_| is_identifier(item))
                .map(|props| {
                    props
                        .iter()
                        .filter(|p| is_identifier(p))
                        .map(|p| format!(".{p}"))
                        .collect()
                })
                .unwrap_or_default();
            if fields.is_empty() {
                item.to_string()
            } else {
                changed = true;
                format!("{item} {{{}}} AS {item}", fields.join(", "))
            }
        })
        .collect();

    if !changed {
        return query.to_string();
    }

    let items = rewritten.join(", ");
    let order = ret.order_by.map(|o| format!("ORDER BY {o}")).unwrap_or_default();
    let skip = ret.skip.map(|s| format!("SKIP {s}")).unwrap_or_default();
    let limit = ret.limit.map(|l| format!("LIMIT {l}")).unwrap_or_default();
    join_clauses(&[ret.head, "RETURN", distinct, &items, &order, &skip, &limit])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_final_return_splits_clauses() {
        let ret = parse_final_return(
            "MATCH (n:Person) WITH n ORDER BY n.age RETURN n, n.name ORDER BY n.name SKIP 5 LIMIT $limit;",
        )
        .unwrap();
        assert_eq!(ret.head, "MATCH (n:Person) WITH n ORDER BY n.age");
        assert_eq!(ret.items, "n, n.name");
        assert_eq!(ret.order_by, Some("n.name"));
        assert_eq!(ret.skip, Some("5"));
        assert_eq!(ret.limit, Some("$limit"));
    }

    #[test]
    fn test_count_query_strips_window_and_order() {
        assert_eq!(
            count_query("MATCH (n:Person) RETURN n ORDER BY n.name SKIP 5 LIMIT 10").as_deref(),
            Some("MATCH (n:Person) RETURN count(*) AS total")
        );
        assert_eq!(
            count_query("match (n)-[r]-(m) return distinct n, m limit 3").as_deref(),
            Some("match (n)-[r]-(m) WITH distinct n, m RETURN count(*) AS total")
        );
        assert_eq!(count_query("CREATE (n:Person)"), None);
    }

    #[test]
    fn test_paginate_replaces_existing_window() {
        assert_eq!(
            paginate("MATCH (n) RETURN n ORDER BY n.name LIMIT 500", 20, 10),
            "MATCH (n) RETURN n ORDER BY n.name SKIP 20 LIMIT 10"
        );
        assert_eq!(
            paginate("MATCH (n)\n  RETURN n", 0, 25),
            "MATCH (n) RETURN n SKIP 0 LIMIT 25"
        );
    }

    #[test]
    fn test_has_limit_only_checks_final_return() {
        assert!(has_limit("MATCH (n) RETURN n LIMIT 5"));
        assert!(!has_limit("MATCH (n) WITH n LIMIT 5 RETURN n"));
        assert_eq!(append_limit("MATCH (n) RETURN n;", 1000), "MATCH (n) RETURN n LIMIT 1000");
    }

    #[test]
    fn test_projection_rewrites_bare_variables() {
        let projection = Projection::from([
            ("n".to_string(), vec!["name".to_string(), "title".to_string()]),
            ("r".to_string(), vec!["since".to_string()]),
        ]);
        assert_eq!(
            apply_projection("MATCH (n)-[r]->(m) RETURN n, r, m.name ORDER BY n.name LIMIT 5", &projection),
            "MATCH (n)-[r]->(m) RETURN n {.name, .title} AS n, r {.since} AS r, m.name ORDER BY n.name LIMIT 5"
        );
    }

    #[test]
    fn test_projection_leaves_unknown_items_alone() {
        let projection = Projection::from([("x".to_string(), vec!["name".to_string()])]);
        let query = "MATCH (n) RETURN n, collect(n.tags, ',')";
        assert_eq!(apply_projection(query, &projection), query);
    }

    #[test]
    fn test_split_respects_nesting_and_strings() {
        assert_eq!(
            split_top_level("n, coalesce(n.a, 'x,y'), [1, 2]"),
            vec!["n", "coalesce(n.a, 'x,y')", "[1, 2]"]
        );
    }

    #[test]
    fn test_normalize_whitespace() {
        assert_eq!(normalize_whitespace("  MATCH (n)\n\tRETURN   n "), "MATCH (n) RETURN n");
    }
}
