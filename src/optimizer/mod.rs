//! Pagination, projection and plan diagnostics over a live executor.

pub mod rewrite;
pub mod schema;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, instrument, warn};

use crate::error::{ExplorerError, ExplorerResult};
use crate::executor::{extract_graph, GraphValue, QueryExecutor, Record};
use crate::models::{GraphData, Params};

pub use self::rewrite::{apply_projection, count_query, has_limit, paginate};
pub use self::schema::{IndexInfo, SchemaInspector};

/// Variable name to the properties it should return.
pub type Projection = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub limit: usize,
    pub skip: usize,
    pub projection: Option<Projection>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            limit: 100,
            skip: 0,
            projection: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResult {
    pub data: Vec<Record>,
    /// Absent when the count query could not be derived or failed.
    pub total: Option<u64>,
    pub has_more: bool,
    pub next_skip: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    pub projection: Option<Projection>,
    /// LIMIT appended when the final RETURN has none.
    pub default_limit: Option<usize>,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            projection: None,
            default_limit: Some(1000),
        }
    }
}

/// Graph values found in the rows, plus the raw rows when a projection
/// turned nodes into maps that cannot be extracted as graph elements.
#[derive(Debug, Clone, Default, Serialize)]
pub struct OptimizedResult {
    #[serde(flatten)]
    pub graph: GraphData,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub records: Vec<Record>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryAnalysis {
    pub plan: Vec<String>,
    pub estimated_rows: Option<u64>,
    pub warnings: Vec<String>,
}

fn with_projection(query: &str, projection: Option<&Projection>) -> String {
    match projection {
        Some(projection) if !projection.is_empty() => apply_projection(query, projection),
        _ => query.to_string(),
    }
}

async fn fetch_total<E: QueryExecutor + ?Sized>(executor: &E, query: &str, params: &Params) -> Option<u64> {
    let counted = count_query(query)?;
    match executor.run(&counted, params).await {
        Ok(result) => result
            .records
            .first()
            .and_then(|record| record.get("total").or_else(|| record.get_index(0)))
            .and_then(GraphValue::as_i64)
            .map(|total| total.max(0) as u64),
        Err(e) => {
            warn!("Count query failed, total unknown: {}", e);
            None
        }
    }
}

/// Fetches one page of `query`. The total comes from a best-effort count
/// query; when it is unknown, a full page is taken to mean more rows exist.
#[instrument(skip(executor, params, config), fields(skip = config.skip, limit = config.limit))]
pub async fn execute_paginated<E: QueryExecutor + ?Sized>(
    executor: &E,
    query: &str,
    params: &Params,
    config: &PaginationConfig,
) -> ExplorerResult<PaginatedResult> {
    if config.limit == 0 {
        return Err(ExplorerError::invalid_query("Page limit must be at least 1"));
    }
    // Cypher integers are i64
    let end = config
        .skip
        .checked_add(config.limit)
        .filter(|end| *end <= i64::MAX as usize)
        .ok_or_else(|| {
            ExplorerError::invalid_query(format!(
                "Page window skip {} + limit {} is out of range",
                config.skip, config.limit
            ))
        })?;

    let projected = with_projection(query, config.projection.as_ref());
    let total = fetch_total(executor, &projected, params).await;

    let page_query = paginate(&projected, config.skip, config.limit);
    let data = executor.run(&page_query, params).await?.records;

    let has_more = match total {
        Some(total) => (end as u64) < total,
        None => data.len() == config.limit,
    };

    debug!(
        "Page returned {} rows (total {:?}, has_more {})",
        data.len(),
        total,
        has_more
    );

    Ok(PaginatedResult {
        data,
        total,
        has_more,
        next_skip: has_more.then_some(end),
    })
}

/// Projection first, then a LIMIT guard if the query has none.
pub fn optimize_query(query: &str, options: &OptimizeOptions) -> String {
    let projected = with_projection(query, options.projection.as_ref());
    match options.default_limit {
        Some(limit) if !has_limit(&projected) => rewrite::append_limit(&projected, limit),
        _ => projected,
    }
}

#[instrument(skip(executor, params, options))]
pub async fn execute_optimized<E: QueryExecutor + ?Sized>(
    executor: &E,
    query: &str,
    params: &Params,
    options: &OptimizeOptions,
) -> ExplorerResult<OptimizedResult> {
    let optimized = optimize_query(query, options);
    let result = executor.run(&optimized, params).await?;
    let graph = extract_graph(&result);
    let projected = options.projection.as_ref().is_some_and(|p| !p.is_empty());

    Ok(OptimizedResult {
        graph,
        records: if projected { result.records } else { Vec::new() },
    })
}

lazy_static! {
    static ref ESTIMATED_ROWS: Regex =
        Regex::new(r"(?i)(?:estimated\s*rows|rows)\s*[:=]\s*(\d+)").unwrap();
    static ref LABELLED_VARIABLE: Regex = Regex::new(r"\(\s*(\w+)\s*:\s*(\w+)").unwrap();
    static ref INLINE_FILTER: Regex = Regex::new(r"\(\s*(\w+)\s*:\s*(\w+)\s*\{([^}]*)\}").unwrap();
    static ref INLINE_KEY: Regex = Regex::new(r"(\w+)\s*:").unwrap();
    static ref WHERE_FILTER: Regex = Regex::new(
        r"(?i)\b(\w+)\.(\w+)\s*(?:=|<>|<=|>=|<|>|\bIN\b|\bSTARTS\s+WITH\b|\bENDS\s+WITH\b|\bCONTAINS\b)"
    )
    .unwrap();
}

const PLAN_CHECKS: &[(&str, &str)] = &[
    (
        "All Node Scan",
        "Full node scan: every node is visited. Add a label or an indexed filter",
    ),
    (
        "Cartesian Product",
        "Cartesian product: disconnected patterns multiply row counts",
    ),
    (
        "Eager",
        "Eager operator: intermediate results are fully materialized before continuing",
    ),
    (
        "Label Scan",
        "Label scan: all nodes with the label are read. Consider an index on the filtered property",
    ),
];

/// (label, property) pairs the query filters on, by MATCH-bound variable.
fn filtered_properties(query: &str) -> BTreeSet<(String, String)> {
    let labels: HashMap<&str, &str> = LABELLED_VARIABLE
        .captures_iter(query)
        .filter_map(|c| Some((c.get(1)?.as_str(), c.get(2)?.as_str())))
        .collect();

    let mut filters = BTreeSet::new();
    for caps in INLINE_FILTER.captures_iter(query) {
        let label = &caps[2];
        for key in INLINE_KEY.captures_iter(&caps[3]) {
            filters.insert((label.to_string(), key[1].to_string()));
        }
    }
    for caps in WHERE_FILTER.captures_iter(query) {
        if let Some(label) = labels.get(&caps[1]) {
            filters.insert((label.to_string(), caps[2].to_string()));
        }
    }
    filters
}

/// Explains `query` and reports known plan anti-patterns. Purely advisory.
#[instrument(skip(executor, params))]
pub async fn analyze_query<E: QueryExecutor + ?Sized>(
    executor: &E,
    query: &str,
    params: &Params,
) -> ExplorerResult<QueryAnalysis> {
    let plan = executor.explain(query, params).await?;

    let mut warnings: Vec<String> = PLAN_CHECKS
        .iter()
        .filter(|(operator, _)| plan.iter().any(|line| line.contains(operator)))
        .map(|(_, warning)| warning.to_string())
        .collect();

    let estimated_rows = plan
        .iter()
        .filter_map(|line| ESTIMATED_ROWS.captures(line))
        .filter_map(|c| c[1].parse::<u64>().ok())
        .max();

    let filters = filtered_properties(query);
    if !filters.is_empty() {
        match executor.list_indexes().await {
            Ok(indexes) => {
                for (label, property) in filters {
                    if !indexes.iter().any(|index| index.covers(&label, &property)) {
                        warnings.push(format!("No index on :{label}({property})"));
                    }
                }
            }
            Err(e) => debug!("Index check skipped: {}", e),
        }
    }

    Ok(QueryAnalysis {
        plan,
        estimated_rows,
        warnings,
    })
}
