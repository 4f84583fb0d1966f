//! Plan execution: the thin layer between a parsed plan and storage.
//!
//! Both entry points share one pipeline: snapshot the active row count at
//! the query timestamp, evaluate the predicate over that snapshot, fold in
//! row visibility, and either list the surviving offsets (retrieve) or hand
//! the complement to the vector searcher as an exclusion bitmap (search).
//! Empty segments and constant-false predicates short-circuit before any
//! further work.

use log::debug;

use crate::error::{PlanError, PlanResult};
use crate::executor::{PredicateExecutor, Selection};
use crate::plan::{Plan, PlanNodeKind, SearchInfo};
use crate::segment::{SegmentData, Timestamp};

/// One nearest-neighbor match.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SearchHit {
    pub row_offset: usize,
    pub distance: f32,
}

/// Ranked output of a vector search.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchResult {
    pub hits: Vec<SearchHit>,
}

/// Similarity kernel seam.
///
/// `excluded` has one bit per row of `[0, active_count)`; a set bit means
/// the row must not appear in the result. The searcher owns metric and
/// topk semantics from `SearchInfo`.
pub trait VectorSearcher {
    fn search(
        &self,
        info: &SearchInfo,
        active_count: usize,
        excluded: &[bool],
    ) -> PlanResult<Vec<SearchHit>>;
}

/// Run a vector-search plan against one segment at `ts`.
pub fn execute_search<S: SegmentData + ?Sized>(
    plan: &Plan,
    segment: &S,
    ts: Timestamp,
    searcher: &dyn VectorSearcher,
) -> PlanResult<SearchResult> {
    let info = match &plan.node {
        PlanNodeKind::VectorSearch(info) => info,
        PlanNodeKind::Retrieve(_) => {
            return Err(PlanError::DispatchMismatch(
                "retrieve plan handed to execute_search".into(),
            ))
        }
    };

    let mask = match selection_mask(plan, segment, ts)? {
        Some(mask) => mask,
        None => return Ok(SearchResult::default()),
    };

    let active_count = mask.len();
    let excluded: Vec<bool> = mask.iter().map(|b| !b).collect();
    let hits = searcher.search(info, active_count, &excluded)?;
    Ok(SearchResult { hits })
}

/// Run a retrieve plan against one segment at `ts`, returning the offsets
/// of matching visible rows in ascending order.
pub fn execute_retrieve<S: SegmentData + ?Sized>(
    plan: &Plan,
    segment: &S,
    ts: Timestamp,
) -> PlanResult<Vec<usize>> {
    if let PlanNodeKind::VectorSearch(_) = &plan.node {
        return Err(PlanError::DispatchMismatch(
            "search plan handed to execute_retrieve".into(),
        ));
    }

    let mask = match selection_mask(plan, segment, ts)? {
        Some(mask) => mask,
        None => return Ok(Vec::new()),
    };

    Ok(mask
        .iter()
        .enumerate()
        .filter_map(|(row, keep)| keep.then_some(row))
        .collect())
}

/// Predicate selection ANDed with visibility over the active snapshot.
/// `None` means no row can match and the caller returns empty.
fn selection_mask<S: SegmentData + ?Sized>(
    plan: &Plan,
    segment: &S,
    ts: Timestamp,
) -> PlanResult<Option<Vec<bool>>> {
    let active_count = segment.active_count(ts);
    if active_count == 0 {
        debug!("no rows active at {}, skipping predicate", ts);
        return Ok(None);
    }

    let selection = match plan.predicate() {
        Some(expr) => PredicateExecutor::new(segment, active_count).evaluate(expr)?,
        None => Selection::Scalar(true),
    };
    if selection.is_const_false() {
        debug!("predicate is constant false at {}", ts);
        return Ok(None);
    }

    let visibility = segment.visibility_mask(ts, active_count);
    let mask = selection.and_mask(&visibility);
    if !mask.iter().any(|b| *b) {
        return Ok(None);
    }
    Ok(Some(mask))
}
