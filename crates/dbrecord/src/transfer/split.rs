//! Split an import query into independent range-bounded queries.
//!
//! The import query carries a `$CONDITIONS` placeholder. Each split replaces
//! it with a range predicate on the split column, computed from the
//! `(min, max)` the bounding query returned. Splits are half-open except the
//! last, which includes `max`, so every row lands in exactly one split.

use tracing::debug;

use crate::config::CONDITIONS_TOKEN;
use crate::core::traits::DriverConnection;
use crate::error::{RecordError, Result};

/// Predicate substituted when the import is not split.
pub const ALL_ROWS: &str = "(1 = 1)";

/// Plan for splitting one import query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitPlan {
    import_query: String,
    split_by: String,
    num_splits: usize,
    null_split: bool,
}

impl SplitPlan {
    /// Create a plan. `split_by` is used verbatim, so it may be a column
    /// reference or an expression.
    ///
    /// # Errors
    ///
    /// `RecordError::Config` when `num_splits` is 0, or when the query is
    /// split but has no `$CONDITIONS` placeholder or no split column.
    pub fn new(
        import_query: impl Into<String>,
        split_by: impl Into<String>,
        num_splits: usize,
    ) -> Result<Self> {
        let import_query = import_query.into();
        let split_by = split_by.into();

        if num_splits == 0 {
            return Err(RecordError::Config("num_splits must be at least 1".into()));
        }
        if num_splits > 1 && !import_query.contains(CONDITIONS_TOKEN) {
            return Err(RecordError::Config(format!(
                "import query must contain {} to be split",
                CONDITIONS_TOKEN
            )));
        }
        if num_splits > 1 && split_by.trim().is_empty() {
            return Err(RecordError::Config(
                "a split column is required to split an import".into(),
            ));
        }

        Ok(Self {
            import_query,
            split_by,
            num_splits,
            null_split: false,
        })
    }

    /// Also read rows whose split column is NULL, as one extra split.
    #[must_use]
    pub fn with_null_split(mut self, enabled: bool) -> Self {
        self.null_split = enabled;
        self
    }

    pub fn num_splits(&self) -> usize {
        self.num_splits
    }

    /// Inclusive-exclusive `(lo, hi)` ranges covering `min..=max`. The last
    /// range is inclusive of `hi`. A range too small to split stays whole.
    pub fn ranges(&self, min: i64, max: i64) -> Vec<(i64, i64)> {
        if self.num_splits <= 1 || max <= min {
            return vec![(min, max)];
        }

        let total = i128::from(max) - i128::from(min);
        let size = total / self.num_splits as i128;
        if size < 1 {
            return vec![(min, max)];
        }

        // Every bound lies within min..=max, so the narrowing cannot fail.
        let bound = |i: usize| -> i64 {
            i64::try_from(i128::from(min) + i as i128 * size).unwrap_or(max)
        };
        (0..self.num_splits)
            .map(|i| {
                let hi = if i == self.num_splits - 1 {
                    max
                } else {
                    bound(i + 1)
                };
                (bound(i), hi)
            })
            .collect()
    }

    /// The predicate for each split, in order. The NULL split, when enabled,
    /// comes last.
    pub fn predicates(&self, min: i64, max: i64) -> Vec<String> {
        if self.num_splits == 1 {
            return vec![ALL_ROWS.to_string()];
        }

        let col = &self.split_by;
        let ranges = self.ranges(min, max);
        let last = ranges.len() - 1;
        let mut predicates: Vec<String> = ranges
            .into_iter()
            .enumerate()
            .map(|(i, (lo, hi))| {
                let op = if i == last { "<=" } else { "<" };
                format!("({} >= {} AND {} {} {})", col, lo, col, op, hi)
            })
            .collect();
        if self.null_split {
            predicates.push(format!("({} IS NULL)", col));
        }
        predicates
    }

    /// One query per split, with `$CONDITIONS` substituted.
    pub fn queries(&self, min: i64, max: i64) -> Vec<String> {
        let queries: Vec<String> = self
            .predicates(min, max)
            .iter()
            .map(|p| self.import_query.replace(CONDITIONS_TOKEN, p))
            .collect();
        debug!(
            splits = queries.len(),
            min, max, "import query split"
        );
        queries
    }

    /// Queries for a bounding query that returned NULL bounds (no non-NULL
    /// split values): only the NULL split can have rows.
    pub fn queries_without_bounds(&self) -> Vec<String> {
        if self.num_splits == 1 {
            return vec![self.import_query.replace(CONDITIONS_TOKEN, ALL_ROWS)];
        }
        let predicate = format!("({} IS NULL)", self.split_by);
        vec![self.import_query.replace(CONDITIONS_TOKEN, &predicate)]
    }
}

/// Run a bounding query and read its `(min, max)` from the first two
/// columns. `None` when both are NULL (no non-NULL split values).
///
/// The cursor is dropped before returning; closing `conn` stays with the caller.
pub async fn split_bounds(
    conn: &mut dyn DriverConnection,
    bounding_query: &str,
) -> Result<Option<(i64, i64)>> {
    let mut cursor = conn.query(bounding_query).await?;
    if !cursor.next_row().await? {
        return Err(RecordError::resource(
            "bounding query returned no rows",
            bounding_query,
        ));
    }
    match (cursor.get_i64(1)?, cursor.get_i64(2)?) {
        (Some(min), Some(max)) if min <= max => Ok(Some((min, max))),
        (Some(min), Some(max)) => Err(RecordError::resource(
            format!("bounding query returned min {} above max {}", min, max),
            bounding_query,
        )),
        (None, None) => Ok(None),
        _ => Err(RecordError::resource(
            "bounding query returned exactly one NULL bound",
            bounding_query,
        )),
    }
}
