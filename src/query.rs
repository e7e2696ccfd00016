//! Named-parameter query operations available on every [`Session`].

use std::future::Future;

use crate::error::StoreError;
use crate::page::{Page, UNKNOWN_TOTAL};
use crate::results::{ResultSet, Row};
use crate::session::Session;
use crate::translation::NamedStatement;
use crate::types::{QueryParameters, RowValues};

/// Column `query_page` reads the total item count from unless told otherwise.
pub const DEFAULT_TOTAL_LABEL: &str = "total";

const LIMIT_PARAMETER: &str = "__page_limit";
const OFFSET_PARAMETER: &str = "__page_offset";

/// Number of rows a mutating statement affected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    actual_row_count: u64,
}

impl UpdateResult {
    #[must_use]
    pub fn new(actual_row_count: u64) -> Self {
        Self { actual_row_count }
    }

    #[must_use]
    pub fn actual_row_count(&self) -> u64 {
        self.actual_row_count
    }
}

/// Query operations taking `:name` templates and a [`QueryParameters`] map.
///
/// Mappers return `Ok(None)` to skip a row. Every operation completes when the
/// statement does; errors from the driver are passed through unchanged.
pub trait QueryOps: Session {
    /// Map the first row, if any.
    fn query<T, M>(
        &self,
        sql: &str,
        params: &QueryParameters,
        mapper: M,
    ) -> impl Future<Output = Result<Option<T>, StoreError>> + Send
    where
        T: Send,
        M: Fn(&Row) -> Result<Option<T>, StoreError> + Send,
    {
        async move {
            let rows = run_select(self, sql, params).await?;
            match rows.first() {
                Some(row) => mapper(row),
                None => Ok(None),
            }
        }
    }

    /// Like [`QueryOps::query`], for rows that must exist.
    ///
    /// # Errors
    /// Returns `StoreError::MissingValue` when there is no row or the mapper skipped it.
    fn single<T, M>(
        &self,
        sql: &str,
        params: &QueryParameters,
        mapper: M,
    ) -> impl Future<Output = Result<T, StoreError>> + Send
    where
        T: Send,
        M: Fn(&Row) -> Result<Option<T>, StoreError> + Send,
    {
        async move {
            self.query(sql, params, mapper)
                .await?
                .ok_or(StoreError::MissingValue)
        }
    }

    /// Map every row in result order, skipping rows the mapper declines.
    fn query_list<T, M>(
        &self,
        sql: &str,
        params: &QueryParameters,
        mapper: M,
    ) -> impl Future<Output = Result<Vec<T>, StoreError>> + Send
    where
        T: Send,
        M: Fn(&Row) -> Result<Option<T>, StoreError> + Send,
    {
        async move {
            let rows = run_select(self, sql, params).await?;
            let mut items = Vec::with_capacity(rows.len());
            for row in &rows {
                if let Some(item) = mapper(row)? {
                    items.push(item);
                }
            }
            Ok(items)
        }
    }

    /// Fetch one page, reading the total from a column named `total`.
    ///
    /// `sql` must not carry its own `LIMIT`/`OFFSET`.
    fn query_page<T, M>(
        &self,
        sql: &str,
        params: &QueryParameters,
        limit: usize,
        offset: usize,
        mapper: M,
    ) -> impl Future<Output = Result<Page<T>, StoreError>> + Send
    where
        T: Send,
        M: Fn(&Row) -> Result<Option<T>, StoreError> + Send,
    {
        self.query_page_with_total_label(sql, params, limit, offset, DEFAULT_TOTAL_LABEL, mapper)
    }

    /// Fetch one page, reading the total from `total_label`.
    ///
    /// One row past `limit` is fetched so callers can tell whether more rows
    /// exist without a separate count query.
    fn query_page_with_total_label<T, M>(
        &self,
        sql: &str,
        params: &QueryParameters,
        limit: usize,
        offset: usize,
        total_label: &str,
        mapper: M,
    ) -> impl Future<Output = Result<Page<T>, StoreError>> + Send
    where
        T: Send,
        M: Fn(&Row) -> Result<Option<T>, StoreError> + Send,
    {
        async move {
            let lookahead = limit
                .checked_add(1)
                .ok_or_else(|| StoreError::ParameterError("page limit too large".into()))?;
            let mut paged_params = params.clone();
            paged_params.insert(LIMIT_PARAMETER.into(), page_bound(lookahead)?);
            paged_params.insert(OFFSET_PARAMETER.into(), page_bound(offset)?);
            let paged_sql =
                format!("{sql}\nLIMIT :{LIMIT_PARAMETER}\nOFFSET :{OFFSET_PARAMETER}");

            let rows = run_select(self, &paged_sql, &paged_params).await?;
            let mut total = UNKNOWN_TOTAL;
            let mut items = Vec::with_capacity(rows.len());
            for row in &rows {
                total = row.int_or_null(total_label).unwrap_or(UNKNOWN_TOTAL);
                if let Some(item) = mapper(row)? {
                    items.push(item);
                }
            }
            items.truncate(limit);
            Ok(Page::new(items, total))
        }
    }

    /// Run a statement for its effect; `true` once the driver reports success.
    fn execute(
        &self,
        sql: &str,
        params: &QueryParameters,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move {
            let stmt = NamedStatement::parse(sql)?;
            let values = stmt.bind(params)?;
            self.dml(stmt.sql(), &values).await?;
            Ok(true)
        }
    }

    /// Run a mutating statement and report the affected-row count.
    fn update(
        &self,
        sql: &str,
        params: &QueryParameters,
    ) -> impl Future<Output = Result<UpdateResult, StoreError>> + Send {
        async move {
            let stmt = NamedStatement::parse(sql)?;
            let values = stmt.bind(params)?;
            let count = self.dml(stmt.sql(), &values).await?;
            Ok(UpdateResult::new(count))
        }
    }

    /// Run an insert and return the key the database generated for it.
    ///
    /// The key is the first column of the `RETURNING` row; `RETURNING *` is
    /// appended when the statement has no `RETURNING` clause.
    ///
    /// # Errors
    /// Returns `StoreError::MissingGeneratedKey` when no integer key comes back.
    fn update_and_return_generated_key(
        &self,
        sql: &str,
        params: &QueryParameters,
    ) -> impl Future<Output = Result<i64, StoreError>> + Send {
        async move {
            let stmt = returning_statement(sql)?;
            let values = stmt.bind(params)?;
            let rows = self.select(stmt.sql(), &values).await?;
            generated_key(&rows)
        }
    }

    /// Run one statement per parameter map, returning affected-row counts in input order.
    ///
    /// An empty batch returns immediately without touching the session.
    fn batch(
        &self,
        sql: &str,
        batch: &[QueryParameters],
    ) -> impl Future<Output = Result<Vec<u64>, StoreError>> + Send {
        async move {
            if batch.is_empty() {
                return Ok(Vec::new());
            }
            let stmt = NamedStatement::parse(sql)?;
            let bound = bind_all(&stmt, batch)?;
            self.dml_batch(stmt.sql(), &bound).await
        }
    }

    /// [`QueryOps::batch`] over items turned into parameter maps by `to_params`.
    fn batch_items<I, F>(
        &self,
        sql: &str,
        items: I,
        to_params: F,
    ) -> impl Future<Output = Result<Vec<u64>, StoreError>> + Send
    where
        I: IntoIterator,
        F: FnMut(I::Item) -> QueryParameters,
    {
        let batch: Vec<QueryParameters> = items.into_iter().map(to_params).collect();
        async move { self.batch(sql, &batch).await }
    }

    /// Run an insert per parameter map, returning one generated key per item in input order.
    ///
    /// # Errors
    /// Returns `StoreError::MissingGeneratedKey` if any item yields no key.
    fn batch_and_return_generated_keys(
        &self,
        sql: &str,
        batch: &[QueryParameters],
    ) -> impl Future<Output = Result<Vec<i64>, StoreError>> + Send {
        async move {
            if batch.is_empty() {
                return Ok(Vec::new());
            }
            let stmt = returning_statement(sql)?;
            let bound = bind_all(&stmt, batch)?;
            self.select_batch(stmt.sql(), &bound)
                .await?
                .iter()
                .map(generated_key)
                .collect()
        }
    }
}

impl<S: Session> QueryOps for S {}

async fn run_select<S: Session + ?Sized>(
    session: &S,
    sql: &str,
    params: &QueryParameters,
) -> Result<ResultSet, StoreError> {
    let stmt = NamedStatement::parse(sql)?;
    let values = stmt.bind(params)?;
    session.select(stmt.sql(), &values).await
}

fn bind_all(
    stmt: &NamedStatement,
    batch: &[QueryParameters],
) -> Result<Vec<Vec<RowValues>>, StoreError> {
    batch.iter().map(|params| stmt.bind(params)).collect()
}

fn page_bound(value: usize) -> Result<RowValues, StoreError> {
    i64::try_from(value)
        .map(RowValues::Int)
        .map_err(|e| StoreError::ParameterError(format!("page bound out of range: {e}")))
}

/// Parse `sql`, appending `RETURNING *` unless it already returns rows.
fn returning_statement(sql: &str) -> Result<NamedStatement, StoreError> {
    let stmt = NamedStatement::parse(sql)?;
    if stmt.has_returning() {
        return Ok(stmt);
    }
    let trimmed = sql.trim_end().trim_end_matches(';');
    NamedStatement::parse(&format!("{trimmed}\nRETURNING *"))
}

fn generated_key(rows: &ResultSet) -> Result<i64, StoreError> {
    rows.first()
        .and_then(|row| row.get_by_index(0))
        .and_then(RowValues::as_int)
        .copied()
        .ok_or(StoreError::MissingGeneratedKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_returning_when_absent() {
        let stmt = returning_statement("INSERT INTO t (a) VALUES (:a);\n").unwrap();
        assert_eq!(stmt.sql(), "INSERT INTO t (a) VALUES ($1)\nRETURNING *");

        let stmt = returning_statement("insert into t (a) values (:a) returning id").unwrap();
        assert_eq!(stmt.sql(), "insert into t (a) values ($1) returning id");
    }

    #[test]
    fn returning_in_a_literal_still_gets_a_clause() {
        let stmt = returning_statement("INSERT INTO t (note) VALUES ('returning customer')").unwrap();
        assert_eq!(
            stmt.sql(),
            "INSERT INTO t (note) VALUES ('returning customer')\nRETURNING *"
        );

        let stmt = returning_statement("INSERT INTO t (a) VALUES (:a) -- returning soon").unwrap();
        assert!(stmt.sql().ends_with("-- returning soon\nRETURNING *"));
    }

    #[test]
    fn generated_key_reads_first_column() {
        let rows = ResultSet::from_rows(&["id", "a"], vec![vec![RowValues::Int(5), RowValues::Null]]);
        assert_eq!(generated_key(&rows).unwrap(), 5);

        let empty = ResultSet::from_rows(&["id"], vec![]);
        assert!(matches!(generated_key(&empty), Err(StoreError::MissingGeneratedKey)));

        let null_key = ResultSet::from_rows(&["id"], vec![vec![RowValues::Null]]);
        assert!(matches!(generated_key(&null_key), Err(StoreError::MissingGeneratedKey)));
    }
}
