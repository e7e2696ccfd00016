use std::future::Future;
use std::sync::Mutex;

use pg_store::prelude::*;
use tokio::runtime::Runtime;

/// Session double that records every statement and serves canned rows.
#[derive(Default)]
struct RecordingSession {
    calls: Mutex<Vec<(String, Vec<RowValues>)>>,
    columns: Vec<&'static str>,
    rows: Vec<Vec<RowValues>>,
    affected: u64,
}

impl RecordingSession {
    fn with_rows(columns: &[&'static str], rows: Vec<Vec<RowValues>>) -> Self {
        Self {
            columns: columns.to_vec(),
            rows,
            ..Self::default()
        }
    }

    fn affecting(affected: u64) -> Self {
        Self {
            affected,
            ..Self::default()
        }
    }

    fn calls(&self) -> Vec<(String, Vec<RowValues>)> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, sql: &str, params: &[RowValues]) {
        self.calls
            .lock()
            .unwrap()
            .push((sql.to_string(), params.to_vec()));
    }
}

impl Session for RecordingSession {
    fn select(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> impl Future<Output = Result<ResultSet, StoreError>> + Send {
        self.record(sql, params);
        // mimic LIMIT/OFFSET when the page parameters are the last two values
        let mut rows = self.rows.clone();
        if sql.contains("LIMIT $") {
            let n = params.len();
            let limit = *params[n - 2].as_int().unwrap() as usize;
            let offset = *params[n - 1].as_int().unwrap() as usize;
            rows = rows.into_iter().skip(offset).take(limit).collect();
        }
        let result = ResultSet::from_rows(&self.columns, rows);
        async move { Ok(result) }
    }

    fn dml(
        &self,
        sql: &str,
        params: &[RowValues],
    ) -> impl Future<Output = Result<u64, StoreError>> + Send {
        self.record(sql, params);
        let affected = self.affected;
        async move { Ok(affected) }
    }
}

fn numbered_rows(n: i64, total_column: bool) -> Vec<Vec<RowValues>> {
    (1..=n)
        .map(|id| {
            let mut row = vec![RowValues::Int(id)];
            if total_column {
                row.push(RowValues::Int(n));
            }
            row
        })
        .collect()
}

fn id_mapper(row: &Row) -> Result<Option<i64>, StoreError> {
    row.value::<i64>("id").map(Some)
}

#[test]
fn test02_named_parameters_become_positional() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::affecting(1);
        let result = session
            .update(
                "UPDATE item SET name = :name WHERE id = :id OR parent = :id",
                &params! { "id" => 7_i64, "name" => "seven", "unused" => true },
            )
            .await?;
        assert_eq!(result.actual_row_count(), 1);

        let calls = session.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(
            calls[0].0,
            "UPDATE item SET name = $1 WHERE id = $2 OR parent = $2"
        );
        assert_eq!(
            calls[0].1,
            vec![RowValues::Text("seven".into()), RowValues::Int(7)]
        );
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_missing_parameter_fails_before_round_trip() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::default();
        let err = session
            .query_list(
                "SELECT id FROM item WHERE owner = :owner AND kind = :Kind",
                &params! { "owner" => "alice", "kind" => "a" },
                id_mapper,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ParameterError(ref m) if m.contains(":Kind")));
        assert!(session.calls().is_empty());
    });
    Ok(())
}

#[test]
fn test02_query_maps_first_row_only() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::with_rows(&["id"], numbered_rows(3, false));
        let first = session.query("SELECT id FROM item", &params! {}, id_mapper).await?;
        assert_eq!(first, Some(1));

        let empty = RecordingSession::with_rows(&["id"], vec![]);
        let none = empty.query("SELECT id FROM item", &params! {}, id_mapper).await?;
        assert_eq!(none, None);
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_single_requires_a_value() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let empty = RecordingSession::with_rows(&["id"], vec![]);
        let err = empty
            .single("SELECT id FROM item", &params! {}, id_mapper)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingValue));

        let declined = RecordingSession::with_rows(&["id"], numbered_rows(1, false));
        let err = declined
            .single("SELECT id FROM item", &params! {}, |_row| Ok(None::<i64>))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingValue));
    });
    Ok(())
}

#[test]
fn test02_query_list_skips_declined_rows() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::with_rows(&["id"], numbered_rows(6, false));
        let even = session
            .query_list("SELECT id FROM item", &params! {}, |row| {
                let id = row.value::<i64>("id")?;
                Ok((id % 2 == 0).then_some(id))
            })
            .await?;
        assert_eq!(even, [2, 4, 6]);
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_page_size_law() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let rows = 5_usize;
        for limit in 0..=6 {
            for offset in 0..=6 {
                let session =
                    RecordingSession::with_rows(&["id", "total"], numbered_rows(5, true));
                let page = session
                    .query_page(
                        "SELECT id, count(*) OVER() AS total FROM item ORDER BY id",
                        &params! {},
                        limit,
                        offset,
                        id_mapper,
                    )
                    .await?;
                assert!(page.len() <= limit);
                assert_eq!(page.len(), limit.min(rows.saturating_sub(offset)));
            }
        }
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_page_fetches_one_extra_row() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::with_rows(&["id", "total"], numbered_rows(5, true));
        let page = session
            .query_page(
                "SELECT id, count(*) OVER() AS total FROM item WHERE id > :min ORDER BY id",
                &params! { "min" => 0_i64 },
                2,
                0,
                id_mapper,
            )
            .await?;
        assert_eq!(page.items(), [1, 2]);
        assert_eq!(page.total(), 5);

        let calls = session.calls();
        let (sql, values) = &calls[0];
        assert!(sql.ends_with("\nLIMIT $2\nOFFSET $3"));
        assert_eq!(values[1..], [RowValues::Int(3), RowValues::Int(0)]);
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_page_total_label_and_sentinel() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let without_total = RecordingSession::with_rows(&["id"], numbered_rows(3, false));
        let page = without_total
            .query_page("SELECT id FROM item", &params! {}, 10, 0, id_mapper)
            .await?;
        assert_eq!(page.len(), 3);
        assert_eq!(page.total(), UNKNOWN_TOTAL);
        assert_eq!(page.total_if_known(), None);

        let labelled = RecordingSession::with_rows(&["id", "n"], numbered_rows(4, true));
        let page = labelled
            .query_page_with_total_label("SELECT id, 4 AS n FROM item", &params! {}, 0, 0, "n", id_mapper)
            .await?;
        assert!(page.is_empty());
        assert_eq!(page.total(), 4);
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_empty_batch_makes_no_calls() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::affecting(1);
        let counts = session
            .batch("INSERT INTO item (id) VALUES (:id)", &[])
            .await?;
        assert!(counts.is_empty());
        let keys = session
            .batch_and_return_generated_keys("INSERT INTO item (id) VALUES (:id)", &[])
            .await?;
        assert!(keys.is_empty());
        assert!(session.calls().is_empty());
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_batch_keeps_input_order() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::affecting(1);
        let counts = session
            .batch_items("INSERT INTO item (id) VALUES (:id)", [10_i64, 20, 30], |id| {
                params! { "id" => id }
            })
            .await?;
        assert_eq!(counts, [1, 1, 1]);

        let bound: Vec<RowValues> = session
            .calls()
            .into_iter()
            .map(|(sql, mut values)| {
                assert_eq!(sql, "INSERT INTO item (id) VALUES ($1)");
                values.remove(0)
            })
            .collect();
        assert_eq!(
            bound,
            [RowValues::Int(10), RowValues::Int(20), RowValues::Int(30)]
        );
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_batch_rejects_any_incomplete_item_up_front() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::affecting(1);
        let result = session
            .batch(
                "INSERT INTO item (id) VALUES (:id)",
                &[params! { "id" => 1_i64 }, params! { "other" => 2_i64 }],
            )
            .await;
        assert!(matches!(result, Err(StoreError::ParameterError(_))));
        assert!(session.calls().is_empty());
    });
    Ok(())
}

#[test]
fn test02_generated_key_needs_a_returned_row() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::with_rows(&["id", "name"], vec![vec![
            RowValues::Int(42),
            RowValues::Text("x".into()),
        ]]);
        let key = session
            .update_and_return_generated_key("INSERT INTO item (name) VALUES (:name)", &params! { "name" => "x" })
            .await?;
        assert_eq!(key, 42);
        assert_eq!(
            session.calls()[0].0,
            "INSERT INTO item (name) VALUES ($1)\nRETURNING *"
        );

        let quoted = RecordingSession::with_rows(&["id"], vec![vec![RowValues::Int(7)]]);
        let key = quoted
            .update_and_return_generated_key(
                "INSERT INTO item (note) VALUES ('returning customer')",
                &params! {},
            )
            .await?;
        assert_eq!(key, 7);
        assert_eq!(
            quoted.calls()[0].0,
            "INSERT INTO item (note) VALUES ('returning customer')\nRETURNING *"
        );

        let nothing = RecordingSession::with_rows(&["id"], vec![]);
        let err = nothing
            .update_and_return_generated_key("INSERT INTO item DEFAULT VALUES", &params! {})
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingGeneratedKey));

        let keys = session
            .batch_and_return_generated_keys(
                "INSERT INTO item (name) VALUES (:name)",
                &[params! { "name" => "a" }, params! { "name" => "b" }],
            )
            .await?;
        assert_eq!(keys, [42, 42]);
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_execute_is_repeatable() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::with_rows(&["?column?"], vec![vec![RowValues::Int(1)]]);
        let first = session.execute("SELECT 1", &params! {}).await?;
        let second = session.execute("SELECT 1", &params! {}).await?;
        assert!(first);
        assert_eq!(first, second);
        assert_eq!(session.calls().len(), 2);
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}

#[test]
fn test02_casts_and_literals_are_not_parameters() -> Result<(), Box<dyn std::error::Error>> {
    let rt = Runtime::new()?;
    rt.block_on(async {
        let session = RecordingSession::affecting(0);
        session
            .update(
                "UPDATE item SET note = ':not_me', at = :at::timestamptz -- :nor_me\nWHERE id = :id",
                &params! { "at" => "2024-01-01T00:00:00Z", "id" => 1_i64 },
            )
            .await?;
        assert_eq!(
            session.calls()[0].0,
            "UPDATE item SET note = ':not_me', at = $1::timestamptz -- :nor_me\nWHERE id = $2"
        );
        Ok::<(), StoreError>(())
    })?;
    Ok(())
}
