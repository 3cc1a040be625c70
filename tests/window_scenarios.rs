//! Window and aggregate scenarios against a live PostgreSQL.
//!
//! Run: `CRITQL_DATABASE_URL=postgres://... cargo test --test window_scenarios -- --ignored`

use anyhow::Result;
use critql::prelude::*;
use sqlx::postgres::PgPoolOptions;

const ACTIVE_TOTAL: f64 = 253000.0;

fn employees() -> TableSchema {
    TableSchema::new("employees")
        .column("id", ColumnType::Integer)
        .column("name", ColumnType::Text)
        .column("salary", ColumnType::Numeric)
        .column("is_active", ColumnType::Boolean)
        .column("profile", ColumnType::Jsonb)
        .column("hired_at", ColumnType::Date)
        .column("shift", ColumnType::Interval)
}

/// One connection, so the temp table lives for the whole test.
async fn seeded() -> Result<Table> {
    let url = std::env::var(critql::config::DATABASE_URL_ENV)?;
    let pool = PgPoolOptions::new().max_connections(1).connect(&url).await?;

    sqlx::query(
        "CREATE TEMP TABLE employees (
            id integer PRIMARY KEY,
            name text NOT NULL,
            salary numeric(10, 2) NOT NULL,
            is_active boolean NOT NULL,
            profile jsonb,
            hired_at date NOT NULL,
            shift interval NOT NULL
        )",
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"INSERT INTO employees VALUES
            (1, 'Ann',   40000, true,  '{"team": "core", "years": 2}', '2019-03-01', '01:00'),
            (2, 'Bo',    45000, true,  '{"team": "core", "years": 3}', '2020-06-15', '00:30'),
            (3, 'Cy',    48000, true,  '{"team": "web",  "years": 4}', '2021-02-01', '00:30'),
            (4, 'Di',    50000, true,  '{"team": "web",  "years": 5}', '2022-09-10', '01:00'),
            (5, 'Ed',    60000, false, '{"team": "ops",  "years": 9}', '2018-01-20', '02:00'),
            (6, 'Flo',   70000, true,  '{"team": "ops",  "years": 7}', '2023-04-03', '01:00')"#,
    )
    .execute(&pool)
    .await?;

    Ok(Table::new(pool, employees()))
}

fn number(row: &RowMap, column: &str) -> Option<f64> {
    row.get(column).and_then(|v| v.as_f64())
}

fn by_salary(mut rows: Vec<RowMap>) -> Vec<RowMap> {
    rows.sort_by(|a, b| {
        number(a, "salary")
            .unwrap_or_default()
            .total_cmp(&number(b, "salary").unwrap_or_default())
    });
    rows
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_rows_one_preceding_sums_pairs() -> Result<()> {
    let table = seeded().await?;
    let columns = vec![
        Selection::column("salary"),
        Selection::aggregate("pair_sum", |agg| {
            let frame = FrameSpec::from_tuples(("preceding", Some(1)), ("current row", None))?;
            Ok(agg.sum("salary")?.over().order_by(["salary"])?.rows(frame).into_node())
        }),
    ];

    let rows = by_salary(table.select_where(&columns, &CriteriaMap::new()).await?);
    let sums: Vec<f64> = rows.iter().filter_map(|r| number(r, "pair_sum")).collect();
    assert_eq!(sums, vec![40000.0, 85000.0, 93000.0, 98000.0, 110000.0, 130000.0]);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_partition_count() -> Result<()> {
    let table = seeded().await?;
    let columns = vec![
        Selection::column("is_active"),
        Selection::aggregate("peers", |agg| {
            Ok(agg.count().over().partition_by(["is_active"])?.into_node())
        }),
    ];

    let rows = table.select_where(&columns, &CriteriaMap::new()).await?;
    assert_eq!(rows.len(), 6);
    for row in rows {
        let expected = if row["is_active"] == serde_json::json!(true) { 5 } else { 1 };
        assert_eq!(row["peers"], serde_json::json!(expected));
    }
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_percentiles() -> Result<()> {
    let table = seeded().await?;
    let columns = vec![
        Selection::aggregate("median_disc", |agg| {
            Ok(agg.percentile_disc(0.5, "salary")?.into_node())
        }),
        Selection::aggregate("median_cont", |agg| {
            Ok(agg.percentile_cont(0.5, "salary")?.into_node())
        }),
        Selection::aggregate("quartiles", |agg| {
            Ok(agg.percentile_cont([0.25, 0.75], "salary")?.into_node())
        }),
    ];

    let rows = table.select_where(&columns, &CriteriaMap::new()).await?;
    let row = &rows[0];
    assert_eq!(row["median_disc"], serde_json::json!(48000));
    let cont = number(row, "median_cont").unwrap_or_default();
    assert!((cont - 49000.0).abs() < 1e-6, "median_cont = {}", cont);
    assert_eq!(row["quartiles"].as_array().map(Vec::len), Some(2));
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_exclude_current_row() -> Result<()> {
    let table = seeded().await?;
    let columns = vec![
        Selection::column("salary"),
        Selection::column("is_active"),
        Selection::aggregate("others", |agg| {
            Ok(agg
                .sum("salary")?
                .over()
                .partition_by(["is_active"])?
                .order_by(["salary"])?
                .rows(FrameSpec::whole())
                .exclude(ExcludeOption::CurrentRow)
                .into_node())
        }),
    ];

    let rows = table.select_where(&columns, &CriteriaMap::new()).await?;
    for row in rows {
        let salary = number(&row, "salary").unwrap_or_default();
        if row["is_active"] == serde_json::json!(true) {
            assert_eq!(number(&row, "others"), Some(ACTIVE_TOTAL - salary));
        } else {
            assert!(row["others"].is_null());
        }
    }
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_numeric_aggregates_decode_as_numbers() -> Result<()> {
    let table = seeded().await?;
    let columns = vec![
        Selection::aggregate("avg_salary", |agg| Ok(agg.avg("salary")?.into_node())),
        Selection::aggregate("spread", |agg| Ok(agg.stddev_pop("salary")?.into_node())),
        Selection::aggregate("headcount", |agg| Ok(agg.count().into_node())),
        Selection::aggregate("avg_years", |agg| {
            Ok(agg.avg(ColumnArg::json("profile", |p| p.key("years")))?.into_node())
        }),
    ];
    let criteria = CriteriaMap::new().eq("is_active", true);

    let rows = table.select_where(&columns, &criteria).await?;
    let row = &rows[0];
    assert_eq!(number(row, "avg_salary"), Some(ACTIVE_TOTAL / 5.0));
    assert!(row["spread"].is_f64());
    assert_eq!(row["headcount"], serde_json::json!(5));
    assert_eq!(number(row, "avg_years"), Some(4.2));
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_update_and_delete_where() -> Result<()> {
    let table = seeded().await?;

    let raised = table
        .update_where(
            &[("salary", Value::Int(42000))],
            &CriteriaMap::new().with("name", |c| c.eq("Ann").or(c.eq("Bo"))),
        )
        .await?;
    assert_eq!(raised, 2);

    let deleted = table
        .delete_where(&CriteriaMap::new().eq("is_active", false))
        .await?;
    assert_eq!(deleted.len(), 1);
    assert_eq!(deleted[0]["name"], serde_json::json!("Ed"));

    let remaining = table.select_where(&[], &CriteriaMap::new()).await?;
    assert_eq!(remaining.len(), 5);
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_json_criteria_filter_date_columns() -> Result<()> {
    let table = seeded().await?;
    let criteria = CriteriaMap::from_json(&serde_json::json!({
        "hired_at": [">", "2021-01-01"]
    }))?;

    let rows = table
        .select_where(&[Selection::column("name"), Selection::column("hired_at")], &criteria)
        .await?;
    let mut names: Vec<&str> = rows.iter().filter_map(|r| r["name"].as_str()).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["Cy", "Di", "Flo"]);

    let early = CriteriaMap::new().with("hired_at", |c| c.between("2019-01-01", "2020-12-31"));
    let moved = table
        .update_where(&[("hired_at", Value::from("2024-01-02"))], &early)
        .await?;
    assert_eq!(moved, 2);

    let rows = table
        .select_where(&[], &CriteriaMap::new().eq("hired_at", "2024-01-02"))
        .await?;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["hired_at"], serde_json::json!("2024-01-02"));
    Ok(())
}

#[tokio::test]
#[ignore = "Requires a PostgreSQL database - set CRITQL_DATABASE_URL and run with --ignored"]
async fn test_interval_and_array_aggregates_decode() -> Result<()> {
    let table = seeded().await?;
    let columns = vec![
        Selection::aggregate("total_shift", |agg| Ok(agg.sum("shift")?.into_node())),
        Selection::aggregate("avg_shift", |agg| Ok(agg.avg("shift")?.into_node())),
        Selection::aggregate("hired", |agg| Ok(agg.array_agg("hired_at")?.into_node())),
        Selection::aggregate("teams", |agg| {
            Ok(agg.array_agg(ColumnArg::json("profile", |p| p.key("team")))?.into_node())
        }),
    ];
    let criteria = CriteriaMap::new().eq("is_active", true);

    let rows = table.select_where(&columns, &criteria).await?;
    let row = &rows[0];
    assert_eq!(row["total_shift"], serde_json::json!("04:00:00"));
    assert_eq!(row["avg_shift"], serde_json::json!("00:48:00"));
    assert_eq!(row["hired"].as_array().map(Vec::len), Some(5));
    assert!(row["hired"].as_array().is_some_and(|d| d.contains(&serde_json::json!("2019-03-01"))));
    assert!(row["teams"].as_array().is_some_and(|t| t.contains(&serde_json::json!("web"))));

    let long_shift = CriteriaMap::new().op("shift", Operator::Gt, "01:30:00");
    let long = table.select_where(&[Selection::column("name")], &long_shift).await?;
    assert_eq!(long.len(), 1);
    assert_eq!(long[0]["name"], serde_json::json!("Ed"));
    Ok(())
}
