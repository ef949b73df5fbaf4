use anyhow::Result;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

use wage_recon::app::reconcile_use_case::ReconcileUseCase;
use wage_recon::config::{OutputConfig, PipelineConfig};
use wage_recon::infra::{load_csv, InMemoryOutputAdapter, SqliteOutputAdapter};

const H1B_CSV: &str = "\
CASE_NUMBER,CASE_STATUS,RECEIVED_DATE,VISA_CLASS,EMPLOYER_NAME,SOC_CODE,SOC_TITLE,WAGE_RATE_OF_PAY_FROM,WAGE_UNIT_OF_PAY
I-200-1,Certified,2023-04-03,H-1B,MICROSOFT CORPORATION,15-1252.00,Software Developers,152000,Year
I-200-2,Certified,2023-05-19,H-1B,Microsoft Corporation,15-1252.00,Software Developers,\"$171,500.00\",Year
I-200-3,Certified,2023-06-30,H-1B,Microsoft Corporation,15-1211.00,Computer Systems Analysts,58.50,Hour
I-200-4,Certified - Withdrawn,2023-05-01,H-1B,Microsoft Corporation,15-2051.00,Data Scientists,165000,Year
I-200-5,Certified,2023-03-31,H-1B,Microsoft Corporation,15-2031.00,Operations Research Analysts,130000,Year
I-200-6,Certified,2023-05-09,H-1B,Amazon.com Services LLC,15-1252.00,Software Developers,180000,Year
I-200-7,Certified,2023-05-09,H-1B,Microsoft Corporation,,Unknown,99000,Year
I-200-8,Certified,2023-05-10,H-1B,Microsoft Corporation,11-3021.00,Computer and Information Systems Managers,350000,Year
I-200-9,Certified,not a date,H-1B,Microsoft Corporation,17-2061.00,Computer Hardware Engineers,140000,Year
I-200-10,Certified,05/22/2023,H-1B,Microsoft Corporation,13-1161.00,Market Research Analysts,9500,Month
";

const OEWS_CSV: &str = "\
Area,SOC Code,Washington statewide occupational title,Annual mean wage
53,15-1252,Software developers,\"$155,030\"
53,15-1211,Computer systems analysts,\"$120,540\"
53,13-1161,Market research analysts and marketing specialists,\"$92,080\"
53,11-3021,Computer and information systems managers,\"$206,960\"
53,15-2051,Data scientists,*
";

fn write(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    path
}

async fn run_into(db_path: &Path, dir: &Path) -> Result<()> {
    let observations = load_csv(write(dir, "h1b.csv", H1B_CSV))?;
    let references = load_csv(write(dir, "oews.csv", OEWS_CSV))?;
    let adapter = SqliteOutputAdapter::open(db_path, OutputConfig::default())?;
    let mut use_case = ReconcileUseCase::new(PipelineConfig::default(), Box::new(adapter));
    use_case.execute(&observations, &references).await?;
    Ok(())
}

fn table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
        .unwrap();
    stmt.query_map([], |r| r.get::<_, String>(0))
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[tokio::test]
async fn expected_tables_exist() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("out").join("wages.db");
    run_into(&db_path, dir.path()).await?;

    let conn = Connection::open(&db_path)?;
    let names = table_names(&conn);
    for expected in ["h1b_microsoft_roles", "oews_microsoft_roles", "h1b_oews_combined", "pipeline_runs"] {
        assert!(names.iter().any(|n| n == expected), "missing table {expected}: {names:?}");
    }
    Ok(())
}

#[tokio::test]
async fn no_null_codes_or_critical_columns() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("wages.db");
    run_into(&db_path, dir.path()).await?;
    let conn = Connection::open(&db_path)?;

    let checks = [
        "SELECT COUNT(*) FROM h1b_microsoft_roles WHERE occupation_code IS NULL OR annual_wage IS NULL",
        "SELECT COUNT(*) FROM oews_microsoft_roles WHERE occupation_code IS NULL OR avg_local_wage IS NULL",
        "SELECT COUNT(*) FROM h1b_oews_combined WHERE occupation_code IS NULL OR annual_wage IS NULL \
         OR avg_local_wage IS NULL OR wage_diff IS NULL",
    ];
    for sql in checks {
        let nulls: i64 = conn.query_row(sql, [], |r| r.get(0))?;
        assert_eq!(nulls, 0, "{sql}");
    }
    Ok(())
}

#[tokio::test]
async fn wage_diff_is_correct() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("wages.db");
    run_into(&db_path, dir.path()).await?;
    let conn = Connection::open(&db_path)?;

    let mut stmt = conn.prepare("SELECT annual_wage, avg_local_wage, wage_diff FROM h1b_oews_combined")?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, f64>(0)?, r.get::<_, f64>(1)?, r.get::<_, f64>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    assert!(!rows.is_empty());
    for (annual, local, diff) in rows {
        assert!((diff - (annual - local)).abs() < 1e-6);
    }
    Ok(())
}

#[tokio::test]
async fn wages_are_within_range() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("wages.db");
    run_into(&db_path, dir.path()).await?;
    let conn = Connection::open(&db_path)?;

    for (table, column) in [
        ("h1b_microsoft_roles", "annual_wage"),
        ("oews_microsoft_roles", "avg_local_wage"),
    ] {
        let out_of_range: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE {column} < 20000 OR {column} > 300000"),
            [],
            |r| r.get(0),
        )?;
        assert_eq!(out_of_range, 0, "{table}");
    }
    Ok(())
}

#[tokio::test]
async fn combined_codes_are_unique() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("wages.db");
    run_into(&db_path, dir.path()).await?;
    let conn = Connection::open(&db_path)?;

    let (total, distinct): (i64, i64) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT occupation_code) FROM h1b_oews_combined",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(total, distinct);
    Ok(())
}

#[tokio::test]
async fn combined_table_contents() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("wages.db");
    run_into(&db_path, dir.path()).await?;
    let conn = Connection::open(&db_path)?;

    let mut stmt = conn.prepare(
        "SELECT occupation_code, annual_wage, avg_local_wage FROM h1b_oews_combined ORDER BY occupation_code",
    )?;
    let rows = stmt
        .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, f64>(1)?, r.get::<_, f64>(2)?)))?
        .collect::<Result<Vec<_>, _>>()?;

    assert_eq!(
        rows,
        vec![
            ("13-1161".to_string(), 114000.0, 92080.0),
            ("15-1211".to_string(), 121680.0, 120540.0),
            ("15-1252".to_string(), 171500.0, 155030.0),
        ]
    );
    Ok(())
}

#[tokio::test]
async fn run_history_accumulates() -> Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("wages.db");
    run_into(&db_path, dir.path()).await?;
    run_into(&db_path, dir.path()).await?;
    let conn = Connection::open(&db_path)?;

    let runs: i64 = conn.query_row("SELECT COUNT(*) FROM pipeline_runs", [], |r| r.get(0))?;
    assert_eq!(runs, 2);
    let combined: i64 = conn.query_row("SELECT COUNT(*) FROM h1b_oews_combined", [], |r| r.get(0))?;
    assert_eq!(combined, 3);

    let (fingerprint, diagnostics): (String, String) = conn.query_row(
        "SELECT observation_fingerprint, diagnostics FROM pipeline_runs LIMIT 1",
        [],
        |r| Ok((r.get(0)?, r.get(1)?)),
    )?;
    assert_eq!(fingerprint.len(), 64);
    let diagnostics: serde_json::Value = serde_json::from_str(&diagnostics)?;
    assert!(diagnostics["stages"].as_array().is_some_and(|s| !s.is_empty()));
    Ok(())
}

#[tokio::test]
async fn dry_run_keeps_output_in_memory() -> Result<()> {
    let dir = tempdir()?;
    let observations = load_csv(write(dir.path(), "h1b.csv", H1B_CSV))?;
    let references = load_csv(write(dir.path(), "oews.csv", OEWS_CSV))?;

    let adapter = InMemoryOutputAdapter::new();
    let mut use_case = ReconcileUseCase::new(PipelineConfig::default(), Box::new(adapter.clone()));
    let run = use_case.execute(&observations, &references).await?;

    let stored = adapter.runs();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].0.run_id, run.record.run_id);
    assert_eq!(stored[0].1.reconciled.len(), 3);
    Ok(())
}
