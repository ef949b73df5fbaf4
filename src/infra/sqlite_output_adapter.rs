use anyhow::{anyhow, Context};
use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

use crate::app::ports::{ReconciliationOutputPort, RunRecord};
use crate::config::OutputConfig;
use crate::pipeline::PipelineOutput;

/// SQLite implementation of ReconciliationOutputPort.
/// Each run replaces the three output tables and appends to the runs table,
/// all inside one transaction.
pub struct SqliteOutputAdapter {
    conn: Mutex<Connection>,
    tables: OutputConfig,
}

impl SqliteOutputAdapter {
    pub fn open<P: AsRef<Path>>(db_path: P, tables: OutputConfig) -> anyhow::Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        info!("Opening SQLite output database: {}", db_path.display());
        let conn = Connection::open(db_path)
            .with_context(|| format!("failed to open database {}", db_path.display()))?;
        Self::with_connection(conn, tables)
    }

    pub fn in_memory(tables: OutputConfig) -> anyhow::Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, tables)
    }

    fn with_connection(conn: Connection, tables: OutputConfig) -> anyhow::Result<Self> {
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{runs}" (
                run_id                   TEXT PRIMARY KEY,
                started_at               TEXT NOT NULL,
                finished_at              TEXT NOT NULL,
                observation_source       TEXT NOT NULL,
                reference_source         TEXT NOT NULL,
                observation_fingerprint  TEXT NOT NULL,
                reference_fingerprint    TEXT NOT NULL,
                observation_rows         INTEGER NOT NULL,
                reference_rows           INTEGER NOT NULL,
                reconciled_rows          INTEGER NOT NULL,
                diagnostics              TEXT NOT NULL
            );
            "#,
            runs = tables.runs_table
        ))?;
        Ok(Self {
            conn: Mutex::new(conn),
            tables,
        })
    }

    pub fn tables(&self) -> &OutputConfig {
        &self.tables
    }

    /// Run a read against the underlying connection.
    pub fn query<T>(&self, f: impl FnOnce(&Connection) -> rusqlite::Result<T>) -> anyhow::Result<T> {
        let conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
        Ok(f(&conn)?)
    }

    fn replace_observations(&self, tx: &Transaction<'_>, output: &PipelineOutput) -> rusqlite::Result<()> {
        let table = &self.tables.observation_table;
        tx.execute_batch(&format!(
            r#"
            DROP TABLE IF EXISTS "{table}";
            CREATE TABLE "{table}" (
                occupation_code   TEXT NOT NULL,
                occupation_title  TEXT,
                employer_name     TEXT,
                annual_wage       REAL NOT NULL
            );
            "#
        ))?;
        let mut stmt = tx.prepare(&format!(
            r#"INSERT INTO "{table}" (occupation_code, occupation_title, employer_name, annual_wage)
               VALUES (?1, ?2, ?3, ?4)"#
        ))?;
        for row in &output.observations {
            stmt.execute(params![
                row.occupation_code,
                row.occupation_title,
                row.employer_name,
                row.annual_wage
            ])?;
        }
        Ok(())
    }

    fn replace_references(&self, tx: &Transaction<'_>, output: &PipelineOutput) -> rusqlite::Result<()> {
        let table = &self.tables.reference_table;
        tx.execute_batch(&format!(
            r#"
            DROP TABLE IF EXISTS "{table}";
            CREATE TABLE "{table}" (
                occupation_code   TEXT NOT NULL,
                occupation_title  TEXT,
                avg_local_wage    REAL NOT NULL
            );
            "#
        ))?;
        let mut stmt = tx.prepare(&format!(
            r#"INSERT INTO "{table}" (occupation_code, occupation_title, avg_local_wage)
               VALUES (?1, ?2, ?3)"#
        ))?;
        for row in &output.references {
            stmt.execute(params![row.occupation_code, row.occupation_title, row.avg_local_wage])?;
        }
        Ok(())
    }

    fn replace_combined(&self, tx: &Transaction<'_>, output: &PipelineOutput) -> rusqlite::Result<()> {
        let table = &self.tables.combined_table;
        tx.execute_batch(&format!(
            r#"
            DROP TABLE IF EXISTS "{table}";
            CREATE TABLE "{table}" (
                occupation_code   TEXT NOT NULL,
                employer_name     TEXT,
                occupation_title  TEXT,
                reference_title   TEXT,
                annual_wage       REAL NOT NULL,
                avg_local_wage    REAL NOT NULL,
                wage_diff         REAL
            );
            "#
        ))?;
        let mut stmt = tx.prepare(&format!(
            r#"INSERT INTO "{table}" (occupation_code, employer_name, occupation_title, reference_title,
                                      annual_wage, avg_local_wage, wage_diff)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"#
        ))?;
        for row in &output.reconciled {
            stmt.execute(params![
                row.occupation_code,
                row.employer_name,
                row.occupation_title,
                row.reference_title,
                row.annual_wage,
                row.avg_local_wage,
                row.wage_diff
            ])?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl ReconciliationOutputPort for SqliteOutputAdapter {
    async fn write_run(&self, run: &RunRecord, output: &PipelineOutput) -> anyhow::Result<()> {
        let diagnostics = serde_json::to_string(&output.diagnostics)?;

        let mut conn = self
            .conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))?;
        let tx = conn.transaction()?;

        self.replace_observations(&tx, output)?;
        self.replace_references(&tx, output)?;
        self.replace_combined(&tx, output)?;
        tx.execute(
            &format!(
                r#"INSERT INTO "{}" (run_id, started_at, finished_at, observation_source, reference_source,
                                     observation_fingerprint, reference_fingerprint,
                                     observation_rows, reference_rows, reconciled_rows, diagnostics)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
                self.tables.runs_table
            ),
            params![
                run.run_id.to_string(),
                run.started_at.to_rfc3339(),
                run.finished_at.to_rfc3339(),
                run.observation_source,
                run.reference_source,
                run.observation_fingerprint,
                run.reference_fingerprint,
                run.observation_rows as i64,
                run.reference_rows as i64,
                run.reconciled_rows as i64,
                diagnostics
            ],
        )?;
        tx.commit()?;

        info!(
            run_id = %run.run_id,
            observations = output.observations.len(),
            references = output.references.len(),
            reconciled = output.reconciled.len(),
            "Saved output tables to SQLite"
        );
        Ok(())
    }
}
