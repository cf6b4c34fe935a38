use crate::prelude::*;

use async_trait::async_trait;
use sqlx::any::AnyConnectOptions;
use sqlx::AnyConnection;
use sqlx::Connection;

const COLUMNS: [&str; 28] = [
    "created_at", "inverter_id", "temperature",
    "v_pv_1", "v_pv_2", "v_pv_3", "i_pv_1", "i_pv_2", "i_pv_3",
    "i_ac_1", "i_ac_2", "i_ac_3", "v_ac_1", "v_ac_2", "v_ac_3",
    "f_ac_1", "f_ac_2", "f_ac_3", "p_ac_1", "p_ac_2", "p_ac_3",
    "e_today", "e_total", "h_total", "run_state", "error_code",
    "main_fw", "slave_fw",
];

const CREATE_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS readings (
    created_at VARCHAR(32) NOT NULL,
    inverter_id VARCHAR(32) NOT NULL,
    temperature DOUBLE PRECISION NOT NULL,
    v_pv_1 DOUBLE PRECISION, v_pv_2 DOUBLE PRECISION, v_pv_3 DOUBLE PRECISION,
    i_pv_1 DOUBLE PRECISION, i_pv_2 DOUBLE PRECISION, i_pv_3 DOUBLE PRECISION,
    i_ac_1 DOUBLE PRECISION, i_ac_2 DOUBLE PRECISION, i_ac_3 DOUBLE PRECISION,
    v_ac_1 DOUBLE PRECISION, v_ac_2 DOUBLE PRECISION, v_ac_3 DOUBLE PRECISION,
    f_ac_1 DOUBLE PRECISION, f_ac_2 DOUBLE PRECISION, f_ac_3 DOUBLE PRECISION,
    p_ac_1 INTEGER, p_ac_2 INTEGER, p_ac_3 INTEGER,
    e_today DOUBLE PRECISION NOT NULL,
    e_total DOUBLE PRECISION NOT NULL,
    h_total BIGINT NOT NULL,
    run_state INTEGER NOT NULL,
    error_code BIGINT NOT NULL,
    main_fw VARCHAR(32) NOT NULL,
    slave_fw VARCHAR(32) NOT NULL
)"#;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DatabaseType {
    MySQL,
    Postgres,
    SQLite,
}

impl DatabaseType {
    pub fn from_url(url: &str) -> Result<Self> {
        let prefix: Vec<&str> = url.splitn(2, ':').collect();
        match prefix[0] {
            "sqlite" => Ok(DatabaseType::SQLite),
            "mysql" | "mariadb" => Ok(DatabaseType::MySQL),
            "postgres" | "postgresql" => Ok(DatabaseType::Postgres),
            _ => Err(file_error!("unsupported database {}", url)),
        }
    }
}

/// Inserts each reading as one row of the `readings` table.
#[derive(Debug, Clone)]
pub struct Database {
    config: config::Database,
    kind: DatabaseType,
}

impl Database {
    pub fn new(config: config::Database) -> Result<Self> {
        let kind = DatabaseType::from_url(config.url())?;
        Ok(Self { config, kind })
    }

    pub fn insert_query(kind: DatabaseType) -> String {
        let values: Vec<String> = match kind {
            DatabaseType::MySQL => COLUMNS.iter().map(|_| "?".to_string()).collect(),
            _ => (1..=COLUMNS.len()).map(|n| format!("${}", n)).collect(),
        };

        format!(
            "INSERT INTO readings ({}) VALUES ({})",
            COLUMNS.join(", "),
            values.join(", ")
        )
    }

    async fn connect(&self) -> Result<AnyConnection> {
        sqlx::any::install_default_drivers();

        let options = AnyConnectOptions::from_str(self.config.url())?;
        let conn = AnyConnection::connect_with(&options).await?;

        Ok(conn)
    }

    async fn insert(&self, conn: &mut AnyConnection, reading: &Reading) -> Result<()> {
        let query = Self::insert_query(self.kind);

        sqlx::query(&query)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(reading.id.clone())
            .bind(reading.temperature)
            .bind(reading.v_pv_1)
            .bind(reading.v_pv_2)
            .bind(reading.v_pv_3)
            .bind(reading.i_pv_1)
            .bind(reading.i_pv_2)
            .bind(reading.i_pv_3)
            .bind(reading.i_ac_1)
            .bind(reading.i_ac_2)
            .bind(reading.i_ac_3)
            .bind(reading.v_ac_1)
            .bind(reading.v_ac_2)
            .bind(reading.v_ac_3)
            .bind(reading.f_ac_1)
            .bind(reading.f_ac_2)
            .bind(reading.f_ac_3)
            .bind(reading.p_ac_1.map(i32::from))
            .bind(reading.p_ac_2.map(i32::from))
            .bind(reading.p_ac_3.map(i32::from))
            .bind(reading.e_today)
            .bind(reading.e_total)
            .bind(reading.h_total as i64)
            .bind(reading.run_state as i32)
            .bind(reading.error_code as i64)
            .bind(reading.main_fw.clone())
            .bind(reading.slave_fw.clone())
            .execute(&mut *conn)
            .await?;

        Ok(())
    }
}

impl PluginCommon for Database {
    fn name(&self) -> &'static str {
        "database"
    }

    fn describe(&self) -> String {
        format!("{:?} at {}", self.kind, self.config.url())
    }
}

#[async_trait]
impl Output for Database {
    async fn process(&self, reading: &Reading) -> Result<()> {
        let mut conn = self.connect().await?;

        sqlx::query(CREATE_TABLE).execute(&mut conn).await?;
        let result = self.insert(&mut conn, reading).await;

        if let Err(e) = conn.close().await {
            warn!("closing database connection failed: {}", e);
        }

        result
    }
}
