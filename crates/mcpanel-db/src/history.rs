//! History repository - resource and player samples

use chrono::{DateTime, Utc};
use mcpanel_core::{Error, HistorySample, Result};
use sqlx::sqlite::SqlitePool;
use sqlx::Row;

use crate::{format_time, parse_time};

/// Repository for history samples
pub struct HistoryRepository {
    pool: SqlitePool,
}

impl HistoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Append a sample
    pub async fn insert(&self, sample: &HistorySample) -> Result<u32> {
        let result = sqlx::query(
            r#"
            INSERT INTO history (server_id, time, cpu, memory, players)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(sample.server_id as i64)
        .bind(format_time(sample.time))
        .bind(sample.cpu)
        .bind(sample.memory)
        .bind(sample.players as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.last_insert_rowid() as u32)
    }

    /// Delete samples strictly older than the cutoff
    pub async fn delete_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM history WHERE time < ?")
            .bind(format_time(cutoff))
            .execute(&self.pool)
            .await
            .map_err(|e| Error::DbError(e.to_string()))?;

        Ok(result.rows_affected())
    }

    /// Samples of one server, oldest first
    pub async fn get_by_server(&self, server_id: u32) -> Result<Vec<HistorySample>> {
        let rows = sqlx::query(
            r#"
            SELECT server_id, time, cpu, memory, players
            FROM history WHERE server_id = ?
            ORDER BY time, id
            "#,
        )
        .bind(server_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Error::DbError(e.to_string()))?;

        rows.iter()
            .map(|row| {
                let server_id: i64 = row.get("server_id");
                let time: String = row.get("time");
                let players: i64 = row.get("players");
                Ok(HistorySample {
                    server_id: server_id as u32,
                    time: parse_time(&time)?,
                    cpu: row.get("cpu"),
                    memory: row.get("memory"),
                    players: players.max(0) as u32,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::setup_db;
    use chrono::Duration;

    fn sample(time: DateTime<Utc>) -> HistorySample {
        HistorySample {
            server_id: 1,
            time,
            cpu: 12.5,
            memory: 40.0,
            players: 3,
        }
    }

    #[tokio::test]
    async fn test_insert_and_read_back() {
        let (db, _dir) = setup_db().await;
        let now = parse_time("2024-05-01 10:00:00").unwrap();
        db.history().insert(&sample(now)).await.unwrap();

        let samples = db.history().get_by_server(1).await.unwrap();
        assert_eq!(samples, vec![sample(now)]);
    }

    #[tokio::test]
    async fn test_delete_is_strict() {
        let (db, _dir) = setup_db().await;
        let base = parse_time("2024-05-01 10:00:00").unwrap();
        db.history().insert(&sample(base - Duration::seconds(1))).await.unwrap();
        db.history().insert(&sample(base)).await.unwrap();

        let deleted = db.history().delete_older_than(base).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = db.history().get_by_server(1).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].time, base);
    }
}
