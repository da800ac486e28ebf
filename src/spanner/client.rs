//! Session-based Spanner data client over REST

use super::value::{rows_from_result_set, Mutation, Row, Statement};
use crate::gcp::client::{str_field, GcpClient};
use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::{debug, warn};

/// Which transaction a read or query runs in
#[derive(Debug, Clone, PartialEq)]
pub enum TransactionSelector {
    /// Strong single-use read-only transaction
    SingleUse,
    Id(String),
}

impl TransactionSelector {
    fn to_json(&self) -> Value {
        match self {
            TransactionSelector::SingleUse => json!({ "singleUse": { "readOnly": { "strong": true } } }),
            TransactionSelector::Id(id) => json!({ "id": id }),
        }
    }
}

/// Rows to read by primary key
#[derive(Debug, Clone, PartialEq)]
pub enum KeySet {
    All,
    Keys(Vec<Vec<Value>>),
}

impl KeySet {
    fn to_json(&self) -> Value {
        match self {
            KeySet::All => json!({ "all": true }),
            KeySet::Keys(keys) => json!({ "keys": keys }),
        }
    }
}

/// Data-plane client bound to one database session
pub struct SpannerClient<'a> {
    gcp: &'a GcpClient,
    database: String,
    session: String,
}

impl<'a> SpannerClient<'a> {
    /// Open a session on `database`
    pub async fn connect(gcp: &'a GcpClient, database: &str) -> Result<SpannerClient<'a>> {
        let url = format!("{}/{}/sessions", gcp.spanner_root(), database);
        let session = gcp
            .post(&url, Some(&json!({})))
            .await
            .context("failed to create session")?;

        let session = str_field(&session, "name").to_string();
        if session.is_empty() {
            anyhow::bail!("session response has no name");
        }
        debug!("Opened Spanner session {}", session);

        Ok(Self {
            gcp,
            database: database.to_string(),
            session,
        })
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    fn session_url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.gcp.spanner_root(), self.session, method)
    }

    /// Delete the session. Failures are only logged.
    pub async fn close(self) {
        let url = format!("{}/{}", self.gcp.spanner_root(), self.session);
        if let Err(e) = self.gcp.delete(&url).await {
            warn!("Failed to delete session {}: {}", self.session, e);
        }
    }

    pub async fn execute_sql(
        &self,
        stmt: &Statement,
        txn: &TransactionSelector,
    ) -> Result<Vec<Row>> {
        let mut body = stmt.to_json();
        body["transaction"] = txn.to_json();

        let result = self
            .gcp
            .post(&self.session_url("executeSql"), Some(&body))
            .await
            .context("query failed")?;
        Ok(rows_from_result_set(&result))
    }

    /// Query in a strong single-use read-only transaction
    pub async fn query(&self, stmt: &Statement) -> Result<Vec<Row>> {
        self.execute_sql(stmt, &TransactionSelector::SingleUse).await
    }

    pub async fn read(
        &self,
        table: &str,
        index: Option<&str>,
        keys: &KeySet,
        columns: &[&str],
        txn: &TransactionSelector,
    ) -> Result<Vec<Row>> {
        let mut body = json!({
            "table": table,
            "columns": columns,
            "keySet": keys.to_json(),
            "transaction": txn.to_json(),
        });
        if let Some(index) = index {
            body["index"] = json!(index);
        }

        let result = self
            .gcp
            .post(&self.session_url("read"), Some(&body))
            .await
            .context("read failed")?;
        Ok(rows_from_result_set(&result))
    }

    async fn begin(&self, options: Value) -> Result<String> {
        let txn = self
            .gcp
            .post(
                &self.session_url("beginTransaction"),
                Some(&json!({ "options": options })),
            )
            .await
            .context("failed to begin transaction")?;

        let id = str_field(&txn, "id").to_string();
        if id.is_empty() {
            anyhow::bail!("transaction response has no id");
        }
        Ok(id)
    }

    pub async fn begin_read_write(&self) -> Result<String> {
        self.begin(json!({ "readWrite": {} })).await
    }

    /// Strong read-only transaction usable across several reads
    pub async fn begin_read_only(&self) -> Result<String> {
        self.begin(json!({ "readOnly": { "strong": true } })).await
    }

    /// Apply `mutations` in a single-use read-write transaction
    pub async fn apply(&self, mutations: &[Mutation]) -> Result<Value> {
        let body = json!({
            "singleUseTransaction": { "readWrite": {} },
            "mutations": mutations.iter().map(Mutation::to_json).collect::<Vec<_>>(),
        });
        self.gcp
            .post(&self.session_url("commit"), Some(&body))
            .await
            .context("commit failed")
    }

    pub async fn commit(&self, transaction_id: &str, mutations: &[Mutation]) -> Result<Value> {
        let body = json!({
            "transactionId": transaction_id,
            "mutations": mutations.iter().map(Mutation::to_json).collect::<Vec<_>>(),
        });
        self.gcp
            .post(&self.session_url("commit"), Some(&body))
            .await
            .context("commit failed")
    }

    pub async fn rollback(&self, transaction_id: &str) -> Result<()> {
        self.gcp
            .post(
                &self.session_url("rollback"),
                Some(&json!({ "transactionId": transaction_id })),
            )
            .await
            .context("rollback failed")?;
        Ok(())
    }

    /// Run DML statements in order inside `transaction_id`; returns the row counts
    pub async fn batch_update(
        &self,
        transaction_id: &str,
        stmts: &[Statement],
    ) -> Result<Vec<i64>> {
        let body = json!({
            "transaction": { "id": transaction_id },
            "statements": stmts.iter().map(Statement::to_json).collect::<Vec<_>>(),
            "seqno": "1",
        });
        let response = self
            .gcp
            .post(&self.session_url("executeBatchDml"), Some(&body))
            .await
            .context("batch update failed")?;

        if let Some(status) = response.get("status") {
            let code = status.get("code").and_then(|c| c.as_i64()).unwrap_or(0);
            if code != 0 {
                anyhow::bail!(
                    "batch update failed: {}",
                    str_field(status, "message")
                );
            }
        }

        let counts = response
            .get("resultSets")
            .and_then(|v| v.as_array())
            .map(|sets| {
                sets.iter()
                    .map(|set| {
                        set.pointer("/stats/rowCountExact")
                            .and_then(|c| c.as_str())
                            .and_then(|c| c.parse().ok())
                            .unwrap_or(0)
                    })
                    .collect()
            })
            .unwrap_or_default();
        Ok(counts)
    }

    /// Run `stmts` as batched DML in a fresh read-write transaction and commit.
    /// The transaction is rolled back when the batch fails.
    pub async fn batch_update_in_transaction(&self, stmts: &[Statement]) -> Result<Vec<i64>> {
        let txn = self.begin_read_write().await?;
        match self.batch_update(&txn, stmts).await {
            Ok(counts) => {
                self.commit(&txn, &[]).await?;
                Ok(counts)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback(&txn).await {
                    warn!("Rollback failed: {}", rollback_err);
                }
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spanner::value::int64;

    #[test]
    fn test_selectors_and_key_sets() {
        assert_eq!(
            TransactionSelector::SingleUse.to_json(),
            json!({ "singleUse": { "readOnly": { "strong": true } } })
        );
        assert_eq!(TransactionSelector::Id("tx".to_string()).to_json(), json!({ "id": "tx" }));
        assert_eq!(KeySet::All.to_json(), json!({ "all": true }));
        assert_eq!(
            KeySet::Keys(vec![vec![int64(2), int64(2)]]).to_json(),
            json!({ "keys": [["2", "2"]] })
        );
    }
}
