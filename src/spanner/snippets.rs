//! Singers and Albums walkthrough

use super::admin::{create_database as create_db, update_database_ddl};
use super::client::{KeySet, SpannerClient, TransactionSelector};
use super::value::{display_nullable, int64, string, Mutation, Row, Statement};
use crate::gcp::client::GcpClient;
use anyhow::Result;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

pub const USAGE: &str = "Usage: gcp-snippets spanner snippets <command> <database_name>

\tCommand can be one of: createdatabase, write, query, read, update,
\t\twritetransaction, addnewcolumn, querynewcolumn, addindex, queryindex, readindex,
\t\taddstoringindex, readstoringindex, readonlytransaction

Examples:
\tgcp-snippets spanner snippets createdatabase projects/my-project/instances/my-instance/databases/example-db
\tgcp-snippets spanner snippets write projects/my-project/instances/my-instance/databases/example-db
";

const ALBUM_COLUMNS: [&str; 3] = ["SingerId", "AlbumId", "AlbumTitle"];
const BUDGET_COLUMNS: [&str; 3] = ["SingerId", "AlbumId", "MarketingBudget"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnippetCommand {
    CreateDatabase,
    Write,
    Query,
    Read,
    Update,
    WriteTransaction,
    AddNewColumn,
    QueryNewColumn,
    AddIndex,
    QueryIndex,
    ReadIndex,
    AddStoringIndex,
    ReadStoringIndex,
    ReadOnlyTransaction,
}

impl SnippetCommand {
    pub const ALL: [SnippetCommand; 14] = [
        SnippetCommand::CreateDatabase,
        SnippetCommand::Write,
        SnippetCommand::Query,
        SnippetCommand::Read,
        SnippetCommand::Update,
        SnippetCommand::WriteTransaction,
        SnippetCommand::AddNewColumn,
        SnippetCommand::QueryNewColumn,
        SnippetCommand::AddIndex,
        SnippetCommand::QueryIndex,
        SnippetCommand::ReadIndex,
        SnippetCommand::AddStoringIndex,
        SnippetCommand::ReadStoringIndex,
        SnippetCommand::ReadOnlyTransaction,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SnippetCommand::CreateDatabase => "createdatabase",
            SnippetCommand::Write => "write",
            SnippetCommand::Query => "query",
            SnippetCommand::Read => "read",
            SnippetCommand::Update => "update",
            SnippetCommand::WriteTransaction => "writetransaction",
            SnippetCommand::AddNewColumn => "addnewcolumn",
            SnippetCommand::QueryNewColumn => "querynewcolumn",
            SnippetCommand::AddIndex => "addindex",
            SnippetCommand::QueryIndex => "queryindex",
            SnippetCommand::ReadIndex => "readindex",
            SnippetCommand::AddStoringIndex => "addstoringindex",
            SnippetCommand::ReadStoringIndex => "readstoringindex",
            SnippetCommand::ReadOnlyTransaction => "readonlytransaction",
        }
    }

    /// Schema commands go through the admin API and need no session
    pub fn is_admin(&self) -> bool {
        matches!(
            self,
            SnippetCommand::CreateDatabase
                | SnippetCommand::AddNewColumn
                | SnippetCommand::AddIndex
                | SnippetCommand::AddStoringIndex
        )
    }
}

impl fmt::Display for SnippetCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SnippetCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        SnippetCommand::ALL
            .iter()
            .copied()
            .find(|c| c.name() == s)
            .ok_or_else(|| anyhow::anyhow!("unknown command {}", s))
    }
}

pub async fn create_database(w: &mut impl Write, client: &GcpClient, db: &str) -> Result<()> {
    create_db(
        client,
        db,
        &[
            "CREATE TABLE Singers (
				SingerId   INT64 NOT NULL,
				FirstName  STRING(1024),
				LastName   STRING(1024),
				SingerInfo BYTES(MAX)
			) PRIMARY KEY (SingerId)",
            "CREATE TABLE Albums (
				SingerId	INT64 NOT NULL,
				AlbumId		INT64 NOT NULL,
				AlbumTitle	STRING(MAX),
			) PRIMARY KEY (SingerId, AlbumId),
			INTERLEAVE IN PARENT Singers ON DELETE CASCADE",
        ],
    )
    .await?;

    writeln!(w, "Created database [{}]", db)?;
    Ok(())
}

pub async fn write(client: &SpannerClient<'_>) -> Result<()> {
    let singer_columns = ["SingerId", "FirstName", "LastName"];
    let singers = [
        (1, "Marc", "Richards"),
        (2, "Catalina", "Smith"),
        (3, "Alice", "Trentor"),
        (4, "Lea", "Martin"),
        (5, "David", "Lomond"),
    ];
    let albums = [
        (1, 1, "Total Junk"),
        (1, 2, "Go, Go, Go"),
        (2, 1, "Green"),
        (2, 2, "Forever Hold Your Peace"),
        (2, 3, "Terrified"),
    ];

    let mut mutations: Vec<Mutation> = singers
        .iter()
        .map(|(id, first, last)| {
            Mutation::insert_or_update("Singers", &singer_columns, vec![int64(*id), string(*first), string(*last)])
        })
        .collect();
    mutations.extend(albums.iter().map(|(singer, album, title)| {
        Mutation::insert_or_update("Albums", &ALBUM_COLUMNS, vec![int64(*singer), int64(*album), string(*title)])
    }));

    client.apply(&mutations).await?;
    Ok(())
}

fn write_album_rows(w: &mut impl Write, rows: &[Row]) -> Result<()> {
    for row in rows {
        writeln!(w, "{} {} {}", row.int64(0)?, row.int64(1)?, row.string(2)?)?;
    }
    Ok(())
}

pub async fn query(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let rows = client
        .query(&Statement::new("SELECT SingerId, AlbumId, AlbumTitle FROM Albums"))
        .await?;
    write_album_rows(w, &rows)
}

pub async fn read(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let rows = client
        .read("Albums", None, &KeySet::All, &ALBUM_COLUMNS, &TransactionSelector::SingleUse)
        .await?;
    write_album_rows(w, &rows)
}

pub async fn add_new_column(w: &mut impl Write, client: &GcpClient, db: &str) -> Result<()> {
    update_database_ddl(client, db, &["ALTER TABLE Albums ADD COLUMN MarketingBudget INT64"]).await?;
    writeln!(w, "Added MarketingBudget column")?;
    Ok(())
}

pub async fn update(client: &SpannerClient<'_>) -> Result<()> {
    client
        .apply(&[
            Mutation::update("Albums", &BUDGET_COLUMNS, vec![int64(1), int64(1), int64(100000)]),
            Mutation::update("Albums", &BUDGET_COLUMNS, vec![int64(2), int64(2), int64(500000)]),
        ])
        .await?;
    Ok(())
}

async fn read_budget(
    client: &SpannerClient<'_>,
    txn: &TransactionSelector,
    singer: i64,
    album: i64,
) -> Result<i64> {
    let rows = client
        .read(
            "Albums",
            None,
            &KeySet::Keys(vec![vec![int64(singer), int64(album)]]),
            &["MarketingBudget"],
            txn,
        )
        .await?;
    let row = rows
        .first()
        .ok_or_else(|| anyhow::anyhow!("row not found: ({}, {})", singer, album))?;
    row.int64(0)
}

/// Move 200,000 of budget from album (2, 2) to album (1, 1) when it can afford it
pub async fn write_with_transaction(client: &SpannerClient<'_>) -> Result<()> {
    const TRANSFER: i64 = 200000;

    let txn_id = client.begin_read_write().await?;
    let txn = TransactionSelector::Id(txn_id.clone());

    let result: Result<Vec<Mutation>> = async {
        let mut album2_budget = read_budget(client, &txn, 2, 2).await?;
        if album2_budget < 300000 {
            return Ok(Vec::new());
        }
        let mut album1_budget = read_budget(client, &txn, 1, 1).await?;
        album1_budget += TRANSFER;
        album2_budget -= TRANSFER;
        Ok(vec![
            Mutation::update("Albums", &BUDGET_COLUMNS, vec![int64(1), int64(1), int64(album1_budget)]),
            Mutation::update("Albums", &BUDGET_COLUMNS, vec![int64(2), int64(2), int64(album2_budget)]),
        ])
    }
    .await;

    match result {
        Ok(mutations) => {
            client.commit(&txn_id, &mutations).await?;
            Ok(())
        }
        Err(e) => {
            if let Err(rollback_err) = client.rollback(&txn_id).await {
                tracing::warn!("Rollback failed: {}", rollback_err);
            }
            Err(e)
        }
    }
}

pub async fn query_new_column(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let rows = client
        .query(&Statement::new("SELECT SingerId, AlbumId, MarketingBudget FROM Albums"))
        .await?;
    for row in &rows {
        writeln!(
            w,
            "{} {} {}",
            row.int64_by_name("SingerId")?,
            row.int64_by_name("AlbumId")?,
            display_nullable(row.nullable_int64_by_name("MarketingBudget")?)
        )?;
    }
    Ok(())
}

pub async fn add_index(w: &mut impl Write, client: &GcpClient, db: &str) -> Result<()> {
    update_database_ddl(client, db, &["CREATE INDEX AlbumsByAlbumTitle ON Albums(AlbumTitle)"]).await?;
    writeln!(w, "Added index")?;
    Ok(())
}

pub async fn query_using_index(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let stmt = Statement::new(
        "SELECT AlbumId, AlbumTitle, MarketingBudget
			FROM Albums@{FORCE_INDEX=AlbumsByAlbumTitle}
			WHERE AlbumTitle >= 'Aardvark' AND AlbumTitle < 'Goo'",
    );
    let rows = client.query(&stmt).await?;
    for row in &rows {
        writeln!(
            w,
            "{} {} {}",
            row.int64_by_name("AlbumId")?,
            row.string_by_name("AlbumTitle")?,
            display_nullable(row.nullable_int64_by_name("MarketingBudget")?)
        )?;
    }
    Ok(())
}

pub async fn read_using_index(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let rows = client
        .read(
            "Albums",
            Some("AlbumsByAlbumTitle"),
            &KeySet::All,
            &["AlbumId", "AlbumTitle"],
            &TransactionSelector::SingleUse,
        )
        .await?;
    for row in &rows {
        writeln!(w, "{} {}", row.int64(0)?, row.string(1)?)?;
    }
    Ok(())
}

pub async fn add_storing_index(w: &mut impl Write, client: &GcpClient, db: &str) -> Result<()> {
    update_database_ddl(
        client,
        db,
        &["CREATE INDEX AlbumsByAlbumTitle2 ON Albums(AlbumTitle) STORING (MarketingBudget)"],
    )
    .await?;
    writeln!(w, "Added storing index")?;
    Ok(())
}

pub async fn read_storing_index(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let rows = client
        .read(
            "Albums",
            Some("AlbumsByAlbumTitle2"),
            &KeySet::All,
            &["AlbumId", "AlbumTitle", "MarketingBudget"],
            &TransactionSelector::SingleUse,
        )
        .await?;
    for row in &rows {
        writeln!(
            w,
            "{} {} {}",
            row.int64(0)?,
            row.string(1)?,
            display_nullable(row.nullable_int64(2)?)
        )?;
    }
    Ok(())
}

/// Query and read the albums at one consistent snapshot
pub async fn read_only_transaction(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let txn = TransactionSelector::Id(client.begin_read_only().await?);

    let rows = client
        .execute_sql(&Statement::new("SELECT SingerId, AlbumId, AlbumTitle FROM Albums"), &txn)
        .await?;
    write_album_rows(w, &rows)?;

    let rows = client.read("Albums", None, &KeySet::All, &ALBUM_COLUMNS, &txn).await?;
    write_album_rows(w, &rows)
}

async fn run_data_command(
    w: &mut impl Write,
    client: &SpannerClient<'_>,
    cmd: SnippetCommand,
) -> Result<()> {
    match cmd {
        SnippetCommand::Write => write(client).await,
        SnippetCommand::Query => query(w, client).await,
        SnippetCommand::Read => read(w, client).await,
        SnippetCommand::Update => update(client).await,
        SnippetCommand::WriteTransaction => write_with_transaction(client).await,
        SnippetCommand::QueryNewColumn => query_new_column(w, client).await,
        SnippetCommand::QueryIndex => query_using_index(w, client).await,
        SnippetCommand::ReadIndex => read_using_index(w, client).await,
        SnippetCommand::ReadStoringIndex => read_storing_index(w, client).await,
        SnippetCommand::ReadOnlyTransaction => read_only_transaction(w, client).await,
        admin => anyhow::bail!("{} is not a data command", admin),
    }
}

async fn dispatch(
    w: &mut impl Write,
    client: &GcpClient,
    cmd: SnippetCommand,
    db: &str,
) -> Result<()> {
    match cmd {
        SnippetCommand::CreateDatabase => create_database(w, client, db).await,
        SnippetCommand::AddNewColumn => add_new_column(w, client, db).await,
        SnippetCommand::AddIndex => add_index(w, client, db).await,
        SnippetCommand::AddStoringIndex => add_storing_index(w, client, db).await,
        data => {
            let session = SpannerClient::connect(client, db).await?;
            let result = run_data_command(w, &session, data).await;
            session.close().await;
            result
        }
    }
}

/// Run one command against `db`, printing `{cmd} failed with {err}` on failure
pub async fn run(
    w: &mut impl Write,
    client: &GcpClient,
    cmd: SnippetCommand,
    db: &str,
) -> Result<()> {
    let result = dispatch(w, client, cmd, db).await;
    if let Err(e) = &result {
        write!(w, "{} failed with {:#}", cmd, e)?;
    }
    result
}
