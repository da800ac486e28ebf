//! Game leaderboard on Players and Scores

use super::admin::create_database as create_db;
use super::client::SpannerClient;
use super::value::{Row, Statement};
use crate::gcp::client::GcpClient;
use anyhow::Result;
use chrono::{Duration, Months, Utc};
use rand::Rng;
use std::collections::HashSet;
use std::io::Write;

pub const USAGE: &str = "Usage: gcp-snippets spanner leaderboard <command> <database_name> [command_option]

\tCommand can be one of: createdatabase, insertplayers, insertscores, query, querywithtimespan

Examples:
\tgcp-snippets spanner leaderboard createdatabase projects/my-project/instances/my-instance/databases/example-db
\t\t- Create a sample Cloud Spanner database along with sample tables in your project.
\tgcp-snippets spanner leaderboard insertplayers projects/my-project/instances/my-instance/databases/example-db
\t\t- Insert 100 sample Player records into the database.
\tgcp-snippets spanner leaderboard insertscores projects/my-project/instances/my-instance/databases/example-db
\t\t- Insert sample score data into Scores sample Cloud Spanner database table.
\tgcp-snippets spanner leaderboard query projects/my-project/instances/my-instance/databases/example-db
\t\t- Query players with top ten scores of all time.
\tgcp-snippets spanner leaderboard querywithtimespan projects/my-project/instances/my-instance/databases/example-db 168
\t\t- Query players with top ten scores within a timespan specified in hours.
";

const PLAYER_ID_MIN: i64 = 1_000_000_000;
const PLAYER_ID_RANGE: i64 = 9_000_000_000;
const PLAYERS_PER_BATCH: usize = 100;
const SCORES_PER_PLAYER: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderboardCommand {
    CreateDatabase,
    InsertPlayers,
    InsertScores,
    Query,
    QueryWithTimespan(i64),
}

impl LeaderboardCommand {
    /// Parse a verb and its optional hour count. `querywithtimespan` needs a
    /// non-zero timespan; anything unknown yields `None`.
    pub fn parse(cmd: &str, timespan: Option<i64>) -> Option<Self> {
        match cmd {
            "createdatabase" => Some(LeaderboardCommand::CreateDatabase),
            "insertplayers" => Some(LeaderboardCommand::InsertPlayers),
            "insertscores" => Some(LeaderboardCommand::InsertScores),
            "query" => Some(LeaderboardCommand::Query),
            "querywithtimespan" => match timespan {
                Some(hours) if hours != 0 => Some(LeaderboardCommand::QueryWithTimespan(hours)),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LeaderboardCommand::CreateDatabase => "createdatabase",
            LeaderboardCommand::InsertPlayers => "insertplayers",
            LeaderboardCommand::InsertScores => "insertscores",
            LeaderboardCommand::Query => "query",
            LeaderboardCommand::QueryWithTimespan(_) => "querywithtimespan",
        }
    }
}

/// Random values never handed out twice
struct UniqueRand<R: Rng> {
    used: HashSet<i64>,
    rng: R,
}

impl<R: Rng> UniqueRand<R> {
    fn new(rng: R) -> Self {
        Self {
            used: HashSet::new(),
            rng,
        }
    }

    /// Value in `[min, min + range)`
    fn next(&mut self, min: i64, range: i64) -> i64 {
        loop {
            let value = self.rng.gen_range(0..range) + min;
            if self.used.insert(value) {
                return value;
            }
        }
    }
}

/// `1234567` as `1,234,567`
pub fn format_with_commas(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub async fn create_database(w: &mut impl Write, client: &GcpClient, db: &str) -> Result<()> {
    create_db(
        client,
        db,
        &[
            "CREATE TABLE Players(
			    PlayerId INT64 NOT NULL,
			    PlayerName STRING(2048) NOT NULL
			) PRIMARY KEY(PlayerId)",
            "CREATE TABLE Scores(
			    PlayerId INT64 NOT NULL,
			    Score INT64 NOT NULL,
			    Timestamp TIMESTAMP NOT NULL
			    OPTIONS(allow_commit_timestamp=true)
			) PRIMARY KEY(PlayerId, Timestamp),
			INTERLEAVE IN PARENT Players ON DELETE NO ACTION",
        ],
    )
    .await?;

    writeln!(w, "Created database [{}]", db)?;
    Ok(())
}

/// Add 100 players named after the running player count
pub async fn insert_players(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let rows = client
        .query(&Statement::new("SELECT Count(PlayerId) as PlayerCount FROM Players"))
        .await?;
    let mut number_of_players = match rows.first() {
        Some(row) => row.int64(0)?,
        None => 0,
    };

    let mut ids = UniqueRand::new(rand::thread_rng());
    let stmts: Vec<Statement> = (0..PLAYERS_PER_BATCH)
        .map(|_| {
            number_of_players += 1;
            Statement::new(
                "INSERT INTO Players
						(PlayerId, PlayerName)
						VALUES (@playerID, @playerName)",
            )
            .bind_int64("playerID", ids.next(PLAYER_ID_MIN, PLAYER_ID_RANGE))
            .bind_string("playerName", format!("Player {}", number_of_players))
        })
        .collect();

    client.batch_update_in_transaction(&stmts).await?;
    writeln!(w, "Inserted players ")?;
    Ok(())
}

/// Four random scores per player, dated within the past two years
pub async fn insert_scores(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let players = client
        .query(&Statement::new("SELECT PlayerId FROM Players"))
        .await?;
    if players.is_empty() {
        writeln!(
            w,
            "No player records currently exist. First insert players then insert scores."
        )?;
        return Ok(());
    }

    let now = Utc::now();
    let start = now
        .checked_sub_months(Months::new(24))
        .unwrap_or(now - Duration::days(730));
    let (start_secs, end_secs) = (start.timestamp(), now.timestamp());

    let mut rng = rand::thread_rng();
    let mut stmts = Vec::with_capacity(players.len() * SCORES_PER_PLAYER);
    for player in &players {
        let player_id = player.int64_by_name("PlayerId")?;
        for _ in 0..SCORES_PER_PLAYER {
            let score = rng.gen_range(1000..1_000_000i64);
            let secs = rng.gen_range(start_secs..end_secs);
            let at = chrono::DateTime::from_timestamp(secs, 0).unwrap_or(now);

            stmts.push(
                Statement::new(
                    "INSERT INTO Scores
						(PlayerId, Score, Timestamp)
						VALUES (@playerID, @score, @timestamp)",
                )
                .bind_int64("playerID", player_id)
                .bind_int64("score", score)
                .bind_timestamp("timestamp", at),
            );
        }
    }

    client.batch_update_in_transaction(&stmts).await?;
    writeln!(w, "Inserted scores")?;
    Ok(())
}

fn write_score_rows(w: &mut impl Write, rows: &[Row]) -> Result<()> {
    for row in rows {
        writeln!(
            w,
            "PlayerId: {}  PlayerName: {}  Score: {}  Timestamp: {}",
            row.int64(0)?,
            row.string(1)?,
            format_with_commas(row.int64(2)?),
            row.timestamp(3)?.format("%Y-%m-%d")
        )?;
    }
    Ok(())
}

/// Top ten scores of all time
pub async fn query(w: &mut impl Write, client: &SpannerClient<'_>) -> Result<()> {
    let rows = client
        .query(&Statement::new(
            "SELECT p.PlayerId, p.PlayerName, s.Score, s.Timestamp
		        FROM Players p
		        JOIN Scores s ON p.PlayerId = s.PlayerId
		        ORDER BY s.Score DESC LIMIT 10",
        ))
        .await?;
    write_score_rows(w, &rows)
}

/// Top ten scores of the last `timespan_hours`
pub async fn query_with_timespan(
    w: &mut impl Write,
    client: &SpannerClient<'_>,
    timespan_hours: i64,
) -> Result<()> {
    let rows = client
        .query(
            &Statement::new(
                "SELECT p.PlayerId, p.PlayerName, s.Score, s.Timestamp
				FROM Players p
				JOIN Scores s ON p.PlayerId = s.PlayerId
				WHERE s.Timestamp > TIMESTAMP_SUB(CURRENT_TIMESTAMP(), INTERVAL @Timespan HOUR)
				ORDER BY s.Score DESC LIMIT 10",
            )
            .bind_int64("Timespan", timespan_hours),
        )
        .await?;
    write_score_rows(w, &rows)
}

async fn dispatch(
    w: &mut impl Write,
    client: &GcpClient,
    cmd: LeaderboardCommand,
    db: &str,
) -> Result<()> {
    if cmd == LeaderboardCommand::CreateDatabase {
        return create_database(w, client, db).await;
    }

    let session = SpannerClient::connect(client, db).await?;
    let result = match cmd {
        LeaderboardCommand::InsertPlayers => insert_players(w, &session).await,
        LeaderboardCommand::InsertScores => insert_scores(w, &session).await,
        LeaderboardCommand::Query => query(w, &session).await,
        LeaderboardCommand::QueryWithTimespan(hours) => {
            query_with_timespan(w, &session, hours).await
        }
        LeaderboardCommand::CreateDatabase => Ok(()),
    };
    session.close().await;
    result
}

/// Run one command against `db`, printing `{cmd} failed with {err}` on failure
pub async fn run(
    w: &mut impl Write,
    client: &GcpClient,
    cmd: LeaderboardCommand,
    db: &str,
) -> Result<()> {
    let result = dispatch(w, client, cmd, db).await;
    if let Err(e) = &result {
        write!(w, "{} failed with {:#}", cmd.name(), e)?;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_format_with_commas() {
        assert_eq!(format_with_commas(0), "0");
        assert_eq!(format_with_commas(999), "999");
        assert_eq!(format_with_commas(1000), "1,000");
        assert_eq!(format_with_commas(123456), "123,456");
        assert_eq!(format_with_commas(1234567), "1,234,567");
        assert_eq!(format_with_commas(-98765), "-98,765");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            LeaderboardCommand::parse("querywithtimespan", Some(168)),
            Some(LeaderboardCommand::QueryWithTimespan(168))
        );
        assert_eq!(LeaderboardCommand::parse("querywithtimespan", None), None);
        assert_eq!(LeaderboardCommand::parse("querywithtimespan", Some(0)), None);
        assert_eq!(LeaderboardCommand::parse("insertplayers", None), Some(LeaderboardCommand::InsertPlayers));
        assert_eq!(LeaderboardCommand::parse("dropplayers", None), None);
    }

    #[test]
    fn test_unique_rand_never_repeats() {
        let mut ids = UniqueRand::new(StdRng::seed_from_u64(7));
        let drawn: Vec<i64> = (0..50).map(|_| ids.next(10, 50)).collect();
        let distinct: HashSet<_> = drawn.iter().collect();
        assert_eq!(distinct.len(), 50);
        assert!(drawn.iter().all(|v| (10..60).contains(v)));
    }
}
