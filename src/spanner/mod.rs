//! Cloud Spanner snippets
//!
//! Two command sets run against a database named
//! `projects/{p}/instances/{i}/databases/{d}`: the Singers/Albums walkthrough
//! in [`snippets`] and the game [`leaderboard`]. Data commands open a session
//! through [`client::SpannerClient`]; schema commands go through [`admin`].

pub mod admin;
pub mod client;
pub mod leaderboard;
pub mod snippets;
pub mod value;

pub use admin::parse_database_name;
pub use client::{KeySet, SpannerClient, TransactionSelector};
pub use leaderboard::{format_with_commas, LeaderboardCommand};
pub use snippets::SnippetCommand;
pub use value::{Mutation, Row, Statement};
