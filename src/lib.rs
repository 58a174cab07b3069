// model = "claude-opus-4-5"
// created = "2026-10-19"
// modified = "2026-10-19"
// driver = "Isaac Clayton"

//! Standings - a live customer leaderboard.
//!
//! Customers gain and lose points; the leaderboard keeps every customer with
//! a positive score in one global order (highest score first, ties by lower
//! id) and answers "who holds ranks `start..=end`" and "who surrounds this
//! customer" in logarithmic time while readers run concurrently.
//!
//! # Quick Start
//!
//! ```
//! use standings::leaderboard::Leaderboard;
//! use standings::score::Score;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let board = Leaderboard::default();
//! board.update_score(1, Score::from_int(500)).await?;
//! board.update_score(2, Score::from_int(700)).await?;
//!
//! let top = board.range(1, 2).await?;
//! assert_eq!(top[0].customer_id, 2);
//! assert_eq!(top[1].rank, 2);
//! # Ok::<(), standings::error::LeaderboardError>(())
//! # }).unwrap();
//! ```

pub mod config;
pub mod error;
pub mod leaderboard;
pub mod lock;
pub mod ring;
pub mod score;
pub mod skip_list;
