pub mod board;
pub mod cli;
pub mod config;
pub mod filter;
pub mod identity;
pub mod logging;
pub mod models;
pub mod ordering;
pub mod stats;
pub mod store;
pub mod timer;
pub mod transfer;
pub mod tui;
pub mod utils;

pub use board::{Board, BoardError};
pub use config::Config;
pub use identity::{Identity, LocalIdentity, User};
pub use models::{NewTask, Priority, SubTask, Task};
pub use store::{MemoryStore, SqliteStore, TaskStore};
pub use timer::{Clock, SystemClock, Timer};
pub use utils::Profile;
