//! # tenantkv
//!
//! Many named logical databases over one embedded key-value engine, with:
//! - One engine namespace per logical database
//! - Per-scope reference counting on every database
//! - Deletion refused while any scope holds a reference
//! - Usage reports by database and by scope
//! - Non-transactional JSON bulk loads
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       KvdbManager                            │
//! │     create / delete / exists / list / get_handler / load     │
//! └──────────────┬──────────────────────────────┬───────────────┘
//!                │                              │
//!                ▼                              ▼
//!   ┌────────────────────────┐     ┌────────────────────────────┐
//!   │   Database Registry    │     │     Handler Collection     │
//!   │ name → namespace handle│     │ db → (scope → count)       │
//!   │ (lock per database)    │     │ transposed on demand       │
//!   └───────────┬────────────┘     └──────────────▲─────────────┘
//!               │                                 │ release on drop
//!               ▼                                 │
//!   ┌────────────────────────┐     ┌──────────────┴─────────────┐
//!   │     StorageEngine      │◄────│        KvdbHandler         │
//!   │  (sled / in-memory)    │     │   one scope, one database  │
//!   └────────────────────────┘     └────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use tenantkv::{Config, KvdbManager};
//!
//! # fn main() -> tenantkv::Result<()> {
//! let manager = KvdbManager::new(Config::builder().storage_path("/tmp/kvdb").build());
//! manager.initialize()?;
//!
//! manager.create_db("alerts")?;
//! let handler = manager.get_handler("alerts", "indexer")?;
//! handler.set("rule", "\"enabled\"")?;
//!
//! // Refused: "indexer" still holds a reference
//! assert!(manager.delete_db("alerts").is_err());
//!
//! handler.release();
//! manager.delete_db("alerts")?;
//! # Ok(())
//! # }
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod engine;
pub mod handler;
mod registry;
pub mod manager;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{KvdbError, Result};
pub use config::Config;
pub use engine::{MemoryEngine, SledEngine, SledOptions, StorageEngine};
pub use handler::{HandlerCollection, KvdbHandler, RefInfo};
pub use manager::{KvdbManager, UsageReport};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of tenantkv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
