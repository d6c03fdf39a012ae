//! # Reclaimer
//!
//! A tool for reclaiming disk space by bulk-deleting clutter and cache directories.
//!
//! The engine enumerates each configured target, removes old entries deepest first on a
//! bounded worker pool, and leaves protected bundles (virtual machine disks, save files)
//! untouched. Directories held by a running process such as a browser are skipped unless
//! force mode is enabled, in which case the process is terminated first.
//!
//! ## Usage
//!
//! ### Command Line
//!
//! ```bash
//! # Delete entries older than 24 hours under the configured targets
//! reclaimer clean
//!
//! # Reclaim a single directory, ignoring file age
//! reclaimer clean --force --target ~/Downloads
//!
//! # Show the effective settings
//! reclaimer config
//! ```
//!
//! ### As a Library
//!
//! ```rust
//! use reclaimer_core::{ExclusionRules, ReclaimConfig, Reclaimer, Target};
//!
//! let temp_dir = tempfile::TempDir::new()?;
//! std::fs::write(temp_dir.path().join("old.log"), "x")?;
//!
//! let config = ReclaimConfig {
//!     targets: vec![Target::new(temp_dir.path())],
//!     rules: ExclusionRules::new([".iso", ".vdi"], ["steam"]),
//!     force: true,
//!     concurrency_limit: 4,
//!     ..Default::default()
//! };
//! let summary = Reclaimer::new(config)?.run();
//! assert_eq!(summary.stats.files_deleted, 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export core functionality
pub use reclaimer_core::*;
