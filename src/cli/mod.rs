//! CLI command implementations.
//!
//! Each submodule implements one command. Commands take the store handle
//! constructed once in `main` and write their output to a caller-supplied
//! writer.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `watch` | Capture clipboard changes until interrupted |
//! | `search` | Full-text search with substring fallback |
//! | `get` | Print one clip as JSON |
//! | `delete` | Delete clips by id |
//! | `wipe` | Delete all history |
//! | `restore` | Pipe a clip back into `wl-copy` |
//!
//! # Example Usage
//!
//! ```bash
//! # Run the daemon
//! stashd watch
//!
//! # Search history
//! stashd search release notes -n 10 -f json-stream
//!
//! # Custom line format
//! stashd search -f '{{.ID}}: {{fallback .Text .BlobPath | simplify}}'
//!
//! # Put an old clip back on the clipboard
//! stashd restore 42
//! ```

pub mod delete;
pub mod get;
mod output;
pub mod restore;
pub mod search;
mod template;
pub mod watch;
pub mod wipe;

pub use output::{
    OutputFormat, write_clips, write_json, write_json_stream, write_simple, write_template,
};
pub use template::ClipTemplate;
