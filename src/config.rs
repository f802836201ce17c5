//! Command-line configuration for the `metascan` binary.
//!
//! Every global option can also be set through an environment variable
//! with the `METASCAN_` prefix:
//!
//! - `METASCAN_MAX_ENTRIES` - Largest tag directory accepted (default: 200)
//! - `METASCAN_MAX_DEPTH` - Nesting bound for directories and boxes (default: 64)
//! - `METASCAN_CHECK_MODIFIED` - Reparse when a file's write time changes
//!
//! # Example
//!
//! ```text
//! metascan show IMG_0001.CR3 DSC_0042.NEF
//! metascan show --json cover.flac
//! metascan rotate --right IMG_0001.JPG
//! metascan preview P1000123.RW2 --out preview.jpg
//! ```

use std::path::PathBuf;

use clap::{ArgGroup, Args, Parser, Subcommand};

use crate::cache::CacheOptions;
use crate::engine::ParseOptions;
use crate::format::tiff::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_ENTRIES};
use crate::orientation::Rotation;

// =============================================================================
// CLI Arguments
// =============================================================================

/// metascan - photo and audio metadata straight from container bytes.
#[derive(Parser, Debug, Clone)]
#[command(name = "metascan")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    #[command(subcommand)]
    pub command: Command,

    /// Largest number of entries accepted in one tag directory.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_ENTRIES, env = "METASCAN_MAX_ENTRIES")]
    pub max_entries: u16,

    /// Nesting bound for directories, boxes and embedded files.
    #[arg(long, global = true, default_value_t = DEFAULT_MAX_DEPTH, env = "METASCAN_MAX_DEPTH")]
    pub max_depth: usize,

    /// Reparse a file when its last-write time changes.
    #[arg(long, global = true, default_value_t = false, env = "METASCAN_CHECK_MODIFIED")]
    pub check_modified: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Print the metadata of one or more files.
    Show(ShowArgs),

    /// Rotate a file a quarter turn by rewriting its orientation tag.
    Rotate(RotateArgs),

    /// Copy a file's embedded preview image out.
    Preview(PreviewArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ShowArgs {
    /// Files to read.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Print the whole record as JSON instead of a summary.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
#[command(group(ArgGroup::new("direction").required(true).args(["left", "right"])))]
pub struct RotateArgs {
    /// File to rotate in place.
    pub path: PathBuf,

    /// Rotate counter-clockwise.
    #[arg(long)]
    pub left: bool,

    /// Rotate clockwise.
    #[arg(long)]
    pub right: bool,
}

impl RotateArgs {
    pub fn rotation(&self) -> Rotation {
        if self.left {
            Rotation::Left
        } else {
            Rotation::Right
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct PreviewArgs {
    /// File holding the preview.
    pub path: PathBuf,

    /// Where to write the preview bytes.
    #[arg(short, long)]
    pub out: PathBuf,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_entries == 0 {
            return Err("max_entries must be greater than 0".to_string());
        }
        if self.max_depth == 0 {
            return Err("max_depth must be greater than 0".to_string());
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_directory_entries: self.max_entries,
            max_depth: self.max_depth,
            ..ParseOptions::default()
        }
    }

    pub fn cache_options(&self) -> CacheOptions {
        CacheOptions {
            check_modified: self.check_modified,
            ..CacheOptions::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
