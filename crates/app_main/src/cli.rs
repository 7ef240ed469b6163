//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "shakedraw",
    version,
    about = "Draw a random image from your folders",
    long_about = "Draw a random image from a pool of user-selected folders.\n\n\
                  Images shared from other apps land in the shared container and \
                  take part in draws like any other folder."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Log at debug level and mirror logs to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (default: the platform config directory).
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage the folders images are drawn from.
    #[command(subcommand)]
    Folders(FolderCommand),

    /// Draw random images.
    Draw(DrawArgs),

    /// Show the last drawn image again.
    Restore,

    /// Draw automatically at a fixed interval until interrupted.
    Slideshow(SlideshowArgs),

    /// Read `x y z` accelerometer samples from stdin and draw on every shake.
    Shake,

    /// Manage images in the shared container.
    #[command(subcommand)]
    Inbox(InboxCommand),

    /// Forget the last result and its cached preview.
    Reset,
}

#[derive(Subcommand)]
pub enum FolderCommand {
    /// List folders with their image counts.
    List,

    /// Add folders.
    Add {
        #[arg(value_name = "DIR", required = true)]
        paths: Vec<PathBuf>,
    },

    /// Remove folders by their index in `folders list`.
    Remove {
        #[arg(value_name = "INDEX", required = true)]
        indices: Vec<usize>,
    },

    /// Let a folder take part in draws.
    Include {
        #[arg(value_name = "INDEX")]
        index: usize,
    },

    /// Keep a folder out of draws without removing it.
    Exclude {
        #[arg(value_name = "INDEX")]
        index: usize,
    },

    /// Remove every folder except the shared container.
    Clear,
}

#[derive(Args)]
pub struct DrawArgs {
    /// Number of consecutive draws.
    #[arg(long, short = 'n', default_value_t = 1)]
    pub times: usize,
}

#[derive(Args)]
pub struct SlideshowArgs {
    /// Seconds between draws (default: from the configuration).
    #[arg(long, value_name = "SECONDS")]
    pub interval: Option<f64>,

    /// Stop after this many draws.
    #[arg(long, value_name = "N")]
    pub count: Option<usize>,
}

#[derive(Subcommand)]
pub enum InboxCommand {
    /// Copy image files into the shared container.
    Import {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// List images in the shared container, newest first.
    List,

    /// Delete images from the shared container.
    Delete {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },
}
