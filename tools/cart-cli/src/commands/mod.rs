//! CLI command implementations.

pub mod cart;
pub mod config;
pub mod demo;
pub mod search;

use clap::{Args, Subcommand};

/// Arguments for the add command.
#[derive(Args)]
pub struct AddArgs {
    /// Variant id.
    pub variant: u64,

    /// Quantity to add.
    #[arg(short, long, default_value = "1")]
    pub quantity: u32,
}

/// A line given by its key or its 1-based position in the cart.
#[derive(Args)]
pub struct LineArgs {
    /// Line key or position.
    pub line: String,
}

/// Arguments for the set command.
#[derive(Args)]
pub struct SetArgs {
    /// Line key or position.
    pub line: String,

    /// New quantity (at least 1; use `remove` to delete).
    pub quantity: u32,
}

/// Arguments for the remove command.
#[derive(Args)]
pub struct RemoveArgs {
    /// Line key or position.
    pub line: String,

    /// Skip the undo prompt.
    #[arg(short, long)]
    pub yes: bool,
}

/// Arguments for the note command.
#[derive(Args)]
pub struct NoteArgs {
    /// Note text; empty clears the note.
    #[arg(default_value = "")]
    pub text: String,
}

/// Arguments for the discount command.
#[derive(Args)]
pub struct DiscountArgs {
    /// Discount code.
    pub code: String,
}

/// Arguments for the search command.
#[derive(Args)]
pub struct SearchArgs {
    /// Query text.
    pub query: String,
}

/// Arguments for the demo command.
#[derive(Args)]
pub struct DemoArgs {
    /// Pause between steps, in milliseconds.
    #[arg(long, default_value = "400")]
    pub pause_ms: u64,
}

/// Arguments for the config command.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration.
    Show,
    /// Initialize a new config file.
    Init {
        /// Storefront URL.
        #[arg(long, default_value = "http://127.0.0.1:9292")]
        base_url: String,
        /// Force overwrite existing config.
        #[arg(short, long)]
        force: bool,
    },
    /// Validate the config file.
    Validate,
}
