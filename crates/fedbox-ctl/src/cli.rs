use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "fedboxctl", about = "FedBOX storage administration", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file with [storage] and [cache] tables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create the instance actor and root collections
    Bootstrap,
    /// Show an item or a page of a collection
    Load(LoadArgs),
    /// Store a JSON document, assigning an IRI if it has none
    Save(SaveArgs),
    /// Replace an item with a Tombstone
    Delete(IriArgs),
    /// Add an item to a collection
    Add(AddArgs),
    /// Remove an item from a collection
    Remove(RemoveArgs),
    /// Add items, or every member of collections, to a collection
    Copy(TransferArgs),
    /// Like copy, deleting each original afterwards
    Move(TransferArgs),
    /// Set or check an actor's password
    Pass(PassArgs),
}

#[derive(Args, Debug)]
pub struct LoadArgs {
    /// IRI to load; query parameters (type, name, page, maxItems, ...) filter collections
    pub iri: String,
}

#[derive(Args, Debug)]
pub struct SaveArgs {
    /// JSON file to read, or `-` for stdin
    #[arg(default_value = "-")]
    pub file: String,
}

#[derive(Args, Debug)]
pub struct IriArgs {
    pub iri: String,
}

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Destination collection IRI
    #[arg(long)]
    pub to: String,
    pub iri: String,
}

#[derive(Args, Debug)]
pub struct RemoveArgs {
    /// Collection IRI
    #[arg(long)]
    pub from: String,
    pub iri: String,
}

#[derive(Args, Debug)]
pub struct TransferArgs {
    /// Destination collection IRI
    #[arg(long)]
    pub to: String,
    #[arg(required = true)]
    pub sources: Vec<String>,
}

#[derive(Args, Debug)]
pub struct PassArgs {
    #[command(subcommand)]
    pub action: PassAction,
}

#[derive(Subcommand, Debug)]
pub enum PassAction {
    /// Hash and store a new password
    Set { iri: String, password: String },
    /// Verify a password against the stored hash
    Check { iri: String, password: String },
}
