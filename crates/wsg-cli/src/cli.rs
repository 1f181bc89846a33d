use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use wsg_types::Handle;

#[derive(Parser)]
#[command(
    name = "wsg",
    about = "Workspace graph: inspect, validate, duplicate and merge record snapshots",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML schema describing the record types
    #[arg(short, long, global = true, default_value = "schema.toml")]
    pub schema: PathBuf,

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

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum Strictness {
    None,
    Draft,
    Final,
}

#[derive(Subcommand)]
pub enum Command {
    /// Summarize a snapshot, or list the records of one type
    Inspect(InspectArgs),
    /// Report schema violations in a snapshot
    Validate(ValidateArgs),
    /// Duplicate records within a snapshot
    Duplicate(DuplicateArgs),
    /// Merge a source snapshot into a destination snapshot
    Merge(MergeArgs),
    /// Propose a handle mapping between two snapshots
    Suggest(SuggestArgs),
}

#[derive(Args)]
pub struct InspectArgs {
    pub snapshot: PathBuf,
    /// Only list records of this type
    #[arg(short = 't', long = "type")]
    pub record_type: Option<String>,
}

#[derive(Args)]
pub struct ValidateArgs {
    pub snapshot: PathBuf,
    /// Also report name conflicts
    #[arg(long)]
    pub names: bool,
    #[arg(long, default_value = "draft")]
    pub strictness: Strictness,
}

#[derive(Args)]
pub struct DuplicateArgs {
    pub snapshot: PathBuf,
    /// Handles of the records to duplicate
    #[arg(long = "handle", required = true)]
    pub handles: Vec<Handle>,
    /// Also duplicate everything the records point to
    #[arg(long)]
    pub transitive: bool,
    /// Write the result here instead of over the input
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

#[derive(Args)]
pub struct MergeArgs {
    pub dest: PathBuf,
    pub src: PathBuf,
    /// A `DEST=SRC` handle pair; repeatable
    #[arg(long = "map", value_parser = parse_pair)]
    pub pairs: Vec<(Handle, Handle)>,
    /// Start from the suggested mapping; explicit pairs override it
    #[arg(long)]
    pub suggest: bool,
    /// Write the result here instead of over the destination
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Plan and report the merge without writing anything
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args)]
pub struct SuggestArgs {
    pub dest: PathBuf,
    pub src: PathBuf,
}

fn parse_pair(s: &str) -> Result<(Handle, Handle), String> {
    let (dest, src) = s
        .split_once('=')
        .ok_or_else(|| format!("expected DEST=SRC, got {s:?}"))?;
    let dest = dest.parse::<Handle>().map_err(|e| e.to_string())?;
    let src = src.parse::<Handle>().map_err(|e| e.to_string())?;
    Ok((dest, src))
}
