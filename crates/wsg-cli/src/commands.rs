use std::collections::BTreeMap;
use std::path::Path;

use anyhow::bail;
use colored::Colorize;
use serde::Serialize;
use wsg_merge::{merge, suggest_mapping, MergeReport};
use wsg_store::RecordStore;
use wsg_types::{Handle, HandleMap, RecordType};
use wsg_validity::{validate, StrictnessLevel, ValidityOptions, ValidityReport};

use crate::cli::*;
use crate::workspace::{load_schema, load_store, save_store};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let format = cli.format;
    let schema = cli.schema.as_path();
    match cli.command {
        Command::Inspect(args) => cmd_inspect(schema, format, args),
        Command::Validate(args) => cmd_validate(schema, format, args).map(|_| ()),
        Command::Duplicate(args) => cmd_duplicate(schema, format, args).map(|_| ()),
        Command::Merge(args) => cmd_merge(schema, format, args).map(|_| ()),
        Command::Suggest(args) => cmd_suggest(schema, format, args).map(|_| ()),
    }
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn label(store: &RecordStore, handle: &Handle) -> String {
    match store.name(handle) {
        Some(name) => format!("{} {}", handle.short_id().dimmed(), name),
        None => handle.short_id().dimmed().to_string(),
    }
}

#[derive(Serialize)]
struct Inventory {
    records: usize,
    pointers: usize,
    types: BTreeMap<String, usize>,
}

#[derive(Serialize)]
struct Listing {
    handle: Handle,
    name: Option<String>,
    fields: usize,
    referrers: usize,
}

fn cmd_inspect(schema: &Path, format: OutputFormat, args: InspectArgs) -> anyhow::Result<()> {
    let schema = load_schema(schema)?;
    let store = load_store(&schema, &args.snapshot)?;

    if let Some(ty) = args.record_type {
        let ty = RecordType::new(ty)?;
        let listing: Vec<Listing> = store
            .records_of_type(&ty)
            .map(|r| Listing {
                handle: r.handle(),
                name: store.name(&r.handle()),
                fields: r.field_count(),
                referrers: store.sources(&r.handle()).len(),
            })
            .collect();
        if format == OutputFormat::Json {
            return print_json(&listing);
        }
        println!("{} {} records", listing.len().to_string().bold(), ty.to_string().cyan());
        for item in &listing {
            println!(
                "  {}  {} fields, {} referrers",
                label(&store, &item.handle),
                item.fields,
                item.referrers
            );
        }
        return Ok(());
    }

    let mut types = BTreeMap::new();
    let mut pointers = 0;
    for record in store.records() {
        *types.entry(record.record_type().to_string()).or_insert(0) += 1;
        pointers += record.forward_pointers().count();
    }
    let inventory = Inventory {
        records: store.len(),
        pointers,
        types,
    };
    if format == OutputFormat::Json {
        return print_json(&inventory);
    }
    println!(
        "{} records, {} pointers",
        inventory.records.to_string().bold(),
        inventory.pointers.to_string().bold()
    );
    for (ty, count) in &inventory.types {
        println!("  {:>6}  {}", count, ty.cyan());
    }
    Ok(())
}

fn cmd_validate(schema: &Path, format: OutputFormat, args: ValidateArgs) -> anyhow::Result<ValidityReport> {
    let schema = load_schema(schema)?;
    let store = load_store(&schema, &args.snapshot)?;
    let strictness = match args.strictness {
        Strictness::None => StrictnessLevel::None,
        Strictness::Draft => StrictnessLevel::Draft,
        Strictness::Final => StrictnessLevel::Final,
    };
    let report = validate(&store, &ValidityOptions::new(args.names).with_strictness(strictness));

    if format == OutputFormat::Json {
        print_json(&report)?;
    } else {
        for violation in &report.violations {
            println!("  {} {}", "✗".red(), violation);
        }
        if report.is_valid() {
            println!("{} {} records valid", "✓".green().bold(), report.record_count);
        }
    }
    if !report.is_valid() {
        bail!("{} violations in {}", report.violations.len(), args.snapshot.display());
    }
    Ok(report)
}

fn cmd_duplicate(schema: &Path, format: OutputFormat, args: DuplicateArgs) -> anyhow::Result<HandleMap> {
    let schema = load_schema(schema)?;
    let mut store = load_store(&schema, &args.snapshot)?;
    for handle in &args.handles {
        if !store.contains(handle) {
            bail!("no record {handle} in {}", args.snapshot.display());
        }
    }

    let map = wsg_clone::duplicate(&mut store, args.handles.iter().copied(), args.transitive)?;
    let output = args.output.as_deref().unwrap_or(&args.snapshot);
    save_store(&store, output)?;

    if format == OutputFormat::Json {
        print_json(&map)?;
    } else {
        println!("{} Duplicated {} records into {}", "✓".green().bold(), map.len(), output.display());
        for (old, new) in &map {
            println!("  {} → {}", label(&store, old), new.short_id().yellow());
        }
    }
    Ok(map)
}

fn cmd_merge(schema: &Path, format: OutputFormat, args: MergeArgs) -> anyhow::Result<MergeReport> {
    let schema = load_schema(schema)?;
    let mut dest = load_store(&schema, &args.dest)?;
    let src = load_store(&schema, &args.src)?;

    let mut mapping = if args.suggest {
        suggest_mapping(&dest, &src)
    } else {
        HandleMap::new()
    };
    for (d, s) in &args.pairs {
        mapping.retain(|_, existing| existing != s);
        mapping.insert(*d, *s);
    }

    let report = merge(&mut dest, &src, &mapping)?;
    if !args.dry_run {
        save_store(&dest, args.output.as_deref().unwrap_or(&args.dest))?;
    }

    if format == OutputFormat::Json {
        print_json(&report)?;
    } else {
        let verb = if args.dry_run { "Would merge" } else { "Merged" };
        println!("{} {}: {}", "✓".green().bold(), verb, report);
        for h in &report.added {
            println!("  {} {}", "+".green(), label(&dest, h));
        }
        for h in &report.updated {
            println!("  {} {}", "~".yellow(), label(&dest, h));
        }
        for h in &report.removed {
            println!("  {} {}", "-".red(), h.short_id().dimmed());
        }
    }
    Ok(report)
}

fn cmd_suggest(schema: &Path, format: OutputFormat, args: SuggestArgs) -> anyhow::Result<HandleMap> {
    let schema = load_schema(schema)?;
    let dest = load_store(&schema, &args.dest)?;
    let src = load_store(&schema, &args.src)?;
    let mapping = suggest_mapping(&dest, &src);

    if format == OutputFormat::Json {
        print_json(&mapping)?;
    } else {
        println!("{} of {} records matched", mapping.len().to_string().bold(), dest.len());
        for (d, s) in &mapping {
            println!("  {} = {}", label(&dest, d), label(&src, s));
        }
    }
    Ok(mapping)
}
