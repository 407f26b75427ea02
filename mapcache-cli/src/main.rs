//! Map Cache CLI
//!
//! Command-line interface for inspecting Blam map cache files.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use mapcache::{
    CacheFile, CacheKind, CacheLoadOptions, IndexItem, Language, LocalFileSystem, PageType,
};
use mapcache::ResourceIdentifier;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

#[derive(Parser)]
#[command(name = "mapcache")]
#[command(about = "Inspect Blam map cache files")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Force a container kind (reach-beta, reach, halo4, mcc-reach)
    #[arg(long, global = true)]
    kind: Option<CacheKind>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the container kind, build, scenario and table sizes
    Info {
        /// Map file
        file: PathBuf,
    },

    /// List tags
    Tags(TagsArgs),

    /// List string ids
    Strings {
        /// Map file
        file: PathBuf,

        /// Stop after N strings
        #[arg(long)]
        limit: Option<usize>,
    },

    /// List localized strings of one language
    Locale {
        /// Map file
        file: PathBuf,

        /// Language name, e.g. english or german
        #[arg(long, default_value = "english")]
        language: Language,

        /// Stop after N strings
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Extract the data of a resource
    Resource(ResourceArgs),
}

#[derive(Args)]
struct TagsArgs {
    /// Map file
    file: PathBuf,

    /// Only list tags whose path matches this glob pattern
    #[arg(long)]
    filter: Option<String>,

    /// Line format: %i id, %c class, %t path, %a metadata address
    #[arg(long, default_value = "%i %c %t")]
    format: String,

    /// Stop after N tags
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct ResourceArgs {
    /// Map file
    file: PathBuf,

    /// Resource identifier (decimal or 0x-prefixed hex)
    #[arg(value_parser = parse_identifier)]
    id: u32,

    /// Page to read (auto, primary, secondary, tertiary)
    #[arg(long, default_value = "auto")]
    mode: PageType,

    /// Output file
    #[arg(short, long)]
    output: PathBuf,
}

fn setup_logging(verbosity: u8) {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(verbosity >= 2)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        Commands::Info { file } => info_command(&file, cli.kind),
        Commands::Tags(args) => tags_command(args, cli.kind),
        Commands::Strings { file, limit } => strings_command(&file, limit, cli.kind),
        Commands::Locale {
            file,
            language,
            limit,
        } => locale_command(&file, language, limit, cli.kind),
        Commands::Resource(args) => resource_command(args, cli.kind),
    }
}

fn open(path: &Path, kind: Option<CacheKind>) -> Result<CacheFile> {
    let mut options = CacheLoadOptions::default();
    options.kind = kind;
    CacheFile::open_with(path, Arc::new(LocalFileSystem), options)
        .with_context(|| format!("Failed to open {}", path.display()))
}

fn parse_identifier(text: &str) -> std::result::Result<u32, String> {
    let parsed = match text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => text.parse(),
    };
    parsed.map_err(|e| format!("invalid resource id '{}': {}", text, e))
}

fn info_command(file: &Path, kind: Option<CacheKind>) -> Result<()> {
    let cache = open(file, kind)?;
    let header = cache.header();

    println!("File:      {}", file.display());
    println!("Kind:      {}", cache.kind());
    println!("Build:     {}", cache.build_string());
    println!("Scenario:  {}", header.scenario_name);
    println!("Size:      {} bytes", header.file_size);
    println!("Classes:   {}", cache.tag_index().classes().len());
    println!("Tags:      {}", cache.tag_index().len());
    println!(
        "Strings:   {} ({} present)",
        cache.string_index().len(),
        cache.string_index().iter().count()
    );
    println!("Codec:     {:?}", cache.codec());

    let header_magic = cache.header_translator().magic()?;
    let metadata_magic = cache.metadata_translator().magic()?;
    println!("Magic:     header {:#x}, metadata {:#x}", header_magic, metadata_magic);

    let system: Vec<String> = mapcache::SYSTEM_CLASSES
        .iter()
        .filter_map(|code| {
            let tag = cache.tag_index().system_tag(*code)?;
            Some(format!("  {} -> {}", code, describe(tag)))
        })
        .collect();
    if !system.is_empty() {
        println!("System tags:");
        for line in system {
            println!("{}", line);
        }
    }

    Ok(())
}

fn describe(tag: &IndexItem) -> String {
    format!("[{}] {}", tag.id(), tag.path().unwrap_or("<unnamed>"))
}

fn format_tag(format: &str, tag: &IndexItem) -> String {
    let mut line = String::with_capacity(format.len() + 32);
    let mut chars = format.chars();
    while let Some(c) = chars.next() {
        if c != '%' {
            line.push(c);
            continue;
        }
        match chars.next() {
            Some('i') => line.push_str(&tag.id().to_string()),
            Some('c') => line.push_str(&tag.class_code().map(|c| c.text()).unwrap_or_default()),
            Some('t') => line.push_str(tag.path().unwrap_or("<unnamed>")),
            Some('a') => match tag.meta_address() {
                Ok(address) => line.push_str(&format!("{:#x}", address)),
                Err(_) => line.push('-'),
            },
            Some('%') => line.push('%'),
            Some(other) => {
                line.push('%');
                line.push(other);
            }
            None => line.push('%'),
        }
    }
    line
}

fn tags_command(args: TagsArgs, kind: Option<CacheKind>) -> Result<()> {
    let cache = open(&args.file, kind)?;
    let pattern = args
        .filter
        .as_deref()
        .map(glob::Pattern::new)
        .transpose()
        .context("Invalid filter pattern")?;

    let tags = cache
        .tag_index()
        .iter()
        .filter(|tag| match &pattern {
            Some(pattern) => tag.path().is_some_and(|path| pattern.matches(path)),
            None => true,
        })
        .take(args.limit.unwrap_or(usize::MAX));

    for tag in tags {
        println!("{}", format_tag(&args.format, tag));
    }
    Ok(())
}

fn strings_command(file: &Path, limit: Option<usize>, kind: Option<CacheKind>) -> Result<()> {
    let cache = open(file, kind)?;
    for (index, text) in cache
        .string_index()
        .iter()
        .take(limit.unwrap_or(usize::MAX))
    {
        println!("{:>6} {}", index, text);
    }
    Ok(())
}

fn locale_command(
    file: &Path,
    language: Language,
    limit: Option<usize>,
    kind: Option<CacheKind>,
) -> Result<()> {
    let cache = open(file, kind)?;
    let locales = cache
        .locale_index()
        .context("Failed to read the locale tables")?;
    let Some(table) = locales.table(language) else {
        bail!("{} has no {} table", file.display(), language);
    };
    for (id, text) in table.iter().take(limit.unwrap_or(usize::MAX)) {
        println!("{:>10} {}", id.to_string(), text);
    }
    Ok(())
}

fn resource_command(args: ResourceArgs, kind: Option<CacheKind>) -> Result<()> {
    let cache = open(&args.file, kind)?;
    let resource = ResourceIdentifier::new(args.id, cache);
    let data = resource
        .read_data(args.mode, usize::MAX)
        .with_context(|| format!("Failed to read resource {:#010x}", args.id))?;
    if data.is_empty() {
        bail!("Resource {:#010x} is empty", args.id);
    }

    std::fs::write(&args.output, &data)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!(
        "✓ Wrote {} bytes of resource {:#010x} to {}",
        data.len(),
        args.id,
        args.output.display()
    );
    Ok(())
}
