//! idmlkit - IDML package tool

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use idmlkit::Package;

#[derive(Parser)]
#[command(name = "idmlkit")]
#[command(version, about = "Read, prefix, merge and re-tag IDML packages", long_about = None)]
#[command(after_help = "EXAMPLES:
    idmlkit prefix article.idml ART1
    idmlkit insert magazine.idml article.idml --at '/Root/article[3]' --only '/Root/module[1]'
    idmlkit export-xml magazine.idml > content.xml
    idmlkit info --json magazine.idml")]
struct Cli {
    /// Log what each operation does
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pack an extracted package directory into a new archive
    Create {
        dir: PathBuf,
        /// Must not exist yet
        output: PathBuf,
    },
    /// Prefix every id of a package
    Prefix { package: PathBuf, token: String },
    /// Splice a structure branch of another package into this one
    Insert {
        package: PathBuf,
        source: PathBuf,
        /// Destination node, e.g. /Root/article[3]
        #[arg(long)]
        at: String,
        /// Source branch, e.g. /Root/module[1]
        #[arg(long)]
        only: String,
        /// Merge even when ids or stories already exist
        #[arg(long)]
        allow_collisions: bool,
    },
    /// Copy a page of another package and splice a branch with it
    AddPage {
        package: PathBuf,
        source: PathBuf,
        /// 1-based page number in the source
        #[arg(long)]
        page: usize,
        #[arg(long)]
        at: String,
        #[arg(long)]
        only: String,
    },
    /// Print the text content as XML
    ExportXml { package: PathBuf },
    /// Map an XML file onto the structure
    ImportXml {
        package: PathBuf,
        xml: PathBuf,
        #[arg(long, default_value = "/Root")]
        at: String,
    },
    /// Show package contents
    Info {
        package: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(command: Command) -> idmlkit::Result<()> {
    match command {
        Command::Create { dir, output } => {
            let package = Package::create_from_dir(&dir, &output)?;
            println!("created {} ({} members)", output.display(), package.archive().len());
        }
        Command::Prefix { package, token } => {
            Package::open(&package)?.prefix(&token)?;
        }
        Command::Insert {
            package,
            source,
            at,
            only,
            allow_collisions,
        } => {
            let mut dest = Package::open(&package)?;
            let src = Package::open(&source)?;
            let options = idmlkit::MergeOptions {
                check_collisions: !allow_collisions,
            };
            dest.insert_with(&src, &at, &only, &options)?;
        }
        Command::AddPage {
            package,
            source,
            page,
            at,
            only,
        } => {
            let mut dest = Package::open(&package)?;
            let src = Package::open(&source)?;
            dest.add_page_from_idml(&src, page, &at, &only)?;
        }
        Command::ExportXml { package } => {
            print!("{}", Package::open(&package)?.export_xml()?);
        }
        Command::ImportXml { package, xml, at } => {
            let xml = fs::read_to_string(&xml)?;
            Package::open(&package)?.import_xml(&xml, &at)?;
        }
        Command::Info { package, json } => show_info(&package, json)?,
    }
    Ok(())
}

#[derive(Serialize)]
struct Info {
    path: String,
    spreads: Vec<String>,
    stories: Vec<String>,
    tags: Vec<String>,
    font_families: Vec<String>,
    style_groups: Vec<String>,
    pages: usize,
    structure: String,
}

fn show_info(path: &Path, json: bool) -> idmlkit::Result<()> {
    let package = Package::open(path)?;
    let info = Info {
        path: path.display().to_string(),
        spreads: package.spreads(),
        stories: package.stories(),
        tags: package.tags().unwrap_or_default(),
        font_families: package.font_families().unwrap_or_default(),
        style_groups: package.style_groups().unwrap_or_default(),
        pages: package.pages()?.len(),
        structure: package.xml_structure()?,
    };

    if json {
        let out = serde_json::to_string_pretty(&info).map_err(std::io::Error::other)?;
        println!("{out}");
        return Ok(());
    }

    println!("File: {}", info.path);
    println!("Spreads: {}", info.spreads.len());
    println!("Pages: {}", info.pages);
    println!("Stories: {}", info.stories.len());
    if !info.tags.is_empty() {
        println!("Tags: {}", info.tags.join(", "));
    }
    if !info.font_families.is_empty() {
        println!("Font families: {}", info.font_families.join(", "));
    }
    if !info.style_groups.is_empty() {
        println!("Style groups: {}", info.style_groups.join(", "));
    }
    println!("Structure:\n{}", info.structure);
    Ok(())
}
