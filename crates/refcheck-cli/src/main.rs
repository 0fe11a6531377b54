use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use refcheck_core::{CollaboratorSet, classify_all, config_file};
use refcheck_ingest::{Checker, DocumentFormat};
use refcheck_online::{Crossref, HttpLinkVerifier, WebPageProvider};
use refcheck_parsing::ParsingConfig;
use refcheck_registry::PredatoryRegistry;
use refcheck_reporting::{ExportFormat, ReferenceStyle, export_report, write_updated_docx};

mod output;
mod settings;

use output::ColorMode;
use settings::{Overrides, Settings};

/// Citation and reference-list checker for academic manuscripts
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Check citations and the reference list of a manuscript
    Check(CheckArgs),

    /// Print the resolved configuration as TOML
    Config {
        /// Also write it to the user config file
        #[arg(long)]
        save: bool,
    },
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Manuscript to check (.txt, .md or .docx)
    file_path: PathBuf,

    /// Separate file holding the reference list
    #[arg(long)]
    references: Option<PathBuf>,

    /// Completeness profile: strict or lenient
    #[arg(long)]
    profile: Option<String>,

    /// Fill missing fields from Crossref
    #[arg(long)]
    crossref: bool,

    /// Fill missing fields from citation_* meta tags of each entry's URL
    #[arg(long)]
    web_metadata: bool,

    /// Compare entries against Crossref records
    #[arg(long)]
    verify_online: bool,

    /// Check that DOIs and URLs resolve
    #[arg(long)]
    check_links: bool,

    /// CSV of predatory journals and publishers
    #[arg(long)]
    registry: Option<PathBuf>,

    /// Contact address sent to Crossref
    #[arg(long)]
    mailto: Option<String>,

    /// Comma-separated rule families to disable
    #[arg(long, value_delimiter = ',')]
    disable: Vec<String>,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Write the (enriched) reference list as BibTeX
    #[arg(long)]
    bibtex: Option<PathBuf>,

    /// Write the (enriched) reference list as RIS
    #[arg(long)]
    ris: Option<PathBuf>,

    /// Write the (enriched) reference list in EndNote tagged format
    #[arg(long)]
    endnote: Option<PathBuf>,

    /// Write the manuscript as .docx with its reference list rebuilt from
    /// the (enriched) entries
    #[arg(long)]
    updated_docx: Option<PathBuf>,

    /// Style of the rebuilt list: apa, vancouver, ieee, harvard or chicago
    #[arg(long, default_value = "apa")]
    style: ReferenceStyle,

    /// Write a plain-text report here instead of printing to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Parse and list the reference entries without checking
    #[arg(long)]
    dry_run: bool,
}

impl CheckArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            profile: self.profile.clone(),
            disable: self.disable.clone(),
            mailto: self.mailto.clone(),
            registry: self.registry.clone(),
            web_metadata: self.web_metadata,
        }
    }

    fn exports(&self) -> Vec<(ExportFormat, &Path)> {
        [
            (ExportFormat::Json, &self.json),
            (ExportFormat::Bibtex, &self.bibtex),
            (ExportFormat::Ris, &self.ris),
            (ExportFormat::EndNote, &self.endnote),
        ]
        .into_iter()
        .filter_map(|(format, path)| path.as_deref().map(|p| (format, p)))
        .collect()
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Check(args) => check(args).await,
        Command::Config { save } => show_config(save).map(|()| false),
    };

    match result {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(2)
        }
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn show_config(save: bool) -> anyhow::Result<()> {
    let file = config_file::load_config();
    let settings = Settings::resolve(&file, &Overrides::default(), env_var)?;
    let resolved = settings.to_config_file();
    let rendered =
        toml::to_string_pretty(&resolved).context("failed to render configuration")?;
    print!("{}", rendered);
    if save {
        let path = config_file::save_config(&resolved).map_err(anyhow::Error::msg)?;
        eprintln!("Saved configuration to {}", path.display());
    }
    Ok(())
}

fn build_collaborators(args: &CheckArgs, settings: &Settings) -> anyhow::Result<CollaboratorSet> {
    let mut set = CollaboratorSet {
        concurrency: settings.concurrency,
        timeout: settings.timeout,
        ..Default::default()
    };
    let wants_http =
        args.crossref || args.verify_online || args.check_links || settings.web_metadata;
    if wants_http {
        let client = refcheck_online::build_client(settings.timeout, settings.mailto.as_deref())
            .context("failed to build HTTP client")?;
        if args.crossref || args.verify_online {
            let crossref = Arc::new(
                Crossref::new(client.clone(), settings.mailto.clone())
                    .with_timeout(settings.timeout),
            );
            if args.crossref {
                set.providers.push(crossref.clone());
            }
            if args.verify_online {
                set.verifier = Some(crossref);
            }
        }
        if settings.web_metadata {
            set.providers
                .push(Arc::new(WebPageProvider::new(client.clone()).with_timeout(settings.timeout)));
        }
        if args.check_links {
            set.link_verifier =
                Some(Arc::new(HttpLinkVerifier::new(client).with_timeout(settings.timeout)));
        }
    }
    if let Some(path) = &settings.registry {
        let registry = PredatoryRegistry::load(path)
            .with_context(|| format!("failed to load registry {}", path.display()))?;
        tracing::info!(records = registry.len(), path = %path.display(), "registry loaded");
        set.registry = Some(Arc::new(registry));
    }
    tracing::debug!(?set, "collaborators");
    Ok(set)
}

/// Run a check. Returns whether any error-severity issue was found.
async fn check(args: CheckArgs) -> anyhow::Result<bool> {
    let file = config_file::load_config();
    let settings = Settings::resolve(&file, &args.overrides(), env_var)?;

    if !args.file_path.exists() {
        anyhow::bail!("File not found: {}", args.file_path.display());
    }

    let color = ColorMode(!args.no_color && args.output.is_none());
    let mut writer: Box<dyn Write> = if let Some(ref output_path) = args.output {
        Box::new(
            std::fs::File::create(output_path)
                .with_context(|| format!("failed to create {}", output_path.display()))?,
        )
    } else {
        Box::new(std::io::stdout())
    };

    let collaborators = if args.dry_run {
        CollaboratorSet::default()
    } else {
        build_collaborators(&args, &settings)?
    };
    let checker = Checker::new(ParsingConfig::default(), settings.validation.clone())
        .with_collaborators(collaborators);

    let doc = checker
        .load(&args.file_path, args.references.as_deref())
        .with_context(|| format!("failed to read {}", args.file_path.display()))?;

    let file_name = args
        .file_path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| args.file_path.display().to_string());

    if args.dry_run {
        let mut parsed = checker.parse(&doc)?;
        classify_all(&mut parsed.entries);
        output::print_parse_summary(
            &mut writer,
            &file_name,
            parsed.markers.len(),
            parsed.entries.len(),
            color,
        )?;
        output::print_entries(&mut writer, &parsed.entries, color)?;
        return Ok(false);
    }

    let outcome = checker.check(&doc).await?;
    let report = &outcome.report;

    output::print_parse_summary(
        &mut writer,
        &file_name,
        report.citations.len(),
        report.entries.len(),
        color,
    )?;
    output::print_issues(&mut writer, report, color)?;
    output::print_filled(&mut writer, &outcome.filled, color)?;
    output::print_summary(&mut writer, report, color)?;
    writer.flush()?;

    for (format, path) in args.exports() {
        export_report(report, &outcome.filled, format, path)
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("failed to write {} export", format))?;
        eprintln!("Wrote {} to {}", format, path.display());
    }

    if let Some(path) = &args.updated_docx {
        let source = match DocumentFormat::from_path(&args.file_path)? {
            DocumentFormat::Docx => Some(
                std::fs::read(&args.file_path)
                    .with_context(|| format!("failed to read {}", args.file_path.display()))?,
            ),
            DocumentFormat::Text | DocumentFormat::Markdown => None,
        };
        write_updated_docx(path, source.as_deref(), &doc.body, report, args.style)
            .map_err(anyhow::Error::msg)
            .context("failed to write updated document")?;
        eprintln!("Wrote updated document to {}", path.display());
    }

    Ok(report.has_errors())
}
