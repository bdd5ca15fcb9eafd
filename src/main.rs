use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use sitefeed::config::Config;
use sitefeed::feed::{extract_all, ExtractOptions, Extractor, FeedResult};
use sitefeed::rules::SourceRules;
use sitefeed::storage::{Database, DatabaseError};
use sitefeed::util::{publish_path, write_atomically};

/// Get the config directory path (~/.config/sitefeed/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("sitefeed"))
}

#[derive(Parser, Debug)]
#[command(name = "sitefeed", version, about = "Turn any website into an RSS feed")]
struct Cli {
    /// Config file (default: ~/.config/sitefeed/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract one website and print its RSS document
    Extract {
        url: String,
        /// Write the document to FILE instead of stdout
        #[arg(long, value_name = "FILE")]
        out: Option<PathBuf>,
        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Extract every configured source into its publish path
    Batch,
    /// Manage per-source rules
    #[command(subcommand)]
    Rules(RulesCommand),
}

#[derive(Subcommand, Debug)]
enum RulesCommand {
    /// Show the rules stored for a source
    Show { url: String },
    /// Replace the rules stored for a source
    Set {
        url: String,
        #[command(flatten)]
        rules: RuleArgs,
    },
    /// Delete the rules stored for a source
    Clear { url: String },
    /// List every source with stored rules
    List,
}

#[derive(Args, Debug)]
struct RuleArgs {
    /// Substring every title must contain (repeatable)
    #[arg(long = "title-include", value_name = "TEXT")]
    title_includes: Vec<String>,
    /// Substring no title may contain (repeatable)
    #[arg(long = "title-exclude", value_name = "TEXT")]
    title_excludes: Vec<String>,
    /// Substring every URL must contain (repeatable)
    #[arg(long = "url-include", value_name = "TEXT")]
    url_includes: Vec<String>,
    /// Substring no URL may contain (repeatable)
    #[arg(long = "url-exclude", value_name = "TEXT")]
    url_excludes: Vec<String>,
    /// Drop articles without a description
    #[arg(long)]
    require_description: bool,
    /// Drop articles without a publish date
    #[arg(long)]
    require_published: bool,
    /// Always skip the first N articles
    #[arg(long, value_name = "N", default_value_t = 0)]
    skip_top: usize,
}

impl From<RuleArgs> for SourceRules {
    fn from(args: RuleArgs) -> Self {
        SourceRules {
            title_includes: args.title_includes,
            title_excludes: args.title_excludes,
            url_includes: args.url_includes,
            url_excludes: args.url_excludes,
            require_description: args.require_description,
            require_published_at: args.require_published,
            skip_top_count: args.skip_top,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config_dir = get_config_dir()?;
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }
    let db = open_database(&config_dir.join("rules.db")).await?;

    match cli.command {
        Command::Extract { url, out, json } => {
            run_extract(&config, &db, &url, out.as_deref(), json).await
        }
        Command::Batch => run_batch(&config, &db).await,
        Command::Rules(cmd) => run_rules(&db, cmd).await,
    }
}

async fn open_database(path: &Path) -> Result<Database> {
    let path_str = path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    match Database::open(path_str).await {
        Ok(db) => Ok(db),
        Err(DatabaseError::InstanceLocked) => {
            eprintln!("Error: {}", DatabaseError::InstanceLocked);
            std::process::exit(1);
        }
        Err(e) => Err(anyhow::anyhow!("Failed to open database: {}", e)),
    }
}

async fn run_extract(
    config: &Config,
    db: &Database,
    url: &str,
    out: Option<&Path>,
    json: bool,
) -> Result<()> {
    let extractor = Extractor::new(config.extract_config())?;
    let result = extractor
        .extract_feed_with_store(url, ExtractOptions::default(), db)
        .await?;

    eprintln!("{}", summary_line(&result));

    let output = if json {
        serde_json::to_string_pretty(&result)?
    } else {
        result.xml
    };

    match out {
        Some(path) => {
            write_atomically(path, output.as_bytes())?;
            eprintln!("Wrote {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(output.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }
    Ok(())
}

async fn run_batch(config: &Config, db: &Database) -> Result<()> {
    if config.sources.is_empty() {
        eprintln!("No sources configured. Add `sources = [\"https://...\"]` to config.toml.");
        return Ok(());
    }

    let extractor = Extractor::new(config.extract_config())?;
    let report = extract_all(&extractor, &config.sources, db, config.concurrency).await;

    let mut written = 0usize;
    for (source_url, result) in report.succeeded() {
        let path = config.output_dir.join(publish_path(source_url));
        match write_atomically(&path, result.xml.as_bytes()) {
            Ok(()) => {
                written += 1;
                println!("ok    {source_url} -> {} ({})", path.display(), summary_line(result));
            }
            Err(e) => {
                tracing::warn!(source = %source_url, error = %e, "Failed to write feed document");
                println!("error {source_url}: {e:#}");
            }
        }
    }
    for (source_url, error) in report.failed() {
        println!("error {source_url}: {error}");
    }

    println!(
        "{} of {} sources extracted, {} documents written",
        report.success_count(),
        report.outcomes.len(),
        written
    );

    if report.all_failed() {
        anyhow::bail!("Every source failed");
    }
    Ok(())
}

async fn run_rules(db: &Database, cmd: RulesCommand) -> Result<()> {
    match cmd {
        RulesCommand::Show { url } => match db.get_rules(&url).await? {
            Some(rules) => println!("{}", serde_json::to_string_pretty(&rules)?),
            None => println!("No rules stored for {url}"),
        },
        RulesCommand::Set { url, rules } => {
            let stored = db.set_rules(&url, &rules.into()).await?;
            if stored.is_active() {
                println!("{}", stored.to_compact_json()?);
            } else {
                println!("No active rules; cleared {url}");
            }
        }
        RulesCommand::Clear { url } => {
            if db.delete_rules(&url).await? {
                println!("Cleared rules for {url}");
            } else {
                println!("No rules stored for {url}");
            }
        }
        RulesCommand::List => {
            let all = db.list_rules().await?;
            if all.is_empty() {
                println!("No rules stored");
            }
            for entry in all {
                println!(
                    "{}\t{}\t{}",
                    entry.source_url,
                    entry.updated_at,
                    entry.rules.to_compact_json()?
                );
            }
        }
    }
    Ok(())
}

fn summary_line(result: &FeedResult) -> String {
    format!(
        "{}: {} of {} articles via {}, {} filtered",
        result.title,
        result.articles.len(),
        result.original_article_count,
        result.method,
        result.filtered_out_count
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_rule_flags() {
        let cli = Cli::try_parse_from([
            "sitefeed",
            "rules",
            "set",
            "https://example.com/",
            "--title-exclude",
            "sponsored",
            "--title-exclude",
            "ad",
            "--skip-top",
            "2",
            "--require-published",
        ])
        .unwrap();

        let Command::Rules(RulesCommand::Set { url, rules }) = cli.command else {
            panic!("expected rules set");
        };
        assert_eq!(url, "https://example.com/");
        let rules: SourceRules = rules.into();
        assert_eq!(rules.title_excludes, vec!["sponsored", "ad"]);
        assert_eq!(rules.skip_top_count, 2);
        assert!(rules.require_published_at);
        assert!(!rules.require_description);
    }

    #[test]
    fn test_cli_extract_flags() {
        let cli =
            Cli::try_parse_from(["sitefeed", "extract", "https://example.com/", "--json"]).unwrap();
        assert!(matches!(cli.command, Command::Extract { json: true, out: None, .. }));
    }

    #[test]
    fn test_cli_verifies() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
