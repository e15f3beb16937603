mod config;
mod coursera;
mod error;
mod fetch;
mod ollama;
mod oreilly;
mod parser;
mod pdf_search;
mod poll;
mod selection;
mod sink;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};

use crate::config::Rules;
use crate::oreilly::{LearningItem, OutputFormat};

#[derive(Parser)]
#[command(name = "catalog_scraper", about = "Course, model and book catalog scrapers")]
struct Cli {
    /// JSON file overriding the built-in keyword and fetch tables
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Per-request timeout in seconds for Coursera and O'Reilly fetches
    #[arg(long, global = true)]
    timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the Coursera search URL for the configured partners
    CourseraUrl,
    /// Extract GenAI courses from a Coursera search page into CSV
    Coursera {
        /// Saved, rendered search page (default: fetch the search URL)
        #[arg(long)]
        html: Option<PathBuf>,
        /// Courses picked in earlier runs
        #[arg(long, default_value = "selected.json")]
        selected: PathBuf,
        #[arg(short, long, default_value = "coursera_courses.csv")]
        output: PathBuf,
    },
    /// Scrape the Ollama library into models_data.json
    Ollama {
        #[arg(long, env = "CATALOG_CACHE_DIR", default_value = ollama::DEFAULT_CACHE_DIR)]
        cache_dir: PathBuf,
        #[arg(short, long, default_value = "models_data.json")]
        output: PathBuf,
        /// Max models to scrape (default: all found)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },
    /// Convert models_data.json into models.csv
    OllamaCsv {
        #[arg(short, long, default_value = "models_data.json")]
        input: PathBuf,
        #[arg(short, long, default_value = "models.csv")]
        output: PathBuf,
    },
    /// Parse an O'Reilly Learning search page (URL or local file)
    Oreilly {
        /// Local HTML file or an http(s):// URL
        source: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        /// Write json/csv output here instead of stdout
        #[arg(long)]
        outfile: Option<PathBuf>,
    },
    /// Find PDFs under a folder that contain a sentence
    PdfSearch {
        folder: PathBuf,
        sentence: String,
        #[arg(short, long, default_value_t = pdf_search::DEFAULT_WORKERS)]
        workers: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut rules = Rules::load(cli.rules.as_deref())?;
    if let Some(secs) = cli.timeout {
        rules.fetch.timeout_secs = secs;
    }

    let result = match cli.command {
        Commands::CourseraUrl => {
            println!("{}", coursera::search_url(&rules.coursera));
            Ok(())
        }
        Commands::Coursera {
            html,
            selected,
            output,
        } => {
            let run = coursera::CourseraRun {
                html: html.as_deref(),
                selected: &selected,
                output: &output,
            };
            let n = coursera::run(run, &rules.fetch, &rules.coursera).await?;
            if n > 0 {
                println!("Saved {} courses to {}", n, output.display());
            }
            Ok(())
        }
        Commands::Ollama {
            cache_dir,
            output,
            limit,
        } => {
            let run = ollama::OllamaRun {
                cache_dir: &cache_dir,
                output: &output,
                limit,
            };
            ollama::run(run, &rules.fetch, &rules.ollama).await?;
            Ok(())
        }
        Commands::OllamaCsv { input, output } => {
            ollama::export::run(&input, &output, &rules.ollama)?;
            Ok(())
        }
        Commands::Oreilly {
            source,
            format,
            outfile,
        } => {
            let run = oreilly::OreillyRun {
                source: &source,
                format,
                outfile: outfile.as_deref(),
            };
            let items = oreilly::run(run, &rules.fetch).await?;
            if format == OutputFormat::Text {
                print_items(&items);
            }
            Ok(())
        }
        Commands::PdfSearch {
            folder,
            sentence,
            workers,
        } => {
            let hits = pdf_search::run(&folder, &sentence, workers)?;
            for path in &hits {
                println!("  {}", path.display());
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn print_items(items: &[LearningItem]) {
    if items.is_empty() {
        println!("No results found.");
        return;
    }

    println!(
        "{:>3} | {:<48} | {:<12} | {:<16} | {:<14} | {:<15}",
        "#", "Title", "Format", "Publisher", "Date", "Time"
    );
    println!("{}", "-".repeat(124));

    for (i, item) in items.iter().enumerate() {
        let date = item
            .schedule_date
            .as_deref()
            .or(item.release.as_deref())
            .unwrap_or("-");
        let time = match (&item.start_time, &item.end_time) {
            (Some(start), Some(end)) => format!("{start}-{end}"),
            (Some(start), None) => start.clone(),
            _ => item.duration.clone().unwrap_or_else(|| "-".into()),
        };
        println!(
            "{:>3} | {:<48} | {:<12} | {:<16} | {:<14} | {:<15}",
            i + 1,
            truncate(&item.title, 48),
            truncate(item.format.as_deref().unwrap_or("-"), 12),
            truncate(item.publisher.as_deref().unwrap_or("-"), 16),
            truncate(date, 14),
            time
        );
    }

    let with_authors: Vec<_> = items.iter().filter(|i| !i.authors.is_empty()).collect();
    if !with_authors.is_empty() {
        println!("\n--- Authors ---");
        for item in &with_authors {
            println!("  {}: {}", truncate(&item.title, 48), item.authors.join(", "));
        }
    }

    println!("\n{} results", items.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
