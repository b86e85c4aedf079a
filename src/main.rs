use std::io::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use transistor::http::DEFAULT_BASE_URL;
use transistor::models::{EpisodeAttributes, ShowAttributes};
use transistor::render;
use transistor::{
    ClientConfig, EpisodeId, ListingShape, NoopReporter, ProgressEvent, ProgressReporter,
    QueryFilters, RateLimiter, Reconciler, ReqwestClient, SharedProgressReporter,
    TransistorClient, estimated_duration, parse_date,
};

// Emoji with fallback for terminals without Unicode support
static MICROPHONE: Emoji<'_, '_> = Emoji("🎙️  ", "");
static SEARCH: Emoji<'_, '_> = Emoji("🔍 ", "[~] ");
static HOURGLASS: Emoji<'_, '_> = Emoji("⏳ ", "[z] ");
static SUCCESS: Emoji<'_, '_> = Emoji("✅ ", "[+] ");
static FAILURE: Emoji<'_, '_> = Emoji("❌ ", "[!] ");
static PARTY: Emoji<'_, '_> = Emoji("🎉 ", "[*] ");
static CROSS: Emoji<'_, '_> = Emoji("✗ ", "x ");

type Client = TransistorClient<ReqwestClient>;

/// Command line client for the Transistor.fm podcast hosting API
#[derive(Parser, Debug)]
#[command(name = "transistor")]
#[command(about = "Command line client for the Transistor.fm podcast hosting API")]
#[command(version)]
struct Cli {
    /// API key from dashboard.transistor.fm/account
    #[arg(long, env = "TRANSISTOR_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// API root
    #[arg(long, env = "TRANSISTOR_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// Requests allowed per rate window
    #[arg(long, default_value = "10", global = true)]
    rate_limit: usize,

    /// Length of the rate window in seconds
    #[arg(long, default_value = "10", global = true)]
    rate_window: u64,

    /// How the episode listing is scoped to a show
    #[arg(long, value_enum, default_value = "query", global = true)]
    listing_shape: ShapeArg,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode - suppress progress output
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ShapeArg {
    /// episodes?show_id=<id>
    Query,
    /// shows/<id>/episodes
    Path,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    Json,
    Table,
}

#[derive(Args, Debug)]
struct DateRange {
    /// Start date (dd-mm-yyyy)
    #[arg(long)]
    start_date: Option<String>,

    /// End date (dd-mm-yyyy)
    #[arg(long)]
    end_date: Option<String>,
}

impl DateRange {
    fn to_filters(&self) -> Result<QueryFilters> {
        let start = self.start_date.as_deref().map(parse_date).transpose()?;
        let end = self.end_date.as_deref().map(parse_date).transpose()?;
        Ok(QueryFilters::date_range(start, end))
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Get account information
    Account,

    /// Show management commands
    #[command(subcommand)]
    Shows(ShowsCommand),

    /// Episode management commands
    #[command(subcommand)]
    Episodes(EpisodesCommand),

    /// Analytics commands
    #[command(subcommand)]
    Analytics(AnalyticsCommand),

    /// Private subscriber commands
    #[command(subcommand)]
    Subscribers(SubscribersCommand),

    /// Upload an audio file
    Upload { file: PathBuf },

    /// Explore the API interactively
    Interactive,
}

#[derive(Subcommand, Debug)]
enum ShowsCommand {
    /// List all shows
    List {
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Get show details
    Get { show_id: String },
    /// Create a new show
    Create {
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// Update an existing show
    Update {
        show_id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Delete a show
    Delete { show_id: String },
}

#[derive(Subcommand, Debug)]
enum EpisodesCommand {
    /// List episodes (first 20 only, a provider limitation)
    List {
        /// Filter by show ID
        #[arg(long)]
        show_id: Option<String>,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Get episode details
    Get { episode_id: String },
    /// Fetch every episode of a show, one request per episode
    All {
        show_id: String,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
    /// List every episode ID of a show
    Ids { show_id: String },
    /// Create a new episode
    Create {
        show_id: String,
        #[arg(long)]
        title: String,
        #[arg(long)]
        description: Option<String>,
        /// Audio file URL
        #[arg(long)]
        audio_url: Option<String>,
    },
    /// Publish an episode
    Publish { episode_id: String },
    /// Unpublish an episode
    Unpublish { episode_id: String },
    /// Delete an episode
    Delete { episode_id: String },
}

#[derive(Subcommand, Debug)]
enum AnalyticsCommand {
    /// Get analytics data by ID
    Get {
        analytics_id: String,
        #[command(flatten)]
        range: DateRange,
        #[arg(long, value_enum, default_value = "json")]
        format: Format,
    },
    /// Get show analytics
    Show {
        show_id: String,
        #[command(flatten)]
        range: DateRange,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Get episode analytics
    Episode {
        episode_id: String,
        #[command(flatten)]
        range: DateRange,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
    /// Get analytics for all episodes of a show
    AllEpisodes {
        show_id: String,
        #[command(flatten)]
        range: DateRange,
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },
}

#[derive(Subcommand, Debug)]
enum SubscribersCommand {
    /// List private subscribers of a show
    List { show_id: String },
    /// Add a private subscriber
    Add { show_id: String, email: String },
    /// Remove a private subscriber
    Remove { show_id: String, subscriber_id: String },
}

/// Progress reporter using indicatif for terminal output
struct IndicatifReporter {
    bar: ProgressBar,
    max_requests: usize,
    window: Duration,
}

impl IndicatifReporter {
    fn new(limiter: &RateLimiter) -> Self {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {wide_msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        Self {
            bar,
            max_requests: limiter.max_requests(),
            window: limiter.window(),
        }
    }
}

impl ProgressReporter for IndicatifReporter {
    fn report(&self, event: ProgressEvent) {
        match event {
            ProgressEvent::Discovering { show_id } => {
                self.bar
                    .set_message(format!("{SEARCH}Discovering episodes of show {}", show_id.cyan()));
            }

            ProgressEvent::Discovered { episode_count, .. } => {
                let estimate = estimated_duration(episode_count, self.max_requests, self.window);
                self.bar.println(format!(
                    "{HOURGLASS}{} episodes found, one request each: up to {}s at {} requests per {}s",
                    episode_count.to_string().cyan(),
                    estimate.as_secs().to_string().yellow(),
                    self.max_requests,
                    self.window.as_secs()
                ));
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("  [{bar:30.cyan/blue}] {pos}/{len} {wide_msg}")
                {
                    self.bar.set_style(style.progress_chars("█▓░"));
                }
                self.bar.set_length(episode_count as u64);
                self.bar.set_position(0);
            }

            ProgressEvent::Throttled { waited } => {
                self.bar.set_message(format!(
                    "{HOURGLASS}waited {:.1}s for the rate limit",
                    waited.as_secs_f64()
                ));
            }

            ProgressEvent::FetchingEpisode { episode_id, .. } => {
                self.bar.set_message(format!("episode {}", episode_id.to_string().cyan()));
            }

            ProgressEvent::EpisodeFetched { title, .. } => {
                if let Some(title) = title {
                    self.bar
                        .set_message(render::truncate_title(&title, 40).green().to_string());
                }
                self.bar.inc(1);
            }

            ProgressEvent::EpisodeFailed { episode_id, .. } => {
                // Details are listed once after the run
                self.bar.set_message(format!(
                    "{FAILURE}episode {} failed",
                    episode_id.to_string().red()
                ));
                self.bar.inc(1);
            }

            ProgressEvent::ReconciliationCompleted {
                succeeded_count,
                failed_count,
            } => {
                self.bar.finish_and_clear();
                eprintln!(
                    "{PARTY}{} {} fetched, {} failed",
                    "Done:".bold().green(),
                    succeeded_count.to_string().green().bold(),
                    if failed_count > 0 {
                        failed_count.to_string().red().bold()
                    } else {
                        failed_count.to_string().green()
                    }
                );
            }
        }
    }
}

/// Initialize tracing, honouring RUST_LOG and LOG_FORMAT=json
fn init_tracing(verbose: bool) {
    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if verbose { "transistor=debug" } else { "transistor=warn" })
    });

    if json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to format response")?);
    Ok(())
}

fn build_client(cli: &Cli) -> Result<Client> {
    let api_key = cli.api_key.as_deref().filter(|k| !k.trim().is_empty()).ok_or_else(|| {
        anyhow!("API key required. Set TRANSISTOR_API_KEY or use --api-key")
    })?;

    let http = ReqwestClient::with_base_url(api_key, &cli.base_url)?;
    let limiter = RateLimiter::new(cli.rate_limit, Duration::from_secs(cli.rate_window))
        .context("Invalid rate limit")?;
    let listing_shape = match cli.listing_shape {
        ShapeArg::Query => ListingShape::default(),
        ShapeArg::Path => ListingShape::PathSegment,
    };

    Ok(TransistorClient::with_limiter(http, Arc::new(limiter))
        .with_config(ClientConfig { listing_shape }))
}

async fn run_shows(client: &Client, command: ShowsCommand) -> Result<()> {
    match command {
        ShowsCommand::List { format } => {
            let doc = client.list_shows(&QueryFilters::default()).await?;
            match format {
                Format::Json => print_json(&doc)?,
                Format::Table => print!("{}", render::shows_table(&doc)),
            }
        }
        ShowsCommand::Get { show_id } => print_json(&client.get_show(&show_id).await?)?,
        ShowsCommand::Create { title, description } => {
            let attributes = ShowAttributes {
                title: Some(title),
                description,
                ..Default::default()
            };
            print_json(&client.create_show(&attributes).await?)?;
        }
        ShowsCommand::Update {
            show_id,
            title,
            description,
        } => {
            let attributes = ShowAttributes {
                title,
                description,
                ..Default::default()
            };
            print_json(&client.update_show(&show_id, &attributes).await?)?;
        }
        ShowsCommand::Delete { show_id } => print_json(&client.delete_show(&show_id).await?)?,
    }
    Ok(())
}

async fn run_episodes(client: &Client, command: EpisodesCommand, quiet: bool) -> Result<()> {
    match command {
        EpisodesCommand::List { show_id, format } => {
            let doc = client
                .list_episodes(show_id.as_deref(), &QueryFilters::default())
                .await?;
            match format {
                Format::Json => print_json(&doc)?,
                Format::Table => print!("{}", render::episodes_table(&doc.data)),
            }
            if let Some(total) = doc.list_meta().and_then(|m| m.total_count)
                && total > doc.data.len() as u64
                && !quiet
            {
                eprintln!(
                    "{} showing {} of {} episodes, use `episodes all` for the rest",
                    "Note:".yellow().bold(),
                    doc.data.len(),
                    total
                );
            }
        }
        EpisodesCommand::Get { episode_id } => {
            print_json(&client.get_episode(&EpisodeId::new(episode_id)).await?)?;
        }
        EpisodesCommand::All { show_id, format } => {
            let reporter: SharedProgressReporter = if quiet {
                NoopReporter::shared()
            } else {
                Arc::new(IndicatifReporter::new(client.limiter()))
            };
            let result = Reconciler::new(client)
                .with_reporter(reporter)
                .fetch_all_full_records(&show_id)
                .await
                .context("Failed to discover episodes")?;

            match format {
                Format::Json => print_json(&result.to_document())?,
                Format::Table => print!("{}", render::episodes_table(&result.succeeded)),
            }

            if !quiet && !result.failed.is_empty() {
                eprintln!("\n{}", "Failed episodes:".red().bold());
                for line in render::failed_episodes(&result.failed).lines() {
                    eprintln!("  {CROSS}{}", line.yellow());
                }
            }
        }
        EpisodesCommand::Ids { show_id } => {
            let ids = Reconciler::new(client).discover_all_ids(&show_id).await?;
            for id in ids {
                println!("{id}");
            }
        }
        EpisodesCommand::Create {
            show_id,
            title,
            description,
            audio_url,
        } => {
            let attributes = EpisodeAttributes {
                title: Some(title),
                description,
                media_url: audio_url,
                ..Default::default()
            };
            print_json(&client.create_episode(&show_id, &attributes).await?)?;
        }
        EpisodesCommand::Publish { episode_id } => {
            print_json(&client.publish_episode(&EpisodeId::new(episode_id)).await?)?;
        }
        EpisodesCommand::Unpublish { episode_id } => {
            print_json(&client.unpublish_episode(&EpisodeId::new(episode_id)).await?)?;
        }
        EpisodesCommand::Delete { episode_id } => {
            print_json(&client.delete_episode(&EpisodeId::new(episode_id)).await?)?;
        }
    }
    Ok(())
}

async fn run_analytics(client: &Client, command: AnalyticsCommand) -> Result<()> {
    match command {
        AnalyticsCommand::Get {
            analytics_id,
            range,
            format,
        } => {
            let doc = client.get_analytics(&analytics_id, &range.to_filters()?).await?;
            match format {
                Format::Json => print_json(&doc)?,
                Format::Table => print!("{}", render::analytics_items(&doc)),
            }
        }
        AnalyticsCommand::Show {
            show_id,
            range,
            format,
        } => {
            let doc = client.get_show_analytics(&show_id, &range.to_filters()?).await?;
            match format {
                Format::Json => print_json(&doc)?,
                Format::Table => print!("{}", render::analytics_items(&doc)),
            }
        }
        AnalyticsCommand::Episode {
            episode_id,
            range,
            format,
        } => {
            let doc = client
                .get_episode_analytics(&EpisodeId::new(episode_id), &range.to_filters()?)
                .await?;
            match format {
                Format::Json => print_json(&doc)?,
                Format::Table => print!("{}", render::analytics_items(&doc)),
            }
        }
        AnalyticsCommand::AllEpisodes {
            show_id,
            range,
            format,
        } => {
            let doc = client
                .get_all_episodes_analytics(&show_id, &range.to_filters()?)
                .await?;
            match format {
                Format::Json => print_json(&doc)?,
                Format::Table => print!("{}", render::episodes_analytics_table(&doc.data)),
            }
        }
    }
    Ok(())
}

async fn run_subscribers(client: &Client, command: SubscribersCommand) -> Result<()> {
    let doc = match command {
        SubscribersCommand::List { show_id } => {
            client
                .list_subscribers(&show_id, &QueryFilters::default())
                .await?
        }
        SubscribersCommand::Add { show_id, email } => {
            client.create_subscriber(&show_id, &email).await?
        }
        SubscribersCommand::Remove {
            show_id,
            subscriber_id,
        } => client.delete_subscriber(&show_id, &subscriber_id).await?,
    };
    print_json(&doc)
}

const INTERACTIVE_HELP: &str = "
Available commands:
  account                  - Get account info
  shows                    - List shows
  episodes                 - List episodes
  show <id>                - Get show details
  episode <id>             - Get episode details
  analytics <id>           - Get analytics by ID
  show-analytics <id>      - Get show analytics
  episode-analytics <id>   - Get episode analytics
  all-episodes <id>        - Get all episodes analytics
  quit                     - Exit
";

/// Run one interactive command line
async fn run_interactive_line(client: &Client, line: &str) -> Result<()> {
    let none = QueryFilters::default();
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match (command, argument) {
        ("help", _) => println!("{INTERACTIVE_HELP}"),
        ("account", _) => print_json(&client.get_account().await?)?,
        ("shows", _) => print!("{}", render::shows_table(&client.list_shows(&none).await?)),
        ("episodes", _) => {
            let doc = client.list_episodes(None, &none).await?;
            print!("{}", render::episodes_table(&doc.data));
        }
        ("show", id) if !id.is_empty() => print_json(&client.get_show(id).await?)?,
        ("episode", id) if !id.is_empty() => {
            print_json(&client.get_episode(&EpisodeId::new(id)).await?)?;
        }
        ("analytics", id) if !id.is_empty() => {
            print!("{}", render::analytics_items(&client.get_analytics(id, &none).await?));
        }
        ("show-analytics", id) if !id.is_empty() => {
            print!("{}", render::analytics_items(&client.get_show_analytics(id, &none).await?));
        }
        ("episode-analytics", id) if !id.is_empty() => {
            let doc = client.get_episode_analytics(&EpisodeId::new(id), &none).await?;
            print!("{}", render::analytics_items(&doc));
        }
        ("all-episodes", id) if !id.is_empty() => {
            let doc = client.get_all_episodes_analytics(id, &none).await?;
            print!("{}", render::episodes_analytics_table(&doc.data));
        }
        _ => println!("Unknown command. Type 'help' for available commands."),
    }
    Ok(())
}

async fn run_interactive(client: &Client) -> Result<()> {
    println!("Transistor API Interactive Mode");
    println!("Type 'help' for commands, 'quit' to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("transistor> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }

        // Errors end the current command, not the session
        if let Err(e) = run_interactive_line(client, line).await {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if !cli.quiet {
        eprintln!(
            "\n{}{} {}\n",
            MICROPHONE,
            "transistor".bold().magenta(),
            "- Transistor.fm API client".dimmed()
        );
    }

    let client = build_client(&cli)?;
    let quiet = cli.quiet;

    match cli.command {
        Command::Account => print_json(&client.get_account().await?)?,
        Command::Shows(command) => run_shows(&client, command).await?,
        Command::Episodes(command) => run_episodes(&client, command, quiet).await?,
        Command::Analytics(command) => run_analytics(&client, command).await?,
        Command::Subscribers(command) => run_subscribers(&client, command).await?,
        Command::Upload { file } => {
            let doc = client
                .upload_audio(&file)
                .await
                .with_context(|| format!("Failed to upload {}", file.display()))?;
            if !quiet {
                eprintln!("{SUCCESS}Uploaded {}", file.display().to_string().cyan());
            }
            print_json(&doc)?;
        }
        Command::Interactive => run_interactive(&client).await?,
    }

    Ok(())
}
