use clap::Parser;
use epm_core::{
    Category, ChatTranscript, Continent, CorporateProfile, Language, NewsQuery, TimeRange,
};
use epm_pipeline::{
    broadcast_programs, init_logging, AdminCredential, AuthService, IntelligenceService,
    ServiceConfig,
};
use epm_storage::InMemoryUserRepository;
use futures_util::StreamExt;
use serde::Serialize;
use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "epm", author, version, about, long_about = None)]
pub struct Cli {
    #[arg(long, default_value = "gemini", help = "Model to use for inference. Available models: gemini (default), dummy")]
    model: String,
    /// Overrides GEMINI_API_KEY / API_KEY.
    #[arg(long)]
    api_key: Option<String>,
    /// Persist the cache to this JSON file instead of memory.
    #[arg(long)]
    cache_file: Option<String>,
    #[arg(long)]
    rss_bridge_url: Option<String>,
    #[arg(long, default_value = "info")]
    log_level: String,
    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// One page of the news feed.
    News {
        #[arg(long, default_value = "Global")]
        continent: Continent,
        #[arg(long, default_value = "Global")]
        category: Category,
        #[arg(long, default_value = "en")]
        language: Language,
        /// 24h, 7d or 30d.
        #[arg(long, default_value = "24h")]
        time_range: TimeRange,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        #[arg(long)]
        country: Option<String>,
        #[arg(long)]
        sub_category: Option<String>,
    },
    /// Free-text search over the RSS feed.
    Search {
        query: String,
        #[arg(long, default_value = "en")]
        language: Language,
        #[arg(long, default_value_t = 0)]
        offset: usize,
    },
    /// Market pulse report for a sector.
    Pulse {
        #[arg(long, default_value = "Global")]
        continent: Continent,
        #[arg(long, default_value = "Global")]
        category: Category,
        #[arg(long, default_value = "en")]
        language: Language,
        #[arg(long)]
        sub_category: Option<String>,
    },
    /// Corporate risk assessment.
    Risk {
        company: String,
        #[arg(long, default_value = "")]
        sector: String,
        /// May be repeated.
        #[arg(long = "location")]
        locations: Vec<String>,
        #[arg(long, default_value = "")]
        supply_chain: String,
        #[arg(long, default_value = "en")]
        language: Language,
    },
    /// Validate a business idea for a region.
    Validate {
        idea: String,
        #[arg(long, default_value = "Global")]
        region: String,
        #[arg(long, default_value = "en")]
        language: Language,
    },
    /// Ask the analyst. Without a question, reads one question per line.
    Chat {
        question: Option<String>,
        #[arg(long, default_value = "en")]
        language: Language,
    },
    /// Live channel directory.
    Broadcasts {
        #[arg(long, default_value = "Global")]
        continent: Continent,
    },
    /// Serve the HTTP API.
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: SocketAddr,
    },
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn build_service(cli: &Cli) -> anyhow::Result<IntelligenceService> {
    let mut config = ServiceConfig::from_env();
    if let Some(key) = &cli.api_key {
        config.inference.api_key = Some(key.clone());
    }
    if let Some(url) = &cli.rss_bridge_url {
        config.feeds = config.feeds.with_bridge_url(url.as_str());
    }

    let store = match &cli.cache_file {
        Some(path) => epm_storage::create_store("file", Some(path.as_str())).await?,
        None => epm_storage::create_store("memory", None).await?,
    };
    info!(
        "💾 Cache initialized ({})",
        cli.cache_file.as_deref().unwrap_or("memory")
    );

    let model = epm_inference::create_model(&cli.model, &config.inference)?;
    info!("🧠 Inference model initialized successfully (using {})", model.name());
    Ok(IntelligenceService::new(model, store, config))
}

async fn ask(
    service: &IntelligenceService,
    transcript: &mut ChatTranscript,
    question: &str,
    language: Language,
) -> anyhow::Result<()> {
    transcript.push_user(question);
    transcript.begin_assistant();
    let mut chunks = service.ask_stream(question, language);
    let mut stdout = std::io::stdout();
    while let Some(chunk) = chunks.next().await {
        transcript.append_to_last_assistant(&chunk);
        write!(stdout, "{}", chunk)?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let service = build_service(&cli).await?;

    match cli.command {
        Commands::News {
            continent,
            category,
            language,
            time_range,
            offset,
            country,
            sub_category,
        } => {
            let mut query = NewsQuery::new(continent, category, language)
                .with_time_range(time_range)
                .with_offset(offset);
            query.country = country;
            query.sub_category = sub_category;
            info!("📰 Fetching {} news for {}", category, continent);
            print_json(&service.fetch_news(&query).await)?;
        }
        Commands::Search {
            query,
            language,
            offset,
        } => {
            info!("🔎 Searching for '{}'", query);
            print_json(&service.search_news(&query, language, offset).await)?;
        }
        Commands::Pulse {
            continent,
            category,
            language,
            sub_category,
        } => {
            info!("📈 Reading market pulse for {}", category);
            let report = service
                .fetch_market_pulse(continent, category, language, sub_category.as_deref())
                .await;
            print_json(&report)?;
        }
        Commands::Risk {
            company,
            sector,
            locations,
            supply_chain,
            language,
        } => {
            let mut profile = CorporateProfile::new(company, sector);
            profile.key_locations = locations;
            profile.supply_chain_focus = supply_chain;
            info!("🛡️ Assessing risk for {}", profile.company_name);
            print_json(&service.calculate_corporate_risk(&profile, language).await)?;
        }
        Commands::Validate {
            idea,
            region,
            language,
        } => {
            info!("💡 Validating idea for {}", region);
            print_json(&service.validate_business_idea(&idea, &region, language).await)?;
        }
        Commands::Chat { question, language } => {
            let mut transcript = ChatTranscript::new("You", "EPM Analyst");
            match question {
                Some(question) => ask(&service, &mut transcript, &question, language).await?,
                None => {
                    let mut lines = BufReader::new(tokio::io::stdin()).lines();
                    while let Some(line) = lines.next_line().await? {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }
                        ask(&service, &mut transcript, line, language).await?;
                    }
                }
            }
            info!("💬 Chat closed after {} messages", transcript.len());
        }
        Commands::Broadcasts { continent } => {
            print_json(&broadcast_programs(continent))?;
        }
        Commands::Serve { addr } => {
            let admin = AdminCredential::from_env();
            if admin.is_none() {
                info!("🔒 No administrator configured (EPM_ADMIN_EMAIL / EPM_ADMIN_PASSWORD)");
            }
            let auth = AuthService::new(Arc::new(InMemoryUserRepository::new()), admin);
            epm_web::serve(epm_web::AppState::new(service, auth), addr).await?;
        }
    }

    Ok(())
}
