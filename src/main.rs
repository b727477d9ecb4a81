use feedsift::config::{self, parse_keywords, RunConfig, Settings};
use feedsift::error::{AppError, Result};
use feedsift::models::RunPhase;
use feedsift::{pipeline, report};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

struct CliArgs {
    group_url: Option<String>,
    max_posts: Option<usize>,
    top_n: Option<usize>,
    keywords: Option<String>,
    criteria: Option<String>,
    out: PathBuf,
    semantic: bool,
    headful: bool,
    no_restore: bool,
    no_save: bool,
}

fn print_usage() {
    eprintln!(
        "Usage: feedsift [GROUP_URL] [options]\n\
         \n\
         Options:\n\
         \x20 --max-posts N     posts to collect (default 100)\n\
         \x20 --top-n N         topics to report (default 20)\n\
         \x20 --keywords LIST   comma-separated keyword hints\n\
         \x20 --criteria TEXT   grouping focus for semantic mode\n\
         \x20 --out PATH        CSV output path (default topics.csv)\n\
         \x20 --semantic        delegate grouping to the configured model\n\
         \x20 --headful         show the browser window\n\
         \x20 --no-restore      skip saved-session restore\n\
         \x20 --no-save         do not save the session after login\n\
         \n\
         Credentials come from FEEDSIFT_EMAIL / FEEDSIFT_PASSWORD (or .env).\n\
         Non-secret settings persist between runs; the password never does."
    );
}

fn parse_args() -> Result<CliArgs> {
    let mut args = CliArgs {
        group_url: None,
        max_posts: None,
        top_n: None,
        keywords: None,
        criteria: None,
        out: PathBuf::from("topics.csv"),
        semantic: false,
        headful: false,
        no_restore: false,
        no_save: false,
    };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--max-posts" => args.max_posts = Some(parse_num(iter.next(), "--max-posts")?),
            "--top-n" => args.top_n = Some(parse_num(iter.next(), "--top-n")?),
            "--keywords" => args.keywords = iter.next(),
            "--criteria" => args.criteria = iter.next(),
            "--out" => {
                args.out = PathBuf::from(iter.next().ok_or_else(|| {
                    AppError::Configuration("--out requires a path".to_string())
                })?)
            }
            "--semantic" => args.semantic = true,
            "--headful" => args.headful = true,
            "--no-restore" => args.no_restore = true,
            "--no-save" => args.no_save = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other if !other.starts_with('-') => args.group_url = Some(other.to_string()),
            other => {
                return Err(AppError::Configuration(format!(
                    "Unknown option: {}",
                    other
                )))
            }
        }
    }
    Ok(args)
}

fn parse_num(value: Option<String>, flag: &str) -> Result<usize> {
    value
        .and_then(|v| v.parse().ok())
        .ok_or_else(|| AppError::Configuration(format!("{} requires a number", flag)))
}

fn build_config(args: &CliArgs, settings: &mut Settings) -> RunConfig {
    if let Some(url) = &args.group_url {
        settings.group_url = url.clone();
    }
    if let Some(n) = args.max_posts {
        settings.max_posts = n;
    }
    if let Some(n) = args.top_n {
        settings.top_n = n;
    }
    if let Some(kw) = &args.keywords {
        settings.keywords = kw.clone();
    }
    if let Some(criteria) = &args.criteria {
        settings.criteria = criteria.clone();
    }
    if args.semantic {
        settings.use_semantic_grouping = true;
    }
    if args.headful {
        settings.headless = false;
    }
    if args.no_restore {
        settings.restore_session = false;
    }
    if args.no_save {
        settings.save_session = false;
    }
    if let Ok(email) = std::env::var("FEEDSIFT_EMAIL") {
        settings.email = email;
    }

    let password = std::env::var("FEEDSIFT_PASSWORD").unwrap_or_default();
    let mut config = settings.clone().into_run_config(password);
    config.keywords = parse_keywords(&settings.keywords);
    config
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let args = parse_args()?;
    let settings_path = config::settings_path()?;
    let mut settings = Settings::load(&settings_path);
    let run_config = build_config(&args, &mut settings);

    if run_config.group_url.trim().is_empty() {
        print_usage();
        return Err(AppError::Configuration(
            "A group URL is required (argument or saved settings)".to_string(),
        ));
    }

    let cancel = Arc::new(AtomicBool::new(false));
    let ctrlc_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nCancelling after the current step...");
            ctrlc_cancel.store(true, Ordering::Relaxed);
        }
    });

    let (tx, mut rx) = mpsc::channel(64);
    let pipeline = tokio::spawn(pipeline::run(run_config, tx, cancel));

    while let Some(event) = rx.recv().await {
        match &event.phase {
            RunPhase::Failed(_) => eprintln!("{}", event.message),
            _ if event.posts_target > 0 => println!(
                "[{}/{}] {}",
                event.posts_collected, event.posts_target, event.message
            ),
            _ => println!("{}", event.message),
        }
    }

    let topics = pipeline
        .await
        .map_err(|e| AppError::Generic(anyhow::anyhow!("Pipeline task panicked: {}", e)))??;

    if topics.is_empty() {
        println!("No question-like content found.");
    } else {
        println!("\nTop topics:");
        for (rank, topic) in topics.iter().enumerate() {
            println!(
                "{:>3}. [{} posts, weight {}] {}",
                rank + 1,
                topic.member_count,
                topic.total_weight,
                topic.representative_text
            );
        }
        report::write_csv(&topics, &args.out)?;
        println!("\nWrote {}", args.out.display());
    }

    if let Err(e) = settings.save(&settings_path) {
        tracing::warn!("Could not persist settings: {}", e);
    }
    Ok(())
}
