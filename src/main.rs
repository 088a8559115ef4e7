// Copyright 2026 coursedl contributors
// SPDX-License-Identifier: MIT

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use coursedl::auth::{cached_cookie_path, AuthSession, SessionAuthenticator};
use coursedl::client::CourseClient;
use coursedl::error::CourseError;
use coursedl::syllabus::{PageFetcher, Section, SessionFetcher, SyllabusParser};
use coursedl::utils::indent;

#[derive(Parser)]
#[command(
    name = "coursedl",
    about = "coursedl — list the sections, lectures, and downloadable resources of a course",
    version,
    after_help = "Use the course identifier from the class URL: \
                  https://class.coursera.org/<course>"
)]
struct Cli {
    /// One or more courses to process
    #[arg(required = true)]
    courses: Vec<String>,

    /// Account username (email)
    #[arg(short, long)]
    username: Option<String>,

    /// Account password (falls back to $COURSEDL_PASSWORD)
    #[arg(short, long)]
    password: Option<String>,

    /// Read cookies from this file and skip authentication entirely
    #[arg(long, value_name = "FILE")]
    cookies: Option<PathBuf>,

    /// Directory for cached per-user cookie jars
    #[arg(long, value_name = "DIR")]
    cache_dir: Option<PathBuf>,

    /// Disable the cookie cache
    #[arg(long)]
    no_cache_dir: bool,

    /// Clear cached cookies before running
    #[arg(long)]
    clear_cache: bool,

    /// List sections in reverse order
    #[arg(short, long)]
    reverse: bool,

    /// Parse a locally saved syllabus page instead of fetching one
    #[arg(long, value_name = "FILE")]
    syllabus_page: Option<PathBuf>,

    /// Output the outline as JSON (machine-readable)
    #[arg(long)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short)]
    verbose: bool,
}

/// Stand-in fetcher for `--syllabus-page` runs: any hidden-video fetch
/// becomes a warning instead of a network call.
struct OfflineFetcher;

#[async_trait::async_trait]
impl PageFetcher for OfflineFetcher {
    async fn get_page(&self, url: &str) -> Result<String, CourseError> {
        Err(CourseError::Parse(format!(
            "cannot fetch {url} while parsing a local syllabus page"
        )))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli);

    let cache_dir = resolve_cache_dir(&cli)?;
    let client = CourseClient::new()?;

    let mut failed = 0usize;
    for course in &cli.courses {
        if let Err(e) = run_course(&cli, &client, cache_dir.as_deref(), course).await {
            tracing::error!(course, "course failed: {e:#}");
            failed += 1;
        }
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose {
        "coursedl=debug"
    } else if cli.quiet {
        "coursedl=error"
    } else {
        "coursedl=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(level.parse().unwrap()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_cache_dir(cli: &Cli) -> Result<Option<PathBuf>> {
    if cli.no_cache_dir {
        return Ok(None);
    }
    let dir = match &cli.cache_dir {
        Some(dir) => dir.clone(),
        None => dirs::cache_dir()
            .context("no cache directory on this platform; use --cache-dir or --no-cache-dir")?
            .join("coursedl"),
    };
    if cli.clear_cache && dir.exists() {
        fs::remove_dir_all(&dir)
            .with_context(|| format!("failed to clear cache dir {}", dir.display()))?;
    }
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create cache dir {}", dir.display()))?;
    tracing::debug!(dir = %dir.display(), "cookie cache");
    Ok(Some(dir))
}

async fn run_course(
    cli: &Cli,
    client: &CourseClient,
    cache_dir: Option<&Path>,
    course: &str,
) -> Result<()> {
    let mut sections = if let Some(page) = &cli.syllabus_page {
        let html = fs::read_to_string(page)
            .with_context(|| format!("failed to read syllabus page {}", page.display()))?;
        SyllabusParser::new(&OfflineFetcher).parse(&html).await?
    } else {
        let session = authenticate(cli, client, cache_dir, course).await?;
        let fetcher = SessionFetcher::new(client, &session);
        SyllabusParser::new(&fetcher).parse_course(course).await?
    };

    if cli.reverse {
        sections.reverse();
    }

    let lectures: usize = sections.iter().map(|s| s.lectures.len()).sum();
    let resources: usize = sections
        .iter()
        .flat_map(|s| &s.lectures)
        .map(|l| l.resources.len())
        .sum();
    tracing::info!(course, sections = sections.len(), lectures, resources, "parsed syllabus");

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&sections)?);
    } else {
        print_outline(course, &sections, 0);
    }
    Ok(())
}

async fn authenticate(
    cli: &Cli,
    client: &CourseClient,
    cache_dir: Option<&Path>,
    course: &str,
) -> Result<AuthSession> {
    // Explicit cookie file: trusted as-is, never validated.
    if let Some(file) = &cli.cookies {
        return Ok(AuthSession::from_cookie_file(file, course)?);
    }

    let username = cli
        .username
        .as_deref()
        .context("a username is required; pass -u or use --cookies")?;
    let password = match &cli.password {
        Some(p) => p.clone(),
        None => match std::env::var("COURSEDL_PASSWORD") {
            Ok(p) => p,
            Err(_) => bail!("a password is required; pass -p or set COURSEDL_PASSWORD"),
        },
    };

    let cache_file = cache_dir.map(|dir| cached_cookie_path(dir, username));
    let authenticator = SessionAuthenticator::new(client, username, &password);
    Ok(authenticator
        .establish(course, cache_file.as_deref())
        .await?)
}

/// Print the outline with explicit nesting depth.
fn print_outline(course: &str, sections: &[Section], depth: usize) {
    println!("{}{course}", indent(depth));
    for section in sections {
        println!("{}{}", indent(depth + 1), section.name);
        for lecture in &section.lectures {
            println!("{}{}", indent(depth + 2), lecture.name);
            for resource in &lecture.resources {
                println!(
                    "{}{} ({})",
                    indent(depth + 3),
                    resource.name,
                    resource.filename
                );
            }
        }
    }
}
