mod cli;

use std::fs;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use clap::Parser;
use cli::{Cli, Command, RefreshArgs, SettingsCommand, TrackCommand};
use colored::*;
use github_dashboard_cache::config::{default_store_path, DashboardConfig};
use github_dashboard_cache::credentials::Persistence;
use github_dashboard_cache::models::{SettingsPatch, TrackedRepoEntry};
use github_dashboard_cache::snapshot::ExportSnapshot;
use github_dashboard_cache::store::FileStore;
use github_dashboard_cache::sync::{Freshness, Synced};
use github_dashboard_cache::{Dashboard, DashboardError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Load .env file if it exists
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "error:".red().bold(), e);
        if let Some(hint) = e.downcast_ref::<DashboardError>().and_then(guidance) {
            eprintln!("{} {}", "hint:".yellow().bold(), hint);
        }
        std::process::exit(1);
    }
}

fn guidance(err: &DashboardError) -> Option<&'static str> {
    match err {
        e if e.requires_reauthentication() => {
            Some("sign in with `github-dashboard login <token>` or set GITHUB_TOKEN")
        }
        DashboardError::QuotaExceeded { .. } => {
            Some("the hourly GitHub quota is spent; cached data is still available without --force")
        }
        DashboardError::StorageExhausted { .. } => {
            Some("the store is full; remove tracked repositories or raise --store-quota")
        }
        e if e.is_retryable() => Some("this looks transient; try again shortly"),
        _ => None,
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = DashboardConfig {
        store_quota: cli.store_quota,
        ..Default::default()
    }
    .with_api_base(&cli.api_base)?;

    let store_path = cli
        .store_path
        .clone()
        .or_else(default_store_path)
        .context("Could not determine a store location; pass --store-path")?;
    let backend = FileStore::open(&store_path, config.store_quota)
        .with_context(|| format!("Failed to open store at {}", store_path.display()))?;
    let dashboard = Dashboard::new(&config, Arc::new(backend))?;

    if let Some(token) = &cli.token {
        if !matches!(cli.command, Command::Login { .. }) {
            dashboard
                .credentials()
                .set_credential(token, Persistence::Ephemeral)?;
        }
    }

    match cli.command {
        Command::Login { token, ephemeral } => {
            let persistence = if ephemeral {
                Persistence::Ephemeral
            } else {
                Persistence::Durable
            };
            let (profile, scopes) = dashboard.login(&token, persistence).await?;
            println!("✅ Signed in as {}", profile.login.bold().green());
            if !scopes.is_sufficient() {
                println!(
                    "{}",
                    "⚠️ Token lacks repo or read:org scope; some organizations may be unavailable"
                        .yellow()
                );
            }
        }
        Command::Logout => {
            dashboard.logout()?;
            println!("✅ Signed out and cleared account data");
        }
        Command::Whoami(RefreshArgs { force }) => {
            let synced = dashboard.sync_user_profile(force).await?;
            print_freshness(&synced);
            let profile = synced.data;
            println!(
                "{} {}",
                profile.login.bold(),
                profile.name.as_deref().unwrap_or("").dimmed()
            );
            if let Some(bio) = &profile.bio {
                println!("{}", bio);
            }
            println!(
                "Followers: {}  Following: {}  Public repos: {}",
                profile.followers, profile.following, profile.public_repos
            );
        }
        Command::Orgs(RefreshArgs { force }) => {
            let synced = dashboard.sync_organizations(force).await?;
            print_freshness(&synced);
            for org in &synced.data {
                println!(
                    "{:<24} {}",
                    org.login.bold(),
                    org.description.as_deref().unwrap_or("").dimmed()
                );
            }
            println!("{} organizations", synced.data.len());
        }
        Command::Repos(RefreshArgs { force }) => {
            let synced = dashboard.sync_repositories(force).await?;
            print_freshness(&synced);
            for repo in &synced.data {
                let visibility = if repo.private { "private" } else { "public" };
                println!(
                    "{:<48} ★ {:<6} {:<8} {}",
                    repo.full_name.bold(),
                    repo.stargazers_count,
                    visibility.dimmed(),
                    repo.language.as_deref().unwrap_or("").cyan()
                );
            }
            println!("{} repositories", synced.data.len());
        }
        Command::Repo { full_name, refresh } => {
            let (owner, name) = split_full_name(&full_name)?;
            let synced = dashboard.sync_repository(owner, name, refresh.force).await?;
            print_freshness(&synced);
            let repo = synced.data;
            println!("{}", repo.full_name.bold().green());
            if let Some(description) = &repo.description {
                println!("{}", description);
            }
            println!(
                "★ {}  👀 {}  Forks: {}  Open issues: {}",
                repo.stargazers_count, repo.watchers_count, repo.forks_count, repo.open_issues_count
            );
            println!("{}", repo.html_url.dimmed());
        }
        Command::Activity { full_name, refresh } => {
            let (owner, name) = split_full_name(&full_name)?;
            let commits = dashboard.sync_commits(owner, name, refresh.force).await?;
            let issues = dashboard.sync_issues(owner, name, refresh.force).await?;
            let pulls = dashboard.sync_pull_requests(owner, name, refresh.force).await?;

            println!("{}", "Recent commits".bold());
            print_freshness(&commits);
            for commit in &commits.data {
                let summary = commit.message.lines().next().unwrap_or("");
                println!("  {} {}", commit.sha.chars().take(7).collect::<String>().yellow(), summary);
            }

            println!("{}", "Open issues".bold());
            print_freshness(&issues);
            for issue in &issues.data {
                println!("  #{:<6} {}", issue.number, issue.title);
            }

            println!("{}", "Open pull requests".bold());
            print_freshness(&pulls);
            for pr in &pulls.data {
                let draft = if pr.draft { " (draft)" } else { "" };
                println!("  #{:<6} {}{}", pr.number, pr.title, draft.dimmed());
            }
        }
        Command::Track(command) => run_track(&dashboard, command).await?,
        Command::Settings(command) => run_settings(&dashboard, command)?,
        Command::Export { output } => {
            let snapshot = dashboard.export()?;
            let json = serde_json::to_string_pretty(&snapshot)?;
            match output {
                Some(path) => {
                    fs::write(&path, json)
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    println!("✅ Exported to {}", path.display());
                }
                None => println!("{}", json),
            }
        }
        Command::Import { input } => {
            let contents = fs::read_to_string(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let snapshot: ExportSnapshot =
                serde_json::from_str(&contents).context("Snapshot is not valid JSON")?;
            let summary = dashboard.import(&snapshot)?;
            println!(
                "✅ Imported snapshot ({} tracked repositories)",
                summary.tracked_repos
            );
        }
        Command::Usage { purge } => {
            if purge {
                let evicted = dashboard.purge_expired()?;
                println!("Purged {} expired cache entries", evicted);
            }
            let usage = dashboard.storage_usage()?;
            let line = format!(
                "Storage: {} / {} bytes ({:.1}%)",
                usage.used_bytes, usage.quota_bytes, usage.percent
            );
            if usage.percent >= 90.0 {
                println!("{}", line.red());
            } else {
                println!("{}", line);
            }
            if let Some(last) = dashboard.last_refresh()? {
                println!("Last refresh: {}", last.to_rfc3339().dimmed());
            }
        }
        Command::RateLimit => {
            let state = dashboard.rate_limit_status().await?;
            println!(
                "Remaining: {}/{}  Resets at: {}",
                state.remaining, state.limit, state.reset_time
            );
        }
        Command::Refresh(RefreshArgs { force }) => {
            let summary = dashboard.refresh_all(force).await?;
            println!(
                "✅ {} organizations, {} repositories",
                summary.organizations, summary.repositories
            );
            if let Freshness::Stale { reason } = &summary.repositories_freshness {
                println!("{} {}", "⚠️ Repositories are stale:".yellow(), reason);
            }
        }
    }

    Ok(())
}

async fn run_track(dashboard: &Dashboard, command: TrackCommand) -> anyhow::Result<()> {
    let tracked = dashboard.tracked();
    match command {
        TrackCommand::Add { full_name } => {
            let (owner, name) = split_full_name(&full_name)?;
            let (repo, added) = dashboard.track(owner, name).await?;
            if added {
                println!("✅ Tracking {}", repo.full_name.bold());
            } else {
                println!("{} is already tracked", repo.full_name.bold());
            }
        }
        TrackCommand::Remove { full_name } => {
            let entry = tracked_entry(dashboard, &full_name)?;
            tracked.remove(entry.id)?;
            println!("✅ Stopped tracking {}", entry.full_name.bold());
        }
        TrackCommand::Pin { full_name } => {
            let entry = tracked_entry(dashboard, &full_name)?;
            tracked.set_pinned(entry.id, true)?;
            println!("📌 Pinned {}", entry.full_name.bold());
        }
        TrackCommand::Unpin { full_name } => {
            let entry = tracked_entry(dashboard, &full_name)?;
            tracked.set_pinned(entry.id, false)?;
            println!("Unpinned {}", entry.full_name.bold());
        }
        TrackCommand::Note { full_name, notes } => {
            let entry = tracked_entry(dashboard, &full_name)?;
            tracked.set_notes(entry.id, &notes)?;
            println!("✅ Updated notes on {}", entry.full_name.bold());
        }
        TrackCommand::List => {
            let entries = tracked.list()?;
            if entries.is_empty() {
                println!("{}", "No tracked repositories".dimmed());
            }
            for entry in entries {
                let pin = if entry.pinned { "📌" } else { "  " };
                println!("{} {:<48} {}", pin, entry.full_name.bold(), entry.notes.dimmed());
            }
        }
    }
    Ok(())
}

fn run_settings(dashboard: &Dashboard, command: SettingsCommand) -> anyhow::Result<()> {
    match command {
        SettingsCommand::Show => {
            let settings = dashboard.settings()?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsCommand::Set {
            view_mode,
            theme,
            auto_refresh,
            refresh_interval,
            density,
            sort_by,
            sort_direction,
        } => {
            let patch = SettingsPatch {
                view_mode: view_mode.map(Into::into),
                theme: theme.map(Into::into),
                auto_refresh,
                refresh_interval,
                density: density.map(Into::into),
                sort_by: sort_by.map(Into::into),
                sort_direction: sort_direction.map(Into::into),
            };
            if patch == SettingsPatch::default() {
                bail!("No settings given; see `github-dashboard settings set --help`");
            }
            let settings = dashboard.update_settings(&patch)?;
            println!("{}", serde_json::to_string_pretty(&settings)?);
        }
        SettingsCommand::Reset => {
            dashboard.reset_settings()?;
            println!("✅ Settings reset to defaults");
        }
    }
    Ok(())
}

fn print_freshness<T>(synced: &Synced<T>) {
    let when = synced
        .fetched_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    match &synced.freshness {
        Freshness::Fresh => println!("{}", format!("(fetched {})", when).dimmed()),
        Freshness::Cached => println!("{}", format!("(cached {})", when).dimmed()),
        Freshness::Stale { reason } => println!(
            "{}",
            format!("(stale data from {}: {})", when, reason).yellow()
        ),
    }
}

fn split_full_name(full_name: &str) -> anyhow::Result<(&str, &str)> {
    match full_name.split_once('/') {
        Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
            Ok((owner, name))
        }
        _ => Err(anyhow!("Expected owner/name, got '{}'", full_name)),
    }
}

fn tracked_entry(dashboard: &Dashboard, full_name: &str) -> anyhow::Result<TrackedRepoEntry> {
    dashboard
        .tracked()
        .find_by_name(full_name)?
        .ok_or_else(|| anyhow!("{} is not tracked", full_name))
}
