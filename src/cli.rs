use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use github_dashboard_cache::config::DEFAULT_API_BASE;
use github_dashboard_cache::models::{Density, SortDirection, SortField, Theme, ViewMode};
use github_dashboard_cache::store::DEFAULT_QUOTA_BYTES;

#[derive(Parser)]
#[command(name = "github-dashboard")]
#[command(about = "GitHub Dashboard - Cached view of your repositories, organizations and activity")]
#[command(version = "0.1.0")]
pub struct Cli {
    /// GitHub API base URL
    #[arg(long, env = "GITHUB_API_BASE", default_value = DEFAULT_API_BASE, global = true)]
    pub api_base: String,

    /// Path of the persistent store file
    #[arg(long, env = "DASHBOARD_STORE", global = true)]
    pub store_path: Option<PathBuf>,

    /// Storage quota in bytes
    #[arg(long, env = "DASHBOARD_STORE_QUOTA", default_value_t = DEFAULT_QUOTA_BYTES, global = true)]
    pub store_quota: usize,

    /// Token for this invocation only; never written to the store
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    pub token: Option<String>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, env = "DASHBOARD_LOG", default_value = "warn", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Validate a token, store it and load the profile
    Login {
        token: String,
        /// Keep the token in memory only
        #[arg(long)]
        ephemeral: bool,
    },
    /// Forget the token and every piece of account data
    Logout,
    /// Show the signed-in profile
    Whoami(RefreshArgs),
    /// List organizations
    Orgs(RefreshArgs),
    /// List repositories across the user and all organizations
    Repos(RefreshArgs),
    /// Show one repository
    Repo {
        /// Repository as owner/name
        full_name: String,
        #[command(flatten)]
        refresh: RefreshArgs,
    },
    /// Show recent commits, open issues and open pull requests
    Activity {
        /// Repository as owner/name
        full_name: String,
        #[command(flatten)]
        refresh: RefreshArgs,
    },
    /// Manage tracked repositories
    #[command(subcommand)]
    Track(TrackCommand),
    /// Show or change dashboard settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Write a snapshot of dashboard state as JSON
    Export {
        /// Output file; stdout when omitted
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Merge a snapshot into the store
    Import { input: PathBuf },
    /// Show storage usage against the quota
    Usage {
        /// Also drop expired cache entries
        #[arg(long)]
        purge: bool,
    },
    /// Query the live GitHub rate limit
    RateLimit,
    /// Refresh profile, organizations and repositories
    Refresh(RefreshArgs),
}

#[derive(Args, Clone, Copy)]
pub struct RefreshArgs {
    /// Bypass the cache and fetch from GitHub
    #[arg(long, short)]
    pub force: bool,
}

#[derive(Subcommand)]
pub enum TrackCommand {
    /// Start tracking owner/name
    Add { full_name: String },
    /// Stop tracking owner/name
    Remove { full_name: String },
    Pin { full_name: String },
    Unpin { full_name: String },
    /// Replace the notes on a tracked repository
    Note { full_name: String, notes: String },
    List,
}

#[derive(Subcommand)]
pub enum SettingsCommand {
    Show,
    /// Change only the given fields
    Set {
        #[arg(long, value_enum)]
        view_mode: Option<ViewModeArg>,
        #[arg(long, value_enum)]
        theme: Option<ThemeArg>,
        #[arg(long)]
        auto_refresh: Option<bool>,
        /// Seconds between automatic refreshes
        #[arg(long)]
        refresh_interval: Option<u64>,
        #[arg(long, value_enum)]
        density: Option<DensityArg>,
        #[arg(long, value_enum)]
        sort_by: Option<SortFieldArg>,
        #[arg(long, value_enum)]
        sort_direction: Option<SortDirectionArg>,
    },
    Reset,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ViewModeArg {
    Grid,
    List,
    Compact,
}

impl From<ViewModeArg> for ViewMode {
    fn from(arg: ViewModeArg) -> Self {
        match arg {
            ViewModeArg::Grid => ViewMode::Grid,
            ViewModeArg::List => ViewMode::List,
            ViewModeArg::Compact => ViewMode::Compact,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ThemeArg {
    Light,
    Dark,
    Auto,
}

impl From<ThemeArg> for Theme {
    fn from(arg: ThemeArg) -> Self {
        match arg {
            ThemeArg::Light => Theme::Light,
            ThemeArg::Dark => Theme::Dark,
            ThemeArg::Auto => Theme::Auto,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DensityArg {
    Comfortable,
    Compact,
}

impl From<DensityArg> for Density {
    fn from(arg: DensityArg) -> Self {
        match arg {
            DensityArg::Comfortable => Density::Comfortable,
            DensityArg::Compact => Density::Compact,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortFieldArg {
    Updated,
    Name,
    Stars,
    Issues,
}

impl From<SortFieldArg> for SortField {
    fn from(arg: SortFieldArg) -> Self {
        match arg {
            SortFieldArg::Updated => SortField::Updated,
            SortFieldArg::Name => SortField::Name,
            SortFieldArg::Stars => SortField::Stars,
            SortFieldArg::Issues => SortField::Issues,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
pub enum SortDirectionArg {
    Asc,
    Desc,
}

impl From<SortDirectionArg> for SortDirection {
    fn from(arg: SortDirectionArg) -> Self {
        match arg {
            SortDirectionArg::Asc => SortDirection::Asc,
            SortDirectionArg::Desc => SortDirection::Desc,
        }
    }
}
