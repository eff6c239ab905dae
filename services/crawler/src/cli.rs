//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "profile-crawler")]
#[command(about = "Discover, refresh and monitor platform profiles through a shared account pool")]
#[command(version)]
pub struct Cli {
    /// Config file (falls back to CONFIG_PATH, then ./profile-crawler.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand, PartialEq, Eq)]
pub enum Command {
    /// Crawl categories by priority and catalog qualifying profiles
    Discover {
        /// Categories to crawl, highest priority first
        #[arg(long, default_value_t = 3)]
        categories: usize,

        /// Tags per category
        #[arg(long, default_value_t = 5)]
        tags: usize,

        /// Feed items considered per tag
        #[arg(long, default_value_t = 30)]
        candidates: usize,
    },

    /// Crawl a single tag
    DiscoverTag {
        tag: String,

        /// Category name written to new records
        category: String,

        #[arg(long, default_value_t = 30)]
        candidates: usize,
    },

    /// Re-sync catalog entities not synced recently
    Refresh {
        #[arg(long, default_value_t = 7)]
        max_age_days: u32,

        #[arg(long, default_value_t = 100)]
        limit: usize,
    },

    /// Check every tracked content id and record status changes
    Monitor,

    /// Add content to the tracked-content ledger
    Track {
        /// Content ids or post URLs
        #[arg(required = true)]
        content_ids: Vec<String>,
    },

    /// Print current engagement counters for one content id or post URL
    ContentMetrics { content_id: String },

    /// Authenticate the pool and print its status
    Status,
}

impl Command {
    /// Label for logs and the job duration histogram.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Discover { .. } => "discover",
            Command::DiscoverTag { .. } => "discover_tag",
            Command::Refresh { .. } => "refresh",
            Command::Monitor => "monitor",
            Command::Track { .. } => "track",
            Command::ContentMetrics { .. } => "content_metrics",
            Command::Status => "status",
        }
    }
}
