//! `marquee`: scheduling and ticketing for a small cinema.
//!
//! # Usage
//!
//! ```
//! marquee movie add "Metropolis" --duration 153 --price 1000
//! marquee schedule weekly 1 A --from 2025-01-06 --until 2025-01-17 --day 0,2 --time 18:00
//! marquee seats 3
//! marquee purchase 3 --seat A-1,A-2 --category adult=2 --total 2000 --name alice
//! marquee admit 0b5e…
//! ```
//!
//! Settings come from `marquee.toml` (or `--config`) and `MARQUEE_*`
//! environment variables.

mod commands;
mod config;
mod operator;

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{Args, Parser, Subcommand};
use marquee_store_sqlite::SqliteStore;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::config::CliConfig;

#[derive(Parser)]
#[command(name = "marquee", author, version, about = "Cinema scheduling and ticketing")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "marquee.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Manage the movie catalogue.
  #[command(subcommand)]
  Movie(MovieCommand),

  /// Reconcile a movie's showings in one hall against a rule.
  #[command(subcommand)]
  Schedule(ScheduleCommand),

  /// List a movie's showings in a hall.
  Showings { movie_id: i64, hall: String },

  /// Delete one showing together with its tickets.
  DeleteShowing {
    showing_id: i64,
    /// Answer yes to the confirmation.
    #[arg(short, long)]
    yes:        bool,
  },

  /// Show reserved and available seats for a showing.
  Seats { showing_id: i64 },

  /// Buy a ticket for one or more seats.
  Purchase(PurchaseArgs),

  /// Cancel an unused ticket and free its seats.
  Cancel { uuid: Uuid },

  /// Gate check: mark a ticket as used.
  Admit { uuid: Uuid },

  /// List tickets bought under a name.
  Tickets { name: String },
}

#[derive(Subcommand)]
enum MovieCommand {
  Add {
    title:       String,
    /// Runtime in minutes.
    #[arg(long)]
    duration:    i64,
    /// Default ticket price.
    #[arg(long)]
    price:       i64,
    #[arg(long)]
    description: Option<String>,
  },
  /// Change a movie's details; omitted flags keep their current value.
  Edit {
    movie_id:    i64,
    #[arg(long)]
    title:       Option<String>,
    /// Runtime in minutes.
    #[arg(long)]
    duration:    Option<i64>,
    /// Default ticket price.
    #[arg(long)]
    price:       Option<i64>,
    #[arg(long)]
    description: Option<String>,
  },
  List,
  /// Delete a movie that has no showings.
  Delete { movie_id: i64 },
}

/// The `(movie, hall)` scope a rule owns, plus run options.
#[derive(Args)]
struct ScopeArgs {
  movie_id: i64,
  hall:     String,
  /// Ticket price; the movie's default when omitted.
  #[arg(long)]
  price:    Option<i64>,
  /// Answer yes at every checkpoint.
  #[arg(short, long)]
  yes:      bool,
}

#[derive(Subcommand)]
enum ScheduleCommand {
  /// Exactly one showing.
  Single {
    #[command(flatten)]
    scope: ScopeArgs,
    /// Start instant, `YYYY-MM-DDTHH:MM`.
    #[arg(long)]
    start: String,
  },
  /// Repeat on weekdays every N weeks.
  Weekly {
    #[command(flatten)]
    scope: ScopeArgs,
    #[arg(long)]
    from:  String,
    #[arg(long)]
    until: String,
    #[arg(long, default_value_t = 1)]
    every: u32,
    /// Weekdays, 0 (Monday) ..= 6 (Sunday).
    #[arg(long = "day", value_delimiter = ',')]
    days:  Vec<u8>,
    /// Start times for every `--day`, `HH:MM`.
    #[arg(long = "time", value_delimiter = ',')]
    times: Vec<String>,
    /// Extra start time for a single weekday, `DAY=HH:MM`.
    #[arg(long = "slot")]
    slots: Vec<String>,
  },
  /// Repeat on one day of the month every N months.
  Monthly {
    #[command(flatten)]
    scope:        ScopeArgs,
    #[arg(long)]
    from:         String,
    #[arg(long)]
    until:        String,
    #[arg(long, default_value_t = 1)]
    every:        u32,
    #[arg(long)]
    day_of_month: u32,
    #[arg(long)]
    time:         String,
  },
}

#[derive(Args)]
struct PurchaseArgs {
  showing_id: i64,
  /// Seats such as `A-1`, comma separated or repeated.
  #[arg(long = "seat", value_delimiter = ',', required = true)]
  seats:      Vec<String>,
  /// Seat category counts, `NAME=COUNT`; they must add up to the seats.
  #[arg(long = "category")]
  categories: Vec<String>,
  /// Total price charged.
  #[arg(long)]
  total:      i64,
  #[arg(long)]
  name:       Option<String>,
  #[arg(long)]
  age:        Option<u32>,
  #[arg(long)]
  sex:        Option<String>,
  #[arg(long)]
  member:     bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = CliConfig::load(&cli.config)?;

  let store = SqliteStore::open(&cfg.store_path)
    .await
    .with_context(|| format!("failed to open store at {:?}", cfg.store_path))?;

  match cli.command {
    Command::Movie(cmd) => match cmd {
      MovieCommand::Add { title, duration, price, description } => {
        commands::add_movie(&store, title, duration, price, description).await
      }
      MovieCommand::Edit { movie_id, title, duration, price, description } => {
        let edit = commands::MovieEdit {
          title,
          duration_min: duration,
          default_price: price,
          description,
        };
        commands::edit_movie(&store, movie_id, edit).await
      }
      MovieCommand::List => commands::list_movies(&store).await,
      MovieCommand::Delete { movie_id } => commands::delete_movie(&store, movie_id).await,
    },
    Command::Schedule(cmd) => {
      let (scope, pattern) = match cmd {
        ScheduleCommand::Single { scope, start } => {
          (scope, commands::single_pattern(&start)?)
        }
        ScheduleCommand::Weekly { scope, from, until, every, days, times, slots } => {
          let pattern = commands::weekly_pattern(&from, &until, every, &days, &times, &slots)?;
          (scope, pattern)
        }
        ScheduleCommand::Monthly { scope, from, until, every, day_of_month, time } => {
          let pattern =
            commands::monthly_pattern(&from, &until, every, day_of_month, &time)?;
          (scope, pattern)
        }
      };
      let rule = marquee_core::rule::ScheduleRule {
        movie_id: scope.movie_id,
        hall: scope.hall,
        price: scope.price,
        pattern,
      };
      commands::schedule(&store, &rule, scope.yes).await
    }
    Command::Showings { movie_id, hall } => commands::showings(&store, movie_id, &hall).await,
    Command::DeleteShowing { showing_id, yes } => {
      commands::delete_showing(&store, showing_id, yes).await
    }
    Command::Seats { showing_id } => commands::seats(&store, &cfg, showing_id).await,
    Command::Purchase(args) => commands::purchase(&store, &cfg, args).await,
    Command::Cancel { uuid } => commands::cancel(&store, uuid).await,
    Command::Admit { uuid } => commands::admit(&store, uuid).await,
    Command::Tickets { name } => commands::tickets(&store, &name).await,
  }
}
