//! CLI command definitions

use crate::server::protocol::Request;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Request sent by `scorehive client`
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RequestKind {
    /// Print the stored answer keys
    GetAnswers,
    /// Replace answer keys (data: JSON list of answer sets)
    SetAnswers,
    /// Grade exams (data: JSON list of student exams)
    Review,
    /// Echo the data back
    Echo,
    /// Stop the coordinator and its workers
    Shutdown,
}

impl RequestKind {
    pub fn into_request(self, data: String) -> Request {
        match self {
            RequestKind::GetAnswers => Request::GetAnswers,
            RequestKind::SetAnswers => Request::SetAnswers(data),
            RequestKind::Review => Request::Review(data),
            RequestKind::Echo => Request::Echo(data),
            RequestKind::Shutdown => Request::Shutdown,
        }
    }
}

/// CLI arguments for scorehive
#[derive(Parser, Debug)]
#[command(name = "scorehive")]
#[command(author, version, about = "Distributed exam grading service")]
#[command(long_about = r#"
ScoreHive grades multiple-choice exams across a pool of worker processes.

The coordinator accepts client requests over TCP, slices each review batch
across the workers and returns the scores. Without a subcommand the
coordinator is started.

Configuration files are loaded from (in priority order):
1. --config <path>                      Explicit config file
2. SCOREHIVE_* environment variables    e.g. SCOREHIVE_SERVER__PORT=9000
3. ./scorehive.toml                     Project-level config
4. ~/.config/scorehive/config.toml      Global config

Example:
  scorehive serve --port 8080 --workers 4
  scorehive client 127.0.0.1:8080 set-answers @answers.json
  scorehive client 127.0.0.1:8080 review @exams.json
  scorehive client 127.0.0.1:8080 shutdown
"#)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Verbosity level (-v = info, -vv = debug, -vvv = trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Disable loading of configuration files
    #[arg(long, global = true)]
    pub no_config: bool,

    /// Show configuration file locations and exit
    #[arg(long)]
    pub show_config: bool,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the coordinator: client server plus worker pool
    Serve {
        /// Port for client connections (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,

        /// Number of workers (overrides cluster.workers)
        #[arg(short, long)]
        workers: Option<u32>,

        /// Run workers as tasks inside this process
        #[arg(long)]
        inline: bool,
    },

    /// Run one worker rank (started by the coordinator)
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        rank: u32,

        /// Ranks in the pool, coordinator included
        #[arg(long)]
        pool_size: u32,
    },

    /// Send one request to a running coordinator
    Client {
        /// Coordinator address (host:port)
        address: String,

        #[arg(value_enum)]
        request: RequestKind,

        /// Request data; `@path` reads it from a file
        data: Option<String>,
    },
}

impl Cli {
    /// The subcommand to run; `serve` with no overrides when omitted
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            port: None,
            workers: None,
            inline: false,
        })
    }
}
