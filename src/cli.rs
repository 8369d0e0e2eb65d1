use std::path::PathBuf;

use clap::Parser;

use crate::config::{ConfigLayer, RunFlags};
use crate::sink::OUTPUT_FORMAT;
use crate::types::ServerMode;

const ENVIRONMENT_HELP: &str = "Environment:
GATHER_SYMBOL, GATHER_USERNAME, GATHER_PASSWORD and GATHER_LOGFILE fill any
value not given on the command line or in the config file. A .env file in
the working directory is loaded into the environment first.";

/// gather - gather candle data
///
/// Logs XTB candles for one symbol, either live as they stream in or as a
/// one-shot dump of recent history.
#[derive(Parser, Debug)]
#[command(
    name = "gather",
    version,
    arg_required_else_help = true,
    after_help = format!("Output Format:\n{OUTPUT_FORMAT}\n\n{ENVIRONMENT_HELP}"),
)]
pub struct Cli {
    /// The symbol, e.g. EURUSD
    #[arg(short = 's', value_name = "symbol")]
    pub symbol: Option<String>,

    /// XTB account user
    #[arg(short = 'u', value_name = "username")]
    pub username: Option<String>,

    /// XTB account password
    #[arg(short = 'p', value_name = "password")]
    pub password: Option<String>,

    /// Config file with USERNAME, PASSWORD, SYMBOL and LOGFILE.
    /// Values still missing afterwards are taken from GATHER_* variables (and .env)
    #[arg(short = 'i', value_name = "config")]
    pub config: Option<PathBuf>,

    /// Fetch history from now back this many seconds instead of streaming
    #[arg(
        short = 't',
        value_name = "seconds",
        default_value_t = 0,
        allow_negative_numbers = true
    )]
    pub seconds: i64,

    /// Connect to the live (real money) server instead of demo
    #[arg(short = 'l')]
    pub live: bool,

    /// Write candles to stdout instead of a log file
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Trace raw request/response JSON
    #[arg(short = 'd')]
    pub debug: bool,

    /// Log file that candles are appended to
    #[arg(value_name = "LOGFILE")]
    pub logfile: Option<String>,
}

impl Cli {
    /// Values given on the command line, as the top-precedence config layer.
    pub fn layer(&self) -> ConfigLayer {
        ConfigLayer::new(
            self.symbol.clone(),
            self.username.clone(),
            self.password.clone(),
            self.logfile.clone(),
        )
    }

    pub fn flags(&self) -> RunFlags {
        RunFlags {
            server: if self.live {
                ServerMode::Live
            } else {
                ServerMode::Demo
            },
            verbose: self.verbose,
            debug: self.debug,
            history_seconds: self.seconds,
        }
    }
}
