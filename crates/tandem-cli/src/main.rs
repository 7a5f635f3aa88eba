//! # Tandem CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Start the server (flags override TANDEM_* environment variables)
//! tandem serve -b 127.0.0.1:8787 --debug --secret change-me
//!
//! # Make an RPC call (outputs raw JSON)
//! tandem call http://127.0.0.1:8787/api/rpc hello -a '[{"message": "World"}]'
//! ```
//!
//! ## URL Format
//!
//! URLs must include the `http://` or `https://` prefix.

use anyhow::Result;
use argh::FromArgs;
use tandem_cli::{apply_overrides, call, parse_call_args, ServeOverrides};
use tandem_server::{HttpServer, ServerConfig};

#[derive(FromArgs)]
/// Tandem - typed RPC between a client and a server
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
}

/// Arguments for running the server.
///
/// Every flag is optional; unset flags fall back to the `TANDEM_*`
/// environment variables, then to the defaults.
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// run the Tandem HTTP server
struct ServeArgs {
    /// address to bind the HTTP server to (default 127.0.0.1:8787)
    #[argh(option, short = 'b')]
    bind: Option<String>,

    /// include internal error details in error responses
    #[argh(switch)]
    debug: bool,

    /// secret used to sign session tokens
    #[argh(option)]
    secret: Option<String>,

    /// path of the RPC endpoint (default /api/rpc)
    #[argh(option, long = "rpc-path")]
    rpc_path: Option<String>,
}

/// Arguments for making a single RPC call.
///
/// Outputs raw JSON (no pretty-printing) to stdout. Errors are reported
/// to stderr with a non-zero exit code.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call an RPC method on a server
struct CallArgs {
    /// full URL of the RPC endpoint
    #[argh(positional)]
    url: String,

    /// name of the RPC method to call
    #[argh(positional)]
    method: String,

    /// JSON arguments: an array of positional parameters, or a single value
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Keep `call` output clean for piping.
    if !matches!(cli.command, Commands::Call(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => run_call(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let config = apply_overrides(
        ServerConfig::from_env()?,
        ServeOverrides {
            bind: args.bind,
            debug: args.debug,
            secret: args.secret,
            rpc_path: args.rpc_path,
        },
    )?;

    tracing::info!("Starting Tandem server on {}", config.bind);
    if config.debug {
        tracing::warn!("Debug mode enabled: internal error details are sent to clients");
    }

    let addr = config.bind;
    HttpServer::from_config(config).run(addr).await?;
    Ok(())
}

async fn run_call(args: CallArgs) -> Result<()> {
    let params = parse_call_args(&args.args)?;
    let result = call(&args.url, &args.method, params).await?;

    println!("{}", serde_json::to_string(&result)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_serve_defaults() {
        let args: Cli = Cli::from_args(&["tandem"], &["serve"]).unwrap();
        match args.command {
            Commands::Serve(ServeArgs { bind, debug, secret, rpc_path }) => {
                assert!(bind.is_none());
                assert!(!debug);
                assert!(secret.is_none());
                assert!(rpc_path.is_none());
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_serve_flags() {
        let args: Cli = Cli::from_args(
            &["tandem"],
            &["serve", "-b", "0.0.0.0:9000", "--debug", "--secret", "s", "--rpc-path", "/rpc"],
        )
        .unwrap();
        match args.command {
            Commands::Serve(ServeArgs { bind, debug, secret, rpc_path }) => {
                assert_eq!(bind.as_deref(), Some("0.0.0.0:9000"));
                assert!(debug);
                assert_eq!(secret.as_deref(), Some("s"));
                assert_eq!(rpc_path.as_deref(), Some("/rpc"));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_cli_parse_call() {
        let args: Cli = Cli::from_args(
            &["tandem"],
            &["call", "http://127.0.0.1:8787/api/rpc", "hello", "-a", "[{\"message\": \"World\"}]"],
        )
        .unwrap();
        match args.command {
            Commands::Call(CallArgs { url, method, args }) => {
                assert_eq!(url, "http://127.0.0.1:8787/api/rpc");
                assert_eq!(method, "hello");
                assert_eq!(args, "[{\"message\": \"World\"}]");
            }
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_parse_call_default_args() {
        let args: Cli = Cli::from_args(&["tandem"], &["call", "http://x/api/rpc", "signout"]).unwrap();
        match args.command {
            Commands::Call(CallArgs { args, .. }) => assert_eq!(args, "[]"),
            _ => panic!("Expected Call command"),
        }
    }

    #[test]
    fn test_cli_rejects_missing_method() {
        assert!(Cli::from_args(&["tandem"], &["call", "http://x/api/rpc"]).is_err());
    }
}
