//! Drive one client-gate navigation against a running traffic gate.

use anyhow::Result;
use clap::Parser;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use zentinel_traffic_gate::config::ClientConfig;
use zentinel_traffic_gate::gate::{FileFlagStorage, HttpVisitorApi};
use zentinel_traffic_gate::{ClientGate, Location};

#[derive(Parser, Debug)]
#[command(name = "gate-probe")]
#[command(author, version, about = "Run a client-gate navigation against a traffic gate")]
struct Args {
    /// Base URL of the traffic gate
    #[arg(short, long, default_value = "http://127.0.0.1:5000")]
    server: String,

    /// Page URL being navigated to
    #[arg(long)]
    href: String,

    /// Directory holding the local blacklist flag
    #[arg(long, default_value = ".gate-probe")]
    flag_dir: PathBuf,

    /// Visitor check timeout in milliseconds
    #[arg(long, default_value_t = 5000)]
    timeout_ms: u64,
}

fn client_config(args: &Args) -> Result<ClientConfig> {
    let config = ClientConfig {
        check_timeout_ms: args.timeout_ms,
        ..Default::default()
    };
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let config = client_config(&args)?;
    let gate = ClientGate::new(
        HttpVisitorApi::new(&args.server),
        Arc::new(FileFlagStorage::new(args.flag_dir.clone())),
        &config,
    );

    let location = Location::parse(&args.href)?;
    let navigation = gate.navigate(&location).await;
    let guard = gate.guard(&location.path);

    let report = json!({
        "location": location.href,
        "navigation": navigation,
        "flag": format!("{:?}", gate.flag()),
        "guard": guard,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<Args, clap::Error> {
        let mut argv = vec!["gate-probe", "--href", "https://site.test/?fbcli=1"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv)
    }

    #[test]
    fn test_flag_dir_argument() {
        let args = parse(&["--flag-dir", "/tmp/gate-flags"]).unwrap();
        assert_eq!(args.flag_dir, PathBuf::from("/tmp/gate-flags"));
        assert_eq!(parse(&[]).unwrap().flag_dir, PathBuf::from(".gate-probe"));
        assert!(parse(&["--flag-file", "/tmp/flag"]).is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let args = parse(&["--timeout-ms", "0"]).unwrap();
        assert!(client_config(&args).is_err());

        let args = parse(&["--timeout-ms", "250"]).unwrap();
        assert_eq!(client_config(&args).unwrap().check_timeout_ms, 250);
    }
}
