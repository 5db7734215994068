//! EmberKV - An In-Memory Key-Value Server
//!
//! The binary entry point: parses arguments, sets up logging and process
//! plumbing (signals, fd limit), builds the server, and runs it until a
//! stop signal arrives.

use anyhow::Context;
use emberkv::persistence::FsyncPolicy;
use emberkv::server::{install_signal_handlers, raise_fd_limit, Config, Server};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

fn print_help() {
    println!(
        r#"
EmberKV - An In-Memory Key-Value Server

USAGE:
    emberkv [PORT] [OPTIONS]

ARGS:
    PORT                     TCP port to listen on (default: 6379)

OPTIONS:
    --host <HOST>            IPv4 address to bind (default: 0.0.0.0)
    --aof-file <PATH>        Append-log path (default: emberkv.aof)
    --fsync <POLICY>         always | everysec | no (default: everysec)
    --no-aof                 Disable persistence
    -v, --version            Print version information
        --help               Print this help message

EXAMPLES:
    emberkv                        # 0.0.0.0:6379, log in ./emberkv.aof
    emberkv 6380                   # alternate port
    emberkv --fsync always         # fsync after every write command

CONNECTING:
    Use redis-cli or any compatible client:
    $ redis-cli -p 6379
    127.0.0.1:6379> SET name ember
    OK
"#
    );
}

fn parse_args() -> anyhow::Result<Config> {
    let mut config = Config::default();
    let args: Vec<String> = std::env::args().collect();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--host" => {
                i += 1;
                let host = args.get(i).context("--host requires a value")?;
                config.host = host
                    .parse::<Ipv4Addr>()
                    .with_context(|| format!("invalid host '{host}'"))?;
            }
            "--aof-file" => {
                i += 1;
                let path = args.get(i).context("--aof-file requires a value")?;
                config.aof_path = Some(PathBuf::from(path));
            }
            "--fsync" => {
                i += 1;
                let policy = args.get(i).context("--fsync requires a value")?;
                config.fsync = FsyncPolicy::parse(policy)
                    .with_context(|| format!("invalid fsync policy '{policy}'"))?;
            }
            "--no-aof" => {
                config.aof_path = None;
            }
            "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-v" => {
                println!("EmberKV version {}", emberkv::VERSION);
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                config.port = arg
                    .parse()
                    .with_context(|| format!("invalid port '{arg}'"))?;
            }
            arg => {
                print_help();
                anyhow::bail!("unknown argument: {arg}");
            }
        }
        i += 1;
    }

    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let config = parse_args()?;

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    install_signal_handlers();
    raise_fd_limit();

    info!(
        version = emberkv::VERSION,
        host = %config.host,
        port = config.port,
        persistence = config.aof_path.is_some(),
        "starting EmberKV"
    );

    let mut server = Server::new(&config).context("startup failed")?;
    server.run();
    Ok(())
}
