//! raidstore - erasure-coded object store command line
//!
//! Node availability is process-local, so the fault flags on `get` only
//! affect that one invocation. Damage flags found by a read are persisted.

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use raidstore::config::DEFAULT_MAX_FRAME_LEN;
use raidstore::node::NodeServer;
use raidstore::{ObjectStore, StoreConfig};
use std::path::Path;

fn main() -> Result<()> {
    env_logger::Builder::from_default_env()
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let matches = Command::new("raidstore")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Erasure-coded object store with two-row Reed-Solomon parity")
        .arg_required_else_help(true)
        .arg(
            Arg::new("root")
                .short('r')
                .long("root")
                .help("Store directory (default: /tmp/raidstore)")
                .value_name("DIR")
                .global(true),
        )
        .arg(
            Arg::new("nodes")
                .short('n')
                .long("nodes")
                .help("Number of nodes for a new store (default: 5)")
                .value_name("COUNT")
                .global(true),
        )
        .arg(
            Arg::new("backend")
                .short('b')
                .long("backend")
                .help("Node backend: local, memory or remote")
                .value_name("KIND")
                .global(true),
        )
        .arg(
            Arg::new("seed")
                .long("seed")
                .help("Seed for parity placement and fault selection")
                .value_name("SEED")
                .global(true),
        )
        .subcommand(
            Command::new("put")
                .about("Store a file under a key")
                .arg(Arg::new("key").required(true).index(1))
                .arg(Arg::new("file").required(true).index(2)),
        )
        .subcommand(
            Command::new("get")
                .about("Read a key into a file, optionally injecting faults first")
                .arg(Arg::new("key").required(true).index(1))
                .arg(Arg::new("output").required(true).index(2))
                .arg(
                    Arg::new("crash_data")
                        .long("crash-data")
                        .help("Crash this many data nodes before reading")
                        .value_name("COUNT"),
                )
                .arg(
                    Arg::new("crash_parity")
                        .long("crash-parity")
                        .help("Crash this many parity nodes before reading")
                        .value_name("COUNT"),
                )
                .arg(
                    Arg::new("corrupt_data")
                        .long("corrupt-data")
                        .help("Scramble one data row before reading")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("corrupt_parity")
                        .long("corrupt-parity")
                        .help("Scramble one parity row before reading")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("repair").about("Rewrite rows of objects flagged as damaged"))
        .subcommand(
            Command::new("status")
                .about("Show object placement and damage flags")
                .arg(Arg::new("key").index(1)),
        )
        .subcommand(
            Command::new("serve")
                .about("Serve a node directory over TCP")
                .arg(Arg::new("dir").required(true).index(1))
                .arg(
                    Arg::new("addr")
                        .long("addr")
                        .help("Listen address")
                        .value_name("ADDR")
                        .default_value("127.0.0.1:7070"),
                )
                .arg(
                    Arg::new("max_frame")
                        .long("max-frame")
                        .help("Largest accepted frame in bytes")
                        .value_name("BYTES"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        Some(("serve", sub_matches)) => handle_serve(sub_matches),
        Some((name, sub_matches)) => {
            let config = StoreConfig::from_args(&matches).context("Invalid store options")?;
            let mut store = ObjectStore::open(config).context("Failed to open store")?;
            let result = match name {
                "put" => handle_put(&mut store, sub_matches),
                "get" => handle_get(&mut store, sub_matches),
                "repair" => handle_repair(&mut store),
                "status" => handle_status(&store, sub_matches),
                other => Err(anyhow::anyhow!("Unknown command {}", other)),
            };
            let closed = store.close().context("Failed to close store");
            command_outcome(result, closed)
        }
        None => {
            eprintln!("No subcommand given, see --help");
            std::process::exit(1);
        }
    }
}

/// The command's own failure takes precedence; a close failure behind it is logged
fn command_outcome(result: Result<()>, closed: Result<()>) -> Result<()> {
    if let (Err(_), Err(close_error)) = (&result, &closed) {
        log::error!("{:#}", close_error);
    }
    result.and(closed)
}

fn required<'a>(matches: &'a clap::ArgMatches, name: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(name)
        .map(String::as_str)
        .with_context(|| format!("Missing argument {}", name))
}

fn count_arg(matches: &clap::ArgMatches, name: &str) -> Result<usize> {
    match matches.get_one::<String>(name) {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid count for --{}: {}", name.replace('_', "-"), value)),
        None => Ok(0),
    }
}

fn handle_put(store: &mut ObjectStore, matches: &clap::ArgMatches) -> Result<()> {
    let key = required(matches, "key")?;
    let file = required(matches, "file")?;

    store
        .write_from_path(key, Path::new(file))
        .with_context(|| format!("Failed to store {} as {:?}", file, key))?;
    println!("Stored {:?} ({} bytes)", key, store.object(key).map_or(0, |o| o.size));
    Ok(())
}

fn handle_get(store: &mut ObjectStore, matches: &clap::ArgMatches) -> Result<()> {
    let key = required(matches, "key")?;
    let output = required(matches, "output")?;

    let crash_data = count_arg(matches, "crash_data")?;
    if crash_data > 0 {
        let nodes = store.crash_data_nodes(key, crash_data)?;
        println!("Crashed data nodes {:?}", nodes);
    }
    let crash_parity = count_arg(matches, "crash_parity")?;
    if crash_parity > 0 {
        let nodes = store.crash_parity_nodes(key, crash_parity)?;
        println!("Crashed parity nodes {:?}", nodes);
    }
    if matches.get_flag("corrupt_data") {
        println!("Corrupted data node {}", store.corrupt_data_node(key)?);
    }
    if matches.get_flag("corrupt_parity") {
        println!("Corrupted parity node {}", store.corrupt_parity_node(key)?);
    }

    let outcome = store
        .read_with_report(key)
        .with_context(|| format!("Failed to read {:?}", key))?;
    std::fs::write(output, &outcome.content)
        .with_context(|| format!("Failed to write {}", output))?;

    println!("Read {:?} ({} bytes) into {}", key, outcome.content.len(), output);
    if outcome.reconstructed {
        println!("  Rebuilt from erased rows {:?}", outcome.erased_rows);
    }
    if outcome.damage.needs_repair() {
        println!("  Detected {} damage, run `raidstore repair`", outcome.damage);
    }
    Ok(())
}

fn handle_repair(store: &mut ObjectStore) -> Result<()> {
    let report = store
        .recover_corrupted_data()
        .context("Repair failed")?;

    if report.is_empty() {
        println!("Nothing to repair");
        return Ok(());
    }
    for key in &report.data_repaired {
        println!("Repaired data row of {:?}", key);
    }
    for key in &report.parity_repaired {
        println!("Repaired parity of {:?}", key);
    }
    Ok(())
}

fn handle_status(store: &ObjectStore, matches: &clap::ArgMatches) -> Result<()> {
    let keys: Vec<String> = match matches.get_one::<String>("key") {
        Some(key) => vec![key.clone()],
        None => store.keys().map(str::to_string).collect(),
    };

    println!(
        "{} nodes ({} data + 2 parity per object), {} keys",
        store.node_count(),
        store.data_count(),
        store.metadata().keys.len()
    );
    for key in keys {
        let object = store
            .object(&key)
            .with_context(|| format!("Key {:?} not found", key))?;
        println!(
            "{:<24} {:>10} bytes  data {:?}  parity {:?}  damage {}",
            key, object.size, object.data_nodes, object.parity_nodes, object.error
        );
    }
    Ok(())
}

fn handle_serve(matches: &clap::ArgMatches) -> Result<()> {
    let dir = required(matches, "dir")?;
    let addr = required(matches, "addr")?;
    let max_frame_len = match matches.get_one::<String>("max_frame") {
        Some(value) => value
            .parse()
            .with_context(|| format!("Invalid frame size: {}", value))?,
        None => DEFAULT_MAX_FRAME_LEN,
    };

    let server = NodeServer::bind(addr, dir, max_frame_len)
        .with_context(|| format!("Failed to bind {}", addr))?;
    println!("Serving {} on {}", dir, server.local_addr());
    server.serve()?;
    Ok(())
}
