use std::io::{self, Write};

use anyhow::Context;
use relkv_core::{Order, ScanOptions, Store, StoreConfig, Value};
use tracing::info;

fn config_from_env() -> anyhow::Result<StoreConfig> {
    let namespace = std::env::var("RELKV_NAMESPACE").unwrap_or_else(|_| "relkv".to_string());
    let mut config = StoreConfig::new(namespace);
    if let Ok(host) = std::env::var("RELKV_HOST") {
        config = config.host(host);
    }
    if let Ok(port) = std::env::var("RELKV_PORT") {
        config = config.port(port.parse().context("RELKV_PORT must be a port number")?);
    }
    if let Ok(user) = std::env::var("RELKV_USER") {
        config = config.user(user);
    }
    if let Ok(password) = std::env::var("RELKV_PASSWORD") {
        config = config.password(password);
    }
    Ok(config)
}

fn parse_value(token: &str) -> anyhow::Result<Value> {
    // JSON literals first (numbers, booleans, objects); bare words are text.
    match serde_json::from_str(token) {
        Ok(json) => Ok(Value::from_json(json)?),
        Err(_) => Ok(Value::Text(token.to_string())),
    }
}

fn run(store: &mut Store, parts: &[&str]) -> anyhow::Result<()> {
    match parts {
        ["put", table, key, value] => {
            store.put(table, key, parse_value(value)?, None)?;
            println!("ok");
        }
        ["put", table, key, value, group] => {
            store.put(table, key, parse_value(value)?, Some(group))?;
            println!("ok");
        }
        ["get", table, key] => match store.get(table, key, None)? {
            Some(value) => println!("{value}"),
            None => println!("(null)"),
        },
        ["get", table, key, group] => match store.get(table, key, Some(group))? {
            Some(value) => println!("{value}"),
            None => println!("(null)"),
        },
        ["scan", table, start, stop] => {
            let options = ScanOptions::new().from_key(*start).to_key(*stop).order(Order::Ascending);
            for entry in store.scan(table, None, options)? {
                match entry.value {
                    Some(value) => println!("{}\t{}", entry.key, value),
                    None => println!("{}\t(null)", entry.key),
                }
            }
        }
        ["delete", table, key] => {
            store.delete(table, key)?;
            println!("ok");
        }
        ["exists", table, key] => {
            println!("{}", store.exists(table, key, None)?);
        }
        ["begin"] => {
            store.begin_transaction()?;
            println!("transaction started");
        }
        ["commit"] => {
            store.commit_transaction()?;
            println!("transaction committed");
        }
        ["rollback"] => {
            store.rollback_transaction()?;
            println!("transaction rolled back");
        }
        _ => {
            println!("Commands:");
            println!("  put <table> <key> <value> [group]");
            println!("  get <table> <key> [group]");
            println!("  scan <table> <start> <stop>");
            println!("  delete <table> <key>");
            println!("  exists <table> <key>");
            println!("  begin | commit | rollback");
            println!("  exit|quit");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = config_from_env()?;
    info!(host = %config.host, namespace = %config.namespace, "connecting");
    let mut store = Store::connect(config).context("could not open store")?;

    println!("relkv_cli (type 'help' or 'exit')");

    loop {
        print!("kv> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            println!("Failed to read input");
            continue;
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit") {
            break;
        }

        let parts: Vec<&str> = input.split_whitespace().collect();
        if let Err(err) = run(&mut store, &parts) {
            println!("{err}");
        }
    }
    Ok(())
}
