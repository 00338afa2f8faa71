use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use contracts::Money;
use divvy_api::{serve, EngineApi};

fn print_usage() {
    println!("divvy-cli <command>");
    println!("commands:");
    println!("  serve [addr] [sqlite_path]");
    println!("    default addr: 127.0.0.1:8080");
    println!("  sweep [sqlite_path]");
    println!("    expires overdue games and deletes them from the store");
    println!("  demo [sqlite_path]");
    println!("    seeds a sample game and walks it to resolution");
}

fn parse_socket_addr(value: Option<&String>) -> Result<SocketAddr, String> {
    let raw = value.map(String::as_str).unwrap_or("127.0.0.1:8080");
    raw.parse::<SocketAddr>()
        .map_err(|_| format!("invalid addr: {raw}"))
}

fn default_sqlite_path() -> String {
    std::env::var("DIVVY_SQLITE_PATH")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| "divvy_games.sqlite".to_string())
}

fn parse_sqlite_path(value: Option<&String>) -> String {
    value
        .map(String::to_string)
        .filter(|path| !path.trim().is_empty())
        .unwrap_or_else(default_sqlite_path)
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}

fn open_api(sqlite_path: &str) -> Result<EngineApi, String> {
    let mut api = EngineApi::new();
    api.attach_sqlite_store(PathBuf::from(sqlite_path))
        .map_err(|err| format!("failed to attach sqlite store: {err}"))?;
    let restored = api
        .restore_from_store()
        .map_err(|err| format!("failed to restore games: {err}"))?;
    println!("restored {restored} game(s) from {sqlite_path}");
    Ok(api)
}

fn run_sweep(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let mut api = open_api(&sqlite_path)?;
    let removed = api.sweep_expired(now_ms());
    println!("swept {removed} expired game(s)");
    Ok(())
}

/// Seed a two-item game and walk it through claim, redistribution,
/// confirmation, and resolution. Handy for poking at a fresh database.
fn run_demo(args: &[String]) -> Result<(), String> {
    let sqlite_path = parse_sqlite_path(args.get(2));
    let mut api = open_api(&sqlite_path)?;
    let now = now_ms();

    let game_id = api
        .create_game("demo flat split".to_string(), Money::from_major(100), now)
        .map_err(|err| format!("create failed: {err}"))?;
    let key = game_id.to_string();

    api.add_item(&key, "couch".to_string(), None, Money::from_major(40), now)
        .map_err(|err| format!("add_item failed: {err}"))?;
    api.add_item(&key, "table".to_string(), None, Money::from_major(60), now)
        .map_err(|err| format!("add_item failed: {err}"))?;
    let ana = api
        .join_game(&key, "ana".to_string(), None, true, now)
        .map_err(|err| format!("join failed: {err}"))?;
    let ben = api
        .join_game(&key, "ben".to_string(), None, false, now)
        .map_err(|err| format!("join failed: {err}"))?;

    api.propose_price(&key, 2, ben.id, Money::from_major(60), now + 1)
        .map_err(|err| format!("propose failed: {err}"))?;
    let outcome = api
        .propose_price(&key, 1, ana.id, Money::from_major(40), now + 2)
        .map_err(|err| format!("propose failed: {err}"))?;

    let state = api
        .view_game(&key, now + 3)
        .map_err(|err| format!("view failed: {err}"))?;
    println!(
        "demo game_id={} token={} status={} resolved={}",
        game_id,
        state.game().unique_id,
        state.game().status,
        outcome.resolved
    );
    for item in state.items() {
        println!("  item {} '{}' price={}", item.id, item.title, item.current_price);
    }
    println!("  sqlite={sqlite_path}");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str);

    match command {
        Some("serve") => match parse_socket_addr(args.get(2)) {
            Ok(addr) => {
                let sqlite_path = args
                    .get(3)
                    .map(String::to_string)
                    .filter(|path| !path.trim().is_empty());
                println!("serving api on http://{addr}");
                if let Err(err) = serve(addr, sqlite_path).await {
                    eprintln!("server error: {err}");
                    std::process::exit(1);
                }
            }
            Err(err) => {
                eprintln!("error: {}", err);
                print_usage();
                std::process::exit(2);
            }
        },
        Some("sweep") => {
            if let Err(err) = run_sweep(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        Some("demo") => {
            if let Err(err) = run_demo(&args) {
                eprintln!("error: {err}");
                print_usage();
                std::process::exit(2);
            }
        }
        _ => {
            print_usage();
        }
    }
}
