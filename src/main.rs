use anyhow::Result;
use std::path::PathBuf;

use crowdpix::config::Config;
use crowdpix::db::Database;
use crowdpix::logging;

struct Args {
    config_path: Option<PathBuf>,
    command: Vec<String>,
}

fn parse_args() -> Args {
    let args: Vec<String> = std::env::args().collect();
    let mut config_path = None;
    let mut command = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                print_help();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("crowdpix {}", env!("CARGO_PKG_VERSION"));
                std::process::exit(0);
            }
            "--config" | "-c" => {
                if i + 1 < args.len() {
                    config_path = Some(PathBuf::from(&args[i + 1]));
                    i += 1;
                } else {
                    eprintln!("Error: --config requires a path argument");
                    std::process::exit(1);
                }
            }
            other => command.push(other.to_string()),
        }
        i += 1;
    }

    Args {
        config_path,
        command,
    }
}

fn print_help() {
    println!(
        r#"crowdpix - event photo sharing admin tool

USAGE:
    crowdpix [OPTIONS] <COMMAND>

COMMANDS:
    init <identity> <name>                  Create the database and bootstrap the first admin
    signup <identity> <name> [email]        Run the signup hook for an identity
    grant-role <admin> <identity> <role>    Change a profile's role (as <admin>)
    events [identity]                       List events visible to <identity> (or anonymously)
    log <identity> [limit]                  Show the activity log visible to <identity>

OPTIONS:
    --config, -c PATH   Path to config file
    --version, -V       Show version
    --help, -h          Show this help message

ENVIRONMENT:
    CROWDPIX_LOG        Log level (trace, debug, info, warn, error)

Config file location: $XDG_CONFIG_HOME/crowdpix/config.toml"#
    );
}

fn run(db: &Database, command: &[String]) -> Result<()> {
    match command {
        [cmd, identity, name] if cmd == "init" => {
            if db.bootstrap_admin(identity, name)? {
                println!("bootstrapped admin '{}'", identity);
            } else {
                println!("an admin already exists; nothing to do");
            }
        }
        [cmd, identity, name, rest @ ..] if cmd == "signup" => {
            let email = rest.first().map(String::as_str);
            if db.ensure_profile(identity, name, email)? {
                println!("created profile '{}'", identity);
            } else {
                println!("profile '{}' already exists", identity);
            }
        }
        [cmd, admin, identity, role] if cmd == "grant-role" => {
            let caller = db.caller(Some(admin))?;
            let role = role.parse()?;
            if db.set_role(&caller, identity, role)? {
                println!("role updated");
            } else {
                println!("denied or no such profile");
            }
        }
        [cmd, rest @ ..] if cmd == "events" => {
            let caller = db.caller(rest.first().map(String::as_str))?;
            for event in db.list_events(&caller)? {
                println!(
                    "{:>4}  {:<8}  {}",
                    event.id,
                    event.visibility.as_str(),
                    event.name
                );
            }
        }
        [cmd, identity, rest @ ..] if cmd == "log" => {
            let limit = rest
                .first()
                .and_then(|s| s.parse().ok())
                .unwrap_or(50usize);
            let caller = db.caller(Some(identity))?;
            for entry in db.list_activity(&caller, limit)? {
                println!(
                    "{}  {:<24}  {:<10}  {}",
                    entry.created_at,
                    entry.kind.as_str(),
                    entry.actor.as_deref().unwrap_or("-"),
                    entry.description
                );
            }
        }
        _ => {
            print_help();
            std::process::exit(1);
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = parse_args();

    // Initialize logging (uses journald on Linux, file fallback otherwise)
    let _ = logging::init(&Config::config_dir().join("logs"));

    // Load configuration
    let config = match &args.config_path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    // Initialize database
    let db = Database::open(&config.db_path, config.access)?;
    db.initialize()?;

    run(&db, &args.command)
}
