mod demo;

use std::env;

use payveil_config::PayveilConfig;

#[tokio::main]
async fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        print_usage();
        return;
    }

    let cmd = &args[1];

    match cmd.as_str() {
        "demo" => {
            let config = match parse_demo_args(&args[2..]) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            };
            if let Err(e) = demo::run_demo(config).await {
                eprintln!("❌ Error running demo: {e:#}");
                std::process::exit(1);
            }
        }
        "batch" => {
            let config = match parse_batch_args(&args[2..]) {
                Ok(config) => config,
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            };
            if let Err(e) = demo::run_batch(config).await {
                eprintln!("❌ Error running batch comparison: {e:#}");
                std::process::exit(1);
            }
        }
        "config" => match args.get(2).map(String::as_str) {
            Some("--sample") | None => print!("{}", PayveilConfig::generate_sample()),
            Some("--show") => match PayveilConfig::load() {
                Ok(config) => println!("{config:#?}"),
                Err(e) => {
                    eprintln!("❌ Error loading config: {e:#}");
                    std::process::exit(1);
                }
            },
            Some("--path") => match PayveilConfig::default_config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("(no home directory)"),
            },
            Some(other) => {
                println!("❌ Unknown config option: {other}");
                std::process::exit(1);
            }
        },
        "help" | "--help" | "-h" => {
            print_usage();
        }
        _ => {
            println!("❌ Unknown command: {}", cmd);
            println!();
            print_usage();
            std::process::exit(1);
        }
    }
}

fn print_usage() {
    println!("Payveil CLI - Confidential Salary Comparison");
    println!();
    println!("USAGE:");
    println!("  payveil <command> [args]");
    println!();
    println!("COMMANDS:");
    println!("  demo [alice] [bob] [--json]    Two users submit and compare on a dev network");
    println!("  batch <own> <peer>... [--json] Compare against several users at once");
    println!("  config [--sample|--show|--path]");
    println!("                                 Print a sample config, the loaded config or its path");
    println!("  help                           Show this help message");
    println!();
    println!("EXAMPLES:");
    println!("  payveil demo                   # alice=60000, bob=50000");
    println!("  payveil demo 45000 52000       # custom salaries");
    println!("  payveil batch 70000 50000 90000");
    println!("  payveil config > payveil.toml");
    println!();
    println!("ENVIRONMENT VARIABLES:");
    println!("  PV_CONFIG              Path to payveil.toml");
    println!("  PV_CHAIN_ID            Chain id of the dev network");
    println!("  PV_AUTH_DURATION_SECS  Validity of new decryption authorizations");
    println!("  PV_AUTH_STORE          memory | rocksdb");
    println!("  PV_AUTH_STORE_PATH     Directory for the rocksdb store");
    println!("  RUST_LOG               Log level (debug/info/warn/error)");
}

fn parse_value(arg: &str) -> Result<u64, String> {
    arg.replace('_', "")
        .parse()
        .map_err(|_| format!("Salary must be a whole number, got '{arg}'"))
}

fn parse_demo_args(args: &[String]) -> Result<demo::DemoConfig, String> {
    let mut config = demo::DemoConfig::default();
    let mut positional = Vec::new();

    for arg in args {
        match arg.as_str() {
            "--json" => config.json = true,
            other => positional.push(parse_value(other)?),
        }
    }

    match positional.as_slice() {
        [] => {}
        [alice] => config.alice_value = *alice,
        [alice, bob] => {
            config.alice_value = *alice;
            config.bob_value = *bob;
        }
        _ => return Err("Usage: demo [alice] [bob] [--json]".into()),
    }

    Ok(config)
}

fn parse_batch_args(args: &[String]) -> Result<demo::BatchConfig, String> {
    let mut config = demo::BatchConfig::default();

    for arg in args {
        match arg.as_str() {
            "--json" => config.json = true,
            other => config.values.push(parse_value(other)?),
        }
    }

    if config.values.len() < 2 {
        return Err("Usage: batch <own> <peer>... [--json]".into());
    }

    Ok(config)
}
