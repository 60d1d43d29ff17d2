use clap::{Arg, ArgAction, Command};
use monkey::{Repl, ReplConfig};
use std::env;

fn main() {
    let matches = Command::new("monkey")
        .about("An interactive interpreter for the Monkey programming language")
        .arg(
            Arg::new("prompt")
                .long("prompt")
                .help("Prompt printed before each input line")
                .value_name("TEXT")
                .default_value(">> "),
        )
        .arg(
            Arg::new("no-banner")
                .long("no-banner")
                .help("Do not print the greeting banner")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Log parser and evaluator activity to stderr")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let default_level = if matches.get_flag("verbose") {
        "debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = ReplConfig {
        prompt: matches
            .get_one::<String>("prompt")
            .cloned()
            .unwrap_or_else(|| ReplConfig::default().prompt),
        show_banner: !matches.get_flag("no-banner"),
        user: env::var("USER").or_else(|_| env::var("USERNAME")).ok(),
    };

    if let Err(error) = Repl::new(config).start() {
        eprintln!("Error reading input: {}", error);
        std::process::exit(1);
    }
}
