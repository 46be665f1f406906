use anyhow::{bail, Context, Result};
use artisan_artifact::CodeBundle;
use artisan_core::{decide, ArtisanConfig, Decision, PRESETS};
use artisan_guard::{evaluate, finalize, post_process, StaticScanner};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

fn cli() -> Command {
    let config_arg = Arg::new("config")
        .long("config")
        .short('c')
        .value_parser(value_parser!(PathBuf))
        .help("TOML configuration file");
    let json_arg = Arg::new("json")
        .long("json")
        .action(ArgAction::SetTrue)
        .help("Output as JSON");
    let surface_arg = |name: &'static str, help: &'static str| {
        Arg::new(name)
            .long(name)
            .value_parser(value_parser!(PathBuf))
            .help(help)
    };

    Command::new("artisan")
        .version(artisan_core::VERSION)
        .about("Scope checks, safe evaluation and security scanning for generated web artifacts")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .subcommand(
            Command::new("scope")
                .about("Decide whether a request fits a self-contained artifact")
                .arg(Arg::new("request").required(true).num_args(1..).help("Request text"))
                .arg(config_arg.clone())
                .arg(json_arg.clone()),
        )
        .subcommand(
            Command::new("eval")
                .about("Evaluate an arithmetic expression with the safe evaluator")
                .arg(Arg::new("expression").required(true).help("Expression, e.g. \"(2+3)*4\"")),
        )
        .subcommand(
            Command::new("scan")
                .about("Post-process and scan a bundle read from files")
                .arg(surface_arg("html", "Markup surface"))
                .arg(surface_arg("css", "Style surface"))
                .arg(surface_arg("js", "Behavior surface"))
                .arg(
                    Arg::new("raw")
                        .long("raw")
                        .action(ArgAction::SetTrue)
                        .help("Scan as written, without evaluator injection or reconciliation"),
                )
                .arg(
                    Arg::new("emit")
                        .long("emit")
                        .value_parser(value_parser!(PathBuf))
                        .help("Write the finalized behavior surface here when the scan is clean"),
                )
                .arg(json_arg.clone()),
        )
        .subcommand(
            Command::new("presets")
                .about("List archetype presets")
                .arg(json_arg),
        )
        .subcommand(
            Command::new("config")
                .about("Print the effective configuration")
                .arg(config_arg),
        )
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("artisan=info,warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(err) = installed {
        eprintln!("tracing already initialised: {err}");
    }
}

fn load_config(args: &ArgMatches) -> Result<ArtisanConfig> {
    match args.get_one::<PathBuf>("config") {
        Some(path) => ArtisanConfig::from_file(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(ArtisanConfig::default()),
    }
}

fn read_surface(args: &ArgMatches, name: &str) -> Result<String> {
    match args.get_one::<PathBuf>(name) {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("reading --{name} {}", path.display())),
        None => Ok(String::new()),
    }
}

fn run_scope(args: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(args)?;
    let text = args
        .get_many::<String>("request")
        .map(|words| words.cloned().collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    let decision = decide(&text, &config.scope);

    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        let m = &decision.metrics;
        println!("Decision: {}", decision.decision);
        println!(
            "  files: {}  loc: {}  bytes: {}  network: {}",
            m.predicted_file_count, m.predicted_loc, m.bundle_bytes, m.requires_network
        );
        for reason in &decision.reasons {
            println!("  - {reason}");
        }
    }

    Ok(match decision.decision {
        Decision::Allow => ExitCode::SUCCESS,
        Decision::Refine => ExitCode::from(2),
        Decision::Reject => ExitCode::FAILURE,
    })
}

fn run_eval(args: &ArgMatches) -> Result<ExitCode> {
    let expression = args
        .get_one::<String>("expression")
        .map(String::as_str)
        .unwrap_or_default();
    match evaluate(expression) {
        Ok(value) => {
            println!("{value}");
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            eprintln!("Error: {err}");
            Ok(ExitCode::FAILURE)
        }
    }
}

fn run_scan(args: &ArgMatches) -> Result<ExitCode> {
    let markup = read_surface(args, "html")?;
    let style = read_surface(args, "css")?;
    let behavior = read_surface(args, "js")?;
    if markup.is_empty() && style.is_empty() && behavior.is_empty() {
        bail!("nothing to scan: pass at least one of --html, --css, --js");
    }

    let mut bundle = CodeBundle::new(markup, style, behavior);
    if !args.get_flag("raw") {
        let (processed, summary) = post_process(&bundle);
        tracing::info!(
            replaced_calls = summary.replaced_calls,
            helper_inserted = summary.helper_inserted,
            placeholders = ?summary.placeholder_ids,
            "bundle post-processed"
        );
        bundle = processed;
    }

    let report = StaticScanner::new().scan(&bundle);
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.issues.is_empty() {
        println!("No findings");
    } else {
        println!("{}", report.render());
    }

    if report.critical {
        return Ok(ExitCode::FAILURE);
    }
    if let Some(path) = args.get_one::<PathBuf>("emit") {
        let (finalized, _) = finalize(&bundle);
        write_output(path, &finalized.behavior)?;
    }
    Ok(ExitCode::SUCCESS)
}

fn write_output(path: &Path, content: &str) -> Result<()> {
    std::fs::write(path, content).with_context(|| format!("writing {}", path.display()))
}

fn run_presets(args: &ArgMatches) -> Result<ExitCode> {
    if args.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(PRESETS)?);
        return Ok(ExitCode::SUCCESS);
    }
    for preset in PRESETS {
        println!("{} ({})", preset.id, preset.category);
        for check in preset.self_test_checklist {
            println!("  - {check}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_config(args: &ArgMatches) -> Result<ExitCode> {
    let config = load_config(args)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(ExitCode::SUCCESS)
}

fn main() -> Result<ExitCode> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("scope", args)) => run_scope(args),
        Some(("eval", args)) => run_eval(args),
        Some(("scan", args)) => run_scan(args),
        Some(("presets", args)) => run_presets(args),
        Some(("config", args)) => run_config(args),
        _ => {
            cli().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_definition_is_valid() {
        cli().debug_assert();
    }

    #[test]
    fn scope_joins_request_words() {
        let matches = cli()
            .try_get_matches_from(["artisan", "scope", "Create", "a", "calculator", "--json"])
            .unwrap();
        let (name, args) = matches.subcommand().unwrap();
        assert_eq!(name, "scope");
        let words: Vec<_> = args.get_many::<String>("request").unwrap().collect();
        assert_eq!(words.len(), 3);
        assert!(args.get_flag("json"));
    }

    #[test]
    fn log_json_is_global() {
        let matches = cli()
            .try_get_matches_from(["artisan", "eval", "1+1", "--log-json"])
            .unwrap();
        assert!(matches.get_flag("log-json"));
    }
}
