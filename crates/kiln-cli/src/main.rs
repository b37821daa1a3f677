mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{create::CreateFlags, EXIT_FAILURE, EXIT_RECIPE_ERROR, EXIT_STORE_ERROR};
use kiln_core::{install_signal_handler, Engine};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "kiln",
    version,
    about = "Package recipe engine for C/C++ libraries"
)]
struct Cli {
    /// Path to the Kiln store directory.
    #[arg(long, default_value = "~/.local/share/kiln", global = true)]
    store: String,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    /// Profile supplying default settings and options.
    #[arg(long, global = true)]
    profile: Option<PathBuf>,

    /// Override a setting, e.g. `-s os=Windows`.
    #[arg(short = 's', long = "setting", global = true)]
    settings: Vec<String>,

    /// Override an option, e.g. `-o shared=true`.
    #[arg(short = 'o', long = "option", global = true)]
    options: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Write a new recipe from a built-in template.
    New {
        /// Package name for the new recipe.
        name: String,
        #[arg(long)]
        template: Option<String>,
        #[arg(long, default_value_t = false)]
        force: bool,
    },
    /// Configure, fetch, build and package a recipe into the store.
    Create {
        /// Path to recipe TOML file.
        #[arg(default_value = "kiln.toml")]
        recipe: PathBuf,
        /// Tool runner executing build steps.
        #[arg(long, default_value = "system")]
        runner: String,
        /// Require an existing lock file and fail if the source would drift.
        #[arg(long, default_value_t = false)]
        locked: bool,
        /// Treat artifact rules that match nothing as errors.
        #[arg(long, default_value_t = false)]
        strict: bool,
        /// Keep the source and build folders after packaging.
        #[arg(long, default_value_t = false)]
        keep_build: bool,
    },
    /// Resolve the source revision and write kiln.lock next to the recipe.
    Export {
        /// Path to recipe TOML file.
        #[arg(default_value = "kiln.toml")]
        recipe: PathBuf,
        /// Tool runner used to query the source.
        #[arg(long, default_value = "system")]
        runner: String,
    },
    /// Show resolved options, package id and consumer libs for the settings.
    Options {
        /// Path to recipe TOML file.
        #[arg(default_value = "kiln.toml")]
        recipe: PathBuf,
        /// Use a built-in recipe instead of a file.
        #[arg(long)]
        builtin: Option<String>,
    },
    /// Show recipe metadata.
    Info {
        /// Path to recipe TOML file.
        #[arg(default_value = "kiln.toml")]
        recipe: PathBuf,
        /// Use a built-in recipe instead of a file.
        #[arg(long)]
        builtin: Option<String>,
    },
    /// Inspect package metadata.
    Inspect {
        /// Package ID (full, short or unique prefix).
        package: String,
    },
    /// List all packages in the store.
    List,
    /// Remove a package from the store.
    Remove {
        /// Package ID (full, short or unique prefix).
        package: String,
    },
    /// Check packaged files against their manifest.
    Verify {
        /// Package ID; every package when omitted.
        package: Option<String>,
    },
    /// Generate shell completions for the given shell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
    /// Generate man pages to the given directory.
    ManPages {
        /// Output directory for man pages.
        #[arg(default_value = "man")]
        dir: PathBuf,
    },
}

#[allow(clippy::too_many_lines)]
fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("KILN_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    install_signal_handler();

    let store_path = expand_tilde(&cli.store);
    let engine = Engine::new(&store_path);
    let json_output = cli.json;

    let context = || commands::build_context(cli.profile.as_deref(), &cli.settings, &cli.options);

    let result = match cli.command {
        Commands::New {
            name,
            template,
            force,
        } => commands::new::run(&name, template.as_deref(), force, json_output),
        Commands::Create {
            recipe,
            runner,
            locked,
            strict,
            keep_build,
        } => context().and_then(|ctx| {
            commands::create::run(
                &engine,
                &store_path,
                &recipe,
                &ctx,
                &CreateFlags {
                    runner: &runner,
                    locked,
                    strict,
                    keep_build,
                },
                json_output,
            )
        }),
        Commands::Export { recipe, runner } => {
            commands::export::run(&engine, &recipe, &runner, json_output)
        }
        Commands::Options { recipe, builtin } => context().and_then(|ctx| {
            commands::options::run(&recipe, builtin.as_deref(), &ctx, json_output)
        }),
        Commands::Info { recipe, builtin } => {
            commands::info::run(&recipe, builtin.as_deref(), json_output)
        }
        Commands::Inspect { package } => commands::inspect::run(&engine, &package, json_output),
        Commands::List => commands::list::run(&engine, json_output),
        Commands::Remove { package } => {
            commands::remove::run(&engine, &store_path, &package, json_output)
        }
        Commands::Verify { package } => {
            commands::verify::run(&engine, package.as_deref(), json_output)
        }
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
        Commands::ManPages { dir } => commands::man_pages::run::<Cli>(&dir),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => report_error(&msg),
    }
}

fn report_error(msg: &str) -> ExitCode {
    eprintln!("error: {msg}");
    ExitCode::from(exit_code_for(msg))
}

fn exit_code_for(msg: &str) -> u8 {
    if msg.starts_with("recipe error:")
        || msg.starts_with("settings error:")
        || msg.starts_with("lock error:")
        || msg.starts_with("profile error:")
    {
        EXIT_RECIPE_ERROR
    } else if msg.starts_with("store error:") || msg.starts_with("store lock:") {
        EXIT_STORE_ERROR
    } else {
        EXIT_FAILURE
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home).join(stripped);
        }
    }
    PathBuf::from(path)
}
