use anyhow::{Context, Result};
use cellgen::codegen::{generate, generate_contract, generate_library, CodegenConfig};
use cellgen::model::{LiteralEvaluator, Program};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "cellgen")]
#[command(about = "cellgen - lowers type-checked contract programs to cell-oriented stack IR")]
#[command(version = "0.1.0")]
#[command(author = "Gianluca Brigandi <gbrigand@gmail.com>")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a program description into per-contract modules.
    Compile {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Code generation settings as JSON.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Compile only this contract.
        #[arg(long, conflicts_with = "library")]
        contract: Option<String>,

        /// Compile the shared functions without any contract.
        #[arg(long)]
        library: bool,

        #[arg(long)]
        prune: bool,

        #[arg(long)]
        pretty: bool,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Check that a program description loads and its storage plans are sound.
    Validate {
        input: PathBuf,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Print the storage allocation plans, completing any that are missing.
    Plan {
        input: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Compile {
            input,
            output,
            config,
            contract,
            library,
            prune,
            pretty,
            verbose,
        } => {
            init_logging(verbose);
            cmd_compile(CompileArgs {
                input,
                output,
                config,
                contract,
                library,
                prune,
                pretty,
                verbose,
            })
        }
        Commands::Validate { input, verbose } => {
            init_logging(verbose);
            cmd_validate(input, verbose)
        }
        Commands::Plan { input, output } => {
            init_logging(false);
            cmd_plan(input, output)
        }
    }
}

fn init_logging(verbose: bool) {
    let directive = if verbose { "cellgen=debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive));
    let subscriber = fmt::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

fn load_program(path: &Path) -> Result<Program> {
    let text =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let mut program: Program = serde_json::from_str(&text)
        .with_context(|| format!("parsing program description {}", path.display()))?;
    program.complete_allocations()?;
    debug!(
        types = program.types.types.len(),
        plans = program.allocations.types.len(),
        "program loaded"
    );
    Ok(program)
}

fn write_output(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("writing {}", path.display()))?;
        }
        None => println!("{}", text),
    }
    Ok(())
}

struct CompileArgs {
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    contract: Option<String>,
    library: bool,
    prune: bool,
    pretty: bool,
    verbose: bool,
}

fn cmd_compile(args: CompileArgs) -> Result<()> {
    use colored::*;
    use std::time::Instant;

    if args.verbose {
        eprintln!("{}", " cellgen Compiler".bright_blue().bold());
        eprintln!("{}", "=".repeat(50).bright_blue());
        eprintln!(" Input: {}", args.input.display());
        if let Some(ref out) = args.output {
            eprintln!(" Output: {}", out.display());
        }
        if let Some(ref contract) = args.contract {
            eprintln!(" Contract: {}", contract);
        }
        eprintln!();
    }

    let start = Instant::now();

    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            serde_json::from_str::<CodegenConfig>(&text)
                .with_context(|| format!("parsing config {}", path.display()))?
        }
        None => CodegenConfig::default(),
    };
    if args.prune {
        config = config.pruned();
    }

    let program = load_program(&args.input)?;
    let evaluator = LiteralEvaluator::new(&program.types);

    let (rendered, count) = if args.library {
        let output = generate_library(&program, &evaluator, &config)?;
        let count = output.functions.len();
        (render(&output, args.pretty)?, count)
    } else if let Some(ref contract) = args.contract {
        let output = generate_contract(&program, &evaluator, &config, contract)?;
        let count = output.functions.len();
        (render(&output, args.pretty)?, count)
    } else {
        let modules = generate(&program, &evaluator, &config)?;
        if modules.is_empty() {
            eprintln!("{}", "  No contracts found in input".yellow());
        }
        let count = modules.values().map(|m| m.functions.len()).sum();
        (render(&modules, args.pretty)?, count)
    };

    write_output(args.output.as_deref(), &rendered)?;

    if args.verbose {
        eprintln!(
            "\n {} Compilation successful!",
            "SUCCESS:".bright_green().bold()
        );
        eprintln!("   Functions: {}", count);
        eprintln!("   Time: {:.3}s", start.elapsed().as_secs_f64());
    }

    Ok(())
}

fn render<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String> {
    Ok(if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    })
}

fn cmd_validate(input: PathBuf, verbose: bool) -> Result<()> {
    use colored::*;

    if verbose {
        eprintln!("{}", " Validating program".bright_cyan().bold());
        eprintln!("{}", "=".repeat(50).bright_cyan());
        eprintln!(" Input: {}", input.display());
        eprintln!();
    }

    match load_program(&input) {
        Ok(program) => {
            println!("{}", " VALID".bright_green().bold());
            if verbose {
                let contracts: Vec<&str> = program
                    .types
                    .contracts()
                    .map(|desc| desc.name.as_str())
                    .collect();
                println!("   Types: {}", program.types.types.len());
                println!("   Contracts: {}", contracts.join(", "));
                println!("   Allocation plans: {}", program.allocations.types.len());
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", " INVALID".bright_red().bold());
            println!("\n{}", "Error:".bright_red());
            println!("{:#}", e);
            Err(anyhow::anyhow!("Validation failed"))
        }
    }
}

fn cmd_plan(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let program = load_program(&input)?;
    let rendered = serde_json::to_string_pretty(&program.allocations)?;
    write_output(output.as_deref(), &rendered)
}
