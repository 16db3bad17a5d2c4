use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use margo::core::ResolutionStrategy;
use margo::core::log::init_logging;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    /// Print results as JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for margo::AppCommand {
    fn from(cmd: Commands) -> margo::AppCommand {
        match cmd {
            Commands::Margin { sell, buy } => margo::AppCommand::Margin { sell, buy },
            Commands::Quote {
                product,
                sell,
                warehouse,
                strategy,
            } => margo::AppCommand::Quote {
                product,
                sell,
                warehouse,
                strategy,
            },
            Commands::Cost {
                product,
                warehouse,
                strategy,
                days,
            } => margo::AppCommand::Cost {
                product,
                warehouse,
                strategy,
                days,
            },
            Commands::Target {
                product,
                margin,
                warehouse,
                cost,
            } => margo::AppCommand::Target {
                product,
                margin,
                warehouse,
                cost,
            },
            Commands::Batch { file, warehouse } => margo::AppCommand::Batch { file, warehouse },
            Commands::Validate {
                product,
                sell,
                warehouse,
            } => margo::AppCommand::Validate {
                product,
                sell,
                warehouse,
            },
            Commands::Snapshot {
                products,
                warehouse,
            } => margo::AppCommand::Snapshot {
                products,
                warehouse,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Margin between a sell and a buy price
    Margin {
        /// Net sell price
        #[arg(long)]
        sell: String,
        /// Net buy price
        #[arg(long)]
        buy: String,
    },
    /// Margin of a product against its purchase history
    Quote {
        product: String,
        /// Net sell price
        #[arg(long)]
        sell: String,
        #[arg(short, long)]
        warehouse: Option<String>,
        /// latest, average, minimum or maximum
        #[arg(short, long)]
        strategy: Option<ResolutionStrategy>,
    },
    /// Purchase cost of a product
    Cost {
        product: String,
        #[arg(short, long)]
        warehouse: Option<String>,
        /// latest, average, minimum or maximum
        #[arg(short, long)]
        strategy: Option<ResolutionStrategy>,
        /// Only consider purchases from the last N days
        #[arg(short, long)]
        days: Option<u32>,
    },
    /// Sell price needed for a target margin
    Target {
        /// Product whose cost is resolved from the ledger
        #[arg(required_unless_present = "cost")]
        product: Option<String>,
        /// Target margin in percent
        #[arg(short, long)]
        margin: String,
        #[arg(short, long)]
        warehouse: Option<String>,
        /// Known net cost; skips the ledger
        #[arg(long)]
        cost: Option<String>,
    },
    /// Margins for a list of products read from a YAML or JSON file
    Batch {
        file: String,
        /// Warehouse for entries that do not name one
        #[arg(short, long)]
        warehouse: Option<String>,
    },
    /// Compare the captured cost with the live ledger cost
    Validate {
        product: String,
        /// Net sell price
        #[arg(long)]
        sell: String,
        /// Warehouse the snapshot was captured for
        #[arg(short, long)]
        warehouse: Option<String>,
    },
    /// Capture current costs for later validation
    Snapshot {
        #[arg(required = true)]
        products: Vec<String>,
        #[arg(short, long)]
        warehouse: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => margo::cli::setup::setup(),
        Some(cmd) => margo::run_command(cmd.into(), cli.config_path.as_deref(), cli.json).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
