use anyhow::{anyhow, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lte_compute::WorkerTopology;
use lte_runner::logging::init_tracing;
use lte_runner::{run_combine, run_single, run_worker, write_output, ClusterArgs, RunnerConfig};
use std::path::PathBuf;
use tracing::{error, info};
use ulid::Ulid;

fn cluster_args() -> [Arg; 4] {
    [
        Arg::new("rank")
            .long("rank")
            .value_parser(value_parser!(usize))
            .help("Worker rank (defaults to the configured topology)"),
        Arg::new("size")
            .long("size")
            .value_parser(value_parser!(usize))
            .help("Worker count (defaults to the configured topology)"),
        Arg::new("run-id")
            .long("run-id")
            .required(true)
            .help("Run identifier shared by every worker (ULID)"),
        Arg::new("reports")
            .long("reports")
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Directory where worker reports are exchanged"),
    ]
}

fn cli() -> Command {
    Command::new("lte-runner")
        .version(lte_runner::VERSION)
        .about("Logic tree ensemble runner")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Run configuration (TOML)"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines"),
        )
        .arg(
            Arg::new("output")
                .long("output")
                .short('o')
                .global(true)
                .value_parser(value_parser!(PathBuf))
                .help("Write results here instead of stdout"),
        )
        .subcommand(Command::new("run").about("Process every branch in this process"))
        .subcommand(
            Command::new("worker")
                .about("Process one worker's share and write its report")
                .args(cluster_args()),
        )
        .subcommand(
            Command::new("combine")
                .about("Merge every worker report and finalize")
                .args(cluster_args()),
        )
        .subcommand(
            Command::new("new-run-id").about("Print a fresh run identifier for a distributed run"),
        )
}

fn parse_cluster_args(config: &RunnerConfig, args: &ArgMatches) -> Result<ClusterArgs> {
    let configured = config.run.topology;
    let rank = args.get_one::<usize>("rank").copied().unwrap_or(configured.rank);
    let size = args.get_one::<usize>("size").copied().unwrap_or(configured.size);
    let topology =
        WorkerTopology::new(rank, size).ok_or_else(|| anyhow!("invalid worker topology {rank}/{size}"))?;
    let run_id = args
        .get_one::<String>("run-id")
        .ok_or_else(|| anyhow!("--run-id is required"))?;
    let run_id = Ulid::from_string(run_id).map_err(|e| anyhow!("invalid run id '{run_id}': {e}"))?;
    let reports = args
        .get_one::<PathBuf>("reports")
        .cloned()
        .ok_or_else(|| anyhow!("--reports is required"))?;
    Ok(ClusterArgs {
        run_id,
        topology,
        reports,
    })
}

fn execute(command: &str, args: &ArgMatches) -> Result<()> {
    if command == "new-run-id" {
        println!("{}", Ulid::new());
        return Ok(());
    }

    let path = args
        .get_one::<PathBuf>("config")
        .ok_or_else(|| anyhow!("--config is required"))?;
    let config = RunnerConfig::load(path)?;
    let output = args.get_one::<PathBuf>("output").map(PathBuf::as_path);

    match command {
        "run" => write_output(&run_single(&config)?, output),
        "worker" => {
            let cluster = parse_cluster_args(&config, args)?;
            let written = run_worker(&config, &cluster)?;
            info!(report = %written.display(), "report written");
            Ok(())
        }
        "combine" => {
            let cluster = parse_cluster_args(&config, args)?;
            write_output(&run_combine(&config, &cluster)?, output)
        }
        other => Err(anyhow!("unknown command '{other}'")),
    }
}

fn main() {
    let matches = cli().get_matches();
    let Some((command, args)) = matches.subcommand() else {
        eprintln!("error: no command given");
        std::process::exit(2);
    };
    init_tracing(args.get_flag("log-json"));

    if let Err(err) = execute(command, args) {
        error!("{err:#}");
        std::process::exit(1);
    }
}
