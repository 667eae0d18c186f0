//! Training/evaluation driver.
//!
//! Examples:
//! - Train and evaluate:
//!   `treeboost --config-file gbm.json --training-files a.tsv,b.tsv \
//!    --testing-files held_out.tsv --model-file model.json --num-threads 8`
//!
//! - Evaluate an existing model, reading test rows from a pipe:
//!   `treeboost --config-file gbm.json --eval-only --model-file model.json \
//!    --testing-files stdin`

use std::fs::File;
use std::io::{BufReader, IsTerminal};
use std::path::PathBuf;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use treeboost::config::{Config, ConfigError};
use treeboost::eval::Evaluator;
use treeboost::ingest::{load_chunks, merge_chunks, DEFAULT_CHUNK_SIZE};
use treeboost::io::{load_model, save_model, write_importance, ModelIoError};
use treeboost::training::{train, TrainError};
use treeboost::{Dataset, Forest, RowSchema, WorkerPool};

const DEFAULT_BUCKETING_EXAMPLES: usize = 5 * 1024 * 1024;
const DEFAULT_NUM_THREADS: usize = 8;

#[derive(Debug)]
struct Args {
    config_file: PathBuf,
    training_files: Vec<String>,
    testing_files: Vec<String>,
    model_file: PathBuf,
    eval_only: bool,
    find_optimal_num_trees: bool,
    num_examples_for_bucketing: usize,
    /// Cap on training examples; negative means unlimited.
    num_examples_for_training: i64,
    num_threads: usize,
    chunk_size: usize,
}

fn die(msg: &str) -> ! {
    eprintln!("fatal: {msg}");
    std::process::exit(1)
}

fn parse_args() -> Args {
    let mut config_file: Option<PathBuf> = None;
    let mut training_files: Vec<String> = Vec::new();
    let mut testing_files: Vec<String> = Vec::new();
    let mut model_file: Option<PathBuf> = None;
    let mut eval_only = false;
    let mut find_optimal_num_trees = false;
    let mut num_examples_for_bucketing = DEFAULT_BUCKETING_EXAMPLES;
    let mut num_examples_for_training: i64 = -1;
    let mut num_threads = DEFAULT_NUM_THREADS;
    let mut chunk_size = DEFAULT_CHUNK_SIZE;

    let mut it = std::env::args().skip(1);
    let value = |it: &mut dyn Iterator<Item = String>, flag: &str| {
        it.next()
            .unwrap_or_else(|| die(&format!("{flag} requires a value")))
    };
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--config-file" => config_file = Some(PathBuf::from(value(&mut it, &arg))),
            "--training-files" => {
                training_files = split_csv(&value(&mut it, &arg));
            }
            "--testing-files" => {
                testing_files = split_csv(&value(&mut it, &arg));
            }
            "--model-file" => model_file = Some(PathBuf::from(value(&mut it, &arg))),
            "--eval-only" => eval_only = true,
            "--find-optimal-num-trees" => find_optimal_num_trees = true,
            "--num-examples-for-bucketing" => {
                num_examples_for_bucketing = parse_flag(&arg, &value(&mut it, &arg));
            }
            "--num-examples-for-training" => {
                num_examples_for_training = parse_flag(&arg, &value(&mut it, &arg));
            }
            "--num-threads" => num_threads = parse_flag(&arg, &value(&mut it, &arg)),
            "--chunk-size" => chunk_size = parse_flag(&arg, &value(&mut it, &arg)),
            "--help" => print_help_and_exit(),
            other => die(&format!("unknown flag: {other} (try --help)")),
        }
    }

    let Some(config_file) = config_file else {
        die("--config-file is required");
    };
    let Some(model_file) = model_file else {
        die("--model-file is required");
    };
    if !eval_only && training_files.is_empty() {
        die("--training-files is required unless --eval-only is set");
    }
    if chunk_size == 0 {
        die("--chunk-size must be positive");
    }

    Args {
        config_file,
        training_files,
        testing_files,
        model_file,
        eval_only,
        find_optimal_num_trees,
        num_examples_for_bucketing,
        num_examples_for_training,
        num_threads,
        chunk_size,
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_flag<T: std::str::FromStr>(flag: &str, raw: &str) -> T {
    raw.parse()
        .unwrap_or_else(|_| die(&format!("invalid value for {flag}: {raw}")))
}

fn print_help_and_exit() -> ! {
    eprintln!(
        "treeboost: gradient boosted tree training/evaluation driver\n\
         \n\
         \x20 --config-file <path>                JSON model configuration (required)\n\
         \x20 --model-file <path>                 model document to write or load (required)\n\
         \x20 --training-files <a,b,c>            comma separated training data files\n\
         \x20 --testing-files <a,b,c>             comma separated test data files ('stdin' reads standard input)\n\
         \x20 --eval-only                         skip training, load an existing model\n\
         \x20 --find-optimal-num-trees            emit the loss curve over ensemble prefixes\n\
         \x20 --num-examples-for-bucketing <n>    rows sampled to fit feature buckets (default {DEFAULT_BUCKETING_EXAMPLES})\n\
         \x20 --num-examples-for-training <n>     cap on training rows, -1 = unlimited (default -1)\n\
         \x20 --num-threads <n>                   parsing worker pool size, 0 = sequential (default {DEFAULT_NUM_THREADS})\n\
         \x20 --chunk-size <n>                    lines per ingestion chunk (default {DEFAULT_CHUNK_SIZE})"
    );
    std::process::exit(0)
}

#[derive(Debug, thiserror::Error)]
enum DriverError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    ModelIo(#[from] ModelIoError),

    #[error(transparent)]
    Train(#[from] TrainError),

    #[error("failed to read {path}: {source}")]
    Input {
        path: String,
        source: std::io::Error,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .init();

    let args = parse_args();
    tracing::info!(?args, "starting");

    if let Err(err) = run(args) {
        tracing::error!(error = %err, "aborting");
        eprintln!("fatal: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), DriverError> {
    let config = Config::load(&args.config_file)?;
    let schema = RowSchema::from_config(&config);

    let forest = if args.eval_only {
        tracing::info!(model = %args.model_file.display(), "loading model");
        let forest = load_model(&args.model_file, schema.n_features())?;
        tracing::info!(num_trees = forest.n_trees(), "model loaded");
        forest
    } else {
        // Workers only parse training input, so eval-only runs never build
        // the pool. Built once, reused across every ingestion call.
        let pool = if args.num_threads > 0 {
            Some(WorkerPool::new(args.num_threads)?)
        } else {
            None
        };
        train_from_files(&args, &config, &schema, pool.as_ref())?
    };

    if !args.testing_files.is_empty() {
        evaluate_files(&args, &schema, &forest)?;
    }
    Ok(())
}

fn train_from_files(
    args: &Args,
    config: &Config,
    schema: &RowSchema,
    pool: Option<&WorkerPool>,
) -> Result<Forest, DriverError> {
    let cap = usize::try_from(args.num_examples_for_training).ok();
    let mut dataset = Dataset::new(schema.clone(), args.num_examples_for_bucketing, cap);

    let start = Instant::now();
    for path in &args.training_files {
        tracing::info!(file = %path, "loading training data");
        let file = File::open(path).map_err(|source| DriverError::Input {
            path: path.clone(),
            source,
        })?;
        let chunks = load_chunks(BufReader::new(file), args.chunk_size, schema, pool)
            .map_err(|source| DriverError::Input {
                path: path.clone(),
                source,
            })?;
        let stats = merge_chunks(&chunks, &mut dataset);
        if stats.rows_dropped > 0 {
            tracing::warn!(file = %path, dropped = stats.rows_dropped, "dropped malformed rows");
        }
        tracing::info!(
            examples = dataset.n_examples(),
            elapsed_sec = start.elapsed().as_secs_f64(),
            "read examples"
        );
        if stats.exhausted {
            tracing::info!("training example cap reached, skipping remaining files");
            break;
        }
    }
    dataset.close();

    let trained = train(&dataset, config)?;
    tracing::info!(num_trees = trained.forest.n_trees(), "training finished");

    let mut fimps_path = args.model_file.as_os_str().to_owned();
    fimps_path.push(".fimps");
    let fimps_path = PathBuf::from(fimps_path);
    write_importance(&fimps_path, config, &trained.importance)?;
    save_model(&args.model_file, &trained.forest)?;
    Ok(trained.forest)
}

fn evaluate_files(args: &Args, schema: &RowSchema, forest: &Forest) -> Result<(), DriverError> {
    let mut evaluator = Evaluator::new(forest, schema.clone(), args.find_optimal_num_trees);
    for path in &args.testing_files {
        tracing::info!(file = %path, "loading test data");
        let result = if path == "stdin" {
            evaluator.score_reader(std::io::stdin().lock())
        } else {
            let file = File::open(path).map_err(|source| DriverError::Input {
                path: path.clone(),
                source,
            })?;
            evaluator.score_reader(BufReader::new(file))
        };
        result.map_err(|source| DriverError::Input {
            path: path.clone(),
            source,
        })?;
    }

    let report = evaluator.report();
    if report.rows_dropped > 0 {
        tracing::warn!(dropped = report.rows_dropped, "dropped malformed test rows");
    }
    print!("{report}");
    Ok(())
}
