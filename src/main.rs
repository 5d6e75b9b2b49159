use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{debug, info, warn};

use iotids_io::{
    ClassRecord, DatasetSummary, EvaluationRecord, ExperimentName, FeatureRecord,
    PredictionRecord, ResultWriter, SplitRecord, Table, TableReader,
};
use iotids_prep::{
    CategoricalEncoder, EncodingTable, FeatureMatrix, FeatureSpec, SplitConfig, UnknownPolicy,
};
use iotids_rf::{
    ClassificationReport, OobMode, RandomForest, RandomForestConfig, SplitCriterion, evaluate,
};

#[derive(Parser)]
#[command(name = "iotids")]
#[command(about = "Random Forest training and evaluation for IoT network traffic classification")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// RNG seed for the split and the forest
    #[arg(long, default_value_t = 42, global = true)]
    seed: u64,

    /// Enable verbose (debug-level) logging
    #[arg(long, global = true)]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(long, global = true)]
    quiet: bool,

    /// Number of threads for parallel computation (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Subcommand)]
enum Command {
    /// Print a per-column summary of a traffic table as JSON
    Describe {
        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Columns to read as text even if every cell parses as a number
        #[arg(long, value_delimiter = ',')]
        categorical: Vec<String>,
    },

    /// Split, encode, train and evaluate a classifier on labelled traffic
    Train {
        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files (must match [a-zA-Z0-9_-]+)
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Column holding the attack class
        #[arg(long, default_value = "Attack_type")]
        label_column: String,

        /// Text feature columns to encode as integer codes
        #[arg(long, value_delimiter = ',', default_value = "proto,service")]
        categorical: Vec<String>,

        /// Row identifier columns kept out of the feature matrix. A blank
        /// header cell (a saved dataframe index) is read as `unnamed_0`.
        #[arg(long, value_delimiter = ',', default_value = "id,unnamed_0")]
        index_column: Vec<String>,

        /// Share of rows held out for evaluation, in (0, 1)
        #[arg(long, default_value_t = 0.2)]
        test_fraction: f64,

        /// Number of trees in the Random Forest
        #[arg(long, default_value_t = 100)]
        n_trees: usize,

        /// Maximum tree depth
        #[arg(long, default_value_t = 10)]
        max_depth: usize,

        /// Split criterion: "gini" or "entropy"
        #[arg(long, default_value = "gini")]
        criterion: SplitCriterion,

        /// What to do with categories absent from the training rows:
        /// "reject", "drop-row" or "sentinel"
        #[arg(long, default_value = "reject")]
        unknown_policy: UnknownPolicy,

        /// Also compute the out-of-bag score
        #[arg(long, default_value_t = false)]
        oob: bool,

        /// Number of features shown in the importance chart
        #[arg(long, default_value_t = 10)]
        top_k: usize,

        /// Print the human-readable report instead of the JSON summary
        #[arg(long, default_value_t = false)]
        text_report: bool,
    },

    /// Classify a table with a saved model and encoding
    Predict {
        /// Path to the trained model binary
        #[arg(long)]
        model: PathBuf,

        /// Path to the encoding table saved next to the model
        #[arg(long)]
        encoding: PathBuf,

        /// Path to the input CSV file
        #[arg(long)]
        data: PathBuf,

        /// Experiment name for output files
        #[arg(long)]
        experiment: String,

        /// Output directory for result files
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,

        /// Row identifier columns; the first one present is copied into
        /// each prediction
        #[arg(long, value_delimiter = ',', default_value = "id,unnamed_0")]
        index_column: Vec<String>,

        /// Override the unseen-category policy stored with the encoding
        #[arg(long)]
        unknown_policy: Option<UnknownPolicy>,
    },
}

// --- JSON stdout output structs ---

#[derive(Serialize)]
struct TrainOutput {
    experiment: String,
    n_rows: usize,
    n_train: usize,
    n_test: usize,
    dropped_rows: usize,
    n_features: usize,
    n_classes: usize,
    n_trees: usize,
    accuracy: f64,
    macro_f1: f64,
    oob_accuracy: Option<f64>,
    top_features: Vec<String>,
}

#[derive(Serialize)]
struct PredictOutput {
    experiment: String,
    n_rows: usize,
    dropped_rows: usize,
    model_n_trees: usize,
    model_n_features: usize,
    model_n_classes: usize,
}

struct TrainArgs {
    data: PathBuf,
    experiment: String,
    output_dir: PathBuf,
    label_column: String,
    categorical: Vec<String>,
    index_column: Vec<String>,
    test_fraction: f64,
    n_trees: usize,
    max_depth: usize,
    criterion: SplitCriterion,
    unknown_policy: UnknownPolicy,
    oob: bool,
    top_k: usize,
    text_report: bool,
}

fn read_table(data: &Path, text_columns: &[String]) -> Result<Table> {
    let names: Vec<&str> = text_columns.iter().map(String::as_str).collect();
    TableReader::new(data)
        .with_text_columns(&names)
        .read()
        .with_context(|| format!("failed to read {}", data.display()))
}

/// Index columns present in `table`, in the order given.
fn index_columns(table: &Table, candidates: &[String]) -> Vec<String> {
    let present: Vec<String> = candidates
        .iter()
        .filter(|c| table.column(c).is_some())
        .cloned()
        .collect();
    if present.is_empty() {
        warn!(candidates = ?candidates, "no index column found, every column is a feature");
    }
    present
}

fn run_train(args: TrainArgs, seed: u64) -> Result<()> {
    let experiment_name = ExperimentName::new(args.experiment.clone())?;

    // 1. Load and describe
    let mut text_columns = args.categorical.clone();
    text_columns.push(args.label_column.clone());
    let table = read_table(&args.data, &text_columns)?;
    table
        .require_column(&args.label_column)
        .context("label column missing from input")?;

    let summary = DatasetSummary::from_table(&table);
    summary.log();
    for (class, count) in table.value_counts(&args.label_column)? {
        info!(class = %class, count, "class distribution");
    }

    let writer = ResultWriter::new(&args.output_dir, experiment_name)?;
    writer.write_summary(&summary)?;

    // 2. Split row indices before anything is fitted
    let split_config = SplitConfig::new(args.test_fraction)?.with_seed(seed);
    let split = split_config
        .split_indices(table.n_rows())
        .context("train/test split failed")?;
    let train_table = table.select_rows(&split.train)?;
    let test_table = table.select_rows(&split.test)?;

    // 3. Fit the encoding on the training rows, apply it to both sides
    let encoding = CategoricalEncoder::new(&args.categorical)
        .with_label_column(&args.label_column)
        .with_unknown_policy(args.unknown_policy)
        .fit(&train_table)
        .context("failed to fit categorical encoding")?;
    let class_names: Vec<String> = encoding
        .labels(&args.label_column)
        .map(<[String]>::to_vec)
        .unwrap_or_default();
    for (code, name) in class_names.iter().enumerate() {
        info!(code, class = %name, "label encoded");
    }

    let train_encoded = encoding
        .transform(&train_table)
        .context("failed to encode training rows")?;
    let test_encoded = encoding
        .transform(&test_table)
        .context("failed to encode test rows")?;
    let dropped_rows = train_encoded.dropped_rows.len() + test_encoded.dropped_rows.len();

    let spec = FeatureSpec::new(&args.label_column)
        .with_excluded(&index_columns(&table, &args.index_column));
    let train_matrix = FeatureMatrix::from_table(&train_encoded.table, &spec)?;
    let test_matrix = FeatureMatrix::from_table(&test_encoded.table, &spec)?;
    let train_labels = train_matrix.require_labels(&spec)?;
    let test_labels = test_matrix.require_labels(&spec)?;
    info!(
        n_train = train_matrix.n_rows(),
        n_test = test_matrix.n_rows(),
        n_features = train_matrix.feature_names.len(),
        dropped_rows,
        "feature matrices built"
    );

    // 4. Train
    let oob_mode = if args.oob { OobMode::Enabled } else { OobMode::Disabled };
    let rf_config = RandomForestConfig::new(args.n_trees)?
        .with_max_depth(Some(args.max_depth))
        .with_criterion(args.criterion)
        .with_oob_mode(oob_mode)
        .with_seed(seed);
    let trained = rf_config
        .fit(&train_matrix.features, train_labels, &train_matrix.feature_names)
        .context("training failed")?;
    let oob_accuracy = trained.oob_score().map(|s| s.accuracy);
    let meta = trained.metadata();
    info!(
        n_trees = meta.n_trees,
        n_samples = meta.n_samples,
        max_features = meta.max_features_resolved,
        oob_accuracy = ?oob_accuracy,
        "forest trained"
    );

    // 5. Evaluate on the held-out rows
    let evaluation = evaluate(trained.forest(), &test_matrix.features, test_labels)
        .context("evaluation failed")?;
    info!(
        accuracy = evaluation.accuracy,
        macro_f1 = evaluation.macro_avg.f1,
        "held-out evaluation complete"
    );

    let class_name = |class: usize| class_names.get(class).map_or("?", String::as_str);
    let importances = trained.importances();
    for feature in importances.iter().take(args.top_k) {
        debug!(rank = feature.rank, name = %feature.name, importance = feature.importance, "feature ranked");
    }

    // 6. Persist artifacts
    let record = EvaluationRecord {
        label_column: &args.label_column,
        accuracy: evaluation.accuracy,
        macro_f1: evaluation.macro_avg.f1,
        weighted_f1: evaluation.weighted_avg.f1,
        oob_accuracy,
        split: SplitRecord {
            n_train: train_matrix.n_rows(),
            n_test: test_matrix.n_rows(),
            test_fraction: split_config.test_fraction(),
            seed: split_config.seed(),
            dropped_rows,
        },
        class_metrics: evaluation
            .class_metrics
            .iter()
            .map(|m| ClassRecord {
                class: m.class,
                name: class_name(m.class),
                precision: m.precision,
                recall: m.recall,
                f1: m.f1,
                support: m.support,
            })
            .collect(),
        confusion_matrix: evaluation.confusion_matrix.as_rows(),
        feature_importances: importances
            .iter()
            .map(|f| FeatureRecord {
                name: &f.name,
                importance: f.importance,
                rank: f.rank,
            })
            .collect(),
    };
    writer.write_evaluation(&record)?;

    trained
        .forest()
        .save(writer.model_path())
        .context("failed to save model")?;
    encoding
        .save(writer.encoding_path())
        .context("failed to save encoding")?;
    info!(
        model = %writer.model_path().display(),
        encoding = %writer.encoding_path().display(),
        "model saved"
    );

    // 7. Report
    if args.text_report {
        let report = ClassificationReport::new(&evaluation, &class_names)
            .with_importances(importances, args.top_k);
        println!("{report}");
    } else {
        let output = TrainOutput {
            experiment: args.experiment,
            n_rows: table.n_rows(),
            n_train: train_matrix.n_rows(),
            n_test: test_matrix.n_rows(),
            dropped_rows,
            n_features: train_matrix.feature_names.len(),
            n_classes: trained.forest().n_classes(),
            n_trees: trained.forest().n_trees(),
            accuracy: evaluation.accuracy,
            macro_f1: evaluation.macro_avg.f1,
            oob_accuracy,
            top_features: importances
                .iter()
                .take(args.top_k)
                .map(|f| f.name.clone())
                .collect(),
        };
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    Ok(())
}

fn run_predict(
    model: PathBuf,
    encoding_path: PathBuf,
    data: PathBuf,
    experiment: String,
    output_dir: PathBuf,
    index_column: Vec<String>,
    unknown_policy: Option<UnknownPolicy>,
) -> Result<()> {
    let experiment_name = ExperimentName::new(experiment.clone())?;

    // 1. Load model and encoding
    let forest = RandomForest::load(&model).context("failed to load model")?;
    info!(
        n_trees = forest.n_trees(),
        n_features = forest.n_features(),
        n_classes = forest.n_classes(),
        "model loaded"
    );
    let mut encoding = EncodingTable::load(&encoding_path).context("failed to load encoding")?;
    if let Some(policy) = unknown_policy {
        encoding = encoding.with_unknown_policy(policy);
    }
    let label_column = encoding
        .label_column()
        .context("encoding table has no label column")?
        .to_string();

    // 2. Read and encode; labels play no part in prediction
    let text_columns: Vec<String> = encoding.columns().map(str::to_string).collect();
    let mut table = read_table(&data, &text_columns)?;
    if table.remove_column(&label_column).is_some() {
        debug!(column = %label_column, "label column ignored for prediction");
    }
    let index = index_columns(&table, &index_column);
    let encoded = encoding
        .transform(&table)
        .context("failed to encode input rows")?;
    let spec = FeatureSpec::new(&label_column)
        .with_excluded(&index);
    let matrix = FeatureMatrix::from_table(&encoded.table, &spec)?;
    anyhow::ensure!(
        matrix.feature_names == forest.feature_names(),
        "input columns {:?} do not match the model's features {:?}",
        matrix.feature_names,
        forest.feature_names()
    );

    // 3. Predict
    let votes = forest
        .predict_batch_with_confidence(&matrix.features)
        .context("prediction failed")?;
    let ids = index
        .first()
        .and_then(|name| encoded.table.column(name))
        .map(|c| c.data());
    let predictions: Vec<PredictionRecord<'_>> = votes
        .iter()
        .enumerate()
        .map(|(row, vote)| PredictionRecord {
            id: ids.and_then(|d| d.render(row)),
            class: vote.class,
            label: encoding.decode(&label_column, vote.class).unwrap_or("?"),
            confidence: vote.confidence,
        })
        .collect();

    // 4. Write predictions JSON
    let writer = ResultWriter::new(&output_dir, experiment_name)?;
    writer.write_predictions(&predictions)?;

    let output = PredictOutput {
        experiment,
        n_rows: predictions.len(),
        dropped_rows: encoded.dropped_rows.len(),
        model_n_trees: forest.n_trees(),
        model_n_features: forest.n_features(),
        model_n_classes: forest.n_classes(),
    };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match (cli.verbose, cli.quiet) {
        (true, _) => "debug",
        (_, true) => "error",
        _ => "info",
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("failed to configure thread pool")?;
        info!(threads, "thread pool configured");
    }

    match cli.command {
        Command::Describe { data, categorical } => {
            let table = read_table(&data, &categorical)?;
            let summary = DatasetSummary::from_table(&table);
            summary.log();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }

        Command::Train {
            data,
            experiment,
            output_dir,
            label_column,
            categorical,
            index_column,
            test_fraction,
            n_trees,
            max_depth,
            criterion,
            unknown_policy,
            oob,
            top_k,
            text_report,
        } => run_train(
            TrainArgs {
                data,
                experiment,
                output_dir,
                label_column,
                categorical,
                index_column,
                test_fraction,
                n_trees,
                max_depth,
                criterion,
                unknown_policy,
                oob,
                top_k,
                text_report,
            },
            cli.seed,
        )?,

        Command::Predict {
            model,
            encoding,
            data,
            experiment,
            output_dir,
            index_column,
            unknown_policy,
        } => run_predict(
            model,
            encoding,
            data,
            experiment,
            output_dir,
            index_column,
            unknown_policy,
        )?,
    }

    Ok(())
}
