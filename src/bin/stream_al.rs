use std::env;
use std::error::Error;
use std::process;

use mondrian_forest::config::RunConfig;
use mondrian_forest::data::Dataset;
use mondrian_forest::experiment::{Experiment, ExperimentResult};
use mondrian_forest::forest::MondrianForest;
use mondrian_forest::rng::RandomSource;
use nalgebra::DMatrix;

fn help() {
    println!();
    println!("stream_al - streaming Mondrian forest with active learning");
    println!("Input arguments:");
    println!("\t -h | --help: \t display this help message.");
    println!("\t -c PATH: \t path to the config file (JSON).");
    println!("\t --train: \t train the classifier.");
    println!("\t --test: \t test the classifier.");
    println!("\t --confidence: \t bucket a confidence value for each prediction.");
    println!("Example:");
    println!("\t stream_al -c conf/stream_al.json --train --test");
}

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        println!("No input argument specified: aborting...");
        help();
        return;
    }

    let mut training = false;
    let mut testing = false;
    let mut confidence = false;
    let mut config_path: Option<String> = None;

    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "-h" | "--help" => {
                help();
                return;
            }
            "-c" => {
                index += 1;
                match args.get(index) {
                    Some(path) => config_path = Some(path.clone()),
                    None => {
                        eprintln!("[ERROR] - Option -c expects a path.");
                        process::exit(1);
                    }
                }
            }
            "--train" => training = true,
            "--test" => testing = true,
            "--confidence" => confidence = true,
            unknown => {
                eprintln!("Unknown input argument: {}, please try --help.", unknown);
                process::exit(1);
            }
        }
        index += 1;
    }

    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("[ERROR] - No config file selected.");
            help();
            process::exit(1);
        }
    };

    if let Err(error) = run(&config_path, training, testing, confidence) {
        eprintln!("[ERROR] - {}", error);
        process::exit(1);
    }
}

fn run(
    config_path: &str,
    training: bool,
    testing: bool,
    confidence: bool,
) -> Result<(), Box<dyn Error>> {
    let config = RunConfig::load(config_path)?;
    let mut master = RandomSource::new(config.seed());

    println!("Loading files ...");
    let mut train_set = Dataset::load(
        &config.train_data,
        &config.train_labels,
        config.random,
        config.sort_data,
        config.iterative,
        Some(master.next_seed()),
    )?;
    let mut test_set = Dataset::load(
        &config.test_data,
        &config.test_labels,
        false,
        false,
        false,
        None,
    )?;

    let num_runs = config.num_runs.max(1);
    let num_query_steps = config.active_num_query_steps.max(1);
    let max_num_queries = config.active_max_num_queries;
    let mut results: Vec<Vec<ExperimentResult>> = Vec::with_capacity(num_runs);

    for run_index in 0..num_runs {
        println!();
        println!("-------------------- Run {}/{} --------------------", run_index + 1, num_runs);
        let mut run_results = Vec::with_capacity(num_query_steps);

        for step in 0..num_query_steps {
            let mut step_config = config.clone();
            step_config.active_max_num_queries =
                ((max_num_queries as f64 * (step + 1) as f64) / num_query_steps as f64) as u32;

            let settings = step_config.settings()?;
            let mut forest =
                MondrianForest::new(settings, train_set.feature_dim, Some(master.next_seed()));
            let mut experiment = Experiment::new(confidence);

            if training {
                experiment.train(&mut forest, &mut train_set, &step_config)?;
            }
            if testing {
                test_set.reset_position();
                let accuracy = experiment.test(&mut forest, &mut test_set)?;
                println!(
                    "Accuracy: {:.4} \t(samples used for training: {})",
                    accuracy,
                    experiment.result().samples_used_for_training
                );
            }
            train_set.reset_position();
            run_results.push(experiment.into_result());
        }
        results.push(run_results);
    }

    if num_runs > 1 {
        print_averaged_results(&results, num_query_steps, test_set.num_classes);
    }
    Ok(())
}

fn print_averaged_results(
    results: &[Vec<ExperimentResult>],
    num_query_steps: usize,
    num_classes: usize,
) {
    let num_runs = results.len() as f64;
    println!();
    println!("-------------------------------");
    println!("   Average results ({} runs):", results.len());
    println!("-------------------------------");
    println!(
        "{:<12}{:<12}{:<12}{:<12}{:<12}{:<12}",
        "Samples:", "Accuracy:", "MicroPrec:", "MacroPrec:", "MicroRec:", "MacroRec:"
    );

    let mut avg_confusion = DMatrix::zeros(num_classes, num_classes);
    for step in 0..num_query_steps {
        let mut samples = 0.0;
        let mut accuracy = 0.0;
        let mut micro_precision = 0.0;
        let mut macro_precision = 0.0;
        let mut micro_recall = 0.0;
        let mut macro_recall = 0.0;
        for run_results in results {
            let result = &run_results[step];
            samples += result.samples_used_for_training as f64 / num_runs;
            accuracy += result.accuracy / num_runs;
            micro_precision += result.micro_avg_precision / num_runs;
            macro_precision += result.macro_avg_precision / num_runs;
            micro_recall += result.micro_avg_recall / num_runs;
            macro_recall += result.macro_avg_recall / num_runs;
            if step == num_query_steps - 1 && result.confusion_matrix.nrows() == num_classes {
                avg_confusion += &result.confusion_matrix / num_runs;
            }
        }
        println!(
            "{:<12.1}{:<12.4}{:<12.4}{:<12.4}{:<12.4}{:<12.4}",
            samples, accuracy, micro_precision, macro_precision, micro_recall, macro_recall
        );
    }
    println!();
    println!("Average confusion matrix (predicted class vs. actual class):");
    println!("{:.4}", avg_confusion);
}
