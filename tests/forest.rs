use mondrian_forest::config::RunConfig;
use mondrian_forest::data::{Dataset, Sample};
use mondrian_forest::experiment::Experiment;
use mondrian_forest::forest::{MondrianForest, MondrianSettings, NO_DECISION};
use nalgebra::{DMatrix, DVector};

fn sample(values: &[f32], label: usize) -> Sample {
    Sample {
        x: DVector::from_row_slice(values),
        y: label,
    }
}

/// Deterministic low-discrepancy points in the unit square.
fn unit_square(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let x0 = (i as f32 * 0.754_87).fract();
            let x1 = (i as f32 * 0.569_84).fract();
            sample(&[x0, x1], 0)
        })
        .collect()
}

fn two_class_line(n: usize) -> Vec<Sample> {
    (0..n)
        .map(|i| {
            let x = (i as f32 * 0.754_87).fract();
            sample(&[x], usize::from(x > 0.5))
        })
        .collect()
}

fn forest(num_trees: usize, feature_dim: usize, seed: u64) -> MondrianForest {
    let mut settings = MondrianSettings::new();
    settings.set_num_trees(num_trees).unwrap();
    MondrianForest::new(settings, feature_dim, Some(seed))
}

#[test]
fn single_class_square_is_certain() {
    let mut forest = forest(10, 2, 100);
    for s in unit_square(100) {
        forest.update(&s).unwrap();
    }
    for s in unit_square(10) {
        let (pred_class, confidence) = forest.classify_confident(&s);
        assert_eq!(pred_class, 0);
        assert!(confidence >= 0.9, "confidence = {}", confidence);
    }
}

#[test]
fn separated_classes_are_recovered() {
    let mut forest = forest(25, 1, 101);
    for s in two_class_line(200) {
        forest.update(&s).unwrap();
    }
    assert_eq!(forest.classify(&sample(&[0.1], 0)), 0);
    assert_eq!(forest.classify(&sample(&[0.9], 1)), 1);
}

#[test]
fn classes_are_discovered_online() {
    let mut forest = forest(5, 1, 102);
    for label in 0..6 {
        assert_eq!(forest.num_classes(), label);
        forest
            .update(&sample(&[label as f32 * 2.0], label))
            .unwrap();
        assert_eq!(forest.num_classes(), label + 1);
    }
}

#[test]
fn repeated_identical_samples_still_classify() {
    let mut forest = forest(5, 2, 103);
    for _ in 0..50 {
        forest.update(&sample(&[0.3, 0.3], 0)).unwrap();
    }
    assert_eq!(forest.classify(&sample(&[0.3, 0.3], 0)), 0);
    assert_eq!(forest.classify(&sample(&[0.8, 0.1], 0)), 0);
}

#[test]
fn untrained_forest_has_no_decision() {
    let forest = forest(5, 2, 104);
    assert_eq!(forest.classify(&sample(&[0.5, 0.5], 0)), NO_DECISION);
}

#[test]
fn identical_seeds_give_identical_predictions() {
    let streams = two_class_line(150);
    let mut a = forest(10, 1, 105);
    let mut b = forest(10, 1, 105);
    for s in &streams {
        a.update(s).unwrap();
        b.update(s).unwrap();
    }
    for s in &streams {
        assert_eq!(a.classify(s), b.classify(s));
    }
}

#[test]
fn prediction_is_stable_under_sample_order() {
    let stream = two_class_line(200);
    let mut reversed = stream.clone();
    reversed.reverse();

    let mut a = forest(50, 1, 106);
    let mut b = forest(50, 1, 107);
    for s in &stream {
        a.update(s).unwrap();
    }
    for s in &reversed {
        b.update(s).unwrap();
    }
    // Tree shapes depend on order, but with enough trees the predicted
    // classes on points away from the boundary do not.
    for probe in [0.05, 0.15, 0.25, 0.75, 0.85, 0.95] {
        let s = sample(&[probe], usize::from(probe > 0.5));
        assert_eq!(a.classify(&s), b.classify(&s), "probe = {}", probe);
    }
}

#[test]
fn active_threshold_policy_trains_exactly_the_query_budget() {
    let samples = two_class_line(400);
    let values: Vec<f32> = samples.iter().map(|s| s.x[0]).collect();
    let labels: Vec<usize> = samples.iter().map(|s| s.y).collect();
    let x = DMatrix::from_row_slice(samples.len(), 1, &values);
    let mut dataset = Dataset::new(x, labels).unwrap();

    let mut config = RunConfig::default();
    config.active_learning = 1;
    config.active_init_set_size = 10;
    config.active_max_num_queries = 50;
    config.active_confidence_value = 0.99;

    let mut forest = forest(10, 1, 108);
    let mut experiment = Experiment::new(false);
    experiment
        .train(&mut forest, &mut dataset, &config)
        .unwrap();
    assert_eq!(experiment.result().samples_used_for_training, 50);
    assert_eq!(forest.data_counter(), 50);
}

#[test]
fn train_then_test_reports_metrics() {
    let samples = two_class_line(300);
    let values: Vec<f32> = samples.iter().map(|s| s.x[0]).collect();
    let labels: Vec<usize> = samples.iter().map(|s| s.y).collect();
    let mut train_set =
        Dataset::new(DMatrix::from_row_slice(300, 1, &values), labels.clone()).unwrap();
    let mut test_set =
        Dataset::new(DMatrix::from_row_slice(300, 1, &values), labels).unwrap();

    let mut forest = forest(10, 1, 109);
    let config = RunConfig::default();
    let mut experiment = Experiment::new(true);
    experiment
        .train(&mut forest, &mut train_set, &config)
        .unwrap();
    let accuracy = experiment.test(&mut forest, &mut test_set).unwrap();
    assert!(accuracy > 0.9, "accuracy = {}", accuracy);

    let result = experiment.result();
    assert_eq!(result.predictions.len(), 300);
    let bucketed: u32 = result.confidence_correct.iter().sum::<u32>()
        + result.confidence_incorrect.iter().sum::<u32>();
    assert_eq!(bucketed, 300);
    assert!(result.macro_avg_recall > 0.9);
}
