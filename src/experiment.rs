//! Training and evaluation driver.
//!
//! An [`Experiment`] feeds a sample stream into a forest, with or without an
//! active-learning policy, evaluates the trained forest on a test stream and
//! collects everything into an [`ExperimentResult`].

use std::error::Error;
use std::time::Instant;

use nalgebra::{DMatrix, DVector};

use crate::config::RunConfig;
use crate::data::{Dataset, Sample};
use crate::forest::MondrianForest;
use crate::metrics::ClassificationMetrics;

/// Confidence scores are bucketed into 20 equal-width bins over `[0, 1]`;
/// values on the upper boundary clamp into the last bin.
pub const CONFIDENCE_BUCKETS: usize = 20;

/// Everything measured during one train/test cycle.
#[derive(Clone, Debug)]
pub struct ExperimentResult {
    pub predictions: Vec<i32>,
    pub correct: Vec<bool>,
    pub confidence_correct: [u32; CONFIDENCE_BUCKETS],
    pub confidence_incorrect: [u32; CONFIDENCE_BUCKETS],
    pub samples_used_for_training: u32,
    pub training_time: f64,
    pub testing_time: f64,
    pub accuracy: f64,
    pub micro_avg_precision: f64,
    pub macro_avg_precision: f64,
    pub micro_avg_recall: f64,
    pub macro_avg_recall: f64,
    pub confusion_matrix: DMatrix<f64>,
}

impl Default for ExperimentResult {
    fn default() -> Self {
        Self {
            predictions: Vec::new(),
            correct: Vec::new(),
            confidence_correct: [0; CONFIDENCE_BUCKETS],
            confidence_incorrect: [0; CONFIDENCE_BUCKETS],
            samples_used_for_training: 0,
            training_time: 0.0,
            testing_time: 0.0,
            accuracy: 0.0,
            micro_avg_precision: 0.0,
            macro_avg_precision: 0.0,
            micro_avg_recall: 0.0,
            macro_avg_recall: 0.0,
            confusion_matrix: DMatrix::zeros(0, 0),
        }
    }
}

/// Drives training and testing of one forest.
pub struct Experiment {
    result: ExperimentResult,
    confidence: bool,
}

impl ClassificationMetrics<i32> for Experiment {}

impl Experiment {
    /// `confidence` enables per-prediction confidence bucketing during the
    /// test phase.
    pub fn new(confidence: bool) -> Self {
        Self {
            result: ExperimentResult::default(),
            confidence,
        }
    }

    pub fn result(&self) -> &ExperimentResult {
        &self.result
    }

    pub fn into_result(self) -> ExperimentResult {
        self.result
    }

    /// Trains the forest on the dataset according to the configured policy.
    ///
    /// # Errors
    ///
    /// Returns an error on an empty training stream or an unknown policy.
    pub fn train(
        &mut self,
        forest: &mut MondrianForest,
        dataset: &mut Dataset,
        config: &RunConfig,
    ) -> Result<(), Box<dyn Error>> {
        if dataset.num_samples < 1 {
            return Err("There is no training dataset.".into());
        }
        let num_samples = if config.number_of_samples_for_training == 0 {
            dataset.num_samples
        } else {
            config.number_of_samples_for_training
        };
        let debug = forest.settings().debug;
        if debug {
            println!(
                "Start training (active learning {}) on {} samples ...",
                config.active_learning, num_samples
            );
        }
        let start = Instant::now();
        match config.active_learning {
            0 => self.train_all(forest, dataset, num_samples)?,
            1 => self.train_threshold(forest, dataset, config, num_samples)?,
            2 => self.train_buffered(forest, dataset, config, num_samples)?,
            policy => {
                return Err(format!("Unknown active learning policy {}.", policy).into());
            }
        }
        let elapsed = start.elapsed().as_secs_f64();
        self.result.training_time += elapsed;
        if debug {
            println!(
                " ... finished training after {:.3} seconds ({} samples used).",
                elapsed, self.result.samples_used_for_training
            );
        }
        Ok(())
    }

    fn train_all(
        &mut self,
        forest: &mut MondrianForest,
        dataset: &mut Dataset,
        num_samples: usize,
    ) -> Result<(), Box<dyn Error>> {
        for _ in 0..num_samples {
            let sample = dataset.get_next_sample();
            forest.update(&sample)?;
            self.result.samples_used_for_training += 1;
        }
        Ok(())
    }

    /// Policy 1: after the initial set, query a label only when the forest's
    /// confidence falls below the configured threshold.
    fn train_threshold(
        &mut self,
        forest: &mut MondrianForest,
        dataset: &mut Dataset,
        config: &RunConfig,
        num_samples: usize,
    ) -> Result<(), Box<dyn Error>> {
        for _ in 0..num_samples {
            let sample = dataset.get_next_sample();
            if forest.data_counter() < config.active_init_set_size {
                forest.update(&sample)?;
                self.result.samples_used_for_training += 1;
                continue;
            }
            if self.result.samples_used_for_training >= config.active_max_num_queries {
                break;
            }
            let (_, confidence) = forest.classify_confident(&sample);
            if confidence < config.active_confidence_value {
                forest.update(&sample)?;
                self.result.samples_used_for_training += 1;
            }
        }
        Ok(())
    }

    /// Policy 2: buffer incoming samples sorted by ascending confidence and,
    /// every `active_batch_size` samples, train on the
    /// `active_buffer_size` least confident ones.
    fn train_buffered(
        &mut self,
        forest: &mut MondrianForest,
        dataset: &mut Dataset,
        config: &RunConfig,
        num_samples: usize,
    ) -> Result<(), Box<dyn Error>> {
        let mut buffer: Vec<(Sample, f32)> = Vec::new();
        for _ in 0..num_samples {
            let sample = dataset.get_next_sample();
            if forest.data_counter() < config.active_init_set_size {
                forest.update(&sample)?;
                self.result.samples_used_for_training += 1;
                continue;
            }
            if self.result.samples_used_for_training >= config.active_max_num_queries {
                break;
            }
            let (_, confidence) = forest.classify_confident(&sample);
            let position = buffer
                .iter()
                .position(|(_, buffered)| *buffered > confidence)
                .unwrap_or(buffer.len());
            buffer.insert(position, (sample, confidence));
            if buffer.len() >= config.active_batch_size {
                self.flush_buffer(forest, &mut buffer, config)?;
            }
        }
        if !buffer.is_empty() {
            self.flush_buffer(forest, &mut buffer, config)?;
        }
        Ok(())
    }

    fn flush_buffer(
        &mut self,
        forest: &mut MondrianForest,
        buffer: &mut Vec<(Sample, f32)>,
        config: &RunConfig,
    ) -> Result<(), Box<dyn Error>> {
        for (sample, _) in buffer.drain(..).take(config.active_buffer_size) {
            if self.result.samples_used_for_training >= config.active_max_num_queries {
                break;
            }
            forest.update(&sample)?;
            self.result.samples_used_for_training += 1;
        }
        buffer.clear();
        Ok(())
    }

    /// Evaluates the forest on the test stream and computes the metrics.
    /// Returns the accuracy.
    ///
    /// # Errors
    ///
    /// Returns an error on an empty test stream.
    pub fn test(
        &mut self,
        forest: &mut MondrianForest,
        dataset: &mut Dataset,
    ) -> Result<f64, Box<dyn Error>> {
        if dataset.num_samples < 1 {
            return Err("There is no test dataset.".into());
        }
        let debug = forest.settings().debug;
        if debug {
            println!("Start testing on {} samples ...", dataset.num_samples);
        }
        let start = Instant::now();
        let mut y_true = Vec::with_capacity(dataset.num_samples);
        for _ in 0..dataset.num_samples {
            let sample = dataset.get_next_sample();
            let pred_class = if self.confidence {
                let (pred_class, confidence) = forest.classify_confident(&sample);
                let bucket = ((confidence * 100.0 / 5.0).floor().max(0.0) as usize)
                    .min(CONFIDENCE_BUCKETS - 1);
                if pred_class == sample.y as i32 {
                    self.result.confidence_correct[bucket] += 1;
                } else {
                    self.result.confidence_incorrect[bucket] += 1;
                }
                pred_class
            } else {
                forest.classify(&sample)
            };
            self.result.predictions.push(pred_class);
            self.result.correct.push(pred_class == sample.y as i32);
            y_true.push(sample.y as i32);
        }
        let elapsed = start.elapsed().as_secs_f64();
        self.result.testing_time += elapsed;
        if debug {
            println!(" ... finished testing after {:.3} seconds.", elapsed);
        }
        self.compute_metrics(&y_true, forest.num_classes())?;
        Ok(self.result.accuracy)
    }

    fn compute_metrics(
        &mut self,
        y_true: &[i32],
        num_classes: usize,
    ) -> Result<(), Box<dyn Error>> {
        let y_true = DVector::from_row_slice(y_true);
        let y_pred = DVector::from_vec(self.result.predictions.clone());
        self.result.accuracy = self.accuracy(&y_true, &y_pred)?;
        self.result.micro_avg_precision = self.micro_avg_precision(&y_true, &y_pred, num_classes)?;
        self.result.macro_avg_precision = self.macro_avg_precision(&y_true, &y_pred, num_classes)?;
        self.result.micro_avg_recall = self.micro_avg_recall(&y_true, &y_pred, num_classes)?;
        self.result.macro_avg_recall = self.macro_avg_recall(&y_true, &y_pred, num_classes)?;
        self.result.confusion_matrix = self.confusion_matrix(&y_true, &y_pred, num_classes)?;
        Ok(())
    }
}
