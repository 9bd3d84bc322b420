use std::error::Error;
use std::path::Path;

use csv::ReaderBuilder;
use nalgebra::{DMatrix, DVector};
use rand::seq::SliceRandom;
use rand::{rngs::StdRng, SeedableRng};

/// One training or test sample: a feature vector and a class label.
#[derive(Clone, Debug)]
pub struct Sample {
    pub x: DVector<f32>,
    pub y: usize,
}

/// In-memory dataset with a stream cursor.
///
/// The forest consumes samples one at a time through
/// [`get_next_sample`](Dataset::get_next_sample); the visit order is fixed at
/// load time unless the `iterative` option asks for a fresh shuffle on every
/// [`reset_position`](Dataset::reset_position).
pub struct Dataset {
    x: DMatrix<f32>,
    y: Vec<usize>,
    pub num_samples: usize,
    pub num_classes: usize,
    pub feature_dim: usize,
    order: Vec<usize>,
    position: usize,
    random: bool,
    sort_data: bool,
    iterative: bool,
    rng: StdRng,
}

impl Dataset {
    /// Creates a dataset in file order with default options.
    pub fn new(x: DMatrix<f32>, y: Vec<usize>) -> Result<Self, Box<dyn Error>> {
        Self::with_options(x, y, false, false, false, None)
    }

    /// Creates a dataset with explicit ordering options.
    ///
    /// # Arguments
    ///
    /// * `random` - Shuffle the sample order (seeded).
    /// * `sort_data` - Stable sort by label; `random` takes precedence.
    /// * `iterative` - Reshuffle on every `reset_position` instead of keeping
    ///   one fixed permutation.
    /// * `seed` - Shuffle seed; `None` seeds from entropy.
    pub fn with_options(
        x: DMatrix<f32>,
        y: Vec<usize>,
        random: bool,
        sort_data: bool,
        iterative: bool,
        seed: Option<u64>,
    ) -> Result<Self, Box<dyn Error>> {
        if x.nrows() == 0 || y.is_empty() {
            return Err("The dataset is empty.".into());
        }
        if x.nrows() != y.len() {
            return Err("Features and labels are of different sizes.".into());
        }
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let num_samples = x.nrows();
        let num_classes = y.iter().max().map_or(0, |max| max + 1);
        let feature_dim = x.ncols();
        let mut dataset = Self {
            x,
            y,
            num_samples,
            num_classes,
            feature_dim,
            order: (0..num_samples).collect(),
            position: 0,
            random,
            sort_data,
            iterative,
            rng,
        };
        if dataset.random {
            dataset.order.shuffle(&mut dataset.rng);
        } else if dataset.sort_data {
            let labels = dataset.y.clone();
            dataset.order.sort_by_key(|&index| labels[index]);
        }
        Ok(dataset)
    }

    /// Loads a dataset from a features CSV and a labels CSV (one label per
    /// row), both without headers.
    ///
    /// # Errors
    ///
    /// Returns an error on unreadable files, malformed values, mismatched
    /// lengths or an empty dataset.
    pub fn load<P: AsRef<Path>>(
        data_path: P,
        labels_path: P,
        random: bool,
        sort_data: bool,
        iterative: bool,
        seed: Option<u64>,
    ) -> Result<Self, Box<dyn Error>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(false)
            .from_path(&data_path)?;
        let mut features = Vec::new();
        let mut feature_dim = 0;
        for result in reader.records() {
            let record = result?;
            feature_dim = record.len();
            for value in record.iter() {
                features.push(value.trim().parse::<f32>()?);
            }
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .from_path(&labels_path)?;
        let mut labels = Vec::new();
        for result in reader.records() {
            let record = result?;
            let value = record.get(0).ok_or("Missing label")?;
            labels.push(value.trim().parse::<usize>()?);
        }

        if feature_dim == 0 || labels.is_empty() {
            return Err("The dataset is empty.".into());
        }
        let num_samples = features.len() / feature_dim;
        let x = DMatrix::from_row_slice(num_samples, feature_dim, &features);
        Self::with_options(x, labels, random, sort_data, iterative, seed)
    }

    /// Next sample in the current order, wrapping around at the end.
    pub fn get_next_sample(&mut self) -> Sample {
        let index = self.order[self.position % self.num_samples];
        self.position += 1;
        Sample {
            x: self.x.row(index).transpose(),
            y: self.y[index],
        }
    }

    /// Rewinds the stream. With the `iterative` option the order is
    /// reshuffled, so every pass sees a fresh permutation.
    pub fn reset_position(&mut self) {
        self.position = 0;
        if self.iterative && self.random {
            self.order.shuffle(&mut self.rng);
        }
    }
}
