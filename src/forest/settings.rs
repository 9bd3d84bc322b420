use std::error::Error;

/// Struct representing the settings shared by every tree of a Mondrian
/// forest.
#[derive(Clone, Debug)]
pub struct MondrianSettings {
    pub num_trees: usize,
    pub discount_factor: f32,
    pub decision_prior_hyperparam: f32,
    pub max_samples_in_one_node: u32,
    pub confidence_measure: u8,
    pub density_exponent: f32,
    pub debug: bool,
}

impl Default for MondrianSettings {
    /// Creates a new instance of `MondrianSettings` with default values.
    fn default() -> Self {
        Self::new()
    }
}

impl MondrianSettings {
    /// Creates a new instance of `MondrianSettings` with default values.
    pub fn new() -> Self {
        Self {
            num_trees: 10,
            discount_factor: 1.0,
            decision_prior_hyperparam: 1.0,
            max_samples_in_one_node: 0,
            confidence_measure: 0,
            density_exponent: 1.0,
            debug: false,
        }
    }

    /// Sets the number of trees in the forest.
    ///
    /// # Arguments
    ///
    /// * `num_trees` - The number of trees.
    ///
    /// # Errors
    ///
    /// Returns an error if the number of trees is less than 1.
    pub fn set_num_trees(&mut self, num_trees: usize) -> Result<(), Box<dyn Error>> {
        if num_trees < 1 {
            return Err("The number of trees must be greater than 0.".into());
        }
        self.num_trees = num_trees;
        Ok(())
    }

    /// Sets the per-dimension discount factor. The smoothing discount rate is
    /// this factor scaled by the feature dimension.
    ///
    /// # Errors
    ///
    /// Returns an error if the factor is negative.
    pub fn set_discount_factor(&mut self, discount_factor: f32) -> Result<(), Box<dyn Error>> {
        if discount_factor < 0.0 {
            return Err("The discount factor must not be negative.".into());
        }
        self.discount_factor = discount_factor;
        Ok(())
    }

    /// Sets the decision-distribution prior strength.
    ///
    /// # Errors
    ///
    /// Returns an error if the hyperparameter is not strictly positive.
    pub fn set_decision_prior_hyperparam(&mut self, value: f32) -> Result<(), Box<dyn Error>> {
        if value <= 0.0 {
            return Err("The decision prior hyperparameter must be greater than 0.".into());
        }
        self.decision_prior_hyperparam = value;
        Ok(())
    }

    /// Sets the number of samples after which a paused node is forced to
    /// split again. Zero disables the override.
    pub fn set_max_samples_in_one_node(&mut self, value: u32) {
        self.max_samples_in_one_node = value;
    }

    /// Sets the uncertainty measure used for confidence scoring.
    ///
    /// # Arguments
    ///
    /// * `measure` - 0 = best-vs-second-best margin, 1 = normalized entropy,
    ///   2 = normalized leaf density, 3 = uniform baseline.
    ///
    /// # Errors
    ///
    /// Returns an error for any other value.
    pub fn set_confidence_measure(&mut self, measure: u8) -> Result<(), Box<dyn Error>> {
        if measure > 3 {
            return Err("The confidence measure must be one of 0, 1, 2 or 3.".into());
        }
        self.confidence_measure = measure;
        Ok(())
    }

    /// Sets the exponent applied to the normalized leaf density in the
    /// confidence score.
    pub fn set_density_exponent(&mut self, exponent: f32) {
        self.density_exponent = exponent;
    }

    /// Enables debug output in the experiment driver.
    pub fn set_debug(&mut self, debug: bool) {
        self.debug = debug;
    }

    /// The smoothing discount rate for a given feature dimension.
    pub fn discount_param(&self, feature_dim: usize) -> f32 {
        self.discount_factor * feature_dim as f32
    }
}
