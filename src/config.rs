//! Run configuration loaded from a JSON file.

use std::error::Error;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::forest::MondrianSettings;

/// All options of one run: data files, loader flags, forest settings and the
/// trainer's active-learning parameters. Every field has a default, so a
/// config file only needs to list what it changes.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub train_data: String,
    pub train_labels: String,
    pub test_data: String,
    pub test_labels: String,
    /// Shuffle the training order.
    pub random: bool,
    /// Sort training samples by label.
    pub sort_data: bool,
    /// Reshuffle the training order on every pass.
    pub iterative: bool,

    pub num_trees: usize,
    pub discount_factor: f32,
    pub decision_prior_hyperparam: f32,
    pub max_samples_in_one_node: u32,
    pub confidence_measure: u8,
    pub density_exponent: f32,
    pub debug: bool,

    /// Number of training samples per run; 0 means the whole stream.
    pub number_of_samples_for_training: usize,
    /// 0 = train on everything, 1 = confidence threshold, 2 = buffered top-k.
    pub active_learning: u8,
    pub active_init_set_size: u32,
    pub active_max_num_queries: u32,
    pub active_confidence_value: f32,
    pub active_batch_size: usize,
    pub active_buffer_size: usize,
    pub active_num_query_steps: usize,
    pub num_runs: usize,
    /// Master seed; 0 seeds from entropy.
    pub user_seed_config: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            train_data: String::new(),
            train_labels: String::new(),
            test_data: String::new(),
            test_labels: String::new(),
            random: false,
            sort_data: false,
            iterative: false,
            num_trees: 10,
            discount_factor: 1.0,
            decision_prior_hyperparam: 1.0,
            max_samples_in_one_node: 0,
            confidence_measure: 0,
            density_exponent: 1.0,
            debug: false,
            number_of_samples_for_training: 0,
            active_learning: 0,
            active_init_set_size: 100,
            active_max_num_queries: 1000,
            active_confidence_value: 0.75,
            active_batch_size: 100,
            active_buffer_size: 10,
            active_num_query_steps: 1,
            num_runs: 1,
            user_seed_config: 0,
        }
    }
}

impl RunConfig {
    /// Reads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns an error on an unreadable file, malformed JSON or an unknown
    /// option name.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error>> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|error| format!("Could not read config file {}: {}.", path.display(), error))?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|error| format!("Malformed config file {}: {}.", path.display(), error))?;
        if config.active_learning > 2 {
            return Err("The active learning option must be one of 0, 1 or 2.".into());
        }
        Ok(config)
    }

    /// Builds validated forest settings from this configuration.
    pub fn settings(&self) -> Result<MondrianSettings, Box<dyn Error>> {
        let mut settings = MondrianSettings::new();
        settings.set_num_trees(self.num_trees)?;
        settings.set_discount_factor(self.discount_factor)?;
        settings.set_decision_prior_hyperparam(self.decision_prior_hyperparam)?;
        settings.set_max_samples_in_one_node(self.max_samples_in_one_node);
        settings.set_confidence_measure(self.confidence_measure)?;
        settings.set_density_exponent(self.density_exponent);
        settings.set_debug(self.debug);
        Ok(settings)
    }

    /// The master seed, or `None` for entropy seeding.
    pub fn seed(&self) -> Option<u64> {
        if self.user_seed_config == 0 {
            None
        } else {
            Some(self.user_seed_config)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> std::path::PathBuf {
        let mut path = std::env::temp_dir();
        path.push(format!("mondrian-config-{}.json", contents.len()));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_defaults_are_filled_in() {
        let path = write_config(r#"{"num_trees": 25, "user_seed_config": 7}"#);
        let config = RunConfig::load(&path).unwrap();
        assert_eq!(config.num_trees, 25);
        assert_eq!(config.seed(), Some(7));
        assert_eq!(config.num_runs, 1);
        assert_eq!(config.active_learning, 0);
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_zero_seed_means_entropy() {
        let config = RunConfig::default();
        assert_eq!(config.seed(), None);
    }

    #[test]
    fn test_missing_file_is_an_error() {
        assert!(RunConfig::load("/nonexistent/config.json").is_err());
    }

    #[test]
    fn test_unknown_option_is_an_error() {
        let path = write_config(r#"{"no_such_option": 1}"#);
        assert!(RunConfig::load(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_invalid_policy_is_an_error() {
        let path = write_config(r#"{"active_learning": 3}"#);
        assert!(RunConfig::load(&path).is_err());
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_settings_are_validated() {
        let mut config = RunConfig::default();
        config.num_trees = 0;
        assert!(config.settings().is_err());
        config.num_trees = 5;
        let settings = config.settings().unwrap();
        assert_eq!(settings.num_trees, 5);
    }
}
