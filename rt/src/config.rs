use crate::number_of_cores;
use std::env::var;

/// Sets a configuration field based on an environment variable.
macro_rules! set_from_env {
    ($config:expr, $field:ident, $key:expr, $value_type:ty) => {{
        if let Ok(raw_value) = var(concat!("FL_", $key)) {
            if let Ok(value) = raw_value.parse::<$value_type>() {
                if value > 0 {
                    $config.$field = value;
                }
            }
        };
    }};
}

/// The maximum number of workers a single pool allows.
pub(crate) const MAX_WORKERS: usize = 255;

/// The default size of each worker's stack in bytes.
pub(crate) const DEFAULT_STACK_SIZE: usize = 1024 * 1024;

/// The smallest stack size we allow.
const MIN_STACK_SIZE: usize = 64 * 1024;

/// Structure containing the configuration settings of the runtime.
#[derive(Clone, Debug)]
pub struct Config {
    /// The number of workers to start in a pool.
    pub workers: usize,

    /// The size of each worker's stack in bytes.
    pub stack_size: usize,
}

impl Config {
    pub fn new() -> Config {
        Config { workers: number_of_cores(), stack_size: DEFAULT_STACK_SIZE }
    }

    pub fn from_env() -> Config {
        let mut config = Config::new();

        set_from_env!(config, workers, "WORKERS", usize);
        set_from_env!(config, stack_size, "STACK_SIZE", usize);

        config.verify();
        config
    }

    pub(crate) fn verify(&mut self) {
        self.workers = self.workers.clamp(1, MAX_WORKERS);

        if self.stack_size < MIN_STACK_SIZE {
            self.stack_size = MIN_STACK_SIZE;
        }
    }
}
