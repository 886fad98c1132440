mod load;
mod types;

pub use load::{get_kondate_data_dir, load_default};
pub use types::{
    AppConfig, ConfirmationConfig, ExecutorConfig, LoggingConfig, SessionConfig,
};
