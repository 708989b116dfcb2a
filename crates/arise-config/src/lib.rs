pub mod loader;
pub mod schema;

pub use loader::{
    global_config_path, load_config, load_config_from_paths, opencode_config_dir,
    project_config_path, save_config, CONFIG_FILE_NAME,
};
pub use schema::{AgentOverride, AriseConfig, ServerConfig};
