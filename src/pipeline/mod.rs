pub mod model_config;
pub mod module;
pub mod processing;
pub mod triton_client;
pub mod utils;
pub mod verify_pipeline;
