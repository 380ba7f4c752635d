pub mod verify_pipeline;
