pub mod api;
pub mod classifier;
pub mod pipeline;
pub mod player;
pub mod recommender;

pub use classifier::HttpClassifier;
pub use pipeline::RecognitionPipeline;
pub use player::{PlayerHandle, PlayerSnapshot, spawn_player};
pub use recommender::HttpRecommender;
