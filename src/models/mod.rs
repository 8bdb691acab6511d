// Data layer: the persisted generation task and its parsed request forms.

pub mod task;

pub use task::{BatchRequest, GenerationTask, TaskType};
