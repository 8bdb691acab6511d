pub mod rendering;

pub use rendering::{
    ArtifactSink, RenderError, RenderedImage, SinkError, VariationRenderer,
};
