pub mod depth_stream;

pub use depth_stream::{run_depth_stream, StreamExit};
