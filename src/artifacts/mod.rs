//! Test report artifacts: failure evidence and run metadata

mod capture;
mod environment;

pub use capture::{
    capture_bridge_screenshot, capture_failure, capture_logcat, ArtifactSink, FailureContext,
};
pub use environment::{write_environment_file, EnvironmentInfo};
