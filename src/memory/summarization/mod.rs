pub mod coordinator;
pub mod fallback;
pub mod session;

pub use coordinator::SummarizerCoordinator;
pub use fallback::ExtractiveSummarizer;
pub use session::{SessionBuffer, SessionState};
