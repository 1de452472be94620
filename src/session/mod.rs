//! Export sessions: settings, frame selection and the background export job.

/// Export planning and the export job.
pub mod export;
/// Export settings and project files.
pub mod settings;
