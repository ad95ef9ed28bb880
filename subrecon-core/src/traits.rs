//! Core trait definitions shared across subrecon crates.

/// A type that can produce a summary of its contents.
pub trait Summarizable {
    /// A one-line summary suitable for display.
    fn summary(&self) -> String;
}

/// A type that can describe itself in a multi-line, human-readable report.
///
/// Used for the run preamble (substitution model, rate categories).
pub trait Reportable {
    /// Lines of the report, without trailing newlines.
    fn report_lines(&self) -> Vec<String>;
}
