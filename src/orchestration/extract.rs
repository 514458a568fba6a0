//! Best-effort extraction of dependencies and declared names from subtask
//! output.
//!
//! Pattern matching over generated text is inherently heuristic, so the
//! extraction sits behind a trait: the integrator only sees the interface
//! and a stricter static-analysis implementation can be swapped in later.

use regex::Regex;

/// Extracts external dependencies and declared names from free-form
/// subtask output.
pub trait DependencyExtractor: Send + Sync {
    /// Names of external modules/packages the text imports.
    fn external_dependencies(&self, text: &str) -> Vec<String>;

    /// Names the text itself declares (functions, types).
    fn declared_names(&self, text: &str) -> Vec<String>;
}

/// Regex-based extractor covering common import and declaration syntaxes.
pub struct RegexExtractor {
    import_patterns: Vec<Regex>,
    name_patterns: Vec<Regex>,
}

impl RegexExtractor {
    pub fn new() -> Self {
        let import_patterns = [
            r#"(?m)^\s*import\s+([A-Za-z_][\w./-]*)"#,
            r#"(?m)^\s*from\s+([A-Za-z_][\w.]*)\s+import"#,
            r#"require\(['"]([^'"]+)['"]\)"#,
            r#"(?m)^\s*use\s+([A-Za-z_][\w:]*)"#,
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

        let name_patterns = [
            r"\bfn\s+([A-Za-z_]\w*)",
            r"\bfunction\s+([A-Za-z_]\w*)",
            r"\bdef\s+([A-Za-z_]\w*)",
            r"\bclass\s+([A-Za-z_]\w*)",
            r"\bstruct\s+([A-Za-z_]\w*)",
            r"\b(?:interface|trait)\s+([A-Za-z_]\w*)",
        ]
        .iter()
        .filter_map(|p| Regex::new(p).ok())
        .collect();

        Self {
            import_patterns,
            name_patterns,
        }
    }

    fn collect(patterns: &[Regex], text: &str) -> Vec<String> {
        let mut seen = Vec::new();
        for pattern in patterns {
            for captures in pattern.captures_iter(text) {
                if let Some(name) = captures.get(1) {
                    let name = name.as_str().to_string();
                    if !seen.contains(&name) {
                        seen.push(name);
                    }
                }
            }
        }
        seen
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl DependencyExtractor for RegexExtractor {
    fn external_dependencies(&self, text: &str) -> Vec<String> {
        Self::collect(&self.import_patterns, text)
    }

    fn declared_names(&self, text: &str) -> Vec<String> {
        Self::collect(&self.name_patterns, text)
    }
}
