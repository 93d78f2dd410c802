use std::path::Path;

use crate::ProxyOptions;

/// Validation output for a set of proxy options.
#[derive(Debug, Default)]
pub struct ConfigReport {
    warnings: Vec<String>,
    errors: Vec<String>,
}

impl ConfigReport {
    /// Returns true when no errors were found.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Render errors then warnings, one `  - ` line each.
    pub fn format(&self) -> String {
        let mut out = String::new();
        for (title, items) in [("Errors", &self.errors), ("Warnings", &self.warnings)] {
            if items.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(title);
            out.push_str(":\n");
            for item in items {
                out.push_str("  - ");
                out.push_str(item);
                out.push('\n');
            }
        }
        out
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }
}

/// Validate proxy options and return a report of issues.
pub fn validate(opts: &ProxyOptions) -> ConfigReport {
    let mut report = ConfigReport::default();

    validate_cache_path(opts, &mut report);
    validate_ttl(opts, &mut report);
    validate_listener(opts, &mut report);
    validate_upstream_tls(opts, &mut report);

    report
}

fn validate_cache_path(opts: &ProxyOptions, report: &mut ConfigReport) {
    if opts.cache_path.as_os_str().is_empty() {
        report.error("cache_path is required");
        return;
    }

    let cache_path = opts.cache_path.as_path();
    if cache_path.exists() {
        if !cache_path.is_dir() {
            report.error(format!(
                "cache_path '{}' exists but is not a directory",
                cache_path.display()
            ));
        }
    } else {
        report.warn(format!(
            "cache_path '{}' does not exist; it will be created on first write",
            cache_path.display()
        ));
    }
}

fn validate_ttl(opts: &ProxyOptions, report: &mut ConfigReport) {
    if opts.ttl == 0 {
        report.warn("ttl is 0; every request will be forwarded to the backend");
    }
}

fn validate_listener(opts: &ProxyOptions, report: &mut ConfigReport) {
    if opts.host.trim().is_empty() {
        report.error("host is empty");
    }
}

fn validate_upstream_tls(opts: &ProxyOptions, report: &mut ConfigReport) {
    let Some(ca_file) = opts.upstream_ca_file.as_deref() else {
        return;
    };
    if !is_readable_file(ca_file) {
        report.error(format!(
            "upstream_ca_file '{}' is not a readable file",
            ca_file.display()
        ));
    }
}

fn is_readable_file(path: &Path) -> bool {
    path.is_file() && std::fs::File::open(path).is_ok()
}
