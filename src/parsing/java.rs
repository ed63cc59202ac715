//! Conservative regex scan for Java sources.
//!
//! Java files on the workspace only contribute coarse symbols: package-
//! qualified type declarations and method signatures. Identifiers that are
//! really control-flow keywords are filtered out of the method matches.

use crate::error::IndexResult;
use crate::symbol::SymbolInfo;
use crate::types::SymbolKind;
use regex::Regex;
use std::path::Path;

const METHOD_KEYWORD_FILTER: &[&str] = &["if", "for", "while", "switch", "catch", "return", "new"];

pub struct JavaScanner {
    package_re: Regex,
    type_re: Regex,
    method_re: Regex,
}

impl Default for JavaScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl JavaScanner {
    pub fn new() -> Self {
        Self {
            package_re: Regex::new(r"^\s*package\s+([\w.]+)\s*;").expect("static pattern"),
            type_re: Regex::new(
                r"^(\s*)(?:(?:public|protected|private|abstract|final|static|strictfp)\s+)*(class|interface|enum)\s+([A-Za-z_$][\w$]*)",
            )
            .expect("static pattern"),
            method_re: Regex::new(
                r"^(\s*)(?:(?:public|protected|private|abstract|final|static|synchronized|native|default|strictfp)\s+)+[\w.$]+(?:<[^>]*>)?(?:\[\])*\s+([A-Za-z_$][\w$]*)\s*\(",
            )
            .expect("static pattern"),
        }
    }

    /// Scan one Java source, emitting type and method symbols.
    pub fn scan(&self, source: &str, location: &Path) -> IndexResult<Vec<SymbolInfo>> {
        let mut symbols = Vec::new();
        let mut package = String::new();
        let mut current_type: Option<String> = None;

        for (idx, line) in source.lines().enumerate() {
            let line_no = idx as i64 + 1;
            let trimmed = line.trim_start();
            if trimmed.starts_with("//") || trimmed.starts_with('*') || trimmed.starts_with("/*") {
                continue;
            }

            if package.is_empty() {
                if let Some(caps) = self.package_re.captures(line) {
                    package = caps[1].to_string();
                    continue;
                }
            }

            if let Some(caps) = self.type_re.captures(line) {
                let column = caps[1].len() as i64 + 1;
                let kind = match &caps[2] {
                    "interface" => SymbolKind::Interface,
                    "enum" => SymbolKind::Enum,
                    _ => SymbolKind::Class,
                };
                let name = if package.is_empty() {
                    caps[3].to_string()
                } else {
                    format!("{package}.{}", &caps[3])
                };
                symbols.push(SymbolInfo::new(name.clone(), kind, location, line_no, column)?);
                current_type = Some(name);
                continue;
            }

            if let Some(caps) = self.method_re.captures(line) {
                let method = &caps[2];
                if METHOD_KEYWORD_FILTER.contains(&method) {
                    continue;
                }
                let Some(owner) = current_type.as_deref() else {
                    continue;
                };
                let column = caps[1].len() as i64 + 1;
                symbols.push(SymbolInfo::new(
                    format!("{owner}.{method}"),
                    SymbolKind::Method,
                    location,
                    line_no,
                    column,
                )?);
            }
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scans_types_and_methods() {
        let source = "package com.example;\n\npublic class Greeter {\n    public String greet(String who) {\n        if (who == null) {\n            return \"\";\n        }\n        return \"hi \" + who;\n    }\n}\n";
        let symbols = JavaScanner::new()
            .scan(source, Path::new("Greeter.java"))
            .unwrap();
        let names: Vec<_> = symbols.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["com.example.Greeter", "com.example.Greeter.greet"]);
        assert_eq!(symbols[0].kind(), SymbolKind::Class);
        assert_eq!(symbols[0].line(), 3);
        assert_eq!(symbols[1].kind(), SymbolKind::Method);
    }

    #[test]
    fn test_control_flow_keywords_filtered() {
        let source = "class Loop {\n    public void run() {\n        while (true) { }\n    }\n    public int for0() { return 0; }\n}\n";
        let symbols = JavaScanner::new()
            .scan(source, Path::new("Loop.java"))
            .unwrap();
        let names: Vec<_> = symbols.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Loop", "Loop.run", "Loop.for0"]);
    }

    #[test]
    fn test_interface_and_enum_kinds() {
        let source = "package p;\ninterface Svc { }\nenum Mode { ON, OFF }\n";
        let symbols = JavaScanner::new().scan(source, Path::new("X.java")).unwrap();
        assert_eq!(symbols[0].kind(), SymbolKind::Interface);
        assert_eq!(symbols[1].kind(), SymbolKind::Enum);
    }
}
