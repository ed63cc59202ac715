//! Symbol emission from a parsed module.
//!
//! One pass over every class-like declaration (nested ones included),
//! emitting exactly one symbol per declaration plus its members. The walk
//! is a match over the AST variants; it returns partial results rather than
//! failing, so one malformed declaration never loses a whole file.

use crate::parsing::ast::{ClassDeclKind, ClassNode, ModuleNode};
use crate::symbol::SymbolInfo;
use crate::types::SymbolKind;
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Annotation names marking a Groovy trait on its compiled interface form.
const TRAIT_ANNOTATIONS: &[&str] = &["Trait", "groovy.transform.Trait"];
/// Marker super-interface carried by compiled traits.
const TRAIT_MARKER_INTERFACE: &str = "org.codehaus.groovy.transform.trait.Trait";
/// Suffix of the helper class the trait transform generates.
const TRAIT_HELPER_SUFFIX: &str = "$Trait$Helper";

/// Walk a module and emit its symbols.
pub fn emit_symbols(module: &ModuleNode, location: &Path) -> Vec<SymbolInfo> {
    let mut symbols = Vec::new();
    let mut seen_classes: HashSet<&str> = HashSet::new();

    let helper_owners: HashSet<String> = module
        .classes
        .iter()
        .filter_map(|c| c.name.strip_suffix(TRAIT_HELPER_SUFFIX))
        .map(str::to_string)
        .collect();

    for class in &module.classes {
        if class.is_script {
            continue;
        }
        // The same class node can be reachable twice in one pass.
        if !seen_classes.insert(class.name.as_str()) {
            continue;
        }
        emit_class(class, location, &helper_owners, &mut symbols);
    }

    for closure in &module.closures {
        push(
            &mut symbols,
            "<closure>".to_string(),
            SymbolKind::Closure,
            location,
            closure.line,
            closure.column,
        );
    }

    symbols
}

fn emit_class(
    class: &ClassNode,
    location: &Path,
    helper_owners: &HashSet<String>,
    symbols: &mut Vec<SymbolInfo>,
) {
    let kind = discriminate(class, helper_owners);
    push(
        symbols,
        class.name.clone(),
        kind,
        location,
        class.line,
        class.column,
    );

    // Every declared constructor is emitted, synthetic ones included.
    for ctor in &class.constructors {
        push(
            symbols,
            format!("{}.<init>", class.name),
            SymbolKind::Constructor,
            location,
            ctor.line,
            ctor.column,
        );
    }

    for method in &class.methods {
        if method.is_synthetic || method.is_abstract {
            continue;
        }
        push(
            symbols,
            format!("{}.{}", class.name, method.name),
            SymbolKind::Method,
            location,
            method.line,
            method.column,
        );
    }

    for field in &class.fields {
        if field.is_synthetic {
            continue;
        }
        push(
            symbols,
            format!("{}.{}", class.name, field.name),
            SymbolKind::Field,
            location,
            field.line,
            field.column,
        );
    }

    for property in &class.properties {
        push(
            symbols,
            format!("{}.{}", class.name, property.name),
            SymbolKind::Property,
            location,
            property.line,
            property.column,
        );
    }

    for constant in &class.enum_constants {
        push(
            symbols,
            format!("{}.{}", class.name, constant.name),
            SymbolKind::EnumConstant,
            location,
            constant.line,
            constant.column,
        );
    }

    for closure in &class.closures {
        push(
            symbols,
            format!("{}.<closure>", class.name),
            SymbolKind::Closure,
            location,
            closure.line,
            closure.column,
        );
    }
}

/// Kind discrimination. Interfaces are re-classified as traits when they
/// carry the trait meta-marker, inherit the trait marker interface, or a
/// `<name>$Trait$Helper` class exists in the same module.
fn discriminate(class: &ClassNode, helper_owners: &HashSet<String>) -> SymbolKind {
    match class.kind {
        ClassDeclKind::Trait => SymbolKind::Trait,
        ClassDeclKind::Enum => SymbolKind::Enum,
        ClassDeclKind::Annotation => SymbolKind::Annotation,
        ClassDeclKind::Class => SymbolKind::Class,
        ClassDeclKind::Interface => {
            let annotated = class
                .annotations
                .iter()
                .any(|a| TRAIT_ANNOTATIONS.contains(&a.as_str()));
            let marker_parent = class
                .interfaces
                .iter()
                .any(|i| i == TRAIT_MARKER_INTERFACE);
            let has_helper = helper_owners.contains(&class.name);
            if annotated || marker_parent || has_helper {
                SymbolKind::Trait
            } else {
                SymbolKind::Interface
            }
        }
    }
}

fn push(
    symbols: &mut Vec<SymbolInfo>,
    name: String,
    kind: SymbolKind,
    location: &Path,
    line: i64,
    column: i64,
) {
    match SymbolInfo::new(name, kind, location, line, column) {
        Ok(symbol) => symbols.push(symbol),
        Err(err) => warn!("skipping invalid symbol: {err}"),
    }
}
