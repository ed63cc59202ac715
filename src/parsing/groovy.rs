//! Declaration-level Groovy scanner.
//!
//! The indexer only needs declarations: packages, class-like declarations
//! (with nesting), members and closure expressions. This scanner blanks
//! comments and string literals, then walks the text as segments delimited
//! by `{`, `}`, `;` and newlines while tracking brace depth, so member
//! recognition only ever fires at the direct-member depth of an open
//! class body. Slashy strings and declarations whose header is split from
//! its `{` by a blank statement are out of scope for this pass.

use crate::parsing::ast::{
    ClassDeclKind, ClassNode, ClosureNode, EnumConstantNode, FieldNode, MethodNode, ModuleNode,
    PropertyNode,
};
use crate::parsing::GroovyParser;
use regex::Regex;

const CONTROL_KEYWORDS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "return", "new", "assert", "throw", "else", "do",
    "try", "synchronized",
];

const NON_TYPE_KEYWORDS: &[&str] = &[
    "return", "throw", "new", "case", "import", "package", "assert", "else", "in", "instanceof",
];

/// Scanner implementing the [`GroovyParser`] seam.
pub struct DeclarationScanner {
    package_re: Regex,
    class_re: Regex,
    method_re: Regex,
    field_re: Regex,
    annotation_only_re: Regex,
    extends_re: Regex,
    implements_re: Regex,
}

impl Default for DeclarationScanner {
    fn default() -> Self {
        Self::new()
    }
}

impl DeclarationScanner {
    pub fn new() -> Self {
        let modifiers = r"(?:public|protected|private|static|final|abstract|strictfp|sealed|non-sealed|synchronized|native|default|transient|volatile)";
        Self {
            package_re: Regex::new(r"^package\s+([\w.]+)").expect("static pattern"),
            class_re: Regex::new(&format!(
                r"^((?:@[\w.$]+(?:\([^)]*\))?\s+)*)((?:{modifiers}\s+)*)(class|interface|trait|enum|@\s*interface)\s+([A-Za-z_$][\w$]*)(.*)$"
            ))
            .expect("static pattern"),
            method_re: Regex::new(&format!(
                r"^((?:@[\w.$]+(?:\([^)]*\))?\s+)*)((?:{modifiers}\s+)*)(?:(def)\s+|([\w.$]+(?:<[^>]*>)?(?:\[\])*)\s+)?([A-Za-z_$][\w$]*)\s*\("
            ))
            .expect("static pattern"),
            field_re: Regex::new(&format!(
                r"^((?:@[\w.$]+(?:\([^)]*\))?\s+)*)((?:{modifiers}\s+)*)(?:(def)\s+|([\w.$]+(?:<[^>]*>)?(?:\[\])*)\s+)([A-Za-z_$][\w$]*)\s*(=.*)?$"
            ))
            .expect("static pattern"),
            annotation_only_re: Regex::new(r"^(?:@[\w.$]+(?:\([^)]*\))?\s*)+$")
                .expect("static pattern"),
            extends_re: Regex::new(r"\bextends\s+([\w.$<>,\s]+?)(?:\bimplements\b|$)")
                .expect("static pattern"),
            implements_re: Regex::new(r"\bimplements\s+([\w.$<>,\s]+?)$").expect("static pattern"),
        }
    }
}

impl GroovyParser for DeclarationScanner {
    fn parse(&self, source: &str, _file_name: &str) -> Option<ModuleNode> {
        Some(Scan::new(self, source).run())
    }
}

/// How a segment was terminated.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Terminator {
    Newline,
    Semicolon,
    Open,
    Close,
}

/// A class declaration whose body brace has not been seen yet.
struct PendingClass {
    node: ClassNode,
    trailer: String,
}

/// An open class body.
struct Frame {
    node: ClassNode,
    body_depth: usize,
    constants_done: bool,
}

struct Scan<'a> {
    scanner: &'a DeclarationScanner,
    text: String,
    line_starts: Vec<usize>,
    module: ModuleNode,
    finished: Vec<ClassNode>,
    stack: Vec<Frame>,
    pending: Option<PendingClass>,
    pending_annotations: Vec<String>,
    depth: usize,
}

impl<'a> Scan<'a> {
    fn new(scanner: &'a DeclarationScanner, source: &str) -> Self {
        let text = blank_comments_and_strings(source);
        let mut line_starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self {
            scanner,
            text,
            line_starts,
            module: ModuleNode::default(),
            finished: Vec::new(),
            stack: Vec::new(),
            pending: None,
            pending_annotations: Vec::new(),
            depth: 0,
        }
    }

    fn position(&self, offset: usize) -> (i64, i64) {
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        let column = offset - self.line_starts[line_idx] + 1;
        (line_idx as i64 + 1, column as i64)
    }

    fn run(mut self) -> ModuleNode {
        let bytes = self.text.as_bytes().to_vec();
        let mut seg_start: Option<usize> = None;

        let mut i = 0;
        while i < bytes.len() {
            let b = bytes[i];
            match b {
                b'{' => {
                    self.handle_segment(seg_start.take(), i, Terminator::Open);
                    self.maybe_closure(&bytes, i);
                    self.depth += 1;
                    if let Some(pending) = self.pending.take() {
                        self.push_frame(pending);
                    }
                }
                b'}' => {
                    self.handle_segment(seg_start.take(), i, Terminator::Close);
                    self.depth = self.depth.saturating_sub(1);
                    while self
                        .stack
                        .last()
                        .is_some_and(|f| f.body_depth > self.depth)
                    {
                        if let Some(frame) = self.stack.pop() {
                            self.finished.push(frame.node);
                        }
                    }
                }
                b';' => self.handle_segment(seg_start.take(), i, Terminator::Semicolon),
                b'\n' => self.handle_segment(seg_start.take(), i, Terminator::Newline),
                c if c.is_ascii_whitespace() => {}
                _ => {
                    if seg_start.is_none() {
                        seg_start = Some(i);
                    }
                }
            }
            i += 1;
        }
        self.handle_segment(seg_start.take(), bytes.len(), Terminator::Newline);

        // Unbalanced input: close whatever is still open.
        if let Some(pending) = self.pending.take() {
            self.finished.push(pending.node);
        }
        while let Some(frame) = self.stack.pop() {
            self.finished.push(frame.node);
        }

        self.finished
            .sort_by_key(|c| (c.line, c.column, c.name.clone()));
        self.module.classes = std::mem::take(&mut self.finished);
        self.module
    }

    /// Closures are recognized as `{ [params] ->` with the arrow before any
    /// other structural character.
    fn maybe_closure(&mut self, bytes: &[u8], open: usize) {
        if self.pending.is_some() {
            return;
        }
        let mut j = open + 1;
        while j < bytes.len() {
            match bytes[j] {
                b'{' | b'}' | b';' | b'\n' => return,
                b'-' if j + 1 < bytes.len() && bytes[j + 1] == b'>' => {
                    let (line, column) = self.position(open);
                    let node = ClosureNode { line, column };
                    match self.stack.last_mut() {
                        Some(frame) => frame.node.closures.push(node),
                        None => self.module.closures.push(node),
                    }
                    return;
                }
                _ => {}
            }
            j += 1;
        }
    }

    fn handle_segment(&mut self, start: Option<usize>, end: usize, terminator: Terminator) {
        let Some(start) = start else {
            return;
        };
        let raw = self.text[start..end].to_string();
        let norm = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        if norm.is_empty() {
            return;
        }
        let (line, column) = self.position(start);

        // A declaration header waiting for its body consumes everything up
        // to the opening brace (`implements X` on a continuation line).
        if let Some(pending) = self.pending.as_mut() {
            pending.trailer.push(' ');
            pending.trailer.push_str(&norm);
            self.apply_super_types();
            return;
        }

        if self.scanner.annotation_only_re.is_match(&norm) {
            for ann in norm.split('@').filter(|s| !s.trim().is_empty()) {
                let name = ann
                    .split(['(', ' '])
                    .next()
                    .unwrap_or("")
                    .trim()
                    .to_string();
                if !name.is_empty() {
                    self.pending_annotations.push(name);
                }
            }
            return;
        }

        if let Some(caps) = self.scanner.class_re.captures(&norm) {
            let keyword = caps.get(3).map(|m| m.as_str().replace(' ', "")).unwrap_or_default();
            let kind = match keyword.as_str() {
                "interface" => ClassDeclKind::Interface,
                "trait" => ClassDeclKind::Trait,
                "enum" => ClassDeclKind::Enum,
                "@interface" => ClassDeclKind::Annotation,
                _ => ClassDeclKind::Class,
            };
            let simple = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
            let mut node = ClassNode::new(self.qualify(simple), kind, line, column);
            for ann in caps
                .get(1)
                .map(|m| m.as_str())
                .unwrap_or_default()
                .split('@')
                .filter(|s| !s.trim().is_empty())
            {
                let name = ann.split(['(', ' ']).next().unwrap_or("").trim();
                if !name.is_empty() {
                    node.annotations.push(name.to_string());
                }
            }
            node.annotations.append(&mut self.pending_annotations);
            let trailer = caps.get(5).map(|m| m.as_str().to_string()).unwrap_or_default();
            self.pending = Some(PendingClass { node, trailer });
            self.apply_super_types();
            return;
        }
        self.pending_annotations.clear();

        if self.stack.is_empty() {
            if self.depth == 0 && self.module.package.is_empty() {
                if let Some(caps) = self.scanner.package_re.captures(&norm) {
                    self.module.package = caps[1].to_string();
                }
            }
            return;
        }

        let member_depth = self.stack.last().map(|f| f.body_depth).unwrap_or(0);
        if self.depth != member_depth {
            return;
        }

        let in_constants_phase = self
            .stack
            .last()
            .map(|f| f.node.kind == ClassDeclKind::Enum && !f.constants_done)
            .unwrap_or(false);

        if in_constants_phase {
            if self.try_member(&norm, line, column, terminator, true) {
                if let Some(frame) = self.stack.last_mut() {
                    frame.constants_done = true;
                }
                return;
            }
            self.collect_enum_constants(&norm, line, column);
            if terminator == Terminator::Semicolon {
                if let Some(frame) = self.stack.last_mut() {
                    frame.constants_done = true;
                }
            }
            return;
        }

        self.try_member(&norm, line, column, terminator, false);
    }

    /// Attempt to record a constructor, method, field or property from a
    /// direct-member segment. With `require_marker` the match must carry an
    /// unambiguous declaration marker (modifiers, a type, `def`, or the
    /// constructor name), which keeps enum constants like `FOO(1)` intact.
    fn try_member(
        &mut self,
        norm: &str,
        line: i64,
        column: i64,
        terminator: Terminator,
        require_marker: bool,
    ) -> bool {
        let simple_name = self
            .stack
            .last()
            .map(|f| f.node.simple_name().to_string())
            .unwrap_or_default();

        // Only parentheses before any initializer make a member a method;
        // `def timeout = compute()` is still a property.
        let head = norm.split('=').next().unwrap_or(norm);
        if head.contains('(') {
            if let Some(caps) = self.scanner.method_re.captures(norm) {
                let mods = caps.get(2).map(|m| m.as_str()).unwrap_or("");
                let has_def = caps.get(3).is_some();
                let has_type = caps.get(4).is_some();
                let name = caps.get(5).map(|m| m.as_str()).unwrap_or_default();

                if CONTROL_KEYWORDS.contains(&name) {
                    return false;
                }
                if let Some(rtype) = caps.get(4) {
                    if NON_TYPE_KEYWORDS.contains(&rtype.as_str()) {
                        return false;
                    }
                }
                let is_ctor = name == simple_name && !has_type && !has_def;
                if require_marker && !is_ctor && !has_def && !has_type && mods.is_empty() {
                    return false;
                }

                let is_abstract =
                    mods.split_whitespace().any(|m| m == "abstract") || terminator != Terminator::Open;
                let node = MethodNode {
                    name: name.to_string(),
                    line,
                    column,
                    is_synthetic: false,
                    is_abstract,
                };
                if let Some(frame) = self.stack.last_mut() {
                    if is_ctor {
                        frame.node.constructors.push(node);
                    } else {
                        frame.node.methods.push(node);
                    }
                }
                return true;
            }
            return false;
        }

        if let Some(caps) = self.scanner.field_re.captures(norm) {
            let mods = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let has_def = caps.get(3).is_some();
            let name = caps.get(5).map(|m| m.as_str()).unwrap_or_default();
            if CONTROL_KEYWORDS.contains(&name) {
                return false;
            }
            if let Some(ty) = caps.get(4) {
                if NON_TYPE_KEYWORDS.contains(&ty.as_str()) {
                    return false;
                }
            }
            if require_marker && !has_def && caps.get(4).is_none() && mods.is_empty() {
                return false;
            }

            let has_visibility = mods
                .split_whitespace()
                .any(|m| matches!(m, "public" | "protected" | "private"));
            if let Some(frame) = self.stack.last_mut() {
                if has_visibility {
                    frame.node.fields.push(FieldNode {
                        name: name.to_string(),
                        line,
                        column,
                        is_synthetic: false,
                    });
                } else {
                    frame.node.properties.push(PropertyNode {
                        name: name.to_string(),
                        line,
                        column,
                    });
                }
            }
            return true;
        }
        false
    }

    fn collect_enum_constants(&mut self, norm: &str, line: i64, column: i64) {
        let mut constants = Vec::new();
        for piece in norm.split(',') {
            let piece = piece.trim().trim_end_matches(';').trim();
            if piece.is_empty() {
                continue;
            }
            let name: String = piece
                .chars()
                .take_while(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '$')
                .collect();
            if name.is_empty() || name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
                continue;
            }
            let rest = &piece[name.len()..];
            if !(rest.is_empty() || rest.starts_with('(')) {
                continue;
            }
            constants.push(EnumConstantNode { name, line, column });
        }
        if let Some(frame) = self.stack.last_mut() {
            frame.node.enum_constants.extend(constants);
        }
    }

    fn qualify(&self, simple: &str) -> String {
        if let Some(frame) = self.stack.last() {
            format!("{}${}", frame.node.name, simple)
        } else if self.module.package.is_empty() {
            simple.to_string()
        } else {
            format!("{}.{}", self.module.package, simple)
        }
    }

    fn apply_super_types(&mut self) {
        let Some(pending) = self.pending.as_mut() else {
            return;
        };
        let mut interfaces = Vec::new();
        for re in [&self.scanner.extends_re, &self.scanner.implements_re] {
            if let Some(caps) = re.captures(&pending.trailer) {
                for name in caps[1].split(',') {
                    let name = name.split('<').next().unwrap_or("").trim();
                    if !name.is_empty() {
                        interfaces.push(name.to_string());
                    }
                }
            }
        }
        pending.node.interfaces = interfaces;
    }

    fn push_frame(&mut self, pending: PendingClass) {
        self.stack.push(Frame {
            node: pending.node,
            body_depth: self.depth,
            constants_done: false,
        });
    }
}

/// Replace comments and string-literal contents (quotes included) with
/// spaces, preserving newlines so positions stay true.
fn blank_comments_and_strings(source: &str) -> String {
    #[derive(PartialEq)]
    enum State {
        Code,
        LineComment,
        BlockComment,
        Single,
        Double,
        TripleSingle,
        TripleDouble,
    }

    let bytes = source.as_bytes();
    let mut out = bytes.to_vec();
    let mut state = State::Code;
    let mut i = 0;

    let blank = |out: &mut [u8], i: usize| {
        if out[i] != b'\n' {
            out[i] = b' ';
        }
    };

    while i < bytes.len() {
        let rest = &bytes[i..];
        match state {
            State::Code => {
                if rest.starts_with(b"//") {
                    state = State::LineComment;
                    blank(&mut out, i);
                } else if rest.starts_with(b"/*") {
                    state = State::BlockComment;
                    blank(&mut out, i);
                } else if rest.starts_with(b"'''") {
                    state = State::TripleSingle;
                    blank(&mut out, i);
                    blank(&mut out, i + 1);
                    blank(&mut out, i + 2);
                    i += 2;
                } else if rest.starts_with(b"\"\"\"") {
                    state = State::TripleDouble;
                    blank(&mut out, i);
                    blank(&mut out, i + 1);
                    blank(&mut out, i + 2);
                    i += 2;
                } else if bytes[i] == b'\'' {
                    state = State::Single;
                    blank(&mut out, i);
                } else if bytes[i] == b'"' {
                    state = State::Double;
                    blank(&mut out, i);
                }
            }
            State::LineComment => {
                if bytes[i] == b'\n' {
                    state = State::Code;
                } else {
                    blank(&mut out, i);
                }
            }
            State::BlockComment => {
                if rest.starts_with(b"*/") {
                    blank(&mut out, i);
                    blank(&mut out, i + 1);
                    i += 1;
                    state = State::Code;
                } else {
                    blank(&mut out, i);
                }
            }
            State::Single | State::Double => {
                let quote = if state == State::Single { b'\'' } else { b'"' };
                if bytes[i] == b'\\' && i + 1 < bytes.len() {
                    blank(&mut out, i);
                    blank(&mut out, i + 1);
                    i += 1;
                } else if bytes[i] == quote {
                    blank(&mut out, i);
                    state = State::Code;
                } else if bytes[i] == b'\n' {
                    // Unterminated single-line literal: bail out of the string.
                    state = State::Code;
                } else {
                    blank(&mut out, i);
                }
            }
            State::TripleSingle | State::TripleDouble => {
                let close: &[u8] = if state == State::TripleSingle {
                    b"'''"
                } else {
                    b"\"\"\""
                };
                if rest.starts_with(close) {
                    blank(&mut out, i);
                    blank(&mut out, i + 1);
                    blank(&mut out, i + 2);
                    i += 2;
                    state = State::Code;
                } else {
                    blank(&mut out, i);
                }
            }
        }
        i += 1;
    }

    // Multi-byte characters are only ever blanked whole (every byte of a
    // comment or literal is replaced), so the buffer stays valid UTF-8.
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ModuleNode {
        DeclarationScanner::new()
            .parse(source, "Test.groovy")
            .unwrap()
    }

    #[test]
    fn test_simple_class_with_property() {
        let module = parse("package a\nclass Foo { String bar }\n");
        assert_eq!(module.package, "a");
        assert_eq!(module.classes.len(), 1);
        let class = &module.classes[0];
        assert_eq!(class.name, "a.Foo");
        assert_eq!(class.kind, ClassDeclKind::Class);
        assert_eq!((class.line, class.column), (2, 1));
        assert_eq!(class.properties.len(), 1);
        assert_eq!(class.properties[0].name, "bar");
    }

    #[test]
    fn test_field_vs_property() {
        let module = parse(
            "class Foo {\n    private String secret\n    String open\n    def anything = 1\n}\n",
        );
        let class = &module.classes[0];
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.fields[0].name, "secret");
        let props: Vec<_> = class.properties.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(props, vec!["open", "anything"]);
    }

    #[test]
    fn test_methods_and_constructors() {
        let module = parse(
            "package p\nclass Calc {\n    Calc(int seed) { }\n    int add(int a, int b) { a + b }\n    def scale(x) { x * 2 }\n    abstract void later()\n}\n",
        );
        let class = &module.classes[0];
        assert_eq!(class.constructors.len(), 1);
        let methods: Vec<_> = class.methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["add", "scale", "later"]);
        assert!(class.methods.iter().find(|m| m.name == "later").unwrap().is_abstract);
        assert!(!class.methods.iter().find(|m| m.name == "add").unwrap().is_abstract);
    }

    #[test]
    fn test_interface_methods_are_abstract() {
        let module = parse("interface Shape {\n    double area()\n}\n");
        let class = &module.classes[0];
        assert_eq!(class.kind, ClassDeclKind::Interface);
        assert_eq!(class.methods.len(), 1);
        assert!(class.methods[0].is_abstract);
    }

    #[test]
    fn test_trait_keyword_and_annotation() {
        let module = parse(
            "trait Flying { def fly() { 'flap' } }\n@Trait\ninterface Swimming { }\n",
        );
        assert_eq!(module.classes[0].kind, ClassDeclKind::Trait);
        assert_eq!(module.classes[1].kind, ClassDeclKind::Interface);
        assert!(module.classes[1].annotations.iter().any(|a| a == "Trait"));
    }

    #[test]
    fn test_enum_constants() {
        let module = parse(
            "enum Color {\n    RED, GREEN,\n    BLUE(255);\n    int channel() { 0 }\n}\n",
        );
        let class = &module.classes[0];
        assert_eq!(class.kind, ClassDeclKind::Enum);
        let names: Vec<_> = class.enum_constants.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["RED", "GREEN", "BLUE"]);
        assert_eq!(class.methods.len(), 1);
    }

    #[test]
    fn test_property_with_call_initializer() {
        let module = parse("class Cfg {\n    def timeout = computeTimeout()\n}\n");
        let class = &module.classes[0];
        assert!(class.methods.is_empty());
        assert_eq!(class.properties.len(), 1);
        assert_eq!(class.properties[0].name, "timeout");
    }

    #[test]
    fn test_nested_class_uses_dollar_name() {
        let module = parse("package p\nclass Outer {\n    class Inner { }\n}\n");
        let names: Vec<_> = module.classes.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["p.Outer", "p.Outer$Inner"]);
    }

    #[test]
    fn test_closures_inside_and_outside_classes() {
        let module = parse(
            "def top = { x -> x }\nclass Jobs {\n    def run() {\n        items.each { item -> println item }\n    }\n}\n",
        );
        assert_eq!(module.closures.len(), 1);
        assert_eq!(module.classes[0].closures.len(), 1);
    }

    #[test]
    fn test_comments_and_strings_ignored() {
        let module = parse(
            "// class Fake {\n/* class AlsoFake { */\nclass Real {\n    String s = \"class NotReal {\"\n}\n",
        );
        assert_eq!(module.classes.len(), 1);
        assert_eq!(module.classes[0].name, "Real");
        assert_eq!(module.classes[0].properties.len(), 1);
    }

    #[test]
    fn test_annotation_declaration() {
        let module = parse("@interface Marker { String value() }\n");
        assert_eq!(module.classes[0].kind, ClassDeclKind::Annotation);
    }

    #[test]
    fn test_extends_captured_for_interfaces() {
        let module = parse("interface Walker extends org.codehaus.groovy.transform.trait.Trait { }\n");
        assert_eq!(
            module.classes[0].interfaces,
            vec!["org.codehaus.groovy.transform.trait.Trait".to_string()]
        );
    }

    #[test]
    fn test_control_flow_not_methods() {
        let module = parse(
            "class Guard {\n    def check(x) {\n        if (x) { return x }\n        for (i in x) { }\n    }\n}\n",
        );
        let methods: Vec<_> = module.classes[0].methods.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(methods, vec!["check"]);
    }
}
