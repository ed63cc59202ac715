//! Declaration-level AST handed from the parser seam to the symbol visitor.
//!
//! The taxonomy is a closed set of plain variants rather than an open class
//! hierarchy: the visitor is a match over these shapes. Positions are kept
//! as signed values because parsers may report unknown positions as -1; the
//! visitor clamps them when emitting symbols.

/// A parsed source module: one file's worth of declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleNode {
    /// Declared package, e.g. `com.example`, or empty for the default package.
    pub package: String,
    /// Every class-like declaration in the module, nested ones included.
    pub classes: Vec<ClassNode>,
    /// Closure expressions found outside any class body.
    pub closures: Vec<ClosureNode>,
}

/// What a class-like declaration was declared as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassDeclKind {
    Class,
    Interface,
    Trait,
    Enum,
    Annotation,
}

/// A class, interface, trait, enum or annotation declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassNode {
    /// Fully qualified name; nested declarations use `Outer$Inner`.
    pub name: String,
    pub kind: ClassDeclKind,
    pub line: i64,
    pub column: i64,
    /// Synthetic module-level wrapper for script statements.
    pub is_script: bool,
    /// Simple and fully qualified annotation names attached to the declaration.
    pub annotations: Vec<String>,
    /// Declared super-interfaces (as written in the source).
    pub interfaces: Vec<String>,
    pub constructors: Vec<MethodNode>,
    pub methods: Vec<MethodNode>,
    pub fields: Vec<FieldNode>,
    pub properties: Vec<PropertyNode>,
    pub enum_constants: Vec<EnumConstantNode>,
    /// Closure expressions encountered inside this class body.
    pub closures: Vec<ClosureNode>,
}

impl ClassNode {
    pub fn new(name: impl Into<String>, kind: ClassDeclKind, line: i64, column: i64) -> Self {
        Self {
            name: name.into(),
            kind,
            line,
            column,
            is_script: false,
            annotations: Vec::new(),
            interfaces: Vec::new(),
            constructors: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            properties: Vec::new(),
            enum_constants: Vec::new(),
            closures: Vec::new(),
        }
    }

    /// Simple (unqualified) name of the declaration.
    pub fn simple_name(&self) -> &str {
        let after_dot = self.name.rsplit('.').next().unwrap_or(&self.name);
        after_dot.rsplit('$').next().unwrap_or(after_dot)
    }
}

/// A method or constructor declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNode {
    pub name: String,
    pub line: i64,
    pub column: i64,
    pub is_synthetic: bool,
    pub is_abstract: bool,
}

/// A field declaration (explicit visibility modifier present).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldNode {
    pub name: String,
    pub line: i64,
    pub column: i64,
    pub is_synthetic: bool,
}

/// A Groovy property (declaration without visibility modifier).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyNode {
    pub name: String,
    pub line: i64,
    pub column: i64,
}

/// A named enum constant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumConstantNode {
    pub name: String,
    pub line: i64,
    pub column: i64,
}

/// A closure expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosureNode {
    pub line: i64,
    pub column: i64,
}
