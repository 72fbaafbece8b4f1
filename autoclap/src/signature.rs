//! Explicit callable signatures
//!
//! A [`Signature`] describes the parameters of a command callback or a
//! composite constructor: names, annotations, defaults and kinds.

use crate::docs::DocString;
use crate::types::TypeExpr;
use serde_json::Value;

/// How a parameter binds arguments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParamKind {
    /// An ordinary named parameter
    #[default]
    Regular,
    /// Collects extra positional arguments
    VarPositional,
    /// Collects unknown options
    VarKeyword,
    /// The implicit receiver of a method, never rendered
    Receiver,
}

/// One parameter of a signature
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    pub annotation: Option<TypeExpr>,
    /// `None` when the parameter has no default; `Some(Value::Null)` for a
    /// default of none
    pub default: Option<Value>,
    pub kind: ParamKind,
    pub help: Option<String>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            annotation: None,
            default: None,
            kind: ParamKind::Regular,
            help: None,
        }
    }

    pub fn var_positional(name: impl Into<String>) -> Self {
        Self::new(name).kind(ParamKind::VarPositional)
    }

    pub fn var_keyword(name: impl Into<String>) -> Self {
        Self::new(name).kind(ParamKind::VarKeyword)
    }

    pub fn receiver() -> Self {
        Self::new("self").kind(ParamKind::Receiver)
    }

    pub fn typed(mut self, annotation: TypeExpr) -> Self {
        self.annotation = Some(annotation);
        self
    }

    pub fn default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn kind(mut self, kind: ParamKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

/// Parameters of a callable, in declaration order
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Signature {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<ParamSpec>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            doc: None,
            params: Vec::new(),
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn param(mut self, param: ParamSpec) -> Self {
        self.params.push(param);
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParamSpec> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Parameters that become CLI primitives
    pub fn regular(&self) -> impl Iterator<Item = &ParamSpec> {
        self.params.iter().filter(|p| p.kind == ParamKind::Regular)
    }

    pub fn has_kind(&self, kind: ParamKind) -> bool {
        self.params.iter().any(|p| p.kind == kind)
    }

    pub fn parsed_doc(&self) -> DocString {
        self.doc.as_deref().map(DocString::parse).unwrap_or_default()
    }
}
