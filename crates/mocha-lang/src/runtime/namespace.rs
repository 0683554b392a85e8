use std::fmt::{self, Display, Formatter};

/// Identifier of a namespace declared by the host with `Engine::register_namespace`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NamespaceId(pub(crate) u32);

/// A category of variable storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Namespace {
    /// Persistent per-entity state, `variable` or `v`.
    Variable,
    /// Host-provided context, `context` or `c`.
    Context,
    /// Scratch values cleared before every evaluation, `temp` or `t`.
    Temp,
    Geometry,
    /// Host queries, `query` or `q`.
    Query,
    /// Function-only namespace of the standard library.
    Math,
    Custom(NamespaceId),
}

impl Namespace {
    pub const BUILTIN: [Namespace; 6] = [
        Namespace::Variable,
        Namespace::Context,
        Namespace::Temp,
        Namespace::Geometry,
        Namespace::Query,
        Namespace::Math,
    ];

    /// Resolves a built-in tag or one of its aliases.
    pub fn builtin(tag: &str) -> Option<Namespace> {
        match tag {
            "variable" | "v" => Some(Namespace::Variable),
            "context" | "c" => Some(Namespace::Context),
            "temp" | "t" => Some(Namespace::Temp),
            "geometry" => Some(Namespace::Geometry),
            "query" | "q" => Some(Namespace::Query),
            "math" => Some(Namespace::Math),
            _ => None,
        }
    }

    /// Whether scripts may store values in this namespace.
    pub fn is_writable(&self) -> bool {
        !matches!(self, Namespace::Math)
    }
}

impl Display for Namespace {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Variable => write!(f, "variable"),
            Namespace::Context => write!(f, "context"),
            Namespace::Temp => write!(f, "temp"),
            Namespace::Geometry => write!(f, "geometry"),
            Namespace::Query => write!(f, "query"),
            Namespace::Math => write!(f, "math"),
            Namespace::Custom(id) => write!(f, "custom#{}", id.0),
        }
    }
}
