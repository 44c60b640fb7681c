//! Prelude module - common imports for xcelsql users
//!
//! ```rust
//! use xcelsql::prelude::*;
//! ```

pub use crate::{
    // Pipeline
    apply_template,
    prepare_query,
    run_query,
    // Settings
    Config,
    // Error types
    Error,
    ErrorReport,
    EvalError,
    // Identifiers
    IdentifierMapper,
    // Expressions
    Interpreter,
    MappingRecord,
    OutputFormat,
    PreparedQuery,
    QueryEngine,
    QueryRequest,
    Result,
    Row,
    Session,
    SheetSpec,
    SqlParams,
    TemplateMapping,
    ValidationError,
    Value,
};
