//! Expression Abstract Syntax Tree types

use crate::value::Value;

/// Expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // === Atoms ===
    /// Constant (`None`, `True`, numbers, strings)
    Literal(Value),
    /// Variable or function name
    Name(String),

    // === Operators ===
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<Expr>,
    },
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    /// Comparison chain: `left ops[0] comparators[0] ops[1] comparators[1] ...`
    Compare {
        left: Box<Expr>,
        ops: Vec<CompareOperator>,
        comparators: Vec<Expr>,
    },
    /// `and` / `or` over two or more operands
    BoolOp { op: BoolOperator, values: Vec<Expr> },
    /// `body if test else orelse`
    Conditional {
        test: Box<Expr>,
        body: Box<Expr>,
        orelse: Box<Expr>,
    },

    // === Calls and access ===
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Index { target: Box<Expr>, key: Box<Expr> },
    Attribute { target: Box<Expr>, name: String },

    // === Displays ===
    List(Vec<Expr>),
    /// Key and value expressions, paired positionally
    Map(Vec<(Expr, Expr)>),

    // === Parsed, evaluated by the fallback only ===
    Tuple(Vec<Expr>),
    Set(Vec<Expr>),
    Slice {
        target: Box<Expr>,
        lower: Option<Box<Expr>>,
        upper: Option<Box<Expr>>,
        step: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Node kind name used in error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Expr::Literal(_) => "Constant",
            Expr::Name(_) => "Name",
            Expr::UnaryOp { .. } => "UnaryOp",
            Expr::BinaryOp { .. } => "BinOp",
            Expr::Compare { .. } => "Compare",
            Expr::BoolOp { .. } => "BoolOp",
            Expr::Conditional { .. } => "IfExp",
            Expr::Call { .. } => "Call",
            Expr::Index { .. } => "Subscript",
            Expr::Attribute { .. } => "Attribute",
            Expr::List(_) => "List",
            Expr::Map(_) => "Dict",
            Expr::Tuple(_) => "Tuple",
            Expr::Set(_) => "Set",
            Expr::Slice { .. } => "Slice",
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    FloorDivide,
    Modulo,
    Power,

    // Fallback only
    MatMul,
    BitAnd,
    BitOr,
    BitXor,
    LeftShift,
    RightShift,
}

impl BinaryOperator {
    /// Source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::FloorDivide => "//",
            BinaryOperator::Modulo => "%",
            BinaryOperator::Power => "**",
            BinaryOperator::MatMul => "@",
            BinaryOperator::BitAnd => "&",
            BinaryOperator::BitOr => "|",
            BinaryOperator::BitXor => "^",
            BinaryOperator::LeftShift => "<<",
            BinaryOperator::RightShift => ">>",
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Plus,
    Not,
    /// Bitwise `~`, fallback only
    Invert,
}

impl UnaryOperator {
    /// Source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOperator::Negate => "-",
            UnaryOperator::Plus => "+",
            UnaryOperator::Not => "not",
            UnaryOperator::Invert => "~",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOperator {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Fallback only
    In,
    NotIn,
    Is,
    IsNot,
}

impl CompareOperator {
    /// Source symbol
    pub fn symbol(self) -> &'static str {
        match self {
            CompareOperator::Equal => "==",
            CompareOperator::NotEqual => "!=",
            CompareOperator::LessThan => "<",
            CompareOperator::LessEqual => "<=",
            CompareOperator::GreaterThan => ">",
            CompareOperator::GreaterEqual => ">=",
            CompareOperator::In => "in",
            CompareOperator::NotIn => "not in",
            CompareOperator::Is => "is",
            CompareOperator::IsNot => "is not",
        }
    }
}

/// Boolean operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoolOperator {
    And,
    Or,
}
