use crate::{Result, StatementBuffer};

/// Host expression nodes that may be pushed down to a remote dialect.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum Expr {
    Column(usize),
    Literal(Literal),
    Comparison {
        op: ComparisonOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    IsNull {
        expr: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    Connective {
        op: Connective,
        operands: Vec<Expr>,
    },
    Not(Box<Expr>),
    Arithmetic {
        op: ArithmeticOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
    DateAdd {
        date: Box<Expr>,
        interval: Box<Expr>,
        unit: IntervalUnit,
        subtract: bool,
    },
    FullTextMatch {
        columns: Vec<usize>,
        against: String,
        boolean_mode: bool,
    },
    Spatial {
        op: SpatialOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    UserFunction {
        name: String,
        args: Vec<Expr>,
    },
    Aggregate {
        func: AggregateFunc,
        args: Vec<Expr>,
        distinct: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Integer(i64),
    Decimal(String),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    NullSafeEq,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Connective {
    And,
    Or,
    Xor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArithmeticOp {
    Add,
    Sub,
    Mul,
    Div,
    IntDiv,
    Mod,
    BitAnd,
    BitOr,
    BitXor,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntervalUnit {
    Year,
    Quarter,
    Month,
    Week,
    Day,
    Hour,
    Minute,
    Second,
    Microsecond,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SpatialOp {
    MbrEqual,
    MbrContains,
    MbrIntersects,
    MbrWithin,
    MbrDisjoint,
    MbrTouches,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AggregateFunc {
    Count,
    Sum,
    Avg,
    Min,
    Max,
    StdDev,
    Variance,
    GroupConcat,
    BitAnd,
    BitOr,
}

impl Expr {
    #[must_use]
    pub fn column(index: usize) -> Self {
        Self::Column(index)
    }

    #[must_use]
    pub fn literal(literal: Literal) -> Self {
        Self::Literal(literal)
    }

    #[must_use]
    pub fn compare(op: ComparisonOp, left: Expr, right: Expr) -> Self {
        Self::Comparison {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    #[must_use]
    pub fn and(operands: Vec<Expr>) -> Self {
        Self::Connective {
            op: Connective::And,
            operands,
        }
    }

    #[must_use]
    pub fn function(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self::Function {
            name: name.into(),
            args,
        }
    }
}

/// Renders host expressions as remote dialect text.
///
/// `out == None` asks only whether the expression can be pushed down. When
/// `Err(Error::Unsupported)` is returned nothing is left in `out`.
pub trait ConditionSerializer {
    fn serialize(
        &self,
        expr: &Expr,
        out: Option<&mut StatementBuffer>,
        alias: &str,
    ) -> Result<()>;

    fn can_push_down(&self, expr: &Expr, alias: &str) -> bool {
        self.serialize(expr, None, alias).is_ok()
    }
}
