use tablelink_core::{
    AggregateFunc, ArithmeticOp, ComparisonOp, ConditionSerializer, Connective, Error, Expr,
    IntervalUnit, Literal, Result, SpatialOp, StatementBuffer,
};

use crate::quote::{append_hex_literal, append_string_literal, is_numeric_literal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    fn accepts(self, count: usize) -> bool {
        match self {
            Self::Exact(expected) => count == expected,
            Self::Range(low, high) => (low..=high).contains(&count),
            Self::AtLeast(low) => count >= low,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FunctionRule {
    Keep,
    Rename(&'static str),
    /// `{N}` is replaced by the N-th rendered argument.
    Template(&'static str),
    Concat,
    Unsupported,
}

const FUNCTION_RULES: &[(&str, Arity, FunctionRule)] = &[
    ("abs", Arity::Exact(1), FunctionRule::Keep),
    ("ceil", Arity::Exact(1), FunctionRule::Keep),
    ("ceiling", Arity::Exact(1), FunctionRule::Rename("CEIL")),
    ("floor", Arity::Exact(1), FunctionRule::Keep),
    ("round", Arity::Range(1, 2), FunctionRule::Keep),
    ("truncate", Arity::Exact(2), FunctionRule::Rename("TRUNC")),
    ("mod", Arity::Exact(2), FunctionRule::Keep),
    ("power", Arity::Exact(2), FunctionRule::Keep),
    ("pow", Arity::Exact(2), FunctionRule::Rename("POWER")),
    ("sqrt", Arity::Exact(1), FunctionRule::Keep),
    ("exp", Arity::Exact(1), FunctionRule::Keep),
    ("ln", Arity::Exact(1), FunctionRule::Keep),
    ("log", Arity::Exact(1), FunctionRule::Rename("LN")),
    ("log", Arity::Exact(2), FunctionRule::Keep),
    ("log10", Arity::Exact(1), FunctionRule::Template("LOG(10, {0})")),
    ("sign", Arity::Exact(1), FunctionRule::Keep),
    ("greatest", Arity::AtLeast(2), FunctionRule::Keep),
    ("least", Arity::AtLeast(2), FunctionRule::Keep),
    ("lower", Arity::Exact(1), FunctionRule::Keep),
    ("lcase", Arity::Exact(1), FunctionRule::Rename("LOWER")),
    ("upper", Arity::Exact(1), FunctionRule::Keep),
    ("ucase", Arity::Exact(1), FunctionRule::Rename("UPPER")),
    ("length", Arity::Exact(1), FunctionRule::Rename("LENGTHB")),
    ("char_length", Arity::Exact(1), FunctionRule::Rename("LENGTH")),
    ("trim", Arity::Exact(1), FunctionRule::Keep),
    ("ltrim", Arity::Exact(1), FunctionRule::Keep),
    ("rtrim", Arity::Exact(1), FunctionRule::Keep),
    ("lpad", Arity::Exact(3), FunctionRule::Keep),
    ("rpad", Arity::Exact(3), FunctionRule::Keep),
    ("replace", Arity::Exact(3), FunctionRule::Keep),
    ("reverse", Arity::Exact(1), FunctionRule::Unsupported),
    ("substring", Arity::Range(2, 3), FunctionRule::Rename("SUBSTR")),
    ("substr", Arity::Range(2, 3), FunctionRule::Keep),
    ("mid", Arity::Exact(3), FunctionRule::Rename("SUBSTR")),
    ("left", Arity::Exact(2), FunctionRule::Template("SUBSTR({0}, 1, {1})")),
    ("locate", Arity::Exact(2), FunctionRule::Template("INSTR({1}, {0})")),
    ("locate", Arity::Exact(3), FunctionRule::Template("INSTR({1}, {0}, {2})")),
    ("instr", Arity::Exact(2), FunctionRule::Keep),
    ("concat", Arity::AtLeast(1), FunctionRule::Concat),
    ("ifnull", Arity::Exact(2), FunctionRule::Rename("NVL")),
    ("nvl", Arity::Exact(2), FunctionRule::Keep),
    ("coalesce", Arity::AtLeast(1), FunctionRule::Keep),
    ("nullif", Arity::Exact(2), FunctionRule::Keep),
    ("now", Arity::Exact(0), FunctionRule::Template("SYSDATE")),
    ("sysdate", Arity::Exact(0), FunctionRule::Template("SYSDATE")),
    ("current_timestamp", Arity::Exact(0), FunctionRule::Template("SYSDATE")),
    ("curdate", Arity::Exact(0), FunctionRule::Template("TRUNC(SYSDATE)")),
    ("current_date", Arity::Exact(0), FunctionRule::Template("TRUNC(SYSDATE)")),
    ("rand", Arity::Range(0, 1), FunctionRule::Unsupported),
    ("date_format", Arity::Exact(2), FunctionRule::Unsupported),
    ("unix_timestamp", Arity::Range(0, 1), FunctionRule::Unsupported),
];

/// How an interval is applied to a date: the numeric day representation
/// takes arithmetic, month-based units go through `ADD_MONTHS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum IntervalRule {
    Days { multiplier: u32, divisor: u32 },
    Months { multiplier: u32 },
    Unsupported,
}

const INTERVAL_RULES: &[(IntervalUnit, IntervalRule)] = &[
    (IntervalUnit::Day, IntervalRule::Days { multiplier: 1, divisor: 1 }),
    (IntervalUnit::Week, IntervalRule::Days { multiplier: 7, divisor: 1 }),
    (IntervalUnit::Hour, IntervalRule::Days { multiplier: 1, divisor: 24 }),
    (IntervalUnit::Minute, IntervalRule::Days { multiplier: 1, divisor: 1440 }),
    (IntervalUnit::Second, IntervalRule::Days { multiplier: 1, divisor: 86400 }),
    (IntervalUnit::Month, IntervalRule::Months { multiplier: 1 }),
    (IntervalUnit::Quarter, IntervalRule::Months { multiplier: 3 }),
    (IntervalUnit::Year, IntervalRule::Months { multiplier: 12 }),
    (IntervalUnit::Microsecond, IntervalRule::Unsupported),
];

/// Renders host expressions in the remote dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OracleSerializer {
    columns: Vec<String>,
}

impl OracleSerializer {
    /// `columns` are the quoted remote column names, by host column index.
    #[must_use]
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    fn write(&self, expr: &Expr, buf: &mut StatementBuffer, alias: &str) -> Result<()> {
        match expr {
            Expr::Column(index) => {
                let name = self.columns.get(*index).ok_or(Error::Unsupported)?;
                buf.append(alias)?;
                buf.append(name)
            }
            Expr::Literal(literal) => write_literal(literal, buf),
            Expr::Comparison { op, left, right } => self.write_comparison(*op, left, right, buf, alias),
            Expr::InList {
                expr,
                list,
                negated,
            } => {
                if list.is_empty() {
                    return Err(Error::Unsupported);
                }
                self.write(expr, buf, alias)?;
                buf.append(if *negated { " NOT IN (" } else { " IN (" })?;
                self.write_list(list, ", ", buf, alias)?;
                buf.append_char(')')
            }
            Expr::Between {
                expr,
                low,
                high,
                negated,
            } => {
                buf.append_char('(')?;
                self.write(expr, buf, alias)?;
                buf.append(if *negated { " NOT BETWEEN " } else { " BETWEEN " })?;
                self.write(low, buf, alias)?;
                buf.append(" AND ")?;
                self.write(high, buf, alias)?;
                buf.append_char(')')
            }
            Expr::IsNull { expr, negated } => {
                self.write(expr, buf, alias)?;
                buf.append(if *negated { " IS NOT NULL" } else { " IS NULL" })
            }
            Expr::Like {
                expr,
                pattern,
                negated,
            } => {
                self.write(expr, buf, alias)?;
                buf.append(if *negated { " NOT LIKE " } else { " LIKE " })?;
                self.write(pattern, buf, alias)?;
                // Host patterns escape wildcards with a backslash; the remote has no default.
                buf.append(" ESCAPE '\\'")
            }
            Expr::Connective { op, operands } => {
                let separator = match op {
                    Connective::And => " AND ",
                    Connective::Or => " OR ",
                    Connective::Xor => return Err(Error::Unsupported),
                };
                if operands.is_empty() {
                    return Err(Error::Unsupported);
                }
                buf.append_char('(')?;
                self.write_list(operands, separator, buf, alias)?;
                buf.append_char(')')
            }
            Expr::Not(inner) => {
                buf.append("NOT (")?;
                self.write(inner, buf, alias)?;
                buf.append_char(')')
            }
            Expr::Arithmetic { op, left, right } => self.write_arithmetic(*op, left, right, buf, alias),
            Expr::Function { name, args } => self.write_function(name, args, buf, alias),
            Expr::DateAdd {
                date,
                interval,
                unit,
                subtract,
            } => self.write_date_add(date, interval, *unit, *subtract, buf, alias),
            Expr::FullTextMatch {
                columns,
                against,
                boolean_mode,
            } => {
                let [column] = columns.as_slice() else {
                    return Err(Error::Unsupported);
                };
                if *boolean_mode {
                    return Err(Error::Unsupported);
                }
                buf.append("CONTAINS(")?;
                self.write(&Expr::Column(*column), buf, alias)?;
                buf.append(", ")?;
                append_string_literal(buf, against)?;
                buf.append(") > 0")
            }
            Expr::Spatial { op, left, right } => {
                let mask = match op {
                    SpatialOp::MbrEqual => "EQUAL",
                    SpatialOp::MbrContains => "CONTAINS",
                    SpatialOp::MbrIntersects => "ANYINTERACT",
                    SpatialOp::MbrWithin => "INSIDE+COVEREDBY",
                    SpatialOp::MbrDisjoint => "DISJOINT",
                    SpatialOp::MbrTouches => "TOUCH",
                };
                buf.append("SDO_RELATE(")?;
                self.write(left, buf, alias)?;
                buf.append(", ")?;
                self.write(right, buf, alias)?;
                buf.append_fmt(format_args!(", 'mask={mask}') = 'TRUE'"))
            }
            Expr::UserFunction { name, args } => {
                if name.is_empty()
                    || !name
                        .bytes()
                        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
                {
                    return Err(Error::Unsupported);
                }
                buf.append(&name.to_ascii_uppercase())?;
                buf.append_char('(')?;
                self.write_list(args, ", ", buf, alias)?;
                buf.append_char(')')
            }
            Expr::Aggregate {
                func,
                args,
                distinct,
            } => self.write_aggregate(*func, args, *distinct, buf, alias),
            _ => Err(Error::Unsupported),
        }
    }

    fn write_list(
        &self,
        items: &[Expr],
        separator: &str,
        buf: &mut StatementBuffer,
        alias: &str,
    ) -> Result<()> {
        for (index, item) in items.iter().enumerate() {
            if index > 0 {
                buf.append(separator)?;
            }
            self.write(item, buf, alias)?;
        }
        Ok(())
    }

    fn write_comparison(
        &self,
        op: ComparisonOp,
        left: &Expr,
        right: &Expr,
        buf: &mut StatementBuffer,
        alias: &str,
    ) -> Result<()> {
        let symbol = match op {
            ComparisonOp::Eq => " = ",
            ComparisonOp::NotEq => " <> ",
            ComparisonOp::Lt => " < ",
            ComparisonOp::LtEq => " <= ",
            ComparisonOp::Gt => " > ",
            ComparisonOp::GtEq => " >= ",
            ComparisonOp::NullSafeEq => {
                buf.append("DECODE(")?;
                self.write(left, buf, alias)?;
                buf.append(", ")?;
                self.write(right, buf, alias)?;
                return buf.append(", 1, 0) = 1");
            }
        };
        self.write(left, buf, alias)?;
        buf.append(symbol)?;
        self.write(right, buf, alias)
    }

    fn write_arithmetic(
        &self,
        op: ArithmeticOp,
        left: &Expr,
        right: &Expr,
        buf: &mut StatementBuffer,
        alias: &str,
    ) -> Result<()> {
        let (open, middle, close) = match op {
            ArithmeticOp::Add => ("(", " + ", ")"),
            ArithmeticOp::Sub => ("(", " - ", ")"),
            ArithmeticOp::Mul => ("(", " * ", ")"),
            ArithmeticOp::Div => ("(", " / ", ")"),
            ArithmeticOp::IntDiv => ("TRUNC(", " / ", ")"),
            ArithmeticOp::Mod => ("MOD(", ", ", ")"),
            ArithmeticOp::BitAnd => ("BITAND(", ", ", ")"),
            ArithmeticOp::BitOr | ArithmeticOp::BitXor => {
                let factor = if op == ArithmeticOp::BitOr { "" } else { "2 * " };
                buf.append_char('(')?;
                self.write(left, buf, alias)?;
                buf.append(" + ")?;
                self.write(right, buf, alias)?;
                buf.append_fmt(format_args!(" - {factor}BITAND("))?;
                self.write(left, buf, alias)?;
                buf.append(", ")?;
                self.write(right, buf, alias)?;
                return buf.append("))");
            }
        };
        buf.append(open)?;
        self.write(left, buf, alias)?;
        buf.append(middle)?;
        self.write(right, buf, alias)?;
        buf.append(close)
    }

    fn write_function(
        &self,
        name: &str,
        args: &[Expr],
        buf: &mut StatementBuffer,
        alias: &str,
    ) -> Result<()> {
        let rule = FUNCTION_RULES
            .iter()
            .find(|(rule_name, arity, _)| {
                rule_name.eq_ignore_ascii_case(name) && arity.accepts(args.len())
            })
            .map(|(_, _, rule)| *rule)
            .ok_or(Error::Unsupported)?;

        match rule {
            FunctionRule::Keep | FunctionRule::Rename(_) => {
                let remote_name = match rule {
                    FunctionRule::Rename(renamed) => renamed.to_string(),
                    _ => name.to_ascii_uppercase(),
                };
                buf.append(&remote_name)?;
                buf.append_char('(')?;
                self.write_list(args, ", ", buf, alias)?;
                buf.append_char(')')
            }
            FunctionRule::Template(template) => self.write_template(template, args, buf, alias),
            FunctionRule::Concat => {
                buf.append_char('(')?;
                self.write_list(args, " || ", buf, alias)?;
                buf.append_char(')')
            }
            FunctionRule::Unsupported => Err(Error::Unsupported),
        }
    }

    fn write_template(
        &self,
        template: &str,
        args: &[Expr],
        buf: &mut StatementBuffer,
        alias: &str,
    ) -> Result<()> {
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            buf.append(&rest[..open])?;
            let close = rest[open..]
                .find('}')
                .map(|offset| open + offset)
                .ok_or(Error::Unsupported)?;
            let index: usize = rest[open + 1..close]
                .parse()
                .map_err(|_| Error::Unsupported)?;
            let arg = args.get(index).ok_or(Error::Unsupported)?;
            self.write(arg, buf, alias)?;
            rest = &rest[close + 1..];
        }
        buf.append(rest)
    }

    fn write_date_add(
        &self,
        date: &Expr,
        interval: &Expr,
        unit: IntervalUnit,
        subtract: bool,
        buf: &mut StatementBuffer,
        alias: &str,
    ) -> Result<()> {
        let rule = INTERVAL_RULES
            .iter()
            .find_map(|(rule_unit, rule)| (*rule_unit == unit).then_some(*rule))
            .unwrap_or(IntervalRule::Unsupported);

        match rule {
            IntervalRule::Days {
                multiplier,
                divisor,
            } => {
                buf.append_char('(')?;
                self.write(date, buf, alias)?;
                buf.append(if subtract { " - " } else { " + " })?;
                self.write(interval, buf, alias)?;
                if multiplier != 1 {
                    buf.append_fmt(format_args!(" * {multiplier}"))?;
                }
                if divisor != 1 {
                    buf.append_fmt(format_args!(" / {divisor}"))?;
                }
                buf.append_char(')')
            }
            IntervalRule::Months { multiplier } => {
                buf.append("ADD_MONTHS(")?;
                self.write(date, buf, alias)?;
                buf.append(if subtract { ", -(" } else { ", (" })?;
                self.write(interval, buf, alias)?;
                buf.append_char(')')?;
                if multiplier != 1 {
                    buf.append_fmt(format_args!(" * {multiplier}"))?;
                }
                buf.append_char(')')
            }
            IntervalRule::Unsupported => Err(Error::Unsupported),
        }
    }

    fn write_aggregate(
        &self,
        func: AggregateFunc,
        args: &[Expr],
        distinct: bool,
        buf: &mut StatementBuffer,
        alias: &str,
    ) -> Result<()> {
        let name = match func {
            AggregateFunc::Count => "COUNT",
            AggregateFunc::Sum => "SUM",
            AggregateFunc::Avg => "AVG",
            AggregateFunc::Min => "MIN",
            AggregateFunc::Max => "MAX",
            AggregateFunc::StdDev => "STDDEV",
            AggregateFunc::Variance => "VARIANCE",
            AggregateFunc::GroupConcat | AggregateFunc::BitAnd | AggregateFunc::BitOr => {
                return Err(Error::Unsupported);
            }
        };

        match args {
            [] if func == AggregateFunc::Count && !distinct => buf.append("COUNT(*)"),
            [arg] => {
                buf.append(name)?;
                buf.append(if distinct { "(DISTINCT " } else { "(" })?;
                self.write(arg, buf, alias)?;
                buf.append_char(')')
            }
            _ => Err(Error::Unsupported),
        }
    }
}

impl ConditionSerializer for OracleSerializer {
    fn serialize(
        &self,
        expr: &Expr,
        out: Option<&mut StatementBuffer>,
        alias: &str,
    ) -> Result<()> {
        match out {
            Some(buf) => {
                let start = buf.len();
                let result = self.write(expr, buf, alias);
                if result.is_err() {
                    buf.truncate(start)?;
                }
                result
            }
            None => {
                let mut scratch = StatementBuffer::new();
                self.write(expr, &mut scratch, alias)
            }
        }
    }
}

fn write_literal(literal: &Literal, buf: &mut StatementBuffer) -> Result<()> {
    match literal {
        Literal::Null => buf.append("NULL"),
        Literal::Integer(value) => buf.append_fmt(format_args!("{value}")),
        Literal::Decimal(text) => {
            if !is_numeric_literal(text) {
                return Err(Error::Unsupported);
            }
            buf.append(text)
        }
        Literal::Float(value) => {
            if !value.is_finite() {
                return Err(Error::Unsupported);
            }
            buf.append_fmt(format_args!("{value:?}"))
        }
        Literal::String(text) => append_string_literal(buf, text),
        Literal::Bytes(bytes) => append_hex_literal(buf, bytes),
        Literal::DateTime(text) => {
            buf.append("TO_DATE(")?;
            append_string_literal(buf, text)?;
            buf.append(", 'YYYY-MM-DD HH24:MI:SS')")
        }
    }
}
