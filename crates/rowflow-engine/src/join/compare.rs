//! Key comparison resolved once per key part at registration.

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use rowflow_types::{Field, Row, StepError, Value, ValueKind};

/// How the two values of one key part are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rule {
    Numeric,
    String,
    Timestamp,
    Binary,
    Boolean,
    /// Declared kinds cannot be compared; fails on the first non-null pair.
    Incomparable { left: ValueKind, right: ValueKind },
}

/// Comparator for one key part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyPartComparator {
    part: usize,
    rule: Rule,
    descending: bool,
    case_insensitive: bool,
}

impl KeyPartComparator {
    /// Resolve the comparator for key part `part` from the declared kinds of
    /// that part in every stream. Ordering flags come from `first`.
    pub(crate) fn resolve(part: usize, kinds: &[ValueKind], first: &Field) -> Self {
        let lead = first.kind;
        let rule = match kinds.iter().copied().find(|k| *k != lead) {
            None => rule_for(lead),
            Some(_) if kinds.iter().all(|k| k.is_numeric()) => Rule::Numeric,
            Some(other) => Rule::Incomparable { left: lead, right: other },
        };
        Self {
            part,
            rule,
            descending: first.descending,
            case_insensitive: first.case_insensitive,
        }
    }

    /// Tri-state comparison honoring NULL placement and the descending flag.
    pub(crate) fn compare(&self, a: &Value, b: &Value) -> Result<Ordering, StepError> {
        let ord = match (a.is_null(), b.is_null()) {
            (true, true) => return Ok(Ordering::Equal),
            (true, false) => Ordering::Less,
            (false, true) => Ordering::Greater,
            (false, false) => self.compare_non_null(a, b)?,
        };
        Ok(if self.descending { ord.reverse() } else { ord })
    }

    fn compare_non_null(&self, a: &Value, b: &Value) -> Result<Ordering, StepError> {
        let ord = match (self.rule, a, b) {
            (Rule::Incomparable { left, right }, _, _) => {
                return Err(StepError::incomparable_keys(
                    "KEY_KINDS_INCOMPATIBLE",
                    format!("key part {} compares {left} with {right}", self.part),
                ));
            }
            (Rule::Numeric, _, _) => match compare_numeric(a, b) {
                Some(ord) => ord?,
                None => return Err(self.mismatch(a, b)),
            },
            (Rule::String, Value::String(x), Value::String(y)) => {
                if self.case_insensitive {
                    x.chars()
                        .flat_map(char::to_lowercase)
                        .cmp(y.chars().flat_map(char::to_lowercase))
                } else {
                    x.cmp(y)
                }
            }
            (Rule::Timestamp, Value::Timestamp(x), Value::Timestamp(y)) => x.cmp(y),
            (Rule::Binary, Value::Binary(x), Value::Binary(y)) => {
                x.len().cmp(&y.len()).then_with(|| x.cmp(y))
            }
            (Rule::Boolean, Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
            _ => return Err(self.mismatch(a, b)),
        };
        Ok(ord)
    }

    fn mismatch(&self, a: &Value, b: &Value) -> StepError {
        StepError::incomparable_keys(
            "KEY_VALUE_KIND_MISMATCH",
            format!(
                "key part {} cannot compare {} with {}",
                self.part,
                a.kind_name(),
                b.kind_name()
            ),
        )
    }
}

fn rule_for(kind: ValueKind) -> Rule {
    match kind {
        ValueKind::Integer | ValueKind::Number | ValueKind::Decimal => Rule::Numeric,
        ValueKind::String => Rule::String,
        ValueKind::Timestamp => Rule::Timestamp,
        ValueKind::Binary => Rule::Binary,
        ValueKind::Boolean => Rule::Boolean,
    }
}

/// Numeric comparison with promotion across integer, number and decimal.
///
/// Floats compare by value: `-0.0` equals `0.0` and every NaN is one value
/// sorting above `+inf`, both against other floats and against exact kinds.
fn compare_numeric(a: &Value, b: &Value) -> Option<Result<Ordering, StepError>> {
    let ord = match (a, b) {
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => canonical(*x).total_cmp(&canonical(*y)),
        (Value::Decimal(x), Value::Decimal(y)) => x.cmp(y),
        (Value::Integer(x), Value::Decimal(y)) => BigDecimal::from(*x).cmp(y),
        (Value::Decimal(x), Value::Integer(y)) => x.cmp(&BigDecimal::from(*y)),
        (Value::Integer(x), Value::Number(y)) => {
            return Some(decimal_vs_float(&BigDecimal::from(*x), *y))
        }
        (Value::Number(x), Value::Integer(y)) => {
            return Some(decimal_vs_float(&BigDecimal::from(*y), *x).map(Ordering::reverse))
        }
        (Value::Decimal(x), Value::Number(y)) => return Some(decimal_vs_float(x, *y)),
        (Value::Number(x), Value::Decimal(y)) => {
            return Some(decimal_vs_float(y, *x).map(Ordering::reverse))
        }
        _ => return None,
    };
    Some(Ok(ord))
}

fn canonical(f: f64) -> f64 {
    if f.is_nan() {
        f64::NAN
    } else {
        // IEEE addition of +0.0 maps -0.0 to +0.0 and leaves everything else.
        f + 0.0
    }
}

/// Exact comparison of a decimal against a float. NaN sorts above +inf.
fn decimal_vs_float(d: &BigDecimal, f: f64) -> Result<Ordering, StepError> {
    if f.is_nan() || (f.is_infinite() && f.is_sign_positive()) {
        return Ok(Ordering::Less);
    }
    if f.is_infinite() {
        return Ok(Ordering::Greater);
    }
    // `Display` for finite f64 never uses exponent notation.
    let fd = BigDecimal::from_str(&f.to_string()).map_err(|e| {
        StepError::internal(
            "NUMBER_CONVERSION",
            format!("cannot compare {f} with decimal {d}: {e}"),
        )
    })?;
    Ok(d.cmp(&fd))
}

/// Composite-key comparator: one [`KeyPartComparator`] per key part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct KeyComparator {
    parts: Vec<KeyPartComparator>,
}

impl KeyComparator {
    pub(crate) fn new(parts: Vec<KeyPartComparator>) -> Self {
        Self { parts }
    }

    pub(crate) fn arity(&self) -> usize {
        self.parts.len()
    }

    /// Compare `a` (keyed by `a_ordinals`) with `b` (keyed by `b_ordinals`).
    pub(crate) fn compare_rows(
        &self,
        a: &Row,
        a_ordinals: &[usize],
        b: &Row,
        b_ordinals: &[usize],
    ) -> Result<Ordering, StepError> {
        for (part, cmp) in self.parts.iter().enumerate() {
            let x = key_value(a, a_ordinals[part])?;
            let y = key_value(b, b_ordinals[part])?;
            let ord = cmp.compare(x, y)?;
            if ord != Ordering::Equal {
                return Ok(ord);
            }
        }
        Ok(Ordering::Equal)
    }
}

fn key_value(row: &Row, ordinal: usize) -> Result<&Value, StepError> {
    row.get(ordinal).ok_or_else(|| {
        StepError::data(
            "ROW_TOO_SHORT",
            format!("row has {} values, key ordinal {ordinal} is out of range", row.len()),
        )
    })
}
