//! Filter evaluation for in-memory documents.
//!
//! Matching follows MongoDB where the two could differ observably: equality with
//! `null` also matches a missing field, and equality with a scalar matches an
//! array field holding that scalar.

use std::cmp::Ordering;
use bson::{Bson, Document, Decimal128, Timestamp, datetime::DateTime, oid::ObjectId};

use docmodel_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::{DocumentStoreError, DocumentStoreResult},
};


/// Comparable view of a BSON value.
///
/// Integers compare exactly with each other. An integer equals a double only
/// when the double holds exactly that integer. NaN equals NaN.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Decimal(Decimal128),
    DateTime(DateTime),
    Timestamp(Timestamp),
    String(&'a str),
    ObjectId(ObjectId),
    /// Raw bytes of a binary value, UUIDs included.
    Binary(&'a [u8]),
    Array(Vec<Comparable<'a>>),
    /// Fields in document order.
    Map(Vec<(&'a str, Comparable<'a>)>),
    /// Any other value. Equal only to an identical value, never ordered.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(i64::from(*value)),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::Decimal128(value) => Comparable::Decimal(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::Timestamp(value) => Comparable::Timestamp(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(oid) => Comparable::ObjectId(*oid),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

/// Whether `double` holds exactly the integer `int`.
pub(crate) fn double_is_integer(double: f64, int: i64) -> bool {
    double.fract() == 0.0
        && double >= i64::MIN as f64
        && double < -(i64::MIN as f64)
        && double as i64 == int
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Double(a), Comparable::Double(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Comparable::Int(i), Comparable::Double(d)) | (Comparable::Double(d), Comparable::Int(i)) => {
                double_is_integer(*d, *i)
            }
            (Comparable::Decimal(a), Comparable::Decimal(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::Timestamp(a), Comparable::Timestamp(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Double(a), Comparable::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::Timestamp(a), Comparable::Timestamp(b)) => {
                (a.time, a.increment).partial_cmp(&(b.time, b.increment))
            }
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    /// Equality as a query sees it: an array field also matches one of its elements.
    fn matches(&self, value: &Comparable<'a>) -> bool {
        if self == value {
            return true;
        }

        match (self, value) {
            (Comparable::Array(items), scalar) if !matches!(scalar, Comparable::Array(_)) => {
                items.iter().any(|item| item == scalar)
            }
            _ => false,
        }
    }

    fn is_one_of(&self, values: &Comparable<'a>) -> bool {
        match (self, values) {
            (Comparable::Array(array), Comparable::Array(values)) => values
                .iter()
                .any(|val| array.iter().any(|item| item == val)),
            (Comparable::Array(array), single_value) => array.iter().any(|item| item == single_value),
            (single_value, Comparable::Array(values)) => values.iter().any(|val| val == single_value),
            _ => false,
        }
    }
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn evaluate(&mut self, expr: &Expr) -> DocumentStoreResult<bool> {
        self.visit_expr(expr)
    }

    /// Clones every document matching `expr`, preserving order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        expr: &Expr,
    ) -> DocumentStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(expr)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }
}

impl<'a> QueryVisitor for DocumentEvaluator<'a> {
    type Output = bool;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if !self.visit_expr(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        for expr in exprs {
            if self.visit_expr(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        Ok(!self.visit_expr(expr)?)
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(self.document.contains_key(field) == should_exist)
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        let expected = Comparable::from(value);

        let Some(field_value) = self.document.get(field) else {
            // A missing field reads as null for equality, and never satisfies a
            // positive comparison.
            return Ok(match op {
                FieldOp::Eq => expected == Comparable::Null,
                FieldOp::Ne => expected != Comparable::Null,
                FieldOp::NotContains | FieldOp::NoneOf => true,
                _ => false,
            });
        };
        let actual = Comparable::from(field_value);

        Ok(match op {
            FieldOp::Eq => actual.matches(&expected),
            FieldOp::Ne => !actual.matches(&expected),
            FieldOp::Gt | FieldOp::Gte | FieldOp::Lt | FieldOp::Lte => {
                match actual.partial_cmp(&expected) {
                    Some(ordering) => match op {
                        FieldOp::Gt => ordering == Ordering::Greater,
                        FieldOp::Gte => ordering != Ordering::Less,
                        FieldOp::Lt => ordering == Ordering::Less,
                        _ => ordering != Ordering::Greater,
                    },
                    None => false,
                }
            }
            FieldOp::Contains => contains(&actual, &expected),
            FieldOp::NotContains => !contains(&actual, &expected),
            FieldOp::StartsWith => match (&actual, &expected) {
                (Comparable::String(left), Comparable::String(right)) => left.starts_with(right),
                _ => false,
            },
            FieldOp::EndsWith => match (&actual, &expected) {
                (Comparable::String(left), Comparable::String(right)) => left.ends_with(right),
                _ => false,
            },
            FieldOp::AnyOf => actual.is_one_of(&expected),
            FieldOp::NoneOf => !actual.is_one_of(&expected),
        })
    }
}

fn contains<'a>(actual: &Comparable<'a>, expected: &Comparable<'a>) -> bool {
    match (actual, expected) {
        (Comparable::Array(array), Comparable::Array(items)) => items
            .iter()
            .all(|item| array.iter().any(|candidate| candidate == item)),
        (Comparable::Array(array), item) => array.iter().any(|candidate| candidate == item),
        (Comparable::String(left), Comparable::String(right)) => left.contains(right),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{Uuid, doc};
    use docmodel_core::query::Filter;

    fn eval(document: &Document, expr: &Expr) -> bool {
        DocumentEvaluator::new(document).evaluate(expr).unwrap()
    }

    #[test]
    fn null_equality_matches_missing_fields() {
        let document = doc! { "foo": "Foo" };

        assert!(eval(&document, &Filter::eq("bar", Bson::Null)));
        assert!(!eval(&document, &Filter::eq("foo", Bson::Null)));
        assert!(!eval(&document, &Filter::ne("bar", Bson::Null)));
        assert!(eval(&document, &Filter::ne("bar", "x")));
    }

    #[test]
    fn uuid_identities_compare_by_bytes() {
        let id = Uuid::new();
        let document = doc! { "_id": id, "foo": 1 };

        assert!(eval(&document, &Filter::id(id)));
        assert!(!eval(&document, &Filter::id(Uuid::new())));
    }

    #[test]
    fn scalar_equality_reaches_into_arrays() {
        let document = doc! { "tags": ["a", "b"] };

        assert!(eval(&document, &Filter::eq("tags", "a")));
        assert!(eval(&document, &Filter::eq("tags", vec!["a", "b"])));
        assert!(!eval(&document, &Filter::eq("tags", vec!["b", "a"])));
    }

    #[test]
    fn numbers_compare_across_widths() {
        let document = doc! { "n": 3_i64 };

        assert!(eval(&document, &Filter::eq("n", 3_i32)));
        assert!(eval(&document, &Filter::gte("n", 3.0)));
        assert!(!eval(&document, &Filter::lt("n", 3)));
    }

    #[test]
    fn large_integers_compare_exactly() {
        let document = doc! { "n": 9_007_199_254_740_993_i64 };

        assert!(eval(&document, &Filter::eq("n", 9_007_199_254_740_993_i64)));
        assert!(!eval(&document, &Filter::eq("n", 9_007_199_254_740_992_i64)));
        assert!(!eval(&document, &Filter::eq("n", 9_007_199_254_740_992.0)));
    }

    #[test]
    fn decimals_timestamps_and_nan_match_themselves() {
        let decimal: Decimal128 = "1.5".parse().unwrap();
        let stamp = Timestamp { time: 5, increment: 1 };
        let document = doc! { "d": decimal, "t": stamp, "f": f64::NAN };

        assert!(eval(&document, &Filter::eq("d", decimal)));
        assert!(eval(&document, &Filter::eq("t", stamp)));
        assert!(eval(&document, &Filter::eq("f", f64::NAN)));
        assert!(!eval(&document, &Filter::eq("f", 1.5)));
    }

    #[test]
    fn embedded_documents_compare_in_field_order() {
        let document = doc! { "m": { "a": 1, "b": 2 } };

        assert!(eval(&document, &Filter::eq("m", doc! { "a": 1, "b": 2 })));
        assert!(!eval(&document, &Filter::eq("m", doc! { "b": 2, "a": 1 })));
    }

    #[test]
    fn empty_conjunction_matches_everything() {
        assert!(eval(&doc! {}, &Filter::all()));
        assert!(!eval(&doc! {}, &Filter::or(Vec::new())));
    }

    #[test]
    fn matching_filter_combines_identity_and_values() {
        let id = Uuid::new();
        let document = doc! { "_id": id, "foo": "Foo", "bar": Bson::Null };
        let filter = Filter::id(id).and(Filter::matching(&doc! { "foo": "Foo", "bar": Bson::Null }));

        assert!(eval(&document, &filter));
        assert!(!eval(&doc! { "_id": id, "foo": "Other" }, &filter));
    }
}
