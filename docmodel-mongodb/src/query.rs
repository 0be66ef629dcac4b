//! Query translation from docmodel filter expressions to MongoDB query syntax.
//!
//! String operators become anchored, escaped regular expressions and are case
//! sensitive, matching the in-memory backend.

use bson::{Document, Bson, doc};

use docmodel_core::{
    query::{QueryVisitor, Expr, FieldOp},
    error::DocumentStoreError,
};


/// Translates filter expressions into MongoDB query documents.
pub(crate) struct MongoQueryTranslator;

impl MongoQueryTranslator {
    pub fn translate(expr: &Expr) -> Result<Document, DocumentStoreError> {
        MongoQueryTranslator.visit_expr(expr)
    }
}

impl QueryVisitor for MongoQueryTranslator {
    type Output = Document;
    type Error = DocumentStoreError;

    fn visit_and(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            return Ok(doc! {});
        }

        Ok(doc! {
            "$and": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_or(&mut self, exprs: &[Expr]) -> Result<Self::Output, Self::Error> {
        if exprs.is_empty() {
            // `$or` rejects an empty list; this matches nothing instead.
            return Ok(doc! { "_id": { "$exists": false } });
        }

        Ok(doc! {
            "$or": exprs
                .iter()
                .map(|expr| self.visit_expr(expr))
                .collect::<Result<Vec<_>, _>>()?,
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> Result<Self::Output, Self::Error> {
        let negated = self.visit_expr(expr)?;

        Ok(doc! {
            "$nor": [negated],
        })
    }

    fn visit_exists(&mut self, field: &str, should_exist: bool) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: { "$exists": should_exist },
        })
    }

    fn visit_field(&mut self, field: &str, op: &FieldOp, value: &Bson) -> Result<Self::Output, Self::Error> {
        Ok(doc! {
            field: match op {
                FieldOp::Eq => doc! { "$eq": value },
                FieldOp::Ne => doc! { "$ne": value },
                FieldOp::Gt => doc! { "$gt": value },
                FieldOp::Gte => doc! { "$gte": value },
                FieldOp::Lt => doc! { "$lt": value },
                FieldOp::Lte => doc! { "$lte": value },
                FieldOp::Contains => match value {
                    Bson::String(s) => doc! { "$regex": escape_regex(s) },
                    Bson::Array(arr) => doc! { "$all": arr },
                    other => doc! { "$elemMatch": { "$eq": other } },
                },
                FieldOp::NotContains => match value {
                    Bson::String(s) => doc! { "$not": { "$regex": escape_regex(s) } },
                    Bson::Array(arr) => doc! { "$not": { "$all": arr } },
                    other => doc! { "$not": { "$elemMatch": { "$eq": other } } },
                },
                FieldOp::StartsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("^{}", escape_regex(s)) },
                    _ => return Err(DocumentStoreError::Backend("StartsWith operator requires a string value".to_string())),
                },
                FieldOp::EndsWith => match value {
                    Bson::String(s) => doc! { "$regex": format!("{}$", escape_regex(s)) },
                    _ => return Err(DocumentStoreError::Backend("EndsWith operator requires a string value".to_string())),
                },
                FieldOp::AnyOf => doc! { "$in": as_list(value) },
                FieldOp::NoneOf => doc! { "$nin": as_list(value) },
            }
        })
    }
}

fn as_list(value: &Bson) -> Bson {
    match value {
        Bson::Array(_) => value.clone(),
        other => Bson::Array(vec![other.clone()]),
    }
}

fn escape_regex(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());

    for c in text.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }

    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Uuid;
    use docmodel_core::query::Filter;

    #[test]
    fn match_everything_is_an_empty_query() {
        assert_eq!(MongoQueryTranslator::translate(&Filter::all()).unwrap(), doc! {});
    }

    #[test]
    fn identity_and_values() {
        let id = Uuid::new();
        let filter = Filter::id(id).and(Filter::matching(&doc! { "foo": "Foo" }));

        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! { "$and": [ { "_id": { "$eq": id } }, { "$and": [ { "foo": { "$eq": "Foo" } } ] } ] }
        );
    }

    #[test]
    fn negation_uses_nor() {
        let filter = Filter::eq("a", 1).not();

        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! { "$nor": [ { "a": { "$eq": 1 } } ] }
        );
    }

    #[test]
    fn string_operators_escape_their_input() {
        let filter = Filter::starts_with("name", "a.b");

        assert_eq!(
            MongoQueryTranslator::translate(&filter).unwrap(),
            doc! { "name": { "$regex": "^a\\.b" } }
        );
    }

    #[test]
    fn single_value_membership_is_wrapped() {
        assert_eq!(
            MongoQueryTranslator::translate(&Filter::any_of("n", 3)).unwrap(),
            doc! { "n": { "$in": [3] } }
        );
    }

    #[test]
    fn prefix_of_a_number_is_rejected() {
        assert!(MongoQueryTranslator::translate(&Filter::starts_with("n", 3)).is_err());
    }
}
