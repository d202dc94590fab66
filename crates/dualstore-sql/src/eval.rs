//! Type coercion and predicate evaluation
//! shared by both storage engines.

use crate::parser::Predicate;
use crate::storage::StorageError;
use crate::value::{ColumnType, Row, Scalar};

/// Coerces a literal/value bound for a column of type `ty`.
///
/// `Null` is accepted unconditionally here; nullability is a schema-level
/// concern checked by the caller against [`crate::value::Column::nullable`].
pub fn coerce(value: &Scalar, ty: ColumnType) -> Result<Scalar, StorageError> {
    match (value, ty) {
        (Scalar::Null, _) => Ok(Scalar::Null),
        (Scalar::Int(i), ColumnType::Int) => Ok(Scalar::Int(*i)),
        (Scalar::Int(i), ColumnType::String) => Ok(Scalar::Str(i.to_string())),
        (Scalar::Str(s), ColumnType::String) => Ok(Scalar::Str(s.clone())),
        (Scalar::Str(s), ColumnType::Int) => s.trim().parse::<i64>().map(Scalar::Int).map_err(|_| {
            StorageError::TypeError(format!("'{s}' is not a valid INT"))
        }),
    }
}

/// Equality under the dialect's normalisation rules: numeric vs numeric
/// compares by value, string vs string compares byte-wise, and a
/// numeric/string pair never matches.
#[must_use]
pub fn scalar_eq(a: &Scalar, b: &Scalar) -> bool {
    match (a, b) {
        (Scalar::Int(x), Scalar::Int(y)) => x == y,
        (Scalar::Str(x), Scalar::Str(y)) => x == y,
        (Scalar::Null, Scalar::Null) => true,
        _ => false,
    }
}

/// A row matches a predicate iff every listed equality holds; a column the
/// row lacks makes that equality (and therefore the whole predicate) fail.
/// An empty predicate matches every row.
#[must_use]
pub fn row_matches(row: &Row, predicate: &Predicate) -> bool {
    predicate.0.iter().all(|eq| match row.get(&eq.column) {
        Some(v) => scalar_eq(v, &eq.value),
        None => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Equality;

    #[test]
    fn int_column_accepts_decimal_string() {
        assert_eq!(
            coerce(&Scalar::Str("42".to_string()), ColumnType::Int).unwrap(),
            Scalar::Int(42)
        );
    }

    #[test]
    fn int_column_rejects_non_numeric_string() {
        assert!(coerce(&Scalar::Str("abc".to_string()), ColumnType::Int).is_err());
    }

    #[test]
    fn string_column_renders_int_canonically() {
        assert_eq!(
            coerce(&Scalar::Int(7), ColumnType::String).unwrap(),
            Scalar::Str("7".to_string())
        );
    }

    #[test]
    fn cross_kind_scalars_are_not_equal() {
        assert!(!scalar_eq(&Scalar::Int(1), &Scalar::Str("1".to_string())));
    }

    #[test]
    fn missing_column_does_not_match() {
        let row = Row::new();
        let predicate = Predicate(vec![Equality {
            column: "id".to_string(),
            value: Scalar::Int(1),
        }]);
        assert!(!row_matches(&row, &predicate));
    }

    #[test]
    fn empty_predicate_matches_every_row() {
        let row = Row::new();
        assert!(row_matches(&row, &Predicate::default()));
    }
}
