//! core::codec
//!
//! Blob codec for constant-set data.
//!
//! # Format
//!
//! A constant set is stored as one text blob: the text form of each cell,
//! joined by [`DELIMITER`]. A cell whose text already contains the delimiter
//! has every occurrence replaced by [`ESCAPE_TOKEN`] first; decoding reverses
//! the replacement.
//!
//! ```text
//! ["1", "2", "with|pipe"]  <->  "1|2|with&delimiter;pipe"
//! ```
//!
//! # Known Limitation
//!
//! The escape is not collision free: a cell whose text already contains the
//! literal `&delimiter;` decodes to a `|`. This matches the stored data as it
//! exists and is pinned by tests rather than changed.
//!
//! # Functions
//!
//! All functions are pure. Callers compose them explicitly:
//! `reshape(&decode(vault), column_count)` yields the row-major table.

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use super::error::{CalibError, CalibResult};

/// Separates cells in a blob.
pub const DELIMITER: &str = "|";

/// Replaces a literal delimiter inside a cell.
pub const ESCAPE_TOKEN: &str = "&delimiter;";

/// Declared type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Int,
    UInt,
    Long,
    ULong,
    Double,
    String,
    Bool,
}

impl ColumnType {
    /// Name as stored in the backing schema.
    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnType::Int => "int",
            ColumnType::UInt => "uint",
            ColumnType::Long => "long",
            ColumnType::ULong => "ulong",
            ColumnType::Double => "double",
            ColumnType::String => "string",
            ColumnType::Bool => "bool",
        }
    }

    /// Parse one decoded cell as this type.
    ///
    /// Booleans accept `true`/`false` in any case and `1`/`0`.
    ///
    /// # Errors
    ///
    /// Returns `CalibError::InvalidCell` naming `column` if the text does not
    /// parse.
    pub fn parse_cell(&self, column: &str, text: &str) -> CalibResult<Scalar> {
        let invalid = || CalibError::InvalidCell {
            column: column.to_string(),
            value: text.to_string(),
            expected: self.as_str().to_string(),
        };
        let trimmed = text.trim();
        let scalar = match self {
            ColumnType::Int => Scalar::Int(trimmed.parse().map_err(|_| invalid())?),
            ColumnType::UInt => Scalar::UInt(trimmed.parse().map_err(|_| invalid())?),
            ColumnType::Long => Scalar::Long(trimmed.parse().map_err(|_| invalid())?),
            ColumnType::ULong => Scalar::ULong(trimmed.parse().map_err(|_| invalid())?),
            ColumnType::Double => Scalar::Double(trimmed.parse().map_err(|_| invalid())?),
            ColumnType::String => Scalar::Str(text.to_string()),
            ColumnType::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" => Scalar::Bool(true),
                "false" | "0" => Scalar::Bool(false),
                _ => return Err(invalid()),
            },
        };
        Ok(scalar)
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One cell value.
///
/// `Display` yields the canonical text form written into blobs. Doubles use
/// the shortest round-tripping representation and always carry a fractional
/// part or exponent (`1.0`, `0.25`, `1e-7`), so they stay distinguishable
/// from integers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(i32),
    UInt(u32),
    Long(i64),
    ULong(u64),
    Double(f64),
    Bool(bool),
    Str(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(v) => write!(f, "{v}"),
            Scalar::UInt(v) => write!(f, "{v}"),
            Scalar::Long(v) => write!(f, "{v}"),
            Scalar::ULong(v) => write!(f, "{v}"),
            Scalar::Double(v) => write!(f, "{v:?}"),
            Scalar::Bool(v) => write!(f, "{v}"),
            Scalar::Str(v) => f.write_str(v),
        }
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Scalar::Int(v)
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Scalar::Long(v)
    }
}

impl From<f64> for Scalar {
    fn from(v: f64) -> Self {
        Scalar::Double(v)
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Scalar::Bool(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Scalar::Str(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Scalar::Str(v)
    }
}

/// Escape one cell's text form.
fn escape(text: &str) -> String {
    text.replace(DELIMITER, ESCAPE_TOKEN)
}

/// Encode a flat sequence of values into a blob.
///
/// # Example
///
/// ```
/// use calibdb::core::codec::{encode, Scalar};
///
/// assert_eq!(encode(&[Scalar::Int(1), "2".into(), "str".into()]), "1|2|str");
/// assert_eq!(encode(&["strings", "with|surprise"]), "strings|with&delimiter;surprise");
/// assert_eq!(encode::<&str>(&[]), "");
/// ```
pub fn encode<T: Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| escape(&v.to_string()))
        .collect::<Vec<_>>()
        .join(DELIMITER)
}

/// Decode a blob into the text form of each cell.
///
/// Every blob holds at least one cell: an empty blob is a single empty
/// cell, the same as splitting on the delimiter. Stored constant sets are
/// never empty, so `encode(&[])` has no stored counterpart.
///
/// # Example
///
/// ```
/// use calibdb::core::codec::decode;
///
/// assert_eq!(decode("1|2|str"), vec!["1", "2", "str"]);
/// assert_eq!(decode("strings|with&delimiter;surprise"), vec!["strings", "with|surprise"]);
/// assert_eq!(decode(""), vec![""]);
/// ```
pub fn decode(blob: &str) -> Vec<String> {
    blob.split(DELIMITER)
        .map(|piece| piece.replace(ESCAPE_TOKEN, DELIMITER))
        .collect()
}

/// Partition a flat sequence into rows of `column_count` cells.
///
/// # Errors
///
/// Returns `CalibError::ArityMismatch` when `column_count` is zero or does
/// not divide `flat.len()`.
///
/// # Example
///
/// ```
/// use calibdb::core::codec::reshape;
///
/// assert_eq!(reshape(&[1, 2, 3, 4, 5, 6], 3).unwrap(), vec![vec![1, 2, 3], vec![4, 5, 6]]);
/// assert!(reshape(&[1, 2, 3, 4, 5], 2).is_err());
/// ```
pub fn reshape<T: Clone>(flat: &[T], column_count: usize) -> CalibResult<Vec<Vec<T>>> {
    if column_count == 0 || flat.len() % column_count != 0 {
        return Err(CalibError::ArityMismatch {
            cells: flat.len(),
            columns: column_count,
            constant_set_id: None,
        });
    }
    Ok(flat.chunks(column_count).map(<[T]>::to_vec).collect())
}

/// A possibly nested value, as handed in when writing tabular data.
///
/// Strings are leaves: they are never expanded character-wise.
#[derive(Debug, Clone, PartialEq)]
pub enum Nested<T> {
    Leaf(T),
    List(Vec<Nested<T>>),
}

impl Nested<Scalar> {
    /// Build a list node from anything convertible to nodes.
    pub fn list<I, U>(items: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<Nested<Scalar>>,
    {
        Nested::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<Scalar> for Nested<Scalar> {
    fn from(v: Scalar) -> Self {
        Nested::Leaf(v)
    }
}

impl From<i32> for Nested<Scalar> {
    fn from(v: i32) -> Self {
        Nested::Leaf(Scalar::Int(v))
    }
}

impl From<f64> for Nested<Scalar> {
    fn from(v: f64) -> Self {
        Nested::Leaf(Scalar::Double(v))
    }
}

impl From<&str> for Nested<Scalar> {
    fn from(v: &str) -> Self {
        Nested::Leaf(Scalar::Str(v.to_string()))
    }
}

/// Flatten nested data depth-first, pre-order, into one sequence of leaves.
///
/// # Example
///
/// ```
/// use calibdb::core::codec::{flatten, Nested, Scalar};
///
/// let data: Vec<Nested<Scalar>> = vec![
///     Nested::list([Nested::list([1, 2, 3]), Nested::list([4, 5])]),
///     "abc".into(),
/// ];
/// let flat = flatten(&data);
/// assert_eq!(flat.len(), 6);
/// assert_eq!(flat[5], Scalar::Str("abc".into()));
/// ```
pub fn flatten<T: Clone>(nested: &[Nested<T>]) -> Vec<T> {
    let mut out = Vec::new();
    for node in nested {
        flatten_into(node, &mut out);
    }
    out
}

fn flatten_into<T: Clone>(node: &Nested<T>, out: &mut Vec<T>) {
    match node {
        Nested::Leaf(v) => out.push(v.clone()),
        Nested::List(children) => {
            for child in children {
                flatten_into(child, out);
            }
        }
    }
}

/// Map each row's cells to column names.
///
/// Rows and names are zipped positionally; `column_names` must already be in
/// column `order`.
pub fn map_rows<S: AsRef<str>>(
    rows: &[Vec<String>],
    column_names: &[S],
) -> Vec<BTreeMap<String, String>> {
    rows.iter()
        .map(|row| {
            column_names
                .iter()
                .map(|name| name.as_ref().to_string())
                .zip(row.iter().cloned())
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    mod encoding {
        use super::*;

        #[test]
        fn empty_encodes_to_empty() {
            assert_eq!(encode::<Scalar>(&[]), "");
        }

        #[test]
        fn single_element_has_no_delimiter() {
            assert_eq!(encode(&["only"]), "only");
            assert_eq!(encode(&["a|b"]), "a&delimiter;b");
        }

        #[test]
        fn scalars_use_text_form() {
            let values = vec![
                Scalar::Int(-3),
                Scalar::UInt(7),
                Scalar::Double(1.0),
                Scalar::Double(0.25),
                Scalar::Bool(true),
                Scalar::Str("x".into()),
            ];
            assert_eq!(encode(&values), "-3|7|1.0|0.25|true|x");
        }

        #[test]
        fn every_delimiter_is_escaped() {
            assert_eq!(encode(&["||"]), "&delimiter;&delimiter;");
        }
    }

    mod decoding {
        use super::*;

        #[test]
        fn delimiter_inside_value_survives() {
            let blob = encode(&["a|b", "c"]);
            assert_eq!(decode(&blob), vec!["a|b", "c"]);
        }

        #[test]
        fn empty_cells_are_kept() {
            assert_eq!(decode("a||b"), vec!["a", "", "b"]);
            assert_eq!(decode("|"), vec!["", ""]);
        }

        #[test]
        fn empty_blob_is_one_empty_cell() {
            assert_eq!(decode(""), vec![""]);
            assert_eq!(decode(&encode(&[""])), vec![""]);
        }

        #[test]
        fn literal_escape_token_collides() {
            // A value that already contains the escape token is not preserved.
            let blob = encode(&["x&delimiter;y"]);
            assert_eq!(decode(&blob), vec!["x|y"]);
        }
    }

    mod reshaping {
        use super::*;

        #[test]
        fn reshape_rows() {
            let table = reshape(&[1, 2, 3, 4, 5, 6], 3).unwrap();
            assert_eq!(table, vec![vec![1, 2, 3], vec![4, 5, 6]]);
        }

        #[test]
        fn reshape_single_column() {
            let table = reshape(&["a", "b"], 1).unwrap();
            assert_eq!(table, vec![vec!["a"], vec!["b"]]);
        }

        #[test]
        fn reshape_empty_is_no_rows() {
            let table = reshape::<i32>(&[], 4).unwrap();
            assert!(table.is_empty());
        }

        #[test]
        fn reshape_arity_mismatch() {
            let err = reshape(&[1, 2, 3, 4, 5], 2).unwrap_err();
            assert_eq!(
                err,
                CalibError::ArityMismatch {
                    cells: 5,
                    columns: 2,
                    constant_set_id: None,
                }
            );
        }

        #[test]
        fn reshape_zero_columns_rejected() {
            assert!(reshape(&[1], 0).is_err());
            assert!(reshape::<i32>(&[], 0).is_err());
        }
    }

    mod flattening {
        use super::*;

        #[test]
        fn flatten_nested_keeps_strings_atomic() {
            let data: Vec<Nested<Scalar>> = vec![
                Nested::list([Nested::list([1, 2, 3]), Nested::list([4, 5])]),
                "abc".into(),
            ];
            let expected: Vec<Scalar> = vec![
                1.into(),
                2.into(),
                3.into(),
                4.into(),
                5.into(),
                "abc".into(),
            ];
            assert_eq!(flatten(&data), expected);
        }

        #[test]
        fn flatten_flat_is_identity() {
            let data: Vec<Nested<Scalar>> = vec![1.into(), 2.into()];
            assert_eq!(flatten(&data), vec![Scalar::Int(1), Scalar::Int(2)]);
        }

        #[test]
        fn flatten_empty_lists_vanish() {
            let data: Vec<Nested<Scalar>> = vec![Nested::List(vec![]), Nested::list([7])];
            assert_eq!(flatten(&data), vec![Scalar::Int(7)]);
        }
    }

    mod typed_cells {
        use super::*;

        #[test]
        fn parse_each_type() {
            assert_eq!(ColumnType::Int.parse_cell("c", "-4").unwrap(), Scalar::Int(-4));
            assert_eq!(ColumnType::UInt.parse_cell("c", "4").unwrap(), Scalar::UInt(4));
            assert_eq!(
                ColumnType::Long.parse_cell("c", "9000000000").unwrap(),
                Scalar::Long(9_000_000_000)
            );
            assert_eq!(
                ColumnType::Double.parse_cell("c", "1e-7").unwrap(),
                Scalar::Double(1e-7)
            );
            assert_eq!(ColumnType::Bool.parse_cell("c", "True").unwrap(), Scalar::Bool(true));
            assert_eq!(ColumnType::Bool.parse_cell("c", "0").unwrap(), Scalar::Bool(false));
            assert_eq!(
                ColumnType::String.parse_cell("c", " padded ").unwrap(),
                Scalar::Str(" padded ".into())
            );
        }

        #[test]
        fn parse_failure_names_column() {
            let err = ColumnType::UInt.parse_cell("gain", "-1").unwrap_err();
            assert_eq!(
                err,
                CalibError::InvalidCell {
                    column: "gain".into(),
                    value: "-1".into(),
                    expected: "uint".into(),
                }
            );
        }

        #[test]
        fn column_type_serde_uses_schema_names() {
            let json = serde_json::to_string(&ColumnType::ULong).unwrap();
            assert_eq!(json, "\"ulong\"");
            let parsed: ColumnType = serde_json::from_str("\"double\"").unwrap();
            assert_eq!(parsed, ColumnType::Double);
        }
    }

    #[test]
    fn map_rows_by_column_name() {
        let rows = vec![
            vec!["1".to_string(), "0.5".to_string()],
            vec!["2".to_string(), "0.7".to_string()],
        ];
        let mapped = map_rows(&rows, &["channel", "gain"]);
        assert_eq!(mapped.len(), 2);
        assert_eq!(mapped[1]["channel"], "2");
        assert_eq!(mapped[1]["gain"], "0.7");
    }
}
