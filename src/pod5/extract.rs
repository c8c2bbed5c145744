use arrow::array::{
    Array, FixedSizeBinaryArray, Float32Array, RecordBatch, StringArray,
    TimestampMillisecondArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
};

use crate::error::Pod5Error;

/// Look up `name` in `batch` and downcast it to the concrete array type.
pub(crate) fn column<T>(
    batch: &RecordBatch,
    table: &'static str,
    name: &'static str,
) -> Result<T, Pod5Error>
where
    T: Array + Clone + 'static,
{
    let array = batch
        .column_by_name(name)
        .ok_or(Pod5Error::MissingColumn {
            table,
            column: name,
        })?;
    array
        .as_any()
        .downcast_ref::<T>()
        .cloned()
        .ok_or_else(|| Pod5Error::ColumnType {
            table,
            column: name,
            found: array.data_type().to_string(),
        })
}

/// Like [`column`] but a missing column is `None` rather than an error.
pub(crate) fn optional_column<T>(
    batch: &RecordBatch,
    table: &'static str,
    name: &'static str,
) -> Result<Option<T>, Pod5Error>
where
    T: Array + Clone + 'static,
{
    match batch.column_by_name(name) {
        Some(_) => column(batch, table, name).map(Some),
        None => Ok(None),
    }
}

/// Generic trait for pulling a single non-null value out of an Arrow array
pub(crate) trait ArrowExtract: private::Sealed + Sized {
    /// The specific Arrow Array type to read from
    type ArrowArrayType: Array;

    fn value(array: &Self::ArrowArrayType, row: usize) -> Self;

    fn extract(
        array: &Self::ArrowArrayType,
        column: &'static str,
        row: usize,
    ) -> Result<Self, Pod5Error> {
        if row >= array.len() {
            return Err(Pod5Error::RowOutOfRange {
                row,
                count: array.len(),
            });
        }
        if array.is_null(row) {
            return Err(Pod5Error::NullValue { column, row });
        }
        Ok(Self::value(array, row))
    }
}

/// Read ids are 16 byte UUIDs; the column width is checked when the batch is
/// loaded so every value converts.
impl ArrowExtract for [u8; 16] {
    type ArrowArrayType = FixedSizeBinaryArray;

    fn value(array: &FixedSizeBinaryArray, row: usize) -> Self {
        let mut read_id = [0u8; 16];
        read_id.copy_from_slice(array.value(row));
        read_id
    }
}

impl ArrowExtract for String {
    type ArrowArrayType = StringArray;

    fn value(array: &StringArray, row: usize) -> Self {
        array.value(row).to_string()
    }
}

macro_rules! extract_primitive {
    ($native_type:ty, $arr_type:ty) => {
        impl ArrowExtract for $native_type {
            type ArrowArrayType = $arr_type;

            fn value(array: &$arr_type, row: usize) -> Self {
                array.value(row)
            }
        }
    };
}

extract_primitive!(u8, UInt8Array);

extract_primitive!(u16, UInt16Array);

extract_primitive!(u32, UInt32Array);

extract_primitive!(u64, UInt64Array);

extract_primitive!(f32, Float32Array);

extract_primitive!(i64, TimestampMillisecondArray);

pub(crate) mod private {
    pub trait Sealed {}
    impl Sealed for [u8; 16] {}
    impl Sealed for String {}
    impl Sealed for u8 {}
    impl Sealed for u16 {}
    impl Sealed for u32 {}
    impl Sealed for u64 {}
    impl Sealed for f32 {}
    impl Sealed for i64 {}
}
