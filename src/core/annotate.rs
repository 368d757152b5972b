//! Computes the `id` column for record batches of variants.

use super::{
    contigs::ContigIndex,
    svtype::{normalize_sv_alt, SvInfo},
    variant_id::{real_pos, IdEncoder},
};
use crate::{
    constants::{ALT_COLUMN, CHR_COLUMN, ID_COLUMN, POS_COLUMN, REF_COLUMN, SVLEN_COLUMN, SVTYPE_COLUMN},
    utils::util::Result,
};
use arrow::{
    array::{Array, ArrayRef, AsArray, UInt64Array},
    compute::{cast_with_options, CastOptions},
    datatypes::{DataType, Field, Float64Type, Int64Type, Schema},
    record_batch::RecordBatch,
};
use std::{borrow::Cow, sync::Arc};

/// Shape of a column that a variant field can be read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Int,
    Float,
    Str,
    IntList,
    StrList,
}

impl FieldKind {
    pub fn of(data_type: &DataType) -> Option<Self> {
        match data_type {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64 => Some(Self::Int),
            DataType::Float16 | DataType::Float32 | DataType::Float64 => Some(Self::Float),
            DataType::Utf8 | DataType::LargeUtf8 => Some(Self::Str),
            DataType::List(item) => match Self::of(item.data_type())? {
                Self::Int | Self::Float => Some(Self::IntList),
                Self::Str => Some(Self::StrList),
                Self::IntList | Self::StrList => None,
            },
            _ => None,
        }
    }

    fn canonical_type(&self) -> DataType {
        let list_of = |item: DataType| DataType::List(Arc::new(Field::new("item", item, true)));
        match self {
            Self::Int => DataType::Int64,
            Self::Float => DataType::Float64,
            Self::Str => DataType::Utf8,
            Self::IntList => list_of(DataType::Int64),
            Self::StrList => list_of(DataType::Utf8),
        }
    }
}

/// A column cast to the canonical type of its [`FieldKind`].
#[derive(Debug)]
pub struct FieldColumn {
    name: String,
    kind: FieldKind,
    array: ArrayRef,
}

impl FieldColumn {
    pub fn resolve(batch: &RecordBatch, name: &str) -> Result<Option<Self>> {
        let Some(array) = batch.column_by_name(name) else {
            return Ok(None);
        };
        let kind = FieldKind::of(array.data_type()).ok_or_else(|| {
            crate::varhive_error!(
                "Column '{name}' has unsupported type {}",
                array.data_type()
            )
        })?;
        let options = CastOptions {
            safe: false,
            ..Default::default()
        };
        let array = cast_with_options(array, &kind.canonical_type(), &options).map_err(|error| {
            crate::varhive_error!("Column '{name}' holds values out of range: {error}")
        })?;
        Ok(Some(Self {
            name: name.to_string(),
            kind,
            array,
        }))
    }

    pub fn require(batch: &RecordBatch, name: &str) -> Result<Self> {
        Self::resolve(batch, name)?
            .ok_or_else(|| crate::varhive_error!("Column '{name}' missing from batch"))
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    /// Integer value of `row`; list columns yield their first element.
    pub fn int(&self, row: usize) -> Option<i64> {
        if self.array.is_null(row) {
            return None;
        }
        match self.kind {
            FieldKind::Int => Some(self.array.as_primitive::<Int64Type>().value(row)),
            FieldKind::Float => {
                let value = self.array.as_primitive::<Float64Type>().value(row);
                value.is_finite().then(|| value.round() as i64)
            }
            FieldKind::Str => self.array.as_string::<i32>().value(row).trim().parse().ok(),
            FieldKind::IntList => {
                let values = self.array.as_list::<i32>().value(row);
                let values = values.as_primitive::<Int64Type>();
                (!values.is_empty() && values.is_valid(0)).then(|| values.value(0))
            }
            FieldKind::StrList => self.text(row)?.trim().parse().ok(),
        }
    }

    /// Text value of `row`; list columns yield their first element.
    pub fn text(&self, row: usize) -> Option<Cow<'_, str>> {
        if self.array.is_null(row) {
            return None;
        }
        match self.kind {
            FieldKind::Str => Some(Cow::Borrowed(self.array.as_string::<i32>().value(row))),
            FieldKind::StrList => {
                let values = self.array.as_list::<i32>().value(row);
                let values = values.as_string::<i32>();
                (!values.is_empty() && values.is_valid(0))
                    .then(|| Cow::Owned(values.value(0).to_string()))
            }
            FieldKind::Int | FieldKind::Float | FieldKind::IntList => {
                self.int(row).map(|value| Cow::Owned(value.to_string()))
            }
        }
    }

    fn required_text(&self, row: usize) -> Result<Cow<'_, str>> {
        self.text(row)
            .ok_or_else(|| crate::varhive_error!("Null '{}' value at row {row}", self.name))
    }
}

/// Returns `batch` with its `id` column computed from `chr, pos, ref, alt`
/// (and `SVTYPE`/`SVLEN` when present). An existing `id` column is replaced.
pub fn annotate_ids(
    batch: &RecordBatch,
    table: &ContigIndex,
    encoder: &IdEncoder,
) -> Result<RecordBatch> {
    let chrs = FieldColumn::require(batch, CHR_COLUMN)?;
    let positions = FieldColumn::require(batch, POS_COLUMN)?;
    let refs = FieldColumn::require(batch, REF_COLUMN)?;
    let alts = FieldColumn::require(batch, ALT_COLUMN)?;
    let svtypes = FieldColumn::resolve(batch, SVTYPE_COLUMN)?;
    let svlens = FieldColumn::resolve(batch, SVLEN_COLUMN)?;

    let mut ids = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let chr = chrs.required_text(row)?;
        let pos = positions
            .int(row)
            .ok_or_else(|| crate::varhive_error!("Null '{POS_COLUMN}' value at row {row}"))?;
        let pos = u64::try_from(pos)?;
        let ref_seq = refs.required_text(row)?;
        let alt_seq = alts.required_text(row)?;

        let svtype = svtypes.as_ref().and_then(|column| column.text(row));
        let svlen = svlens.as_ref().and_then(|column| column.int(row));
        let sv = svtype.as_deref().map(|svtype| SvInfo::new(svtype, svlen));
        let alt_seq = normalize_sv_alt(&alt_seq, sv.as_ref());

        let real_pos = real_pos(table, &chr, pos)?;
        ids.push(encoder.encode(real_pos, &ref_seq, &alt_seq));
    }
    let ids: ArrayRef = Arc::new(UInt64Array::from(ids));
    let id_field = Arc::new(Field::new(ID_COLUMN, DataType::UInt64, false));

    let schema = batch.schema();
    let mut fields = schema.fields().to_vec();
    let mut columns = batch.columns().to_vec();
    match schema.index_of(ID_COLUMN) {
        Ok(index) => {
            fields[index] = id_field;
            columns[index] = ids;
        }
        Err(_) => {
            fields.insert(0, id_field);
            columns.insert(0, ids);
        }
    }
    let schema = Arc::new(Schema::new_with_metadata(fields, schema.metadata().clone()));
    Ok(RecordBatch::try_new(schema, columns)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{contigs::example_index, svtype::normalize_sv_alt, variant_id::encode};
    use arrow::array::{Float64Array, Int32Array, ListBuilder, StringArray, StringBuilder};

    fn batch(columns: Vec<(&str, ArrayRef)>) -> RecordBatch {
        RecordBatch::try_from_iter(columns).expect("batch should build")
    }

    #[test]
    fn field_kind_of_types() {
        assert_eq!(FieldKind::of(&DataType::UInt32), Some(FieldKind::Int));
        assert_eq!(FieldKind::of(&DataType::Float32), Some(FieldKind::Float));
        assert_eq!(FieldKind::of(&DataType::LargeUtf8), Some(FieldKind::Str));
        assert_eq!(
            FieldKind::of(&DataType::List(Arc::new(Field::new("item", DataType::Int32, true)))),
            Some(FieldKind::IntList)
        );
        assert_eq!(
            FieldKind::of(&DataType::List(Arc::new(Field::new("item", DataType::Utf8, true)))),
            Some(FieldKind::StrList)
        );
        assert_eq!(FieldKind::of(&DataType::Boolean), None);
    }

    #[test]
    fn list_columns_yield_first_element() {
        let mut svtypes = ListBuilder::new(StringBuilder::new());
        svtypes.values().append_value("DEL");
        svtypes.values().append_value("INS");
        svtypes.append(true);
        svtypes.append(false);
        let batch = batch(vec![
            ("SVTYPE", Arc::new(svtypes.finish()) as ArrayRef),
            ("SVLEN", Arc::new(Float64Array::from(vec![-350.0, f64::NAN])) as ArrayRef),
        ]);
        let svtypes = FieldColumn::require(&batch, "SVTYPE").unwrap();
        assert_eq!(svtypes.kind(), FieldKind::StrList);
        assert_eq!(svtypes.text(0).as_deref(), Some("DEL"));
        assert_eq!(svtypes.text(1), None);
        let svlens = FieldColumn::require(&batch, "SVLEN").unwrap();
        assert_eq!(svlens.int(0), Some(-350));
        assert_eq!(svlens.int(1), None);
    }

    #[test]
    fn annotate_adds_id_column() {
        let table = example_index();
        let encoder = IdEncoder::for_index(&table);
        let input = batch(vec![
            ("chr", Arc::new(StringArray::from(vec!["2", "1"])) as ArrayRef),
            ("pos", Arc::new(Int32Array::from(vec![19_910, 7])) as ArrayRef),
            ("ref", Arc::new(StringArray::from(vec!["A", "C"])) as ArrayRef),
            ("alt", Arc::new(StringArray::from(vec!["T", "G"])) as ArrayRef),
        ]);
        let annotated = annotate_ids(&input, &table, &encoder).expect("ids should be computed");
        assert_eq!(annotated.schema().field(0).name(), "id");
        assert_eq!(annotated.num_columns(), 5);
        let ids = annotated.column(0).as_primitive::<arrow::datatypes::UInt64Type>();
        assert_eq!(ids.value(0), 344_281_487_211_757_571);
        assert_eq!(ids.value(1), encode(7, "C", "G", table.total_length()));
    }

    #[test]
    fn annotate_normalizes_symbolic_alleles() {
        let table = example_index();
        let encoder = IdEncoder::for_index(&table);
        let input = batch(vec![
            ("id", Arc::new(UInt64Array::from(vec![0, 0])) as ArrayRef),
            ("chr", Arc::new(StringArray::from(vec!["1", "1"])) as ArrayRef),
            ("pos", Arc::new(UInt64Array::from(vec![500, 500])) as ArrayRef),
            ("ref", Arc::new(StringArray::from(vec!["N", "N"])) as ArrayRef),
            ("alt", Arc::new(StringArray::from(vec!["<DEL>", "<DEL:ME>"])) as ArrayRef),
            ("SVTYPE", Arc::new(StringArray::from(vec!["DEL", "DEL"])) as ArrayRef),
            ("SVLEN", Arc::new(Int32Array::from(vec![-350, -350])) as ArrayRef),
        ]);
        let annotated = annotate_ids(&input, &table, &encoder).expect("ids should be computed");
        assert_eq!(annotated.num_columns(), 7);
        let ids = annotated.column(0).as_primitive::<arrow::datatypes::UInt64Type>();
        assert_eq!(ids.value(0), ids.value(1));
        let sv = SvInfo::new("DEL", Some(-350));
        let expected = encoder.encode(500, "N", &normalize_sv_alt("<DEL>", Some(&sv)));
        assert_eq!(ids.value(0), expected);
    }

    #[test]
    fn unknown_contig_is_reported() {
        let table = example_index();
        let encoder = IdEncoder::for_index(&table);
        let input = batch(vec![
            ("chr", Arc::new(StringArray::from(vec!["chrZ"])) as ArrayRef),
            ("pos", Arc::new(UInt64Array::from(vec![1])) as ArrayRef),
            ("ref", Arc::new(StringArray::from(vec!["A"])) as ArrayRef),
            ("alt", Arc::new(StringArray::from(vec!["T"])) as ArrayRef),
        ]);
        let error = annotate_ids(&input, &table, &encoder).expect_err("chrZ is unknown");
        assert!(matches!(
            error,
            crate::error::VarhiveError::UnknownContig { ref contig } if contig == "chrZ"
        ));
    }

    #[test]
    fn oversized_position_is_out_of_range() {
        let table = example_index();
        let encoder = IdEncoder::for_index(&table);
        let input = batch(vec![
            ("chr", Arc::new(StringArray::from(vec!["1"])) as ArrayRef),
            ("pos", Arc::new(UInt64Array::from(vec![u64::MAX])) as ArrayRef),
            ("ref", Arc::new(StringArray::from(vec!["A"])) as ArrayRef),
            ("alt", Arc::new(StringArray::from(vec!["T"])) as ArrayRef),
        ]);
        let error = annotate_ids(&input, &table, &encoder).expect_err("pos does not fit in i64");
        let message = error.to_string();
        assert!(message.contains("out of range"), "{message}");
        assert!(!message.contains("Null"), "{message}");
    }
}
