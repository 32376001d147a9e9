//! Format handler interface and the immutable descriptor every handler
//! supplies at construction.

use csv::{ReaderBuilder, StringRecord};
use std::fmt;
use std::path::Path;

use tally_core::{Classifier, Column, Diagnostics, NullSink, Value};

use crate::convert::{ConvertContext, Converter};
use crate::error::{IngestError, Result};
use crate::probe::Probe;
use crate::remap::ConvertedTable;

/// How raw columns are located in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// First record names the columns. `required` must all be present.
    Header { required: Vec<String>, optional: Vec<String> },
    /// No header; every record has exactly `width` fields.
    Positional { width: usize },
}

/// Where the account number of a file comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRule {
    Fixed(u32),
    FromFilename,
}

/// One raw column the handler reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: String,
    /// Fixed index for positional layouts; header layouts look the name up.
    pub position: Option<usize>,
    pub converter: Converter,
    pub target: Option<Column>,
    /// Must convert on every row for the handler to claim the file.
    pub anchor: bool,
}

impl FieldSpec {
    pub fn named(name: impl Into<String>, converter: Converter) -> Self {
        Self {
            name: name.into(),
            position: None,
            converter,
            target: None,
            anchor: false,
        }
    }

    pub fn at(position: usize, name: impl Into<String>, converter: Converter) -> Self {
        Self {
            position: Some(position),
            ..Self::named(name, converter)
        }
    }

    pub fn to(mut self, column: Column) -> Self {
        self.target = Some(column);
        self
    }

    pub fn anchor(mut self) -> Self {
        self.anchor = true;
        self
    }
}

/// Immutable description of one institution's export format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub institution: String,
    pub delimiter: u8,
    pub layout: Layout,
    pub fields: Vec<FieldSpec>,
    pub account: AccountRule,
}

impl Descriptor {
    /// Raw column name → canonical column.
    pub fn mapping(&self) -> Vec<(String, Column)> {
        self.fields
            .iter()
            .filter_map(|f| f.target.map(|c| (f.name.clone(), c)))
            .collect()
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }

    pub fn anchors(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.anchor)
    }

    /// Reject descriptors that could never produce a canonical row.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| IngestError::InvalidDescriptor {
            institution: self.institution.clone(),
            reason,
        };

        if self.institution.trim().is_empty() {
            return Err(invalid("empty institution identifier".to_string()));
        }
        if self.anchors().next().is_none() {
            return Err(invalid("no anchor columns".to_string()));
        }
        for required in [Column::Date, Column::Amount] {
            match self.fields.iter().find(|f| f.target == Some(required)) {
                Some(f) if f.anchor => {}
                Some(f) => return Err(invalid(format!("'{}' maps to {required} but is not an anchor", f.name))),
                None => return Err(invalid(format!("nothing maps to {required}"))),
            }
        }
        for column in Column::ALL {
            if self.fields.iter().filter(|f| f.target == Some(column)).count() > 1 {
                return Err(invalid(format!("{column} is mapped more than once")));
            }
        }
        for (i, f) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|g| g.name == f.name) {
                return Err(invalid(format!("column '{}' declared twice", f.name)));
            }
        }

        match &self.layout {
            Layout::Header { required, optional } => {
                for f in &self.fields {
                    if !required.contains(&f.name) && !optional.contains(&f.name) {
                        return Err(invalid(format!("'{}' is not a declared header column", f.name)));
                    }
                    if f.anchor && !required.contains(&f.name) {
                        return Err(invalid(format!("anchor '{}' must be a required column", f.name)));
                    }
                }
            }
            Layout::Positional { width } => {
                for f in &self.fields {
                    match f.position {
                        Some(p) if p < *width => {}
                        _ => return Err(invalid(format!("'{}' has no position inside {width} fields", f.name))),
                    }
                }
            }
        }
        Ok(())
    }

    /// Column index of every field for a file, given its first record.
    ///
    /// Returns `Err(name)` with the first required header column that is
    /// missing. Positional layouts ignore `first`.
    pub fn locate(&self, first: &StringRecord) -> std::result::Result<Vec<Option<usize>>, String> {
        match &self.layout {
            Layout::Positional { .. } => Ok(self.fields.iter().map(|f| f.position).collect()),
            Layout::Header { required, .. } => {
                let header: Vec<&str> = first.iter().map(str::trim).collect();
                if let Some(missing) = required.iter().find(|r| !header.contains(&r.as_str())) {
                    return Err(missing.clone());
                }
                Ok(self
                    .fields
                    .iter()
                    .map(|f| header.iter().position(|h| *h == f.name))
                    .collect())
            }
        }
    }

    fn data_start(&self) -> usize {
        match self.layout {
            Layout::Header { .. } => 1,
            Layout::Positional { .. } => 0,
        }
    }

    fn width_ok(&self, record: &StringRecord) -> bool {
        match self.layout {
            Layout::Positional { width } => record.len() == width,
            Layout::Header { .. } => true,
        }
    }
}

/// Capability interface of a format handler.
///
/// Implementors provide the descriptor and the filename signature; probing,
/// reading and converting are shared.
pub trait FormatHandler: Send + Sync + fmt::Debug {
    fn descriptor(&self) -> &Descriptor;

    /// Cheap first stage of detection: does the base file name fit?
    fn filename_matches(&self, file_name: &str) -> bool;

    /// Account number encoded in the file name, if the format has one.
    fn account_from_filename(&self, _file_name: &str) -> Option<u32> {
        None
    }

    /// Rows failing this are dropped after conversion, before remapping.
    fn keep_row(&self, _row: &[Value]) -> bool {
        true
    }

    fn institution(&self) -> &str {
        &self.descriptor().institution
    }

    /// Second stage of detection: structure and anchor conversion of the probe.
    fn content_matches(&self, probe: &Probe, classifier: &Classifier) -> bool {
        let desc = self.descriptor();
        let records = probe.records(desc.delimiter);
        let Some(first) = records.first() else {
            return false;
        };
        let Ok(positions) = desc.locate(first) else {
            return false;
        };

        // trial conversions stay quiet; a mismatch here is expected
        let ctx = ConvertContext {
            diagnostics: &NullSink,
            classifier,
        };

        records[desc.data_start()..].iter().all(|record| {
            desc.width_ok(record)
                && desc
                    .fields
                    .iter()
                    .zip(&positions)
                    .filter(|(f, _)| f.anchor)
                    .all(|(f, pos)| {
                        let raw = pos.and_then(|p| record.get(p));
                        matches!(f.converter.convert(raw, &ctx), Ok(v) if !v.is_null())
                    })
        })
    }

    /// Both detection stages; the content is only inspected when the name fits.
    fn can_parse(&self, path: &Path, probe: &Probe, classifier: &Classifier) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        self.filename_matches(name) && self.content_matches(probe, classifier)
    }

    fn resolve_account(&self, path: &Path) -> Result<u32> {
        match self.descriptor().account {
            AccountRule::Fixed(n) => Ok(n),
            AccountRule::FromFilename => path
                .file_name()
                .and_then(|n| n.to_str())
                .and_then(|n| self.account_from_filename(n))
                .ok_or_else(|| IngestError::Account(path.to_path_buf())),
        }
    }

    /// Read every record of the file as text (the RAW_READ step).
    ///
    /// Bytes that are not UTF-8 are replaced rather than failing the file;
    /// whether the row survives is then up to the converters.
    fn read_records(&self, path: &Path, diagnostics: &dyn Diagnostics) -> Result<Vec<StringRecord>> {
        let csv_err = |source| IngestError::Csv {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.descriptor().delimiter)
            .from_path(path)
            .map_err(csv_err)?;

        let mut out = Vec::new();
        for result in rdr.byte_records() {
            let bytes = result.map_err(csv_err)?;
            let record: StringRecord = bytes
                .iter()
                .map(|field| String::from_utf8_lossy(field))
                .collect();
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            if bytes.iter().any(|field| std::str::from_utf8(field).is_err()) {
                let line = bytes.position().map_or(0, |p| p.line());
                diagnostics.warn(&format!(
                    "{}: line {line}: invalid UTF-8 replaced",
                    path.display()
                ));
            }
            out.push(record);
        }
        Ok(out)
    }

    /// Apply the converters to every data record (the CONVERTED step).
    ///
    /// An anchor that fails on any row rejects the whole file; other fields
    /// recover to their null or sentinel value.
    fn convert_records(
        &self,
        path: &Path,
        records: &[StringRecord],
        ctx: &ConvertContext<'_>,
    ) -> Result<ConvertedTable> {
        let desc = self.descriptor();
        let names: Vec<String> = desc.fields.iter().map(|f| f.name.clone()).collect();
        let Some(first) = records.first() else {
            return Ok(ConvertedTable::new(names));
        };
        let positions = desc.locate(first).map_err(|column| IngestError::MissingColumn {
            path: path.to_path_buf(),
            column,
        })?;

        let mut table = ConvertedTable::new(names);
        let start = desc.data_start();
        for (i, record) in records.iter().enumerate().skip(start) {
            // 1-based record index, header included, blank lines not counted
            let row = i + 1;
            if !desc.width_ok(record) {
                return Err(IngestError::RowWidth {
                    path: path.to_path_buf(),
                    row,
                    found: record.len(),
                });
            }

            let mut values = Vec::with_capacity(desc.fields.len());
            for (field, pos) in desc.fields.iter().zip(&positions) {
                let raw = pos.and_then(|p| record.get(p));
                let value = match field.converter.convert(raw, ctx) {
                    Ok(v) => v,
                    Err(e) => {
                        ctx.diagnostics.error(&format!("{}: row {row}: {e}", path.display()));
                        Value::Null
                    }
                };
                if field.anchor && value.is_null() {
                    return Err(IngestError::AnchorField {
                        path: path.to_path_buf(),
                        row,
                        column: field.name.clone(),
                        raw: raw.unwrap_or("").to_string(),
                    });
                }
                values.push(value);
            }

            if self.keep_row(&values) {
                table.push(values);
            } else {
                ctx.diagnostics.debug(&format!("{}: row {row} filtered out", path.display()));
            }
        }
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header_descriptor() -> Descriptor {
        Descriptor {
            institution: "test".to_string(),
            delimiter: b',',
            layout: Layout::Header {
                required: vec!["date".to_string(), "amount".to_string(), "note".to_string()],
                optional: vec!["balance".to_string()],
            },
            fields: vec![
                FieldSpec::named("date", Converter::Date).to(Column::Date).anchor(),
                FieldSpec::named("amount", Converter::ParenDollarAmount).to(Column::Amount).anchor(),
                FieldSpec::named("note", Converter::Text).to(Column::Description),
                FieldSpec::named("balance", Converter::PostedBalance).to(Column::PostedBalance),
            ],
            account: AccountRule::Fixed(8888),
        }
    }

    #[test]
    fn test_valid_descriptor() {
        header_descriptor().validate().unwrap();
    }

    #[test]
    fn test_descriptor_requires_date_and_amount_anchors() {
        let mut d = header_descriptor();
        d.fields[1].anchor = false;
        assert!(matches!(d.validate(), Err(IngestError::InvalidDescriptor { .. })));

        let mut d = header_descriptor();
        d.fields.remove(0);
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_descriptor_rejects_double_mapping_and_undeclared_columns() {
        let mut d = header_descriptor();
        d.fields[2].target = Some(Column::Amount);
        assert!(d.validate().is_err());

        let mut d = header_descriptor();
        d.fields.push(FieldSpec::named("memo", Converter::Text));
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_positional_fields_need_positions_inside_width() {
        let d = Descriptor {
            institution: "pos".to_string(),
            delimiter: b',',
            layout: Layout::Positional { width: 3 },
            fields: vec![
                FieldSpec::at(0, "date", Converter::Date).to(Column::Date).anchor(),
                FieldSpec::at(3, "amount", Converter::DashSignedAmount).to(Column::Amount).anchor(),
            ],
            account: AccountRule::Fixed(0),
        };
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_locate_header_columns() {
        let d = header_descriptor();
        let first = StringRecord::from(vec!["note", "x", "amount", "date"]);
        assert_eq!(d.locate(&first).unwrap(), vec![Some(3), Some(2), Some(0), None]);

        let bad = StringRecord::from(vec!["date", "amount"]);
        assert_eq!(d.locate(&bad).unwrap_err(), "note");
    }

    #[test]
    fn test_mapping_lists_targets() {
        let m = header_descriptor().mapping();
        assert_eq!(m.len(), 4);
        assert!(m.contains(&("note".to_string(), Column::Description)));
    }
}
