use crate::{Characteristics, Error, Format};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Type of the values stored in a matrix.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    #[default]
    Double,
    Int,
    Boolean,
    String,
}

/// Everything needed to interpret a persisted matrix: its value type, [Characteristics], and
/// [Format].
///
/// Persisted next to the data as a JSON sidecar (`<path>.mtd`):
///
/// ```json
/// {"data_type":"matrix","value_type":"double","rows":10,"cols":5,"rows_in_block":1000,
///  "cols_in_block":1000,"nnz":12,"format":"binaryblock"}
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Metadata {
    pub value_type: ValueType,
    pub characteristics: Characteristics,
    pub format: Format,
}

#[derive(Serialize, Deserialize)]
struct Document {
    data_type: String,
    value_type: ValueType,
    rows: u64,
    cols: u64,
    rows_in_block: u32,
    cols_in_block: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nnz: Option<u64>,
    format: String,
}

impl Metadata {
    pub fn new(characteristics: Characteristics, format: Format) -> Self {
        Self {
            value_type: ValueType::Double,
            characteristics,
            format,
        }
    }

    /// Suffix appended to a data path to locate its sidecar.
    pub const SUFFIX: &'static str = ".mtd";

    /// Location of the sidecar for data stored at `path`.
    pub fn sidecar(path: &str) -> String {
        format!("{path}{}", Self::SUFFIX)
    }

    /// Serialize into the sidecar document.
    pub fn to_json(&self) -> Result<Vec<u8>, Error> {
        let mc = &self.characteristics;
        let document = Document {
            data_type: "matrix".into(),
            value_type: self.value_type,
            rows: mc.rows,
            cols: mc.cols,
            rows_in_block: mc.rows_per_block,
            cols_in_block: mc.cols_per_block,
            nnz: mc.non_zeros,
            format: self.format.as_str().into(),
        };
        Ok(serde_json::to_vec(&document)?)
    }

    /// Parse a sidecar document.
    pub fn from_json(raw: &[u8]) -> Result<Self, Error> {
        let document: Document = serde_json::from_slice(raw)?;
        if document.data_type != "matrix" {
            return Err(Error::Malformed(format!(
                "unexpected data type: {}",
                document.data_type
            )));
        }
        let characteristics = Characteristics {
            rows: document.rows,
            cols: document.cols,
            rows_per_block: document.rows_in_block,
            cols_per_block: document.cols_in_block,
            non_zeros: document.nnz,
        };
        Ok(Self {
            value_type: document.value_type,
            characteristics,
            format: Format::from_str(&document.format)?,
        })
    }
}
