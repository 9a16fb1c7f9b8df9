use crate::{error::InternalError, value::RowData};

// Rows are stored as CBOR. A row that fails to decode is data
// corruption, not a caller error.

pub(crate) fn encode_row(row: &RowData) -> Result<Vec<u8>, InternalError> {
    serde_cbor::to_vec(row)
        .map_err(|e| InternalError::serialize_corruption(format!("row encode failed: {e}")))
}

pub(crate) fn decode_row(bytes: &[u8]) -> Result<RowData, InternalError> {
    serde_cbor::from_slice(bytes)
        .map_err(|e| InternalError::serialize_corruption(format!("row decode failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::collections::BTreeMap;

    #[test]
    fn round_trips_a_row() {
        let mut row = BTreeMap::new();
        row.insert("id".to_string(), Value::Uint(7));
        row.insert("username".to_string(), Value::Text("AAA".into()));
        row.insert("team_id".to_string(), Value::Null);

        let bytes = encode_row(&row).expect("encode should succeed");
        let back = decode_row(&bytes).expect("decode should succeed");

        assert_eq!(back, row);
    }

    #[test]
    fn rejects_garbage_bytes() {
        let err = decode_row(&[0xff, 0x00, 0x13]).expect_err("garbage should not decode");
        assert_eq!(err.to_string().is_empty(), false);
    }
}
