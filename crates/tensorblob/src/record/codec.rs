use super::BlobRecord;
use crate::Error;

pub(crate) fn bin_config() -> bincode::config::Configuration {
    bincode::config::standard()
}

impl BlobRecord {
    /// Encodes the record into its binary form.
    pub fn encode(&self) -> Result<Vec<u8>, Error> {
        bincode::serde::encode_to_vec(self, bin_config()).map_err(|err| Error::Encode(err.to_string()))
    }

    /// Decodes a record from its binary form.
    ///
    /// Trailing bytes after the record are rejected.
    pub fn decode(bytes: &[u8]) -> Result<Self, Error> {
        let (record, read): (Self, usize) = bincode::serde::decode_from_slice(bytes, bin_config())
            .map_err(|err| Error::Decode(format!("Cannot parse content into a blob record: {err}")))?;

        if read != bytes.len() {
            return Err(Error::Decode(format!(
                "{} trailing bytes after the blob record",
                bytes.len() - read
            )));
        }

        Ok(record)
    }
}
