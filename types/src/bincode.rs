use bincode::config::DefaultOptions;
use bincode::config::Options;
use serde::Deserialize;
use serde::Serialize;

/// `MAGIC` prefixes every message on the wire so a peer speaking a
/// different protocol entirely is rejected before we waste cycles trying to
/// decode its version/length header as ours.
pub const MAGIC_BYTES: [u8; 4] = *b"SKP+";
pub const VERSION_LENGTH: usize = std::mem::size_of::<u8>() + 2 * std::mem::size_of::<u16>();
pub const LENGTH_HEADER_SIZE: usize = 8;

/// Frames a value for the wire as `MAGIC_BYTES ++ version ++ big-endian u64
/// length ++ bincode(value)`, and parses the same shape back out of a
/// payload that has already had the magic bytes and version stripped off by
/// the reader (see `overlay::protocol`).
///
/// - Length encoding must use fixed int and not var int.
/// - Endianness must be big endian.
pub trait BinCodeSerAndDeser<'a>
where
    Self: Serialize + Deserialize<'a>,
{
    fn serialize(&self) -> Result<Vec<u8>, bincode::Error> {
        let config = DefaultOptions::new()
            .with_fixint_encoding()
            .with_big_endian();
        let serialized_data = config.serialize(self)?;
        let data_length = serialized_data.len() as u64;
        let mut buffer =
            Vec::with_capacity(MAGIC_BYTES.len() + VERSION_LENGTH + LENGTH_HEADER_SIZE + serialized_data.len());
        buffer.extend(&MAGIC_BYTES);
        buffer.extend(crate::version::VERSION.serialize_magic_bytes()?);
        buffer.extend(&data_length.to_be_bytes());
        buffer.extend(&serialized_data);
        Ok(buffer)
    }

    /// Deserializes a payload that has already had the framing header
    /// (magic bytes, version, length) stripped off.
    fn deserialize(bytes: &'a [u8]) -> Result<Self, bincode::Error> {
        let config = DefaultOptions::new()
            .with_fixint_encoding()
            .with_big_endian();
        config.deserialize(bytes)
    }
}
