// Wire format (MessagePack сериализация)
// Используется для передачи конвертов через relay

use crate::error::{CryptoError, Result};
use crate::protocol::messages::OutgoingEnvelope;
use rmp_serde::{Deserializer, Serializer};
use serde::{Deserialize, Serialize};

/// Упаковать конверт в MessagePack формат
pub fn pack_envelope(message: &OutgoingEnvelope) -> Result<Vec<u8>> {
    pack_raw(message)
}

/// Распаковать конверт из MessagePack
pub fn unpack_envelope(data: &[u8]) -> Result<OutgoingEnvelope> {
    unpack_raw(data)
}

/// Упаковать произвольные данные в MessagePack (имена полей сохраняются)
pub fn pack_raw<T: Serialize>(data: &T) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    data.serialize(&mut Serializer::new(&mut buffer).with_struct_map())
        .map_err(|e| CryptoError::InvalidOperation(format!("MessagePack pack error: {}", e)))?;
    Ok(buffer)
}

/// Распаковать MessagePack в произвольный тип
pub fn unpack_raw<'a, T: Deserialize<'a>>(data: &'a [u8]) -> Result<T> {
    let mut deserializer = Deserializer::new(data);
    T::deserialize(&mut deserializer)
        .map_err(|e| CryptoError::InvalidOperation(format!("MessagePack unpack error: {}", e)))
}
