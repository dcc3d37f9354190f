// Little-endian IEEE-754 float32 (de)serialization for vector-table blobs
// (spec §4.1: "Vectors are serialized as little-endian IEEE-754 float32").

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vector.len() * 4);
    for v in vector {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_vectors() {
        let original = vec![0.0f32, 1.0, -1.5, f32::MIN_POSITIVE, 123456.789];
        let bytes = encode_embedding(&original);
        assert_eq!(bytes.len(), original.len() * 4);
        let decoded = decode_embedding(&bytes);
        assert_eq!(decoded, original);
    }

    #[test]
    fn empty_vector_round_trips_to_empty_bytes() {
        assert!(encode_embedding(&[]).is_empty());
        assert!(decode_embedding(&[]).is_empty());
    }
}
