//! Numeric helpers shared by the SQL scalar functions and the application layer.

use crate::error::DatabaseError;

const F32_BYTES: usize = std::mem::size_of::<f32>();

pub fn encode_embedding(vector: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(std::mem::size_of_val(vector));
    for &value in vector {
        bytes.extend_from_slice(&value.to_le_bytes());
    }
    bytes
}

pub fn decode_embedding(blob: &[u8]) -> Result<Vec<f32>, DatabaseError> {
    if blob.len() % F32_BYTES != 0 {
        return Err(DatabaseError::CorruptEmbedding(format!(
            "blob length {} is not a multiple of {F32_BYTES}",
            blob.len()
        )));
    }

    Ok(blob
        .chunks_exact(F32_BYTES)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

pub fn dot_product(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.len() != b.len() {
        return None;
    }

    Some(
        a.iter()
            .zip(b.iter())
            .map(|(&x, &y)| f64::from(x) * f64::from(y))
            .sum(),
    )
}

pub fn vector_norm(vector: &[f32]) -> f64 {
    vector
        .iter()
        .map(|&value| f64::from(value) * f64::from(value))
        .sum::<f64>()
        .sqrt()
}

/// `None` when the lengths differ or either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    let dot = dot_product(a, b)?;
    let denominator = vector_norm(a) * vector_norm(b);
    if denominator <= f64::EPSILON {
        return None;
    }
    Some(dot / denominator)
}
