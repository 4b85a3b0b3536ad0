//! Padded token batches for the ONNX models, and mean pooling of their output.
//!
//! The packing and pooling are plain slice arithmetic; only tensor
//! construction needs ONNX Runtime.
#![cfg_attr(not(feature = "onnx"), allow(dead_code))]

/// One tokenized input: ids, attention mask and segment ids of equal length.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TokenRow<'a> {
    pub ids: &'a [u32],
    pub mask: &'a [u32],
    pub type_ids: &'a [u32],
}

#[cfg(feature = "onnx")]
impl<'a> From<&'a tokenizers::Encoding> for TokenRow<'a> {
    fn from(encoding: &'a tokenizers::Encoding) -> Self {
        Self {
            ids: encoding.get_ids(),
            mask: encoding.get_attention_mask(),
            type_ids: encoding.get_type_ids(),
        }
    }
}

/// Row-major `[rows, seq_len]` inputs, zero-padded to the longest row.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TokenBatch {
    pub rows: usize,
    pub seq_len: usize,
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub token_type_ids: Vec<i64>,
}

impl TokenBatch {
    pub fn pack(rows: &[TokenRow<'_>]) -> Self {
        let seq_len = rows.iter().map(|r| r.ids.len()).max().unwrap_or(0);
        let mut batch = Self {
            rows: rows.len(),
            seq_len,
            input_ids: vec![0; rows.len() * seq_len],
            attention_mask: vec![0; rows.len() * seq_len],
            token_type_ids: vec![0; rows.len() * seq_len],
        };
        for (i, row) in rows.iter().enumerate() {
            let span = i * seq_len..(i + 1) * seq_len;
            fill(&mut batch.input_ids[span.clone()], row.ids);
            fill(&mut batch.attention_mask[span.clone()], row.mask);
            fill(&mut batch.token_type_ids[span], row.type_ids);
        }
        batch
    }

    pub fn shape(&self) -> [i64; 2] {
        [self.rows as i64, self.seq_len as i64]
    }
}

#[cfg(feature = "onnx")]
impl TokenBatch {
    pub fn ids_tensor(&self) -> anyhow::Result<ort::value::Tensor<i64>> {
        self.tensor(&self.input_ids)
    }

    pub fn mask_tensor(&self) -> anyhow::Result<ort::value::Tensor<i64>> {
        self.tensor(&self.attention_mask)
    }

    pub fn type_tensor(&self) -> anyhow::Result<ort::value::Tensor<i64>> {
        self.tensor(&self.token_type_ids)
    }

    fn tensor(&self, data: &[i64]) -> anyhow::Result<ort::value::Tensor<i64>> {
        Ok(ort::value::Tensor::from_array((
            self.shape(),
            data.to_vec().into_boxed_slice(),
        ))?)
    }
}

fn fill(dst: &mut [i64], src: &[u32]) {
    for (d, &s) in dst.iter_mut().zip(src) {
        *d = i64::from(s);
    }
}

/// Attention-masked mean over the token axis, scaled to unit length.
///
/// `hidden` is `[batch.rows, hidden_len, dim]`. The model may return fewer
/// positions than were packed; the mask is read only for those it returned.
pub(crate) fn mean_pool(
    hidden: &[f32],
    hidden_len: usize,
    dim: usize,
    batch: &TokenBatch,
) -> Vec<Vec<f32>> {
    if hidden_len == 0 || dim == 0 || batch.seq_len == 0 {
        return vec![vec![0.0; dim]; batch.rows];
    }
    hidden
        .chunks(hidden_len * dim)
        .zip(batch.attention_mask.chunks(batch.seq_len))
        .map(|(tokens, mask)| {
            let mut pooled = vec![0.0f32; dim];
            let mut weight = 0.0f32;
            for (token, &m) in tokens.chunks(dim).zip(mask) {
                if m == 0 {
                    continue;
                }
                for (p, x) in pooled.iter_mut().zip(token) {
                    *p += x;
                }
                weight += 1.0;
            }
            if weight > 0.0 {
                pooled.iter_mut().for_each(|p| *p /= weight);
            }
            normalize(&mut pooled);
            pooled
        })
        .collect()
}

/// L2-normalize in place; the zero vector is left alone.
pub(crate) fn normalize(v: &mut [f32]) {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row<'a>(ids: &'a [u32], mask: &'a [u32], type_ids: &'a [u32]) -> TokenRow<'a> {
        TokenRow {
            ids,
            mask,
            type_ids,
        }
    }

    #[test]
    fn pack_pads_to_longest_row() {
        let batch = TokenBatch::pack(&[
            row(&[101, 7, 102], &[1, 1, 1], &[0, 0, 1]),
            row(&[101, 102], &[1, 1], &[0, 0]),
        ]);
        assert_eq!(batch.shape(), [2, 3]);
        assert_eq!(batch.input_ids, [101, 7, 102, 101, 102, 0]);
        assert_eq!(batch.attention_mask, [1, 1, 1, 1, 1, 0]);
        assert_eq!(batch.token_type_ids, [0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn pack_empty() {
        let batch = TokenBatch::pack(&[]);
        assert_eq!(batch.shape(), [0, 0]);
        assert!(batch.input_ids.is_empty());
    }

    #[test]
    fn pool_skips_padding() {
        let batch = TokenBatch::pack(&[
            row(&[1, 2], &[1, 1], &[0, 0]),
            row(&[1], &[1], &[0]),
        ]);
        // Row 1's padded position carries a large value that must not leak in.
        let hidden = [3.0, 0.0, 0.0, 4.0, 0.0, 2.0, 100.0, 100.0];
        let pooled = mean_pool(&hidden, 2, 2, &batch);
        assert_eq!(pooled.len(), 2);
        assert!((pooled[0][0] - 0.6).abs() < 1e-6);
        assert!((pooled[0][1] - 0.8).abs() < 1e-6);
        assert_eq!(pooled[1], [0.0, 1.0]);
    }

    #[test]
    fn pool_output_is_unit_length() {
        let batch = TokenBatch::pack(&[row(&[1, 2, 3], &[1, 1, 1], &[0, 0, 0])]);
        let hidden = [0.5, -1.0, 2.0, 0.25, 3.0, 1.0, -0.5, 0.0, 4.0];
        let pooled = mean_pool(&hidden, 3, 3, &batch);
        let norm = pooled[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn pool_fully_masked_row_is_zero() {
        let batch = TokenBatch::pack(&[row(&[1], &[0], &[0])]);
        assert_eq!(mean_pool(&[5.0, 5.0], 1, 2, &batch), [vec![0.0, 0.0]]);
    }

    #[test]
    fn normalize_leaves_zero_vector() {
        let mut v = [0.0f32; 3];
        normalize(&mut v);
        assert_eq!(v, [0.0; 3]);
    }
}
