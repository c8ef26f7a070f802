use super::*;
use candle_core::Device;

fn as_rows(mask: &Tensor) -> Vec<Vec<u8>> {
    mask.to_vec2::<u8>().unwrap()
}

#[test]
fn causal_mask_hides_future_keys() -> Result<()> {
    let mask = causal_mask(&Device::Cpu, 4)?;
    assert_eq!(mask.dtype(), MASK_DTYPE);
    let rows = as_rows(&mask);
    assert_eq!(rows[1][2], 1, "query 1 must not see key 2");
    assert_eq!(rows[2][1], 0, "query 2 sees key 1");
    for (q, row) in rows.iter().enumerate() {
        for (k, value) in row.iter().enumerate() {
            assert_eq!(*value, u8::from(k > q));
        }
    }
    Ok(())
}

#[test]
fn causal_mask_respects_offsets() -> Result<()> {
    let rows = as_rows(&offset_causal_mask(&Device::Cpu, 3, 5)?);
    // Earliest query can only see the prefix (offset = k_len - q_len).
    assert_eq!(rows[0], vec![0, 0, 0, 1, 1]);
    assert_eq!(rows[2], vec![0, 0, 0, 0, 0]);

    let rows = as_rows(&offset_causal_mask(&Device::Cpu, 1, 4)?);
    assert_eq!(rows, vec![vec![0, 0, 0, 0]]);
    Ok(())
}

#[test]
fn padding_flags_follow_padding_index() -> Result<()> {
    let ids = Tensor::from_slice(&[4u32, 7, 1, 1, 3, 1], (2, 3), &Device::Cpu)?;
    let flags = padding_flags(&ids, 1)?;
    assert_eq!(as_rows(&flags), vec![vec![0, 0, 1], vec![1, 0, 1]]);
    Ok(())
}

#[test]
fn padding_mask_broadcasts_over_queries() -> Result<()> {
    let pad = Tensor::from_slice(&[0u8, 0, 1], (1, 3), &Device::Cpu)?;
    let mask = padding_mask(&pad, 2)?;
    assert_eq!(mask.dims(), &[1, 2, 3]);
    assert_eq!(
        mask.to_vec3::<u8>()?,
        vec![vec![vec![0, 0, 1], vec![0, 0, 1]]]
    );
    Ok(())
}

#[test]
fn mask_or_is_a_logical_or() -> Result<()> {
    let device = Device::Cpu;
    let lhs = Tensor::from_slice(&[0u8, 1, 0, 2], (2, 2), &device)?;
    let rhs = Tensor::from_slice(&[0u8, 0, 1, 255], (2, 2), &device)?;
    let combined = mask_or(&lhs, &rhs)?;
    assert_eq!(as_rows(&combined), vec![vec![0, 1], vec![1, 1]]);
    Ok(())
}

#[test]
fn decoder_self_mask_combines_causal_and_padding() -> Result<()> {
    let device = Device::Cpu;
    let table = causal_mask(&device, 8)?;
    let tgt_pad = Tensor::from_slice(&[0u8, 0, 0, 1], (1, 4), &device)?;
    let mask = decoder_self_mask(&table, &tgt_pad)?;
    assert_eq!(mask.dims(), &[1, 4, 4]);
    assert_eq!(
        mask.to_vec3::<u8>()?[0],
        vec![
            vec![0, 1, 1, 1],
            vec![0, 0, 1, 1],
            vec![0, 0, 0, 1],
            vec![0, 0, 0, 1],
        ]
    );
    Ok(())
}

#[test]
fn decoder_self_mask_overflows_table() -> Result<()> {
    let device = Device::Cpu;
    let table = causal_mask(&device, 3)?;
    let tgt_pad = Tensor::zeros((1, 4), MASK_DTYPE, &device)?;
    let err = decoder_self_mask(&table, &tgt_pad).unwrap_err();
    assert!(matches!(
        err,
        LayerError::PositionOverflow {
            requested: 4,
            capacity: 3
        }
    ));
    Ok(())
}
