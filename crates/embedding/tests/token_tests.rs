use anyhow::Result;
use candle_core::{DType, Device, Tensor};
use embedding::{
    positional::sinusoidal_table,
    token::{TokenEmbedding, TokenEmbeddingConfig},
};
use layers::{ExecutionMode, LayerError};
use rand::{rngs::StdRng, SeedableRng};

fn make_ids(data: &[i64], shape: (usize, usize)) -> Result<Tensor> {
    Ok(Tensor::from_slice(data, shape, &Device::Cpu)?)
}

fn build(config: TokenEmbeddingConfig) -> Result<TokenEmbedding> {
    let mut rng = StdRng::seed_from_u64(42);
    Ok(TokenEmbedding::new(config, &mut rng, &Device::Cpu)?)
}

#[test]
fn forward_shape_matches_config() -> Result<()> {
    let config = TokenEmbeddingConfig::new(8, 4, 0);
    let embedding = build(config.clone())?;
    let token_ids = make_ids(&[0, 1, 2, 3], (2, 2))?;

    let output = embedding.forward(&token_ids, 0, &mut ExecutionMode::inference())?;

    assert_eq!(output.dims(), &[2, 2, config.embedding_dim]);
    assert_eq!(output.dtype(), DType::F32);
    Ok(())
}

#[test]
fn padding_row_is_zero_for_every_index() -> Result<()> {
    for padding_idx in [0usize, 3, 9] {
        let embedding = build(TokenEmbeddingConfig::new(10, 6, padding_idx))?;
        let row = embedding.weight().get(padding_idx)?.to_vec1::<f32>()?;
        assert!(row.iter().all(|v| *v == 0.0), "row {padding_idx}: {row:?}");

        let other = (padding_idx + 1) % 10;
        let row = embedding.weight().get(other)?.to_vec1::<f32>()?;
        assert!(row.iter().any(|v| *v != 0.0));
    }
    Ok(())
}

#[test]
fn weight_std_follows_embedding_dim() -> Result<()> {
    let embedding = build(TokenEmbeddingConfig::new(512, 64, 0))?;
    let values = embedding.weight().flatten_all()?.to_vec1::<f32>()?;
    let n = values.len() as f64;
    let mean = values.iter().map(|v| *v as f64).sum::<f64>() / n;
    let var = values.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n;
    let expected = 64f64.powf(-0.5);
    assert!((var.sqrt() - expected).abs() < expected * 0.1);
    Ok(())
}

#[test]
fn output_is_double_scaled_lookup_plus_positions() -> Result<()> {
    let dim = 4usize;
    let embedding = build(TokenEmbeddingConfig::new(6, dim, 0))?;
    let token_ids = make_ids(&[5, 2], (1, 2))?;
    let timestep = 3;

    let output = embedding.forward(&token_ids, timestep, &mut ExecutionMode::inference())?;
    let output = output.squeeze(0)?.to_vec2::<f32>()?;

    let table = sinusoidal_table(dim, 5000, &Device::Cpu)?.to_vec2::<f32>()?;
    let weight = embedding.weight().to_vec2::<f32>()?;
    let scale = (dim as f32).sqrt();
    for (pos, id) in [5usize, 2].into_iter().enumerate() {
        for d in 0..dim {
            let expected = (weight[id][d] * scale + table[timestep + pos][d]) * scale;
            assert!((output[pos][d] - expected).abs() < 1e-5);
        }
    }
    Ok(())
}

#[test]
fn forward_rejects_out_of_range_ids() -> Result<()> {
    let embedding = build(TokenEmbeddingConfig::new(4, 2, 0))?;
    let token_ids = make_ids(&[0, 4], (1, 2))?;

    let err = embedding
        .forward(&token_ids, 0, &mut ExecutionMode::inference())
        .unwrap_err();
    assert!(matches!(err, LayerError::InvalidShape(_)));
    assert!(err.to_string().contains("token id 4 exceeds vocab size"));
    Ok(())
}

#[test]
fn timestep_past_table_overflows() -> Result<()> {
    let mut config = TokenEmbeddingConfig::new(4, 2, 0);
    config.max_len = 3;
    let embedding = build(config)?;
    let token_ids = make_ids(&[1, 2], (1, 2))?;
    let mut mode = ExecutionMode::inference();

    assert!(embedding.forward(&token_ids, 1, &mut mode).is_ok());
    let err = embedding.forward(&token_ids, 2, &mut mode).unwrap_err();
    assert!(matches!(
        err,
        LayerError::PositionOverflow {
            requested: 4,
            capacity: 3
        }
    ));
    Ok(())
}

#[test]
fn invalid_configurations_are_rejected() {
    let cases = [
        TokenEmbeddingConfig::new(0, 4, 0),
        TokenEmbeddingConfig::new(4, 0, 0),
        TokenEmbeddingConfig::new(4, 3, 0),
        TokenEmbeddingConfig::new(4, 4, 4),
    ];
    for config in cases {
        let mut rng = StdRng::seed_from_u64(0);
        let err = TokenEmbedding::new(config.clone(), &mut rng, &Device::Cpu).unwrap_err();
        assert!(
            matches!(err, LayerError::InvalidConfiguration(_)),
            "{config:?} gave {err}"
        );
    }
}

#[test]
fn dropout_is_inactive_at_inference() -> Result<()> {
    let mut config = TokenEmbeddingConfig::new(8, 4, 0);
    config.dropout_p = 0.5;
    let embedding = build(config)?;
    let ids = make_ids(&[1, 2, 3], (1, 3))?;
    let a = embedding.forward(&ids, 0, &mut ExecutionMode::inference())?;
    let b = embedding.forward(&ids, 0, &mut ExecutionMode::inference())?;
    assert_eq!(a.flatten_all()?.to_vec1::<f32>()?, b.flatten_all()?.to_vec1::<f32>()?);

    let dropped = embedding.forward(&ids, 0, &mut ExecutionMode::training(1))?;
    let zeros = dropped
        .flatten_all()?
        .to_vec1::<f32>()?
        .iter()
        .filter(|v| **v == 0.0)
        .count();
    assert!(zeros > 0);
    Ok(())
}
