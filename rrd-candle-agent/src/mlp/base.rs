use super::{create_hidden_layers, linear_xavier, mlp_forward, MlpConfig};
use crate::model::{SubModel1, SubModel2};
use anyhow::{ensure, Result};
use candle_core::{Device, Module, Tensor, D};
use candle_nn::{Linear, VarBuilder};

/// Multilayer perceptron with ReLU activation function.
pub struct Mlp {
    config: MlpConfig,
    device: Device,
    layers: Vec<Linear>,
    head: Linear,
}

impl Mlp {
    fn forward_(&self, xs: Tensor) -> Result<Tensor> {
        let xs = mlp_forward(xs, &self.layers)?;
        let xs = self.head.forward(&xs)?;

        match self.config.activation_out {
            false => Ok(xs),
            true => Ok(xs.relu()?),
        }
    }
}

fn _build(vb: VarBuilder, config: MlpConfig) -> Result<Mlp> {
    ensure!(!config.units.is_empty(), "MLP needs at least one hidden layer");
    let device = vb.device().clone();
    let vb = vb.pp("mlp");
    let layers = create_hidden_layers(&vb, &config)?;
    let head = linear_xavier(
        *config.units.last().unwrap_or(&config.in_dim),
        config.out_dim,
        vb.pp(format!("ln{}", layers.len())),
    )?;

    Ok(Mlp {
        config,
        device,
        layers,
        head,
    })
}

impl SubModel1 for Mlp {
    type Config = MlpConfig;
    type Input = Tensor;
    type Output = Tensor;

    fn forward(&self, xs: &Self::Input) -> Result<Tensor> {
        self.forward_(xs.to_device(&self.device)?)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vb, config)
    }
}

/// Concatenates the two inputs along the last dimension.
impl SubModel2 for Mlp {
    type Config = MlpConfig;
    type Input1 = Tensor;
    type Input2 = Tensor;
    type Output = Tensor;

    fn forward(&self, input1: &Self::Input1, input2: &Self::Input2) -> Result<Self::Output> {
        let input1 = input1.to_device(&self.device)?;
        let input2 = input2.to_device(&self.device)?;
        let input = Tensor::cat(&[input1, input2], D::Minus1)?;
        self.forward_(input)
    }

    fn build(vb: VarBuilder, config: Self::Config) -> Result<Self> {
        _build(vb, config)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use candle_core::DType;
    use candle_nn::VarMap;

    #[test]
    fn test_shapes_and_names() -> Result<()> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, &Device::Cpu).set_prefix("critic0");
        let config = MlpConfig::new(5, vec![8, 8], 1, false);
        let mlp = <Mlp as SubModel2>::build(vb, config)?;

        let obs = Tensor::zeros((3, 4), DType::F32, &Device::Cpu)?;
        let act = Tensor::zeros((3, 1), DType::F32, &Device::Cpu)?;
        let q = SubModel2::forward(&mlp, &obs, &act)?;
        assert_eq!(q.dims(), &[3, 1]);

        // Identical rows give identical values.
        let q: Vec<f32> = q.flatten_all()?.to_vec1()?;
        assert!(q.iter().all(|&v| (v - q[0]).abs() < 1e-6));

        let data = varmap.data().lock().unwrap();
        assert!(data.contains_key("critic0.mlp.ln0.weight"));
        assert!(data.contains_key("critic0.mlp.ln2.bias"));
        assert_eq!(data.len(), 6);
        Ok(())
    }
}
