use briny_spectral::{
    backprop::{self, mse_loss},
    gradcheck::{gradcheck, GradCheckOptions},
    layers::{Correlate2d, Init, SpectralMagnitude},
    modelio::{load_model, save_model},
    tensors::{Tensor, WithGrad},
};
use log::info;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::error::Error;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let mut rng = StdRng::seed_from_u64(7);

    // spectral magnitude on a random 8x8 input
    let input = WithGrad::new(Tensor::new(
        vec![8, 8],
        (0..64).map(|_| rng.random_range(-1.0..1.0)).collect(),
    ));
    let (spectrum, mut spectrum_back) = backprop::spectral_magnitude(&input)?;
    let grad_in = spectrum_back(&Tensor::new(
        spectrum.shape.clone(),
        (0..spectrum.len()).map(|_| rng.random_range(-1.0..1.0)).collect(),
    ))?;
    info!("spectral magnitude: {:?} -> {:?}, grad {:?}", input.value.shape, spectrum.shape, grad_in.shape);

    // learnable correlation: fit a 3x3 filter to a fixed target filter
    let target_op = Correlate2d::from_filter(Tensor::new(
        vec![3, 3],
        vec![0.0, -1.0, 0.0, -1.0, 4.0, -1.0, 0.0, -1.0, 0.0],
    ))?;
    let mut op = Correlate2d::with_rng(3, 3, Init::Normal { mean: 0.0, std: 0.1 }, &mut rng)?;

    let x = WithGrad::new(Tensor::new(
        vec![10, 10],
        (0..100).map(|_| rng.random_range(-1.0..1.0)).collect(),
    ));
    let (target, _) = backprop::correlate2d(&target_op, &x)?;

    let learning_rate = 0.1;
    for epoch in 0..200 {
        let (pred, mut back) = backprop::correlate2d(&op, &x)?;
        let (loss, loss_back) = mse_loss(&pred, &target)?;
        let grads = back(&loss_back(1.0))?;
        // release the borrow of `op` before updating it
        drop(back);

        op.accumulate(&grads)?;
        op.step(learning_rate);

        if epoch % 20 == 0 {
            info!("epoch {epoch:4} loss {loss:.6}");
        }
    }
    info!("learned filter: {:?}", op.filter().value.data);

    let report = gradcheck(&op, &x.value, &GradCheckOptions::default())?;
    info!("correlate2d gradcheck passed: {}", report.passed);
    let report = gradcheck(&SpectralMagnitude, &input.value, &GradCheckOptions::default())?;
    info!("spectral_magnitude gradcheck passed: {} (its backward is not the true gradient)", report.passed);

    let path = std::env::temp_dir().join("briny_spectral_filter.bpat");
    save_model(&path, &op.parameters())?;
    let restored = Correlate2d::from_parameters(&load_model(&path)?)?;
    info!("restored filter {:?}", restored.kernel_dims());

    Ok(())
}
